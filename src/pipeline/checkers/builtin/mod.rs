//! Checkers shipped with the engine.

pub mod acronyms;
pub mod heading_structure;
pub mod passive_voice;
pub mod repeated_words;
pub mod requirements_language;
pub mod roles;
pub mod sentence_length;
pub mod weak_language;

use std::sync::Arc;

use super::context::Checker;

/// Learning delta at or below which a candidate is no longer treated as one.
pub(crate) const CANDIDATE_REJECT_DELTA: f32 = -0.2;

/// Registration order. Execution order is derived from it by group.
pub fn all() -> Vec<Arc<dyn Checker>> {
    vec![
        Arc::new(repeated_words::RepeatedWords),
        Arc::new(requirements_language::RequirementsLanguage),
        Arc::new(passive_voice::PassiveVoice),
        Arc::new(weak_language::WeakLanguage),
        Arc::new(sentence_length::SentenceLength),
        Arc::new(acronyms::Acronyms),
        Arc::new(roles::Roles),
        Arc::new(heading_structure::HeadingStructure),
    ]
}
