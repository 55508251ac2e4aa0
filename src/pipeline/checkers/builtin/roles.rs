use super::acronyms;
use super::CANDIDATE_REJECT_DELTA;
use crate::learning::LearningDomain;
use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::LEXICON;
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;
use crate::pipeline::extraction::Paragraph;

pub const ID: &str = "roles";

/// Learning category for role candidates.
pub const CANDIDATE_CATEGORY: &str = "role";

/// Phrases that define a role when they follow `the <Role> `.
const DEFINING_PHRASES: &[&str] = &[
    "is responsible",
    "is the",
    "is a",
    "is an",
    "means",
    "refers to",
];

pub struct Roles;

impl Checker for Roles {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Structural
    }

    fn description(&self) -> &'static str {
        "Flags roles that carry obligations but are never defined"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &[acronyms::ID]
    }

    fn candidate_domain(&self) -> Option<LearningDomain> {
        Some(LearningDomain::RoleCandidates)
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let defined_acronyms = ctx.artifact(acronyms::ID, acronyms::DEFINED);
        let expansions: Vec<String> = ctx
            .artifact(acronyms::ID, acronyms::EXPANSIONS)
            .iter()
            .filter_map(|e| e.split_once('=').map(|(_, exp)| exp.to_lowercase()))
            .collect();
        let paragraphs = &ctx.structure().paragraphs;

        let mut findings = Vec::new();
        for paragraph in ctx.body_paragraphs() {
            for caps in LEXICON.role_subject.captures_iter(&paragraph.text) {
                let Some(role) = caps.get(1) else { continue };
                let name = role.as_str();
                if defined_acronyms.iter().any(|a| a == name)
                    || expansions.iter().any(|e| *e == name.to_lowercase())
                    || is_defined(name, paragraphs)
                    || ctx.learned_delta(CANDIDATE_CATEGORY, name) <= CANDIDATE_REJECT_DELTA
                {
                    continue;
                }
                findings.push(
                    Finding::new(
                        ID,
                        "ROLE-001",
                        "roles",
                        Severity::Minor,
                        ctx.locate(paragraph, role.start(), role.len()),
                        format!("Role \"{name}\" is assigned obligations but never defined"),
                    )
                    .flagged(name)
                    .confidence(0.6),
                );
            }
        }
        Ok(CheckerOutput::findings(findings))
    }
}

/// A glossary entry (`Role:` / `Role means`), a quoted term, or a defining
/// sentence (`the Role is responsible`) anywhere in the document.
fn is_defined(role: &str, paragraphs: &[Paragraph]) -> bool {
    let lower = role.to_lowercase();
    let quoted = [format!("\"{role}\""), format!("\u{201C}{role}\u{201D}")];
    paragraphs.iter().any(|p| {
        let text = p.text.as_str();
        if let Some(rest) = text.strip_prefix(role) {
            let rest = rest.trim_start();
            if rest.starts_with(':') || rest.starts_with('-') || rest.starts_with('\u{2013}') || rest.starts_with("means") {
                return true;
            }
        }
        if quoted.iter().any(|q| text.contains(q.as_str())) {
            return true;
        }
        let text_lower = text.to_lowercase();
        DEFINING_PHRASES
            .iter()
            .any(|phrase| text_lower.contains(&format!("the {lower} {phrase} ")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::checkers::builtin::test_support::{run, run_with};
    use crate::pipeline::checkers::types::Artifacts;
    use std::collections::BTreeMap;

    #[test]
    fn undefined_role_flagged_at_each_use() {
        let text = "The Contractor shall deliver. The Contractor shall invoice monthly.";
        let out = run(&Roles, text);
        assert_eq!(out.findings.len(), 2);
        assert!(out.findings.iter().all(|f| f.flagged_text == "Contractor"));
        assert_eq!(out.findings[0].message, out.findings[1].message);
        let loc = out.findings[1].location;
        assert_eq!(&text[loc.offset..loc.offset + loc.length], "Contractor");
    }

    #[test]
    fn glossary_and_defining_sentences_count() {
        let text = "Contractor: the company performing the work.\n\n\
                    The Program Manager is responsible for schedule.\n\n\
                    The Contractor shall deliver. The Program Manager shall approve.";
        assert!(run(&Roles, text).findings.is_empty());
    }

    #[test]
    fn quoted_definition_counts() {
        let text = "Acme Ltd (the \u{201C}Supplier\u{201D}) agrees.\n\nThe Supplier will ship.";
        assert!(run(&Roles, text).findings.is_empty());
    }

    #[test]
    fn acronym_artifacts_define_roles() {
        let mut from_acronyms = Artifacts::new();
        from_acronyms.insert(acronyms::DEFINED.into(), vec!["PMO".into()]);
        from_acronyms.insert(acronyms::EXPANSIONS.into(), vec!["QA=Quality Assurance".into()]);
        let mut artifacts = BTreeMap::new();
        artifacts.insert(acronyms::ID.to_string(), from_acronyms);

        let text = "The PMO shall review. The Quality Assurance shall audit.";
        let out = run_with(&Roles, text, &artifacts, None);
        assert!(out.findings.is_empty());
    }

    #[test]
    fn runs_without_acronym_artifacts() {
        let out = run(&Roles, "The PMO shall review.");
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].flagged_text, "PMO");
    }
}
