use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::LEXICON;
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;

pub const ID: &str = "passive_voice";

pub struct PassiveVoice;

impl Checker for PassiveVoice {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Style
    }

    fn description(&self) -> &'static str {
        "Flags be-verb + past participle constructions"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let mut findings = Vec::new();
        for paragraph in ctx.body_paragraphs() {
            for m in LEXICON.passive.find_iter(&paragraph.text) {
                findings.push(
                    Finding::new(
                        ID,
                        "PASSIVE-001",
                        "style",
                        Severity::Minor,
                        ctx.locate(paragraph, m.start(), m.len()),
                        "Passive voice construction; prefer active voice",
                    )
                    .flagged(m.as_str())
                    .confidence(0.6),
                );
            }
        }
        Ok(CheckerOutput::findings(findings))
    }
}
