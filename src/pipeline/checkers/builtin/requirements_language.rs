use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::{sentences, LEXICON};
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;

pub const ID: &str = "requirements_language";

pub struct RequirementsLanguage;

impl Checker for RequirementsLanguage {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Core
    }

    fn description(&self) -> &'static str {
        "Checks binding language: shall vs will/must, one requirement per sentence"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        // will/must only count as inconsistent once the document uses shall.
        let uses_shall = ctx.body_paragraphs().any(|p| {
            LEXICON
                .modal
                .find_iter(&p.text)
                .any(|m| m.as_str().eq_ignore_ascii_case("shall"))
        });

        let mut findings = Vec::new();
        for paragraph in ctx.body_paragraphs() {
            for (start, sentence) in sentences(&paragraph.text) {
                let mut shall_count = 0;
                for m in LEXICON.modal.find_iter(sentence) {
                    let modal = m.as_str().to_lowercase();
                    if modal == "shall" {
                        shall_count += 1;
                        continue;
                    }
                    if !uses_shall {
                        continue;
                    }
                    let confidence = if modal == "must" { 0.7 } else { 0.5 };
                    findings.push(
                        Finding::new(
                            ID,
                            "REQ-001",
                            "requirements",
                            Severity::Major,
                            ctx.locate(paragraph, start + m.start(), m.len()),
                            format!("Use \"shall\" instead of \"{modal}\" for binding requirements"),
                        )
                        .flagged(m.as_str())
                        .confidence(confidence),
                    );
                }
                if shall_count > 1 {
                    findings.push(
                        Finding::new(
                            ID,
                            "REQ-002",
                            "requirements",
                            Severity::Major,
                            ctx.locate(paragraph, start, sentence.len()),
                            "Sentence states more than one requirement",
                        )
                        .flagged(sentence)
                        .confidence(0.75),
                    );
                }
            }
        }
        Ok(CheckerOutput::findings(findings))
    }
}
