use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::words;
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;

pub const ID: &str = "repeated_words";

pub struct RepeatedWords;

impl Checker for RepeatedWords {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Core
    }

    fn description(&self) -> &'static str {
        "Flags accidentally doubled words"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let mut findings = Vec::new();
        for paragraph in &ctx.structure().paragraphs {
            let text = paragraph.text.as_str();
            let tokens: Vec<(usize, &str)> = words(text).collect();
            for pair in tokens.windows(2) {
                let (first_start, first) = pair[0];
                let (second_start, second) = pair[1];
                let gap = &text[first_start + first.len()..second_start];
                let doubled = first.eq_ignore_ascii_case(second)
                    && first.chars().any(char::is_alphabetic)
                    && !gap.is_empty()
                    && gap.chars().all(char::is_whitespace);
                if !doubled {
                    continue;
                }
                let end = second_start + second.len();
                findings.push(
                    Finding::new(
                        ID,
                        "REPEAT-001",
                        "grammar",
                        Severity::Minor,
                        ctx.locate(paragraph, first_start, end - first_start),
                        format!("Repeated word \"{}\"", first.to_lowercase()),
                    )
                    .flagged(&text[first_start..end])
                    .confidence(0.9),
                );
            }
        }
        Ok(CheckerOutput::findings(findings))
    }
}
