use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::{sentences, words};
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;

pub const ID: &str = "sentence_length";

pub struct SentenceLength;

impl Checker for SentenceLength {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Style
    }

    fn description(&self) -> &'static str {
        "Flags sentences longer than the configured word budget"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let budget = ctx.config.long_sentence_words;
        if budget == 0 {
            return Err(CheckerError::Failed("long_sentence_words must be positive".into()));
        }
        let mut findings = Vec::new();
        for paragraph in ctx.body_paragraphs() {
            for (start, sentence) in sentences(&paragraph.text) {
                let count = words(sentence).count();
                if count > budget {
                    let over = (count - budget) as f32 / budget as f32;
                    findings.push(
                        Finding::new(
                            ID,
                            "LENGTH-001",
                            "readability",
                            Severity::Minor,
                            ctx.locate(paragraph, start, sentence.len()),
                            format!("Sentence exceeds {budget} words"),
                        )
                        .flagged(sentence)
                        .confidence(0.6 + over.min(1.0) * 0.3),
                    );
                }
            }
        }
        Ok(CheckerOutput::findings(findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::checkers::builtin::test_support::run;

    #[test]
    fn long_sentence_flagged_short_one_not() {
        let long = vec!["word"; 35].join(" ");
        let text = format!("Short sentence here. {long}.");
        let out = run(&SentenceLength, &text);
        assert_eq!(out.findings.len(), 1);
        let f = &out.findings[0];
        assert_eq!(f.message, "Sentence exceeds 30 words");
        assert_eq!(&text[f.location.offset..f.location.offset + f.location.length], format!("{long}."));
        assert!(f.raw_confidence > 0.6);
    }

    #[test]
    fn exactly_budget_is_fine() {
        let text = format!("{}.", vec!["word"; 30].join(" "));
        assert!(run(&SentenceLength, &text).findings.is_empty());
    }
}
