use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::lexicon::LEXICON;
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;

pub const ID: &str = "weak_language";

pub struct WeakLanguage;

impl Checker for WeakLanguage {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Style
    }

    fn description(&self) -> &'static str {
        "Flags vague terms and unresolved placeholders"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let mut findings = Vec::new();
        for paragraph in ctx.body_paragraphs() {
            for m in LEXICON.vague_term.find_iter(&paragraph.text) {
                let term = m.as_str().to_lowercase();
                findings.push(
                    Finding::new(
                        ID,
                        "WEAK-001",
                        "clarity",
                        Severity::Minor,
                        ctx.locate(paragraph, m.start(), m.len()),
                        format!("Vague term \"{term}\" weakens the statement"),
                    )
                    .flagged(m.as_str())
                    .confidence(0.55),
                );
            }
        }
        // Placeholders count in headings too.
        for paragraph in &ctx.structure().paragraphs {
            for m in LEXICON.placeholder.find_iter(&paragraph.text) {
                findings.push(
                    Finding::new(
                        ID,
                        "WEAK-002",
                        "completeness",
                        Severity::Major,
                        ctx.locate(paragraph, m.start(), m.len()),
                        format!("Unresolved placeholder {}", m.as_str()),
                    )
                    .flagged(m.as_str())
                    .confidence(0.9),
                );
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
    fn vague_terms_flagged_case_insensitively() {
        let out = run(&WeakLanguage, "Provide Adequate staffing and/or tools as needed.");
        let messages: Vec<&str> = out.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Vague term \"adequate\" weakens the statement",
                "Vague term \"and/or\" weakens the statement",
                "Vague term \"as needed\" weakens the statement",
            ]
        );
    }

    #[test]
    fn placeholders_are_major_even_in_headings() {
        let out = run(&WeakLanguage, "# Budget TBD\n\nDelivery date: TBR.");
        let placeholders: Vec<_> = out.findings.iter().filter(|f| f.rule_id == "WEAK-002").collect();
        assert_eq!(placeholders.len(), 2);
        assert!(placeholders.iter().all(|f| f.severity == Severity::Major));
    }

    #[test]
    fn precise_text_is_clean() {
        let out = run(&WeakLanguage, "The contractor shall deliver 12 reports by 1 March.");
        assert!(out.findings.is_empty());
    }
}
