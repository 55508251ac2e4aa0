use crate::pipeline::checkers::context::{CheckContext, Checker};
use crate::pipeline::checkers::types::{CheckerGroup, CheckerOutput, Finding, Severity};
use crate::pipeline::checkers::CheckerError;

pub const ID: &str = "heading_structure";

pub struct HeadingStructure;

impl Checker for HeadingStructure {
    fn id(&self) -> &'static str {
        ID
    }

    fn group(&self) -> CheckerGroup {
        CheckerGroup::Structural
    }

    fn description(&self) -> &'static str {
        "Checks heading hierarchy and empty sections"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let paragraphs = &ctx.structure().paragraphs;
        let mut findings = Vec::new();
        let mut previous_level: Option<u8> = None;

        for heading in &ctx.structure().headings {
            let Some(paragraph) = paragraphs.get(heading.paragraph) else {
                continue;
            };
            let location = ctx.locate(paragraph, 0, paragraph.text.len());

            if let Some(prev) = previous_level {
                if heading.level > prev + 1 {
                    findings.push(
                        Finding::new(
                            ID,
                            "HEAD-001",
                            "structure",
                            Severity::Minor,
                            location,
                            format!("Heading level jumps from {prev} to {}", heading.level),
                        )
                        .flagged(heading.text.as_str())
                        .confidence(0.85),
                    );
                }
            }
            previous_level = Some(heading.level);

            // Empty when the next paragraph closes the section or nothing follows.
            let empty = match paragraphs.get(heading.paragraph + 1) {
                None => true,
                Some(next) => next.heading_level.is_some_and(|level| level <= heading.level),
            };
            if empty {
                findings.push(
                    Finding::new(
                        ID,
                        "HEAD-002",
                        "structure",
                        Severity::Minor,
                        location,
                        "Section has no content",
                    )
                    .flagged(heading.text.as_str())
                    .confidence(0.8),
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
    fn skipped_level_flagged() {
        let out = run(&HeadingStructure, "# Intro\n\nText.\n\n### Detail\n\nMore text.");
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].rule_id, "HEAD-001");
        assert_eq!(out.findings[0].message, "Heading level jumps from 1 to 3");
        assert_eq!(out.findings[0].flagged_text, "Detail");
    }

    #[test]
    fn empty_sections_flagged() {
        let out = run(&HeadingStructure, "# One\n\n# Two\n\nBody.\n\n## Three");
        let empty: Vec<&str> = out
            .findings
            .iter()
            .filter(|f| f.rule_id == "HEAD-002")
            .map(|f| f.flagged_text.as_str())
            .collect();
        assert_eq!(empty, vec!["One", "Three"]);
    }

    #[test]
    fn subsection_right_after_heading_is_not_empty() {
        let out = run(&HeadingStructure, "# Parent\n\n## Child\n\nBody.");
        assert!(out.findings.is_empty());
    }
}
