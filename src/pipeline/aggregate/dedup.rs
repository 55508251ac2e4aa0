use std::collections::{BTreeMap, BTreeSet};

use super::types::Issue;
use crate::pipeline::checkers::Finding;

/// Case-folded message with non-alphanumeric runs collapsed to one space,
/// trimmed and capped at `prefix_chars` characters.
pub fn normalize_message(message: &str, prefix_chars: usize) -> String {
    let mut out = String::with_capacity(message.len());
    let mut pending_space = false;
    for c in message.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out.chars().take(prefix_chars).collect::<String>().trim_end().to_string()
}

pub fn dedup_key(finding: &Finding, prefix_chars: usize) -> String {
    format!("{}|{}", finding.rule_id, normalize_message(&finding.message, prefix_chars))
}

fn issue_from(key: String, finding: &Finding) -> Issue {
    let mut flagged_text = BTreeSet::new();
    if !finding.flagged_text.is_empty() {
        flagged_text.insert(finding.flagged_text.clone());
    }
    Issue {
        key,
        rule_id: finding.rule_id.clone(),
        category: finding.category.clone(),
        severity: finding.severity,
        message: finding.message.clone(),
        checker_ids: BTreeSet::from([finding.checker_id.clone()]),
        locations: BTreeSet::from([finding.location]),
        flagged_text,
        occurrences: 1,
        confidence: finding.adjusted_confidence,
    }
}

/// Fold `finding` into `issue`. Every field combines with a commutative,
/// idempotent operation (set union, max, min).
///
/// Findings that agree on severity keep it unchanged. When findings sharing a
/// key disagree, the issue takes the most severe one, which gives the same
/// result in any merge order.
fn absorb(issue: &mut Issue, finding: &Finding) {
    issue.locations.insert(finding.location);
    issue.checker_ids.insert(finding.checker_id.clone());
    if !finding.flagged_text.is_empty() {
        issue.flagged_text.insert(finding.flagged_text.clone());
    }
    issue.severity = issue.severity.max(finding.severity);
    issue.confidence = issue.confidence.max(finding.adjusted_confidence);
    if finding.message < issue.message {
        issue.message = finding.message.clone();
    }
    if finding.category < issue.category {
        issue.category = finding.category.clone();
    }
    issue.occurrences = issue.locations.len();
}

/// Merged issues plus the number of distinct observations seen.
pub struct Deduplicated {
    pub issues: Vec<Issue>,
    pub distinct_findings: usize,
}

pub fn deduplicate(findings: &[Finding], prefix_chars: usize) -> Deduplicated {
    let mut by_key: BTreeMap<String, Issue> = BTreeMap::new();
    let mut observations = BTreeSet::new();
    for finding in findings {
        let key = dedup_key(finding, prefix_chars);
        observations.insert((key.clone(), finding.checker_id.clone(), finding.location));
        match by_key.get_mut(&key) {
            Some(issue) => absorb(issue, finding),
            None => {
                let issue = issue_from(key.clone(), finding);
                by_key.insert(key, issue);
            }
        }
    }

    let mut issues: Vec<Issue> = by_key.into_values().collect();
    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.first_location().cmp(&b.first_location()))
            .then_with(|| a.key.cmp(&b.key))
    });
    Deduplicated {
        issues,
        distinct_findings: observations.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::checkers::{Location, Severity};

    fn finding(rule: &str, message: &str, offset: usize, severity: Severity) -> Finding {
        Finding::new(
            "passive_voice",
            rule,
            "style",
            severity,
            Location { paragraph: 0, offset, length: 4 },
            message,
        )
    }

    #[test]
    fn normalization_folds_case_and_punctuation() {
        assert_eq!(
            normalize_message("  Passive voice -- construction; PREFER active!", 48),
            "passive voice construction prefer active"
        );
        assert_eq!(normalize_message("Abc def ghi", 5), "abc d");
        assert_eq!(normalize_message("Abc def", 4), "abc");
    }

    #[test]
    fn same_rule_and_prefix_merge_locations() {
        let a = finding("PASSIVE-001", "Passive voice construction", 10, Severity::Minor);
        let b = finding("PASSIVE-001", "passive voice: construction", 90, Severity::Major);
        let d = deduplicate(&[a, b], 48);
        assert_eq!(d.issues.len(), 1);
        let issue = &d.issues[0];
        assert_eq!(issue.occurrences, 2);
        assert_eq!(issue.severity, Severity::Major);
        assert_eq!(issue.message, "Passive voice construction");
        assert_eq!(d.distinct_findings, 2);
    }

    #[test]
    fn severity_is_kept_when_findings_agree_and_maxed_when_they_conflict() {
        let minor_a = finding("PASSIVE-001", "Passive voice", 10, Severity::Minor);
        let minor_b = finding("PASSIVE-001", "Passive voice", 20, Severity::Minor);
        let agreed = deduplicate(&[minor_a.clone(), minor_b], 48);
        assert_eq!(agreed.issues[0].severity, Severity::Minor);

        let critical = finding("PASSIVE-001", "Passive voice", 30, Severity::Critical);
        let forward = deduplicate(&[minor_a.clone(), critical.clone()], 48);
        let backward = deduplicate(&[critical, minor_a], 48);
        assert_eq!(forward.issues[0].severity, Severity::Critical);
        assert_eq!(backward.issues[0].severity, Severity::Critical);
    }

    #[test]
    fn different_rules_never_merge() {
        let a = finding("PASSIVE-001", "Same text", 0, Severity::Minor);
        let b = finding("WEAK-001", "Same text", 0, Severity::Minor);
        assert_eq!(deduplicate(&[a, b], 48).issues.len(), 2);
    }

    #[test]
    fn ordering_is_severity_then_location_then_key() {
        let findings = vec![
            finding("B-1", "minor late", 50, Severity::Minor),
            finding("A-1", "critical", 70, Severity::Critical),
            finding("C-1", "minor early", 5, Severity::Minor),
            finding("D-1", "minor early twin", 5, Severity::Minor),
        ];
        let rules: Vec<String> = deduplicate(&findings, 48)
            .issues
            .into_iter()
            .map(|i| i.rule_id)
            .collect();
        assert_eq!(rules, vec!["A-1", "C-1", "D-1", "B-1"]);
    }
}
