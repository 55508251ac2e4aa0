/// Case-folded candidate with whitespace collapsed and surrounding
/// punctuation trimmed, so the same candidate from different documents
/// lands on one pattern.
pub fn normalize_candidate(candidate: &str) -> String {
    let collapsed = candidate
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// `category:candidate`, or None when the candidate normalizes to nothing.
pub fn pattern_key(category: &str, candidate: &str) -> Option<String> {
    let candidate = normalize_candidate(candidate);
    if candidate.is_empty() {
        return None;
    }
    Some(format!("{}:{candidate}", category.trim().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_candidates_share_a_key() {
        let a = pattern_key("PASSIVE-001", "Was   Written");
        let b = pattern_key("passive-001", "\"was written.\"");
        assert_eq!(a, b);
        assert_eq!(a.as_deref(), Some("passive-001:was written"));
    }

    #[test]
    fn inner_punctuation_is_kept() {
        assert_eq!(normalize_candidate("(R&D)"), "r&d");
        assert_eq!(normalize_candidate("co-op."), "co-op");
    }

    #[test]
    fn punctuation_only_candidate_has_no_key() {
        assert_eq!(pattern_key("acronym", " ... "), None);
    }
}
