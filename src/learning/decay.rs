use std::collections::HashSet;

/// `0.5^(elapsed / half_life)`. Negative elapsed time counts as none.
pub fn decay_factor(elapsed_days: f64, half_life_days: f64) -> f64 {
    0.5f64.powf(elapsed_days.max(0.0) / half_life_days)
}

/// Jaccard similarity of two token sets; 0 when both are empty.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// `0.5 + 0.5 × best Jaccard` of the query against stored contexts; 1 when
/// either side carries no context.
pub fn similarity_weight(query: &[String], stored: &[Vec<String>]) -> f64 {
    let stored: Vec<&Vec<String>> = stored.iter().filter(|c| !c.is_empty()).collect();
    if query.is_empty() || stored.is_empty() {
        return 1.0;
    }
    let best = stored
        .iter()
        .map(|c| jaccard(query, c))
        .fold(0.0f64, f64::max);
    0.5 + 0.5 * best
}
