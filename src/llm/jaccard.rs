//! Jaccard similarity over top-feature name sets, used to gate re-dispatch
//! while an anomaly event stays open (§4.F).

use std::collections::HashSet;

/// |A ∩ B| / |A ∪ B|; two empty sets are defined as fully similar (1.0) so
/// "no features yet" never spuriously triggers a re-dispatch.
pub fn similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Whether the feature set has changed enough to justify a re-dispatch.
///
/// Fires when similarity to the last-dispatched set drops *below*
/// `threshold` (strict): with the default `threshold = 1.0` this means
/// "any change at all" re-dispatches, since an unchanged set has
/// similarity exactly 1.0 and is excluded. A non-strict `<=` would make
/// the default threshold fire even with no change, which contradicts
/// §4.F's "default 1.0 — i.e., any change" framing.
pub fn has_changed_enough(last: &[String], current: &[String], threshold: f64) -> bool {
    similarity(last, current) < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sets_have_similarity_one() {
        let a = vec!["a".to_string(), "b".to_string()];
        assert_eq!(similarity(&a, &a), 1.0);
    }

    #[test]
    fn disjoint_sets_have_similarity_zero() {
        let a = vec!["a".to_string()];
        let b = vec!["b".to_string()];
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn partial_overlap_is_fractional() {
        let a = vec!["a".to_string(), "b".to_string()];
        let b = vec!["b".to_string(), "c".to_string()];
        assert_eq!(similarity(&a, &b), 1.0 / 3.0);
    }

    #[test]
    fn both_empty_is_fully_similar() {
        assert_eq!(similarity(&[], &[]), 1.0);
    }

    #[test]
    fn default_threshold_any_change_triggers_redispatch() {
        let a = vec!["a".to_string(), "b".to_string()];
        let b = vec!["a".to_string(), "c".to_string()];
        assert!(has_changed_enough(&a, &b, 1.0));
        assert!(!has_changed_enough(&a, &a, 0.99));
    }
}
