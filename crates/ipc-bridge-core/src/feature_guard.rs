//! Feature Guard: the per-connection set of accepted feature tags that gates
//! dispatch of optional requests.

use std::collections::BTreeSet;

/// Immutable snapshot of a connection's negotiated feature set, taken at
/// Welcome time and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGuard {
    accepted: BTreeSet<String>,
}

impl FeatureGuard {
    /// Build a guard from the `accepted_features` computed during handshake.
    #[must_use]
    pub fn new(accepted_features: impl IntoIterator<Item = String>) -> Self {
        Self { accepted: accepted_features.into_iter().collect() }
    }

    /// Whether `tag` was accepted. Unknown tags resolve to `false`.
    #[must_use]
    pub fn is_enabled(&self, tag: &str) -> bool {
        self.accepted.contains(tag)
    }
}

/// Compute `requested ∩ server_supported`, preserving the order of
/// `requested` and dropping duplicates and tags the server does not support.
#[must_use]
pub fn negotiate_features(requested: &[String], server_supported: &BTreeSet<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut accepted = Vec::new();
    for tag in requested {
        if server_supported.contains(tag) && seen.insert(tag.clone()) {
            accepted.push(tag.clone());
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn unknown_tag_resolves_to_false() {
        let guard = FeatureGuard::new(["health.basic".to_string()]);
        assert!(guard.is_enabled("health.basic"));
        assert!(!guard.is_enabled("assets.basic"));
    }

    #[test]
    fn negotiate_preserves_request_order() {
        let requested = vec!["diagnostics.basic".to_string(), "health.basic".to_string()];
        let accepted = negotiate_features(&requested, &supported(&["health.basic", "diagnostics.basic"]));
        assert_eq!(accepted, vec!["diagnostics.basic", "health.basic"]);
    }

    #[test]
    fn negotiate_drops_duplicates_and_unknowns() {
        let requested = vec![
            "health.basic".to_string(),
            "health.basic".to_string(),
            "unknown.tag".to_string(),
        ];
        let accepted = negotiate_features(&requested, &supported(&["health.basic", "diagnostics.basic"]));
        assert_eq!(accepted, vec!["health.basic"]);
    }

    #[test]
    fn negotiate_is_subset_of_both_sides() {
        let requested = vec!["health.basic".to_string(), "assets.basic".to_string()];
        let server = supported(&["health.basic", "diagnostics.basic"]);
        let accepted = negotiate_features(&requested, &server);
        assert!(accepted.iter().all(|t| requested.contains(t)));
        assert!(accepted.iter().all(|t| server.contains(t)));
    }
}
