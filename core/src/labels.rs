//! Label scheme used to identify and filter boxes managed by this control
//! plane, independent of which driver created them.

use std::collections::BTreeMap;

/// Default label key prefix.
pub const DEFAULT_PREFIX: &str = "dev.gbox";

/// The fixed set of labels every managed box carries, scoped under a
/// configurable prefix (default [`DEFAULT_PREFIX`]).
#[derive(Debug, Clone)]
pub struct ManagedLabels {
    pub prefix: String,
    pub name: String,
    pub id: String,
    pub version: String,
    pub component: String,
    pub managed_by: String,
    pub part_of: String,
}

impl ManagedLabels {
    pub fn new(prefix: &str, id: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            name: format!("{prefix}-{id}"),
            id: id.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            component: "box".to_string(),
            managed_by: prefix.to_string(),
            part_of: prefix.to_string(),
        }
    }

    /// Flatten into the key/value pairs a driver attaches to the
    /// underlying container or pod.
    pub fn as_pairs(&self) -> Vec<(String, String)> {
        vec![
            (format!("{}.name", self.prefix), self.name.clone()),
            (format!("{}.id", self.prefix), self.id.clone()),
            (format!("{}.version", self.prefix), self.version.clone()),
            (format!("{}.component", self.prefix), self.component.clone()),
            (format!("{}.managed-by", self.prefix), self.managed_by.clone()),
            (format!("{}.part-of", self.prefix), self.part_of.clone()),
        ]
    }

    /// The single label every `List` call filters on to find only boxes
    /// this control plane owns.
    pub fn managed_by_filter(prefix: &str) -> (String, String) {
        (format!("{prefix}.managed-by"), prefix.to_string())
    }

    /// Namespace a user-supplied label under `{prefix}.extra.{key}`.
    pub fn extra_key(prefix: &str, key: &str) -> String {
        format!("{prefix}.extra.{key}")
    }

    /// Merge user labels (namespaced) with the managed set into one map,
    /// the shape a driver's create call expects.
    pub fn merged_with(&self, user_labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = self.as_pairs().into_iter().collect();
        for (k, v) in user_labels {
            merged.insert(Self::extra_key(&self.prefix, k), v.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_cover_the_fixed_key_set() {
        let labels = ManagedLabels::new("dev.gbox", "abc-123");
        let pairs = labels.as_pairs();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&("dev.gbox.id".to_string(), "abc-123".to_string())));
    }

    #[test]
    fn extra_key_is_namespaced() {
        assert_eq!(
            ManagedLabels::extra_key("dev.gbox", "team"),
            "dev.gbox.extra.team"
        );
    }

    #[test]
    fn merged_with_keeps_managed_and_user_labels() {
        let labels = ManagedLabels::new("dev.gbox", "abc-123");
        let mut user = BTreeMap::new();
        user.insert("team".to_string(), "infra".to_string());

        let merged = labels.merged_with(&user);
        assert_eq!(merged.get("dev.gbox.extra.team"), Some(&"infra".to_string()));
        assert_eq!(merged.get("dev.gbox.id"), Some(&"abc-123".to_string()));
    }

    #[test]
    fn managed_by_filter_matches_prefix() {
        let (k, v) = ManagedLabels::managed_by_filter("dev.gbox");
        assert_eq!(k, "dev.gbox.managed-by");
        assert_eq!(v, "dev.gbox");
    }
}
