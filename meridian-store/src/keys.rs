//! Row key grammar.
//!
//! Three row families share a dataset partition, distinguished by key
//! prefix and kept in sort order by the store:
//!
//! - `cell!{level}!{path}!{featureId}` — spatial index rows
//! - `id!{featureId}` — canonical feature records
//! - `metadata!{dataset}` — the dataset's aggregate record

/// Key prefix for canonical feature records.
pub const FEATURE_KEY_PREFIX: &str = "id!";

/// Key prefix for dataset metadata records.
pub const METADATA_KEY_PREFIX: &str = "metadata!";

/// Row key for a feature record.
pub fn feature_key(feature_id: &str) -> String {
    format!("{}{}", FEATURE_KEY_PREFIX, feature_id)
}

/// Row key for a dataset's metadata record.
pub fn metadata_key(dataset: &str) -> String {
    format!("{}{}", METADATA_KEY_PREFIX, dataset)
}

/// Extract the feature id from a feature record key.
pub fn feature_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(FEATURE_KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_grammar() {
        assert_eq!(feature_key("abc"), "id!abc");
        assert_eq!(metadata_key("default"), "metadata!default");
        assert_eq!(feature_id_from_key("id!abc"), Some("abc"));
        assert_eq!(feature_id_from_key("cell!1!0!abc"), None);
    }
}
