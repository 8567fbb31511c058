use super::{format_keys, parse_path, Path};
use std::collections::HashMap;
use tracing::debug;

/// Interns paths by string.
///
/// Both the raw input and the canonical form of a parsed path map to one
/// shared [`Path`], so `"a . b"` and `"a.b"` resolve to the same instance.
/// Malformed input is not cached and resolves to the shared invalid path.
pub struct PathCache {
    paths: HashMap<String, Path>,
    invalid: Path,
}

impl Default for PathCache {
    fn default() -> Self {
        Self {
            paths: HashMap::new(),
            invalid: Path::invalid(),
        }
    }
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, text: &str) -> Path {
        if let Some(path) = self.paths.get(text) {
            return path.clone();
        }

        let keys = match parse_path(text) {
            Ok(keys) => keys,
            Err(error) => {
                debug!(path = text, %error, "malformed path");
                return self.invalid.clone();
            }
        };

        let canonical = format_keys(&keys);
        let path = self
            .paths
            .entry(canonical)
            .or_insert_with(|| Path::from_keys(keys))
            .clone();
        self.paths.insert(text.to_owned(), path.clone());
        path
    }

    pub fn invalid(&self) -> Path {
        self.invalid.clone()
    }

    /// Number of cached string forms.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_raw_and_canonical_forms() {
        let mut cache = PathCache::new();
        let a = cache.get("a.b");
        let b = cache.get("  a . b  ");
        let c = cache.get(r#"["a"]["b"]"#);
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&c));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn canonical_form_first_seen_through_alias() {
        let mut cache = PathCache::new();
        let a = cache.get("x [0]");
        let b = cache.get("x[0]");
        assert!(a.ptr_eq(&b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn malformed_paths_share_the_invalid_instance() {
        let mut cache = PathCache::new();
        let a = cache.get("a..b");
        let b = cache.get("[");
        assert!(!a.is_valid());
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&cache.invalid()));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_interned_instances() {
        let mut cache = PathCache::new();
        let a = cache.get("a");
        cache.clear();
        let b = cache.get("a");
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
    }
}
