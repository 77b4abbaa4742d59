use std::fmt;
use std::hash::{Hash, Hasher};
use crate::core::{Value, PRIMARY_KEY};
use crate::statement::Filter;

/// Cache address of one filter set within a table.
///
/// Fields are sorted by name, so two filters holding the same pairs in any
/// insertion order produce the same key. The rendered digest encodes the pairs
/// as JSON, which keeps field boundaries and value types distinct: `a = "1"`
/// and `a = 1` never collide, nor do two fields whose concatenation happens
/// to spell a third. Equality and hashing follow the digest, so keys that
/// compare equal always address the same entry.
#[derive(Debug, Clone)]
pub struct CacheKey {
    table: String,
    fields: Vec<(String, Value)>,
}

impl CacheKey {
    pub fn new(table: impl Into<String>, filter: &Filter) -> Self {
        let mut fields: Vec<(String, Value)> = filter
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            table: table.into(),
            fields,
        }
    }

    /// Key of the row with primary key `id`.
    pub fn for_id(table: impl Into<String>, id: i64) -> Self {
        Self::new(table, &Filter::new().eq(PRIMARY_KEY, id))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn digest(&self) -> String {
        let encoded = serde_json::to_string(&self.fields)
            .unwrap_or_else(|_| format!("{:?}", self.fields));
        format!("{}:{}", self.table, encoded)
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.digest() == other.digest()
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest().hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_ignores_insertion_order() {
        let a = Filter::new().eq("username", "alice").eq("is_hidden", 0);
        let b = Filter::new().eq("is_hidden", 0).eq("username", "alice");

        assert_eq!(CacheKey::new("users", &a), CacheKey::new("users", &b));
        assert_eq!(
            CacheKey::new("users", &a).digest(),
            CacheKey::new("users", &b).digest()
        );
    }

    #[test]
    fn test_digest_is_scoped_by_table() {
        assert_ne!(
            CacheKey::for_id("users", 1).digest(),
            CacheKey::for_id("posts", 1).digest()
        );
    }

    #[test]
    fn test_digest_distinguishes_value_types() {
        let text = CacheKey::new("t", &Filter::new().eq("a", "1"));
        let int = CacheKey::new("t", &Filter::new().eq("a", 1));
        assert_ne!(text.digest(), int.digest());
    }

    #[test]
    fn test_digest_keeps_field_boundaries() {
        // Plain concatenation would render both as "a1b2"
        let split = CacheKey::new("t", &Filter::new().eq("a", "1b2"));
        let joined = CacheKey::new("t", &Filter::new().eq("a", "1").eq("b", "2"));
        assert_ne!(split.digest(), joined.digest());
    }

    #[test]
    fn test_equal_keys_share_a_digest() {
        use std::collections::HashSet;

        let int = CacheKey::new("t", &Filter::new().eq("a", 1));
        let float = CacheKey::new("t", &Filter::new().eq("a", 1.0));
        assert_ne!(int, float);
        assert_ne!(int.digest(), float.digest());

        let keys: HashSet<CacheKey> = [int.clone(), float, int].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_for_id_matches_filter_on_primary_key() {
        let by_filter = CacheKey::new("users", &Filter::new().eq("id", 5));
        assert_eq!(CacheKey::for_id("users", 5), by_filter);
        assert_eq!(CacheKey::for_id("users", 5).table(), "users");
    }
}
