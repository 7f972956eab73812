//! SQL dialects and placeholder translation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::{Error, Result};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// SQLite: positional `?` placeholders.
    Sqlite,
    /// PostgreSQL: numbered `$n` placeholders.
    Postgres,
}

impl SqlDialect {
    /// Derive the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or("").to_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(SqlDialect::Sqlite),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            _ => Err(Error::Config(format!(
                "unsupported database URL scheme: {scheme:?}"
            ))),
        }
    }

    /// Dialect name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::Postgres => "postgres",
        }
    }

    /// Column type for binary chunk data.
    pub fn blob_type(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "BLOB",
            SqlDialect::Postgres => "BYTEA",
        }
    }

    /// Rewrite `?` placeholders for this dialect.
    ///
    /// Question marks inside single-quoted literals are left alone.
    pub fn rewrite(&self, sql: &str) -> String {
        match self {
            SqlDialect::Sqlite => sql.to_string(),
            SqlDialect::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut index = 0;
                let mut in_literal = false;
                for c in sql.chars() {
                    match c {
                        '\'' => {
                            in_literal = !in_literal;
                            out.push(c);
                        }
                        '?' if !in_literal => {
                            index += 1;
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        _ => out.push(c),
                    }
                }
                out
            }
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache of rewritten query text, one map per dialect keyed by source text.
///
/// Reads share the lock; a miss takes the write lock once to insert.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<SqlDialect, HashMap<String, String>>>,
}

impl QueryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Query text for `dialect`, rewriting and caching it on first use.
    pub fn get(&self, dialect: SqlDialect, sql: &str) -> String {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = entries.get(&dialect).and_then(|queries| queries.get(sql)) {
                return cached.clone();
            }
        }

        let rewritten = dialect.rewrite(sql);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(dialect)
            .or_default()
            .entry(sql.to_string())
            .or_insert(rewritten)
            .clone()
    }

    /// Number of cached entries across all dialects.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_from_url() {
        assert_eq!(
            SqlDialect::from_url("sqlite://data/x.db?mode=rwc").unwrap(),
            SqlDialect::Sqlite
        );
        assert_eq!(
            SqlDialect::from_url("sqlite::memory:").unwrap(),
            SqlDialect::Sqlite
        );
        assert_eq!(
            SqlDialect::from_url("postgres://u:p@localhost/db").unwrap(),
            SqlDialect::Postgres
        );
        assert_eq!(
            SqlDialect::from_url("postgresql://localhost/db").unwrap(),
            SqlDialect::Postgres
        );
        assert!(SqlDialect::from_url("mysql://localhost/db").is_err());
    }

    #[test]
    fn test_rewrite_postgres() {
        let sql = "SELECT * FROM metadata WHERE file_id = ? AND chunk > ? LIMIT ?";
        assert_eq!(
            SqlDialect::Postgres.rewrite(sql),
            "SELECT * FROM metadata WHERE file_id = $1 AND chunk > $2 LIMIT $3"
        );
    }

    #[test]
    fn test_rewrite_skips_literals() {
        let sql = "SELECT '?' AS q FROM t WHERE a = ?";
        assert_eq!(
            SqlDialect::Postgres.rewrite(sql),
            "SELECT '?' AS q FROM t WHERE a = $1"
        );
    }

    #[test]
    fn test_rewrite_sqlite_is_identity() {
        let sql = "DELETE FROM file_chunks WHERE file_id = ?";
        assert_eq!(SqlDialect::Sqlite.rewrite(sql), sql);
    }

    #[test]
    fn test_cache_keys_by_dialect() {
        let cache = QueryCache::new();
        assert!(cache.is_empty());

        let sql = "SELECT 1 WHERE x = ?";
        assert_eq!(cache.get(SqlDialect::Postgres, sql), "SELECT 1 WHERE x = $1");
        assert_eq!(cache.get(SqlDialect::Postgres, sql), "SELECT 1 WHERE x = $1");
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.get(SqlDialect::Sqlite, sql), sql);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_hit_does_not_grow() {
        let cache = QueryCache::new();
        let a = "SELECT a FROM t WHERE x = ?";
        let b = "SELECT b FROM t WHERE x = ? AND y = ?";

        cache.get(SqlDialect::Postgres, a);
        cache.get(SqlDialect::Postgres, b);
        for _ in 0..10 {
            assert_eq!(cache.get(SqlDialect::Postgres, a), "SELECT a FROM t WHERE x = $1");
            assert_eq!(
                cache.get(SqlDialect::Postgres, b),
                "SELECT b FROM t WHERE x = $1 AND y = $2"
            );
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_concurrent_access() {
        let cache = Arc::new(QueryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let sql = format!("SELECT {} WHERE a = ? AND b = ?", (i + j) % 5);
                        let out = cache.get(SqlDialect::Postgres, &sql);
                        assert!(out.ends_with("a = $1 AND b = $2"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 5);
    }
}
