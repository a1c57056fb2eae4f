//! Runtime settings resolved from flags and environment.
//!
//! Each setting takes the explicit flag first, then the environment, then a
//! built-in default.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use tally_core::store::StoreConfig;

/// Database location used when neither `--db` nor `TALLY_DB` is given.
pub const DEFAULT_DB_PATH: &str = ".tally/tally.db";

const DB_VAR: &str = "TALLY_DB";

/// Environment variables checked for the acting reviewer, in priority order.
const REVIEWER_VARS: &[&str] = &["TALLY_REVIEWER", "USER"];

#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreConfig,
    /// Acting user, if one could be resolved.
    pub reviewer: Option<String>,
    /// `false` selects the no-op cache.
    pub use_cache: bool,
}

/// Raw flag values the settings are built from.
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub db: Option<&'a Path>,
    pub reviewer: Option<&'a str>,
    pub busy_timeout_ms: Option<u64>,
    pub no_cache: bool,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn resolve(overrides: &Overrides<'_>) -> Self {
        Self::resolve_with(overrides, |var| env::var(var).ok())
    }

    /// Resolve against an arbitrary variable lookup.
    pub fn resolve_with(overrides: &Overrides<'_>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var_set = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let path = overrides
            .db
            .map(Path::to_path_buf)
            .or_else(|| var_set(DB_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let mut store = StoreConfig::new(path);
        if let Some(ms) = overrides.busy_timeout_ms {
            store = store.with_busy_timeout(Duration::from_millis(ms));
        }

        let reviewer = overrides
            .reviewer
            .map(String::from)
            .or_else(|| REVIEWER_VARS.iter().find_map(|var| var_set(*var)));

        Self {
            store,
            reviewer,
            use_cache: !overrides.no_cache,
        }
    }

    /// The acting reviewer, or an error explaining how to set one.
    pub fn require_reviewer(&self) -> Result<&str> {
        match self.reviewer.as_deref() {
            Some(reviewer) => Ok(reviewer),
            None => bail!("Reviewer identity required. Use --as <id> or set TALLY_REVIEWER."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve_with(&Overrides::default(), env_of(&[]));
        assert_eq!(settings.store.path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(settings.store.busy_timeout, Duration::from_secs(5));
        assert!(settings.use_cache);
        assert!(settings.reviewer.is_none());
        assert!(settings.require_reviewer().is_err());
    }

    #[test]
    fn test_env_fallbacks() {
        let settings = Settings::resolve_with(
            &Overrides::default(),
            env_of(&[("TALLY_DB", "/data/t.db"), ("USER", "alice"), ("TALLY_REVIEWER", "")]),
        );
        assert_eq!(settings.store.path, PathBuf::from("/data/t.db"));
        assert_eq!(settings.require_reviewer().unwrap(), "alice");

        let settings = Settings::resolve_with(
            &Overrides::default(),
            env_of(&[("USER", "alice"), ("TALLY_REVIEWER", "buyer-b")]),
        );
        assert_eq!(settings.reviewer.as_deref(), Some("buyer-b"));
    }

    #[test]
    fn test_flags_win() {
        let overrides = Overrides {
            db: Some(Path::new("local.db")),
            reviewer: Some("buyer-c"),
            busy_timeout_ms: Some(250),
            no_cache: true,
        };
        let settings = Settings::resolve_with(
            &overrides,
            env_of(&[("TALLY_DB", "/data/t.db"), ("TALLY_REVIEWER", "buyer-b")]),
        );
        assert_eq!(settings.store.path, PathBuf::from("local.db"));
        assert_eq!(settings.store.busy_timeout, Duration::from_millis(250));
        assert_eq!(settings.reviewer.as_deref(), Some("buyer-c"));
        assert!(!settings.use_cache);
    }
}
