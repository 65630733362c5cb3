//! Config file discovery and environment overrides.
//!
//! Lookup order, first existing file wins:
//! 1. an explicit path (`--config`), which must exist
//! 2. `<project>/.ticketrank.yaml`
//! 3. `<user config dir>/ticketrank/config.yaml`
//!
//! Environment overrides are applied on top of whatever was loaded.

use std::path::{Path, PathBuf};

use crate::config::schema::{DegradePolicy, EmbedderKind, TicketRankConfig};
use crate::error::{Result, TicketRankError};

pub const PROJECT_CONFIG_FILE: &str = ".ticketrank.yaml";

pub const ENV_DB: &str = "TICKETRANK_DB";
pub const ENV_EMBEDDER: &str = "TICKETRANK_EMBEDDER";
pub const ENV_DEGRADE: &str = "TICKETRANK_DEGRADE";
pub const ENV_FRESHDESK_DOMAIN: &str = "FRESHDESK_DOMAIN";

/// `<user config dir>/ticketrank/config.yaml`, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ticketrank")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

/// First config file that exists, in lookup order.
pub fn find_config_file(explicit: Option<&Path>, project_root: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(TicketRankError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let project = project_root.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Ok(Some(project));
    }

    Ok(user_config_path().filter(|p| p.is_file()))
}

/// Parse one YAML config file. An empty file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<TicketRankConfig> {
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(TicketRankConfig::default());
    }
    Ok(serde_yaml::from_str(&raw)?)
}

/// Apply overrides from a variable lookup (normally `std::env::var`).
///
/// Unparseable values are rejected rather than silently ignored.
pub fn apply_env_overrides<F>(config: &mut TicketRankConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(path) = non_empty(ENV_DB) {
        config.database.path = path;
    }
    if let Some(raw) = non_empty(ENV_EMBEDDER) {
        config.embedding.provider = EmbedderKind::from_str_loose(&raw).ok_or_else(|| {
            TicketRankError::Config(format!("{ENV_EMBEDDER}: unknown embedder '{raw}'"))
        })?;
    }
    if let Some(raw) = non_empty(ENV_DEGRADE) {
        config.boundary.degrade = DegradePolicy::from_str_loose(&raw).ok_or_else(|| {
            TicketRankError::Config(format!("{ENV_DEGRADE}: unknown degrade policy '{raw}'"))
        })?;
    }
    if let Some(domain) = non_empty(ENV_FRESHDESK_DOMAIN) {
        config.helpdesk.domain = Some(domain.trim_end_matches('/').to_string());
    }
    Ok(())
}

/// Load, override from the process environment, and validate.
pub fn load_config(explicit: Option<&Path>, project_root: &Path) -> Result<TicketRankConfig> {
    let mut config = match find_config_file(explicit, project_root)? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            load_config_file(&path)?
        }
        None => TicketRankConfig::default(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate().map_err(TicketRankError::Config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.yaml");
        let err = find_config_file(Some(&missing), tmp.path()).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_beats_project_file() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("custom.yaml");
        std::fs::write(&explicit, "database:\n  path: explicit.db\n").unwrap();
        std::fs::write(tmp.path().join(PROJECT_CONFIG_FILE), "database:\n  path: project.db\n")
            .unwrap();

        let found = find_config_file(Some(&explicit), tmp.path()).unwrap();
        assert_eq!(found.as_deref(), Some(explicit.as_path()));
        let config = load_config(Some(&explicit), tmp.path()).unwrap();
        // TICKETRANK_DB is not set by the test harness.
        if std::env::var(ENV_DB).is_err() {
            assert_eq!(config.database.path, "explicit.db");
        }
    }

    #[test]
    fn project_file_is_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROJECT_CONFIG_FILE), "search:\n  result_limit: 3\n")
            .unwrap();
        let found = find_config_file(None, tmp.path()).unwrap().unwrap();
        assert!(found.ends_with(PROJECT_CONFIG_FILE));
        let config = load_config_file(&found).unwrap();
        assert_eq!(config.search.result_limit, 3);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(load_config_file(&path).unwrap(), TicketRankConfig::default());
    }

    #[test]
    fn malformed_file_is_a_yaml_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.yaml");
        std::fs::write(&path, "search: [unclosed").unwrap();
        assert!(matches!(
            load_config_file(&path).unwrap_err(),
            TicketRankError::Yaml(_)
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            (ENV_DB, "/tmp/override.db"),
            (ENV_EMBEDDER, "hash"),
            (ENV_DEGRADE, "best-effort"),
            (ENV_FRESHDESK_DOMAIN, "https://acme.freshdesk.com/"),
        ]);
        let mut config = TicketRankConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).cloned()).unwrap();
        assert_eq!(config.database.path, "/tmp/override.db");
        assert_eq!(config.embedding.provider, EmbedderKind::Hash);
        assert_eq!(config.boundary.degrade, DegradePolicy::BestEffort);
        assert_eq!(
            config.helpdesk.domain.as_deref(),
            Some("https://acme.freshdesk.com")
        );
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let env = vars(&[(ENV_DB, "  "), (ENV_EMBEDDER, "")]);
        let mut config = TicketRankConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).cloned()).unwrap();
        assert_eq!(config, TicketRankConfig::default());
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let env = vars(&[(ENV_EMBEDDER, "word2vec")]);
        let mut config = TicketRankConfig::default();
        let err = apply_env_overrides(&mut config, |k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(ENV_EMBEDDER));
    }
}
