//! Resolver configuration loaded from `~/.config/sourcery/config.toml`.
//!
//! The config supplies the decryption key material (this crate consumes
//! a key but never manages its lifecycle) and optional backend
//! overrides. A missing file yields the defaults; the key secret can
//! also come from `SOURCERY_KEY_SECRET`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::resolve::{BackendConfig, QueryMode, SourceKey};

/// Default backend record used when the config file has no `[backend]`.
pub fn default_backend() -> BackendConfig {
    BackendConfig {
        name: "nsbx".to_string(),
        base_url: "https://api.nsbx.ru".to_string(),
        origin: "https://extension.works.again.with.nsbx".to_string(),
        query_mode: QueryMode::Get,
    }
}

/// Fully-loaded resolver configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub key: SourceKey,
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    key: KeySection,
    backend: Option<BackendSection>,
}

#[derive(Debug, Deserialize, Default)]
struct KeySection {
    #[serde(default)]
    secret: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct BackendSection {
    name: String,
    base_url: String,
    origin: String,
    /// Present when the backend requires sealed POST queries.
    app_key: Option<String>,
}

/// Load configuration, falling back to defaults when the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load() -> Result<AppConfig> {
    let path = config_path();
    let file = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))?
    } else {
        ConfigFile::default()
    };

    Ok(resolve_config(file))
}

fn resolve_config(file: ConfigFile) -> AppConfig {
    let secret = std::env::var("SOURCERY_KEY_SECRET").unwrap_or(file.key.secret);

    let backend = match file.backend {
        Some(section) => BackendConfig {
            name: section.name,
            base_url: section.base_url,
            origin: section.origin,
            query_mode: match section.app_key {
                Some(app_key) => QueryMode::SealedForm { app_key },
                None => QueryMode::Get,
            },
        },
        None => default_backend(),
    };

    AppConfig {
        key: SourceKey {
            secret,
            id: file.key.id,
            version: file.key.version,
        },
        backend,
    }
}

/// Return the path to the config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sourcery")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();
        let config = resolve_config(file);
        assert_eq!(config.backend.name, "nsbx");
        assert!(matches!(config.backend.query_mode, QueryMode::Get));
    }

    #[test]
    fn key_section_parses() {
        let file: ConfigFile = toml::from_str(
            r#"
[key]
secret = "s3cret"
id = "kid"
version = "2"
"#,
        )
        .unwrap();
        let config = resolve_config(file);
        assert_eq!(config.key.id, "kid");
        assert_eq!(config.key.version, "2");
    }

    #[test]
    fn backend_with_app_key_enables_sealed_queries() {
        let file: ConfigFile = toml::from_str(
            r#"
[backend]
name = "superstream"
base_url = "https://api.example"
origin = "https://example"
app_key = "movieboxpro"
"#,
        )
        .unwrap();
        let config = resolve_config(file);
        assert_eq!(config.backend.name, "superstream");
        assert!(matches!(
            config.backend.query_mode,
            QueryMode::SealedForm { .. }
        ));
    }
}
