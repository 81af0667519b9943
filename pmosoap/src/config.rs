//! # Configuration pmosoap
//!
//! La configuration est construite en couches :
//! 1. la configuration par défaut intégrée (`pmosoap.yaml`),
//! 2. fusionnée avec un fichier YAML externe (chemin explicite ou variable
//!    d'environnement `PMOSOAP_CONFIG`),
//! 3. puis les variables `PMOSOAP_CONFIG__SECTION__KEY=value`.
//!
//! ```no_run
//! use pmosoap::config::SoapConfig;
//!
//! let config = SoapConfig::load(None)?;
//! println!("server bind: {}", config.server.bind);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::{env, fs, path::Path};
use tracing::info;

use crate::client::BasicAuth;
use crate::soap::SoapVersion;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmosoap.yaml");

const ENV_CONFIG_FILE: &str = "PMOSOAP_CONFIG";
const ENV_PREFIX: &str = "PMOSOAP_CONFIG__";

#[derive(Debug, Clone, Deserialize)]
pub struct SoapConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub url: String,
    #[serde(default)]
    pub version: SoapVersion,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub auth: Option<BasicAuth>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default)]
    pub version: SoapVersion,
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub min_level: String,
    pub enable_console: bool,
}

impl SoapConfig {
    /// Charge la configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Fichier YAML externe ; à défaut `PMOSOAP_CONFIG`, sinon la
    ///   configuration intégrée seule
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let external = match path {
            Some(p) => Some(p.to_path_buf()),
            None => env::var(ENV_CONFIG_FILE).ok().map(Into::into),
        };

        if let Some(file) = external {
            let data = fs::read(&file)
                .with_context(|| format!("cannot read config file {}", file.display()))?;
            info!(config_file = %file.display(), "Loaded config file");
            let external_value: Value = serde_yaml::from_slice(&data)?;
            overlay(&mut value, external_value);
        } else {
            info!("Config file not set, using default embedded config");
        }

        apply_env_overrides(&mut value, env::vars());

        Self::from_value(value)
    }

    /// Construit la configuration à partir d'un document YAML complet ou
    /// partiel, fusionné avec les valeurs par défaut.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        overlay(&mut value, external);
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        serde_yaml::from_value(value).map_err(|e| anyhow!("invalid pmosoap configuration: {}", e))
    }
}

impl Default for SoapConfig {
    fn default() -> Self {
        // La configuration intégrée est validée par les tests
        serde_yaml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| SoapConfig {
            client: ClientConfig {
                url: "http://127.0.0.1:8080/".to_string(),
                version: SoapVersion::V11,
                user_agent: None,
                timeout_secs: Some(30),
                auth: None,
            },
            server: ServerConfig {
                bind: "0.0.0.0:8080".to_string(),
                version: SoapVersion::V11,
                max_body_size: 10 * 1024 * 1024,
            },
            log: LogConfig {
                min_level: "INFO".to_string(),
                enable_console: true,
            },
        })
    }
}

fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(path) = key.strip_prefix(ENV_PREFIX) {
            let key_path = path.split("__").collect::<Vec<_>>();
            let yaml_value = convert_env_value(&value);
            let _ = set_value_internal(config, &key_path, yaml_value);
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
        return parsed;
    }
    Value::String(value.to_string())
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

/// Superpose `layer` sur `base`, en ramenant les clés du calque en
/// minuscules. Les mappings sont fusionnés récursivement ; toute autre valeur
/// du calque remplace celle de la base.
fn overlay(base: &mut Value, layer: Value) {
    match layer {
        Value::Mapping(layer) => {
            if !base.is_mapping() {
                *base = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(target) = base {
                for (key, value) in layer {
                    let key = lowercase_key(key);
                    match target.get_mut(&key) {
                        Some(existing) => overlay(existing, value),
                        None => {
                            let mut fresh = Value::Null;
                            overlay(&mut fresh, value);
                            target.insert(key, fresh);
                        }
                    }
                }
            }
        }
        Value::Sequence(items) => {
            *base = Value::Sequence(
                items
                    .into_iter()
                    .map(|item| {
                        let mut fresh = Value::Null;
                        overlay(&mut fresh, item);
                        fresh
                    })
                    .collect(),
            );
        }
        other => *base = other,
    }
}

fn lowercase_key(key: Value) -> Value {
    match key {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SoapConfig::from_yaml("{}").unwrap();
        assert_eq!(config.client.version, SoapVersion::V11);
        assert_eq!(config.client.timeout_secs, Some(30));
        assert!(config.client.auth.is_none());
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.max_body_size, 10485760);
        assert_eq!(config.log.min_level, "INFO");
    }

    #[test]
    fn test_merge_external() {
        let config = SoapConfig::from_yaml(
            r#"
Client:
  URL: "http://soap.example.org/service"
  version: "1.2"
  auth:
    login: test
    password: secret
server:
  version: "1.2"
"#,
        )
        .unwrap();

        assert_eq!(config.client.url, "http://soap.example.org/service");
        assert_eq!(config.client.version, SoapVersion::V12);
        assert_eq!(
            config.client.auth,
            Some(BasicAuth::new("test", "secret"))
        );
        assert_eq!(config.server.version, SoapVersion::V12);
        // non surchargé
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides() {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let vars = vec![
            ("PMOSOAP_CONFIG__SERVER__BIND".to_string(), "127.0.0.1:9000".to_string()),
            ("PMOSOAP_CONFIG__CLIENT__TIMEOUT_SECS".to_string(), "5".to_string()),
            ("OTHER_VAR".to_string(), "ignored".to_string()),
        ];
        apply_env_overrides(&mut value, vars.into_iter());

        let config = SoapConfig::from_value(value).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.client.timeout_secs, Some(5));
    }

    #[test]
    fn test_overlay_lowercases_nested_keys() {
        let mut base: Value =
            serde_yaml::from_str("server:\n  bind: a\n  version: \"1.1\"\n").unwrap();
        let layer: Value =
            serde_yaml::from_str("Server:\n  BIND: b\n  Extra:\n    - Key: v\n").unwrap();
        overlay(&mut base, layer);

        let expected: Value = serde_yaml::from_str(
            "server:\n  bind: b\n  version: \"1.1\"\n  extra:\n    - key: v\n",
        )
        .unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_invalid_version() {
        let err = SoapConfig::from_yaml("client:\n  version: \"2.0\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid pmosoap configuration"));
    }

    #[test]
    fn test_embedded_default_is_valid() {
        let _: SoapConfig = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
    }
}
