use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ledgerline_import::{CategoryRuleEngine, OfxImporter};
use serde::Deserialize;

/// Path of an optional TOML file; the other variables override single keys.
pub const CONFIG_ENV: &str = "LEDGERLINE_CONFIG";
pub const HOST_ENV: &str = "LEDGERLINE_HOST";
pub const PORT_ENV: &str = "LEDGERLINE_PORT";
pub const MAX_UPLOAD_ENV: &str = "LEDGERLINE_MAX_UPLOAD_BYTES";
pub const RULES_ENV: &str = "LEDGERLINE_RULES";

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub rules_path: Option<PathBuf>,
    pub log_format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            rules_path: None,
            log_format: LogFormat::Pretty,
            log_filter: "info,tower_http=debug".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` to look up variables.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match env(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(env)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = env(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = env(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port:?}"))?;
        }
        if let Some(limit) = env(MAX_UPLOAD_ENV) {
            self.max_upload_bytes = limit
                .trim()
                .parse()
                .with_context(|| format!("{MAX_UPLOAD_ENV} is not a byte count: {limit:?}"))?;
        }
        if let Some(rules) = env(RULES_ENV) {
            self.rules_path = Some(PathBuf::from(rules));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// Read category rules from `rules_path`, if one is configured.
    pub fn load_rules(&self) -> Result<Option<CategoryRuleEngine>> {
        let Some(path) = &self.rules_path else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading rules file {}", path.display()))?;
        let engine = CategoryRuleEngine::from_toml(&content)
            .with_context(|| format!("loading rules from {}", path.display()))?;
        tracing::info!(rules = engine.len(), path = %path.display(), "loaded category rules");
        Ok(Some(engine))
    }

    pub fn build_importer(&self) -> Result<OfxImporter> {
        let importer = OfxImporter::new();
        Ok(match self.load_rules()? {
            Some(rules) => importer.with_rules(rules),
            None => importer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ledgerline-{}-{name}", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::load_with(env_of(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn toml_fills_missing_keys_with_defaults() {
        let config = ServerConfig::from_toml("port = 9000\nlog_format = \"json\"\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ServerConfig::from_toml("prot = 1").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let path = temp_file("config.toml", "host = \"0.0.0.0\"\nport = 9000\n");
        let env = env_of(&[
            (CONFIG_ENV, path.to_str().unwrap()),
            (PORT_ENV, "7070"),
            (MAX_UPLOAD_ENV, "1024"),
            (RULES_ENV, "/tmp/rules.toml"),
        ]);
        let config = ServerConfig::load_with(env).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7070);
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.rules_path, Some(PathBuf::from("/tmp/rules.toml")));
    }

    #[test]
    fn bad_override_is_an_error() {
        assert!(ServerConfig::load_with(env_of(&[(PORT_ENV, "eighty")])).is_err());
        assert!(ServerConfig::load_with(env_of(&[(MAX_UPLOAD_ENV, "-1")])).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let env = env_of(&[(CONFIG_ENV, "/nonexistent/ledgerline.toml")]);
        assert!(ServerConfig::load_with(env).is_err());
    }

    #[test]
    fn rules_are_loaded_from_path() {
        let path = temp_file(
            "rules.toml",
            "[[rule]]\nname = \"Coffee\"\npattern = \"starbucks\"\ncategory_id = \"food:coffee\"\n",
        );
        let config = ServerConfig {
            rules_path: Some(path.clone()),
            ..ServerConfig::default()
        };
        let engine = config.load_rules().unwrap().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(engine.len(), 1);

        assert!(ServerConfig::default().load_rules().unwrap().is_none());
    }
}
