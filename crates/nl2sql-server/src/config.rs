use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;

/// Service configuration loaded from `~/.config/nl2sql/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the key and encrypted connection artifacts.
    /// Defaults to the working directory.
    pub data_dir: Option<PathBuf>,
    /// Listen address; defaults to `0.0.0.0:$PORT`.
    pub bind: Option<String>,
    /// Chat-completions provider settings.
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

impl Config {
    /// Address to listen on: CLI override, then config, then `PORT`.
    pub fn listen_addr(&self, cli_bind: Option<String>, port_env: Option<String>) -> String {
        if let Some(bind) = cli_bind.or_else(|| self.bind.clone()) {
            return bind;
        }
        let port = port_env
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        format!("0.0.0.0:{port}")
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("nl2sql").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    let path = default_path()?;
    write_to_path_if_missing(config, &path)?;
    Ok(path)
}

/// Write `config` to `path`, leaving an existing file untouched.
pub fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/var/lib/nl2sql"
            bind = "127.0.0.1:8080"
            [llm]
            api_key = "secret"
            model = "llama-3.3-70b-versatile"
            endpoint = "https://api.groq.com/openai/v1"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                data_dir: Some(PathBuf::from("/var/lib/nl2sql")),
                bind: Some("127.0.0.1:8080".into()),
                llm: Some(LlmConfig {
                    api_key: Some("secret".into()),
                    model: Some("llama-3.3-70b-versatile".into()),
                    endpoint: Some("https://api.groq.com/openai/v1".into()),
                }),
            }
        );
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            data_dir: Some(PathBuf::from("/tmp/nl2sql-data")),
            bind: None,
            llm: None,
        };

        write_to_path_if_missing(&cfg, &path).expect("write should succeed");
        write_to_path_if_missing(&Config::default(), &path).expect("second write ok");

        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn listen_addr_precedence() {
        let cfg = Config {
            bind: Some("127.0.0.1:9000".into()),
            ..Config::default()
        };
        assert_eq!(
            cfg.listen_addr(Some("[::1]:7000".into()), Some("8000".into())),
            "[::1]:7000"
        );
        assert_eq!(cfg.listen_addr(None, Some("8000".into())), "127.0.0.1:9000");

        let cfg = Config::default();
        assert_eq!(cfg.listen_addr(None, Some("8000".into())), "0.0.0.0:8000");
        assert_eq!(cfg.listen_addr(None, Some("nope".into())), "0.0.0.0:5000");
        assert_eq!(cfg.listen_addr(None, None), "0.0.0.0:5000");
    }
}
