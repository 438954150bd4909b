//! Subcommand implementations and the state they share.

pub mod admin;
pub mod estimate;
pub mod export;
pub mod format;
pub mod import;
pub mod leaderboard;
pub mod projects;
pub mod record;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;

use cyclescan_core::CycleScanConfig;
use cyclescan_estimator::Engine;
use cyclescan_state::StateStore;

const DEFAULT_CONFIG_FILE: &str = "cyclescan.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Everything a command needs, resolved once at startup.
pub struct Context {
    pub config: CycleScanConfig,
    pub store: StateStore,
    pub format: OutputFormat,
    /// Fixed for the whole command so every window sees the same instant.
    pub now_ms: u64,
}

impl Context {
    pub fn open(
        config_path: Option<&Path>,
        data_dir: Option<&Path>,
        format: OutputFormat,
        now_ms: Option<u64>,
    ) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        let store_path = store_path(&config, data_dir);
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = StateStore::open(&store_path)
            .with_context(|| format!("opening store at {}", store_path.display()))?;
        let now_ms = match now_ms {
            Some(now) => now,
            None => u64::try_from(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis())?,
        };
        debug!(path = %store_path.display(), now_ms, "context ready");
        Ok(Self {
            config,
            store,
            format,
            now_ms,
        })
    }

    pub fn engine(&self) -> anyhow::Result<Engine<StateStore>> {
        Ok(Engine::from_config(self.store.clone(), &self.config)?)
    }

    /// Print `value` as pretty JSON, or `text()` otherwise.
    pub fn emit<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => print!("{}", text()),
        }
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CycleScanConfig> {
    match path {
        Some(path) => CycleScanConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            CycleScanConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
        }
        None => Ok(CycleScanConfig::default()),
    }
}

fn store_path(config: &CycleScanConfig, data_dir: Option<&Path>) -> PathBuf {
    let configured = &config.store.path;
    match data_dir {
        Some(dir) => dir.join(configured.file_name().unwrap_or(configured.as_os_str())),
        None => configured.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_keeps_configured_file_name() {
        let mut config = CycleScanConfig::default();
        config.store.path = PathBuf::from("/var/lib/cyclescan/history.redb");
        assert_eq!(
            store_path(&config, Some(Path::new("/tmp/x"))),
            PathBuf::from("/tmp/x/history.redb")
        );
        assert_eq!(
            store_path(&config, None),
            PathBuf::from("/var/lib/cyclescan/history.redb")
        );
    }

    #[test]
    fn open_creates_store_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state");
        let ctx = Context::open(None, Some(&nested), OutputFormat::Json, Some(42)).unwrap();
        assert_eq!(ctx.now_ms, 42);
        assert!(nested.join("cyclescan.redb").exists());
        assert!(ctx.engine().is_ok());
    }
}
