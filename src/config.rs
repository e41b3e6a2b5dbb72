use serde::Deserialize;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use log::{error, info, LevelFilter};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::error::Error;

/// How often the config file's modification time is polled when
/// `watchconfig` is enabled.
pub const WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Process-wide settings handle.
///
/// Readers call `borrow()` whenever they need a value so a hot reload is
/// picked up on the next connection attempt.
pub type Settings = watch::Receiver<Arc<Config>>;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// Only the keys the connection core consumes are modelled here.
// Unknown keys (credentials, rooms, command settings) are ignored
// so a complete bot config file loads unchanged.
//
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Host name of the chat server
    pub server: String,

    /// Port of the chat server
    pub port: u16,

    /// Websocket sub-protocols offered during the handshake
    #[serde(default)]
    pub secprotocols: Vec<String>,

    /// Prefix that marks a chat line as a bot command
    ///
    /// Must contain at least one non-alphanumeric character,
    /// see `validate`.
    pub commandcharacter: String,

    /// Log verbosity, 0 (everything) to 5 (errors only)
    #[serde(default = "default_debuglevel")]
    pub debuglevel: u8,

    /// Reload this file when it changes on disk
    #[serde(default)]
    pub watchconfig: bool,
}

fn default_debuglevel() -> u8 {
    2
}

impl Config {
    /// Parses a configuration document.
    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let cfg = serde_json::from_str(data)?;
        Ok(cfg)
    }

    /// Checks the command character.
    ///
    /// A prefix made only of letters, digits and spaces would turn
    /// ordinary chat into commands, so at least one other character
    /// is required.
    pub fn validate(&self) -> Result<(), Error> {
        let valid = self
            .commandcharacter
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != ' ');

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidConfig(
                "invalid command character; should at least contain one non-alphanumeric character"
                    .to_string(),
            ))
        }
    }

    /// Maps `debuglevel` onto a log filter.
    ///
    /// 0 adds raw inbound frames (`recv`, trace), 1 and 2 show
    /// outbound envelopes (`send`) and commands (`cmdr`) at debug,
    /// 3 and 4 keep informational lines, anything above only shows
    /// errors.
    pub fn log_level(&self) -> LevelFilter {
        match self.debuglevel {
            0 => LevelFilter::Trace,
            1 | 2 => LevelFilter::Debug,
            3 | 4 => LevelFilter::Info,
            _ => LevelFilter::Error,
        }
    }
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Reads a JSON configuration file from disk and deserializes
// it into the strongly typed `Config` structure.
//
// Validation is left to the caller: a malformed file and an
// invalid command character are handled differently on reload.
//
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("{} doesn't exist or is unreadable", path.display()))?;
    Config::from_json(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

// ------------------------------------------------------------
// Hot reload
// ------------------------------------------------------------
//
// Polls the file's modification time and republishes the
// settings when it moves forward.
//
// - Read / parse errors keep the previous settings.
// - A command character that fails validation is fatal: the
//   error is returned and the process must stop.
//
// This future only resolves on a fatal error.
//
pub async fn watch_for_changes(path: PathBuf, settings: watch::Sender<Arc<Config>>) -> Result<(), Error> {
    let mut last_seen = modified_at(&path);
    let mut ticker = interval(WATCH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let current = modified_at(&path);
        if current <= last_seen {
            continue;
        }
        last_seen = current;

        let config = match load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("could not reload {}: {:#}", path.display(), e);
                continue;
            }
        };

        if let Err(e) = config.validate() {
            error!("{}", e);
            return Err(e);
        }

        if std::env::var_os("RUST_LOG").is_none() {
            log::set_max_level(config.log_level());
        }

        settings.send_replace(Arc::new(config));
        info!("reloaded {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "server": "sim.psim.us",
        "port": 8000,
        "secprotocols": [],
        "commandcharacter": ".",
        "nick": "ignored",
        "rooms": ["lobby"]
    }"#;

    #[test]
    fn parses_and_ignores_unknown_keys() {
        let cfg = Config::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.server, "sim.psim.us");
        assert_eq!(cfg.port, 8000);
        assert!(cfg.secprotocols.is_empty());
        assert_eq!(cfg.debuglevel, 2);
        assert!(!cfg.watchconfig);
    }

    #[test]
    fn missing_server_is_a_parse_error() {
        assert!(Config::from_json(r#"{"port": 8000, "commandcharacter": "."}"#).is_err());
    }

    #[test]
    fn command_character_needs_a_symbol() {
        let mut cfg = Config::from_json(SAMPLE).unwrap();
        for ok in [".", "!", "bot.", "~~"] {
            cfg.commandcharacter = ok.to_string();
            assert!(cfg.validate().is_ok(), "{ok:?} should be accepted");
        }
        for bad in ["", "a", "Z9", "  ", "ab c"] {
            cfg.commandcharacter = bad.to_string();
            assert!(
                matches!(cfg.validate(), Err(Error::InvalidConfig(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn debuglevel_maps_to_filter() {
        let mut cfg = Config::from_json(SAMPLE).unwrap();
        let expected = [
            (0, LevelFilter::Trace),
            (1, LevelFilter::Debug),
            (2, LevelFilter::Debug),
            (3, LevelFilter::Info),
            (4, LevelFilter::Info),
            (5, LevelFilter::Error),
            (9, LevelFilter::Error),
        ];
        for (level, filter) in expected {
            cfg.debuglevel = level;
            assert_eq!(cfg.log_level(), filter);
        }
    }

    fn write_config(path: &Path, commandcharacter: &str, mtime: SystemTime) {
        let body = format!(
            r#"{{"server": "localhost", "port": 8000, "commandcharacter": "{commandcharacter}"}}"#
        );
        std::fs::write(path, body).unwrap();
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("showdown-bot-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test(start_paused = true)]
    async fn reload_publishes_new_settings() {
        let path = scratch_path("reload");
        let old = SystemTime::now() - Duration::from_secs(120);
        write_config(&path, ".", old);

        let (tx, mut rx) = watch::channel(Arc::new(load(&path).unwrap()));
        let handle = tokio::spawn(watch_for_changes(path.clone(), tx));
        tokio::time::sleep(Duration::from_secs(1)).await;

        write_config(&path, "!", SystemTime::now());
        tokio::time::timeout(Duration::from_secs(30), rx.changed())
            .await
            .expect("reload within a few polls")
            .unwrap();
        assert_eq!(rx.borrow().commandcharacter, "!");

        handle.abort();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_with_invalid_command_character_is_fatal() {
        let path = scratch_path("fatal");
        let old = SystemTime::now() - Duration::from_secs(120);
        write_config(&path, ".", old);

        let (tx, _rx) = watch::channel(Arc::new(load(&path).unwrap()));
        let handle = tokio::spawn(watch_for_changes(path.clone(), tx));
        tokio::time::sleep(Duration::from_secs(1)).await;

        write_config(&path, "abc", SystemTime::now());
        let result = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("watcher should stop")
            .unwrap();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load(Path::new("/nonexistent/showdown-bot/config.json")).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }
}
