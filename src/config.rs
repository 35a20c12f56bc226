//! Configuration for termpal.
//!
//! The configuration file is located at `~/.termpal/config.toml`:
//!
//! ```toml
//! # Terminal type (optional, defaults to $TERM)
//! term = "xterm-256color"
//!
//! # Override the terminal's color count (optional)
//! max_colors = 16
//!
//! # Set to false to never emit color sequences
//! colors = true
//!
//! # Log level: error, warn, info, debug, trace
//! log_level = "info"
//!
//! [capabilities.strings]
//! bel = ""            # empty string removes a capability
//! kbs = "\u0008"
//!
//! [capabilities.numbers]
//! cols = 132
//!
//! [capabilities.extended]
//! kUP5 = "\u001b[1;5A"
//! ```
//!
//! A missing or unparsable file yields the defaults.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::terminfo::TermDescription;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Terminal type; `$TERM` when unset
    pub term: Option<String>,
    /// Replaces the description's `colors` number
    pub max_colors: Option<i32>,
    /// Color emission switch
    pub colors: bool,
    pub log_level: String,
    /// Per-capability overrides
    pub capabilities: CapabilityOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            term: None,
            max_colors: None,
            colors: true,
            log_level: "info".to_string(),
            capabilities: CapabilityOverrides::default(),
        }
    }
}

/// Capability values layered over the built-in description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityOverrides {
    pub strings: BTreeMap<String, String>,
    pub numbers: BTreeMap<String, i32>,
    pub extended: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match Self::from_toml(&content) {
                    Some(config) => return config,
                    None => tracing::warn!("Ignoring unparsable {}", path.display()),
                }
            }
        }
        Self::default()
    }

    pub fn from_toml(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    /// Save configuration to file
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Get config file path
    pub fn config_path() -> Option<PathBuf> {
        let dir = data_dir()?;
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }

    /// Log file path, falling back to the working directory
    pub fn log_path() -> PathBuf {
        data_dir()
            .map(|dir| dir.join("termpal.log"))
            .unwrap_or_else(|| PathBuf::from("termpal.log"))
    }

    /// Configured terminal type, else `$TERM`, else `dumb`
    pub fn term_name(&self) -> String {
        self.term
            .clone()
            .or_else(|| std::env::var("TERM").ok())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "dumb".to_string())
    }

    /// Terminal description with every configured override applied
    pub fn describe_terminal(&self) -> TermDescription {
        let mut desc = TermDescription::for_term(&self.term_name());

        if let Some(colors) = self.max_colors {
            desc.set_number("colors", colors);
        }
        if !self.colors {
            for name in ["setaf", "setab", "op", "oc"] {
                desc.set_string(name, "");
            }
        }

        let overrides = &self.capabilities;
        for (name, value) in &overrides.strings {
            desc.set_string(name, value);
        }
        for (name, value) in &overrides.numbers {
            desc.set_number(name, *value);
        }
        for (name, value) in &overrides.extended {
            desc.set_extended(name, value);
        }
        desc
    }
}

fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".termpal"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
