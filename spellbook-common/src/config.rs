//! Configuration loading and root folder resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are handled by the binary's argument parser; this module
//! provides the TOML tier and the defaults.

use crate::moderation::ApprovalPolicy;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default bind address (loopback only)
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "spellbook.db";

/// Settings read from `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    /// Hex SHA-256 digest of the token that grants privileged access
    pub admin_token_sha256: Option<String>,
    pub approval_policy: Option<String>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Load the platform config file, or defaults when there is none
    ///
    /// A file that exists but cannot be parsed is an error: silently ignoring
    /// it could drop the admin token digest.
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) => {
                debug!("Loading config file {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn approval_policy(&self) -> Result<Option<ApprovalPolicy>> {
        self.approval_policy.as_deref().map(str::parse).transpose()
    }
}

/// Root folder resolution (CLI → ENV → TOML → default)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &toml_config.root_folder {
        return PathBuf::from(root_folder);
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Path of the catalog database inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// First existing config file for the platform
///
/// Linux checks `~/.config/spellbook/config.toml` then
/// `/etc/spellbook/config.toml`; other platforms use the user config dir.
fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("spellbook").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/spellbook/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("spellbook"),
        None => {
            warn!("Could not determine local data directory; using ./spellbook_data");
            PathBuf::from("./spellbook_data")
        }
    }
}
