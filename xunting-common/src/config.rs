//! Configuration file and data folder resolution

use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "XUNTING_CONFIG";

/// Environment variable naming the data folder
pub const DATA_DIR_ENV_VAR: &str = "XUNTING_DATA_DIR";

/// File name of the persisted application state inside the data folder
pub const STATE_FILE_NAME: &str = "xunting_app_state_v1.json";

/// Config file resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. User config file (`<config_dir>/xunting/config.toml`) if it exists
///
/// Returns None when no config file applies; callers then run on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_file().filter(|p| p.exists())
}

/// Platform config file location, whether or not it exists
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("xunting").join("config.toml"))
}

/// Data folder resolution: environment variable, then the OS-dependent default
pub fn resolve_data_dir(env_var_name: &str) -> PathBuf {
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    default_data_dir()
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("xunting"))
            .unwrap_or_else(|| PathBuf::from("./xunting_data"))
    } else {
        // ~/.local/share/xunting on Linux, %LOCALAPPDATA%\xunting on Windows
        dirs::data_local_dir()
            .map(|d| d.join("xunting"))
            .unwrap_or_else(|| PathBuf::from("./xunting_data"))
    }
}

/// Default location of the persisted state file
pub fn default_state_file() -> PathBuf {
    resolve_data_dir(DATA_DIR_ENV_VAR).join(STATE_FILE_NAME)
}
