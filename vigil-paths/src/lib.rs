//! Filesystem locations for Vigil.
//!
//! The single source of truth for where the daemon keeps its configuration
//! and where its control and UI sockets live.
//!
//! | Platform | Config | Sockets |
//! |----------|--------|---------|
//! | Linux    | `~/.config/vigil` | `$XDG_RUNTIME_DIR` or data dir |
//! | macOS    | `~/Library/Application Support/vigil` | Same as data dir |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

const APP_NAME: &str = "vigil";

/// Control socket (line commands)
const IPC_SOCKET_NAME: &str = "vigil.sock";

/// UI event stream socket
const UI_SOCKET_NAME: &str = "vigil_ui.sock";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Create `dir` (and parents) owner-only if it does not exist yet.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(())
}

/// Application data directory, created 0o700 on first use.
///
/// - **Linux**: `~/.local/share/vigil`
/// - **macOS**: `~/Library/Application Support/vigil`
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or(PathError::NoDataDirectory)?
        .join(APP_NAME);
    ensure_private_dir(&data_dir)?;
    Ok(data_dir)
}

/// Directory holding the daemon's sockets.
///
/// Linux prefers `$XDG_RUNTIME_DIR` and falls back to the data directory.
pub fn get_socket_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            if runtime_dir.exists() {
                return Ok(runtime_dir);
            }
        }
    }

    get_data_dir()
}

pub fn get_ipc_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(IPC_SOCKET_NAME))
}

pub fn get_ui_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(UI_SOCKET_NAME))
}

/// Configuration directory.
///
/// - **Linux**: `~/.config/vigil`
/// - **other**: the data directory
pub fn get_config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_dir = dirs::config_dir()
            .ok_or(PathError::NoConfigDirectory)?
            .join(APP_NAME);
        ensure_private_dir(&config_dir)?;
        Ok(config_dir)
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Default location of `config.toml`
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Restrict a socket to its owner (0o600). No-op when the path is missing.
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        fs::set_permissions(socket_path, fs::Permissions::from_mode(0o600)).with_context(|| {
            format!("Failed to set socket permissions: {}", socket_path.display())
        })?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_names() {
        let ipc = get_ipc_socket_path().unwrap();
        let ui = get_ui_socket_path().unwrap();
        assert!(ipc.ends_with("vigil.sock"));
        assert!(ui.ends_with("vigil_ui.sock"));
        assert_eq!(ipc.parent(), ui.parent());
    }

    #[test]
    fn test_config_path() {
        let path = get_config_path().unwrap();
        assert!(path.ends_with("config.toml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_private_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("vigil");
        ensure_private_dir(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_socket_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("fake.sock");
        fs::write(&file, b"").unwrap();

        secure_socket_permissions(&file).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // Missing path is fine
        secure_socket_permissions(&temp.path().join("missing.sock")).unwrap();
    }
}
