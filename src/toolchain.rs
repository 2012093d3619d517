//! Resolution and precondition checks for the external daemon binaries.
//!
//! Downloading and unpacking the daemon release is the installer's job, not
//! ours. This module covers the interface the core needs from it: a path to
//! the daemon executable (`easytier-core`), a path to the companion control
//! executable (`easytier-cli`), and a guarantee both are present and
//! runnable before anything is spawned. Failing that guarantee is a fatal
//! precondition error, raised here and never later.

use std::env::consts::{ARCH, EXE_SUFFIX, OS};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors raised while resolving the daemon binaries.
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// A required binary does not exist.
    #[error("required binary not found: {path} (is the daemon installed?)")]
    NotFound {
        /// The path that was checked.
        path: PathBuf,
    },

    /// A required binary exists but is not executable.
    #[error("binary is not executable: {path}")]
    NotExecutable {
        /// The offending path.
        path: PathBuf,
    },

    /// No daemon release exists for this OS/architecture combination.
    #[error("unsupported platform: {os} {arch}")]
    UnsupportedPlatform {
        /// Operating system name.
        os: &'static str,
        /// CPU architecture name.
        arch: &'static str,
    },
}

/// Validated paths to the daemon and its control CLI.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Path to the `easytier-core` daemon executable.
    pub core_path: PathBuf,
    /// Path to the `easytier-cli` control executable.
    pub cli_path: PathBuf,
}

impl Toolchain {
    /// Build a toolchain from explicit paths, validating both binaries.
    pub fn from_paths(
        core_path: impl Into<PathBuf>,
        cli_path: impl Into<PathBuf>,
    ) -> Result<Self, ToolchainError> {
        let core_path = core_path.into();
        let cli_path = cli_path.into();
        validate_executable(&core_path)?;
        validate_executable(&cli_path)?;
        debug!(core = %core_path.display(), cli = %cli_path.display(), "toolchain resolved");
        Ok(Self { core_path, cli_path })
    }

    /// Locate the binaries under an installer-managed base directory.
    ///
    /// The installer unpacks releases as
    /// `<base>/easytier-<platform-string>/easytier-core` (plus the CLI),
    /// mirroring the upstream zip layout.
    pub fn locate(base_dir: &Path) -> Result<Self, ToolchainError> {
        let dir = base_dir.join(format!("easytier-{}", platform_string()?));
        Self::from_paths(
            dir.join(format!("easytier-core{EXE_SUFFIX}")),
            dir.join(format!("easytier-cli{EXE_SUFFIX}")),
        )
    }

    /// Resolve the toolchain from optional explicit paths, falling back to
    /// [`locate`](Self::locate) for whichever path is missing.
    pub fn resolve(
        core_path: Option<PathBuf>,
        cli_path: Option<PathBuf>,
        base_dir: &Path,
    ) -> Result<Self, ToolchainError> {
        match (core_path, cli_path) {
            (Some(core), Some(cli)) => Self::from_paths(core, cli),
            (core, cli) => {
                let located = Self::locate(base_dir)?;
                Self::from_paths(
                    core.unwrap_or(located.core_path),
                    cli.unwrap_or(located.cli_path),
                )
            }
        }
    }
}

/// Platform string used in release directory names.
///
/// Matches the upstream daemon's release naming for the platforms it ships.
pub fn platform_string() -> Result<&'static str, ToolchainError> {
    match (OS, ARCH) {
        ("linux", "x86_64") => Ok("linux-x86_64"),
        ("linux", "aarch64") => Ok("linux-aarch64"),
        ("linux", "arm") => Ok("linux-arm"),
        ("macos", "x86_64") => Ok("macos-x86_64"),
        ("macos", "aarch64") => Ok("macos-aarch64"),
        ("windows", "x86_64") => Ok("windows-x86_64"),
        ("windows", "aarch64") => Ok("windows-arm64"),
        ("windows", "x86") => Ok("windows-i686"),
        (os, arch) => Err(ToolchainError::UnsupportedPlatform { os, arch }),
    }
}

fn validate_executable(path: &Path) -> Result<(), ToolchainError> {
    if !path.is_file() {
        return Err(ToolchainError::NotFound {
            path: path.to_path_buf(),
        });
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = path
            .metadata()
            .map_err(|_| ToolchainError::NotFound {
                path: path.to_path_buf(),
            })?
            .permissions()
            .mode();
        if mode & 0o111 == 0 {
            return Err(ToolchainError::NotExecutable {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_not_found() {
        let err = Toolchain::from_paths("/nonexistent/core", "/nonexistent/cli")
            .expect_err("missing binaries must fail");
        assert!(matches!(err, ToolchainError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn accepts_real_executables() {
        let toolchain =
            Toolchain::from_paths("/bin/sleep", "/bin/true").expect("system binaries exist");
        assert_eq!(toolchain.core_path, PathBuf::from("/bin/sleep"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_non_executable_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("easytier-core");
        std::fs::write(&path, "not a binary").expect("write file");

        let err = Toolchain::from_paths(&path, "/bin/true").expect_err("plain file must fail");
        assert!(matches!(err, ToolchainError::NotExecutable { .. }));
    }

    #[test]
    fn locate_fails_cleanly_without_install_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(Toolchain::locate(dir.path()).is_err());
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn platform_string_is_known_here() {
        assert!(platform_string().is_ok());
    }
}
