//! Finding ffprobe and reporting which backends this build can use.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

const FFPROBE: &str = "ffprobe";

/// Probing and decoding backends available on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backends {
    /// Resolved ffprobe executable.
    pub ffprobe: Option<PathBuf>,
    /// Version from ffprobe's banner, e.g. `6.1.1`.
    pub ffprobe_version: Option<String>,
    /// Whether [`crate::FfmpegSource`] is compiled in.
    pub native_decoder: bool,
}

/// Resolve the ffprobe executable.
///
/// A configured path wins when it points at a file; otherwise `PATH` is
/// searched.
pub fn locate_ffprobe(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured ffprobe missing, searching PATH");
    }
    which::which(FFPROBE).map_err(|_| Error::tool_not_found(FFPROBE))
}

/// Version an ffprobe executable reports, if it runs.
pub fn ffprobe_version(ffprobe: &Path) -> Option<String> {
    let output = Command::new(ffprobe).arg("-version").output().ok()?;
    if !output.status.success() {
        debug!(path = %ffprobe.display(), "ffprobe -version failed");
        return None;
    }
    version_from_banner(&String::from_utf8_lossy(&output.stdout))
}

/// `ffprobe version 6.1.1-3ubuntu5 Copyright (c) ...` gives `6.1.1-3ubuntu5`.
fn version_from_banner(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .next()?
        .strip_prefix("ffprobe version ")?
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Report what this build and machine can probe and decode with.
pub fn detect_backends(configured_ffprobe: Option<&Path>) -> Backends {
    let ffprobe = locate_ffprobe(configured_ffprobe).ok();
    let ffprobe_version = ffprobe.as_deref().and_then(ffprobe_version);
    Backends {
        ffprobe,
        ffprobe_version,
        native_decoder: crate::has_native_decoder(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_from_banner() {
        let banner = "ffprobe version 6.1.1-3ubuntu5 Copyright (c) 2007-2023 the FFmpeg developers\nbuilt with gcc 13\n";
        assert_eq!(version_from_banner(banner).as_deref(), Some("6.1.1-3ubuntu5"));
        assert_eq!(version_from_banner("ffmpeg version 7.0"), None);
        assert_eq!(version_from_banner(""), None);
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("ffprobe-custom");
        std::fs::write(&fake, b"").unwrap();
        assert_eq!(locate_ffprobe(Some(&fake)).unwrap(), fake);
    }

    #[test]
    fn test_configured_directory_is_not_ffprobe() {
        let dir = TempDir::new().unwrap();
        // Falls back to PATH, which may or may not have ffprobe.
        if let Ok(path) = locate_ffprobe(Some(dir.path())) {
            assert_ne!(path, dir.path());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_backends_reads_configured_banner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("ffprobe");
        std::fs::write(&fake, "#!/bin/sh\necho 'ffprobe version n7.1 Copyright'\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backends = detect_backends(Some(&fake));
        assert_eq!(backends.ffprobe.as_deref(), Some(fake.as_path()));
        assert_eq!(backends.ffprobe_version.as_deref(), Some("n7.1"));
        assert_eq!(backends.native_decoder, crate::has_native_decoder());
    }

    #[test]
    fn test_version_of_missing_executable() {
        assert_eq!(ffprobe_version(Path::new("/nonexistent/ffprobe")), None);
    }
}
