//! Placement and atomic writing of persisted cache files.

use crate::config::CacheConfig;
use crate::source::StreamInfo;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Extension of persisted frame indexes.
pub const INDEX_EXTENSION: &str = "fsidx";

/// Extension of persisted reliability records.
pub const RECORD_EXTENSION: &str = "fsrel";

/// Modification time of a file in nanoseconds since the Unix epoch.
pub fn file_mtime(path: &Path) -> io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let nanos = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i64,
        Err(before) => -(before.duration().as_nanos() as i64),
    };
    Ok(nanos)
}

/// Path of the cache file with `extension` for a stream.
///
/// Without a cache directory the file sits next to the source,
/// `<name>.t<track>.<decoder>.<ext>`. With one, the source path is hashed
/// so files from different directories cannot collide.
pub fn cache_path(config: &CacheConfig, info: &StreamInfo, extension: &str) -> PathBuf {
    let suffix = format!(
        "t{}.{}.{}",
        info.track,
        sanitize(&info.decoder),
        extension
    );
    match &config.dir {
        Some(dir) => {
            let digest = Sha256::digest(info.path.to_string_lossy().as_bytes());
            let hash = hex::encode(digest);
            dir.join(format!("{}.{}", &hash[..16], suffix))
        }
        None => {
            let name = info
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "stream".to_string());
            info.path.with_file_name(format!("{name}.{suffix}"))
        }
    }
}

fn sanitize(decoder: &str) -> String {
    let cleaned: String = decoder
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Write `contents` to `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
