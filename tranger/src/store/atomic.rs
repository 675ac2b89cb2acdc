//! Atomic file replacement.
//!
//! Rewrites go to a sibling temp file that is renamed over the target, so
//! readers see either the old or the new contents.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temp path next to `final_path`: `{dir}/.tmp.{random}.{filename}`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let filename = final_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let random: u64 = rand::random();
    final_path.with_file_name(format!(".tmp.{:016x}.{}", random, filename))
}

/// Replace `final_path` with `content`, creating it when missing.
pub fn replace_file(final_path: &Path, content: &[u8]) -> io::Result<()> {
    let temp = temp_path(final_path);
    let written = fs::File::create(&temp).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp, final_path) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(())
}

/// Apply a unix permission mode. A zero mode leaves the default.
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if mode != 0 {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temps(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().unwrap_or("").starts_with(".tmp."))
            .count()
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let final_path = Path::new("/data/gps/tracks/records.jsonl");
        let temp = temp_path(final_path);
        assert_eq!(temp.parent(), final_path.parent());

        let filename = temp.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with(".tmp."));
        assert!(filename.ends_with(".records.jsonl"));
    }

    #[test]
    fn test_replace_creates_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.jsonl");

        replace_file(&path, b"one\n").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"one\n");

        replace_file(&path, b"two\n").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two\n");
        assert_eq!(leftover_temps(tmp.path()), 0);
    }

    #[test]
    fn test_replace_into_missing_dir_fails_cleanly() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent/records.jsonl");
        assert!(replace_file(&path, b"x").is_err());
        assert_eq!(leftover_temps(tmp.path()), 0);
    }
}
