//! Persisting downloaded files to the local download directory.
//!
//! Files are never overwritten. A name that is taken gets ` (1)`, ` (2)`, ...
//! inserted before the extension, and long names are shortened so the result
//! still fits in one path component. Bytes are written to a short hidden temp
//! file in the same directory and renamed into place, so a half-written
//! download is never visible under the final name.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;

use crate::error::{DroppError, Result};

/// Name used when the server-supplied name has no usable final component.
const FALLBACK_NAME: &str = "download";

/// Give up looking for a free name after this many candidates.
const MAX_CANDIDATES: u32 = 10_000;

/// Longest file name, in bytes, accepted by common filesystems.
const MAX_NAME_BYTES: usize = 255;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Platform download directory, falling back to the home directory.
pub fn default_download_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(dirs::home_dir)
}

/// Reduce a server-supplied file name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('\0');
    match last {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        other => other.to_string(),
    }
}

/// Split off the extension. Leading-dot names like ".env" have none.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}

/// The `n`th candidate for `name`, shortened to fit [`MAX_NAME_BYTES`].
///
/// The stem is cut first; an extension too long to leave any stem is cut too.
fn candidate_name(name: &str, n: u32) -> String {
    let (stem, ext) = split_extension(name);
    let suffix = if n == 0 { String::new() } else { format!(" ({})", n) };

    let ext = truncate_bytes(ext, MAX_NAME_BYTES / 2);
    let room = MAX_NAME_BYTES - suffix.len() - ext.len();
    format!("{}{}{}", truncate_bytes(stem, room), suffix, ext)
}

/// A short hidden name, independent of the target's length.
fn temp_name() -> String {
    format!(
        ".dropp-{}-{}.part",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Write `bytes` into `dir` under `name` without replacing an existing file.
///
/// Returns the path actually written.
pub async fn save_download(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DroppError::storage_write(dir, e))?;

    let name = sanitize_file_name(name);
    let target = reserve(dir, &name).await?;

    let tmp = dir.join(temp_name());
    if let Err(e) = write_synced(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        let _ = tokio::fs::remove_file(&target).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, &target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        let _ = tokio::fs::remove_file(&target).await;
        return Err(DroppError::storage_write(&target, e));
    }

    log::info!("Saved {} bytes to {}", bytes.len(), target.display());
    Ok(target)
}

/// Claim the first free candidate name by creating it exclusively.
async fn reserve(dir: &Path, name: &str) -> Result<PathBuf> {
    for n in 0..MAX_CANDIDATES {
        let path = dir.join(candidate_name(name, n));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(DroppError::storage_write(&path, e)),
        }
    }
    Err(DroppError::storage_write(
        &dir.join(name),
        "no free file name available",
    ))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DroppError::storage_write(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| DroppError::storage_write(path, e))?;
    file.sync_all()
        .await
        .map_err(|e| DroppError::storage_write(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_file_name("dir/"), FALLBACK_NAME);
        assert_eq!(sanitize_file_name(".."), FALLBACK_NAME);
        assert_eq!(sanitize_file_name("  "), FALLBACK_NAME);
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("photo.jpg", 0), "photo.jpg");
        assert_eq!(candidate_name("photo.jpg", 2), "photo (2).jpg");
        assert_eq!(candidate_name("archive.tar.gz", 1), "archive.tar (1).gz");
        assert_eq!(candidate_name("README", 1), "README (1)");
        assert_eq!(candidate_name(".env", 1), ".env (1)");
    }

    #[test]
    fn test_candidate_names_fit_name_limit() {
        let long = format!("{}.txt", "a".repeat(260));
        let first = candidate_name(&long, 0);
        assert_eq!(first.len(), MAX_NAME_BYTES);
        assert!(first.ends_with("a.txt"));

        let fits = format!("{}.txt", "b".repeat(250));
        let numbered = candidate_name(&fits, 12);
        assert_eq!(numbered.len(), MAX_NAME_BYTES);
        assert!(numbered.ends_with("b (12).txt"));

        // Never split a multi-byte character.
        let wide = "é".repeat(200);
        assert!(candidate_name(&wide, 3).len() <= MAX_NAME_BYTES);
        assert!(candidate_name(&wide, 3).ends_with(" (3)"));
    }

    #[tokio::test]
    async fn test_save_download_writes_bytes() {
        let dir = TempDir::new().unwrap();
        let path = save_download(dir.path(), "hello.txt", b"hi there")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("hello.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hi there");
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("hello.txt")]);
    }

    #[tokio::test]
    async fn test_save_download_long_name() {
        let dir = TempDir::new().unwrap();
        let name = format!("{}.txt", "a".repeat(246));
        assert_eq!(name.len(), 250);

        let first = save_download(dir.path(), &name, b"x").await.unwrap();
        assert_eq!(first, dir.path().join(&name));
        assert_eq!(std::fs::read(&first).unwrap(), b"x");

        let second = save_download(dir.path(), &name, b"y").await.unwrap();
        let second_name = second.file_name().unwrap().to_str().unwrap();
        assert!(second_name.len() <= MAX_NAME_BYTES);
        assert!(second_name.ends_with(" (1).txt"));
        assert_eq!(std::fs::read(&second).unwrap(), b"y");
    }

    #[tokio::test]
    async fn test_save_download_never_overwrites() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"original").unwrap();

        let first = save_download(dir.path(), "a.txt", b"one").await.unwrap();
        let second = save_download(dir.path(), "a.txt", b"two").await.unwrap();

        assert_eq!(first, dir.path().join("a (1).txt"));
        assert_eq!(second, dir.path().join("a (2).txt"));
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"original");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_save_download_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Downloads").join("dropp");
        let path = save_download(&nested, "../x.bin", &[1, 2]).await.unwrap();
        assert_eq!(path, nested.join("x.bin"));
    }

    #[tokio::test]
    async fn test_save_download_into_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = save_download(&blocker, "x.bin", b"x").await.unwrap_err();
        assert!(matches!(err, DroppError::StorageWrite { .. }), "got {:?}", err);
    }
}
