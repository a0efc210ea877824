//! Append-only files with an embedded progress marker (§4.4).

pub mod lockfile;

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use self::lockfile::AdvisoryLock;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to acquire output lock: {0}")]
    Lock(String),
}

/// Treats one file as an append-only log whose final line is a
/// machine-readable progress marker `"{page},{rows}"`.
#[async_trait]
pub trait OutputWriter: Send + Sync {
    /// If the current marker indicates `marker_page >= page`, returns
    /// without modification (idempotent for retried/duplicate calls).
    /// Otherwise appends every line followed by a new marker line, in
    /// a single write that flushes before returning.
    async fn append_page(&self, page: u64, rows: u64, lines: &[String]) -> Result<(), OutputError>;

    /// Truncates the file to exclude its final line. A marker-only
    /// file truncates to empty.
    async fn remove_footer(&self) -> Result<(), OutputError>;
}

/// [`OutputWriter`] backed by a plain file on local disk, guarded by a
/// per-file [`AdvisoryLock`] against concurrent `append_page`/
/// `remove_footer` calls within this process.
pub struct FileOutputWriter {
    path: PathBuf,
    lock: AdvisoryLock,
}

impl FileOutputWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_stale_threshold(path, Duration::from_secs(300))
    }

    #[must_use]
    pub fn with_stale_threshold(path: impl Into<PathBuf>, stale_threshold: Duration) -> Self {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self {
            path,
            lock: AdvisoryLock::new(lock_path, stale_threshold),
        }
    }

    /// Scans the file backwards from the end for the first newline and
    /// parses the following bytes as `"{page},{rows}"`. Returns
    /// `(0, 0)` if the file is missing, empty, or unparseable.
    #[must_use]
    pub fn read_footer(path: &Path) -> (u64, u64) {
        let Ok(mut file) = std::fs::File::open(path) else {
            return (0, 0);
        };
        let Ok(len) = file.metadata().map(|m| m.len()) else {
            return (0, 0);
        };
        if len == 0 {
            return (0, 0);
        }

        let mut buf = Vec::new();
        if file.read_to_end(&mut buf).is_err() {
            return (0, 0);
        }

        let trimmed = trim_trailing_newline(&buf);
        let last_line_start = trimmed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);

        let last_line = match std::str::from_utf8(&trimmed[last_line_start..]) {
            Ok(line) => line.trim(),
            Err(_) => return (0, 0),
        };

        parse_marker(last_line).unwrap_or((0, 0))
    }
}

fn trim_trailing_newline(buf: &[u8]) -> &[u8] {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    &buf[..end]
}

fn parse_marker(line: &str) -> Option<(u64, u64)> {
    let (page, rows) = line.split_once(',')?;
    Some((page.trim().parse().ok()?, rows.trim().parse().ok()?))
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".lock");
    path.with_file_name(name)
}

#[async_trait]
impl OutputWriter for FileOutputWriter {
    async fn append_page(&self, page: u64, rows: u64, lines: &[String]) -> Result<(), OutputError> {
        let path = self.path.clone();
        let lock = self.lock.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = lock.acquire().map_err(|e| OutputError::Lock(e.to_string()))?;

            let (marker_page, _) = FileOutputWriter::read_footer(&path);
            if marker_page >= page && path.exists() {
                return Ok(());
            }

            // The previous marker is the file's last line; drop it before
            // appending so the new page's rows + marker become the tail
            // instead of leaving the old marker embedded mid-file.
            let truncate_to = if path.exists() {
                let mut file = std::fs::File::open(&path)?;
                let len = file.metadata()?.len();
                if len == 0 {
                    0
                } else {
                    let mut buf = vec![0u8; len as usize];
                    file.read_exact(&mut buf)?;
                    let trimmed = trim_trailing_newline(&buf);
                    trimmed.iter().rposition(|&b| b == b'\n').map_or(0, |pos| pos + 1) as u64
                }
            } else {
                0
            };

            let mut file = std::fs::OpenOptions::new().create(true).write(true).open(&path)?;
            file.set_len(truncate_to)?;
            file.seek(SeekFrom::Start(truncate_to))?;

            for line in lines {
                writeln!(file, "{}", line.trim_end_matches(['\n', '\r']))?;
            }
            writeln!(file, "{page},{rows}")?;
            file.flush()?;
            file.sync_data()?;
            Ok(())
        })
        .await
        .map_err(|e| OutputError::Lock(e.to_string()))?
    }

    async fn remove_footer(&self) -> Result<(), OutputError> {
        let path = self.path.clone();
        let lock = self.lock.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = lock.acquire().map_err(|e| OutputError::Lock(e.to_string()))?;

            let mut file = match std::fs::OpenOptions::new().read(true).write(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(OutputError::Io(e)),
            };

            let len = file.metadata()?.len();
            if len == 0 {
                return Ok(());
            }

            let mut buf = vec![0u8; len as usize];
            file.read_exact(&mut buf)?;
            let trimmed = trim_trailing_newline(&buf);
            let new_len = trimmed
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |pos| pos + 1);

            file.set_len(new_len as u64)?;
            file.seek(SeekFrom::Start(new_len as u64))?;
            file.flush()?;
            drop(file);

            if new_len == 0 {
                let _ = std::fs::remove_file(&path);
            }
            Ok(())
        })
        .await
        .map_err(|e| OutputError::Lock(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_page_writes_lines_then_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loans.csv");
        let writer = FileOutputWriter::new(&path);

        writer
            .append_page(0, 2, &["a,1".to_string(), "b,2".to_string()])
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,1\nb,2\n0,2\n");
        assert_eq!(FileOutputWriter::read_footer(&path), (0, 2));
    }

    #[tokio::test]
    async fn append_page_is_idempotent_for_already_applied_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loans.csv");
        let writer = FileOutputWriter::new(&path);

        writer.append_page(0, 2, &["a,1".to_string()]).await.unwrap();
        writer.append_page(1, 5, &["b,2".to_string()]).await.unwrap();

        // Retry of page 0: marker_page (1) >= page (0), must no-op.
        writer.append_page(0, 2, &["a,1".to_string()]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,1\nb,2\n1,5\n");
    }

    #[tokio::test]
    async fn append_page_replaces_the_marker_instead_of_stacking_old_ones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loans.csv");
        let writer = FileOutputWriter::new(&path);

        writer.append_page(0, 3, &["r1".into(), "r2".into(), "r3".into()]).await.unwrap();
        writer.append_page(1, 5, &["r4".into(), "r5".into()]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "r1\nr2\nr3\nr4\nr5\n1,5\n");
    }

    #[tokio::test]
    async fn remove_footer_truncates_the_last_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loans.csv");
        let writer = FileOutputWriter::new(&path);

        writer.append_page(0, 2, &["a,1".to_string(), "b,2".to_string()]).await.unwrap();
        writer.remove_footer().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,1\nb,2\n");
    }

    #[tokio::test]
    async fn remove_footer_deletes_a_marker_only_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loans.csv");
        let writer = FileOutputWriter::new(&path);

        writer.append_page(0, 0, &[]).await.unwrap();
        writer.remove_footer().await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn remove_footer_on_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        let writer = FileOutputWriter::new(&path);
        writer.remove_footer().await.unwrap();
    }

    #[test]
    fn read_footer_on_missing_file_is_zero_zero() {
        assert_eq!(FileOutputWriter::read_footer(Path::new("/nonexistent/path.csv")), (0, 0));
    }

    #[test]
    fn read_footer_on_unparseable_marker_is_zero_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.csv");
        std::fs::write(&path, "not,a,marker\nnope\n").unwrap();
        assert_eq!(FileOutputWriter::read_footer(&path), (0, 0));
    }
}
