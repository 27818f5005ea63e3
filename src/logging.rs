//! Logging setup for the driftwatch binary.
//!
//! Two sinks: stderr for the operator, and a size-capped rolling file in
//! the state directory for after-the-fact debugging. `RUST_LOG` overrides
//! the default filter.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "driftwatch=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Initialize tracing with a stderr layer and a rolling file layer under
/// `state_dir/logs`.
pub fn init_logging(state_dir: &Path, verbose: bool) -> Result<()> {
    let log_dir = state_dir.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_writer = SharedRollingWriter::new(log_dir, "driftwatch")
        .context("Failed to initialize rolling log writer")?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("driftwatch=debug"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

struct RollingFile {
    dir: PathBuf,
    base_name: String,
    file: Option<File>,
    current_size: u64,
}

impl RollingFile {
    fn new(dir: PathBuf, base_name: &str) -> io::Result<Self> {
        let mut rolling = Self {
            dir,
            base_name: base_name.to_string(),
            file: None,
            current_size: 0,
        };
        rolling.open_current()?;
        Ok(rolling)
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn numbered_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.{}.log", self.base_name, n))
    }

    fn open_current(&mut self) -> io::Result<()> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(file);
        Ok(())
    }

    /// Shift `base.log -> base.1.log -> ... -> base.N.log`, dropping the
    /// oldest, then start a fresh current file.
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        let _ = fs::remove_file(self.numbered_path(MAX_LOG_FILES - 1));
        for n in (1..MAX_LOG_FILES - 1).rev() {
            let _ = fs::rename(self.numbered_path(n), self.numbered_path(n + 1));
        }
        let _ = fs::rename(self.current_path(), self.numbered_path(1));
        self.open_current()
    }

    fn write_all_rolling(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.current_size.saturating_add(buf.len() as u64) > MAX_LOG_FILE_SIZE {
            self.rotate()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
            self.current_size += buf.len() as u64;
        }
        Ok(())
    }
}

/// Clonable `MakeWriter` over one shared rolling file.
#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl SharedRollingWriter {
    fn new(dir: PathBuf, base_name: &str) -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RollingFile::new(dir, base_name)?)),
        })
    }
}

impl Write for SharedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().expect("log writer mutex poisoned");
        inner.write_all_rolling(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock().expect("log writer mutex poisoned");
        if let Some(file) = inner.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedRollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rolling_writer_appends() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SharedRollingWriter::new(tmp.path().to_path_buf(), "test").unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(tmp.path().join("test.log")).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_rotation_shifts_files() {
        let tmp = TempDir::new().unwrap();
        let mut rolling = RollingFile::new(tmp.path().to_path_buf(), "test").unwrap();
        rolling.write_all_rolling(b"first\n").unwrap();
        rolling.rotate().unwrap();
        rolling.write_all_rolling(b"second\n").unwrap();

        assert_eq!(
            fs::read_to_string(tmp.path().join("test.1.log")).unwrap(),
            "first\n"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("test.log")).unwrap(),
            "second\n"
        );
    }
}
