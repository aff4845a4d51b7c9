//! Tracing setup and a size-rotated log file sink.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{Level, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Rotating JSON log file, disabled when unset
    pub file: Option<PathBuf>,
    pub max_bytes: u64,
    pub backups: usize,
}

impl LogConfig {
    pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
    pub const DEFAULT_BACKUPS: usize = 5;
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            file: None,
            max_bytes: Self::DEFAULT_MAX_BYTES,
            backups: Self::DEFAULT_BACKUPS,
        }
    }
}

/// Install the global subscriber.
///
/// Records at WARN and above go to stderr, the rest to stdout. A log file
/// that cannot be opened is reported and skipped.
pub fn init_tracing(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_writer = io::stderr.with_max_level(Level::WARN).or_else(io::stdout);
    let console = match config.format {
        LogFormat::Pretty => fmt::layer().with_writer(console_writer).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(console_writer).boxed(),
    };

    let mut file_error = None;
    let file = config.file.as_ref().and_then(|path| {
        match RotatingFileWriter::open(path, config.max_bytes, config.backups) {
            Ok(writer) => Some(fmt::layer().json().with_ansi(false).with_writer(writer).boxed()),
            Err(e) => {
                file_error = Some((path.clone(), e));
                None
            }
        }
    });

    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init();

    if let Some((path, e)) = file_error {
        warn!(path = %path.display(), error = %e, "Log file unavailable, logging to console only");
    }
}

#[derive(Debug)]
struct RotatingState {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingState {
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    /// Shift `file.N` to `file.N+1`, dropping the oldest, and start a fresh file.
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        if self.backups == 0 {
            let _ = fs::remove_file(&self.path);
        } else {
            let _ = fs::remove_file(self.backup_path(self.backups));
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            if self.path.exists() {
                fs::rename(&self.path, self.backup_path(1))?;
            }
        }
        self.file = Some(open_append(&self.path)?);
        self.size = 0;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        self.size += buf.len() as u64;
        Ok(buf.len())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Log file writer that rotates once the file reaches `max_bytes`
#[derive(Debug, Clone)]
pub struct RotatingFileWriter {
    state: Arc<Mutex<RotatingState>>,
}

impl RotatingFileWriter {
    /// Open (or create) the log file, creating its directory if needed.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            state: Arc::new(Mutex::new(RotatingState {
                path,
                file: Some(file),
                size,
                max_bytes: max_bytes.max(1),
                backups,
            })),
        })
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::tempdir;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("Pretty").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_rotation_shifts_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("relayer.log");
        let mut writer = RotatingFileWriter::open(&path, 10, 2).unwrap();

        writer.write_all(b"first-line\n").unwrap();
        writer.write_all(b"second-line\n").unwrap();
        writer.write_all(b"third-line\n").unwrap();
        writer.write_all(b"fourth-line\n").unwrap();
        writer.flush().unwrap();

        let read = |p: PathBuf| std::fs::read_to_string(p).unwrap();
        assert_eq!(read(path.clone()), "fourth-line\n");
        assert_eq!(read(dir.path().join("logs/relayer.log.1")), "third-line\n");
        assert_eq!(read(dir.path().join("logs/relayer.log.2")), "second-line\n");
        assert!(!dir.path().join("logs/relayer.log.3").exists());
    }

    #[test]
    fn test_rotation_without_backups_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relayer.log");
        let mut writer = RotatingFileWriter::open(&path, 8, 0).unwrap();

        writer.write_all(b"0123456789").unwrap();
        writer.write_all(b"abc").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc");
        assert!(!dir.path().join("relayer.log.1").exists());
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relayer.log");
        std::fs::write(&path, b"old\n").unwrap();

        let mut writer = RotatingFileWriter::open(&path, 1024, 1).unwrap();
        writer.write_all(b"new\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }
}
