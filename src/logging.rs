use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const MAX_LOG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Installs the global subscriber: stdout, plus a size-capped file when `log_file` is set.
pub fn init_logging(log_level: Level, log_file: Option<&str>) -> anyhow::Result<()> {
    let level_filter = LevelFilter::from_level(log_level);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_filter(level_filter);

    let file_layer = match log_file {
        Some(path) => {
            let writer = CappedLogFile::open(path, MAX_LOG_FILE_BYTES)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(level_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// Log file that keeps only its newest half once it reaches `max_len` bytes.
#[derive(Clone, Debug)]
pub struct CappedLogFile {
    inner: Arc<Mutex<CappedFile>>,
}

#[derive(Debug)]
struct CappedFile {
    path: PathBuf,
    file: File,
    len: u64,
    max_len: u64,
}

impl CappedLogFile {
    pub fn open(path: impl AsRef<Path>, max_len: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(CappedFile {
                path,
                file,
                len,
                max_len,
            })),
        })
    }
}

impl CappedFile {
    fn shrink(&mut self) -> io::Result<()> {
        let start = self.len.saturating_sub(self.max_len / 2);
        let mut tail = Vec::new();
        let mut reader = File::open(&self.path)?;
        // One byte early, so a record starting exactly at `start` is kept whole
        reader.seek(SeekFrom::Start(start.saturating_sub(1)))?;
        reader.read_to_end(&mut tail)?;

        if start > 0 {
            match tail.iter().position(|&b| b == b'\n') {
                Some(pos) => drop(tail.drain(..=pos)),
                None => tail.clear(),
            }
        }

        let mut writer = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        writer.write_all(&tail)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.len = tail.len() as u64;
        Ok(())
    }
}

impl Write for CappedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        if inner.len + buf.len() as u64 > inner.max_len {
            inner.shrink()?;
        }
        inner.file.write_all(buf)?;
        inner.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        inner.file.flush()
    }
}

impl<'a> MakeWriter<'a> for CappedLogFile {
    type Writer = CappedLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
