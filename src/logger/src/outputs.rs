use std::io::Write;
use std::path::PathBuf;

/// A destination for drained log messages.
pub trait Output: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;
    fn flush(&mut self) -> std::io::Result<()>;
}

/// Writes to standard output.
pub struct Stdout {
    inner: std::io::Stdout,
}

impl Stdout {
    pub fn new() -> Self {
        Self {
            inner: std::io::stdout(),
        }
    }
}

impl Default for Stdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for Stdout {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Writes to a file, rotating it to the backup path once it exceeds the
/// configured size.
pub struct File {
    file: std::fs::File,
    path: PathBuf,
    backup: Option<PathBuf>,
    max_size: u64,
    written: u64,
}

impl File {
    pub fn open(path: &str, backup: Option<String>, max_size: u64) -> std::io::Result<Self> {
        let path = PathBuf::from(path);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            file,
            path,
            backup: backup.map(PathBuf::from),
            max_size,
            written,
        })
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.file.flush()?;
        if let Some(backup) = &self.backup {
            let _ = std::fs::rename(&self.path, backup);
        }
        self.file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Output for File {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if self.max_size > 0 && self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// Collects output in memory. Test support.
#[derive(Default)]
pub struct Capture {
    pub buf: Vec<u8>,
}

impl Output for Capture {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
