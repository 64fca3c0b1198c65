//! Bounded-memory accumulation of streamed markup.
//!
//! [`SpillBuffer`] collects `<sheetData>` bytes in memory and migrates them to
//! a temporary file once the buffer reaches its threshold. Reading the payload
//! back yields exactly the bytes that were pushed, in order, whether or not a
//! spill happened.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

/// Buffer size (16 MiB) at which accumulated markup moves to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 1 << 24;

const TEMP_FILE_PREFIX: &str = "sheetstream-";

/// Where a session's markup currently lives.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SpillStatus {
    /// Nothing has reached the threshold yet.
    #[default]
    InMemory,
    /// At least one spill to the temporary file succeeded.
    Spilled,
    /// A spill failed and the data stayed in memory. The memory bound no
    /// longer holds for this session, but no data was lost.
    Degraded,
}

/// Backing store for spilled bytes.
trait SpillSink: Read + Write + Seek + fmt::Debug {
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Release the store, deleting it if it is a file.
    fn close(self: Box<Self>) -> io::Result<()>;
}

impl SpillSink for NamedTempFile {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.as_file().set_len(len)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        NamedTempFile::close(*self)
    }
}

#[derive(Debug)]
pub struct SpillBuffer {
    buffer: Vec<u8>,
    file: Option<Box<dyn SpillSink>>,
    /// Bytes known to be in `file`.
    spilled_len: u64,
    threshold: usize,
    temp_dir: Option<PathBuf>,
    degraded: bool,
    /// Set when a failed write could not be rolled back, so the file holds
    /// bytes that are also still in `buffer`.
    poisoned: Option<io::Error>,
}

impl Default for SpillBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SPILL_THRESHOLD, None)
    }
}

impl SpillBuffer {
    /// `temp_dir = None` uses the platform temporary directory.
    pub fn new(threshold: usize, temp_dir: Option<PathBuf>) -> Self {
        Self {
            buffer: Vec::new(),
            file: None,
            spilled_len: 0,
            threshold,
            temp_dir,
            degraded: false,
            poisoned: None,
        }
    }

    /// Append bytes without a spill check.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Append one complete row, then spill if the threshold is reached.
    ///
    /// Never fails: spill errors are logged and leave the data in memory.
    pub fn push_row(&mut self, row: &[u8]) {
        self.buffer.extend_from_slice(row);
        self.maybe_spill();
    }

    /// Bytes currently held in memory.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes held in memory plus bytes already on disk.
    pub fn total_len(&self) -> u64 {
        self.spilled_len + self.buffer.len() as u64
    }

    pub fn status(&self) -> SpillStatus {
        if self.degraded {
            SpillStatus::Degraded
        } else if self.file.is_some() {
            SpillStatus::Spilled
        } else {
            SpillStatus::InMemory
        }
    }

    pub fn has_spilled(&self) -> bool {
        self.spilled_len > 0
    }

    fn maybe_spill(&mut self) {
        if self.buffer.len() < self.threshold || self.poisoned.is_some() {
            return;
        }
        if let Err(err) = self.spill() {
            if self.degraded {
                log::debug!("spill retry failed, {} bytes stay in memory: {err}", self.buffer.len());
            } else {
                log::warn!(
                    "could not spill {} bytes of sheet data to a temporary file, keeping them in memory: {err}",
                    self.buffer.len()
                );
            }
            self.degraded = true;
        }
    }

    fn spill(&mut self) -> io::Result<()> {
        if self.file.is_none() {
            let file = self.create_temp_file()?;
            log::debug!("created spill file {}", file.path().display());
            self.file = Some(Box::new(file));
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        if let Err(err) = file.write_all(&self.buffer) {
            // Drop whatever part of the buffer made it to disk so no byte is counted twice.
            let rollback = file
                .set_len(self.spilled_len)
                .and_then(|()| file.seek(SeekFrom::Start(self.spilled_len)).map(|_| ()));
            if let Err(rollback_err) = rollback {
                log::warn!("could not roll back partial spill write: {rollback_err}");
                self.poisoned = Some(rollback_err);
            }
            return Err(err);
        }

        log::debug!("spilled {} bytes of sheet data to disk", self.buffer.len());
        self.spilled_len += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn create_temp_file(&self) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX);
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    /// Consume the buffer and return every pushed byte in order.
    ///
    /// The spill file, if any, is read back and deleted. On error the file is
    /// still removed when the handle drops.
    pub fn into_payload(mut self) -> io::Result<Vec<u8>> {
        if let Some(err) = self.poisoned.take() {
            return Err(err);
        }

        let mut payload = Vec::new();
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.seek(SeekFrom::Start(0))?;
            payload.reserve(self.spilled_len as usize + self.buffer.len());
            file.read_to_end(&mut payload)?;
            file.close()?;
        }
        payload.append(&mut self.buffer);
        Ok(payload)
    }
}
