//! The append-only journal segment writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::WriterError;
use crate::interceptor::{CloseInterceptor, PoolableWriter};

/// Size of the record header (length + CRC32C).
const RECORD_HEADER_SIZE: u64 = 8;

/// Buffer in front of the segment file.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// JournalWriter
// ---------------------------------------------------------------------------

/// An exclusive writer appending framed records to one journal segment.
///
/// Record format: `[length: 4][crc32c: 4][payload: length]`, little-endian.
///
/// Handles are shared `Arc`s — the pool keeps one while a client holds
/// another — so mutable state lives behind a mutex. The pool's ownership
/// protocol guarantees a single appending thread, which keeps that lock
/// uncontended.
pub struct JournalWriter {
    name: String,
    path: PathBuf,
    state: Mutex<WriterState>,
    interceptor: Mutex<Option<Weak<dyn CloseInterceptor>>>,
}

struct WriterState {
    /// `None` once the writer has been physically closed.
    file: Option<BufWriter<File>>,
    /// Current append position in bytes.
    position: u64,
}

impl JournalWriter {
    /// Opens (creating if necessary) the segment at `path` for appending.
    pub(crate) fn create(name: &str, path: PathBuf) -> Result<Self, WriterError> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let position = file.metadata()?.len();

        Ok(JournalWriter {
            name: name.to_string(),
            path,
            state: Mutex::new(WriterState {
                file: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
                position,
            }),
            interceptor: Mutex::new(None),
        })
    }

    /// Appends one framed record and returns its start position.
    pub fn append(&self, payload: &[u8]) -> Result<u64, WriterError> {
        if u32::try_from(payload.len()).is_err() {
            return Err(WriterError::RecordTooLarge { len: payload.len() });
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(file) = state.file.as_mut() else {
            return Err(WriterError::Closed(self.name.clone()));
        };

        let start = state.position;
        let len = payload.len() as u32;
        let crc = crc32c::crc32c(payload);
        file.write_all(&len.to_le_bytes())?;
        file.write_all(&crc.to_le_bytes())?;
        file.write_all(payload)?;

        state.position = start + RECORD_HEADER_SIZE + u64::from(len);
        Ok(start)
    }

    /// Flushes buffered records and syncs the segment with fdatasync.
    pub fn commit(&self) -> Result<(), WriterError> {
        let mut guard = self.state.lock();
        let Some(file) = guard.file.as_mut() else {
            return Err(WriterError::Closed(self.name.clone()));
        };
        file.flush()?;
        file.get_ref().sync_data()?;
        Ok(())
    }

    /// Current append position in bytes.
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    /// `false` once the writer has been physically closed.
    pub fn is_open(&self) -> bool {
        self.state.lock().file.is_some()
    }

    /// Path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PoolableWriter for JournalWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn interceptor(&self) -> Option<Arc<dyn CloseInterceptor>> {
        self.interceptor.lock().as_ref().and_then(Weak::upgrade)
    }

    fn install_close_interceptor(&self, hook: Weak<dyn CloseInterceptor>) {
        *self.interceptor.lock() = Some(hook);
    }

    fn clear_close_interceptor(&self) {
        self.interceptor.lock().take();
    }

    fn destroy(&self) -> Result<(), WriterError> {
        // Idempotent: only the call that takes the file performs the close.
        let Some(mut file) = self.state.lock().file.take() else {
            return Ok(());
        };
        debug!(journal = self.name.as_str(), "journal writer closed");
        file.flush()?;
        file.get_ref().sync_data()?;
        Ok(())
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        if let Some(file) = self.state.get_mut().file.as_mut() {
            if let Err(err) = file.flush() {
                warn!(journal = self.name.as_str(), error = %err, "flush on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for JournalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWriter")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("position", &self.position())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_writer(name: &str) -> (JournalWriter, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("{name}.journal"));
        let writer = JournalWriter::create(name, path).unwrap();
        (writer, dir)
    }

    #[test]
    fn append_advances_position() {
        let (writer, _dir) = temp_writer("trades");
        assert_eq!(writer.position(), 0);

        let pos = writer.append(b"first").unwrap();
        assert_eq!(pos, 0);
        assert_eq!(writer.position(), RECORD_HEADER_SIZE + 5);

        let pos2 = writer.append(b"second").unwrap();
        assert_eq!(pos2, RECORD_HEADER_SIZE + 5);
    }

    #[test]
    fn commit_persists_framed_records() {
        let (writer, dir) = temp_writer("quotes");
        writer.append(b"payload").unwrap();
        writer.commit().unwrap();

        let bytes = std::fs::read(dir.path().join("quotes.journal")).unwrap();
        assert_eq!(bytes.len() as u64, RECORD_HEADER_SIZE + 7);
        assert_eq!(&bytes[..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &crc32c::crc32c(b"payload").to_le_bytes());
        assert_eq!(&bytes[8..], b"payload");
    }

    #[test]
    fn reopen_resumes_at_end_of_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.journal");
        {
            let writer = JournalWriter::create("t", path.clone()).unwrap();
            writer.append(b"abc").unwrap();
            writer.commit().unwrap();
        }
        let writer = JournalWriter::create("t", path).unwrap();
        assert_eq!(writer.position(), RECORD_HEADER_SIZE + 3);
    }

    #[test]
    fn destroy_is_idempotent() {
        let (writer, _dir) = temp_writer("t");
        writer.append(b"x").unwrap();
        assert!(writer.is_open());

        writer.destroy().unwrap();
        assert!(!writer.is_open());
        writer.destroy().unwrap(); // second call is a no-op
    }

    #[test]
    fn append_after_destroy_is_rejected() {
        let (writer, _dir) = temp_writer("t");
        writer.destroy().unwrap();
        assert!(matches!(
            writer.append(b"x"),
            Err(WriterError::Closed(name)) if name == "t"
        ));
        assert!(matches!(writer.commit(), Err(WriterError::Closed(_))));
    }

    #[test]
    fn close_without_interceptor_destroys() {
        let (writer, _dir) = temp_writer("t");
        writer.close().unwrap();
        assert!(!writer.is_open());
    }

    #[test]
    fn debug_names_the_journal() {
        let (writer, _dir) = temp_writer("orders");
        let s = format!("{writer:?}");
        assert!(s.contains("JournalWriter"));
        assert!(s.contains("orders"));
    }
}
