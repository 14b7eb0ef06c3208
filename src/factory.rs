//! Journal identity and the base writer factory.

use std::path::PathBuf;

use tracing::debug;

use crate::error::WriterError;
use crate::interceptor::PoolableWriter;
use crate::journal::JournalWriter;

// ---------------------------------------------------------------------------
// JournalMetadata
// ---------------------------------------------------------------------------

/// Identity of a journal: a validated, filesystem-safe name.
///
/// Two metadata values describe the same journal iff their names are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JournalMetadata {
    name: String,
}

impl JournalMetadata {
    /// Validates `name` as a journal identity.
    pub fn new(name: impl Into<String>) -> Result<Self, WriterError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("must not be empty")
        } else if name.len() > 255 {
            Some("must not exceed 255 bytes")
        } else if name.contains(['/', '\\']) || name == "." || name == ".." {
            Some("must not contain path separators")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(WriterError::InvalidName { name, reason }),
            None => Ok(JournalMetadata { name }),
        }
    }

    /// The journal's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// WriterFactory
// ---------------------------------------------------------------------------

/// Physically constructs a fresh writer from journal metadata.
///
/// The pool calls this exactly once per tracked slot, from the thread that
/// won the race to create it; construction may block on filesystem I/O.
pub trait WriterFactory: Send + Sync + 'static {
    /// The writer type this factory produces.
    type Writer: PoolableWriter;

    fn open(&self, metadata: &JournalMetadata) -> Result<Self::Writer, WriterError>;
}

// ---------------------------------------------------------------------------
// JournalWriterFactory
// ---------------------------------------------------------------------------

/// The filesystem-backed base factory: one append-only segment file per
/// journal name, all under a database home directory.
pub struct JournalWriterFactory {
    home: PathBuf,
}

impl JournalWriterFactory {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        JournalWriterFactory { home: home.into() }
    }

    /// The database home directory.
    pub fn home(&self) -> &PathBuf {
        &self.home
    }
}

impl WriterFactory for JournalWriterFactory {
    type Writer = JournalWriter;

    fn open(&self, metadata: &JournalMetadata) -> Result<JournalWriter, WriterError> {
        std::fs::create_dir_all(&self.home)?;
        let path = self.home.join(format!("{}.journal", metadata.name()));
        debug!(journal = metadata.name(), path = %path.display(), "opening segment");
        JournalWriter::create(metadata.name(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_accepts_plain_names() {
        let meta = JournalMetadata::new("trades-2024").unwrap();
        assert_eq!(meta.name(), "trades-2024");
    }

    #[test]
    fn metadata_rejects_unusable_names() {
        for bad in ["", "a/b", "a\\b", ".", ".."] {
            assert!(
                matches!(
                    JournalMetadata::new(bad),
                    Err(WriterError::InvalidName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
        let long = "x".repeat(256);
        assert!(JournalMetadata::new(long).is_err());
    }

    #[test]
    fn factory_creates_segment_under_home() {
        let dir = tempfile::tempdir().unwrap();
        let factory = JournalWriterFactory::new(dir.path().join("db"));
        let meta = JournalMetadata::new("t1").unwrap();

        let writer = factory.open(&meta).unwrap();
        assert_eq!(writer.name(), "t1");
        assert!(writer.path().starts_with(dir.path().join("db")));
        assert!(writer.path().ends_with("t1.journal"));
    }
}
