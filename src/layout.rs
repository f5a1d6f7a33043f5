use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::contract::InvoiceKind;
use crate::error::SyncError;

pub const XML_DIR_NAME: &str = "xml";
pub const ARCHIVE_DIR_NAME: &str = "Archived";

/// Directory tree below the output base.
///
/// ```text
/// <base>/
///   Izlazne fakture/        sales PDFs
///     xml/                  sales XMLs
///   Ulazne fakture/         purchase PDFs
///     xml/                  purchase XMLs
///   Archived/<generation>/  displaced files
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Where PDFs of this kind live.
    pub fn output_dir(&self, kind: InvoiceKind) -> PathBuf {
        self.base.join(kind.output_dir_name())
    }

    pub fn xml_dir(&self, kind: InvoiceKind) -> PathBuf {
        self.output_dir(kind).join(XML_DIR_NAME)
    }

    pub fn archive_root(&self) -> PathBuf {
        self.base.join(ARCHIVE_DIR_NAME)
    }

    /// Creates every directory of the tree that is missing.
    pub fn ensure(&self) -> Result<(), SyncError> {
        let mut dirs = vec![self.base.clone()];
        for kind in InvoiceKind::ALL {
            dirs.push(self.output_dir(kind));
            dirs.push(self.xml_dir(kind));
        }
        dirs.push(self.archive_root());

        for dir in dirs {
            fs::create_dir_all(&dir).map_err(SyncError::io("create directory", &dir))?;
            debug!(path = %dir.display(), "Ensured output directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_creates_full_tree() {
        let tmp = tempdir().unwrap();
        let layout = OutputLayout::new(tmp.path().join("eFakture"));
        layout.ensure().unwrap();

        assert!(tmp.path().join("eFakture/Izlazne fakture/xml").is_dir());
        assert!(tmp.path().join("eFakture/Ulazne fakture/xml").is_dir());
        assert!(tmp.path().join("eFakture/Archived").is_dir());

        // Second call is a no-op.
        layout.ensure().unwrap();
    }
}
