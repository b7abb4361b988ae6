//! Document lifecycle: create, open, save, save-as, close
//!
//! At most one document is open at a time. The service registers an observer
//! on the document root; any modification in the tree marks the document as
//! modified until the next successful save.

use serde_json::Value;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

use crate::error::{PicsouError, PicsouResult};
use crate::models::{Document, JsonEntity};

use super::file_io::{read_json_required, write_json_atomic};

struct Opened {
    document: Document,
    path: PathBuf,
}

/// Owns the open document and tracks unsaved changes
pub struct DocumentService {
    opened: Option<Opened>,
    modified: Rc<Cell<bool>>,
}

impl Default for DocumentService {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentService {
    pub fn new() -> Self {
        Self {
            opened: None,
            modified: Rc::new(Cell::new(false)),
        }
    }

    fn ensure_closed(&self) -> PicsouResult<()> {
        match &self.opened {
            Some(opened) => Err(PicsouError::Storage(format!(
                "A document is already open: {}",
                opened.path.display()
            ))),
            None => Ok(()),
        }
    }

    fn opened(&self) -> PicsouResult<&Opened> {
        self.opened
            .as_ref()
            .ok_or_else(|| PicsouError::Storage("No document is open".into()))
    }

    fn opened_mut(&mut self) -> PicsouResult<&mut Opened> {
        self.opened
            .as_mut()
            .ok_or_else(|| PicsouError::Storage("No document is open".into()))
    }

    fn install(&mut self, document: Document, path: PathBuf, modified: bool) {
        let flag = Rc::clone(&self.modified);
        document.subscribe(move |m| {
            debug!(kind = %m.kind, id = %m.id, "document modified");
            flag.set(true);
        });
        self.modified.set(modified);
        self.opened = Some(Opened { document, path });
    }

    /// Start a new, unsaved document that will be saved to `path`
    pub fn new_document(
        &mut self,
        path: impl Into<PathBuf>,
        name: &str,
        description: &str,
    ) -> PicsouResult<()> {
        self.ensure_closed()?;
        let path = path.into();
        info!(path = %path.display(), "new document");
        self.install(Document::new(name, description), path, true);
        Ok(())
    }

    /// Open an existing document; its users start locked
    pub fn open(&mut self, path: impl AsRef<Path>) -> PicsouResult<()> {
        self.ensure_closed()?;
        let path = path.as_ref();
        let json: Value = read_json_required(path)?;
        let document = Document::from_json(&json)?;
        info!(path = %path.display(), users = document.users(false).len(), "document opened");
        self.install(document, path.to_path_buf(), false);
        Ok(())
    }

    /// Seal pending user changes and write the document atomically
    pub fn save(&mut self) -> PicsouResult<()> {
        let opened = self.opened_mut()?;
        opened.document.seal()?;
        let json = opened.document.write()?;
        write_json_atomic(&opened.path, &json)?;
        info!(path = %opened.path.display(), "document saved");
        self.modified.set(false);
        Ok(())
    }

    /// Save to `path` and keep using it for later saves
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> PicsouResult<()> {
        let path = path.into();
        let opened = self.opened_mut()?;
        let previous = std::mem::replace(&mut opened.path, path);
        if let Err(e) = self.save() {
            if let Some(opened) = self.opened.as_mut() {
                opened.path = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Drop the open document, discarding unsaved changes
    pub fn close(&mut self) -> PicsouResult<()> {
        let opened = self
            .opened
            .take()
            .ok_or_else(|| PicsouError::Storage("No document is open".into()))?;
        info!(path = %opened.path.display(), "document closed");
        self.modified.set(false);
        Ok(())
    }

    pub fn is_opened(&self) -> bool {
        self.opened.is_some()
    }

    pub fn is_modified(&self) -> bool {
        self.opened.is_some() && self.modified.get()
    }

    pub fn path(&self) -> Option<&Path> {
        self.opened.as_ref().map(|o| o.path.as_path())
    }

    pub fn document(&self) -> PicsouResult<&Document> {
        Ok(&self.opened()?.document)
    }

    pub fn document_mut(&mut self) -> PicsouResult<&mut Document> {
        Ok(&mut self.opened_mut()?.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfCost;
    use crate::models::{Amount, User};
    use tempfile::TempDir;

    fn alice() -> User {
        User::new("alice", "pw1", &KdfCost::minimal()).unwrap()
    }

    #[test]
    fn test_new_save_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("home.json");

        let mut service = DocumentService::new();
        service.new_document(&path, "Home", "").unwrap();
        assert!(service.is_modified());
        service.document_mut().unwrap().add_user(alice()).unwrap();
        service.save().unwrap();
        assert!(!service.is_modified());
        service.close().unwrap();
        assert!(!service.is_opened());

        service.open(&path).unwrap();
        assert!(!service.is_modified());
        let doc = service.document().unwrap();
        assert!(doc.find_user_by_name("alice").is_some());
    }

    #[test]
    fn test_deep_change_marks_modified() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("home.json");
        let mut service = DocumentService::new();
        service.new_document(&path, "Home", "").unwrap();
        let uid = service.document_mut().unwrap().add_user(alice()).unwrap();
        service.save().unwrap();

        let user = service.document_mut().unwrap().find_user_mut(uid).unwrap();
        user.add_budget(Amount::from_cents(100), "Food", "").unwrap();

        assert!(service.is_modified());
    }

    #[test]
    fn test_open_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("home.json");
        let mut service = DocumentService::new();
        service.new_document(&path, "Home", "").unwrap();
        service.save().unwrap();

        assert!(service.open(&path).is_err());
        assert!(service.new_document(&path, "Other", "").is_err());
    }

    #[test]
    fn test_save_without_document_fails() {
        let mut service = DocumentService::new();
        assert!(service.save().is_err());
        assert!(service.close().is_err());
        assert!(service.document().is_err());
    }

    #[test]
    fn test_save_as_switches_path() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.json");
        let second = temp_dir.path().join("b.json");
        let mut service = DocumentService::new();
        service.new_document(&first, "Home", "").unwrap();
        service.save_as(&second).unwrap();

        assert!(second.exists());
        assert!(!first.exists());
        assert_eq!(service.path(), Some(second.as_path()));
    }

    #[test]
    fn test_open_corrupt_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, r#"{"major": 1, "minor": 0, "name": "x", "extra": 1}"#).unwrap();

        let mut service = DocumentService::new();
        assert!(matches!(service.open(&path), Err(PicsouError::CorruptData(_))));
        assert!(!service.is_opened());
    }
}
