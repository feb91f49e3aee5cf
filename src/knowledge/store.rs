//! Flat JSON persistence for documents and settings.
//!
//! `documents.json` holds the document list, `settings.json` the API key and
//! selected model. Every write replaces the whole file via a temp file + rename.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::document::Document;

pub const DOCUMENTS_FILE: &str = "documents.json";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed data in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("File \"{0}\" already exists")]
    DuplicateName(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Please enter a valid API key")]
    EmptyApiKey,

    #[error("Please enter a model name")]
    EmptyModel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(rename = "googleApiKey", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "selectedModel", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

pub struct Store {
    dir: PathBuf,
    documents: Vec<Document>,
    settings: StoredSettings,
}

impl Store {
    /// Opens (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let documents: Vec<Document> = read_json(&dir.join(DOCUMENTS_FILE))?.unwrap_or_default();
        let settings: StoredSettings = read_json(&dir.join(SETTINGS_FILE))?.unwrap_or_default();

        debug!(target: "store", dir = %dir.display(), documents = documents.len(), "Store opened");
        Ok(Self {
            dir,
            documents,
            settings,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.documents.iter().any(|d| d.name == name)
    }

    pub fn add(&mut self, document: Document) -> Result<(), StoreError> {
        if self.contains_name(&document.name) {
            return Err(StoreError::DuplicateName(document.name));
        }
        info!(target: "store", name = %document.name, id = %document.id, "Document stored");
        self.documents.push(document);
        self.save_documents()
    }

    pub fn remove(&mut self, id: &str) -> Result<Document, StoreError> {
        let position = self
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = self.documents.remove(position);
        self.save_documents()?;
        info!(target: "store", name = %removed.name, id = %removed.id, "Document removed");
        Ok(removed)
    }

    /// Removes every document, returning how many there were.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let count = self.documents.len();
        self.documents.clear();
        self.save_documents()?;
        Ok(count)
    }

    pub fn settings(&self) -> &StoredSettings {
        &self.settings
    }

    pub fn set_api_key(&mut self, key: &str) -> Result<(), StoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(StoreError::EmptyApiKey);
        }
        self.settings.api_key = Some(key.to_string());
        self.save_settings()
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), StoreError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(StoreError::EmptyModel);
        }
        self.settings.model = Some(model.to_string());
        self.save_settings()
    }

    fn save_documents(&self) -> Result<(), StoreError> {
        write_json(&self.dir.join(DOCUMENTS_FILE), &self.documents)
    }

    fn save_settings(&self) -> Result<(), StoreError> {
        write_json(&self.dir.join(SETTINGS_FILE), &self.settings)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
