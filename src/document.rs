//! The currently active processed document
//!
//! Nothing else in a session works until a document exists.

use crate::error::ActionError;
use crate::services::DocumentParser;
use serde::Serialize;
use std::fmt;

/// Text the parsing service puts in front of the stored file's path
pub const RESULT_MARKER: &str = "Results saved to: ";

/// A document the parsing service has processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRef {
    /// Storage path on the collaborator's side, passed back with every chat query
    pub path: String,
    /// The file name the user uploaded
    pub display_name: String,
}

/// A raw file as submitted by the user
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DocumentSession {
    current: Option<DocumentRef>,
}

impl DocumentSession {
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&DocumentRef> {
        self.current.as_ref()
    }

    pub fn activate(&mut self, document: DocumentRef) {
        self.current = Some(document);
    }

    /// Drops the document only; the conversation is the caller's to reset
    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Upload a file to the parsing service and resolve where it was stored.
pub async fn submit<P>(parser: &P, upload: &UploadedFile) -> Result<DocumentRef, ActionError>
where
    P: DocumentParser + ?Sized,
{
    let response = parser
        .parse(&upload.file_name, &upload.bytes)
        .await
        .map_err(|e| {
            if e.is_malformed() {
                ActionError::Parse(e.message)
            } else {
                ActionError::Upload(e.message)
            }
        })?;

    let path = extract_saved_path(&response.result_text).ok_or_else(|| {
        ActionError::Parse(format!("result did not contain {:?}", RESULT_MARKER.trim()))
    })?;

    Ok(DocumentRef {
        path: path.to_string(),
        display_name: upload.file_name.clone(),
    })
}

/// Pull the storage path out of the parsing service's free-text result.
///
/// The path follows the last occurrence of [`RESULT_MARKER`] and runs to the
/// end of that line.
pub fn extract_saved_path(result_text: &str) -> Option<&str> {
    let (_, rest) = result_text.rsplit_once(RESULT_MARKER)?;
    let path = rest.lines().next().map_or("", str::trim);
    (!path.is_empty()).then_some(path)
}
