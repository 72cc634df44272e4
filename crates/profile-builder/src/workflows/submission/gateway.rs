use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflows::wizard::{ArtifactUrl, FieldErrors, FileHandle, RecordId, WizardKind};

/// Object store holding uploaded profile artifacts.
pub trait ArtifactStore: Send + Sync {
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError>;

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("artifact store rejected the upload: {0}")]
    Rejected(String),
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
}

/// Label to declared value, e.g. `company_name -> Acme Pte Ltd`.
pub type ComparisonFields = BTreeMap<String, String>;

/// Verdict returned by the document verification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified: bool,
    pub message: String,
}

/// AI-backed check of a document against declared business data.
pub trait VerificationService: Send + Sync {
    fn verify(
        &self,
        artifact: &FileHandle,
        comparison: &ComparisonFields,
    ) -> Result<VerificationReport, VerificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
    #[error("document type {0} cannot be verified")]
    UnsupportedDocument(String),
}

/// Fully assembled record handed to the persistence endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub kind: WizardKind,
    /// Present when the wizard edits an existing record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub sections: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    Persisted { id: RecordId },
    Rejected { field_errors: FieldErrors },
}

/// Atomic write of a profile record.
pub trait PersistenceEndpoint: Send + Sync {
    fn submit(&self, record: ProfileRecord) -> Result<PersistOutcome, PersistenceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("persistence endpoint failed: {0}")]
    Internal(String),
}
