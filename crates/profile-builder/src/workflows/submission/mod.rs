//! Submission saga: verification gate, ordered uploads, atomic persist, and
//! compensation of uploads when anything after them fails.

mod compensation;
mod drive;
mod gateway;
mod plan;
mod saga;

pub use compensation::{CompensatingAction, CompensationReport, CompensationStack};
pub use drive::{artifact_name, file_id_from_url, DriveConnector, GoogleDriveArtifactStore};
pub use gateway::{
    ArtifactStore, ComparisonFields, PersistOutcome, PersistenceEndpoint, PersistenceError,
    ProfileRecord, StorageError, VerificationError, VerificationReport, VerificationService,
};
pub use plan::{PlanError, UploadPlan, UploadRule, UploadStep};
pub use saga::{AbortSignal, SagaOutcome, SagaResult, SubmissionSaga, UploadedArtifact};

#[cfg(test)]
mod tests;
