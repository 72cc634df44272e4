//! Hosted wizard sessions and their HTTP surface.

pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use repository::{
    SessionId, SessionRepository, SessionRepositoryError, StepView, WizardSession,
    WizardSessionView,
};
pub use router::{wizard_router, FILE_NAME_HEADER};
pub use service::{Collaborators, SessionServiceError, SubmissionReport, WizardSessionService};
