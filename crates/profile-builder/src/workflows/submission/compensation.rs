use serde::Serialize;
use tracing::{info, warn};

use super::gateway::ArtifactStore;
use crate::workflows::wizard::ArtifactUrl;

/// Reversal of an irreversible side effect that already succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensatingAction {
    DeleteArtifact { section: String, url: ArtifactUrl },
}

/// Bookkeeping of an unwind: every delete attempted and the ones that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompensationReport {
    pub attempted: Vec<ArtifactUrl>,
    pub failed: Vec<ArtifactUrl>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Actions pushed after each successful upload and unwound, newest first, on failure.
#[derive(Debug, Default)]
pub struct CompensationStack {
    actions: Vec<CompensatingAction>,
}

impl CompensationStack {
    pub fn push(&mut self, action: CompensatingAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The protected work is durable; nothing left to reverse.
    pub fn commit(self) {}

    /// Attempt every action exactly once. Failures are logged, never raised.
    pub fn unwind(self, store: &dyn ArtifactStore) -> CompensationReport {
        let mut report = CompensationReport::default();

        for action in self.actions.into_iter().rev() {
            match action {
                CompensatingAction::DeleteArtifact { section, url } => {
                    report.attempted.push(url.clone());
                    match store.delete(&url) {
                        Ok(()) => info!(%section, %url, "compensating delete completed"),
                        Err(err) => {
                            warn!(%section, %url, error = %err, "compensating delete failed");
                            report.failed.push(url);
                        }
                    }
                }
            }
        }

        report
    }
}
