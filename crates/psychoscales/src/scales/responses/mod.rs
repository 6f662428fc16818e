//! Submission gateway: scores respondent answers, persists them best-effort and exports them.

pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use repository::{
    RepositoryError, ResponseId, ResponseRepository, StoredResponse, SubmissionContext,
};
pub use router::scale_router;
pub use service::{ResponseServiceError, ScaleResponseService, SubmissionOutcome};
