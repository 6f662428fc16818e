use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scales::scoring::{RawAnswers, ScoreResult};

/// Identifier wrapper for stored submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseId(pub String);

/// Request metadata stamped on a submission. Never read by the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionContext {
    pub submitted_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    /// Coarse location, typically a country code supplied by the edge proxy.
    pub location: Option<String>,
}

impl SubmissionContext {
    pub fn anonymous(submitted_at: DateTime<Utc>) -> Self {
        Self {
            submitted_at,
            user_id: None,
            user_agent: None,
            client_ip: None,
            location: None,
        }
    }
}

/// Repository record holding the raw answers next to the computed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub response_id: ResponseId,
    pub scale_id: String,
    pub context: SubmissionContext,
    pub answers: RawAnswers,
    pub result: ScoreResult,
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ResponseRepository: Send + Sync {
    fn insert(&self, record: StoredResponse) -> Result<StoredResponse, RepositoryError>;
    fn for_scale(&self, scale_id: &str) -> Result<Vec<StoredResponse>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
