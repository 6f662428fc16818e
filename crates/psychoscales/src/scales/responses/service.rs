use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::repository::{ResponseId, ResponseRepository, StoredResponse, SubmissionContext};
use crate::scales::catalog::CatalogHandle;
use crate::scales::export::{ExportError, ExportTable};
use crate::scales::scoring::{AnswerError, RawAnswers, ScoreResult};
use crate::scales::validation::ValidatedScale;

/// Service composing the catalog snapshot, scoring engine and response repository.
pub struct ScaleResponseService<R> {
    catalog: Arc<CatalogHandle>,
    repository: Arc<R>,
}

static RESPONSE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_response_id() -> ResponseId {
    let id = RESPONSE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ResponseId(format!("resp-{id:06}"))
}

/// What the respondent gets back after a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub scale_id: String,
    pub title: String,
    /// `None` when the result could not be persisted.
    pub response_id: Option<ResponseId>,
    pub result: ScoreResult,
}

impl<R> ScaleResponseService<R>
where
    R: ResponseRepository + 'static,
{
    pub fn new(catalog: Arc<CatalogHandle>, repository: Arc<R>) -> Self {
        Self {
            catalog,
            repository,
        }
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Looks a scale up in the current catalog snapshot.
    pub fn scale(&self, scale_id: &str) -> Result<Arc<ValidatedScale>, ResponseServiceError> {
        self.catalog
            .snapshot()
            .get(scale_id)
            .ok_or_else(|| ResponseServiceError::UnknownScale(scale_id.to_string()))
    }

    /// Scores a submission, then tries to store it. Storage failures are logged and leave
    /// `response_id` empty; they never fail the submission.
    pub fn submit(
        &self,
        scale_id: &str,
        answers: RawAnswers,
        context: SubmissionContext,
    ) -> Result<SubmissionOutcome, ResponseServiceError> {
        let scale = self.scale(scale_id)?;
        let result = scale.score(&answers)?;

        let record = StoredResponse {
            response_id: next_response_id(),
            scale_id: scale.id().to_string(),
            context,
            answers,
            result: result.clone(),
        };

        let response_id = match self.repository.insert(record) {
            Ok(stored) => {
                info!(scale_id, response_id = %stored.response_id.0, "stored scale response");
                Some(stored.response_id)
            }
            Err(err) => {
                warn!(scale_id, error = %err, "failed to persist scale response");
                None
            }
        };

        Ok(SubmissionOutcome {
            scale_id: scale.id().to_string(),
            title: scale.title().to_string(),
            response_id,
            result,
        })
    }

    /// Shapes every stored response for `scale_id` against the current definition.
    pub fn export(&self, scale_id: &str) -> Result<ExportTable, ResponseServiceError> {
        let scale = self.scale(scale_id)?;
        let responses = self.repository.for_scale(scale.id())?;
        Ok(ExportTable::shape(&scale, &responses))
    }

    pub fn export_csv(&self, scale_id: &str) -> Result<Vec<u8>, ResponseServiceError> {
        let table = self.export(scale_id)?;
        Ok(table.to_csv_bytes()?)
    }
}

/// Error raised by the response service.
#[derive(Debug, thiserror::Error)]
pub enum ResponseServiceError {
    #[error("scale '{0}' not found")]
    UnknownScale(String),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Repository(#[from] super::repository::RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
