use metrics_exporter_prometheus::PrometheusHandle;
use psychoscales::scales::responses::{
    RepositoryError, ResponseId, ResponseRepository, StoredResponse,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local response store; contents are lost on restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryResponseRepository {
    records: Arc<Mutex<HashMap<ResponseId, StoredResponse>>>,
}

impl InMemoryResponseRepository {
    fn records(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ResponseId, StoredResponse>>, RepositoryError> {
        self.records.lock().map_err(|_| {
            RepositoryError::Unavailable("response store lock poisoned".to_string())
        })
    }
}

impl ResponseRepository for InMemoryResponseRepository {
    fn insert(&self, record: StoredResponse) -> Result<StoredResponse, RepositoryError> {
        let mut guard = self.records()?;
        if guard.contains_key(&record.response_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.response_id.clone(), record.clone());
        Ok(record)
    }

    fn for_scale(&self, scale_id: &str) -> Result<Vec<StoredResponse>, RepositoryError> {
        let guard = self.records()?;
        let mut matching: Vec<StoredResponse> = guard
            .values()
            .filter(|record| record.scale_id == scale_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.context
                .submitted_at
                .cmp(&b.context.submitted_at)
                .then_with(|| a.response_id.0.cmp(&b.response_id.0))
        });
        Ok(matching)
    }
}
