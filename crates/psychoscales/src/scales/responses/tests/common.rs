use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::scales::catalog::{Catalog, CatalogHandle, CatalogSettings};
use crate::scales::definition::{
    DocumentDefaults, Item, ItemId, ItemRef, OptionDomain, ScaleDefinition,
};
use crate::scales::responses::repository::{
    RepositoryError, ResponseId, ResponseRepository, StoredResponse, SubmissionContext,
};
use crate::scales::responses::{scale_router, ScaleResponseService};
use crate::scales::scoring::RawAnswers;

pub(super) fn defaults() -> DocumentDefaults {
    DocumentDefaults {
        known_tags: vec!["personality".to_string(), "mood".to_string()],
        default_language: "en".to_string(),
    }
}

/// Three-item agreeableness scale; item 2 is reversed and shared by both subscales.
pub(super) fn agreeableness() -> ScaleDefinition {
    let mut items = IndexMap::new();
    items.insert(ItemId(1), Item::new("I sympathize with others' feelings"));
    items.insert(ItemId(2), Item::new("I am not interested in other people's problems"));
    items.insert(ItemId(3), Item::new("I make people feel at ease"));

    let mut labels = IndexMap::new();
    labels.insert(1, "Strongly disagree".to_string());
    labels.insert(2, "Disagree".to_string());
    labels.insert(3, "Neutral".to_string());
    labels.insert(4, "Agree".to_string());
    labels.insert(5, "Strongly agree".to_string());

    let mut subscales = IndexMap::new();
    subscales.insert(
        "warmth".to_string(),
        vec![ItemRef::direct(1), ItemRef::reversed(2)],
    );
    subscales.insert(
        "ease".to_string(),
        vec![ItemRef::direct(3), ItemRef::reversed(2)],
    );

    ScaleDefinition {
        id: "agreeableness".to_string(),
        title: "Agreeableness".to_string(),
        description: Some("Short agreeableness inventory".to_string()),
        abstract_text: None,
        instructions: Some("Rate how well each statement describes you.".to_string()),
        tag: "personality".to_string(),
        language: "en".to_string(),
        items,
        domain: OptionDomain::from_labels(labels),
        subscales,
    }
}

pub(super) fn catalog_handle() -> Arc<CatalogHandle> {
    let defaults = defaults();
    let mut catalog = Catalog::new(defaults.known_tags.clone());
    catalog.insert(agreeableness().validate().expect("fixture scale valid"));

    Arc::new(CatalogHandle::new(
        CatalogSettings {
            scales_dir: "./does-not-exist-scales".into(),
            defaults,
        },
        catalog,
    ))
}

pub(super) fn complete_answers() -> RawAnswers {
    [("1", 4), ("2", 2), ("3", 5)].into_iter().collect()
}

pub(super) fn context() -> SubmissionContext {
    let submitted_at = Utc
        .with_ymd_and_hms(2025, 5, 2, 18, 45, 0)
        .single()
        .expect("valid timestamp");
    SubmissionContext {
        submitted_at,
        user_id: Some("respondent-7".to_string()),
        user_agent: Some("integration-test".to_string()),
        client_ip: Some("203.0.113.9".to_string()),
        location: Some("NL".to_string()),
    }
}

pub(super) fn build_service() -> (ScaleResponseService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ScaleResponseService::new(catalog_handle(), repository.clone());
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ResponseId, StoredResponse>>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl ResponseRepository for MemoryRepository {
    fn insert(&self, record: StoredResponse) -> Result<StoredResponse, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.response_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.response_id.clone(), record.clone());
        Ok(record)
    }

    fn for_scale(&self, scale_id: &str) -> Result<Vec<StoredResponse>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<StoredResponse> = guard
            .values()
            .filter(|record| record.scale_id == scale_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.response_id.0.cmp(&b.response_id.0));
        Ok(records)
    }
}

pub(super) struct UnavailableRepository;

impl ResponseRepository for UnavailableRepository {
    fn insert(&self, _record: StoredResponse) -> Result<StoredResponse, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_scale(&self, _scale_id: &str) -> Result<Vec<StoredResponse>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf8 payload")
}

pub(super) fn router_with_service(service: ScaleResponseService<MemoryRepository>) -> axum::Router {
    scale_router(Arc::new(service))
}
