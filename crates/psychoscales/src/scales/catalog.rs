use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::definition::{DocumentDefaults, ScaleDocument, OTHER_TAG};
use super::validation::{DefinitionError, ValidatedScale};
use super::views::{ScaleSummary, TagGroup};

/// Where scale documents live and how they are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub scales_dir: PathBuf,
    pub defaults: DocumentDefaults,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read scale directory {path}: {source}")]
    ReadDir {
        path: String,
        source: std::io::Error,
    },
}

/// Failure to turn one scale file into a validated scale.
#[derive(Debug, thiserror::Error)]
pub enum ScaleLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid scale document {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("scale {id} is not scoreable: {source}")]
    Definition { id: String, source: DefinitionError },
}

/// File that was skipped during a catalog load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedScale {
    pub source: String,
    pub reason: String,
}

/// Reads, parses and validates one scale file. The scale id is the file stem.
pub fn load_scale_file(
    path: &Path,
    defaults: &DocumentDefaults,
) -> Result<ValidatedScale, ScaleLoadError> {
    let display = path.display().to_string();
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());

    let raw = std::fs::read_to_string(path).map_err(|source| ScaleLoadError::Io {
        path: display.clone(),
        source,
    })?;
    let document: ScaleDocument =
        serde_json::from_str(&raw).map_err(|source| ScaleLoadError::Json {
            path: display,
            source,
        })?;

    document
        .into_definition(id.clone(), defaults)
        .and_then(|definition| definition.validate())
        .map_err(|source| ScaleLoadError::Definition { id, source })
}

/// Immutable set of validated scales.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scales: IndexMap<String, Arc<ValidatedScale>>,
    known_tags: Vec<String>,
    rejected: Vec<RejectedScale>,
}

impl Catalog {
    pub fn new(known_tags: Vec<String>) -> Self {
        Self {
            scales: IndexMap::new(),
            known_tags: known_tags
                .into_iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect(),
            rejected: Vec::new(),
        }
    }

    /// Loads every `*.json` file in the configured directory, in file-name order.
    /// Unreadable or invalid files are recorded as rejected and skipped.
    pub fn load(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let dir = &settings.scales_dir;
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();

        let mut catalog = Self::new(settings.defaults.known_tags.clone());
        for path in paths {
            match load_scale_file(&path, &settings.defaults) {
                Ok(scale) => {
                    debug!(scale_id = scale.id(), "loaded scale definition");
                    catalog.insert(scale);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping scale definition");
                    catalog.rejected.push(RejectedScale {
                        source: path.display().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            loaded = catalog.len(),
            rejected = catalog.rejected.len(),
            dir = %dir.display(),
            "scale catalog loaded"
        );
        Ok(catalog)
    }

    /// Adds or replaces a scale under its id.
    pub fn insert(&mut self, scale: ValidatedScale) {
        self.scales.insert(scale.id().to_string(), Arc::new(scale));
    }

    pub fn get(&self, id: &str) -> Option<Arc<ValidatedScale>> {
        self.scales.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn scales(&self) -> impl Iterator<Item = &Arc<ValidatedScale>> {
        self.scales.values()
    }

    pub fn rejected(&self) -> &[RejectedScale] {
        &self.rejected
    }

    /// Groups scales by tag: known tags in configured order, then `other`. Empty groups are
    /// omitted. `language` restricts the listing to one locale.
    pub fn grouped_by_tag(&self, language: Option<&str>) -> Vec<TagGroup> {
        let mut order: Vec<&str> = self.known_tags.iter().map(String::as_str).collect();
        if !order.contains(&OTHER_TAG) {
            order.push(OTHER_TAG);
        }

        order
            .into_iter()
            .filter_map(|tag| {
                let scales: Vec<ScaleSummary> = self
                    .scales
                    .values()
                    .filter(|scale| scale.definition().tag == tag)
                    .filter(|scale| {
                        language.map_or(true, |language| {
                            scale.definition().language.eq_ignore_ascii_case(language)
                        })
                    })
                    .map(|scale| ScaleSummary::from_scale(scale))
                    .collect();

                (!scales.is_empty()).then(|| TagGroup {
                    tag: tag.to_string(),
                    scales,
                })
            })
            .collect()
    }
}

/// Shared owner of the current catalog snapshot.
///
/// Readers get an `Arc<Catalog>` that never changes underneath them; reloads build a fresh
/// catalog and swap the pointer.
#[derive(Debug)]
pub struct CatalogHandle {
    settings: CatalogSettings,
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn new(settings: CatalogSettings, catalog: Catalog) -> Self {
        Self {
            settings,
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn load(settings: CatalogSettings) -> Result<Self, CatalogError> {
        let catalog = Catalog::load(&settings)?;
        Ok(Self::new(settings, catalog))
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the scale directory. On failure the previous snapshot stays current.
    pub fn reload(&self) -> Result<Arc<Catalog>, CatalogError> {
        let catalog = Catalog::load(&self.settings)?;
        Ok(self.replace(catalog))
    }

    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let fresh = Arc::new(catalog);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = fresh.clone();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn settings(dir: &Path) -> CatalogSettings {
        CatalogSettings {
            scales_dir: dir.to_path_buf(),
            defaults: DocumentDefaults {
                known_tags: vec!["personality".to_string(), "mood".to_string()],
                default_language: "en".to_string(),
            },
        }
    }

    fn write_scale(dir: &Path, name: &str, tag: &str, language: &str) {
        let body = format!(
            r#"{{
                "title": "{name}",
                "tag": "{tag}",
                "language": "{language}",
                "items": {{ "1": "First", "2": "Second" }},
                "options": {{ "1": "Low", "2": "Mid", "3": "High" }},
                "subscales": {{ "total": [1, -2] }}
            }}"#
        );
        fs::write(dir.join(format!("{name}.json")), body).expect("write scale");
    }

    #[test]
    fn loads_valid_files_and_records_rejections() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_scale(dir.path(), "bfi", "personality", "en");
        write_scale(dir.path(), "phq", "mood", "zh");
        fs::write(dir.path().join("broken.json"), "{ not json").expect("write broken");
        fs::write(
            dir.path().join("empty.json"),
            r#"{ "title": "Empty", "options": { "1": "a", "2": "b" } }"#,
        )
        .expect("write empty");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write notes");

        let catalog = Catalog::load(&settings(dir.path())).expect("catalog loads");

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("bfi").is_some());
        assert!(catalog.get("phq").is_some());
        assert_eq!(catalog.rejected().len(), 2);
        assert!(catalog
            .rejected()
            .iter()
            .any(|rejected| rejected.source.ends_with("empty.json")
                && rejected.reason.contains("no items")));
    }

    #[test]
    fn overflowing_option_domains_are_rejected_at_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("extreme.json"),
            r#"{
                "items": { "1": "Only" },
                "options": { "9223372036854775806": "high", "9223372036854775807": "max" },
                "subscales": { "total": [-1] }
            }"#,
        )
        .expect("write extreme");

        let path = dir.path().join("extreme.json");
        let error =
            load_scale_file(&path, &DocumentDefaults::default()).expect_err("domain rejected");
        assert!(matches!(
            error,
            ScaleLoadError::Definition {
                source: DefinitionError::DomainOutOfBounds { .. },
                ..
            }
        ));
    }

    #[test]
    fn groups_by_known_tag_order_and_filters_language() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_scale(dir.path(), "bfi", "personality", "en");
        write_scale(dir.path(), "phq", "mood", "en");
        write_scale(dir.path(), "tarot", "mysticism", "en");
        write_scale(dir.path(), "sds", "mood", "zh");

        let catalog = Catalog::load(&settings(dir.path())).expect("catalog loads");

        let groups = catalog.grouped_by_tag(None);
        let tags: Vec<&str> = groups.iter().map(|group| group.tag.as_str()).collect();
        assert_eq!(tags, vec!["personality", "mood", "other"]);
        assert_eq!(groups[1].scales.len(), 2);

        let chinese = catalog.grouped_by_tag(Some("zh"));
        assert_eq!(chinese.len(), 1);
        assert_eq!(chinese[0].scales[0].id, "sds");
    }

    #[test]
    fn reload_swaps_snapshot_without_touching_held_copies() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_scale(dir.path(), "bfi", "personality", "en");

        let handle = CatalogHandle::load(settings(dir.path())).expect("handle loads");
        let before = handle.snapshot();
        assert_eq!(before.len(), 1);

        write_scale(dir.path(), "phq", "mood", "en");
        let after = handle.reload().expect("reload succeeds");

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert_eq!(handle.snapshot().len(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_scale(dir.path(), "bfi", "personality", "en");
        let handle = CatalogHandle::load(settings(dir.path())).expect("handle loads");

        let scales_dir = handle.settings().scales_dir.clone();
        drop(dir);

        assert!(!scales_dir.exists());
        assert!(matches!(handle.reload(), Err(CatalogError::ReadDir { .. })));
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = Catalog::load(&settings(Path::new("./does-not-exist-scales")));
        assert!(matches!(result, Err(CatalogError::ReadDir { .. })));
    }
}
