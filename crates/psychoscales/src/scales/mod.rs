pub mod catalog;
pub mod definition;
pub mod export;
pub mod legacy;
pub mod responses;
pub mod scoring;
pub mod validation;
pub mod views;

pub use catalog::{
    load_scale_file, Catalog, CatalogError, CatalogHandle, CatalogSettings, RejectedScale,
    ScaleLoadError,
};
pub use definition::{
    DocumentDefaults, Item, ItemId, ItemRef, OptionChoice, OptionDomain, ScaleDefinition,
    ScaleDocument, OTHER_TAG,
};
pub use export::{ExportError, ExportTable, METADATA_COLUMNS};
pub use scoring::{score, AnswerError, RawAnswers, ScoreResult, SubscaleScore};
pub use validation::{validate, DefinitionError, ValidatedScale};
