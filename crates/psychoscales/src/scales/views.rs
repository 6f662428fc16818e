use serde::Serialize;

use super::definition::{ItemId, OptionChoice};
use super::validation::ValidatedScale;

/// Listing entry used by catalog pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub language: String,
    pub item_count: usize,
}

impl ScaleSummary {
    pub fn from_scale(scale: &ValidatedScale) -> Self {
        let definition = scale.definition();
        Self {
            id: definition.id.clone(),
            title: definition.title.clone(),
            description: definition
                .abstract_text
                .clone()
                .or_else(|| definition.description.clone()),
            language: definition.language.clone(),
            item_count: definition.items.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagGroup {
    pub tag: String,
    pub scales: Vec<ScaleSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    /// Form field the answer must be submitted under.
    pub field: String,
    pub prompt: String,
}

/// Everything a form renderer needs to present one scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleView {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub tag: String,
    pub language: String,
    pub items: Vec<ItemView>,
    pub choices: Vec<OptionChoice>,
    pub subscales: Vec<String>,
}

impl ScaleView {
    pub fn from_scale(scale: &ValidatedScale) -> Self {
        let definition = scale.definition();
        Self {
            id: definition.id.clone(),
            title: definition.title.clone(),
            description: definition.description.clone(),
            instructions: definition.instructions.clone(),
            tag: definition.tag.clone(),
            language: definition.language.clone(),
            items: definition
                .items
                .iter()
                .map(|(id, item)| ItemView {
                    id: *id,
                    field: id.field_name(),
                    prompt: item.prompt.clone(),
                })
                .collect(),
            choices: scale.domain().choices(),
            subscales: definition.subscales.keys().cloned().collect(),
        }
    }
}
