//! Deprecated per-question layout where every question carries its own `range`,
//! `subscale` name and `reverse` flag. Imported into the shared-domain model.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use super::definition::{Item, ItemId, ItemRef, OptionDomain};
use super::validation::DefinitionError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyQuestion {
    pub id: ItemId,
    /// Empty when the question is collected but not scored.
    #[serde(default)]
    pub subscale: String,
    #[serde(default)]
    pub text: String,
    pub range: [i64; 2],
    #[serde(default, deserialize_with = "truthy")]
    pub reverse: bool,
}

pub(crate) struct LegacyImport {
    pub(crate) items: IndexMap<ItemId, Item>,
    pub(crate) domain: OptionDomain,
    pub(crate) subscales: IndexMap<String, Vec<ItemRef>>,
}

/// Converts legacy questions; every question must declare the same range.
pub(crate) fn import_questions(
    questions: Vec<LegacyQuestion>,
) -> Result<LegacyImport, DefinitionError> {
    let mut items = IndexMap::with_capacity(questions.len());
    let mut subscales: IndexMap<String, Vec<ItemRef>> = IndexMap::new();
    let mut bounds: Option<(i64, i64)> = None;

    for question in questions {
        let [found_min, found_max] = question.range;
        match bounds {
            None => bounds = Some((found_min, found_max)),
            Some((min, max)) if (min, max) != (found_min, found_max) => {
                return Err(DefinitionError::InconsistentLegacyRange {
                    item: question.id,
                    min,
                    max,
                    found_min,
                    found_max,
                });
            }
            Some(_) => {}
        }

        if items
            .insert(question.id, Item::new(question.text))
            .is_some()
        {
            return Err(DefinitionError::DuplicateItem { item: question.id });
        }

        let subscale = question.subscale.trim();
        if !subscale.is_empty() {
            subscales
                .entry(subscale.to_string())
                .or_default()
                .push(ItemRef {
                    item: question.id,
                    reversed: question.reverse,
                });
        }
    }

    let (min, max) = bounds.ok_or(DefinitionError::NoItems)?;

    Ok(LegacyImport {
        items,
        domain: OptionDomain::from_bounds(min, max),
        subscales,
    })
}

/// Legacy files flag reversal with `1`, `true` or omit the key.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(flag)) => flag,
        Some(Flag::Int(flag)) => flag != 0,
        None => false,
    })
}
