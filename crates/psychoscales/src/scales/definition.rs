use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use super::legacy::{self, LegacyQuestion};
use super::validation::DefinitionError;

/// Tag assigned to scales whose declared tag is missing or unknown.
pub const OTHER_TAG: &str = "other";

/// Identifier of a single questionnaire item.
///
/// Documents may spell ids as integers (`3`) or string-encoded integers (`"3"`); form fields
/// use the decimal string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl ItemId {
    /// Name of the form field carrying this item's raw answer.
    pub fn field_name(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u32>().map(ItemId)
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ItemIdVisitor)
    }
}

struct ItemIdVisitor;

impl<'de> Visitor<'de> for ItemIdVisitor {
    type Value = ItemId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative item id as an integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<ItemId, E> {
        u32::try_from(value)
            .map(ItemId)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<ItemId, E> {
        u32::try_from(value)
            .map(ItemId)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<ItemId, E> {
        value
            .parse()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
    }
}

/// Membership of an item in a subscale, carrying its polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ItemRef {
    pub item: ItemId,
    pub reversed: bool,
}

impl ItemRef {
    pub const fn direct(item: u32) -> Self {
        Self {
            item: ItemId(item),
            reversed: false,
        }
    }

    pub const fn reversed(item: u32) -> Self {
        Self {
            item: ItemId(item),
            reversed: true,
        }
    }
}

impl<'de> Deserialize<'de> for ItemRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ItemRefVisitor)
    }
}

/// Accepts the signed shorthand (`-3`, `"-3"`) as well as `{ "item": 3, "reversed": true }`.
struct ItemRefVisitor;

impl ItemRefVisitor {
    fn signed<E: de::Error>(self, value: i64) -> Result<ItemRef, E> {
        let item = u32::try_from(value.unsigned_abs())
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))?;
        Ok(ItemRef {
            item: ItemId(item),
            reversed: value < 0,
        })
    }
}

impl<'de> Visitor<'de> for ItemRefVisitor {
    type Value = ItemRef;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a signed item reference or an object with `item` and `reversed`")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<ItemRef, E> {
        self.signed(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<ItemRef, E> {
        ItemIdVisitor.visit_u64(value).map(|item| ItemRef {
            item,
            reversed: false,
        })
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<ItemRef, E> {
        let trimmed = value.trim();
        let (reversed, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let item = digits
            .parse::<ItemId>()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))?;
        Ok(ItemRef { item, reversed })
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<ItemRef, A::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Tagged {
            item: ItemId,
            #[serde(default)]
            reversed: bool,
        }

        let tagged = Tagged::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(ItemRef {
            item: tagged.item,
            reversed: tagged.reversed,
        })
    }
}

/// A single question as presented to the respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ItemDocument")]
pub struct Item {
    pub prompt: String,
}

impl Item {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemDocument {
    Prompt(String),
    Detailed {
        #[serde(alias = "text")]
        prompt: String,
    },
}

impl From<ItemDocument> for Item {
    fn from(value: ItemDocument) -> Self {
        match value {
            ItemDocument::Prompt(prompt) | ItemDocument::Detailed { prompt } => Self { prompt },
        }
    }
}

/// Shared answer domain for every item of a scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDomain {
    min: i64,
    max: i64,
    labels: IndexMap<i64, String>,
}

impl OptionDomain {
    /// Builds a domain from labelled option values; `None` when no options are declared.
    pub fn from_labels(labels: IndexMap<i64, String>) -> Option<Self> {
        let min = *labels.keys().min()?;
        let max = *labels.keys().max()?;
        Some(Self { min, max, labels })
    }

    /// Builds an unlabelled domain, as produced by the legacy per-question range format.
    pub fn from_bounds(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            labels: IndexMap::new(),
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn labels(&self) -> &IndexMap<i64, String> {
        &self.labels
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Reverse-keys an in-domain value: `min + max - value`.
    pub fn reverse(&self, value: i64) -> i64 {
        self.min + self.max - value
    }

    /// Answer choices in presentation order. Unlabelled domains list every integer in range.
    pub fn choices(&self) -> Vec<OptionChoice> {
        if self.labels.is_empty() {
            return (self.min..=self.max)
                .map(|value| OptionChoice {
                    value,
                    label: value.to_string(),
                })
                .collect();
        }

        self.labels
            .iter()
            .map(|(value, label)| OptionChoice {
                value: *value,
                label: label.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionChoice {
    pub value: i64,
    pub label: String,
}

/// Strongly typed scale definition prior to validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleDefinition {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub abstract_text: Option<String>,
    pub instructions: Option<String>,
    pub tag: String,
    pub language: String,
    pub items: IndexMap<ItemId, Item>,
    pub domain: Option<OptionDomain>,
    pub subscales: IndexMap<String, Vec<ItemRef>>,
}

/// Catalog-wide defaults applied while turning a document into a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDefaults {
    pub known_tags: Vec<String>,
    pub default_language: String,
}

impl DocumentDefaults {
    /// Lowercased tag when it belongs to the known set, otherwise [`OTHER_TAG`].
    pub fn resolve_tag(&self, tag: Option<&str>) -> String {
        let Some(tag) = tag.map(str::trim).filter(|tag| !tag.is_empty()) else {
            return OTHER_TAG.to_string();
        };

        self.known_tags
            .iter()
            .find(|known| known.eq_ignore_ascii_case(tag))
            .map(|known| known.to_ascii_lowercase())
            .unwrap_or_else(|| OTHER_TAG.to_string())
    }
}

impl Default for DocumentDefaults {
    fn default() -> Self {
        Self {
            known_tags: Vec::new(),
            default_language: "en".to_string(),
        }
    }
}

/// Serialized form of a scale as authored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScaleDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, alias = "lang")]
    pub language: Option<String>,
    /// Entries in document order; ids that collide (`"1"` and `"01"`) are rejected later.
    #[serde(default, deserialize_with = "item_entries")]
    pub items: Vec<(ItemId, Item)>,
    #[serde(default)]
    pub options: IndexMap<i64, String>,
    #[serde(default)]
    pub subscales: IndexMap<String, Vec<ItemRef>>,
    /// Deprecated per-question layout; only read when `items` is empty.
    #[serde(default)]
    pub questions: Vec<LegacyQuestion>,
}

impl ScaleDocument {
    pub fn into_definition(
        self,
        id: impl Into<String>,
        defaults: &DocumentDefaults,
    ) -> Result<ScaleDefinition, DefinitionError> {
        let tag = defaults.resolve_tag(self.tag.as_deref());
        let language = self
            .language
            .map(|language| language.trim().to_string())
            .filter(|language| !language.is_empty())
            .unwrap_or_else(|| defaults.default_language.clone());

        let (items, domain, subscales) = if self.items.is_empty() && !self.questions.is_empty() {
            let imported = legacy::import_questions(self.questions)?;
            (imported.items, Some(imported.domain), imported.subscales)
        } else {
            (
                unique_items(self.items)?,
                OptionDomain::from_labels(self.options),
                self.subscales,
            )
        };

        Ok(ScaleDefinition {
            id: id.into(),
            title: self.title,
            description: self.description,
            abstract_text: self.abstract_text,
            instructions: self.instructions,
            tag,
            language,
            items,
            domain,
            subscales,
        })
    }
}

fn item_entries<'de, D>(deserializer: D) -> Result<Vec<(ItemId, Item)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(ItemId, Item)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of item ids to prompts")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<ItemId, Item>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

fn unique_items(entries: Vec<(ItemId, Item)>) -> Result<IndexMap<ItemId, Item>, DefinitionError> {
    let mut items = IndexMap::with_capacity(entries.len());
    for (id, item) in entries {
        if items.insert(id, item).is_some() {
            return Err(DefinitionError::DuplicateItem { item: id });
        }
    }
    Ok(items)
}
