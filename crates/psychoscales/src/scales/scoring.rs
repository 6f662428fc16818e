use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::definition::ItemId;
use super::validation::ValidatedScale;

/// Raw form answers keyed by the decimal item id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawAnswers(BTreeMap<String, String>);

impl RawAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Raw answer submitted for `item`, if any.
    pub fn for_item(&self, item: ItemId) -> Option<&str> {
        self.get(&item.field_name())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for RawAnswers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut answers = Self::new();
        for (key, value) in iter {
            answers.insert(key, value);
        }
        answers
    }
}

impl From<HashMap<String, String>> for RawAnswers {
    fn from(value: HashMap<String, String>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for RawAnswers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum AnswerValue {
            Integer(i64),
            Text(String),
        }

        let raw = BTreeMap::<String, AnswerValue>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| match value {
                AnswerValue::Integer(value) => (key, value.to_string()),
                AnswerValue::Text(value) => (key, value),
            })
            .collect())
    }
}

/// Answer-shape failures; every variant names the offending item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("no answer submitted for item {item}")]
    Missing { item: ItemId },
    #[error("answer '{raw}' for item {item} is not an integer")]
    Malformed { item: ItemId, raw: String },
    #[error("answer {value} for item {item} is outside [{min}, {max}]")]
    OutOfRange {
        item: ItemId,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl AnswerError {
    pub fn item(&self) -> ItemId {
        match self {
            Self::Missing { item } | Self::Malformed { item, .. } | Self::OutOfRange { item, .. } => {
                *item
            }
        }
    }
}

/// Aggregate for one subscale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscaleScore {
    pub sum: i64,
    /// Theoretical `[min, max]` of `sum` for this subscale.
    pub range: [i64; 2],
    /// `sum / k` rounded half away from zero to two decimals.
    pub average: f64,
}

/// Per-subscale scores in the definition's subscale order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreResult {
    subscales: IndexMap<String, SubscaleScore>,
}

impl ScoreResult {
    pub fn get(&self, subscale: &str) -> Option<&SubscaleScore> {
        self.subscales.get(subscale)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubscaleScore)> {
        self.subscales
            .iter()
            .map(|(name, score)| (name.as_str(), score))
    }

    pub fn len(&self) -> usize {
        self.subscales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscales.is_empty()
    }
}

impl ValidatedScale {
    pub fn score(&self, answers: &RawAnswers) -> Result<ScoreResult, AnswerError> {
        score(self, answers)
    }
}

/// Scores every subscale of `scale`. Any answer error aborts the whole computation.
pub fn score(scale: &ValidatedScale, answers: &RawAnswers) -> Result<ScoreResult, AnswerError> {
    let domain = scale.domain();
    let mut subscales = IndexMap::with_capacity(scale.subscales().len());

    for (name, refs) in scale.subscales() {
        // validation guarantees `min * k`, `max * k` and `min + max` fit in i64
        let count = refs.len();
        let k = count as i64;
        let range = [domain.min() * k, domain.max() * k];

        let mut sum: i64 = 0;
        for reference in refs {
            let value = answer_value(reference.item, answers, domain.min(), domain.max())?;
            let contribution = if reference.reversed {
                domain.reverse(value)
            } else {
                value
            };
            sum += contribution;
        }

        subscales.insert(
            name.clone(),
            SubscaleScore {
                sum,
                range,
                average: rounded_average(sum, count),
            },
        );
    }

    Ok(ScoreResult { subscales })
}

fn answer_value(
    item: ItemId,
    answers: &RawAnswers,
    min: i64,
    max: i64,
) -> Result<i64, AnswerError> {
    let raw = answers
        .for_item(item)
        .ok_or(AnswerError::Missing { item })?;
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AnswerError::Malformed {
            item,
            raw: raw.to_string(),
        })?;

    if !(min..=max).contains(&value) {
        return Err(AnswerError::OutOfRange {
            item,
            value,
            min,
            max,
        });
    }

    Ok(value)
}

/// Rounds `sum / count` to two decimals, half away from zero, using integer hundredths.
fn rounded_average(sum: i64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }

    let numerator = i128::from(sum) * 100;
    let denominator = count as i128;
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let hundredths = if remainder.abs() * 2 >= denominator {
        quotient + numerator.signum()
    } else {
        quotient
    };

    hundredths as f64 / 100.0
}
