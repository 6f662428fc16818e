use indexmap::IndexMap;

use super::definition::{Item, ItemId, ItemRef, OptionDomain, ScaleDefinition};

/// Structural problems that make a scale definition unscoreable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("scale defines no items")]
    NoItems,
    #[error("scale declares no answer options")]
    MissingDomain,
    #[error("answer options must span at least two values (min {min}, max {max})")]
    EmptyDomain { min: i64, max: i64 },
    #[error("answer options [{min}, {max}] cannot be reverse-keyed without overflow")]
    DomainOutOfBounds { min: i64, max: i64 },
    #[error("unlabelled answer range [{min}, {max}] spans more than {limit} values")]
    DomainTooWide { min: i64, max: i64, limit: i64 },
    #[error("subscale '{subscale}' range overflows with {items} items on [{min}, {max}]")]
    SubscaleOverflow {
        subscale: String,
        items: usize,
        min: i64,
        max: i64,
    },
    #[error("subscale '{subscale}' references unknown item {item}")]
    UnknownItem { subscale: String, item: ItemId },
    #[error("subscale '{subscale}' lists no items")]
    EmptySubscale { subscale: String },
    #[error("item {item} is declared more than once")]
    DuplicateItem { item: ItemId },
    #[error(
        "legacy question {item} uses range [{found_min}, {found_max}] but the scale uses [{min}, {max}]"
    )]
    InconsistentLegacyRange {
        item: ItemId,
        min: i64,
        max: i64,
        found_min: i64,
        found_max: i64,
    },
}

/// Largest number of values an unlabelled domain may span; every value becomes a choice.
pub const MAX_UNLABELLED_SPAN: i64 = 1_000;

/// A definition that passed [`validate`]; the only input the scoring engine accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedScale {
    definition: ScaleDefinition,
    domain: OptionDomain,
}

impl ValidatedScale {
    pub fn definition(&self) -> &ScaleDefinition {
        &self.definition
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn title(&self) -> &str {
        &self.definition.title
    }

    pub fn items(&self) -> &IndexMap<ItemId, Item> {
        &self.definition.items
    }

    pub fn subscales(&self) -> &IndexMap<String, Vec<ItemRef>> {
        &self.definition.subscales
    }

    pub fn domain(&self) -> &OptionDomain {
        &self.domain
    }

    pub fn into_definition(self) -> ScaleDefinition {
        self.definition
    }
}

impl ScaleDefinition {
    pub fn validate(self) -> Result<ValidatedScale, DefinitionError> {
        validate(self)
    }
}

/// Checks, in order: items present, domain present, non-degenerate and bounded, every
/// subscale reference resolvable, no empty subscale, subscale ranges representable in `i64`.
/// The first failure is reported.
pub fn validate(definition: ScaleDefinition) -> Result<ValidatedScale, DefinitionError> {
    if definition.items.is_empty() {
        return Err(DefinitionError::NoItems);
    }

    let domain = definition
        .domain
        .clone()
        .ok_or(DefinitionError::MissingDomain)?;
    if domain.min() >= domain.max() {
        return Err(DefinitionError::EmptyDomain {
            min: domain.min(),
            max: domain.max(),
        });
    }
    check_domain_bounds(&domain)?;

    for (subscale, refs) in &definition.subscales {
        if let Some(missing) = refs
            .iter()
            .find(|reference| !definition.items.contains_key(&reference.item))
        {
            return Err(DefinitionError::UnknownItem {
                subscale: subscale.clone(),
                item: missing.item,
            });
        }
    }

    if let Some((subscale, _)) = definition
        .subscales
        .iter()
        .find(|(_, refs)| refs.is_empty())
    {
        return Err(DefinitionError::EmptySubscale {
            subscale: subscale.clone(),
        });
    }

    for (subscale, refs) in &definition.subscales {
        check_subscale_range(subscale, refs.len(), &domain)?;
    }

    Ok(ValidatedScale { definition, domain })
}

fn check_domain_bounds(domain: &OptionDomain) -> Result<(), DefinitionError> {
    let (min, max) = (domain.min(), domain.max());
    if min.checked_add(max).is_none() {
        return Err(DefinitionError::DomainOutOfBounds { min, max });
    }

    let span = i128::from(max) - i128::from(min) + 1;
    if domain.labels().is_empty() && span > i128::from(MAX_UNLABELLED_SPAN) {
        return Err(DefinitionError::DomainTooWide {
            min,
            max,
            limit: MAX_UNLABELLED_SPAN,
        });
    }

    Ok(())
}

/// Every partial sum of in-domain values lies within `[min * k, max * k]`, so scoring cannot
/// overflow once both bounds fit.
fn check_subscale_range(
    subscale: &str,
    items: usize,
    domain: &OptionDomain,
) -> Result<(), DefinitionError> {
    let (min, max) = (domain.min(), domain.max());
    let fits = i64::try_from(items)
        .ok()
        .and_then(|k| min.checked_mul(k).zip(max.checked_mul(k)))
        .is_some();

    if fits {
        Ok(())
    } else {
        Err(DefinitionError::SubscaleOverflow {
            subscale: subscale.to_string(),
            items,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ScaleDefinition {
        let mut items = IndexMap::new();
        items.insert(ItemId(1), Item::new("I enjoy meeting new people"));
        items.insert(ItemId(2), Item::new("I prefer quiet evenings"));

        let mut subscales = IndexMap::new();
        subscales.insert(
            "extraversion".to_string(),
            vec![ItemRef::direct(1), ItemRef::reversed(2)],
        );

        ScaleDefinition {
            id: "extraversion-short".to_string(),
            title: "Extraversion (short)".to_string(),
            description: None,
            abstract_text: None,
            instructions: None,
            tag: "personality".to_string(),
            language: "en".to_string(),
            items,
            domain: Some(OptionDomain::from_bounds(1, 5)),
            subscales,
        }
    }

    #[test]
    fn accepts_well_formed_definition() {
        let scale = validate(definition()).expect("definition is valid");
        assert_eq!(scale.id(), "extraversion-short");
        assert_eq!(scale.domain().min(), 1);
        assert_eq!(scale.domain().max(), 5);
    }

    #[test]
    fn rejects_empty_item_set_first() {
        let mut candidate = definition();
        candidate.items.clear();
        candidate.domain = None;

        assert_eq!(validate(candidate), Err(DefinitionError::NoItems));
    }

    #[test]
    fn rejects_missing_or_degenerate_domain() {
        let mut candidate = definition();
        candidate.domain = None;
        assert_eq!(validate(candidate), Err(DefinitionError::MissingDomain));

        let mut candidate = definition();
        candidate.domain = Some(OptionDomain::from_bounds(3, 3));
        assert_eq!(
            validate(candidate),
            Err(DefinitionError::EmptyDomain { min: 3, max: 3 })
        );
    }

    #[test]
    fn names_subscale_and_item_for_unresolved_reference() {
        let mut candidate = definition();
        candidate
            .subscales
            .insert("openness".to_string(), vec![ItemRef::reversed(9)]);

        assert_eq!(
            validate(candidate),
            Err(DefinitionError::UnknownItem {
                subscale: "openness".to_string(),
                item: ItemId(9),
            })
        );
    }

    #[test]
    fn unresolved_references_are_reported_before_empty_subscales() {
        let mut candidate = definition();
        candidate.subscales.insert("empty".to_string(), Vec::new());
        candidate
            .subscales
            .insert("broken".to_string(), vec![ItemRef::direct(7)]);

        assert!(matches!(
            validate(candidate),
            Err(DefinitionError::UnknownItem { .. })
        ));
    }

    #[test]
    fn rejects_empty_subscale() {
        let mut candidate = definition();
        candidate.subscales.insert("empty".to_string(), Vec::new());

        assert_eq!(
            validate(candidate),
            Err(DefinitionError::EmptySubscale {
                subscale: "empty".to_string()
            })
        );
    }

    #[test]
    fn rejects_domain_whose_reverse_keying_overflows() {
        let mut labels = IndexMap::new();
        labels.insert(i64::MAX - 1, "almost".to_string());
        labels.insert(i64::MAX, "max".to_string());

        let mut candidate = definition();
        candidate.domain = OptionDomain::from_labels(labels);

        assert_eq!(
            validate(candidate),
            Err(DefinitionError::DomainOutOfBounds {
                min: i64::MAX - 1,
                max: i64::MAX,
            })
        );
    }

    #[test]
    fn rejects_subscale_whose_range_overflows() {
        let mut candidate = definition();
        candidate.domain = OptionDomain::from_labels(
            [(0, "none".to_string()), (i64::MAX, "all".to_string())]
                .into_iter()
                .collect(),
        );

        assert_eq!(
            validate(candidate),
            Err(DefinitionError::SubscaleOverflow {
                subscale: "extraversion".to_string(),
                items: 2,
                min: 0,
                max: i64::MAX,
            })
        );
    }

    #[test]
    fn single_item_subscale_on_extreme_labelled_domain_is_valid() {
        let mut candidate = definition();
        candidate.subscales.clear();
        candidate
            .subscales
            .insert("only".to_string(), vec![ItemRef::reversed(1)]);
        candidate.domain = OptionDomain::from_labels(
            [(0, "none".to_string()), (i64::MAX, "all".to_string())]
                .into_iter()
                .collect(),
        );

        let scale = validate(candidate).expect("bounds fit for one item");
        assert_eq!(scale.domain().reverse(i64::MAX), 0);
    }

    #[test]
    fn rejects_unlabelled_domain_wider_than_limit() {
        let mut candidate = definition();
        candidate.domain = Some(OptionDomain::from_bounds(0, 4_000_000_000));

        assert_eq!(
            validate(candidate),
            Err(DefinitionError::DomainTooWide {
                min: 0,
                max: 4_000_000_000,
                limit: MAX_UNLABELLED_SPAN,
            })
        );

        let mut candidate = definition();
        candidate.domain = Some(OptionDomain::from_bounds(0, MAX_UNLABELLED_SPAN - 1));
        assert!(validate(candidate).is_ok());
    }

    #[test]
    fn unscored_items_are_allowed() {
        let mut candidate = definition();
        candidate
            .items
            .insert(ItemId(3), Item::new("Demographic follow-up"));

        assert!(validate(candidate).is_ok());
    }
}
