//! Filter suggestion descriptors.
//!
//! Hints describe what a type can do (eg. `comparable`) and what a function
//! requires from its parameters. Matching the two yields the filters that make
//! sense for a column.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::functions::{FunctionId, ParameterShape};

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(tag = "id", rename_all = "snake_case")]
pub enum Hint {
    Boolean,
    Comparable,
    Column,
    Array,
    StringLike,
    Uri,
    Email,
    Numeric,
    Temporal,
    Literal,
    Aggregation,
    /// The function is a predicate that can be offered as a filter.
    Filter,
    ParameterCount {
        count: usize,
    },
    Parameter {
        index: usize,
        hints: HintSet,
    },
    AllParameters {
        hints: HintSet,
    },
    Returns {
        hints: HintSet,
    },
}

pub fn parameter_count(count: usize) -> Hint {
    Hint::ParameterCount { count }
}

pub fn parameter(index: usize, hints: HintSet) -> Hint {
    Hint::Parameter { index, hints }
}

pub fn all_parameters(hints: HintSet) -> Hint {
    Hint::AllParameters { hints }
}

pub fn returns(hints: HintSet) -> Hint {
    Hint::Returns { hints }
}

/// The families a filter suggestion can belong to.
pub const FAMILIES: [Hint; 7] = [
    Hint::Boolean,
    Hint::Comparable,
    Hint::Column,
    Hint::Array,
    Hint::StringLike,
    Hint::Uri,
    Hint::Email,
];

/// An immutable set of hints. Operations return new sets.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct HintSet(BTreeSet<Hint>);

impl HintSet {
    pub fn empty() -> Self {
        HintSet(BTreeSet::new())
    }

    pub fn contains(&self, hint: &Hint) -> bool {
        self.0.contains(hint)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_subset(&self, other: &HintSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hint> {
        self.0.iter()
    }

    pub fn union(&self, other: &HintSet) -> HintSet {
        HintSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn with(&self, hint: Hint) -> HintSet {
        let mut set = self.0.clone();
        set.insert(hint);
        HintSet(set)
    }

    /// Hints required from the parameter at `index`, combining
    /// [Hint::Parameter] and [Hint::AllParameters].
    pub fn parameter_hints(&self, index: usize) -> HintSet {
        self.0
            .iter()
            .filter_map(|hint| match hint {
                Hint::Parameter { index: i, hints } if *i == index => Some(hints),
                Hint::AllParameters { hints } => Some(hints),
                _ => None,
            })
            .fold(HintSet::empty(), |acc, hints| acc.union(hints))
    }

    /// Hints of the value a function produces.
    pub fn returned(&self) -> HintSet {
        self.0
            .iter()
            .filter_map(|hint| match hint {
                Hint::Returns { hints } => Some(hints),
                _ => None,
            })
            .fold(HintSet::empty(), |acc, hints| acc.union(hints))
    }

    pub fn parameter_count(&self) -> Option<usize> {
        self.0.iter().find_map(|hint| match hint {
            Hint::ParameterCount { count } => Some(*count),
            _ => None,
        })
    }
}

impl<const N: usize> From<[Hint; N]> for HintSet {
    fn from(hints: [Hint; N]) -> Self {
        HintSet(BTreeSet::from(hints))
    }
}

impl FromIterator<Hint> for HintSet {
    fn from_iter<I: IntoIterator<Item = Hint>>(iter: I) -> Self {
        HintSet(iter.into_iter().collect())
    }
}

/// A filter that can be offered for a column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct FilterSuggestion {
    pub function: FunctionId,
    pub name: String,
    /// Family the filter belongs to, one of [FAMILIES].
    pub kind: Hint,
    /// Parameters the user has to provide, besides the column itself.
    pub parameters: ParameterShape,
    pub hints: HintSet,
}

/// Filters applicable to values with the given capability hints.
pub fn suggestions_for_hints(hints: &HintSet) -> BTreeSet<FilterSuggestion> {
    FunctionId::filters()
        .map(FunctionId::definition)
        .filter(|definition| definition.hints.parameter_hints(0).is_subset(hints))
        .filter_map(|definition| {
            Some(FilterSuggestion {
                function: definition.id,
                name: definition.name.to_string(),
                kind: definition.family?,
                parameters: definition.parameters,
                hints: definition.hints,
            })
        })
        .collect()
}

/// Filters applicable to a column of type `column_type`. Unknown types have
/// no suggestions.
pub fn suggestions_for(catalog: &TypeCatalog, column_type: &str) -> BTreeSet<FilterSuggestion> {
    match catalog.get(column_type) {
        Some(info) => suggestions_for_hints(&info.hints),
        None => BTreeSet::new(),
    }
}

/// Filters applicable to the output of a function, following its `returns`
/// hints.
pub fn suggestions_for_function(function: FunctionId) -> BTreeSet<FilterSuggestion> {
    let returned = function.definition().hints.returned();
    if returned.is_empty() {
        return BTreeSet::new();
    }
    suggestions_for_hints(&returned)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::catalog::{TypeCategory, TypeInfo};

    fn names(suggestions: &BTreeSet<FilterSuggestion>) -> String {
        suggestions.iter().map(|s| s.function.to_string()).join(", ")
    }

    #[test]
    fn boolean_columns_only_get_boolean_filters() {
        let catalog = TypeCatalog::builtin();
        let suggestions = suggestions_for(&catalog, "boolean");

        assert!(!suggestions.is_empty());
        assert!(suggestions.iter().all(|s| s.kind == Hint::Boolean));

        // the alias resolves to the same type
        assert_eq!(suggestions, suggestions_for(&catalog, "bool"));
    }

    #[test]
    fn unknown_types_have_no_suggestions() {
        let catalog = TypeCatalog::builtin();

        assert!(suggestions_for(&catalog, "geometry").is_empty());
        assert!(suggestions_for(&catalog, "").is_empty());
    }

    #[test]
    fn text_suggestions() {
        let catalog = TypeCatalog::builtin();

        insta::assert_snapshot!(names(&suggestions_for(&catalog, "text")), @"empty, not_empty, equal, not_equal, in, lesser, lesser_or_equal, greater, greater_or_equal, between, column_equal, column_lesser, column_greater, contains, contains_case_insensitive, starts_with, ends_with");
    }

    #[test]
    fn uri_gets_string_and_uri_filters() {
        let catalog = TypeCatalog::builtin();
        let kinds: BTreeSet<_> = suggestions_for(&catalog, "uri")
            .into_iter()
            .map(|s| s.kind)
            .collect();

        assert!(kinds.contains(&Hint::Uri));
        assert!(kinds.contains(&Hint::StringLike));
        assert!(!kinds.contains(&Hint::Array));
    }

    #[test]
    fn minimal_fixture_catalog() {
        let catalog = TypeCatalog::new().with_type(TypeInfo::new(
            "flag",
            TypeCategory::Boolean,
            [Hint::Boolean],
        ));

        assert_eq!(
            suggestions_for(&catalog, "flag"),
            suggestions_for(&TypeCatalog::builtin(), "boolean")
        );
        assert!(suggestions_for(&catalog, "integer").is_empty());
    }

    #[test]
    fn chained_through_returns() {
        // the length of an array is comparable
        let suggestions = suggestions_for_function(FunctionId::ArrayLength);
        assert!(suggestions.iter().any(|s| s.function == FunctionId::Greater));
        assert!(!suggestions.iter().any(|s| s.function == FunctionId::StartsWith));

        // predicates produce nothing to chain on
        assert!(suggestions_for_function(FunctionId::Equal).is_empty());
    }

    #[test]
    fn sets_are_values() {
        let a = HintSet::from([Hint::Comparable]);
        let b = a.with(Hint::StringLike);

        assert_eq!(a, HintSet::from([Hint::Comparable]));
        assert!(a.is_subset(&b));
        assert_eq!(a.union(&b), b);
    }
}
