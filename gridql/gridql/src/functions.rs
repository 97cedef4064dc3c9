//! Functions that can appear in [crate::ir::Expr::Call].
//!
//! Each function carries a [FunctionDef]: its hints (used both to suggest
//! filters and to validate arguments), its arity and its return type.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::hints::{all_parameters, parameter, parameter_count, returns, Hint, HintSet};

// Variant order is the order suggestions are presented in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FunctionId {
    Empty,
    NotEmpty,
    Equal,
    NotEqual,
    In,
    Lesser,
    LesserOrEqual,
    Greater,
    GreaterOrEqual,
    Between,
    ColumnEqual,
    ColumnLesser,
    ColumnGreater,
    Contains,
    ContainsCaseInsensitive,
    StartsWith,
    EndsWith,
    ArrayContains,
    ArrayNotEmpty,
    UriAuthorityContains,
    UriSchemeEquals,
    EmailDomainContains,
    EmailDomainEquals,

    And,
    Or,
    Not,
    If,

    Add,
    Subtract,
    Multiply,
    Divide,
    Floor,
    Log10,
    Power,
    Lower,
    ArrayLength,
    UriAuthority,
    UriScheme,
    EmailDomain,
    ExtractYear,
    ExtractMonth,

    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(1) => f.write_str("1 argument"),
            Arity::Exact(n) => write!(f, "{n} arguments"),
            Arity::AtLeast(n) => write!(f, "at least {n} arguments"),
        }
    }
}

/// What a filter asks from the user, besides the column it is applied to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ParameterShape {
    None,
    Single,
    Fixed(usize),
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Boolean,
    /// Same type as the argument at this position.
    SameAs(usize),
    Fixed(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub id: FunctionId,
    /// Human readable name.
    pub name: &'static str,
    /// Set for predicates that are offered as filters.
    pub family: Option<Hint>,
    pub parameters: ParameterShape,
    pub hints: HintSet,
    pub arity: Arity,
    pub returns: ReturnType,
}

fn set<const N: usize>(hints: [Hint; N]) -> HintSet {
    HintSet::from(hints)
}

fn filter(
    id: FunctionId,
    name: &'static str,
    family: Hint,
    parameters: ParameterShape,
    arity: Arity,
    extra: impl IntoIterator<Item = Hint>,
) -> FunctionDef {
    let mut hints: HintSet = extra.into_iter().collect();
    hints = hints.with(Hint::Filter);
    if let Arity::Exact(n) = arity {
        hints = hints.with(parameter_count(n));
    }
    FunctionDef {
        id,
        name,
        family: Some(family),
        parameters,
        hints,
        arity,
        returns: ReturnType::Boolean,
    }
}

fn function(
    id: FunctionId,
    name: &'static str,
    arity: Arity,
    returns: ReturnType,
    extra: impl IntoIterator<Item = Hint>,
) -> FunctionDef {
    let mut hints: HintSet = extra.into_iter().collect();
    if let Arity::Exact(n) = arity {
        hints = hints.with(parameter_count(n));
    }
    FunctionDef {
        id,
        name,
        family: None,
        parameters: ParameterShape::None,
        hints,
        arity,
        returns,
    }
}

impl FunctionId {
    pub fn definition(self) -> FunctionDef {
        use Arity::*;
        use FunctionId::*;
        use ParameterShape as P;

        let numeric_out = returns(set([Hint::Comparable, Hint::Numeric]));
        let string_out = returns(set([Hint::Comparable, Hint::StringLike]));

        match self {
            Empty => filter(self, "is empty", Hint::Boolean, P::None, Exact(1), []),
            NotEmpty => filter(self, "is not empty", Hint::Boolean, P::None, Exact(1), []),
            Equal => filter(self, "is equal to", Hint::Boolean, P::Single, Exact(2), []),
            NotEqual => filter(self, "is not equal to", Hint::Boolean, P::Single, Exact(2), []),
            In => filter(self, "is one of", Hint::Boolean, P::List, AtLeast(2), []),

            Lesser | LesserOrEqual | Greater | GreaterOrEqual => {
                let name = match self {
                    Lesser => "is lesser than",
                    LesserOrEqual => "is lesser than or equal to",
                    Greater => "is greater than",
                    _ => "is greater than or equal to",
                };
                filter(
                    self,
                    name,
                    Hint::Comparable,
                    P::Single,
                    Exact(2),
                    [all_parameters(set([Hint::Comparable]))],
                )
            }
            Between => filter(
                self,
                "is between",
                Hint::Comparable,
                P::Fixed(2),
                Exact(3),
                [all_parameters(set([Hint::Comparable]))],
            ),

            ColumnEqual | ColumnLesser | ColumnGreater => {
                let name = match self {
                    ColumnEqual => "is equal to column",
                    ColumnLesser => "is lesser than column",
                    _ => "is greater than column",
                };
                filter(
                    self,
                    name,
                    Hint::Column,
                    P::Single,
                    Exact(2),
                    [
                        all_parameters(set([Hint::Comparable])),
                        parameter(1, set([Hint::Column])),
                    ],
                )
            }

            Contains | ContainsCaseInsensitive | StartsWith | EndsWith => {
                let name = match self {
                    Contains => "contains",
                    ContainsCaseInsensitive => "contains (case insensitive)",
                    StartsWith => "starts with",
                    _ => "ends with",
                };
                filter(
                    self,
                    name,
                    Hint::StringLike,
                    P::Single,
                    Exact(2),
                    [all_parameters(set([Hint::StringLike]))],
                )
            }

            ArrayContains => filter(
                self,
                "contains item",
                Hint::Array,
                P::Single,
                Exact(2),
                [parameter(0, set([Hint::Array]))],
            ),
            ArrayNotEmpty => filter(
                self,
                "has items",
                Hint::Array,
                P::None,
                Exact(1),
                [parameter(0, set([Hint::Array]))],
            ),

            UriAuthorityContains | UriSchemeEquals => filter(
                self,
                if self == UriAuthorityContains {
                    "authority contains"
                } else {
                    "scheme is"
                },
                Hint::Uri,
                P::Single,
                Exact(2),
                [
                    parameter(0, set([Hint::Uri])),
                    parameter(1, set([Hint::StringLike])),
                ],
            ),

            EmailDomainContains | EmailDomainEquals => filter(
                self,
                if self == EmailDomainContains {
                    "domain contains"
                } else {
                    "domain is"
                },
                Hint::Email,
                P::Single,
                Exact(2),
                [
                    parameter(0, set([Hint::Email])),
                    parameter(1, set([Hint::StringLike])),
                ],
            ),

            And | Or => function(
                self,
                if self == And { "and" } else { "or" },
                AtLeast(1),
                ReturnType::Boolean,
                [all_parameters(set([Hint::Boolean]))],
            ),
            Not => function(
                self,
                "not",
                Exact(1),
                ReturnType::Boolean,
                [parameter(0, set([Hint::Boolean]))],
            ),
            If => function(
                self,
                "if",
                Exact(2),
                ReturnType::SameAs(1),
                [parameter(0, set([Hint::Boolean]))],
            ),

            Add | Subtract | Multiply | Divide | Power => {
                let name = match self {
                    Add => "add",
                    Subtract => "subtract",
                    Multiply => "multiply",
                    Divide => "divide",
                    _ => "power",
                };
                function(
                    self,
                    name,
                    Exact(2),
                    ReturnType::SameAs(0),
                    [all_parameters(set([Hint::Numeric])), numeric_out],
                )
            }
            Floor | Log10 => function(
                self,
                if self == Floor { "floor" } else { "log10" },
                Exact(1),
                ReturnType::SameAs(0),
                [parameter(0, set([Hint::Numeric])), numeric_out],
            ),
            Lower => function(
                self,
                "lower case",
                Exact(1),
                ReturnType::SameAs(0),
                [parameter(0, set([Hint::StringLike])), string_out],
            ),
            ArrayLength => function(
                self,
                "length",
                Exact(1),
                ReturnType::Fixed("integer"),
                [parameter(0, set([Hint::Array])), numeric_out],
            ),
            UriAuthority | UriScheme => function(
                self,
                if self == UriAuthority {
                    "authority"
                } else {
                    "scheme"
                },
                Exact(1),
                ReturnType::Fixed("text"),
                [parameter(0, set([Hint::Uri])), string_out],
            ),
            EmailDomain => function(
                self,
                "domain",
                Exact(1),
                ReturnType::Fixed("text"),
                [parameter(0, set([Hint::Email])), string_out],
            ),
            ExtractYear | ExtractMonth => function(
                self,
                if self == ExtractYear { "year" } else { "month" },
                Exact(1),
                ReturnType::Fixed("integer"),
                [parameter(0, set([Hint::Temporal])), numeric_out],
            ),

            Count | CountDistinct => function(
                self,
                if self == Count {
                    "count"
                } else {
                    "distinct count"
                },
                Exact(1),
                ReturnType::Fixed("bigint"),
                [Hint::Aggregation, numeric_out],
            ),
            Sum => function(
                self,
                "sum",
                Exact(1),
                ReturnType::SameAs(0),
                [
                    Hint::Aggregation,
                    parameter(0, set([Hint::Numeric])),
                    numeric_out,
                ],
            ),
            Mean => function(
                self,
                "mean",
                Exact(1),
                ReturnType::Fixed("numeric"),
                [
                    Hint::Aggregation,
                    parameter(0, set([Hint::Numeric])),
                    numeric_out,
                ],
            ),
            Min | Max => function(
                self,
                if self == Min { "minimum" } else { "maximum" },
                Exact(1),
                ReturnType::SameAs(0),
                [Hint::Aggregation, parameter(0, set([Hint::Comparable]))],
            ),
        }
    }

    /// Functions that can be offered as filters.
    pub fn filters() -> impl Iterator<Item = FunctionId> {
        FunctionId::iter().filter(|id| id.is_filter())
    }

    pub fn is_filter(self) -> bool {
        self.definition().family.is_some()
    }

    pub fn is_aggregate(self) -> bool {
        self.definition().hints.contains(&Hint::Aggregation)
    }
}
