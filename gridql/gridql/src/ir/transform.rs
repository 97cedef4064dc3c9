use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ColumnSort, Expr};

/// Transformation of a relation.
///
/// Serialized as `{"type": "limit", "spec": 10}`.
#[derive(
    Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema, strum::AsRefStr, EnumAsInner,
)]
#[serde(tag = "type", content = "spec", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Transform {
    /// Keep only the named columns, in the given order.
    Select(Vec<String>),
    /// Drop the named columns.
    Hide(Vec<String>),
    /// Sort rows. Replaces any ordering applied before.
    Order(Vec<ColumnSort<String>>),
    Offset(u64),
    Limit(u64),
    /// Keep rows for which the boolean expression holds.
    Filter(Expr),
    /// Extend the relation with columns reached by following foreign keys.
    Join(Join),
    Summarize(Summarize),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Join {
    /// Hops from the current relation to the target table. The first hop
    /// starts at a column of the current relation; every next hop starts at
    /// a column of the previous hop's table.
    pub path: Vec<JoinStep>,
    /// Columns of the last table of the path to add.
    pub columns: Vec<JoinedColumn>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JoinStep {
    pub from_column: String,
    pub table: String,
    pub to_column: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JoinedColumn {
    pub column: String,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Summarize {
    #[serde(default)]
    pub grouping: Vec<Grouping>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Grouping {
    pub expr: Expr,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Aggregation {
    pub expr: Expr,
    pub alias: String,
}

impl Transform {
    /// Name of the field holding the transform's payload, as used in error
    /// locations.
    pub const SPEC_FIELD: &'static str = "spec";

    /// Snake case name of the variant, eg. `limit`.
    pub fn kind(&self) -> &str {
        self.as_ref()
    }
}
