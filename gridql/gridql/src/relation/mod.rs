//! Relations: ordered, named, typed columns plus a query that produces rows.
//!
//! [Relation] is the seam between the transform pipeline and a backend. The
//! pipeline only ever calls these operations with inputs that have already
//! been validated, and checks [enforce_relation_contract] after each one.

mod sql;

use std::collections::HashSet;
use std::fmt::Debug;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use sql::SqlRelation;
pub(crate) use sql::{Cte, JoinClause, Select, SqlExpr, SqlSource};

use crate::ir::{ColumnSort, Expr};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TypeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Element type of array columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

/// Where the values of a column come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Column of the base table.
    Table { table: String, column: String },
    /// Column reached by following foreign keys.
    Join {
        table: String,
        column: String,
        /// Tables traversed, in order.
        path: Vec<String>,
    },
    /// Computed by a transform.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: String,
    /// Canonical type name.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub type_options: TypeOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<serde_json::Value>,
    #[serde(default)]
    pub primary_key: bool,
    pub provenance: Provenance,
}

impl Column {
    pub fn derived<N: ToString, T: ToString>(name: N, type_name: T) -> Self {
        Column {
            name: name.to_string(),
            type_name: type_name.to_string(),
            type_options: TypeOptions::default(),
            display_options: None,
            primary_key: false,
            provenance: Provenance::Derived,
        }
    }

    /// The same column under another name. Keeps type information and
    /// provenance, drops the primary key flag.
    pub fn renamed<N: ToString>(&self, name: N) -> Self {
        Column {
            name: name.to_string(),
            primary_key: false,
            ..self.clone()
        }
    }
}

/// Resolved form of [crate::ir::Join], produced by validation.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    pub hops: Vec<JoinHop>,
    /// Columns of the last table of the path, with the relation columns they
    /// become.
    pub columns: Vec<JoinSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinHop {
    pub from_column: String,
    /// Table name as used in the FROM clause.
    pub table: String,
    pub to_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSource {
    pub column: String,
    pub output: Column,
}

/// Resolved form of [crate::ir::Summarize], produced by validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizePlan {
    pub groups: Vec<(Column, Expr)>,
    pub aggregations: Vec<(Column, Expr)>,
}

/// A relation backend.
///
/// Relations are values: every operation consumes the relation and returns a
/// new one.
pub trait Relation: Sized + Clone + Debug {
    fn columns(&self) -> &[Column];

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Whether the relation is backed by a row-producing query.
    fn has_query(&self) -> bool;

    /// Keeps the named columns, in the given order.
    fn select_columns(self, names: &[String]) -> Result<Self>;

    /// Appends computed columns. Expressions may reference existing columns
    /// only.
    fn extend(self, columns: Vec<(Column, Expr)>) -> Result<Self>;

    fn filter(self, predicate: &Expr) -> Result<Self>;

    /// Sorts rows, replacing any previous ordering.
    fn order(self, sorts: &[ColumnSort<String>]) -> Result<Self>;

    fn offset(self, offset: u64) -> Result<Self>;

    fn limit(self, limit: u64) -> Result<Self>;

    fn join(self, plan: &JoinPlan) -> Result<Self>;

    fn summarize(self, plan: &SummarizePlan) -> Result<Self>;

    /// Wraps the relation so that following operations see its rows as a
    /// plain table.
    fn into_subquery(self) -> Result<Self>;
}

/// Checks the invariants every relation must satisfy: a query is present,
/// column names are unique and each column can be looked up by its name.
pub fn enforce_relation_contract<R: Relation>(relation: &R) -> Result<()> {
    if !relation.has_query() {
        return Err(Error::new_contract("relation has no query"));
    }

    let mut seen = HashSet::new();
    for column in relation.columns() {
        if column.name.is_empty() {
            return Err(Error::new_contract("column without a name"));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(Error::new_contract(format!(
                "duplicate column `{}`",
                column.name
            )));
        }
        match relation.column(&column.name) {
            Some(found) if found == column => {}
            _ => {
                return Err(Error::new_contract(format!(
                    "column `{}` cannot be looked up by name",
                    column.name
                )))
            }
        }
    }
    Ok(())
}
