//! Running compiled relations against a database.
//!
//! The engine does not own connections. Callers hand in an [Executor]; its
//! errors are returned unchanged for the caller to classify.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use anyhow::bail;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relation::{Column, Provenance, Relation, SqlRelation, TypeOptions};
use crate::sql::{self, Options};

pub type Row = Vec<Value>;

/// Something that can run a SQL query and return its rows, with values in
/// the order of the SELECT list.
pub trait Executor {
    fn query(&mut self, sql: &str) -> anyhow::Result<Vec<Row>>;
}

impl<E: Executor + ?Sized> Executor for &mut E {
    fn query(&mut self, sql: &str) -> anyhow::Result<Vec<Row>> {
        (**self).query(sql)
    }
}

/// Rows of a relation together with a description of its columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Records {
    /// Each row maps column names to values, in column order.
    pub records: Vec<IndexMap<String, Value>>,
    pub columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub alias: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_options: TypeOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<Value>,
    pub primary_key: bool,
    pub provenance: Provenance,
}

impl From<&Column> for ColumnMetadata {
    fn from(column: &Column) -> Self {
        ColumnMetadata {
            alias: column.name.clone(),
            type_name: column.type_name.clone(),
            type_options: column.type_options.clone(),
            display_options: column.display_options.clone(),
            primary_key: column.primary_key,
            provenance: column.provenance.clone(),
        }
    }
}

/// Compiles the relation and runs it.
pub fn execute<E: Executor>(
    relation: &SqlRelation,
    options: &Options,
    mut executor: E,
) -> anyhow::Result<Records> {
    // formatting only costs time here
    let options = options.clone().no_format();
    let sql = sql::compile(relation, &options)?;
    log::debug!("executing: {sql}");

    let rows = executor.query(&sql)?;
    log::debug!("fetched {} row(s)", rows.len());

    let columns = relation.columns();
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != columns.len() {
            bail!(
                "query returned {} values per row, but the relation has {} columns",
                row.len(),
                columns.len()
            );
        }
        let record: IndexMap<String, Value> = (columns.iter())
            .map(|c| c.name.clone())
            .zip(row)
            .collect();
        records.push(record);
    }

    Ok(Records {
        records,
        columns: columns.iter().map(ColumnMetadata::from).collect(),
    })
}
