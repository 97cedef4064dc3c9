//! Query definitions: a base table and the transforms applied to it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::error::WithErrorInfo;
use crate::exec::{self, ColumnMetadata, Executor};
use crate::ir::Transform;
use crate::pipeline::apply_transformations;
use crate::relation::SqlRelation;
use crate::schema::SchemaProvider;
use crate::semantic::Context;
use crate::sql::{self, Options};
use crate::{Error, Result};

/// A data view as stored by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryDefinition {
    pub base_table: String,
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

/// Result of running a [QueryDefinition].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub records: Vec<indexmap::IndexMap<String, serde_json::Value>>,
    pub columns: Vec<ColumnMetadata>,
    /// The definition the records were produced from.
    pub parameters: QueryDefinition,
}

impl QueryDefinition {
    pub fn new(base_table: impl Into<String>) -> Self {
        QueryDefinition {
            base_table: base_table.into(),
            transforms: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Validates and applies the transforms to the base table.
    pub fn build(&self, schema: &dyn SchemaProvider, catalog: &TypeCatalog) -> Result<SqlRelation> {
        let table = schema.table(&self.base_table).ok_or_else(|| {
            Error::new_not_found(&self.base_table, "table")
                .push_hint(format!("available tables: {}", schema.table_names().join(", ")))
                .with_field("base_table")
                .with_code("E0001")
        })?;
        if table.columns.is_empty() {
            return Err(Error::new_simple(format!(
                "table `{}` has no columns",
                self.base_table
            ))
            .push_hint("a data view needs at least one column to show")
            .with_field("base_table"));
        }

        let ctx = Context::new(catalog, schema);
        let relation = SqlRelation::from_table(table, catalog);
        apply_transformations(relation, &self.transforms, &ctx)
    }
}

/// Compiles a query definition into SQL.
pub fn compile(
    definition: &QueryDefinition,
    schema: &dyn SchemaProvider,
    catalog: &TypeCatalog,
    options: &Options,
) -> Result<String> {
    let relation = definition.build(schema, catalog)?;
    sql::compile(&relation, options)
}

/// Compiles a query definition and runs it.
///
/// Validation errors are [Error]s wrapped in [anyhow::Error]; database errors
/// are returned as the executor produced them.
pub fn run<E: Executor>(
    definition: &QueryDefinition,
    schema: &dyn SchemaProvider,
    catalog: &TypeCatalog,
    options: &Options,
    executor: E,
) -> anyhow::Result<QueryResponse> {
    let relation = definition.build(schema, catalog)?;
    let records = exec::execute(&relation, options, executor)?;

    Ok(QueryResponse {
        records: records.records,
        columns: records.columns,
        parameters: definition.clone(),
    })
}
