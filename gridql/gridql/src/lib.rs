//! # gridql
//!
//! Record query engine of a spreadsheet-like database tool. A data view is a
//! base table plus an ordered list of transforms (column selection,
//! joins-as-columns, filters, summaries, ordering and pagination); gridql
//! validates it against a reflected schema and compiles it into one SQL
//! query.
//!
//! You probably want to start with [compile] wrapper function.
//!
//! ```ascii
//!   QueryDefinition ──(semantic::resolve, per transform)──► Step
//!                                                            │
//!   SqlRelation ◄────────── pipeline::apply_transformations ─┘
//!        │
//!        │ sql::compile
//!        ▼
//!       SQL ──── exec::execute ──► Records
//! ```
//!
//! ## Common use-cases
//!
//! - Compile a query definition against a schema:
//!
//!   ```
//!   use gridql::{compile, ir::Transform, sql::Options, QueryDefinition, Schema};
//!
//!   let schema = Schema::from_json(
//!       r#"{"tables": [{"name": "people", "columns": [{"name": "name", "type": "text"}]}]}"#,
//!   )
//!   .unwrap();
//!   let definition = QueryDefinition::new("people").with_transform(Transform::Limit(3));
//!
//!   let sql = compile(&definition, &schema, &Options::default().no_format()).unwrap();
//!   assert_eq!(sql, r#"SELECT "name" FROM "people" LIMIT 3"#);
//!   ```
//!
//! - Ask which filters a column type supports: [hints::suggestions_for].
//!
//! - Add columns for bucketing numbers by magnitude: [normalize].

#![forbid(unsafe_code)]
// Our error type carries several strings & a location; we're not that
// performance sensitive, so large `Err` variants are fine.
#![allow(clippy::result_large_err)]

pub use error::{Error, Reason, TransformLocation, WithErrorInfo};
pub use error_message::{ErrorMessage, ErrorMessages, MessageKind};
pub use pipeline::{apply_transformations, LegacyParams};
#[allow(deprecated)]
pub use pipeline::apply_transformations_deprecated;
pub use query::{QueryDefinition, QueryResponse};
pub use relation::{Relation, SqlRelation};
pub use schema::{Schema, SchemaProvider};
pub use semantic::Context;

pub mod catalog;
mod error;
mod error_message;
pub mod exec;
pub mod functions;
pub mod hints;
pub mod ir;
pub mod normalize;
mod pipeline;
pub mod query;
pub mod relation;
pub mod schema;
pub mod semantic;
pub mod sql;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Compile a query definition into SQL, using the builtin type catalog
/// extended with the types the schema declares.
pub fn compile(
    definition: &QueryDefinition,
    schema: &Schema,
    options: &sql::Options,
) -> Result<String, ErrorMessages> {
    let catalog = schema.catalog();
    query::compile(definition, schema, &catalog, options).map_err(ErrorMessages::from)
}
