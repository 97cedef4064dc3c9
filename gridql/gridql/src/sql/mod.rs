//! Backend for translating a [SqlRelation] into a SQL string.

mod dialect;
mod gen_expr;
mod gen_query;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use dialect::Dialect;

use crate::relation::SqlRelation;
use crate::Result;

/// Compilation options for SQL backend of the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Options {
    /// Pass generated SQL string trough a formatter that splits it
    /// into multiple lines and prettifies indentation and spacing.
    ///
    /// Defaults to true.
    #[serde(default = "default_format")]
    pub format: bool,

    /// Target dialect you want to compile to.
    #[serde(default)]
    pub dialect: Dialect,
}

fn default_format() -> bool {
    true
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: true,
            dialect: Dialect::Generic,
        }
    }
}

impl Options {
    pub fn no_format(self) -> Self {
        self.with_format(false)
    }

    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

/// Translate a relation into a SQL query.
pub fn compile(relation: &SqlRelation, options: &Options) -> Result<String> {
    let handler = options.dialect.handler();
    let sql = gen_query::translate_query(relation, handler.as_ref())?;
    log::trace!("generated sql for {}: {sql}", options.dialect);

    Ok(if options.format {
        sqlformat::format(
            &sql,
            &sqlformat::QueryParams::default(),
            sqlformat::FormatOptions::default(),
        )
    } else {
        sql
    })
}
