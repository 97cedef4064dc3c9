//! Feature map for SQL dialects.
//!
//! Generated SQL targets the generic dialect where possible; handlers only
//! override what their database spells differently or lacks.

use core::fmt::Debug;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::gen_expr::SourceExpr;
use crate::error::{Error, Reason};
use crate::Result;

/// SQL dialect.
///
/// This only changes the output for a relatively small subset of features.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Serialize,
    Default,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    Postgres,
    SQLite,
    MySql,
    DuckDb,
}

impl Dialect {
    pub(super) fn handler(&self) -> Box<dyn DialectHandler> {
        match self {
            Dialect::Generic => Box::new(GenericDialect),
            Dialect::Postgres => Box::new(PostgresDialect),
            Dialect::SQLite => Box::new(SQLiteDialect),
            Dialect::MySql => Box::new(MySqlDialect),
            Dialect::DuckDb => Box::new(DuckDbDialect),
        }
    }
}

#[derive(Debug)]
pub struct GenericDialect;
#[derive(Debug)]
pub struct PostgresDialect;
#[derive(Debug)]
pub struct SQLiteDialect;
#[derive(Debug)]
pub struct MySqlDialect;
#[derive(Debug)]
pub struct DuckDbDialect;

pub(super) trait DialectHandler: Debug {
    fn name(&self) -> &'static str;

    fn ident_quote(&self) -> char {
        '"'
    }

    /// Whether backslashes in string literals need escaping.
    fn escapes_backslash(&self) -> bool {
        false
    }

    /// LIMIT to emit for an OFFSET without a limit, for databases that do
    /// not accept a bare OFFSET.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Support for CONCAT function.
    /// When not supported we fallback to use `||` as concat operator.
    fn has_concat_function(&self) -> bool {
        true
    }

    fn supports_ilike(&self) -> bool {
        false
    }

    /// Name of a type in CAST expressions. `None` means values are not cast
    /// at all, because the database has no such type.
    fn cast_type(&self, canonical: &str) -> Result<Option<String>> {
        Ok(Some(canonical.to_uppercase()))
    }

    fn uri_scheme(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("SUBSTRING({uri} FROM '^([^:]+):')")))
    }

    fn uri_authority(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!(
            "SUBSTRING({uri} FROM '^[^:]+://([^/?#]*)')"
        )))
    }

    fn email_domain(&self, email: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("SPLIT_PART({email}, '@', 2)")))
    }

    fn array_length(&self, array: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("CARDINALITY({array})")))
    }

    /// `item` is rendered with the strength of a comparison.
    fn array_contains(&self, array: &str, item: &str) -> Result<SourceExpr> {
        Ok(SourceExpr {
            text: format!("{item} = ANY({array})"),
            binding_strength: 6,
        })
    }

    /// `field` is `YEAR` or `MONTH`.
    fn extract(&self, field: &str, value: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("EXTRACT({field} FROM {value})")))
    }
}

fn unsupported(what: &str, dialect: &dyn DialectHandler) -> Error {
    Error::new(Reason::Unsupported {
        what: what.to_string(),
        by: format!("dialect `{}`", dialect.name()),
    })
}

impl DialectHandler for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }
}

impl DialectHandler for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn supports_ilike(&self) -> bool {
        true
    }
}

impl DialectHandler for DuckDbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn supports_ilike(&self) -> bool {
        true
    }

    fn uri_scheme(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!(
            "REGEXP_EXTRACT({uri}, '^([^:]+):', 1)"
        )))
    }

    fn uri_authority(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!(
            "REGEXP_EXTRACT({uri}, '^[^:]+://([^/?#]*)', 1)"
        )))
    }

    fn array_length(&self, array: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("LEN({array})")))
    }

    fn array_contains(&self, array: &str, item: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("LIST_CONTAINS({array}, {item})")))
    }
}

impl DialectHandler for SQLiteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }

    fn has_concat_function(&self) -> bool {
        false
    }

    // https://www.sqlite.org/datatype3.html#determination_of_column_affinity
    fn cast_type(&self, canonical: &str) -> Result<Option<String>> {
        Ok(match canonical {
            "boolean" | "smallint" | "integer" | "bigint" => Some("INTEGER".to_string()),
            "real" | "double precision" => Some("REAL".to_string()),
            "numeric" | "money" => Some("NUMERIC".to_string()),
            "text" | "character varying" | "character" | "uri" | "email" | "json" | "jsonb" => {
                Some("TEXT".to_string())
            }
            // dates and times are stored as text; casting would mangle them
            _ => None,
        })
    }

    fn uri_scheme(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!(
            "SUBSTR({uri}, 1, INSTR({uri}, ':') - 1)"
        )))
    }

    fn uri_authority(&self, uri: &str) -> Result<SourceExpr> {
        let rest = format!("SUBSTR({uri}, INSTR({uri}, '://') + 3)");
        Ok(SourceExpr::call(format!(
            "CASE WHEN INSTR({rest}, '/') > 0 THEN SUBSTR({rest}, 1, INSTR({rest}, '/') - 1) ELSE {rest} END"
        )))
    }

    fn email_domain(&self, email: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!(
            "SUBSTR({email}, INSTR({email}, '@') + 1)"
        )))
    }

    fn array_length(&self, _array: &str) -> Result<SourceExpr> {
        Err(unsupported("array length", self))
    }

    fn array_contains(&self, _array: &str, _item: &str) -> Result<SourceExpr> {
        Err(unsupported("array containment", self))
    }

    fn extract(&self, field: &str, value: &str) -> Result<SourceExpr> {
        let format = match field {
            "YEAR" => "%Y",
            "MONTH" => "%m",
            _ => return Err(unsupported(&format!("extracting {field}"), self)),
        };
        Ok(SourceExpr::call(format!(
            "CAST(STRFTIME('{format}', {value}) AS INTEGER)"
        )))
    }
}

impl DialectHandler for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn ident_quote(&self) -> char {
        '`'
    }

    fn escapes_backslash(&self) -> bool {
        true
    }

    // https://dev.mysql.com/doc/refman/8.0/en/select.html
    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }

    // https://dev.mysql.com/doc/refman/8.0/en/cast-functions.html#function_cast
    fn cast_type(&self, canonical: &str) -> Result<Option<String>> {
        let name = match canonical {
            "boolean" | "smallint" | "integer" | "bigint" => "SIGNED",
            "real" | "double precision" => "DOUBLE",
            "numeric" | "money" => "DECIMAL",
            "text" | "character varying" | "character" | "uri" | "email" => "CHAR",
            "date" => "DATE",
            "time without time zone" => "TIME",
            "timestamp without time zone" => "DATETIME",
            "json" | "jsonb" => "JSON",
            _ => return Err(unsupported(&format!("casting to `{canonical}`"), self)),
        };
        Ok(Some(name.to_string()))
    }

    fn uri_scheme(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("SUBSTRING_INDEX({uri}, ':', 1)")))
    }

    fn uri_authority(&self, uri: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!(
            "SUBSTRING_INDEX(SUBSTRING_INDEX({uri}, '://', -1), '/', 1)"
        )))
    }

    fn email_domain(&self, email: &str) -> Result<SourceExpr> {
        Ok(SourceExpr::call(format!("SUBSTRING_INDEX({email}, '@', -1)")))
    }

    fn array_length(&self, _array: &str) -> Result<SourceExpr> {
        Err(unsupported("array length", self))
    }

    fn array_contains(&self, _array: &str, _item: &str) -> Result<SourceExpr> {
        Err(unsupported("array containment", self))
    }
}
