//! SQLite through `rusqlite`.

use std::sync::OnceLock;

use anyhow::Result;
use itertools::Itertools;
use regex::Regex;
use rusqlite::types::ValueRef;
use serde_json::Value;

use super::{Executor, Row};
use crate::relation::TypeOptions;
use crate::schema::{Schema, Table, TableColumn};

impl Executor for rusqlite::Connection {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let mut statement = self.prepare(sql)?;
        let width = statement.column_count();

        let mut rows = statement.query([])?;
        let mut vec = vec![];
        while let Some(row) = rows.next()? {
            let mut columns = Vec::with_capacity(width);
            for i in 0..width {
                columns.push(to_json(row.get_ref(i)?));
            }
            vec.push(columns);
        }
        Ok(vec)
    }
}

fn to_json(value: ValueRef) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => v.into(),
        // NaN and infinities have no JSON form
        ValueRef::Real(v) => serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number),
        ValueRef::Text(v) => String::from_utf8_lossy(v).into_owned().into(),
        ValueRef::Blob(v) => v.iter().map(|b| format!("{b:02x}")).join("").into(),
    }
}

/// Reads table definitions from a live database.
///
/// Declared types are lowercased and their modifiers moved into
/// [TypeOptions], so `VARCHAR(20)` becomes `varchar` with length 20.
/// Columns declared without a type are reported as `text`.
pub fn introspect(conn: &rusqlite::Connection) -> Result<Schema> {
    let mut statement = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )?;
    let names: Vec<String> = statement
        .query_map([], |row| row.get(0))?
        .try_collect()?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let mut statement =
            conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns: Vec<TableColumn> = statement
            .query_map([&name], |row| {
                let declared: String = row.get(1)?;
                let (type_name, type_options) = parse_declared_type(&declared);
                Ok(TableColumn {
                    name: row.get(0)?,
                    type_name,
                    type_options,
                    display_options: None,
                    primary_key: row.get::<_, i64>(2)? > 0,
                })
            })?
            .try_collect()?;

        log::debug!("introspected table `{name}` with {} column(s)", columns.len());
        tables.push(Table {
            schema: None,
            name,
            columns,
        });
    }

    Ok(Schema {
        tables,
        types: Vec::new(),
    })
}

fn parse_declared_type(declared: &str) -> (String, TypeOptions) {
    static MODIFIERS: OnceLock<Regex> = OnceLock::new();
    let modifiers = MODIFIERS
        .get_or_init(|| Regex::new(r"^\s*([^(]*?)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)\s*$").unwrap());

    let Some(caps) = modifiers.captures(declared) else {
        let name = declared.trim().to_lowercase();
        let name = if name.is_empty() { "text".to_string() } else { name };
        return (name, TypeOptions::default());
    };

    let name = caps[1].to_lowercase();
    let first = caps[2].parse().ok();
    let second = caps.get(3).and_then(|m| m.as_str().parse().ok());

    let mut options = TypeOptions::default();
    match name.as_str() {
        "numeric" | "decimal" => {
            options.precision = first;
            options.scale = second;
        }
        _ => options.length = first,
    }
    (name, options)
}
