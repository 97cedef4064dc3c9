//! Queries executed against in-memory SQLite databases.

mod normalize;
mod queries;

use gridql::exec::sqlite::introspect;
use gridql::sql::{Dialect, Options};
use gridql::{QueryDefinition, QueryResponse, Schema};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use serde_json::Value;

/// Opens an in-memory database, runs `setup` and registers the math
/// functions generated SQL relies on, which SQLite builds may lack.
pub(crate) fn database(setup: &str) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(setup).unwrap();

    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("log10", 1, flags, |ctx| {
        Ok(ctx.get::<Option<f64>>(0)?.map(f64::log10))
    })
    .unwrap();
    conn.create_scalar_function("floor", 1, flags, |ctx| {
        Ok(ctx.get::<Option<f64>>(0)?.map(f64::floor))
    })
    .unwrap();
    conn.create_scalar_function("power", 2, flags, |ctx| {
        let base = ctx.get::<Option<f64>>(0)?;
        let exponent = ctx.get::<Option<f64>>(1)?;
        Ok(base.zip(exponent).map(|(b, e)| b.powf(e)))
    })
    .unwrap();
    conn
}

pub(crate) fn sqlite_options() -> Options {
    Options::default().no_format().with_dialect(Dialect::SQLite)
}

pub(crate) fn run(conn: &mut Connection, definition: &QueryDefinition) -> QueryResponse {
    let schema = introspect(conn).unwrap();
    let catalog = schema.catalog();
    gridql::query::run(definition, &schema, &catalog, &sqlite_options(), conn).unwrap()
}

pub(crate) fn schema_of(conn: &Connection) -> Schema {
    introspect(conn).unwrap()
}

/// Records as a JSON array, for comparing with `json!` literals.
pub(crate) fn records(response: &QueryResponse) -> Value {
    serde_json::to_value(&response.records).unwrap()
}
