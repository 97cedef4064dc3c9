use gridql::exec::{execute, Records};
use gridql::normalize::{extrema_diff, leading_digits, offset_order_of_magnitude};
use gridql::{SchemaProvider, SqlRelation};
use rstest::rstest;
use serde_json::{json, Value};

use crate::{database, schema_of, sqlite_options};

fn measurements(values: &[&str]) -> rusqlite::Connection {
    let rows = values.iter().map(|v| format!("({v})")).collect::<Vec<_>>();
    database(&format!(
        "CREATE TABLE measurements (value {});
         INSERT INTO measurements VALUES {};",
        if values.iter().any(|v| v.contains('.')) {
            "REAL"
        } else {
            "INTEGER"
        },
        rows.join(", ")
    ))
}

fn column(records: &Records, name: &str) -> Vec<Value> {
    records.records.iter().map(|r| r[name].clone()).collect()
}

#[test]
fn extrema_diff_on_every_row() {
    let mut conn = measurements(&["5", "10", "15"]);
    let schema = schema_of(&conn);
    let catalog = schema.catalog();
    let relation = SqlRelation::from_table(schema.table("measurements").unwrap(), &catalog);

    let relation = extrema_diff(relation, "value", "spread", &catalog).unwrap();
    let records = execute(&relation, &sqlite_options(), &mut conn).unwrap();

    assert_eq!(column(&records, "spread"), vec![json!(10); 3]);
    assert_eq!(column(&records, "value"), vec![json!(5), json!(10), json!(15)]);
}

#[rstest]
#[case(&["0.0", "0.0002982117006408827"], json!(-5))]
#[case(&["3.0", "1000.19"], json!(1))]
#[case(&["7", "10000"], json!(2))]
#[case(&["42", "42"], Value::Null)]
fn magnitude_offset(#[case] values: &[&str], #[case] expected: Value) {
    let mut conn = measurements(values);
    let schema = schema_of(&conn);
    let catalog = schema.catalog();
    let relation = SqlRelation::from_table(schema.table("measurements").unwrap(), &catalog);

    let relation = extrema_diff(relation, "value", "spread", &catalog).unwrap();
    let relation = offset_order_of_magnitude(relation, "spread", "offset", &catalog).unwrap();
    let records = execute(&relation, &sqlite_options(), &mut conn).unwrap();

    assert_eq!(column(&records, "offset"), vec![expected; values.len()]);
}

#[test]
fn leading_digits_bucket_values() {
    let mut conn = measurements(&["100.0", "1097.19", "512.5"]);
    let schema = schema_of(&conn);
    let catalog = schema.catalog();
    let relation = SqlRelation::from_table(schema.table("measurements").unwrap(), &catalog);

    let relation = leading_digits(relation, "value", &catalog).unwrap();
    let records = execute(&relation, &sqlite_options(), &mut conn).unwrap();

    assert_eq!(
        column(&records, "value_leading_digits"),
        vec![json!(10), json!(109), json!(51)]
    );
}

#[test]
fn equal_values_have_no_leading_digits() {
    let mut conn = measurements(&["3", "3"]);
    let schema = schema_of(&conn);
    let catalog = schema.catalog();
    let relation = SqlRelation::from_table(schema.table("measurements").unwrap(), &catalog);

    let relation = leading_digits(relation, "value", &catalog).unwrap();
    let records = execute(&relation, &sqlite_options(), &mut conn).unwrap();

    assert_eq!(
        column(&records, "value_leading_digits"),
        vec![Value::Null, Value::Null]
    );
}
