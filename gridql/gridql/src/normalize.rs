//! Builders that add columns for normalizing numeric values.
//!
//! Grouping numbers into buckets of "similar" size needs the spread of the
//! column (max - min) and the order of magnitude just below it. Values
//! divided by that power of ten and floored keep their leading digits.
//!
//! A spread of zero (all values equal) or NULL has no magnitude: the offset
//! is NULL, and so is every value scaled by it.
//!
//! Each builder reads its input as a sub-query, so a column computed by the
//! previous builder is evaluated once and then referenced by name.

use crate::catalog::{TypeCatalog, TypeCategory};
use crate::error::{Error, Reason, WithErrorInfo};
use crate::functions::FunctionId;
use crate::ir::Expr;
use crate::relation::{enforce_relation_contract, Column, Relation};
use crate::Result;

/// Adds `output` holding `max(column) - min(column)` over the whole
/// relation. Every row keeps its values; the row count is unchanged.
pub fn extrema_diff<R: Relation>(
    relation: R,
    column: &str,
    output: &str,
    catalog: &TypeCatalog,
) -> Result<R> {
    let type_name = require_numeric(&relation, column, catalog)?;
    require_free(&relation, output)?;

    let over = |function| Expr::call(function, vec![Expr::column(column)]).over();
    let diff = Expr::call(
        FunctionId::Subtract,
        vec![over(FunctionId::Max), over(FunctionId::Min)],
    );

    let relation = relation
        .into_subquery()?
        .extend(vec![(Column::derived(output, type_name), diff)])?;
    enforce_relation_contract(&relation)?;
    Ok(relation)
}

/// Adds `output` holding `floor(log10(diff)) - 1` as an integer, or NULL
/// when `diff` is not positive.
pub fn offset_order_of_magnitude<R: Relation>(
    relation: R,
    diff_column: &str,
    output: &str,
    catalog: &TypeCatalog,
) -> Result<R> {
    require_numeric(&relation, diff_column, catalog)?;
    require_free(&relation, output)?;

    let diff = || Expr::column(diff_column);
    let magnitude = Expr::call(
        FunctionId::Subtract,
        vec![
            Expr::call(
                FunctionId::Floor,
                vec![Expr::call(FunctionId::Log10, vec![diff()])],
            ),
            Expr::literal(1),
        ],
    );
    let offset = Expr::call(
        FunctionId::If,
        vec![
            Expr::call(FunctionId::Greater, vec![diff(), Expr::literal(0)]),
            magnitude,
        ],
    )
    .cast("integer");

    let relation = relation
        .into_subquery()?
        .extend(vec![(Column::derived(output, "integer"), offset)])?;
    enforce_relation_contract(&relation)?;
    Ok(relation)
}

/// Adds `output` holding `floor(value / 10^power)` as an integer.
pub fn scale_by_power_of_ten<R: Relation>(
    relation: R,
    value_column: &str,
    power_column: &str,
    output: &str,
    catalog: &TypeCatalog,
) -> Result<R> {
    require_numeric(&relation, value_column, catalog)?;
    require_numeric(&relation, power_column, catalog)?;
    require_free(&relation, output)?;

    let power = Expr::call(
        FunctionId::Power,
        vec![Expr::literal(10), Expr::column(power_column)],
    );
    let scaled = Expr::call(
        FunctionId::Floor,
        vec![Expr::call(
            FunctionId::Divide,
            vec![Expr::column(value_column), power],
        )],
    )
    .cast("integer");

    let relation = relation
        .into_subquery()?
        .extend(vec![(Column::derived(output, "integer"), scaled)])?;
    enforce_relation_contract(&relation)?;
    Ok(relation)
}

/// Chains the three builders on `column`, adding `{column}_extrema_diff`,
/// `{column}_magnitude_offset` and `{column}_leading_digits`.
pub fn leading_digits<R: Relation>(relation: R, column: &str, catalog: &TypeCatalog) -> Result<R> {
    let diff = format!("{column}_extrema_diff");
    let offset = format!("{column}_magnitude_offset");
    let digits = format!("{column}_leading_digits");

    let relation = extrema_diff(relation, column, &diff, catalog)?;
    let relation = offset_order_of_magnitude(relation, &diff, &offset, catalog)?;
    scale_by_power_of_ten(relation, column, &offset, &digits, catalog)
}

/// The magnitude offset computed by [offset_order_of_magnitude], for a
/// single value.
pub fn order_of_magnitude_offset(diff: f64) -> Option<i32> {
    if !(diff.is_finite() && diff > 0.0) {
        return None;
    }
    Some(diff.log10().floor() as i32 - 1)
}

fn require_numeric<R: Relation>(relation: &R, column: &str, catalog: &TypeCatalog) -> Result<String> {
    let Some(found) = relation.column(column) else {
        return Err(Error::new_not_found(column, "column").with_code("E0001"));
    };
    match catalog.category(&found.type_name) {
        Some(TypeCategory::Numeric) => Ok(found.type_name.clone()),
        _ => Err(Error::new(Reason::Expected {
            who: Some(format!("column `{column}`")),
            expected: "a numeric type".to_string(),
            found: format!("`{}`", found.type_name),
        })
        .with_code("E0004")),
    }
}

fn require_free<R: Relation>(relation: &R, output: &str) -> Result<()> {
    if relation.column(output).is_none() {
        return Ok(());
    }
    Err(Error::new(Reason::Duplicate {
        name: output.to_string(),
        namespace: "column".to_string(),
    })
    .push_hint("pick another output name")
    .with_code("E0002"))
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use rstest::rstest;

    use super::*;
    use crate::relation::SqlRelation;
    use crate::schema::{Schema, SchemaProvider};
    use crate::sql::{self, Options};

    fn measurements() -> (SqlRelation, TypeCatalog) {
        let schema = Schema::from_json(
            r#"{"tables": [{"name": "measurements", "columns": [
                {"name": "value", "type": "float8"},
                {"name": "label", "type": "text"}
            ]}]}"#,
        )
        .unwrap();
        let catalog = TypeCatalog::builtin();
        let relation = SqlRelation::from_table(schema.table("measurements").unwrap(), &catalog);
        (relation, catalog)
    }

    #[rstest]
    #[case(0.0002982117006408827, Some(-5))]
    #[case(997.19, Some(1))]
    #[case(9993.0, Some(2))]
    #[case(10.0, Some(0))]
    #[case(0.0, None)]
    #[case(-3.0, None)]
    #[case(f64::NAN, None)]
    fn magnitude(#[case] diff: f64, #[case] expected: Option<i32>) {
        assert_eq!(order_of_magnitude_offset(diff), expected);
    }

    #[test]
    fn chained_sql() {
        let (relation, catalog) = measurements();
        let relation = leading_digits(relation, "value", &catalog).unwrap();

        assert_eq!(
            relation.columns().last().map(|c| c.type_name.as_str()),
            Some("integer")
        );

        let sql = sql::compile(&relation, &Options::default().no_format()).unwrap();
        assert_snapshot!(sql, @r#"WITH "table_0" AS (SELECT "value", "label", MAX("value") OVER () - MIN("value") OVER () AS "value_extrema_diff" FROM "measurements"), "table_1" AS (SELECT "value", "label", "value_extrema_diff", CAST(CASE WHEN "value_extrema_diff" > 0 THEN FLOOR(LOG10("value_extrema_diff")) - 1 END AS INTEGER) AS "value_magnitude_offset" FROM "table_0") SELECT "value", "label", "value_extrema_diff", "value_magnitude_offset", CAST(FLOOR("value" / POWER(10, "value_magnitude_offset")) AS INTEGER) AS "value_leading_digits" FROM "table_1""#);
    }

    #[test]
    fn text_columns_are_rejected() {
        let (relation, catalog) = measurements();
        let error = extrema_diff(relation, "label", "spread", &catalog).unwrap_err();

        assert_snapshot!(error.to_string(), @"column `label` expected a numeric type, but found `text`");
    }

    #[test]
    fn output_must_be_a_new_name() {
        let (relation, catalog) = measurements();
        let error = extrema_diff(relation, "value", "label", &catalog).unwrap_err();

        assert_snapshot!(error.to_string(), @"column `label` is defined more than once");
    }
}
