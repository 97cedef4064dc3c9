//! Renders a [SqlRelation] as a single SQL statement: one CTE per closed
//! SELECT, followed by the open one.

use itertools::Itertools;

use super::dialect::DialectHandler;
use super::gen_expr::{quote_ident, translate_expr, ExprContext};
use crate::ir::SortDirection;
use crate::relation::{Cte, JoinClause, Select, SqlExpr, SqlRelation, SqlSource};
use crate::Result;

pub(super) fn translate_query(relation: &SqlRelation, dialect: &dyn DialectHandler) -> Result<String> {
    let main = translate_select(&relation.select, dialect)?;
    if relation.ctes.is_empty() {
        return Ok(main);
    }

    let ctes: Vec<String> = (relation.ctes.iter())
        .map(|cte| translate_cte(cte, dialect))
        .try_collect()?;
    Ok(format!("WITH {} {main}", ctes.join(", ")))
}

fn translate_cte(cte: &Cte, dialect: &dyn DialectHandler) -> Result<String> {
    let ctx = ExprContext {
        dialect,
        qualify: false,
    };
    let select = translate_select(&cte.select, dialect)?;
    Ok(format!("{} AS ({select})", quote_ident(&cte.name, &ctx)))
}

fn translate_select(select: &Select, dialect: &dyn DialectHandler) -> Result<String> {
    let ctx = ExprContext {
        dialect,
        qualify: !select.joins.is_empty(),
    };
    log::trace!(
        "rendering select over `{}` with {} join(s)",
        select.from.alias(),
        select.joins.len()
    );

    let mut sql = String::from("SELECT ");

    let projection: Vec<String> = (select.projection.iter())
        .map(|(expr, alias)| translate_select_item(expr, alias, &ctx))
        .try_collect()?;
    sql += &projection.join(", ");

    sql += " FROM ";
    sql += &translate_source(&select.from, &ctx);

    for join in &select.joins {
        sql += " ";
        sql += &translate_join(join, &ctx)?;
    }

    if let Some(filter) = &select.filter {
        sql += " WHERE ";
        sql += &translate_expr(filter, &ctx)?.text;
    }

    if !select.group_by.is_empty() {
        let keys: Vec<String> = (select.group_by.iter())
            .map(|e| translate_expr(e, &ctx).map(|s| s.text))
            .try_collect()?;
        sql += " GROUP BY ";
        sql += &keys.join(", ");
    }

    if !select.order_by.is_empty() {
        let sorts: Vec<String> = (select.order_by.iter())
            .map(|sort| -> Result<String> {
                let column = translate_expr(&sort.column, &ctx)?.text;
                Ok(match sort.direction {
                    SortDirection::Asc => column,
                    SortDirection::Desc => format!("{column} DESC"),
                })
            })
            .try_collect()?;
        sql += " ORDER BY ";
        sql += &sorts.join(", ");
    }

    match (select.limit, dialect.unbounded_limit()) {
        (Some(limit), _) => sql += &format!(" LIMIT {limit}"),
        (None, Some(unbounded)) if select.offset > 0 => sql += &format!(" LIMIT {unbounded}"),
        _ => {}
    }
    if select.offset > 0 {
        sql += &format!(" OFFSET {}", select.offset);
    }

    Ok(sql)
}

fn translate_select_item(expr: &SqlExpr, alias: &str, ctx: &ExprContext) -> Result<String> {
    let text = translate_expr(expr, ctx)?.text;
    Ok(match expr {
        SqlExpr::Column { name, .. } if name == alias => text,
        _ => format!("{text} AS {}", quote_ident(alias, ctx)),
    })
}

fn translate_source(source: &SqlSource, ctx: &ExprContext) -> String {
    match source {
        SqlSource::Table { name, alias } => translate_table(name, alias, ctx),
        SqlSource::Cte(name) => quote_ident(name, ctx),
    }
}

fn translate_join(join: &JoinClause, ctx: &ExprContext) -> Result<String> {
    let left = translate_expr(&join.left, ctx)?.text;
    Ok(format!(
        "LEFT JOIN {} ON {left} = {}.{}",
        translate_table(&join.table, &join.alias, ctx),
        quote_ident(&join.alias, ctx),
        quote_ident(&join.right_column, ctx),
    ))
}

/// `schema.table`, aliased unless the alias is the bare table name.
fn translate_table(name: &str, alias: &str, ctx: &ExprContext) -> String {
    let (schema, table) = match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    };

    let mut sql = String::new();
    if let Some(schema) = schema {
        sql += &quote_ident(schema, ctx);
        sql += ".";
    }
    sql += &quote_ident(table, ctx);
    if table != alias {
        sql += " AS ";
        sql += &quote_ident(alias, ctx);
    }
    sql
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use crate::catalog::TypeCatalog;
    use crate::functions::FunctionId;
    use crate::ir::{ColumnSort, Expr, JoinStep, JoinedColumn, Transform};
    use crate::schema::{Schema, SchemaProvider};
    use crate::semantic::Context;
    use crate::sql::{compile, Dialect, Options};
    use crate::{apply_transformations, SqlRelation};

    fn schema() -> Schema {
        Schema::from_json(
            r#"{"tables": [
                {"schema": "library", "name": "books", "columns": [
                    {"name": "id", "type": "integer", "primary_key": true},
                    {"name": "title", "type": "text"},
                    {"name": "author_id", "type": "integer"}
                ]},
                {"schema": "library", "name": "authors", "columns": [
                    {"name": "id", "type": "integer", "primary_key": true},
                    {"name": "name", "type": "text"}
                ]}
            ]}"#,
        )
        .unwrap()
    }

    fn compile_books(transforms: &[Transform], dialect: Dialect) -> String {
        let schema = schema();
        let catalog = TypeCatalog::builtin();
        let ctx = Context::new(&catalog, &schema);
        let relation = SqlRelation::from_table(schema.table("books").unwrap(), &catalog);

        let relation = apply_transformations(relation, transforms, &ctx).unwrap();
        let options = Options::default().no_format().with_dialect(dialect);
        compile(&relation, &options).unwrap()
    }

    #[test]
    fn joins_qualify_columns() {
        let transforms = vec![
            Transform::Join(crate::ir::Join {
                path: vec![JoinStep {
                    from_column: "author_id".into(),
                    table: "authors".into(),
                    to_column: "id".into(),
                }],
                columns: vec![JoinedColumn {
                    column: "name".into(),
                    alias: "author".into(),
                }],
            }),
            Transform::Order(vec![ColumnSort::desc("author".into())]),
        ];

        assert_snapshot!(compile_books(&transforms, Dialect::Generic), @r#"SELECT "books"."id", "books"."title", "books"."author_id", "authors_1"."name" AS "author" FROM "library"."books" LEFT JOIN "library"."authors" AS "authors_1" ON "books"."author_id" = "authors_1"."id" ORDER BY "authors_1"."name" DESC"#);
    }

    #[test]
    fn offset_without_limit() {
        let transforms = vec![
            Transform::Select(vec!["title".into()]),
            Transform::Offset(20),
        ];

        assert_snapshot!(compile_books(&transforms, Dialect::Postgres), @r#"SELECT "title" FROM "library"."books" OFFSET 20"#);
        assert_snapshot!(compile_books(&transforms, Dialect::SQLite), @r#"SELECT "title" FROM "library"."books" LIMIT -1 OFFSET 20"#);
        assert_snapshot!(compile_books(&transforms, Dialect::MySql), @"SELECT `title` FROM `library`.`books` LIMIT 18446744073709551615 OFFSET 20");
    }

    #[test]
    fn filter_after_limit_reads_from_cte() {
        let transforms = vec![
            Transform::Limit(10),
            Transform::Filter(Expr::call(
                FunctionId::Contains,
                vec![Expr::column("title"), Expr::literal("rust")],
            )),
        ];

        assert_snapshot!(compile_books(&transforms, Dialect::Generic), @r#"WITH "table_0" AS (SELECT "id", "title", "author_id" FROM "library"."books" LIMIT 10) SELECT "id", "title", "author_id" FROM "table_0" WHERE "title" LIKE '%rust%'"#);
    }
}
