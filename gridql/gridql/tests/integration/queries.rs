use gridql::functions::FunctionId;
use gridql::ir::{
    Aggregation, ColumnSort, Expr, Grouping, Join, JoinStep, JoinedColumn, Summarize, Transform,
};
use gridql::relation::Provenance;
use gridql::{apply_transformations, Context, QueryDefinition, SchemaProvider, SqlRelation};
use insta::assert_snapshot;
use rstest::rstest;
use serde_json::json;

use crate::{database, records, run, schema_of, sqlite_options};

const PEOPLE: &str = "
    CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT);
    INSERT INTO people VALUES (1, 'b'), (2, 'a'), (3, 'c');
";

const LIBRARY: &str = "
    CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT, country_id INTEGER);
    CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, author_id INTEGER, pages INTEGER);
    INSERT INTO countries VALUES (1, 'Poland'), (2, 'Chile');
    INSERT INTO authors VALUES (1, 'Lem', 1), (2, 'Bolaño', 2), (3, 'Tokarczuk', 1);
    INSERT INTO books VALUES
        (1, 'Solaris', 1, 204),
        (2, 'The Cyberiad', 1, 295),
        (3, '2666', 2, 898),
        (4, 'Flights', 3, 403),
        (5, 'Anonymous Pamphlet', NULL, 12);
";

fn select(names: &[&str]) -> Transform {
    Transform::Select(names.iter().map(|n| n.to_string()).collect())
}

fn order_by(name: &str) -> Transform {
    Transform::Order(vec![ColumnSort::asc(name.to_string())])
}

#[test]
fn select_order_and_paginate() {
    let mut conn = database(PEOPLE);
    let mut definition = QueryDefinition::new("people");
    definition.transforms = vec![
        select(&["name"]),
        order_by("name"),
        Transform::Offset(1),
        Transform::Limit(1),
    ];

    let response = run(&mut conn, &definition);

    assert_eq!(records(&response), json!([{"name": "b"}]));
    assert_eq!(response.parameters, definition);
    assert_eq!(response.columns.len(), 1);
    assert_eq!(response.columns[0].type_name, "text");
}

#[rstest]
#[case(0, 0)]
#[case(2, 2)]
#[case(10, 3)]
fn limit_returns_at_most_n_rows(#[case] limit: u64, #[case] expected: usize) {
    let mut conn = database(PEOPLE);
    let definition = QueryDefinition::new("people").with_transform(Transform::Limit(limit));

    let response = run(&mut conn, &definition);
    assert_eq!(response.records.len(), expected);
}

#[test]
fn filter_after_pagination() {
    let mut conn = database(PEOPLE);
    let definition = QueryDefinition::new("people")
        .with_transform(order_by("id"))
        .with_transform(Transform::Limit(2))
        .with_transform(Transform::Filter(Expr::call(
            FunctionId::NotEqual,
            vec![Expr::column("name"), Expr::literal("b")],
        )));

    // the filter applies to the first two rows only
    let response = run(&mut conn, &definition);
    assert_eq!(records(&response), json!([{"id": 2, "name": "a"}]));
}

#[test]
fn folding_composes() {
    let conn = database(PEOPLE);
    let schema = schema_of(&conn);
    let catalog = schema.catalog();
    let ctx = Context::new(&catalog, &schema);
    let base = SqlRelation::from_table(schema.table("people").unwrap(), &catalog);

    let first = vec![order_by("name"), Transform::Offset(1)];
    let second = vec![select(&["name"]), Transform::Limit(5)];
    let all = [first.clone(), second.clone()].concat();

    let stepwise = apply_transformations(base.clone(), &first, &ctx).unwrap();
    let stepwise = apply_transformations(stepwise, &second, &ctx).unwrap();
    let at_once = apply_transformations(base.clone(), &all, &ctx).unwrap();
    assert_eq!(stepwise, at_once);

    assert_eq!(apply_transformations(base.clone(), &[], &ctx).unwrap(), base);
}

#[test]
fn filters_on_text() {
    let mut conn = database(LIBRARY);
    let filter = |function, needle: &str| {
        QueryDefinition::new("books")
            .with_transform(Transform::Filter(Expr::call(
                function,
                vec![Expr::column("title"), Expr::literal(needle)],
            )))
            .with_transform(order_by("id"))
            .with_transform(select(&["title"]))
    };

    let response = run(&mut conn, &filter(FunctionId::ContainsCaseInsensitive, "THE"));
    assert_eq!(records(&response), json!([{"title": "The Cyberiad"}]));

    let response = run(&mut conn, &filter(FunctionId::StartsWith, "S"));
    assert_eq!(records(&response), json!([{"title": "Solaris"}]));

    let response = run(&mut conn, &filter(FunctionId::EndsWith, "s"));
    assert_eq!(
        records(&response),
        json!([{"title": "Solaris"}, {"title": "Flights"}])
    );
}

#[test]
fn filters_on_numbers() {
    let mut conn = database(LIBRARY);
    let definition = QueryDefinition::new("books")
        .with_transform(Transform::Filter(Expr::call(
            FunctionId::Or,
            vec![
                Expr::call(
                    FunctionId::Between,
                    vec![
                        Expr::column("pages"),
                        Expr::literal(250),
                        Expr::literal(500),
                    ],
                ),
                Expr::call(FunctionId::Empty, vec![Expr::column("author_id")]),
            ],
        )))
        .with_transform(order_by("pages"))
        .with_transform(select(&["id"]));

    let response = run(&mut conn, &definition);
    assert_eq!(records(&response), json!([{"id": 5}, {"id": 2}, {"id": 4}]));
}

fn join_country() -> Transform {
    Transform::Join(Join {
        path: vec![
            JoinStep {
                from_column: "author_id".into(),
                table: "authors".into(),
                to_column: "id".into(),
            },
            JoinStep {
                from_column: "country_id".into(),
                table: "countries".into(),
                to_column: "id".into(),
            },
        ],
        columns: vec![JoinedColumn {
            column: "name".into(),
            alias: "country".into(),
        }],
    })
}

#[test]
fn joins_extend_every_row() {
    let mut conn = database(LIBRARY);
    let definition = QueryDefinition::new("books")
        .with_transform(join_country())
        .with_transform(order_by("id"))
        .with_transform(select(&["title", "country"]));

    let response = run(&mut conn, &definition);

    assert_eq!(
        records(&response),
        json!([
            {"title": "Solaris", "country": "Poland"},
            {"title": "The Cyberiad", "country": "Poland"},
            {"title": "2666", "country": "Chile"},
            {"title": "Flights", "country": "Poland"},
            {"title": "Anonymous Pamphlet", "country": null},
        ])
    );
    assert_eq!(
        response.columns[1].provenance,
        Provenance::Join {
            table: "countries".into(),
            column: "name".into(),
            path: vec!["authors".into(), "countries".into()],
        }
    );
}

#[test]
fn summarize_joined_column() {
    let mut conn = database(LIBRARY);
    let definition = QueryDefinition::new("books")
        .with_transform(join_country())
        .with_transform(Transform::Filter(Expr::call(
            FunctionId::NotEmpty,
            vec![Expr::column("country")],
        )))
        .with_transform(Transform::Summarize(Summarize {
            grouping: vec![Grouping {
                expr: Expr::column("country"),
                alias: "country".into(),
            }],
            aggregations: vec![
                Aggregation {
                    expr: Expr::call(FunctionId::Count, vec![Expr::column("id")]),
                    alias: "books".into(),
                },
                Aggregation {
                    expr: Expr::call(FunctionId::Sum, vec![Expr::column("pages")]),
                    alias: "pages".into(),
                },
            ],
        }))
        .with_transform(order_by("country"));

    let response = run(&mut conn, &definition);

    assert_eq!(
        records(&response),
        json!([
            {"country": "Chile", "books": 1, "pages": 898},
            {"country": "Poland", "books": 3, "pages": 902},
        ])
    );
    assert_eq!(response.columns[1].type_name, "bigint");
}

#[test]
fn compiled_sql() {
    let conn = database(LIBRARY);
    let schema = schema_of(&conn);
    let definition = QueryDefinition::new("books")
        .with_transform(join_country())
        .with_transform(Transform::Limit(3))
        .with_transform(Transform::Filter(Expr::call(
            FunctionId::Contains,
            vec![Expr::column("country"), Expr::literal("land")],
        )));

    let sql = gridql::query::compile(&definition, &schema, &schema.catalog(), &sqlite_options())
        .unwrap();
    assert_snapshot!(sql, @r#"WITH "table_0" AS (SELECT "books"."id", "books"."title", "books"."author_id", "books"."pages", "countries_2"."name" AS "country" FROM "books" LEFT JOIN "authors" AS "authors_1" ON "books"."author_id" = "authors_1"."id" LEFT JOIN "countries" AS "countries_2" ON "authors_1"."country_id" = "countries_2"."id" LIMIT 3) SELECT "id", "title", "author_id", "pages", "country" FROM "table_0" WHERE "country" LIKE '%land%'"#);
}

#[test]
fn oversized_pagination() {
    let mut conn = database(PEOPLE);

    let definition = QueryDefinition::new("people")
        .with_transform(Transform::Offset(u64::MAX))
        .with_transform(Transform::Offset(1));
    assert_eq!(run(&mut conn, &definition).records.len(), 0);

    let definition = QueryDefinition::new("people").with_transform(Transform::Limit(u64::MAX));
    assert_eq!(run(&mut conn, &definition).records.len(), 3);

    let schema = schema_of(&conn);
    let sql = gridql::query::compile(&definition, &schema, &schema.catalog(), &sqlite_options())
        .unwrap();
    assert_snapshot!(sql, @r#"SELECT "id", "name" FROM "people" LIMIT 9223372036854775807"#);
}

#[test]
fn like_wildcards_match_themselves() {
    let mut conn = database(
        "CREATE TABLE labels (name TEXT);
         INSERT INTO labels VALUES ('b'), ('a'), ('c'), ('50% off'), ('x_y');",
    );
    let filter = |function, needle: &str| {
        QueryDefinition::new("labels").with_transform(Transform::Filter(Expr::call(
            function,
            vec![Expr::column("name"), Expr::literal(needle)],
        )))
    };

    let response = run(&mut conn, &filter(FunctionId::Contains, "_"));
    assert_eq!(records(&response), json!([{"name": "x_y"}]));

    let response = run(&mut conn, &filter(FunctionId::Contains, "%"));
    assert_eq!(records(&response), json!([{"name": "50% off"}]));

    let response = run(&mut conn, &filter(FunctionId::StartsWith, "50%"));
    assert_eq!(records(&response), json!([{"name": "50% off"}]));

    let response = run(&mut conn, &filter(FunctionId::ContainsCaseInsensitive, "X_"));
    assert_eq!(records(&response), json!([{"name": "x_y"}]));
}

#[test]
fn order_is_kept_after_a_join() {
    let mut conn = database(LIBRARY);
    let schema = schema_of(&conn);
    let definition = QueryDefinition::new("books")
        .with_transform(Transform::Order(vec![ColumnSort::desc("title".into())]))
        .with_transform(Transform::Limit(3))
        .with_transform(join_country())
        .with_transform(select(&["title", "country"]));

    let sql = gridql::query::compile(&definition, &schema, &schema.catalog(), &sqlite_options())
        .unwrap();
    assert_snapshot!(sql, @r#"WITH "table_0" AS (SELECT "id", "title", "author_id", "pages" FROM "books" ORDER BY "title" DESC LIMIT 3) SELECT "table_0"."title", "countries_2"."name" AS "country" FROM "table_0" LEFT JOIN "authors" AS "authors_1" ON "table_0"."author_id" = "authors_1"."id" LEFT JOIN "countries" AS "countries_2" ON "authors_1"."country_id" = "countries_2"."id" ORDER BY "table_0"."title" DESC"#);

    let response = run(&mut conn, &definition);
    assert_eq!(
        records(&response),
        json!([
            {"title": "The Cyberiad", "country": "Poland"},
            {"title": "Solaris", "country": "Poland"},
            {"title": "Flights", "country": "Poland"},
        ])
    );
}

#[test]
fn order_by_a_hidden_column_is_kept() {
    let mut conn = database(LIBRARY);
    let definition = QueryDefinition::new("books")
        .with_transform(Transform::Order(vec![ColumnSort::desc("title".into())]))
        .with_transform(select(&["id"]))
        .with_transform(Transform::Limit(2))
        .with_transform(Transform::Filter(Expr::call(
            FunctionId::NotEmpty,
            vec![Expr::column("id")],
        )));

    let response = run(&mut conn, &definition);
    assert_eq!(records(&response), json!([{"id": 2}, {"id": 1}]));
    assert_eq!(response.columns.len(), 1);
}

#[rstest]
#[case(vec![order_by("name")], 3)]
#[case(vec![order_by("name"), Transform::Limit(2)], 2)]
#[case(vec![order_by("id"), Transform::Offset(1), Transform::Limit(5)], 2)]
fn summarize_after_order(#[case] before: Vec<Transform>, #[case] expected: u64) {
    let mut conn = database(PEOPLE);
    let count = Transform::Summarize(Summarize {
        grouping: vec![],
        aggregations: vec![Aggregation {
            expr: Expr::call(FunctionId::Count, vec![Expr::column("id")]),
            alias: "people".into(),
        }],
    });
    let mut definition = QueryDefinition::new("people");
    definition.transforms = [before, vec![count]].concat();

    let response = run(&mut conn, &definition);
    assert_eq!(records(&response), json!([{ "people": expected }]));
}

#[test]
fn invalid_definitions_name_the_transform() {
    let mut conn = database(LIBRARY);
    let schema = schema_of(&conn);
    let definition = QueryDefinition::new("books")
        .with_transform(select(&["title"]))
        .with_transform(Transform::Filter(Expr::call(
            FunctionId::Greater,
            vec![Expr::column("pages"), Expr::literal(100)],
        )));

    let error = gridql::query::run(
        &definition,
        &schema,
        &schema.catalog(),
        &sqlite_options(),
        &mut conn,
    )
    .unwrap_err();
    let error = error.downcast::<gridql::Error>().unwrap();

    assert_snapshot!(error.to_string(), @"transform #1 (filter), field `spec`: column `pages` not found");
    assert!(!error.is_internal());
    assert_eq!(error.code, Some("E0001"));
}

#[test]
fn database_errors_pass_through() {
    let mut conn = database(LIBRARY);
    let schema = schema_of(&conn);
    conn.execute_batch("DROP TABLE books").unwrap();

    let error = gridql::query::run(
        &QueryDefinition::new("books"),
        &schema,
        &schema.catalog(),
        &sqlite_options(),
        &mut conn,
    )
    .unwrap_err();

    assert!(error.downcast_ref::<rusqlite::Error>().is_some());
}
