//! Validation of transforms against the relation they are applied to.
//!
//! Validation resolves a [Transform] into a [Step]: names are checked,
//! types are canonicalized and joins/summaries are turned into plans that a
//! [Relation] can apply without further checks.

mod types;

use std::collections::HashSet;

use itertools::Itertools;

pub(crate) use types::{Inferred, TypeChecker};

use crate::catalog::TypeCatalog;
use crate::error::{Error, Reason, WithErrorInfo};
use crate::ir::{ColumnSort, Expr, ExprFold, Join, Literal, Summarize, Transform};
use crate::relation::{Column, JoinHop, JoinPlan, JoinSource, Provenance, Relation, SummarizePlan};
use crate::schema::{SchemaProvider, Table};
use crate::Result;

/// Everything validation needs to know about the database.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub catalog: &'a TypeCatalog,
    pub schema: &'a dyn SchemaProvider,
}

impl<'a> Context<'a> {
    pub fn new(catalog: &'a TypeCatalog, schema: &'a dyn SchemaProvider) -> Self {
        Context { catalog, schema }
    }
}

/// A validated transform.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Select(Vec<String>),
    Order(Vec<ColumnSort<String>>),
    Offset(u64),
    Limit(u64),
    Filter(Expr),
    Join(JoinPlan),
    Summarize(SummarizePlan),
}

/// Validates a transform against the relation it will be applied to.
pub(crate) fn resolve<R: Relation>(transform: &Transform, relation: &R, ctx: &Context) -> Result<Step> {
    match transform {
        Transform::Select(names) => {
            if names.is_empty() {
                return Err(Error::new_simple("select needs at least one column"));
            }
            check_unique(names.iter(), "column")?;
            for (i, name) in names.iter().enumerate() {
                require_column(relation, name).with_field(format!("spec[{i}]"))?;
            }
            Ok(Step::Select(names.clone()))
        }
        Transform::Hide(names) => {
            for (i, name) in names.iter().enumerate() {
                require_column(relation, name).with_field(format!("spec[{i}]"))?;
            }
            let kept = (relation.columns().iter())
                .map(|c| &c.name)
                .filter(|name| !names.contains(name))
                .cloned()
                .collect_vec();
            if kept.is_empty() {
                return Err(Error::new_simple("cannot hide every column"));
            }
            Ok(Step::Select(kept))
        }
        Transform::Order(sorts) => {
            for (i, sort) in sorts.iter().enumerate() {
                require_column(relation, &sort.column).with_field(format!("spec[{i}].column"))?;
            }
            Ok(Step::Order(sorts.clone()))
        }
        Transform::Offset(offset) => Ok(Step::Offset(*offset)),
        Transform::Limit(limit) => Ok(Step::Limit(*limit)),
        Transform::Filter(predicate) => {
            let predicate = Canonicalize(ctx.catalog).fold_expr(predicate.clone())?;
            TypeChecker::new(relation, ctx)
                .check_predicate(&predicate)
                .with_field(Transform::SPEC_FIELD)?;
            Ok(Step::Filter(predicate))
        }
        Transform::Join(join) => resolve_join(join, relation, ctx).map(Step::Join),
        Transform::Summarize(summarize) => {
            resolve_summarize(summarize, relation, ctx).map(Step::Summarize)
        }
    }
}

fn require_column<R: Relation>(relation: &R, name: &str) -> Result<()> {
    match relation.column(name) {
        Some(_) => Ok(()),
        None => Err(types::column_not_found(relation, name)),
    }
}

fn check_unique<'n, I: Iterator<Item = &'n String>>(names: I, namespace: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::new(Reason::Duplicate {
                name: name.clone(),
                namespace: namespace.to_string(),
            })
            .with_code("E0002"));
        }
    }
    Ok(())
}

fn find_table<'a>(ctx: &Context<'a>, name: &str) -> Result<&'a Table> {
    ctx.schema.table(name).ok_or_else(|| {
        Error::new_not_found(name, "table")
            .push_hint(format!(
                "available tables: {}",
                ctx.schema.table_names().join(", ")
            ))
            .with_code("E0001")
    })
}

fn resolve_join<R: Relation>(join: &Join, relation: &R, ctx: &Context) -> Result<JoinPlan> {
    if join.path.is_empty() {
        return Err(Error::new(Reason::Expected {
            who: Some("join".to_string()),
            expected: "at least one step in the path".to_string(),
            found: "an empty path".to_string(),
        })
        .with_field("spec.path"));
    }
    if join.columns.is_empty() {
        return Err(Error::new_simple("join does not add any columns").with_field("spec.columns"));
    }

    let mut hops = Vec::with_capacity(join.path.len());
    let mut tables = Vec::with_capacity(join.path.len());
    let mut previous: Option<&Table> = None;

    for (i, step) in join.path.iter().enumerate() {
        let field = |name: &str| format!("spec.path[{i}].{name}");

        let from_type = match previous {
            None => relation
                .column(&step.from_column)
                .map(|c| c.type_name.clone())
                .ok_or_else(|| types::column_not_found(relation, &step.from_column)),
            Some(table) => table_column_type(table, &step.from_column, ctx),
        }
        .with_field(field("from_column"))?;

        let table = find_table(ctx, &step.table).with_field(field("table"))?;
        let to_type =
            table_column_type(table, &step.to_column, ctx).with_field(field("to_column"))?;

        if !joinable(&from_type, &to_type, ctx) {
            return Err(Error::new_simple(format!(
                "cannot join `{}` of type `{from_type}` to `{}.{}` of type `{to_type}`",
                step.from_column, step.table, step.to_column
            ))
            .with_field(field("to_column")));
        }

        hops.push(JoinHop {
            from_column: step.from_column.clone(),
            table: table.qualified_name(),
            to_column: step.to_column.clone(),
        });
        tables.push(table.qualified_name());
        previous = Some(table);
    }

    let Some(target) = previous else {
        return Err(Error::new_assert("join path resolved to no table"));
    };

    let aliases = join.columns.iter().map(|c| &c.alias);
    check_unique(aliases, "column").with_field("spec.columns")?;

    let mut columns = Vec::with_capacity(join.columns.len());
    for (i, joined) in join.columns.iter().enumerate() {
        let field = |name: &str| format!("spec.columns[{i}].{name}");

        if relation.column(&joined.alias).is_some() {
            return Err(Error::new(Reason::Duplicate {
                name: joined.alias.clone(),
                namespace: "column".to_string(),
            })
            .push_hint("choose an alias that is not already a column of the relation")
            .with_code("E0002")
            .with_field(field("alias")));
        }
        let Some(source) = target.column(&joined.column) else {
            return Err(table_column_not_found(target, &joined.column).with_field(field("column")));
        };

        columns.push(JoinSource {
            column: joined.column.clone(),
            output: Column {
                name: joined.alias.clone(),
                type_name: ctx.catalog.canonicalize(&source.type_name).to_string(),
                type_options: source.type_options.clone(),
                display_options: source.display_options.clone(),
                primary_key: false,
                provenance: Provenance::Join {
                    table: target.qualified_name(),
                    column: joined.column.clone(),
                    path: tables.clone(),
                },
            },
        });
    }

    Ok(JoinPlan { hops, columns })
}

fn table_column_type(table: &Table, column: &str, ctx: &Context) -> Result<String> {
    match table.column(column) {
        Some(c) => Ok(ctx.catalog.canonicalize(&c.type_name).to_string()),
        None => Err(table_column_not_found(table, column)),
    }
}

fn table_column_not_found(table: &Table, column: &str) -> Error {
    Error::new_not_found(format!("{}.{column}", table.name), "column")
        .push_hint(format!(
            "columns of `{}`: {}",
            table.name,
            table.columns.iter().map(|c| &c.name).join(", ")
        ))
        .with_code("E0001")
}

/// Keys can be joined when their types match, or when both are numbers.
fn joinable(a: &str, b: &str, ctx: &Context) -> bool {
    use crate::catalog::TypeCategory;

    a == b
        || (ctx.catalog.category(a) == Some(TypeCategory::Numeric)
            && ctx.catalog.category(b) == Some(TypeCategory::Numeric))
}

fn resolve_summarize<R: Relation>(
    summarize: &Summarize,
    relation: &R,
    ctx: &Context,
) -> Result<SummarizePlan> {
    if summarize.grouping.is_empty() && summarize.aggregations.is_empty() {
        return Err(Error::new_simple(
            "summarize needs at least one grouping or aggregation",
        ));
    }
    let aliases = (summarize.grouping.iter().map(|g| &g.alias))
        .chain(summarize.aggregations.iter().map(|a| &a.alias));
    check_unique(aliases, "column").with_field(Transform::SPEC_FIELD)?;

    let row_checker = TypeChecker::new(relation, ctx);
    let mut groups = Vec::with_capacity(summarize.grouping.len());
    for (i, grouping) in summarize.grouping.iter().enumerate() {
        let field = format!("spec.grouping[{i}].expr");
        let expr = Canonicalize(ctx.catalog).fold_expr(grouping.expr.clone())?;

        if expr.contains_aggregate() || contains_over(&expr) {
            return Err(Error::new_simple("grouping expressions cannot aggregate")
                .push_hint("move the expression to the aggregations")
                .with_field(field));
        }
        let inferred = row_checker.check(&expr).with_field(&field)?;

        let column = match &expr {
            // grouping by a plain column keeps what we know about it
            Expr::Column(name) => match relation.column(name) {
                Some(c) => c.renamed(&grouping.alias),
                None => return Err(Error::new_assert("checked column vanished")),
            },
            _ => derived_column(&grouping.alias, &inferred, ctx),
        };
        groups.push((column, expr));
    }

    let keys: Vec<&str> = (summarize.grouping.iter())
        .filter_map(|g| g.expr.as_column().map(String::as_str))
        .collect();

    let aggregate_checker = TypeChecker::new(relation, ctx).with_aggregates();
    let mut aggregations = Vec::with_capacity(summarize.aggregations.len());
    for (i, aggregation) in summarize.aggregations.iter().enumerate() {
        let field = format!("spec.aggregations[{i}].expr");
        let expr = Canonicalize(ctx.catalog).fold_expr(aggregation.expr.clone())?;

        check_grouped(&expr, &keys).with_field(&field)?;
        let inferred = aggregate_checker.check(&expr).with_field(&field)?;

        aggregations.push((derived_column(&aggregation.alias, &inferred, ctx), expr));
    }

    Ok(SummarizePlan {
        groups,
        aggregations,
    })
}

/// Columns referenced outside of aggregate calls must be grouping keys.
fn check_grouped(expr: &Expr, keys: &[&str]) -> Result<()> {
    match expr {
        Expr::Column(name) if keys.contains(&name.as_str()) => Ok(()),
        Expr::Column(name) => Err(Error::new_simple(format!(
            "column `{name}` must be a grouping key or used inside an aggregate function"
        ))
        .push_hint(format!("group by `{name}` or wrap it with `count`"))
        .with_code("E0005")),
        Expr::Call { function, .. } if function.is_aggregate() => Ok(()),
        Expr::Call { args, .. } => args.iter().try_for_each(|a| check_grouped(a, keys)),
        Expr::Cast { expr, .. } => check_grouped(expr, keys),
        Expr::Over(_) => Err(Error::new_simple(
            "window aggregates cannot be used in summarize",
        )),
        Expr::Literal { .. } => Ok(()),
    }
}

fn contains_over(expr: &Expr) -> bool {
    match expr {
        Expr::Over(_) => true,
        Expr::Call { args, .. } => args.iter().any(contains_over),
        Expr::Cast { expr, .. } => contains_over(expr),
        Expr::Column(_) | Expr::Literal { .. } => false,
    }
}

fn derived_column(alias: &str, inferred: &Inferred, ctx: &Context) -> Column {
    let type_name = inferred.type_name(ctx).unwrap_or_else(|| "text".to_string());
    Column::derived(alias, type_name)
}

/// Rewrites type names in literals and casts to their canonical form.
struct Canonicalize<'a>(&'a TypeCatalog);

impl ExprFold for Canonicalize<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        match expr {
            Expr::Cast { expr, to } => Ok(Expr::Cast {
                expr: Box::new(self.fold_expr(*expr)?),
                to: self.0.canonicalize(&to).to_string(),
            }),
            expr => crate::ir::fold_expr(self, expr),
        }
    }

    fn fold_literal(&mut self, value: Literal, ty: Option<String>) -> Result<Expr> {
        let ty = ty.map(|t| self.0.canonicalize(&t).to_string());
        Ok(Expr::Literal { value, ty })
    }
}
