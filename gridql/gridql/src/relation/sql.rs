//! Relation backed by a SQL query.
//!
//! A [SqlRelation] is a chain of SELECTs: finished ones are kept as named
//! CTEs, the last one is still open and absorbs new transforms as long as
//! that preserves their meaning. When it would not (eg. a filter after a
//! limit), the open SELECT is closed into a CTE and a new one reads from it.

use itertools::Itertools;

use super::{Column, JoinPlan, Provenance, Relation, SummarizePlan};
use crate::catalog::TypeCatalog;
use crate::functions::FunctionId;
use crate::ir::{ColumnSort, Expr, Literal};
use crate::schema::Table;
use crate::{Error, Result};

/// Largest row count or offset that databases accept in LIMIT and OFFSET.
/// Larger values select the same rows, so they are clamped to it.
const MAX_ROWS: u64 = i64::MAX as u64;

/// Expression where every column reference is bound to a source of the
/// SELECT it appears in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlExpr {
    Column { source: String, name: String },
    Literal { value: Literal, ty: Option<String> },
    Call { function: FunctionId, args: Vec<SqlExpr> },
    Cast { expr: Box<SqlExpr>, to: String },
    Over(Box<SqlExpr>),
}

impl SqlExpr {
    fn column(source: &str, name: &str) -> Self {
        SqlExpr::Column {
            source: source.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn contains_window(&self) -> bool {
        match self {
            SqlExpr::Over(_) => true,
            SqlExpr::Call { args, .. } => args.iter().any(SqlExpr::contains_window),
            SqlExpr::Cast { expr, .. } => expr.contains_window(),
            SqlExpr::Column { .. } | SqlExpr::Literal { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlSource {
    Table { name: String, alias: String },
    Cte(String),
}

impl SqlSource {
    pub(crate) fn alias(&self) -> &str {
        match self {
            SqlSource::Table { alias, .. } => alias,
            SqlSource::Cte(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JoinClause {
    pub table: String,
    pub alias: String,
    pub left: SqlExpr,
    pub right_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub from: SqlSource,
    pub joins: Vec<JoinClause>,
    /// Output expressions with their aliases, aligned with the relation's
    /// columns.
    pub projection: Vec<(SqlExpr, String)>,
    pub filter: Option<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub order_by: Vec<ColumnSort<SqlExpr>>,
    pub limit: Option<u64>,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Cte {
    pub name: String,
    pub select: Select,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlRelation {
    pub(crate) ctes: Vec<Cte>,
    pub(crate) select: Select,
    columns: Vec<Column>,
}

impl Select {
    fn reading(from: SqlSource, columns: &[Column]) -> Self {
        let source = from.alias().to_string();
        Select {
            projection: columns
                .iter()
                .map(|c| (SqlExpr::column(&source, &c.name), c.name.clone()))
                .collect(),
            from,
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    fn is_paginated(&self) -> bool {
        self.limit.is_some() || self.offset > 0
    }

    /// Whether this SELECT only reads columns of its source, so wrapping it
    /// into a CTE would not change anything.
    fn is_plain_read(&self) -> bool {
        let source = self.from.alias();
        self.joins.is_empty()
            && self.filter.is_none()
            && self.group_by.is_empty()
            && self.order_by.is_empty()
            && !self.is_paginated()
            && (self.projection.iter()).all(|(expr, alias)| {
                matches!(expr, SqlExpr::Column { source: s, name } if s == source && name == alias)
            })
    }

    /// Alias for a sort key that is not part of the projection.
    fn hidden_sort_alias(&self) -> String {
        let mut index = self.projection.len();
        loop {
            let alias = format!("_sort_{index}");
            if !self.projection.iter().any(|(_, a)| *a == alias) {
                return alias;
            }
            index += 1;
        }
    }

    /// Whether rows of this SELECT are still rows of its sources, so that
    /// WHERE clauses and joins can be added to it.
    fn is_row_preserving(&self) -> bool {
        self.group_by.is_empty()
            && !self.is_paginated()
            && !self.projection.iter().any(|(e, _)| e.contains_window())
    }
}

impl SqlRelation {
    /// Relation over all columns of a table, with types canonicalized
    /// through the catalog.
    pub fn from_table(table: &Table, catalog: &TypeCatalog) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                type_name: catalog.canonicalize(&c.type_name).to_string(),
                type_options: c.type_options.clone(),
                display_options: c.display_options.clone(),
                primary_key: c.primary_key,
                provenance: Provenance::Table {
                    table: table.qualified_name(),
                    column: c.name.clone(),
                },
            })
            .collect_vec();

        let from = SqlSource::Table {
            name: table.qualified_name(),
            alias: table.name.clone(),
        };
        SqlRelation {
            ctes: Vec::new(),
            select: Select::reading(from, &columns),
            columns,
        }
    }

    /// Binds an expression over this relation's columns to the sources of
    /// the open SELECT, inlining computed columns.
    fn bind(&self, expr: &Expr) -> Result<SqlExpr> {
        Ok(match expr {
            Expr::Column(name) => self.bind_column(name)?,
            Expr::Literal { value, ty } => SqlExpr::Literal {
                value: value.clone(),
                ty: ty.clone(),
            },
            Expr::Call { function, args } => SqlExpr::Call {
                function: *function,
                args: args.iter().map(|a| self.bind(a)).try_collect()?,
            },
            Expr::Cast { expr, to } => SqlExpr::Cast {
                expr: Box::new(self.bind(expr)?),
                to: to.clone(),
            },
            Expr::Over(expr) => SqlExpr::Over(Box::new(self.bind(expr)?)),
        })
    }

    fn bind_column(&self, name: &str) -> Result<SqlExpr> {
        self.select
            .projection
            .iter()
            .find(|(_, alias)| alias == name)
            .map(|(expr, _)| expr.clone())
            .ok_or_else(|| Error::new_assert(format!("unbound column `{name}`")))
    }

    /// Closes the open SELECT into a CTE unless it satisfies `keep_open`.
    fn wrap_unless(self, keep_open: bool) -> Result<Self> {
        if keep_open {
            Ok(self)
        } else {
            self.into_subquery()
        }
    }
}

impl Relation for SqlRelation {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn has_query(&self) -> bool {
        !self.select.projection.is_empty()
    }

    fn select_columns(mut self, names: &[String]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        let mut projection = Vec::with_capacity(names.len());
        for name in names {
            let position = (self.columns.iter())
                .position(|c| &c.name == name)
                .ok_or_else(|| Error::new_assert(format!("unbound column `{name}`")))?;
            columns.push(self.columns[position].clone());
            projection.push(self.select.projection[position].clone());
        }
        self.columns = columns;
        self.select.projection = projection;
        Ok(self)
    }

    fn extend(self, columns: Vec<(Column, Expr)>) -> Result<Self> {
        let keep_open = self.select.is_row_preserving();
        let mut relation = self.wrap_unless(keep_open)?;

        for (column, expr) in columns {
            let bound = relation.bind(&expr)?;
            relation.select.projection.push((bound, column.name.clone()));
            relation.columns.push(column);
        }
        Ok(relation)
    }

    fn filter(self, predicate: &Expr) -> Result<Self> {
        let keep_open = self.select.is_row_preserving();
        let mut relation = self.wrap_unless(keep_open)?;

        let predicate = relation.bind(predicate)?;
        relation.select.filter = Some(match relation.select.filter.take() {
            Some(existing) => SqlExpr::Call {
                function: FunctionId::And,
                args: vec![existing, predicate],
            },
            None => predicate,
        });
        Ok(relation)
    }

    fn order(self, sorts: &[ColumnSort<String>]) -> Result<Self> {
        let keep_open = !self.select.is_paginated();
        let mut relation = self.wrap_unless(keep_open)?;

        let order_by = sorts
            .iter()
            .map(|sort| -> Result<ColumnSort<SqlExpr>> {
                Ok(ColumnSort {
                    direction: sort.direction,
                    column: relation.bind_column(&sort.column)?,
                })
            })
            .try_collect()?;
        relation.select.order_by = order_by;
        Ok(relation)
    }

    fn offset(mut self, offset: u64) -> Result<Self> {
        let offset = offset.min(MAX_ROWS);
        self.select.offset = self.select.offset.saturating_add(offset).min(MAX_ROWS);
        if let Some(limit) = self.select.limit {
            self.select.limit = Some(limit.saturating_sub(offset));
        }
        Ok(self)
    }

    fn limit(mut self, limit: u64) -> Result<Self> {
        let limit = limit.min(MAX_ROWS);
        self.select.limit = Some(match self.select.limit {
            Some(existing) => existing.min(limit),
            None => limit,
        });
        Ok(self)
    }

    fn join(self, plan: &JoinPlan) -> Result<Self> {
        let keep_open = self.select.is_row_preserving();
        let mut relation = self.wrap_unless(keep_open)?;

        let mut previous_alias: Option<String> = None;
        for hop in &plan.hops {
            let left = match &previous_alias {
                None => relation.bind_column(&hop.from_column)?,
                Some(alias) => SqlExpr::column(alias, &hop.from_column),
            };
            let bare_name = hop.table.rsplit('.').next().unwrap_or(&hop.table);
            let alias = format!("{bare_name}_{}", relation.select.joins.len() + 1);

            relation.select.joins.push(JoinClause {
                table: hop.table.clone(),
                alias: alias.clone(),
                left,
                right_column: hop.to_column.clone(),
            });
            previous_alias = Some(alias);
        }

        let target = previous_alias.ok_or_else(|| Error::new_assert("join without a path"))?;
        for source in &plan.columns {
            relation.select.projection.push((
                SqlExpr::column(&target, &source.column),
                source.output.name.clone(),
            ));
            relation.columns.push(source.output.clone());
        }
        log::debug!("joined {} hop(s) into the open select", plan.hops.len());
        Ok(relation)
    }

    fn summarize(self, plan: &SummarizePlan) -> Result<Self> {
        let keep_open = self.select.is_row_preserving();
        let mut relation = self.wrap_unless(keep_open)?;
        // groups have no order
        relation.select.order_by.clear();

        let groups: Vec<SqlExpr> = (plan.groups.iter())
            .map(|(_, expr)| relation.bind(expr))
            .try_collect()?;
        let aggregations: Vec<SqlExpr> = (plan.aggregations.iter())
            .map(|(_, expr)| relation.bind(expr))
            .try_collect()?;

        let outputs = plan.groups.iter().chain(&plan.aggregations);
        relation.select.projection = (groups.iter().cloned())
            .chain(aggregations)
            .zip(outputs.clone())
            .map(|(expr, (column, _))| (expr, column.name.clone()))
            .collect();
        relation.select.group_by = groups;
        relation.columns = outputs.map(|(column, _)| column.clone()).collect();
        Ok(relation)
    }

    fn into_subquery(mut self) -> Result<Self> {
        if self.select.is_plain_read() {
            return Ok(self);
        }
        let name = format!("table_{}", self.ctes.len());
        log::debug!("closing select into CTE `{name}`");

        let reading = Select::reading(SqlSource::Cte(name.clone()), &self.columns);
        let mut closed = std::mem::replace(&mut self.select, reading);

        // Rows read from a CTE come in no particular order, so the outer
        // SELECT sorts again. The CTE keeps its ORDER BY only when LIMIT or
        // OFFSET depend on it.
        let sorts = if closed.is_paginated() {
            closed.order_by.clone()
        } else {
            std::mem::take(&mut closed.order_by)
        };
        for sort in sorts {
            let projected = (closed.projection.iter())
                .find(|(expr, _)| *expr == sort.column)
                .map(|(_, alias)| alias.clone());
            let alias = match projected {
                Some(alias) => alias,
                None => {
                    let alias = closed.hidden_sort_alias();
                    closed.projection.push((sort.column, alias.clone()));
                    alias
                }
            };
            self.select.order_by.push(ColumnSort {
                direction: sort.direction,
                column: SqlExpr::column(&name, &alias),
            });
        }

        self.ctes.push(Cte {
            name,
            select: closed,
        });
        Ok(self)
    }
}
