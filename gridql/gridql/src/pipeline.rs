//! Folds transforms over a relation.

use itertools::Itertools;

use crate::error::WithErrorInfo;
use crate::ir::{ColumnSort, Expr, Transform};
use crate::relation::{enforce_relation_contract, Relation};
use crate::semantic::{resolve, Context, Step};
use crate::Result;

/// Applies transforms in order, validating each one against the relation
/// produced by the previous.
///
/// The first failing transform aborts the fold. Errors carry the index and
/// kind of that transform.
pub fn apply_transformations<R: Relation>(
    relation: R,
    transforms: &[Transform],
    ctx: &Context,
) -> Result<R> {
    enforce_relation_contract(&relation)?;

    transforms
        .iter()
        .enumerate()
        .try_fold(relation, |relation, (index, transform)| {
            apply_transform(relation, transform, ctx).with_transform(index, transform.kind())
        })
}

fn apply_transform<R: Relation>(relation: R, transform: &Transform, ctx: &Context) -> Result<R> {
    let step = resolve(transform, &relation, ctx)?;
    log::debug!("applying {}: {step:?}", transform.kind());

    let relation = match step {
        Step::Select(names) => relation.select_columns(&names)?,
        Step::Order(sorts) => relation.order(&sorts)?,
        Step::Offset(offset) => relation.offset(offset)?,
        Step::Limit(limit) => relation.limit(limit)?,
        Step::Filter(predicate) => relation.filter(&predicate)?,
        Step::Join(plan) => relation.join(&plan)?,
        Step::Summarize(plan) => relation.summarize(&plan)?,
    };

    enforce_relation_contract(&relation)?;
    Ok(relation)
}

/// Pagination and ordering parameters of the old request format.
#[derive(Debug, Clone, Default)]
pub struct LegacyParams {
    pub filter: Option<Expr>,
    pub order_by: Vec<ColumnSort<String>>,
    /// Order by the primary key when `order_by` is empty.
    pub order_by_default: bool,
    pub columns_to_select: Option<Vec<String>>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Applies transforms derived from [LegacyParams], in a fixed order: filter,
/// ordering, column subset, offset, limit.
#[deprecated(note = "Build a transform list and call `apply_transformations` instead")]
pub fn apply_transformations_deprecated<R: Relation>(
    relation: R,
    params: LegacyParams,
    ctx: &Context,
) -> Result<R> {
    let transforms = legacy_transforms(&relation, params);
    apply_transformations(relation, &transforms, ctx)
}

fn legacy_transforms<R: Relation>(relation: &R, params: LegacyParams) -> Vec<Transform> {
    let mut transforms = Vec::new();

    if let Some(filter) = params.filter {
        transforms.push(Transform::Filter(filter));
    }
    if !params.order_by.is_empty() {
        transforms.push(Transform::Order(params.order_by));
    } else if params.order_by_default {
        transforms.push(Transform::Order(default_ordering(relation)));
    }
    if let Some(columns) = params.columns_to_select {
        transforms.push(Transform::Select(columns));
    }
    if let Some(offset) = params.offset {
        transforms.push(Transform::Offset(offset));
    }
    if let Some(limit) = params.limit {
        transforms.push(Transform::Limit(limit));
    }
    transforms
}

/// Primary key columns, or all columns when there is no primary key.
fn default_ordering<R: Relation>(relation: &R) -> Vec<ColumnSort<String>> {
    let primary_key = (relation.columns().iter())
        .filter(|c| c.primary_key)
        .map(|c| ColumnSort::asc(c.name.clone()))
        .collect_vec();
    if !primary_key.is_empty() {
        return primary_key;
    }
    (relation.columns().iter())
        .map(|c| ColumnSort::asc(c.name.clone()))
        .collect()
}
