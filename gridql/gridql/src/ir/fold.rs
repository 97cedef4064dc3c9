//! Rewriting of expression trees, one node kind at a time.

use itertools::Itertools;

use super::{Expr, Literal};
use crate::functions::FunctionId;
use crate::Result;

/// Folds an expression tree into a new one.
///
/// Every method defaults to rebuilding the node unchanged. Implementors
/// override the node kinds they care about, and may call the free
/// [fold_expr] / [fold_call] functions to recurse from an override.
pub trait ExprFold {
    fn fold_expr(&mut self, expr: Expr) -> Result<Expr> {
        fold_expr(self, expr)
    }
    fn fold_exprs(&mut self, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
        exprs.into_iter().map(|e| self.fold_expr(e)).try_collect()
    }
    fn fold_column(&mut self, name: String) -> Result<Expr> {
        Ok(Expr::Column(name))
    }
    fn fold_literal(&mut self, value: Literal, ty: Option<String>) -> Result<Expr> {
        Ok(Expr::Literal { value, ty })
    }
    fn fold_call(&mut self, function: FunctionId, args: Vec<Expr>) -> Result<Expr> {
        fold_call(self, function, args)
    }
}

pub fn fold_expr<F: ?Sized + ExprFold>(fold: &mut F, expr: Expr) -> Result<Expr> {
    Ok(match expr {
        Expr::Column(name) => fold.fold_column(name)?,
        Expr::Literal { value, ty } => fold.fold_literal(value, ty)?,
        Expr::Call { function, args } => fold.fold_call(function, args)?,
        Expr::Cast { expr, to } => Expr::Cast {
            expr: Box::new(fold.fold_expr(*expr)?),
            to,
        },
        Expr::Over(expr) => Expr::Over(Box::new(fold.fold_expr(*expr)?)),
    })
}

pub fn fold_call<F: ?Sized + ExprFold>(
    fold: &mut F,
    function: FunctionId,
    args: Vec<Expr>,
) -> Result<Expr> {
    Ok(Expr::Call {
        function,
        args: fold.fold_exprs(args)?,
    })
}
