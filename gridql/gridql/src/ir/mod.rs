//! Intermediate representation of query definitions: expressions and the
//! transforms that reference them.

mod expr;
mod fold;
mod generic;
mod transform;

pub use expr::{Expr, Literal};
pub use fold::*;
pub use generic::{ColumnSort, SortDirection};
pub use transform::*;
