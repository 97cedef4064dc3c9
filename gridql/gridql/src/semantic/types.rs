//! Type checking of expressions against a relation.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use itertools::Itertools;
use regex::Regex;

use super::Context;
use crate::catalog::TypeCategory;
use crate::error::{Error, Reason, WithErrorInfo};
use crate::functions::{FunctionId, ReturnType};
use crate::hints::{suggestions_for, Hint, HintSet};
use crate::ir::{Expr, Literal};
use crate::relation::Relation;
use crate::Result;

/// Type of a checked expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inferred {
    /// Canonical type name.
    Typed(String),
    /// A literal without a declared type. It takes the type of whatever it
    /// is compared with.
    Untyped(Literal),
}

impl Inferred {
    /// Type name, falling back to the literal's own type.
    pub fn type_name(&self, ctx: &Context) -> Option<String> {
        match self {
            Inferred::Typed(name) => Some(name.clone()),
            Inferred::Untyped(literal) => literal
                .default_type()
                .map(|t| ctx.catalog.canonicalize(t).to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Inferred::Typed(name) => format!("type `{name}`"),
            Inferred::Untyped(literal) => format!("literal {literal}"),
        }
    }
}

pub(crate) struct TypeChecker<'a, R: Relation> {
    pub relation: &'a R,
    pub ctx: &'a Context<'a>,
    /// Whether aggregate calls may appear outside of [Expr::Over].
    pub allow_aggregates: bool,
}

// Hints that constrain the shape of an argument rather than its type.
const STRUCTURAL: [Hint; 2] = [Hint::Column, Hint::Literal];

impl<'a, R: Relation> TypeChecker<'a, R> {
    pub fn new(relation: &'a R, ctx: &'a Context<'a>) -> Self {
        TypeChecker {
            relation,
            ctx,
            allow_aggregates: false,
        }
    }

    pub fn with_aggregates(mut self) -> Self {
        self.allow_aggregates = true;
        self
    }

    pub fn check(&self, expr: &Expr) -> Result<Inferred> {
        match expr {
            Expr::Column(name) => self.check_column(name),
            Expr::Literal { value, ty } => self.check_literal(value, ty.as_deref()),
            Expr::Cast { expr, to } => self.check_cast(expr, to),
            Expr::Over(inner) => {
                let is_aggregate = inner
                    .as_call()
                    .is_some_and(|(function, _)| function.is_aggregate());
                if !is_aggregate {
                    return Err(Error::new(Reason::Expected {
                        who: Some("over".to_string()),
                        expected: "an aggregate function call".to_string(),
                        found: describe_expr(inner),
                    }));
                }
                let checker = TypeChecker {
                    allow_aggregates: true,
                    ..*self
                };
                checker.check(inner)
            }
            Expr::Call { function, args } => self.check_call(*function, args),
        }
    }

    /// Checks an expression used as a predicate.
    pub fn check_predicate(&self, expr: &Expr) -> Result<()> {
        let found = self.check(expr)?;
        let is_boolean = match &found {
            Inferred::Typed(name) => {
                self.ctx.catalog.category(name) == Some(TypeCategory::Boolean)
            }
            Inferred::Untyped(literal) => matches!(literal, Literal::Boolean(_)),
        };
        if is_boolean {
            Ok(())
        } else {
            Err(Error::new(Reason::Expected {
                who: Some("filter".to_string()),
                expected: "a boolean expression".to_string(),
                found: found.describe(),
            }))
        }
    }

    fn check_column(&self, name: &str) -> Result<Inferred> {
        match self.relation.column(name) {
            Some(column) => Ok(Inferred::Typed(column.type_name.clone())),
            None => Err(column_not_found(self.relation, name)),
        }
    }

    fn check_literal(&self, value: &Literal, ty: Option<&str>) -> Result<Inferred> {
        let Some(ty) = ty else {
            if let Literal::Float(x) = value {
                if !x.is_finite() {
                    return Err(Error::new_simple(format!("{x} is not a valid number")));
                }
            }
            return Ok(Inferred::Untyped(value.clone()));
        };
        let ty = self.known_type(ty)?;
        if !literal_fits(value, &ty, self.ctx) {
            return Err(Error::new(Reason::Expected {
                who: None,
                expected: format!("a value of type `{ty}`"),
                found: value.to_string(),
            })
            .with_code("E0004"));
        }
        Ok(Inferred::Typed(ty))
    }

    fn check_cast(&self, expr: &Expr, to: &str) -> Result<Inferred> {
        let to = self.known_type(to)?;
        match self.check(expr)? {
            Inferred::Typed(from) => {
                if !self.ctx.catalog.can_cast(&from, &to) {
                    return Err(Error::new_simple(format!(
                        "cannot cast values of type `{from}` to `{to}`"
                    )));
                }
            }
            Inferred::Untyped(literal) => {
                if !literal_fits(&literal, &to, self.ctx) {
                    return Err(Error::new(Reason::Expected {
                        who: Some("cast".to_string()),
                        expected: format!("a value of type `{to}`"),
                        found: literal.to_string(),
                    })
                    .with_code("E0004"));
                }
            }
        }
        Ok(Inferred::Typed(to))
    }

    fn check_call(&self, function: FunctionId, args: &[Expr]) -> Result<Inferred> {
        let definition = function.definition();

        if function.is_aggregate() && !self.allow_aggregates {
            return Err(Error::new_simple(format!(
                "aggregate function `{function}` can only be used in summarize or over"
            )));
        }
        if !definition.arity.accepts(args.len()) {
            return Err(Error::new(Reason::Expected {
                who: Some(format!("function `{function}`")),
                expected: definition.arity.to_string(),
                found: args.len().to_string(),
            }));
        }

        // arguments of an aggregate are evaluated per row
        let arg_checker = TypeChecker {
            allow_aggregates: self.allow_aggregates && !function.is_aggregate(),
            ..*self
        };
        let inferred: Vec<Inferred> = args.iter().map(|a| arg_checker.check(a)).try_collect()?;

        // Type of the first typed argument with the same requirements as the
        // argument at `index`. Untyped literals are checked against it.
        let peer = |index: usize| -> Option<String> {
            let required = definition.hints.parameter_hints(index);
            inferred.iter().enumerate().find_map(|(i, found)| match found {
                Inferred::Typed(name) if definition.hints.parameter_hints(i) == required => {
                    Some(name.clone())
                }
                _ => None,
            })
        };

        for (index, (arg, found)) in args.iter().zip(&inferred).enumerate() {
            let required = definition.hints.parameter_hints(index);

            if required.contains(&Hint::Column) && !matches!(arg, Expr::Column(_)) {
                return Err(Error::new(Reason::Expected {
                    who: Some(format!("argument {index} of `{function}`")),
                    expected: "a column reference".to_string(),
                    found: describe_expr(arg),
                }));
            }
            let required: HintSet = (required.iter())
                .filter(|h| !STRUCTURAL.contains(h))
                .cloned()
                .collect();

            match found {
                Inferred::Typed(ty) => self.check_hints(function, index, ty, &required)?,
                Inferred::Untyped(Literal::Null) => {}
                Inferred::Untyped(literal) => {
                    match &peer(index) {
                        // partial strings are valid needles for string functions
                        Some(peer) if !required.contains(&Hint::StringLike) => {
                            if !literal_fits(literal, peer, self.ctx) {
                                return Err(Error::new(Reason::Expected {
                                    who: Some(format!("argument {index} of `{function}`")),
                                    expected: format!("a value of type `{peer}`"),
                                    found: literal.to_string(),
                                })
                                .with_code("E0004"));
                            }
                        }
                        _ => {
                            let ty = found.type_name(self.ctx).unwrap_or_default();
                            self.check_hints(function, index, &ty, &required)?;
                        }
                    }
                }
            }
        }

        Ok(match definition.returns {
            ReturnType::Boolean => Inferred::Typed("boolean".to_string()),
            ReturnType::Fixed(name) => {
                Inferred::Typed(self.ctx.catalog.canonicalize(name).to_string())
            }
            ReturnType::SameAs(index) => match &inferred[index] {
                Inferred::Untyped(literal) => match peer(index) {
                    Some(peer) => Inferred::Typed(peer),
                    None => Inferred::Untyped(literal.clone()),
                },
                typed => typed.clone(),
            },
        })
    }

    fn check_hints(
        &self,
        function: FunctionId,
        index: usize,
        ty: &str,
        required: &HintSet,
    ) -> Result<()> {
        let available = self.ctx.catalog.hints_for(ty);
        if required.is_subset(&available) {
            return Ok(());
        }

        let error = Error::new(Reason::Unsupported {
            what: format!("`{function}`"),
            by: format!("type `{ty}`"),
        })
        .with_code("E0003");
        if index != 0 || !function.is_filter() {
            return Err(error);
        }
        let suggestions = suggestions_for(self.ctx.catalog, ty);
        if suggestions.is_empty() {
            return Err(error.push_hint(format!("no filters are available for type `{ty}`")));
        }
        Err(error.push_hint(format!(
            "filters available for type `{ty}`: {}",
            suggestions.iter().map(|s| s.function.as_ref()).join(", ")
        )))
    }

    fn known_type(&self, name: &str) -> Result<String> {
        match self.ctx.catalog.get(name) {
            Some(info) => Ok(info.name.clone()),
            None => Err(Error::new_not_found(name, "type").with_code("E0001")),
        }
    }
}

pub(crate) fn column_not_found<R: Relation>(relation: &R, name: &str) -> Error {
    Error::new_not_found(name, "column")
        .push_hint(format!(
            "available columns: {}",
            relation.columns().iter().map(|c| &c.name).join(", ")
        ))
        .with_code("E0001")
}

fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Column(name) => format!("column `{name}`"),
        Expr::Literal { value, .. } => format!("literal {value}"),
        Expr::Call { function, .. } => format!("call to `{function}`"),
        Expr::Cast { to, .. } => format!("cast to `{to}`"),
        Expr::Over(_) => "over".to_string(),
    }
}

/// Whether a literal is a valid value of the given type.
pub(crate) fn literal_fits(value: &Literal, ty: &str, ctx: &Context) -> bool {
    let Some(info) = ctx.catalog.get(ty) else {
        return false;
    };

    match (info.category, value) {
        (_, Literal::Null) => true,

        (TypeCategory::Boolean, Literal::Boolean(_)) => true,
        (TypeCategory::Boolean, Literal::Text(s)) => {
            matches!(s.to_lowercase().as_str(), "true" | "false" | "t" | "f")
        }

        (TypeCategory::Numeric, Literal::Integer(_)) => true,
        (TypeCategory::Numeric, Literal::Float(x)) => x.is_finite(),
        (TypeCategory::Numeric, Literal::Text(s)) if ctx.catalog.is_integral(&info.name) => {
            s.trim().parse::<i64>().is_ok()
        }
        (TypeCategory::Numeric, Literal::Text(s)) => {
            s.trim().parse::<f64>().is_ok_and(f64::is_finite)
        }

        (TypeCategory::Textual, Literal::Text(_)) => true,

        (TypeCategory::Temporal, Literal::Text(s)) => temporal_fits(s, &info.name),

        (TypeCategory::Uri, Literal::Text(s)) => uri_regex().is_match(s),
        (TypeCategory::Email, Literal::Text(s)) => email_regex().is_match(s),

        (TypeCategory::Json | TypeCategory::Other, _) => true,

        _ => false,
    }
}

fn temporal_fits(text: &str, ty: &str) -> bool {
    let text = text.trim();
    let date = || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok();
    let naive_datetime = || {
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(text, f).is_ok())
    };
    let zoned_datetime = || {
        DateTime::parse_from_rfc3339(text).is_ok()
            || DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z").is_ok()
    };
    let time = |text: &str| {
        ["%H:%M:%S%.f", "%H:%M"]
            .iter()
            .any(|f| NaiveTime::parse_from_str(text, f).is_ok())
    };

    match ty {
        "date" => date(),
        "time without time zone" => time(text),
        "time with time zone" => {
            let without_zone = time_zone_regex().replace(text, "");
            time(&without_zone)
        }
        "timestamp without time zone" => naive_datetime() || date(),
        "timestamp with time zone" => zoned_datetime() || naive_datetime() || date(),
        // intervals and extension types are left to the database
        _ => true,
    }
}

fn uri_regex() -> &'static Regex {
    static URI: OnceLock<Regex> = OnceLock::new();
    URI.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*://)?[^\s/?#]+(?:[/?#]\S*)?$").unwrap()
    })
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn time_zone_regex() -> &'static Regex {
    static ZONE: OnceLock<Regex> = OnceLock::new();
    ZONE.get_or_init(|| Regex::new(r"(?:Z|[+-]\d{2}(?::?\d{2})?)$").unwrap())
}
