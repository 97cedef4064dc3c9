//! Translation of bound expressions into SQL source.

use std::cmp::Ordering;

use itertools::Itertools;

use super::dialect::DialectHandler;
use crate::error::Error;
use crate::functions::FunctionId;
use crate::ir::Literal;
use crate::relation::SqlExpr;
use crate::Result;

/// A piece of SQL with the binding strength of its top-level operator.
#[derive(Debug, Clone)]
pub(crate) struct SourceExpr {
    pub text: String,
    pub binding_strength: i32,
}

impl SourceExpr {
    /// Function calls, literals, identifiers and other atoms.
    pub fn call(text: String) -> Self {
        SourceExpr {
            text,
            binding_strength: 20,
        }
    }
}

pub(super) struct ExprContext<'a> {
    pub dialect: &'a dyn DialectHandler,
    /// Prefix columns with their source, needed once a SELECT has joins.
    pub qualify: bool,
}

/// Associativity of an expression's operator.
/// https://en.wikipedia.org/wiki/Operator_associativity
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Associativity {
    Left,
    /// `Both` means mathematically associative, like `+` or `*`
    Both,
    /// Comparisons can't be chained at all
    Neither,
}

impl Associativity {
    /// Returns true iff `a + b + c = (a + b) + c`
    fn left_associative(&self) -> bool {
        matches!(self, Associativity::Left | Associativity::Both)
    }

    /// Returns true iff `a + b + c = a + (b + c)`
    fn right_associative(&self) -> bool {
        matches!(self, Associativity::Both)
    }
}

// https://www.postgresql.org/docs/14/sql-syntax-lexical.html#SQL-PRECEDENCE
const MULTIPLICATIVE: i32 = 11;
const ADDITIVE: i32 = 10;
const CONCAT: i32 = 9;
const LIKE: i32 = 7;
const COMPARISON: i32 = 6;
const IS_NULL: i32 = 5;
const NOT: i32 = 4;
const AND: i32 = 3;
const OR: i32 = 2;

pub(super) fn translate_expr(expr: &SqlExpr, ctx: &ExprContext) -> Result<SourceExpr> {
    Ok(match expr {
        SqlExpr::Column { source, name } => {
            let text = if ctx.qualify {
                format!("{}.{}", quote_ident(source, ctx), quote_ident(name, ctx))
            } else {
                quote_ident(name, ctx)
            };
            SourceExpr::call(text)
        }
        SqlExpr::Literal { value, ty } => translate_literal(value, ty.as_deref(), ctx)?,
        SqlExpr::Cast { expr, to } => {
            let inner = translate_expr(expr, ctx)?;
            match ctx.dialect.cast_type(to)? {
                Some(ty) => SourceExpr::call(format!("CAST({} AS {ty})", inner.text)),
                None => inner,
            }
        }
        SqlExpr::Over(expr) => {
            let inner = translate_expr(expr, ctx)?;
            SourceExpr::call(format!("{} OVER ()", inner.text))
        }
        SqlExpr::Call { function, args } => translate_call(*function, args, ctx)?,
    })
}

fn translate_literal(value: &Literal, ty: Option<&str>, ctx: &ExprContext) -> Result<SourceExpr> {
    let text = match value {
        Literal::Null => "NULL".to_string(),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::Integer(i) => i.to_string(),
        Literal::Float(x) if x.is_finite() => format!("{x:?}"),
        Literal::Float(x) => {
            return Err(Error::new_simple(format!(
                "{x} cannot be represented in SQL"
            )))
        }
        Literal::Text(s) => quote_string(s, ctx),
    };
    let literal = SourceExpr {
        // negative numbers carry a unary minus
        binding_strength: if text.starts_with('-') { 13 } else { 20 },
        text,
    };

    let declared = match ty {
        Some(ty) if Some(ty) != value.default_type() && !matches!(value, Literal::Null) => ty,
        _ => return Ok(literal),
    };
    Ok(match ctx.dialect.cast_type(declared)? {
        Some(ty) => SourceExpr::call(format!("CAST({} AS {ty})", literal.text)),
        None => literal,
    })
}

fn translate_call(function: FunctionId, args: &[SqlExpr], ctx: &ExprContext) -> Result<SourceExpr> {
    use FunctionId::*;

    let arg = |index: usize| -> Result<SourceExpr> {
        translate_expr(nth_arg(function, args, index)?, ctx)
    };
    let call = |name: &str| -> Result<SourceExpr> {
        let args: Vec<String> = args
            .iter()
            .map(|a| translate_expr(a, ctx).map(|s| s.text))
            .try_collect()?;
        Ok(SourceExpr::call(format!("{name}({})", args.join(", "))))
    };
    let raw = |index: usize| nth_arg(function, args, index);
    let nested = |function: FunctionId, args: Vec<SqlExpr>| {
        translate_expr(&SqlExpr::Call { function, args }, ctx)
    };

    Ok(match function {
        Empty => postfix(arg(0)?, "IS NULL", IS_NULL),
        NotEmpty => postfix(arg(0)?, "IS NOT NULL", IS_NULL),
        ArrayNotEmpty => {
            let length = ctx.dialect.array_length(&arg(0)?.text)?;
            binary(length, ">", SourceExpr::call("0".to_string()), COMPARISON, Associativity::Neither)
        }

        Equal | ColumnEqual => comparison(arg(0)?, "=", arg(1)?),
        NotEqual => comparison(arg(0)?, "<>", arg(1)?),
        Lesser | ColumnLesser => comparison(arg(0)?, "<", arg(1)?),
        LesserOrEqual => comparison(arg(0)?, "<=", arg(1)?),
        Greater | ColumnGreater => comparison(arg(0)?, ">", arg(1)?),
        GreaterOrEqual => comparison(arg(0)?, ">=", arg(1)?),
        In => {
            let needle = arg(0)?;
            let options: Vec<String> = (1..args.len())
                .map(|i| arg(i).map(|s| s.text))
                .try_collect()?;
            SourceExpr {
                text: format!(
                    "{} IN ({})",
                    parenthesize(needle, LIKE, true, Associativity::Neither),
                    options.join(", ")
                ),
                binding_strength: LIKE,
            }
        }
        Between => {
            let [value, low, high] = [arg(0)?, arg(1)?, arg(2)?]
                .map(|s| parenthesize(s, LIKE, true, Associativity::Neither));
            SourceExpr {
                text: format!("{value} BETWEEN {low} AND {high}"),
                binding_strength: LIKE,
            }
        }

        Contains | StartsWith | EndsWith => {
            let pattern = like_pattern(function, raw(1)?, ctx)?;
            like(arg(0)?, "LIKE", pattern, ctx)
        }
        ContainsCaseInsensitive => {
            let pattern = like_pattern(Contains, raw(1)?, ctx)?;
            if ctx.dialect.supports_ilike() {
                like(arg(0)?, "ILIKE", pattern, ctx)
            } else {
                let lower = |s: SourceExpr| SourceExpr::call(format!("LOWER({})", s.text));
                let pattern = LikePattern {
                    expr: lower(pattern.expr),
                    ..pattern
                };
                like(lower(arg(0)?), "LIKE", pattern, ctx)
            }
        }

        ArrayContains => ctx.dialect.array_contains(&arg(0)?.text, &arg(1)?.text)?,
        ArrayLength => ctx.dialect.array_length(&arg(0)?.text)?,

        UriAuthority => ctx.dialect.uri_authority(&arg(0)?.text)?,
        UriScheme => ctx.dialect.uri_scheme(&arg(0)?.text)?,
        EmailDomain => ctx.dialect.email_domain(&arg(0)?.text)?,
        UriAuthorityContains | UriSchemeEquals | EmailDomainContains | EmailDomainEquals => {
            let (extract, compare) = match function {
                UriAuthorityContains => (UriAuthority, Contains),
                UriSchemeEquals => (UriScheme, Equal),
                EmailDomainContains => (EmailDomain, Contains),
                _ => (EmailDomain, Equal),
            };
            let extracted = SqlExpr::Call {
                function: extract,
                args: vec![raw(0)?.clone()],
            };
            nested(compare, vec![extracted, raw(1)?.clone()])?
        }

        And | Or => {
            let (keyword, strength) = if function == And {
                (" AND ", AND)
            } else {
                (" OR ", OR)
            };
            let parts: Vec<String> = args
                .iter()
                .map(|a| {
                    let part = translate_expr(a, ctx)?;
                    Ok(parenthesize(part, strength, true, Associativity::Both))
                })
                .collect::<Result<_>>()?;
            SourceExpr {
                text: parts.join(keyword),
                binding_strength: if parts.len() > 1 { strength } else { 20 },
            }
        }
        Not => {
            let inner = parenthesize(arg(0)?, NOT, false, Associativity::Both);
            SourceExpr {
                text: format!("NOT {inner}"),
                binding_strength: NOT,
            }
        }
        If => SourceExpr::call(format!(
            "CASE WHEN {} THEN {} END",
            arg(0)?.text,
            arg(1)?.text
        )),

        Add => binary(arg(0)?, "+", arg(1)?, ADDITIVE, Associativity::Both),
        Subtract => binary(arg(0)?, "-", arg(1)?, ADDITIVE, Associativity::Left),
        Multiply => binary(arg(0)?, "*", arg(1)?, MULTIPLICATIVE, Associativity::Both),
        Divide => binary(arg(0)?, "/", arg(1)?, MULTIPLICATIVE, Associativity::Left),
        Floor => call("FLOOR")?,
        Log10 => call("LOG10")?,
        Power => call("POWER")?,
        Lower => call("LOWER")?,
        ExtractYear => ctx.dialect.extract("YEAR", &arg(0)?.text)?,
        ExtractMonth => ctx.dialect.extract("MONTH", &arg(0)?.text)?,

        Count => call("COUNT")?,
        CountDistinct => SourceExpr::call(format!("COUNT(DISTINCT {})", arg(0)?.text)),
        Sum => call("SUM")?,
        Min => call("MIN")?,
        Max => call("MAX")?,
        Mean => call("AVG")?,
    })
}

fn nth_arg(function: FunctionId, args: &[SqlExpr], index: usize) -> Result<&SqlExpr> {
    args.get(index)
        .ok_or_else(|| Error::new_assert(format!("`{function}` called without argument {index}")))
}

/// LIKE pattern matching a needle as a plain substring, prefix or suffix.
struct LikePattern {
    expr: SourceExpr,
    /// The pattern contains backslash escapes and needs an ESCAPE clause.
    escaped: bool,
}

/// Builds the pattern for `function`. Wildcards in the needle are escaped.
/// Text literals are folded into a single literal; other needles are
/// escaped with REPLACE at query time.
fn like_pattern(function: FunctionId, needle: &SqlExpr, ctx: &ExprContext) -> Result<LikePattern> {
    let (prefix, suffix) = match function {
        FunctionId::StartsWith => ("", "%"),
        FunctionId::EndsWith => ("%", ""),
        _ => ("%", "%"),
    };

    if let SqlExpr::Literal {
        value: Literal::Text(text),
        ..
    } = needle
    {
        let escaped = escape_like(text);
        return Ok(LikePattern {
            escaped: escaped.len() != text.len(),
            expr: SourceExpr::call(quote_string(&format!("{prefix}{escaped}{suffix}"), ctx)),
        });
    }

    let needle = translate_expr(needle, ctx)?.text;
    let needle = LIKE_WILDCARDS.iter().fold(needle, |inner, (from, to)| {
        format!(
            "REPLACE({inner}, {}, {})",
            quote_string(from, ctx),
            quote_string(to, ctx)
        )
    });
    let parts = [prefix, suffix]
        .map(|p| (!p.is_empty()).then(|| quote_string(p, ctx)));
    let parts = parts[0].iter().chain([&needle]).chain(parts[1].iter()).join(
        if ctx.dialect.has_concat_function() {
            ", "
        } else {
            " || "
        },
    );

    let expr = if ctx.dialect.has_concat_function() {
        SourceExpr::call(format!("CONCAT({parts})"))
    } else {
        SourceExpr {
            text: parts,
            binding_strength: CONCAT,
        }
    };
    Ok(LikePattern {
        expr,
        escaped: true,
    })
}

/// Characters with a meaning in LIKE patterns, with their escaped form.
/// The escape character itself goes first.
const LIKE_WILDCARDS: [(&str, &str); 3] = [("\\", "\\\\"), ("%", "\\%"), ("_", "\\_")];

fn escape_like(text: &str) -> String {
    LIKE_WILDCARDS
        .iter()
        .fold(text.to_string(), |text, (from, to)| text.replace(from, to))
}

fn like(subject: SourceExpr, op: &str, pattern: LikePattern, ctx: &ExprContext) -> SourceExpr {
    let matched = binary(subject, op, pattern.expr, LIKE, Associativity::Neither);
    if !pattern.escaped {
        return matched;
    }
    SourceExpr {
        text: format!("{} ESCAPE {}", matched.text, quote_string("\\", ctx)),
        binding_strength: LIKE,
    }
}

fn comparison(left: SourceExpr, op: &str, right: SourceExpr) -> SourceExpr {
    binary(left, op, right, COMPARISON, Associativity::Neither)
}

fn binary(
    left: SourceExpr,
    op: &str,
    right: SourceExpr,
    strength: i32,
    associativity: Associativity,
) -> SourceExpr {
    let left = parenthesize(left, strength, true, associativity);
    let right = parenthesize(right, strength, false, associativity);
    SourceExpr {
        text: format!("{left} {op} {right}"),
        binding_strength: strength,
    }
}

fn postfix(operand: SourceExpr, op: &str, strength: i32) -> SourceExpr {
    let operand = parenthesize(operand, strength, true, Associativity::Neither);
    SourceExpr {
        text: format!("{operand} {op}"),
        binding_strength: strength,
    }
}

fn parenthesize(
    expr: SourceExpr,
    parent_strength: i32,
    is_left: bool,
    parent_associativity: Associativity,
) -> String {
    if needs_parentheses(&expr, is_left, parent_strength, parent_associativity) {
        format!("({})", expr.text)
    } else {
        expr.text
    }
}

// Rules:
// 1. a child that binds stronger than its parent needs no parentheses,
// 2. a weaker one always does,
// 3. one of equal strength only when the operator is not associative on
//    that side.
fn needs_parentheses(
    expr: &SourceExpr,
    is_left: bool,
    parent_strength: i32,
    parent_associativity: Associativity,
) -> bool {
    let rule_3a = matches!(parent_associativity, Associativity::Both);
    let rule_3b_left = is_left && parent_associativity.left_associative();
    let rule_3b_right = !is_left && parent_associativity.right_associative();

    match expr.binding_strength.cmp(&parent_strength) {
        // Rule 1
        Ordering::Greater => false,
        // Rule 2
        Ordering::Less => true,
        // Rule 3
        Ordering::Equal => !(rule_3a || rule_3b_left || rule_3b_right),
    }
}

pub(super) fn quote_ident(ident: &str, ctx: &ExprContext) -> String {
    let quote = ctx.dialect.ident_quote();
    let escaped = ident.replace(quote, &format!("{quote}{quote}"));
    format!("{quote}{escaped}{quote}")
}

fn quote_string(text: &str, ctx: &ExprContext) -> String {
    let mut escaped = text.replace('\'', "''");
    if ctx.dialect.escapes_backslash() {
        escaped = escaped.replace('\\', "\\\\");
    }
    format!("'{escaped}'")
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::sql::Dialect;

    fn column(name: &str) -> SqlExpr {
        SqlExpr::Column {
            source: "t".to_string(),
            name: name.to_string(),
        }
    }

    fn lit<L: Into<Literal>>(value: L) -> SqlExpr {
        SqlExpr::Literal {
            value: value.into(),
            ty: None,
        }
    }

    fn call(function: FunctionId, args: Vec<SqlExpr>) -> SqlExpr {
        SqlExpr::Call { function, args }
    }

    fn render(expr: &SqlExpr, dialect: Dialect) -> String {
        let handler = dialect.handler();
        let ctx = ExprContext {
            dialect: handler.as_ref(),
            qualify: false,
        };
        translate_expr(expr, &ctx).unwrap().text
    }

    #[test]
    fn parentheses_follow_binding_strength() {
        let a_minus_b = call(FunctionId::Subtract, vec![column("a"), column("b")]);
        let expr = call(
            FunctionId::Subtract,
            vec![column("c"), a_minus_b.clone()],
        );
        assert_snapshot!(render(&expr, Dialect::Generic), @r#""c" - ("a" - "b")"#);

        let expr = call(FunctionId::Subtract, vec![a_minus_b, column("c")]);
        assert_snapshot!(render(&expr, Dialect::Generic), @r#""a" - "b" - "c""#);

        let either = call(
            FunctionId::Or,
            vec![
                call(FunctionId::Empty, vec![column("a")]),
                call(FunctionId::Equal, vec![column("b"), lit(-1)]),
            ],
        );
        let expr = call(
            FunctionId::And,
            vec![either, call(FunctionId::Not, vec![column("c")])],
        );
        assert_snapshot!(render(&expr, Dialect::Generic), @r#"("a" IS NULL OR "b" = -1) AND NOT "c""#);
    }

    #[test]
    fn string_matching() {
        let contains = call(
            FunctionId::ContainsCaseInsensitive,
            vec![column("name"), lit("O'Neil")],
        );
        assert_snapshot!(render(&contains, Dialect::Postgres), @r#""name" ILIKE '%O''Neil%'"#);
        assert_snapshot!(render(&contains, Dialect::SQLite), @r#"LOWER("name") LIKE LOWER('%O''Neil%')"#);

        let starts = call(FunctionId::StartsWith, vec![column("a"), column("b")]);
        assert_snapshot!(render(&starts, Dialect::SQLite), @r#""a" LIKE REPLACE(REPLACE(REPLACE("b", '\', '\\'), '%', '\%'), '_', '\_') || '%' ESCAPE '\'"#);
        assert_snapshot!(render(&starts, Dialect::MySql), @r"`a` LIKE CONCAT(REPLACE(REPLACE(REPLACE(`b`, '\\', '\\\\'), '%', '\\%'), '_', '\\_'), '%') ESCAPE '\\'");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        let contains = call(FunctionId::Contains, vec![column("name"), lit("50%_off")]);
        assert_snapshot!(render(&contains, Dialect::Postgres), @r#""name" LIKE '%50\%\_off%' ESCAPE '\'"#);
        assert_snapshot!(render(&contains, Dialect::MySql), @r"`name` LIKE '%50\\%\\_off%' ESCAPE '\\'");

        let ends = call(FunctionId::EndsWith, vec![column("path"), lit(r"C:\")]);
        assert_snapshot!(render(&ends, Dialect::SQLite), @r#""path" LIKE '%C:\\' ESCAPE '\'"#);
    }

    #[test]
    fn literals() {
        let expr = call(
            FunctionId::In,
            vec![column("x"), lit(1.0), lit(true), lit(Literal::Null)],
        );
        assert_snapshot!(render(&expr, Dialect::Generic), @r#""x" IN (1.0, TRUE, NULL)"#);

        let typed = SqlExpr::Literal {
            value: Literal::Text("2024-01-01".to_string()),
            ty: Some("date".to_string()),
        };
        assert_snapshot!(render(&typed, Dialect::Postgres), @"CAST('2024-01-01' AS DATE)");
        assert_snapshot!(render(&typed, Dialect::SQLite), @"'2024-01-01'");
    }

    #[test]
    fn dialect_specific_functions() {
        let domain = call(
            FunctionId::EmailDomainEquals,
            vec![column("email"), lit("example.com")],
        );
        assert_snapshot!(render(&domain, Dialect::Postgres), @r#"SPLIT_PART("email", '@', 2) = 'example.com'"#);
        assert_snapshot!(render(&domain, Dialect::SQLite), @r#"SUBSTR("email", INSTR("email", '@') + 1) = 'example.com'"#);

        let year = call(FunctionId::ExtractYear, vec![column("born")]);
        assert_snapshot!(render(&year, Dialect::SQLite), @r#"CAST(STRFTIME('%Y', "born") AS INTEGER)"#);

        let handler = Dialect::SQLite.handler();
        let ctx = ExprContext {
            dialect: handler.as_ref(),
            qualify: false,
        };
        let length = call(FunctionId::ArrayLength, vec![column("tags")]);
        let error = translate_expr(&length, &ctx).unwrap_err();
        assert_snapshot!(error.to_string(), @"array length is not supported by dialect `sqlite`");
    }
}
