use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::functions::FunctionId;

/// Expression over the columns of a relation.
///
/// Serialized externally tagged, eg. `{"column": "name"}` or
/// `{"call": {"function": "equal", "args": [...]}}`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema, EnumAsInner)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Reference to a column of the relation, by name.
    Column(String),

    Literal {
        value: Literal,
        /// Declared type of the value. When missing, the type is inferred
        /// from the value or from the column it is compared with.
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        ty: Option<String>,
    },

    Call {
        function: FunctionId,
        #[serde(default)]
        args: Vec<Expr>,
    },

    Cast {
        expr: Box<Expr>,
        to: String,
    },

    /// An aggregate call evaluated over the whole relation, keeping every row.
    Over(Box<Expr>),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema, EnumAsInner)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    /// Type of the value when no type was declared.
    pub fn default_type(&self) -> Option<&'static str> {
        Some(match self {
            Literal::Null => return None,
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "double precision",
            Literal::Text(_) => "text",
        })
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl Expr {
    pub fn column<S: ToString>(name: S) -> Self {
        Expr::Column(name.to_string())
    }

    pub fn literal<L: Into<Literal>>(value: L) -> Self {
        Expr::Literal {
            value: value.into(),
            ty: None,
        }
    }

    pub fn typed_literal<L: Into<Literal>, S: ToString>(value: L, ty: S) -> Self {
        Expr::Literal {
            value: value.into(),
            ty: Some(ty.to_string()),
        }
    }

    pub fn call(function: FunctionId, args: Vec<Expr>) -> Self {
        Expr::Call { function, args }
    }

    pub fn cast<S: ToString>(self, to: S) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            to: to.to_string(),
        }
    }

    pub fn over(self) -> Self {
        Expr::Over(Box::new(self))
    }

    /// Whether an aggregate function is called anywhere within this
    /// expression, outside of [Expr::Over].
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Call { function, args } => {
                function.is_aggregate() || args.iter().any(Expr::contains_aggregate)
            }
            Expr::Cast { expr, .. } => expr.contains_aggregate(),
            Expr::Column(_) | Expr::Literal { .. } | Expr::Over(_) => false,
        }
    }
}
