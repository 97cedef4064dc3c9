//! Registry of column types: canonical names, alias spellings and per-type
//! capabilities.
//!
//! A catalog is built once at startup and then only read. It is passed
//! explicitly to whatever needs it (see [crate::semantic::Context]).

use std::collections::{BTreeMap, HashMap};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::hints::{Hint, HintSet};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TypeCategory {
    Boolean,
    Numeric,
    Textual,
    Temporal,
    Uri,
    Email,
    Json,
    Array,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TypeInfo {
    /// Canonical name
    pub name: String,
    pub category: TypeCategory,
    #[serde(default)]
    pub hints: HintSet,
    /// Alternative spellings that resolve to [TypeInfo::name]
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Canonical names of types values can be cast to
    #[serde(default)]
    pub casts: Vec<String>,
}

impl TypeInfo {
    pub fn new<const N: usize>(name: &str, category: TypeCategory, hints: [Hint; N]) -> Self {
        TypeInfo {
            name: name.to_string(),
            category,
            hints: HintSet::from(hints),
            aliases: Vec::new(),
            casts: Vec::new(),
        }
    }

    pub fn with_aliases<const N: usize>(mut self, aliases: [&str; N]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_casts(mut self, casts: &[&str]) -> Self {
        self.casts = casts.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeInfo>,
    aliases: HashMap<String, String>,
}

const NUMERIC: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "real",
    "double precision",
    "numeric",
    "money",
];
const INTEGRAL: &[&str] = &["smallint", "integer", "bigint"];
const TEXTUAL: &[&str] = &["text", "character varying", "character"];

impl TypeCatalog {
    /// An empty catalog, mostly useful for tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Types of a PostgreSQL database with the `uri` and `email` domains
    /// installed.
    pub fn builtin() -> Self {
        use TypeCategory as C;

        let to_text: Vec<&str> = TEXTUAL.to_vec();
        let numeric_casts: Vec<&str> = NUMERIC.iter().chain(TEXTUAL).copied().collect();
        let everything: Vec<&str> = NUMERIC
            .iter()
            .chain(TEXTUAL)
            .chain(&[
                "boolean",
                "date",
                "time without time zone",
                "time with time zone",
                "timestamp without time zone",
                "timestamp with time zone",
                "interval",
                "uri",
                "email",
                "json",
                "jsonb",
            ])
            .copied()
            .collect();
        let numeric = || [Hint::Comparable, Hint::Numeric];
        let temporal = || [Hint::Comparable, Hint::Temporal];
        let textual = || [Hint::Comparable, Hint::StringLike];

        let mut boolean_casts = vec!["integer", "smallint", "bigint"];
        boolean_casts.extend(&to_text);
        let mut date_casts = vec!["timestamp without time zone", "timestamp with time zone"];
        date_casts.extend(&to_text);
        let mut timestamp_casts = vec![
            "date",
            "timestamp without time zone",
            "timestamp with time zone",
        ];
        timestamp_casts.extend(&to_text);

        TypeCatalog::new().with_types([
            TypeInfo::new("boolean", C::Boolean, [Hint::Boolean])
                .with_aliases(["bool"])
                .with_casts(&boolean_casts),
            TypeInfo::new("smallint", C::Numeric, numeric())
                .with_aliases(["int2"])
                .with_casts(&numeric_casts),
            TypeInfo::new("integer", C::Numeric, numeric())
                .with_aliases(["int", "int4"])
                .with_casts(&numeric_casts),
            TypeInfo::new("bigint", C::Numeric, numeric())
                .with_aliases(["int8"])
                .with_casts(&numeric_casts),
            TypeInfo::new("real", C::Numeric, numeric())
                .with_aliases(["float4"])
                .with_casts(&numeric_casts),
            TypeInfo::new("double precision", C::Numeric, numeric())
                .with_aliases(["float8", "double", "float"])
                .with_casts(&numeric_casts),
            TypeInfo::new("numeric", C::Numeric, numeric())
                .with_aliases(["decimal"])
                .with_casts(&numeric_casts),
            TypeInfo::new("money", C::Numeric, numeric()).with_casts(&numeric_casts),
            TypeInfo::new("text", C::Textual, textual()).with_casts(&everything),
            TypeInfo::new("character varying", C::Textual, textual())
                .with_aliases(["varchar"])
                .with_casts(&everything),
            TypeInfo::new("character", C::Textual, textual())
                .with_aliases(["char", "bpchar"])
                .with_casts(&everything),
            TypeInfo::new("date", C::Temporal, temporal()).with_casts(&date_casts),
            TypeInfo::new("time without time zone", C::Temporal, temporal())
                .with_aliases(["time"])
                .with_casts(&to_text),
            TypeInfo::new("time with time zone", C::Temporal, temporal())
                .with_aliases(["timetz"])
                .with_casts(&to_text),
            TypeInfo::new("timestamp without time zone", C::Temporal, temporal())
                .with_aliases(["timestamp", "datetime"])
                .with_casts(&timestamp_casts),
            TypeInfo::new("timestamp with time zone", C::Temporal, temporal())
                .with_aliases(["timestamptz"])
                .with_casts(&timestamp_casts),
            TypeInfo::new("interval", C::Temporal, [Hint::Comparable]).with_casts(&to_text),
            TypeInfo::new(
                "uri",
                C::Uri,
                [Hint::Comparable, Hint::StringLike, Hint::Uri],
            )
            .with_casts(&to_text),
            TypeInfo::new(
                "email",
                C::Email,
                [Hint::Comparable, Hint::StringLike, Hint::Email],
            )
            .with_casts(&to_text),
            TypeInfo::new("json", C::Json, []).with_casts(&to_text),
            TypeInfo::new("jsonb", C::Json, []).with_casts(&to_text),
            TypeInfo::new("array", C::Array, [Hint::Array]).with_aliases(["_array"]),
        ])
    }

    /// Registers a type. A type registered under an existing name replaces
    /// it, aliases included.
    pub fn with_type(mut self, info: TypeInfo) -> Self {
        if let Some(replaced) = self.types.get(&info.name) {
            for alias in &replaced.aliases {
                if self.aliases.get(alias) == Some(&info.name) {
                    self.aliases.remove(alias);
                }
            }
        }
        for alias in &info.aliases {
            self.aliases.insert(alias.clone(), info.name.clone());
        }
        self.types.insert(info.name.clone(), info);
        self
    }

    pub fn with_types<I: IntoIterator<Item = TypeInfo>>(self, types: I) -> Self {
        types.into_iter().fold(self, |catalog, info| catalog.with_type(info))
    }

    /// Resolves an alias to its canonical name. Names that are not aliases
    /// are returned unchanged, whether they are known or not; use
    /// [TypeCatalog::contains] to check existence.
    pub fn canonicalize<'a>(&'a self, name: &'a str) -> &'a str {
        match self.aliases.get(name) {
            Some(canonical) => canonical.as_str(),
            None => name,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(self.canonicalize(name))
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(self.canonicalize(name))
    }

    /// Capability hints of a type; empty for unknown types.
    pub fn hints_for(&self, name: &str) -> HintSet {
        self.get(name).map(|t| t.hints.clone()).unwrap_or_default()
    }

    pub fn category(&self, name: &str) -> Option<TypeCategory> {
        self.get(name).map(|t| t.category)
    }

    pub fn aliases_of(&self, name: &str) -> &[String] {
        self.get(name).map(|t| t.aliases.as_slice()).unwrap_or(&[])
    }

    /// Whether values of the type are whole numbers.
    pub fn is_integral(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|t| INTEGRAL.contains(&t.name.as_str()))
    }

    pub fn can_cast(&self, from: &str, to: &str) -> bool {
        let (Some(from), Some(to)) = (self.get(from), self.get(to)) else {
            return false;
        };
        from.name == to.name || from.casts.iter().any(|c| c == &to.name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }
}
