use serde::Serialize;

/// A gridql error. Used internally, exposed to callers as [crate::ErrorMessage].
#[derive(Debug, Clone)]
pub struct Error {
    pub reason: Reason,
    pub hints: Vec<String>,
    /// Machine readable identifier error code eg, "E0001"
    pub code: Option<&'static str>,
    /// The transform that was being validated or applied when this error
    /// was raised.
    pub transform: Option<TransformLocation>,
}

/// Position of the offending transform within a query definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformLocation {
    /// Index into the ordered transform list.
    pub index: usize,
    /// Transform kind, eg. `filter`.
    pub kind: String,
    /// Field of the transform spec that is at fault, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Reason {
    Simple(String),
    Expected {
        who: Option<String>,
        expected: String,
        found: String,
    },
    NotFound {
        name: String,
        namespace: String,
    },
    Duplicate {
        name: String,
        namespace: String,
    },
    Unsupported {
        what: String,
        by: String,
    },
    /// A relation produced by a transform does not satisfy the relation
    /// interface. This is a defect in an adapter, not in user input.
    RelationContract {
        details: String,
    },
    Bug {
        details: Option<String>,
    },
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            reason,
            hints: Vec::new(),
            code: None,
            transform: None,
        }
    }

    pub fn new_simple<S: ToString>(reason: S) -> Self {
        Error::new(Reason::Simple(reason.to_string()))
    }

    pub fn new_not_found<N: ToString, S: ToString>(name: N, namespace: S) -> Self {
        Error::new(Reason::NotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    pub fn new_contract<S: ToString>(details: S) -> Self {
        Error::new(Reason::RelationContract {
            details: details.to_string(),
        })
    }

    /// Used for things that you *think* should never happen, but are not sure.
    pub fn new_assert<S: ToString>(details: S) -> Self {
        Error::new(Reason::Bug {
            details: Some(details.to_string()),
        })
    }

    /// Whether this error points to a defect in the engine or in a relation
    /// adapter, rather than to a malformed query definition.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.reason,
            Reason::RelationContract { .. } | Reason::Bug { .. }
        )
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Simple(text) => f.write_str(text),
            Reason::Expected {
                who,
                expected,
                found,
            } => {
                if let Some(who) = who {
                    write!(f, "{who} ")?;
                }
                write!(f, "expected {expected}, but found {found}")
            }
            Reason::NotFound { name, namespace } => write!(f, "{namespace} `{name}` not found"),
            Reason::Duplicate { name, namespace } => {
                write!(f, "{namespace} `{name}` is defined more than once")
            }
            Reason::Unsupported { what, by } => write!(f, "{what} is not supported by {by}"),
            Reason::RelationContract { details } => {
                write!(f, "relation contract violated; {details}")
            }
            Reason::Bug { details } => {
                write!(f, "internal engine error")?;
                if let Some(details) = details {
                    write!(f, "; {details}")?;
                }
                Ok(())
            }
        }
    }
}

// Needed for anyhow
impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.transform {
            // the field may be known before the transform is
            match (location.kind.is_empty(), &location.field) {
                (true, Some(field)) => write!(f, "field `{field}`: ")?,
                (true, None) => {}
                (false, Some(field)) => write!(
                    f,
                    "transform #{} ({}), field `{field}`: ",
                    location.index, location.kind
                )?,
                (false, None) => write!(f, "transform #{} ({}): ", location.index, location.kind)?,
            }
        }
        write!(f, "{}", self.reason)
    }
}

pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;

    fn with_code(self, code: &'static str) -> Self;

    /// Attaches the transform location, keeping a field that was already set.
    fn with_transform<S: ToString>(self, index: usize, kind: S) -> Self;

    /// Names the field of the transform spec that caused the error.
    fn with_field<S: ToString>(self, field: S) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    fn with_transform<S: ToString>(mut self, index: usize, kind: S) -> Self {
        match &mut self.transform {
            Some(location) => {
                location.index = index;
                location.kind = kind.to_string();
            }
            None => {
                self.transform = Some(TransformLocation {
                    index,
                    kind: kind.to_string(),
                    field: None,
                });
            }
        }
        self
    }

    fn with_field<S: ToString>(mut self, field: S) -> Self {
        let location = self.transform.get_or_insert_with(|| TransformLocation {
            index: 0,
            kind: String::new(),
            field: None,
        });
        if location.field.is_none() {
            location.field = Some(field.to_string());
        }
        self
    }
}

impl<T, E: WithErrorInfo> WithErrorInfo for Result<T, E> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_code(self, code: &'static str) -> Self {
        self.map_err(|e| e.with_code(code))
    }

    fn with_transform<S: ToString>(self, index: usize, kind: S) -> Self {
        self.map_err(|e| e.with_transform(index, kind))
    }

    fn with_field<S: ToString>(self, field: S) -> Self {
        self.map_err(|e| e.with_field(field))
    }
}
