use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

use serde::Serialize;

use crate::error::TransformLocation;
use crate::Error;

/// User-facing form of an [Error], ready to be serialized into an API
/// response.
#[derive(Clone, Serialize)]
pub struct ErrorMessage {
    pub kind: MessageKind,
    /// Machine-readable identifier of the error
    pub code: Option<String>,
    /// Plain text of the error
    pub reason: String,
    /// A list of suggestions of how to fix the error
    pub hints: Vec<String>,
    /// Transform (and field) that caused the error
    pub transform: Option<TransformLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// The query definition is malformed; the user can fix it.
    InvalidTransform,
    /// The engine or a relation adapter misbehaved.
    Internal,
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let code = (self.code.as_ref())
            .map(|c| format!("[{c}] "))
            .unwrap_or_default();

        let location = (self.transform.as_ref())
            .map(|t| match (t.kind.is_empty(), &t.field) {
                (true, Some(field)) => format!(" (field `{field}`)"),
                (true, None) => String::new(),
                (false, Some(field)) => {
                    format!(" (transform #{} `{}`, field `{field}`)", t.index, t.kind)
                }
                (false, None) => format!(" (transform #{} `{}`)", t.index, t.kind),
            })
            .unwrap_or_default();

        writeln!(f, "{}Error{}: {}", code, location, &self.reason)?;
        for hint in &self.hints {
            writeln!(f, "↳ Hint: {}", hint)?;
        }
        Ok(())
    }
}

impl Debug for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self, f)
    }
}

impl From<Error> for ErrorMessage {
    fn from(e: Error) -> Self {
        log::debug!("{:#?}", e);
        ErrorMessage {
            kind: if e.is_internal() {
                MessageKind::Internal
            } else {
                MessageKind::InvalidTransform
            },
            code: e.code.map(str::to_string),
            reason: e.reason.to_string(),
            hints: e.hints,
            transform: e.transform,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessages {
    pub inner: Vec<ErrorMessage>,
}
impl StdError for ErrorMessages {}

impl From<Error> for ErrorMessages {
    fn from(e: Error) -> Self {
        ErrorMessages {
            inner: vec![ErrorMessage::from(e)],
        }
    }
}

impl Display for ErrorMessages {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for e in &self.inner {
            Display::fmt(&e, f)?;
        }
        Ok(())
    }
}

impl ErrorMessages {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"inner\":[],\"error\":\"{e}\"}}"))
    }
}
