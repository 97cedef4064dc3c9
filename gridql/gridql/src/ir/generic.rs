use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ColumnSort<T> {
    #[serde(default)]
    pub direction: SortDirection,
    pub column: T,
}

#[derive(Debug, Clone, Copy, Serialize, Default, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl<T> ColumnSort<T> {
    pub fn asc(column: T) -> Self {
        ColumnSort {
            direction: SortDirection::Asc,
            column,
        }
    }

    pub fn desc(column: T) -> Self {
        ColumnSort {
            direction: SortDirection::Desc,
            column,
        }
    }
}
