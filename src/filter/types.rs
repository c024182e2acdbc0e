use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators a query condition can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
}

impl FilterOp {
    /// Maps the bracket suffix of a query parameter (`price[gte]`) to an operator
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

impl FilterWhereInfo {
    pub fn new(column: impl Into<String>, operator: FilterOp, data: impl Into<Value>) -> Self {
        Self { column: column.into(), operator, data: data.into() }
    }

    pub fn eq(column: impl Into<String>, data: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, data)
    }
}

/// Everything a store needs to run a find: conditions, ordering and a window
#[derive(Debug, Clone, Default)]
pub struct FilterData {
    pub where_clause: Vec<FilterWhereInfo>,
    pub order: Vec<FilterOrderInfo>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FilterData {
    pub fn matching(conditions: Vec<FilterWhereInfo>) -> Self {
        Self { where_clause: conditions, ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

impl FilterOrderInfo {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), sort: SortDirection::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), sort: SortDirection::Desc }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
