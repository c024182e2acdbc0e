use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_where::{compare_same_type, json_path, validate_column};
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `"-createdAt,name"` style sort lists; `-` marks descending
    pub fn parse(spec: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let info = match trimmed.strip_prefix('-') {
                Some(column) => FilterOrderInfo::desc(column),
                None => FilterOrderInfo::asc(trimmed.trim_start_matches('+')),
            };
            validate_column(&info.column)?;
            out.push(info);
        }
        Ok(out)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(infos.len() + 1);
        for info in infos {
            validate_column(&info.column)?;
            parts.push(format!("{} {}", json_path(&info.column), info.sort.to_sql()));
        }
        // insertion order breaks ties, matching the in-memory stable sort
        parts.push("seq ASC".to_string());
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// Compares two documents under the given sort keys
    pub fn compare(a: &Map<String, Value>, b: &Map<String, Value>, infos: &[FilterOrderInfo]) -> Ordering {
        for info in infos {
            let ordering = compare_field(a.get(&info.column), b.get(&info.column));
            let ordering = match info.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Missing fields sort before any value; values of different JSON types order
/// by type the way JSONB does (null < string < number < boolean < array < object).
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or_else(|| type_rank(x).cmp(&type_rank(y))),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
