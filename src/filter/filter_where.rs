use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo};

/// Compiles conditions into a JSONB predicate and evaluates them in memory.
///
/// Both paths share one rule set: equality compares JSON values exactly, and
/// range operators only match when the stored value has the same JSON type as
/// the operand.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self { param_values: vec![], param_index: starting_param_index }
    }

    pub fn generate(conditions: &[FilterWhereInfo], starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(conditions)
    }

    pub fn validate(conditions: &[FilterWhereInfo]) -> Result<(), FilterError> {
        for condition in conditions {
            validate_column(&condition.column)?;
        }
        Ok(())
    }

    fn build(&mut self, conditions: &[FilterWhereInfo]) -> Result<(String, Vec<Value>), FilterError> {
        let mut sql_conditions = Vec::with_capacity(conditions.len());
        for condition in conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, self.param_values.clone()))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        validate_column(&condition.column)?;
        let field = json_path(&condition.column);

        match condition.operator {
            FilterOp::Eq if condition.data.is_null() => {
                Ok(format!("({field} IS NULL OR {field} = 'null'::jsonb)"))
            }
            FilterOp::Eq => Ok(format!("{} = {}", field, self.param(condition.data.clone()))),
            op => {
                let p = self.param(condition.data.clone());
                Ok(format!("(jsonb_typeof({field}) = jsonb_typeof({p}) AND {field} {} {p})", op.to_sql()))
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}::jsonb", self.param_index)
    }

    /// True when `doc` satisfies every condition
    pub fn matches(doc: &Map<String, Value>, conditions: &[FilterWhereInfo]) -> bool {
        conditions.iter().all(|condition| Self::matches_one(doc, condition))
    }

    fn matches_one(doc: &Map<String, Value>, condition: &FilterWhereInfo) -> bool {
        let stored = doc.get(&condition.column);
        match condition.operator {
            FilterOp::Eq => match (stored, &condition.data) {
                // jsonb equality is numeric: 4 = 4.0
                (Some(value @ Value::Number(_)), Value::Number(_)) => {
                    compare_same_type(value, &condition.data) == Some(Ordering::Equal)
                }
                (Some(value), data) => value == data,
                (None, data) => data.is_null(),
            },
            op => {
                let Some(ordering) = stored.and_then(|value| compare_same_type(value, &condition.data)) else {
                    return false;
                };
                match op {
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Gte => ordering != Ordering::Less,
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Lte => ordering != Ordering::Greater,
                    FilterOp::Eq => ordering == Ordering::Equal,
                }
            }
        }
    }
}

/// `doc -> 'field'` for an already validated field name
pub(crate) fn json_path(column: &str) -> String {
    format!("doc -> '{}'", column)
}

/// Field names end up inside SQL literals, so only identifiers are accepted
pub(crate) fn validate_column(column: &str) -> Result<(), FilterError> {
    let mut chars = column.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(column.to_string()))
    }
}

/// Ordering between two JSON values of the same type; `None` across types
pub(crate) fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
