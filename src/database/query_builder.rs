use std::collections::HashMap;
use std::num::IntErrorKind;

use serde_json::{Number, Value};

use crate::database::store::{Document, DocumentStore, StoreError};
use crate::filter::filter_where::validate_column;
use crate::filter::{FilterData, FilterError, FilterOp, FilterOrder, FilterOrderInfo, FilterWhereInfo};

/// Hard ceiling on page size, also the default
pub const MAX_LIMIT: usize = 10;
pub const DEFAULT_SORT: &str = "-createdAt";
/// Query parameters that steer the query rather than filter documents
pub const RESERVED_PARAMS: &[&str] = &["page", "sort", "limit", "fields"];

pub type QueryParams = HashMap<String, String>;

/// Which fields of each result document are returned
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(vec!["__v".to_string()])
    }
}

impl Projection {
    pub fn keeps(&self, field: &str) -> bool {
        match self {
            Projection::Include(fields) => field == "_id" || fields.iter().any(|f| f == field),
            Projection::Exclude(fields) => !fields.iter().any(|f| f == field),
        }
    }

    pub fn apply(&self, mut doc: Document) -> Document {
        doc.retain(|key, _| self.keeps(key));
        doc
    }
}

/// Turns request query parameters into an un-executed find.
///
/// ```text
/// ?price[gte]=2&sort=-averageRating,name&fields=name,slug&page=2&limit=5
/// ```
pub struct QueryBuilder {
    collection: String,
    scope: Vec<FilterWhereInfo>,
    params: QueryParams,
}

impl QueryBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), scope: vec![], params: QueryParams::new() }
    }

    /// Restricts results to documents whose `field` equals `value`, on top of any client filters
    pub fn scope(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scope.push(FilterWhereInfo::eq(field, value));
        self
    }

    pub fn params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> Result<PreparedQuery, FilterError> {
        let mut where_clause = self.scope;
        where_clause.extend(parse_filters(&self.params)?);

        let order = parse_sort(self.params.get("sort").map(String::as_str))?;
        let projection = parse_fields(self.params.get("fields").map(String::as_str))?;
        let (limit, skip) = parse_pagination(
            self.params.get("page").map(String::as_str),
            self.params.get("limit").map(String::as_str),
        );

        Ok(PreparedQuery {
            collection: self.collection,
            filter: FilterData { where_clause, order, limit: Some(limit), offset: Some(skip) },
            projection,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub collection: String,
    pub filter: FilterData,
    pub projection: Projection,
}

impl PreparedQuery {
    pub async fn execute(&self, store: &dyn DocumentStore) -> Result<Vec<Document>, StoreError> {
        let docs = store.find(&self.collection, self.filter.clone()).await?;
        Ok(docs.into_iter().map(|doc| self.projection.apply(doc)).collect())
    }
}

/// `field=value` becomes equality, `field[gte]=value` (and gt, lte, lt) a range condition
pub fn parse_filters(params: &QueryParams) -> Result<Vec<FilterWhereInfo>, FilterError> {
    let mut keys: Vec<&String> = params.keys().filter(|k| !RESERVED_PARAMS.contains(&k.as_str())).collect();
    keys.sort();

    let mut conditions = Vec::with_capacity(keys.len());
    for key in keys {
        let raw = &params[key];
        let (field, op) = match key.split_once('[') {
            Some((field, rest)) => {
                let suffix = rest
                    .strip_suffix(']')
                    .ok_or_else(|| FilterError::InvalidColumn(key.clone()))?;
                let op = FilterOp::from_suffix(suffix)
                    .ok_or_else(|| FilterError::UnsupportedOperator(suffix.to_string()))?;
                (field, op)
            }
            None => (key.as_str(), FilterOp::Eq),
        };
        validate_column(field)?;
        conditions.push(FilterWhereInfo::new(field, op, coerce_value(raw)));
    }
    Ok(conditions)
}

/// Query strings carry no types: numbers and booleans are recognised, the rest stays a string
pub fn coerce_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = raw.parse::<f64>().ok().filter(|f| f.is_finite()).and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

pub fn parse_sort(sort: Option<&str>) -> Result<Vec<FilterOrderInfo>, FilterError> {
    let order = FilterOrder::parse(sort.unwrap_or(DEFAULT_SORT))?;
    if order.is_empty() {
        return FilterOrder::parse(DEFAULT_SORT);
    }
    Ok(order)
}

/// `fields=name,price` keeps those (plus `_id`); `fields=-menu,-images` drops those
pub fn parse_fields(fields: Option<&str>) -> Result<Projection, FilterError> {
    let Some(fields) = fields else {
        return Ok(Projection::default());
    };
    let parts: Vec<&str> = fields.split(',').map(str::trim).filter(|f| !f.is_empty()).collect();
    if parts.is_empty() {
        return Ok(Projection::default());
    }

    let excluded = parts.iter().filter(|f| f.starts_with('-')).count();
    if excluded > 0 && excluded != parts.len() {
        return Err(FilterError::MixedProjection);
    }

    let mut names = Vec::with_capacity(parts.len());
    for part in parts {
        let name = part.trim_start_matches('-');
        validate_column(name)?;
        names.push(name.to_string());
    }
    Ok(if excluded > 0 { Projection::Exclude(names) } else { Projection::Include(names) })
}

/// Largest skip Postgres accepts as an OFFSET
pub fn max_skip() -> usize {
    usize::try_from(i64::MAX).unwrap_or(usize::MAX)
}

/// Returns `(limit, skip)`. Pages are 1-based; bad values fall back to the
/// defaults, and pages past the end of the range give an empty page.
pub fn parse_pagination(page: Option<&str>, limit: Option<&str>) -> (usize, usize) {
    let limit = limit
        .and_then(|l| l.trim().parse::<usize>().ok())
        .filter(|l| *l >= 1)
        .map_or(MAX_LIMIT, |l| l.min(MAX_LIMIT));
    let skip = match page.map(|p| p.trim().parse::<usize>()) {
        Some(Ok(page)) if page >= 1 => (page - 1).saturating_mul(limit),
        Some(Err(e)) if *e.kind() == IntErrorKind::PosOverflow => usize::MAX,
        _ => 0,
    };
    (limit, skip.min(max_skip()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortDirection;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn range_suffixes_become_range_conditions() {
        let conditions = parse_filters(&params(&[("price[gte]", "2"), ("rating[lt]", "4.5"), ("page", "2")])).unwrap();
        assert_eq!(
            conditions,
            vec![
                FilterWhereInfo::new("price", FilterOp::Gte, 2),
                FilterWhereInfo::new("rating", FilterOp::Lt, 4.5),
            ]
        );
    }

    #[test]
    fn plain_params_are_equality_with_coercion() {
        let conditions = parse_filters(&params(&[("city", "Lyon"), ("open", "true")])).unwrap();
        assert_eq!(
            conditions,
            vec![FilterWhereInfo::eq("city", "Lyon"), FilterWhereInfo::eq("open", true)]
        );
    }

    #[test]
    fn rejects_unknown_operator_and_bad_field() {
        assert!(matches!(
            parse_filters(&params(&[("price[regex]", "x")])),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            parse_filters(&params(&[("price[gte", "1")])),
            Err(FilterError::InvalidColumn(_))
        ));
        assert!(parse_filters(&params(&[("a.b", "1")])).is_err());
    }

    #[test]
    fn sort_defaults_to_newest_first() {
        assert_eq!(parse_sort(None).unwrap(), vec![FilterOrderInfo::desc("createdAt")]);
        assert_eq!(parse_sort(Some("")).unwrap(), vec![FilterOrderInfo::desc("createdAt")]);
        let order = parse_sort(Some("name,-averageRating")).unwrap();
        assert_eq!(order[0].sort, SortDirection::Asc);
        assert_eq!(order[1], FilterOrderInfo::desc("averageRating"));
    }

    #[test]
    fn fields_include_id_and_default_hides_version() {
        let default = parse_fields(None).unwrap();
        assert!(!default.keeps("__v"));
        assert!(default.keeps("name"));

        let include = parse_fields(Some("name,price")).unwrap();
        assert!(include.keeps("_id"));
        assert!(include.keeps("price"));
        assert!(!include.keeps("address"));

        let exclude = parse_fields(Some("-menu")).unwrap();
        assert!(!exclude.keeps("menu"));
        assert!(exclude.keeps("__v"));

        assert!(matches!(parse_fields(Some("name,-menu")), Err(FilterError::MixedProjection)));
    }

    #[test]
    fn pagination_caps_limit() {
        assert_eq!(parse_pagination(None, None), (10, 0));
        assert_eq!(parse_pagination(Some("3"), Some("5")), (5, 10));
        assert_eq!(parse_pagination(Some("2"), Some("50")), (10, 10));
        assert_eq!(parse_pagination(Some("0"), Some("0")), (10, 0));
        assert_eq!(parse_pagination(Some("abc"), Some("-4")), (10, 0));
    }

    #[test]
    fn oversized_pages_clamp_to_the_largest_offset() {
        assert_eq!(parse_pagination(Some("99999999999999999999"), None), (10, max_skip()));
        let near_limit = (usize::MAX / 2).to_string();
        assert_eq!(parse_pagination(Some(&near_limit), Some("5")), (5, max_skip()));
    }

    #[test]
    fn builder_combines_scope_and_params() {
        let query = QueryBuilder::new("reviews")
            .scope("restaurant", "r1")
            .params(params(&[("rating[gte]", "4"), ("limit", "50")]))
            .build()
            .unwrap();
        assert_eq!(query.filter.where_clause[0], FilterWhereInfo::eq("restaurant", "r1"));
        assert_eq!(query.filter.where_clause[1], FilterWhereInfo::new("rating", FilterOp::Gte, 4));
        assert_eq!(query.filter.limit, Some(MAX_LIMIT));
        assert_eq!(query.filter.order, vec![FilterOrderInfo::desc("createdAt")]);
        assert_eq!(query.projection, Projection::default());
        assert_eq!(json!(query.collection), json!("reviews"));
    }
}
