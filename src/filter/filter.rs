use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{validate_column, FilterWhere};
use super::types::{FilterData, FilterOrderInfo, FilterWhereInfo, SqlResult};

/// A find against one document collection, compiled either to SQL over the
/// collection's JSONB table or applied directly to in-memory documents.
pub struct Filter {
    collection: String,
    where_data: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Filter {
    pub fn new(collection: impl Into<String>) -> Result<Self, FilterError> {
        let collection = collection.into();
        Self::validate_collection_name(&collection)?;
        Ok(Self { collection, where_data: vec![], order_data: vec![], limit: None, offset: None })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        self.where_clause(data.where_clause)?;
        self.order(data.order)?;
        self.limit = data.limit;
        self.offset = data.offset;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Vec<FilterWhereInfo>) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = conditions;
        Ok(self)
    }

    pub fn order(&mut self, order: Vec<FilterOrderInfo>) -> Result<&mut Self, FilterError> {
        for info in &order {
            validate_column(&info.column)?;
        }
        self.order_data = order;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = FilterWhere::generate(&self.where_data, 0)?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT doc".to_string(),
            format!("FROM \"{}\"", self.collection),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params })
    }

    /// Same semantics as `to_sql`, evaluated over documents in insertion order
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Map<String, Value>>
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        let mut matched: Vec<&Map<String, Value>> = docs
            .into_iter()
            .filter(|doc| FilterWhere::matches(doc, &self.where_data))
            .collect();
        // stable, so insertion order breaks ties
        matched.sort_by(|a, b| FilterOrder::compare(a, b, &self.order_data));

        matched
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn validate_collection_name(name: &str) -> Result<(), FilterError> {
        validate_column(name).map_err(|_| FilterError::InvalidTableName(name.to_string()))
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
