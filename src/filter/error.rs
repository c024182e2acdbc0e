use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid collection name: {0}")]
    InvalidTableName(String),

    #[error("Invalid field name: {0}")]
    InvalidColumn(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Cannot mix included and excluded fields")]
    MixedProjection,
}
