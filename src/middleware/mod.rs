pub mod auth;
pub mod response;

pub use auth::{protect, require_roles, CurrentUser};
pub use response::{ApiResponse, ApiResult};
