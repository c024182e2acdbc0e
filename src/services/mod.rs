pub mod ratings;

pub use ratings::{average_rating, refresh_average_rating, sync_average_rating};
