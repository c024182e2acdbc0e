use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::store::{Document, DocumentStore, StoreError};

pub mod cuisine;
pub mod location;
pub mod restaurant;
pub mod review;
pub mod user;

pub use cuisine::Cuisine;
pub use location::Location;
pub use restaurant::{slugify, MenuItem, PriceRange, Restaurant};
pub use review::Review;
pub use user::{RefreshTokenRecord, Role, User};

/// Field name -> problem description
pub type FieldErrors = HashMap<String, String>;

/// Fields the store owns on every document
pub const SYSTEM_FIELDS: &[&str] = &["_id", "createdAt", "updatedAt", "__v"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "__v", default)]
    pub version: u32,
}

impl DocumentMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(), created_at: now, updated_at: now, version: 0 }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed document collection.
///
/// The associated constants describe how the generic handlers treat the
/// collection; the hooks let a model normalize and check itself.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Display name used in messages, e.g. `"Restaurant"`
    const NAME: &'static str;
    const COLLECTION: &'static str;
    /// Field holding the id of the user who created the document
    const CREATOR_FIELD: Option<&'static str> = None;
    /// Never returned to clients
    const HIDDEN_FIELDS: &'static [&'static str] = &[];
    /// Computed by the server; ignored in request bodies
    const DERIVED_FIELDS: &'static [&'static str] = &[];
    /// Settable on create only
    const IMMUTABLE_FIELDS: &'static [&'static str] = &[];
    const UNIQUE_INDEXES: &'static [&'static [&'static str]] = &[];
    const LIST_POPULATE: &'static [Populate] = &[];
    const ONE_POPULATE: &'static [Populate] = &[];

    fn meta(&self) -> &DocumentMeta;

    fn meta_mut(&mut self) -> &mut DocumentMeta;

    /// Trims and lowercases fields in place
    fn normalize(&mut self) {}

    fn validate(&self) -> FieldErrors {
        FieldErrors::new()
    }

    fn before_create(&mut self) {}

    /// Runs on the incoming changes before they are merged into the stored document
    fn before_update(_changes: &mut Document) {}

    fn id(&self) -> String {
        self.meta().id.to_string()
    }
}

/// Which fields of a referenced document replace the reference
#[derive(Debug, Clone, Copy)]
pub enum Fields {
    Only(&'static [&'static str]),
    Except(&'static [&'static str]),
}

/// Replaces the id stored at `path` with the referenced document from `collection`
#[derive(Debug, Clone, Copy)]
pub struct Populate {
    pub path: &'static str,
    pub collection: &'static str,
    pub fields: Fields,
}

/// Creates every collection with its unique indexes
pub async fn ensure_collections(store: &dyn DocumentStore) -> Result<(), StoreError> {
    store.ensure_collection(User::COLLECTION, User::UNIQUE_INDEXES).await?;
    store.ensure_collection(Location::COLLECTION, Location::UNIQUE_INDEXES).await?;
    store.ensure_collection(Cuisine::COLLECTION, Cuisine::UNIQUE_INDEXES).await?;
    store.ensure_collection(Restaurant::COLLECTION, Restaurant::UNIQUE_INDEXES).await?;
    store.ensure_collection(Review::COLLECTION, Review::UNIQUE_INDEXES).await?;
    Ok(())
}

pub(crate) fn trimmed(value: &mut String) {
    let t = value.trim();
    if t.len() != value.len() {
        *value = t.to_string();
    }
}

pub(crate) fn trimmed_opt(value: &mut Option<String>) {
    if let Some(v) = value.as_mut() {
        trimmed(v);
    }
}

pub(crate) fn require(errors: &mut FieldErrors, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), message.to_string());
    }
}

/// RFC 3339 with fixed microsecond precision, so stored timestamps sort as strings
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_some(&format(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}
