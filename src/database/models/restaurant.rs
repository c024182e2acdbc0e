use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

use super::user::{REFERENCED_USERNAME, USER_POPULATE_EXCLUDED};
use super::{require, trimmed, trimmed_opt, DocumentMeta, FieldErrors, Fields, Model, Populate};
use crate::database::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceRange {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Expensive,
    #[serde(rename = "$$$$")]
    Luxury,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub address: String,
    pub location: Uuid,
    pub cuisine: Uuid,
    pub price_range: PriceRange,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub owner: Uuid,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
    #[serde(default)]
    pub slug: String,
}

impl Model for Restaurant {
    const NAME: &'static str = "Restaurant";
    const COLLECTION: &'static str = "restaurants";
    const CREATOR_FIELD: Option<&'static str> = Some("owner");
    const DERIVED_FIELDS: &'static [&'static str] = &["slug", "averageRating"];
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["owner"];
    const UNIQUE_INDEXES: &'static [&'static [&'static str]] = &[&["slug"]];
    const LIST_POPULATE: &'static [Populate] = &[
        Populate { path: "owner", collection: "users", fields: REFERENCED_USERNAME },
        Populate { path: "location", collection: "locations", fields: Fields::Except(&["__v"]) },
        Populate { path: "cuisine", collection: "cuisines", fields: Fields::Except(&["__v"]) },
    ];
    const ONE_POPULATE: &'static [Populate] = &[
        Populate { path: "owner", collection: "users", fields: Fields::Except(USER_POPULATE_EXCLUDED) },
        Populate { path: "location", collection: "locations", fields: Fields::Except(&["__v"]) },
        Populate { path: "cuisine", collection: "cuisines", fields: Fields::Except(&["__v"]) },
    ];

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn normalize(&mut self) {
        trimmed(&mut self.name);
        trimmed(&mut self.address);
        trimmed_opt(&mut self.description);
        for item in &mut self.menu {
            trimmed(&mut item.name);
            trimmed_opt(&mut item.description);
            trimmed_opt(&mut item.category);
        }
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &self.name, "Please provide a name");
        require(&mut errors, "address", &self.address, "Please provide a address");
        if self.slug.is_empty() && !self.name.trim().is_empty() {
            errors.insert("name".into(), "Name must contain at least one letter or digit".into());
        }
        for (i, item) in self.menu.iter().enumerate() {
            require(&mut errors, &format!("menu.{}.name", i), &item.name, "Please provide a menu name");
            if !item.price.is_finite() || item.price < 0.0 {
                errors.insert(format!("menu.{}.price", i), "Please provide a menu price".into());
            }
        }
        errors
    }

    fn before_create(&mut self) {
        self.slug = slugify(&self.name);
    }

    fn before_update(changes: &mut Document) {
        if let Some(name) = changes.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            changes.insert("slug".into(), Value::String(slug));
        }
    }
}

static SLUG_SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
static SLUG_EDGE_RE: OnceLock<Regex> = OnceLock::new();

fn slug_separator_regex() -> &'static Regex {
    SLUG_SEPARATOR_RE.get_or_init(|| {
        Regex::new("[^a-z0-9]+").unwrap_or_else(|error| panic!("slug separator regex failed to compile: {error}"))
    })
}

fn slug_edge_regex() -> &'static Regex {
    SLUG_EDGE_RE.get_or_init(|| {
        Regex::new("^-|-$").unwrap_or_else(|error| panic!("slug edge regex failed to compile: {error}"))
    })
}

/// Lowercases `name`, collapses every run of non-alphanumeric characters to a
/// single `-` and trims leading and trailing dashes.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let dashed = slug_separator_regex().replace_all(&lowered, "-");
    slug_edge_regex().replace_all(&dashed, "").into_owned()
}
