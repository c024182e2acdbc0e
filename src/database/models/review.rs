use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{REFERENCED_USERNAME, USER_POPULATE_EXCLUDED};
use super::{trimmed_opt, DocumentMeta, FieldErrors, Fields, Model, Populate};

pub const COMMENT_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub reviewer: Uuid,
    pub restaurant: Uuid,
}

impl Model for Review {
    const NAME: &'static str = "Review";
    const COLLECTION: &'static str = "reviews";
    const CREATOR_FIELD: Option<&'static str> = Some("reviewer");
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["reviewer", "restaurant"];
    const UNIQUE_INDEXES: &'static [&'static [&'static str]] = &[&["restaurant", "reviewer"]];
    const LIST_POPULATE: &'static [Populate] = &[
        Populate { path: "reviewer", collection: "users", fields: REFERENCED_USERNAME },
    ];
    const ONE_POPULATE: &'static [Populate] = &[
        Populate { path: "reviewer", collection: "users", fields: Fields::Except(USER_POPULATE_EXCLUDED) },
    ];

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn normalize(&mut self) {
        trimmed_opt(&mut self.comment);
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if !(1..=5).contains(&self.rating) {
            errors.insert("rating".into(), "Rating must be between 1 and 5".into());
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > COMMENT_MAX_CHARS {
                errors.insert("comment".into(), format!("Comment cannot be longer than {} characters", COMMENT_MAX_CHARS));
            }
        }
        errors
    }
}
