use serde::{Deserialize, Serialize};

use super::{require, trimmed, DocumentMeta, FieldErrors, Model};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cuisine {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: String,
}

impl Model for Cuisine {
    const NAME: &'static str = "Cuisine";
    const COLLECTION: &'static str = "cuisines";
    const UNIQUE_INDEXES: &'static [&'static [&'static str]] = &[&["name"]];

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn normalize(&mut self) {
        trimmed(&mut self.name);
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &self.name, "Please provide cuisine name.");
        errors
    }
}
