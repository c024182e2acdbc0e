use serde::{Deserialize, Serialize};

use super::{require, trimmed, trimmed_opt, DocumentMeta, FieldErrors, Model};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
}

impl Model for Location {
    const NAME: &'static str = "Location";
    const COLLECTION: &'static str = "locations";

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn normalize(&mut self) {
        trimmed(&mut self.city);
        trimmed(&mut self.country);
        trimmed_opt(&mut self.state);
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "city", &self.city, "Please provide city name.");
        require(&mut errors, "country", &self.country, "Please provide country.");
        errors
    }
}
