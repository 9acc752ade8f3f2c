use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: i32,
    pub title: String,
    pub file: String,
    pub uploaded_at: NaiveDateTime,
    pub extracted_text: Option<String>,
}

impl Document {
    /// Text attached at ingestion, or an empty string while it is still missing.
    pub fn text(&self) -> &str {
        self.extracted_text.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub title: String,
    pub file: String,
}
