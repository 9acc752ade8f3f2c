//! Queries over the `documents` table.
//!
//! Every function takes a borrowed connection so callers decide how long a
//! pooled connection is held.

use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::models::{Document, NewDocument};
use crate::schema::documents;

pub fn insert_document(conn: &mut PgConnection, new_document: &NewDocument) -> QueryResult<Document> {
    diesel::insert_into(documents::table)
        .values(new_document)
        .get_result(conn)
}

pub fn find_document(conn: &mut PgConnection, document_id: i32) -> QueryResult<Option<Document>> {
    documents::table.find(document_id).first(conn).optional()
}

pub fn list_documents(conn: &mut PgConnection) -> QueryResult<Vec<Document>> {
    documents::table
        .order((documents::uploaded_at.desc(), documents::id.desc()))
        .load(conn)
}

/// Attaches extracted text. This is the only update a document ever receives.
pub fn attach_extracted_text(
    conn: &mut PgConnection,
    document_id: i32,
    text: &str,
) -> QueryResult<usize> {
    diesel::update(documents::table.find(document_id))
        .set(documents::extracted_text.eq(Some(text)))
        .execute(conn)
}

pub fn delete_document(conn: &mut PgConnection, document_id: i32) -> QueryResult<usize> {
    diesel::delete(documents::table.find(document_id)).execute(conn)
}

pub fn any_documents(conn: &mut PgConnection) -> QueryResult<bool> {
    diesel::select(exists(documents::table.select(documents::id))).get_result(conn)
}
