use serde_json::{json, Value};

/// Characters of contract text sent with extraction and audit prompts.
pub const ANALYSIS_CONTEXT_CHARS: usize = 30_000;
/// Characters of contract text sent as question context.
pub const ASK_CONTEXT_CHARS: usize = 20_000;

pub const NOT_FOUND_ANSWER: &str = "I cannot find a definitive answer in the document.";

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a Legal Intelligence AI. Your task is to extract the following
fields from the provided contract text and return the result as a single
VALID JSON object. If a field is not found, use null or an empty string/array.

Fields to extract:
- parties (list of names)
- effective_date (string, e.g., 'YYYY-MM-DD')
- agreement_term (string, e.g., '3 years' or 'Until terminated')
- governing_law (string, e.g., 'State of New York')
- payment_terms (summary of schedule or due dates)
- termination (summary of notice period and conditions)
- auto_renewal (boolean or summary of the clause)
- confidentiality (summary of the clause)
- indemnity (summary of the clause)
- liability_cap (string, e.g., '10000 USD' or 'Unlimited')
- signatories (list of objects: [{"name": "...", "title": "..."}])
"#;

pub const AUDIT_SYSTEM_PROMPT: &str = r#"
You are a Legal Risk Analyst AI. Review the contract text. Identify all "Risky Clauses"
from this list:
1. Auto-renewal clause with a notice period less than 30 days.
2. Clauses that enforce "Unlimited Liability" for one party.
3. Clauses with excessively broad or one-sided indemnity obligations.

Return the findings as a list of JSON objects:
[
  {"clause_name": "...", "risk_level": "High/Medium/Low", "explanation": "...", "evidence_span": "text excerpt"},
  ...
]
Return ONLY valid JSON.
"#;

/// First `limit` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn build_ask_prompt(context: &str, question: &str) -> String {
    format!(
        "CONTEXT: {context}\n\n\
         QUESTION: {question}\n\n\
         Answer the question based ONLY on the context provided.\n\
         If the answer is not in the context, state: \"{NOT_FOUND_ANSWER}\"\n"
    )
}

pub fn citation_for(document_id: i32) -> String {
    format!("Document ID: {document_id}")
}

/// Canned extraction result served instead of a model call when the
/// fallback flag is enabled.
pub fn fallback_extraction() -> Value {
    json!({
        "parties": ["Acme Corporation", "Globex Industries LLC"],
        "effective_date": "2024-01-01",
        "agreement_term": "3 years",
        "governing_law": "State of New York",
        "payment_terms": "Net 30 from date of invoice",
        "termination": "Either party may terminate with 60 days written notice",
        "auto_renewal": "Renews for successive one-year terms unless notice is given 30 days before expiry",
        "confidentiality": "Mutual obligation to protect confidential information for 5 years",
        "indemnity": "Each party indemnifies the other for third-party claims arising from its breach",
        "liability_cap": "Fees paid in the preceding 12 months",
        "signatories": [
            { "name": "Jane Smith", "title": "Chief Executive Officer" },
            { "name": "John Doe", "title": "General Counsel" }
        ]
    })
}
