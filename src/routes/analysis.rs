use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::documents::{load_document, parse_document_id};
use crate::error::{AppError, AppResult};
use crate::llm::query_llm;
use crate::prompts::{
    build_ask_prompt, citation_for, fallback_extraction, truncate_chars, ANALYSIS_CONTEXT_CHARS,
    ASK_CONTEXT_CHARS, AUDIT_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT,
};
use crate::state::AppState;
use crate::utils::json::parse_model_json;

pub const INVALID_EXTRACTION_JSON: &str = "LLM returned invalid JSON";
pub const INVALID_AUDIT_JSON: &str = "LLM returned invalid JSON for audit report";

#[derive(Serialize)]
pub struct InvalidModelOutput {
    pub error: &'static str,
    pub raw_response: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct AskRequest {
    pub document_id: i64,
    pub question: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub document_id: i32,
    pub citation: String,
}

pub async fn extract_fields(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Response> {
    let document = load_document(&state, parse_document_id(&raw_id)?)?;
    let document_id = document.id;

    if state.config.use_fallback_extraction {
        info!(document_id, "serving fallback extraction payload");
        return Ok(Json(fallback_extraction()).into_response());
    }

    let model = state.config.llm_model.as_str();
    let raw = query_llm(
        state.llm.as_ref(),
        Some(EXTRACTION_SYSTEM_PROMPT),
        truncate_chars(document.text(), ANALYSIS_CONTEXT_CHARS),
        model,
    )
    .await;

    Ok(model_json_response(document_id, raw, INVALID_EXTRACTION_JSON))
}

pub async fn audit_risks(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Response> {
    let document = load_document(&state, parse_document_id(&raw_id)?)?;
    let document_id = document.id;

    let model = state.config.llm_model.as_str();
    let raw = query_llm(
        state.llm.as_ref(),
        Some(AUDIT_SYSTEM_PROMPT),
        truncate_chars(document.text(), ANALYSIS_CONTEXT_CHARS),
        model,
    )
    .await;

    Ok(model_json_response(document_id, raw, INVALID_AUDIT_JSON))
}

pub async fn ask_question(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<AskResponse>> {
    let Json(body) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let AskRequest {
        document_id,
        question,
    } = parse_ask_request(&body)?;

    let document = load_document(&state, document_id)?;
    let document_id = document.id;
    let prompt = build_ask_prompt(truncate_chars(document.text(), ASK_CONTEXT_CHARS), &question);
    let answer = query_llm(state.llm.as_ref(), None, &prompt, &state.config.llm_model).await;

    Ok(Json(AskResponse {
        question,
        answer,
        document_id,
        citation: citation_for(document_id),
    }))
}

fn model_json_response(document_id: i32, raw: String, error_tag: &'static str) -> Response {
    match parse_model_json(&raw) {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            warn!(document_id, error = %err, "model reply was not valid JSON");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InvalidModelOutput {
                    error: error_tag,
                    raw_response: raw,
                }),
            )
                .into_response()
        }
    }
}

/// Validates an ask body. `document_id` accepts integers and integer
/// strings; `question` must be a string that is not blank once trimmed.
pub fn parse_ask_request(body: &Value) -> AppResult<AskRequest> {
    let object = body
        .as_object()
        .ok_or_else(|| AppError::bad_request("request body must be a JSON object"))?;

    let document_id = match object.get("document_id") {
        None | Some(Value::Null) => {
            return Err(AppError::bad_request("document_id: This field is required."))
        }
        Some(value) => parse_integer(value)
            .ok_or_else(|| AppError::bad_request("document_id: A valid integer is required."))?,
    };

    let question = match object.get("question") {
        None | Some(Value::Null) => {
            return Err(AppError::bad_request("question: This field is required."))
        }
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(_) => return Err(AppError::bad_request("question: Not a valid string.")),
    };
    if question.is_empty() {
        return Err(AppError::bad_request("question: This field may not be blank."));
    }

    Ok(AskRequest {
        document_id,
        question,
    })
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Some(int);
            }
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                .map(|float| float as i64)
        }
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
