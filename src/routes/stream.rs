use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::time::sleep;

use crate::state::AppState;

/// Text replayed by the streaming endpoint. Answers are not generated here;
/// the route only exercises the event-stream transport.
pub const PLACEHOLDER_ANSWER: &str =
    "This is a simulated streaming answer. Token streaming from the language model is not wired up yet.";
pub const END_OF_STREAM: &str = "[DONE]";

#[derive(Deserialize)]
pub struct StreamQuery {
    pub question: Option<String>,
}

pub async fn ask_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let delay = Duration::from_millis(state.config.stream_word_delay_ms);

    let question = query
        .question
        .map(|q| single_line(&q))
        .filter(|q| !q.is_empty())
        .map(|q| Event::default().event("question").data(q));

    let words = stream::iter(PLACEHOLDER_ANSWER.split_whitespace()).then(move |word| async move {
        sleep(delay).await;
        Event::default().data(word)
    });

    let events = stream::iter(question)
        .chain(words)
        .chain(stream::once(async {
            Event::default().event("end").data(END_OF_STREAM)
        }))
        .map(Ok);

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// SSE data cannot carry carriage returns, so line breaks in the echoed
/// question are folded into single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
