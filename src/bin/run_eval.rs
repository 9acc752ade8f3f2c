use std::{env, fs, io::ErrorKind, process};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use contractlens::eval::{
    similarity, EvalItem, EvalSummary, Verdict, DEFAULT_ASK_URL, DEFAULT_EVAL_FILE,
    PASS_THRESHOLD,
};

const USAGE: &str = "Usage: run_eval [--file <path>] [--url <ask endpoint>] [--threshold <0..1>]";

struct Options {
    file: String,
    url: String,
    threshold: f64,
}

#[derive(Serialize)]
struct AskPayload<'a> {
    document_id: i64,
    question: &'a str,
}

#[derive(Deserialize)]
struct AskReply {
    #[serde(default)]
    answer: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            process::exit(1);
        }
    };

    let raw = match fs::read_to_string(&options.file) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            println!("Error: Evaluation file '{}' not found.", options.file);
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", options.file));
        }
    };
    let items: Vec<EvalItem> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid evaluation set", options.file))?;

    let client = Client::new();
    let mut summary = EvalSummary::default();

    println!(
        "--- Running RAG Evaluation against {} ({} questions) ---",
        options.url,
        items.len()
    );

    for (index, item) in items.iter().enumerate() {
        let number = index + 1;
        let answer = match ask(&client, &options.url, item).await {
            Ok(answer) => answer,
            Err(err) => {
                println!(
                    "Test {number} (Doc {}) Failed: API Error: {err:#}",
                    item.document_id
                );
                String::new()
            }
        };

        let score = similarity(&item.expected_answer, &answer);
        let verdict = Verdict::from_score(score, options.threshold);
        summary.record(verdict);

        println!(
            "[{}] Test {number} (Doc {}): Similarity={score:.2}",
            verdict.label(),
            item.document_id
        );
        println!("  Q: {}", item.question);
        println!("  A: {answer}");
        if verdict == Verdict::Fail {
            println!("  E: {}", item.expected_answer);
        }
        println!("{}", "-".repeat(50));
    }

    println!("\n{}", "=".repeat(50));
    println!(
        "FINAL RAG SCORE: {}/{} Correct (Accuracy: {:.2}%)",
        summary.correct,
        summary.total,
        summary.accuracy()
    );
    println!("{}", "=".repeat(50));

    Ok(())
}

async fn ask(client: &Client, url: &str, item: &EvalItem) -> Result<String> {
    let response = client
        .post(url)
        .json(&AskPayload {
            document_id: item.document_id,
            question: &item.question,
        })
        .send()
        .await
        .context("request failed")?
        .error_for_status()
        .context("service returned an error status")?;

    let reply: AskReply = response.json().await.context("invalid response body")?;
    Ok(reply.answer)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        file: DEFAULT_EVAL_FILE.to_string(),
        url: DEFAULT_ASK_URL.to_string(),
        threshold: PASS_THRESHOLD,
    };

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--file" => options.file = value("--file")?,
            "--url" => options.url = value("--url")?,
            "--threshold" => {
                let raw = value("--threshold")?;
                options.threshold = raw
                    .parse()
                    .ok()
                    .filter(|t: &f64| (0.0..=1.0).contains(t))
                    .ok_or_else(|| format!("invalid threshold: {raw}"))?;
            }
            "-h" | "--help" => return Err("run_eval replays a QA fixture against /api/ask/".into()),
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(options)
}
