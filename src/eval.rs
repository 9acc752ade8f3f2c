//! Answer scoring for the offline question-answering evaluation.
//!
//! `similarity` is the Ratcliff/Obershelp ratio: twice the number of
//! characters in matching blocks divided by the combined length. Matching
//! blocks are found by taking the longest common run, then recursing on the
//! unmatched text to its left and right.

use std::collections::HashMap;

use serde::Deserialize;

pub const DEFAULT_ASK_URL: &str = "http://localhost:8000/api/ask/";
pub const DEFAULT_EVAL_FILE: &str = "qa_eval_set.json";
pub const PASS_THRESHOLD: f64 = 0.8;

/// Inputs at least this long drop very frequent characters from match seeds.
const AUTOJUNK_MIN_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct EvalItem {
    pub document_id: i64,
    pub question: String,
    pub expected_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub total: usize,
    pub correct: usize,
}

impl EvalSummary {
    pub fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        if verdict == Verdict::Pass {
            self.correct += 1;
        }
    }

    /// Percentage of passing items; zero for an empty run.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

/// Case-insensitive similarity in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = SequenceMatcher::new(&a, &b).matching_chars();
    2.0 * matched as f64 / total as f64
}

struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b_index: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, ch) in b.iter().enumerate() {
            b_index.entry(*ch).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let popular_limit = b.len() / 100 + 1;
            b_index.retain(|_, positions| positions.len() <= popular_limit);
        }

        Self { a, b, b_index }
    }

    fn matching_chars(&self) -> usize {
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
            let (i, j, size) = self.longest_match(a_lo, a_hi, b_lo, b_hi);
            if size == 0 {
                continue;
            }
            matched += size;
            if a_lo < i && b_lo < j {
                pending.push((a_lo, i, b_lo, j));
            }
            if i + size < a_hi && j + size < b_hi {
                pending.push((i + size, a_hi, j + size, b_hi));
            }
        }

        matched
    }

    /// Longest common run inside `a[a_lo..a_hi]` and `b[b_lo..b_hi]`,
    /// earliest in `a` then in `b` on ties.
    fn longest_match(&self, a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
        let mut run_ending_at: HashMap<usize, usize> = HashMap::new();

        for i in a_lo..a_hi {
            let mut next_runs: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b_index.get(&self.a[i]) {
                for &j in positions {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let run = j
                        .checked_sub(1)
                        .and_then(|prev| run_ending_at.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_runs.insert(j, run);
                    if run > best_size {
                        best_i = i + 1 - run;
                        best_j = j + 1 - run;
                        best_size = run;
                    }
                }
            }
            run_ending_at = next_runs;
        }

        // Seeds skip popular characters; grow the run over equal neighbours.
        while best_i > a_lo && best_j > b_lo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < a_hi
            && best_j + best_size < b_hi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }
}
