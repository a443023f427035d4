// src/services/search.rs

//! Keyword relevance ranking over exam questions.
//!
//! Each keyword contributes at most once per question, through its best
//! match: whole word (+15), substring (+5) or a near-miss spelling (+3).
//! When too few questions match strongly, the list is topped up with random
//! questions from the same subject.

use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::{paper::Paper, question::Question},
    utils::subjects::subject_key,
};

pub const RESULT_LIMIT: usize = 100;
pub const STRONG_MATCH_SCORE: u32 = 10;
pub const STRONG_MATCH_QUORUM: usize = 20;
pub const BACKFILL_TARGET: usize = 30;

const EXACT_POINTS: u32 = 15;
const SUBSTRING_POINTS: u32 = 5;
const FUZZY_POINTS: u32 = 3;
/// Fuzzy matching only applies to keywords longer than this (in chars).
const FUZZY_MIN_CHARS: usize = 4;
const FUZZY_MAX_EDITS: usize = 2;

/// A question tagged with its relevance.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoredQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub subject: String,
    pub year: i32,
    #[serde(rename = "exam")]
    pub exam_type: String,
    pub score: u32,
    pub matched_terms: Vec<String>,
}

impl ScoredQuestion {
    fn new(paper: &Paper, question: &Question, score: u32, matched_terms: Vec<String>) -> Self {
        Self {
            question: question.clone(),
            subject: paper.subject.clone(),
            year: paper.year,
            exam_type: paper.exam_type.clone(),
            score,
            matched_terms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Exact,
    Substring,
    Fuzzy,
}

impl MatchKind {
    fn points(self) -> u32 {
        match self {
            MatchKind::Exact => EXACT_POINTS,
            MatchKind::Substring => SUBSTRING_POINTS,
            MatchKind::Fuzzy => FUZZY_POINTS,
        }
    }
}

struct Matcher {
    term: String,
    word: Option<Regex>,
    chars: usize,
}

impl Matcher {
    fn new(term: String) -> Self {
        let word = Regex::new(&format!(r"\b{}\b", regex::escape(&term))).ok();
        let chars = term.chars().count();
        Self { term, word, chars }
    }

    fn classify(&self, haystack: &str) -> Option<MatchKind> {
        if self.word.as_ref().is_some_and(|re| re.is_match(haystack)) {
            return Some(MatchKind::Exact);
        }
        if haystack.contains(&self.term) {
            return Some(MatchKind::Substring);
        }
        if self.chars > FUZZY_MIN_CHARS
            && haystack
                .split_whitespace()
                .any(|token| self.is_near(token))
        {
            return Some(MatchKind::Fuzzy);
        }
        None
    }

    fn is_near(&self, token: &str) -> bool {
        let token_chars = token.chars().count();
        self.chars.abs_diff(token_chars) <= FUZZY_MAX_EDITS
            && levenshtein(&self.term, token) <= FUZZY_MAX_EDITS
    }
}

/// Edit distance counted in chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

fn haystack(question: &Question) -> String {
    let mut text = question.text.to_lowercase();
    for option in question.options.texts() {
        text.push(' ');
        text.push_str(&option.to_lowercase());
    }
    text
}

/// Lower-cases, trims and de-duplicates keywords, keeping first occurrence order.
fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

/// Ranks every question in `corpus` (optionally restricted to one subject)
/// against `keywords`.
///
/// Returns at most [`RESULT_LIMIT`] entries ordered by descending score.
/// With fewer than [`STRONG_MATCH_QUORUM`] strong matches, random unmatched
/// questions of the same subject are appended with score 0 until the list
/// reaches [`BACKFILL_TARGET`]. Without a subject there is nothing to
/// backfill from.
pub fn rank_questions<R: Rng + ?Sized>(
    keywords: &[String],
    subject: Option<&str>,
    corpus: &[Paper],
    rng: &mut R,
) -> Vec<ScoredQuestion> {
    let matchers: Vec<Matcher> = normalize_keywords(keywords)
        .into_iter()
        .map(Matcher::new)
        .collect();
    let wanted = subject.map(subject_key);
    let in_scope = |paper: &&Paper| {
        wanted
            .as_deref()
            .is_none_or(|key| paper.subject_key == key)
    };

    let mut scored = Vec::new();
    for paper in corpus.iter().filter(in_scope) {
        for question in &paper.questions {
            let haystack = haystack(question);
            let mut score = 0;
            let mut matched = Vec::new();
            for matcher in &matchers {
                if let Some(kind) = matcher.classify(&haystack) {
                    score += kind.points();
                    matched.push(matcher.term.clone());
                }
            }
            if score > 0 {
                scored.push(ScoredQuestion::new(paper, question, score, matched));
            }
        }
    }

    scored.sort_by(|a, b| b.score.cmp(&a.score));

    let strong = scored
        .iter()
        .filter(|s| s.score >= STRONG_MATCH_SCORE)
        .count();
    if strong >= STRONG_MATCH_QUORUM {
        scored.truncate(RESULT_LIMIT);
        return scored;
    }

    let mut pool: Vec<(&Paper, &Question)> = Vec::new();
    if wanted.is_some() {
        let taken: HashSet<&str> = scored.iter().map(|s| s.question.id.as_str()).collect();
        for paper in corpus.iter().filter(in_scope) {
            for question in &paper.questions {
                if !taken.contains(question.id.as_str()) {
                    pool.push((paper, question));
                }
            }
        }
    }
    pool.shuffle(rng);

    let backfill = BACKFILL_TARGET.saturating_sub(scored.len());
    let fillers = pool
        .into_iter()
        .map(|(paper, question)| ScoredQuestion::new(paper, question, 0, Vec::new()));

    let mut seen = HashSet::new();
    let mut results: Vec<ScoredQuestion> = Vec::with_capacity(scored.len() + backfill);
    for entry in scored {
        if seen.insert(entry.question.id.clone()) {
            results.push(entry);
        }
    }
    let mut added = 0;
    for entry in fillers {
        if added == backfill {
            break;
        }
        if seen.insert(entry.question.id.clone()) {
            results.push(entry);
            added += 1;
        }
    }

    results.truncate(RESULT_LIMIT);
    results
}
