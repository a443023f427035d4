// src/handlers/data.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    config::{FREE_PAPER_QUESTION_LIMIT, LEADERBOARD_SIZE},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    handlers::current_user,
    models::{
        content::LiteratureEntry,
        guide::{GuideListParams, StudyGuide},
        leaderboard::{AddScoreRequest, LeaderboardEntry},
        paper::{Paper, PaperListParams, PaperView},
        performance::{AddPerformanceRequest, PerformanceRecord},
        question::Choice,
        user::{Role, Subscription, User},
    },
    services::search::{ScoredQuestion, rank_questions},
    state::Store,
    store::{self, DocumentStore},
    utils::{
        jwt::{Claims, Viewer},
        subjects::{same_subject, subject_key},
    },
};

async fn load_papers(
    store: &dyn DocumentStore,
    subject: Option<&str>,
    year: Option<i32>,
) -> Result<Vec<Paper>, AppError> {
    let mut filter = Map::new();
    if let Some(subject) = subject {
        filter.insert("subjectKey".to_string(), json!(subject_key(subject)));
    }
    if let Some(year) = year {
        filter.insert("year".to_string(), json!(year));
    }

    Ok(store::find_all::<Paper>(store, &Value::Object(filter))
        .await?
        .into_iter()
        .map(|v| v.doc)
        .collect())
}

/// Lists past papers, optionally by subject and year.
///
/// Guests and free users only see the first questions of each paper.
pub async fn get_papers(
    State(store): State<Store>,
    Extension(viewer): Extension<Viewer>,
    AppQuery(params): AppQuery<PaperListParams>,
) -> Result<impl IntoResponse, AppError> {
    let papers = load_papers(store.as_ref(), params.subject.as_deref(), params.year).await?;

    let unlimited = match &viewer.0 {
        Some(claims) => match store::load::<User>(store.as_ref(), claims.user_id()).await? {
            Some(user) => user.doc.subscription == Subscription::Pro || user.doc.role == Role::Admin,
            None => false,
        },
        None => false,
    };

    let views: Vec<PaperView> = papers
        .into_iter()
        .map(|mut paper| {
            if !unlimited {
                paper.questions.truncate(FREE_PAPER_QUESTION_LIMIT);
            }
            PaperView {
                paper,
                is_limited: !unlimited,
            }
        })
        .collect();

    Ok(Json(views))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Free text; split on whitespace.
    pub query: Option<String>,
    /// Comma-separated keywords, e.g. from `/api/ai/topic-keywords`.
    pub keywords: Option<String>,
    pub subject: Option<String>,
}

impl SearchParams {
    fn keywords(&self) -> Vec<String> {
        let from_query = self
            .query
            .iter()
            .flat_map(|q| q.split_whitespace());
        let from_list = self.keywords.iter().flat_map(|k| k.split(','));

        from_query
            .chain(from_list)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Ranks past questions against keywords.
#[utoipa::path(
    get,
    path = "/api/data/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Questions by descending relevance", body = [ScoredQuestion]),
        (status = 400, description = "Neither keywords nor subject given")
    ),
    tag = "data"
)]
pub async fn search(
    State(store): State<Store>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let keywords = params.keywords();
    let subject = params.subject.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if keywords.is_empty() && subject.is_none() {
        return Err(AppError::BadRequest("Search query is required".to_string()));
    }

    let papers = load_papers(store.as_ref(), subject, None).await?;
    let results = rank_questions(&keywords, subject, &papers, &mut rand::thread_rng());

    tracing::debug!(
        "Search {:?} in {:?}: {} results",
        keywords,
        subject,
        results.len()
    );

    Ok(Json(results))
}

pub async fn get_guides(
    State(store): State<Store>,
    AppQuery(params): AppQuery<GuideListParams>,
) -> Result<impl IntoResponse, AppError> {
    let guides: Vec<StudyGuide> = store::find_all::<StudyGuide>(store.as_ref(), &json!({}))
        .await?
        .into_iter()
        .map(|v| v.doc)
        .filter(|g| {
            params
                .subject
                .as_deref()
                .is_none_or(|s| same_subject(&g.subject, s))
        })
        .collect();

    Ok(Json(guides))
}

pub async fn get_guide(
    State(store): State<Store>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let guide = store::load::<StudyGuide>(store.as_ref(), &id)
        .await?
        .ok_or(AppError::NotFound("Guide not found".to_string()))?;

    Ok(Json(guide.doc))
}

async fn ranked_leaderboard(store: &dyn DocumentStore) -> Result<Vec<LeaderboardEntry>, AppError> {
    let mut entries: Vec<LeaderboardEntry> = store::find_all::<LeaderboardEntry>(store, &json!({}))
        .await?
        .into_iter()
        .map(|v| v.doc)
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(entries)
}

pub async fn get_leaderboard(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ranked_leaderboard(store.as_ref()).await?))
}

/// Counts answers that match the stored answer keys.
fn verified_score(papers: &[Paper], answers: &HashMap<String, String>) -> u32 {
    let keys: HashMap<&str, Choice> = papers
        .iter()
        .flat_map(|p| p.questions.iter())
        .map(|q| (q.id.as_str(), q.answer))
        .collect();

    answers
        .iter()
        .filter(|(id, given)| {
            keys.get(id.as_str())
                .is_some_and(|expected| Choice::parse(given) == Some(*expected))
        })
        .count() as u32
}

/// Adds a score and trims the board to its fixed size.
///
/// When the client sends its answers the score is recomputed here and the
/// client's own figure is ignored.
pub async fn add_leaderboard_score(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<AddScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let score = match &payload.answers {
        Some(answers) => {
            let papers = load_papers(store.as_ref(), None, None).await?;
            let verified = verified_score(&papers, answers);
            tracing::info!(
                "Score verification: client={:?}, verified={}",
                payload.score,
                verified
            );
            verified
        }
        None => payload.score.unwrap_or(0),
    };

    let entry = LeaderboardEntry {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        score,
        total_questions: payload.total_questions.unwrap_or(0),
        subject: payload.subject.unwrap_or_else(|| "UTME Challenge".to_string()),
        date: payload.date.unwrap_or_else(Utc::now),
        user_id: Some(claims.user_id().to_string()),
    };
    store::create(store.as_ref(), &entry).await?;

    let mut board = ranked_leaderboard(store.as_ref()).await?;
    if board.len() > LEADERBOARD_SIZE {
        for dropped in board.split_off(LEADERBOARD_SIZE) {
            store::remove::<LeaderboardEntry>(store.as_ref(), &dropped.id).await?;
        }
    }

    Ok((StatusCode::CREATED, Json(board)))
}

/// Pro only.
pub async fn get_performance(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), claims.user_id()).await?.doc;
    if user.subscription != Subscription::Pro {
        return Err(AppError::Forbidden(
            "Performance tracking is an ExamRedi Pro feature.".to_string(),
        ));
    }

    let mut records: Vec<PerformanceRecord> =
        store::find_all::<PerformanceRecord>(store.as_ref(), &json!({ "userId": user.id }))
            .await?
            .into_iter()
            .map(|v| v.doc)
            .collect();
    records.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(Json(records))
}

pub async fn add_performance(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<AddPerformanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let record = PerformanceRecord {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: claims.user_id().to_string(),
        subject: payload.subject,
        score: payload.score,
        total_questions: payload.total_questions,
        date: payload.date.unwrap_or_else(Utc::now),
        kind: payload.kind.unwrap_or_else(|| "practice".to_string()),
    };
    store::create(store.as_ref(), &record).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_literature(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let entries: Vec<LiteratureEntry> = store::find_all::<LiteratureEntry>(store.as_ref(), &json!({}))
        .await?
        .into_iter()
        .map(|v| v.doc)
        .collect();

    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Question, QuestionOptions};

    fn q(id: &str, answer: Choice) -> Question {
        Question {
            id: id.to_string(),
            text: "?".to_string(),
            options: QuestionOptions::default(),
            answer,
            question_diagram: None,
            explanation: None,
        }
    }

    #[test]
    fn score_is_recomputed_from_answer_keys() {
        let papers = vec![Paper::new(
            "Physics",
            2020,
            None,
            vec![q("p1", Choice::A), q("p2", Choice::C), q("p3", Choice::D)],
        )];
        let answers = HashMap::from([
            ("p1".to_string(), "a".to_string()),
            ("p2".to_string(), "B".to_string()),
            ("p3".to_string(), "D".to_string()),
            ("unknown".to_string(), "A".to_string()),
        ]);

        assert_eq!(verified_score(&papers, &answers), 2);
    }

    #[test]
    fn search_params_merge_query_and_keywords() {
        let params = SearchParams {
            query: Some("  cell   wall ".to_string()),
            keywords: Some("osmosis, ,diffusion".to_string()),
            subject: None,
        };
        assert_eq!(params.keywords(), ["cell", "wall", "osmosis", "diffusion"]);
    }
}
