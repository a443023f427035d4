// src/services/progress.rs

//! Streak bookkeeping and recent-activity merging.
//!
//! Everything here is pure; callers persist the result through
//! `store::modify`, which retries on concurrent writes.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    progress::{Activity, ActivityUpdate, Engagement, Streak},
    user::{Subscription, User},
};

/// Maximum number of activities kept per user.
pub const ACTIVITY_LIMIT: usize = 50;
/// Score ratio at or above which a quiz unlocks [`NUDGE_QUIZ_ACE`].
pub const HIGH_SCORE_RATIO: f64 = 0.85;

pub const NUDGE_QUIZ_ACE: &str = "quiz_ace";
pub const NUDGE_GO_PRO: &str = "go_pro";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Activity '{0}' is new and must include type, title and status")]
    IncompleteActivity(String),
}

/// Advances `streak` to `today`.
///
/// Same day: unchanged. Next day: +1. Any longer gap (or no previous
/// activity): back to 1. A `today` earlier than the last recorded day is
/// treated as the same day, so `last_date` never moves backwards.
pub fn advance_streak(streak: &Streak, today: NaiveDate) -> Streak {
    let mut next = streak.clone();

    let current = match streak.last_date {
        Some(last) if today <= last => return next,
        Some(last) if (today - last).num_days() == 1 => streak.current + 1,
        _ => 1,
    };

    next.current = current;
    next.longest = streak.longest.max(current);
    next.last_date = Some(today);

    let stamp = today.format("%Y-%m-%d").to_string();
    if next.history.last() != Some(&stamp) {
        next.history.push(stamp);
    }

    next
}

fn apply_update(activity: &mut Activity, update: &ActivityUpdate, now: DateTime<Utc>) {
    if let Some(kind) = update.kind {
        activity.kind = kind;
    }
    if let Some(title) = &update.title {
        activity.title = title.clone();
    }
    if let Some(status) = update.status {
        activity.status = status;
    }
    if update.path.is_some() {
        activity.path = update.path.clone();
    }
    if update.state.is_some() {
        activity.state = update.state.clone();
    }
    if update.score.is_some() {
        activity.score = update.score;
    }
    if update.max_score.is_some() {
        activity.max_score = update.max_score;
    }
    if update.progress.is_some() {
        activity.progress = update.progress;
    }
    if update.dismissed_at.is_some() {
        activity.dismissed_at = update.dismissed_at;
    }
    if update.engagement_count.is_some() {
        activity.engagement_count = update.engagement_count;
    }
    activity.timestamp = now;
}

fn create_activity(update: &ActivityUpdate, now: DateTime<Utc>) -> Result<Activity, ProgressError> {
    let (Some(kind), Some(title), Some(status)) = (update.kind, update.title.clone(), update.status)
    else {
        return Err(ProgressError::IncompleteActivity(update.id.clone()));
    };

    Ok(Activity {
        id: update.id.clone(),
        kind,
        title,
        path: update.path.clone(),
        state: update.state.clone(),
        status,
        score: update.score,
        max_score: update.max_score,
        progress: update.progress,
        dismissed_at: update.dismissed_at,
        engagement_count: update.engagement_count,
        timestamp: now,
    })
}

/// Merges incoming updates into `existing`.
///
/// Known ids are updated in place (present fields only) and re-stamped;
/// unknown ids are prepended. The result is ordered newest first and capped
/// at [`ACTIVITY_LIMIT`].
pub fn merge_activities(
    existing: &[Activity],
    incoming: &[ActivityUpdate],
    now: DateTime<Utc>,
) -> Result<Vec<Activity>, ProgressError> {
    let mut merged = existing.to_vec();

    for update in incoming {
        match merged.iter_mut().find(|a| a.id == update.id) {
            Some(activity) => apply_update(activity, update, now),
            None => merged.insert(0, create_activity(update, now)?),
        }
    }

    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(ACTIVITY_LIMIT);
    Ok(merged)
}

/// Nudges earned by this round of updates.
fn earned_nudges(subscription: Subscription, incoming: &[ActivityUpdate]) -> Vec<&'static str> {
    let mut nudges = Vec::new();

    let aced = incoming.iter().any(|u| match (u.score, u.max_score) {
        (Some(score), Some(max)) if max > 0.0 => score / max >= HIGH_SCORE_RATIO,
        _ => false,
    });
    if aced {
        nudges.push(NUDGE_QUIZ_ACE);
    }
    if subscription == Subscription::Free {
        nudges.push(NUDGE_GO_PRO);
    }

    nudges
}

/// New progress state for a user, ready to be written back.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub streak: Streak,
    pub recent_activity: Vec<Activity>,
    pub engagement: Engagement,
}

impl Reconciled {
    pub fn apply_to(self, user: &mut User) {
        user.streak = self.streak;
        user.recent_activity = self.recent_activity;
        user.engagement = self.engagement;
    }
}

/// Computes the user's progress after an update arriving on `today`.
///
/// The streak always advances; activities are only touched when `incoming`
/// is present. Nothing is returned on error, so a rejected update leaves
/// the user untouched.
pub fn reconcile(
    user: &User,
    today: NaiveDate,
    now: DateTime<Utc>,
    incoming: Option<&[ActivityUpdate]>,
) -> Result<Reconciled, ProgressError> {
    let streak = advance_streak(&user.streak, today);

    let updates = incoming.unwrap_or_default();
    let recent_activity = if incoming.is_some() {
        merge_activities(&user.recent_activity, updates, now)?
    } else {
        user.recent_activity.clone()
    };

    let mut engagement = user.engagement.clone();
    for nudge in earned_nudges(user.subscription, updates) {
        engagement.unlocked_nudges.insert(nudge.to_string());
    }

    Ok(Reconciled {
        streak,
        recent_activity,
        engagement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::progress::{ActivityKind, ActivityStatus};
    use chrono::Duration;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn streak(current: u32, longest: u32, last: &str) -> Streak {
        Streak {
            current,
            longest,
            last_date: Some(day(last)),
            history: vec![last.to_string()],
        }
    }

    fn new_update(id: &str) -> ActivityUpdate {
        ActivityUpdate {
            id: id.to_string(),
            kind: Some(ActivityKind::Quiz),
            title: Some(format!("Quiz {id}")),
            status: Some(ActivityStatus::InProgress),
            ..Default::default()
        }
    }

    #[test]
    fn consecutive_day_extends_streak() {
        let next = advance_streak(&streak(3, 5, "2024-01-10"), day("2024-01-11"));
        assert_eq!(next.current, 4);
        assert_eq!(next.longest, 5);
        assert_eq!(next.last_date, Some(day("2024-01-11")));
        assert_eq!(next.history, ["2024-01-10", "2024-01-11"]);
    }

    #[test]
    fn gap_resets_streak() {
        let next = advance_streak(&streak(3, 5, "2024-01-10"), day("2024-01-14"));
        assert_eq!(next.current, 1);
        assert_eq!(next.longest, 5);
    }

    #[test]
    fn earlier_day_is_treated_as_same_day() {
        let start = streak(3, 3, "2024-01-10");

        let skewed = advance_streak(&start, day("2024-01-09"));
        assert_eq!(skewed, start);

        // Back on the real day nothing is counted twice
        let back = advance_streak(&skewed, day("2024-01-10"));
        assert_eq!(back.current, 3);
        assert_eq!(back.last_date, Some(day("2024-01-10")));
        assert_eq!(back.history, ["2024-01-10"]);
    }

    #[test]
    fn same_day_is_idempotent() {
        let first = advance_streak(&streak(3, 3, "2024-01-10"), day("2024-01-11"));
        let second = advance_streak(&first, day("2024-01-11"));
        assert_eq!(first, second);
        assert_eq!(second.current, 4);
        assert_eq!(second.longest, 4);
    }

    #[test]
    fn first_activity_starts_at_one() {
        let next = advance_streak(&Streak::default(), day("2024-02-01"));
        assert_eq!(next.current, 1);
        assert_eq!(next.longest, 1);
        assert_eq!(next.history, ["2024-02-01"]);
    }

    #[test]
    fn merge_updates_in_place_and_keeps_other_fields() {
        let t0 = Utc::now() - Duration::minutes(10);
        let existing = merge_activities(&[], &[new_update("a1")], t0).unwrap();

        let update = ActivityUpdate {
            id: "a1".to_string(),
            score: Some(8.0),
            status: Some(ActivityStatus::Completed),
            ..Default::default()
        };
        let now = Utc::now();
        let merged = merge_activities(&existing, &[update], now).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Quiz a1");
        assert_eq!(merged[0].kind, ActivityKind::Quiz);
        assert_eq!(merged[0].status, ActivityStatus::Completed);
        assert_eq!(merged[0].score, Some(8.0));
        assert_eq!(merged[0].timestamp, now);
    }

    #[test]
    fn merge_sorts_newest_first_and_caps() {
        let base = Utc::now() - Duration::hours(1);
        let mut existing = Vec::new();
        for i in 0..ACTIVITY_LIMIT {
            let at = base + Duration::seconds(i as i64);
            existing.extend(merge_activities(&[], &[new_update(&format!("old{i}"))], at).unwrap());
        }

        let now = Utc::now();
        let merged = merge_activities(&existing, &[new_update("fresh")], now).unwrap();

        assert_eq!(merged.len(), ACTIVITY_LIMIT);
        assert_eq!(merged[0].id, "fresh");
        assert!(merged.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        // The oldest entry fell off.
        assert!(merged.iter().all(|a| a.id != "old0"));
    }

    #[test]
    fn new_activity_needs_required_fields() {
        let partial = ActivityUpdate {
            id: "ghost".to_string(),
            score: Some(1.0),
            ..Default::default()
        };
        let err = merge_activities(&[], &[partial], Utc::now()).unwrap_err();
        assert_eq!(err, ProgressError::IncompleteActivity("ghost".to_string()));
    }

    #[test]
    fn reconcile_unlocks_nudges() {
        let user = User::new("Ada".to_string(), "ada@example.com", None);
        let mut aced = new_update("q1");
        aced.score = Some(9.0);
        aced.max_score = Some(10.0);

        let out = reconcile(&user, day("2024-03-01"), Utc::now(), Some(&[aced])).unwrap();

        assert!(out.engagement.unlocked_nudges.contains(NUDGE_QUIZ_ACE));
        assert!(out.engagement.unlocked_nudges.contains(NUDGE_GO_PRO));
        assert_eq!(out.streak.current, 1);
        assert_eq!(out.recent_activity.len(), 1);
    }

    #[test]
    fn reconcile_without_activities_only_touches_streak() {
        let mut user = User::new("Ada".to_string(), "ada@example.com", None);
        user.set_subscription(Subscription::Pro);
        user.streak = streak(2, 2, "2024-03-01");

        let out = reconcile(&user, day("2024-03-02"), Utc::now(), None).unwrap();
        assert_eq!(out.streak.current, 3);
        assert!(out.recent_activity.is_empty());
        assert!(out.engagement.unlocked_nudges.is_empty());

        out.apply_to(&mut user);
        assert_eq!(user.streak.longest, 3);
    }
}
