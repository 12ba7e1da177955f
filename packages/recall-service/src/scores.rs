use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, RecallService, Result, ScoreDetail};
use recall_domain::grading;
use recall_storage::{
	models::{RecentScore, TestScore},
	queries::{self, SortOrder},
};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const RECENT_SCORES: i64 = 10;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateScoreRequest {
	pub total_questions: u32,
	pub correct_answers: u32,
	#[serde(default)]
	pub partial_answers: u32,
	#[serde(default)]
	pub details: Vec<ScoreDetail>,
	#[serde(default)]
	pub memories_tested: Vec<Uuid>,
	/// Defaults to the time of the request.
	#[serde(default, with = "crate::time_serde::option")]
	pub test_date: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestScoreView {
	pub id: Uuid,
	pub total_questions: i32,
	pub correct_answers: i32,
	pub partial_answers: i32,
	pub final_score: f64,
	pub percentage: i32,
	pub details: Vec<ScoreDetail>,
	pub memories_tested: Vec<Uuid>,
	#[serde(with = "crate::time_serde")]
	pub test_date: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<TestScore> for TestScoreView {
	fn from(score: TestScore) -> Self {
		Self {
			id: score.id,
			total_questions: score.total_questions,
			correct_answers: score.correct_answers,
			partial_answers: score.partial_answers,
			final_score: score.final_score,
			percentage: score.percentage,
			details: serde_json::from_value(score.details).unwrap_or_default(),
			memories_tested: serde_json::from_value(score.memories_tested).unwrap_or_default(),
			test_date: score.test_date,
			created_at: score.created_at,
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListScoresQuery {
	pub limit: Option<i64>,
	pub offset: Option<i64>,
	/// `asc` or `desc`, by creation time.
	pub order: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoresPage {
	pub items: Vec<TestScoreView>,
	pub total: i64,
	pub limit: i64,
	pub offset: i64,
	pub has_more: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecentScoreView {
	pub percentage: i32,
	#[serde(with = "crate::time_serde")]
	pub test_date: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreStats {
	pub total_tests: i64,
	pub average_score: Option<f64>,
	pub best_score: Option<i32>,
	pub worst_score: Option<i32>,
	pub average_final_score: Option<f64>,
	pub total_correct: i64,
	pub total_questions_answered: i64,
	/// Newest first.
	pub recent_scores: Vec<RecentScoreView>,
	/// Newest minus oldest of `recent_scores`.
	pub improvement_trend: i32,
}

impl RecallService {
	/// Persists a finished test. `final_score` and `percentage` are recomputed from the counts.
	pub async fn create_test_score(&self, req: CreateScoreRequest) -> Result<TestScoreView> {
		validate_counts(req.total_questions, req.correct_answers, req.partial_answers)?;

		let now = OffsetDateTime::now_utc();
		let score = TestScore {
			id: Uuid::new_v4(),
			total_questions: to_i32("total_questions", req.total_questions)?,
			correct_answers: to_i32("correct_answers", req.correct_answers)?,
			partial_answers: to_i32("partial_answers", req.partial_answers)?,
			final_score: grading::final_score(req.correct_answers, req.partial_answers),
			percentage: grading::percentage(
				req.correct_answers,
				req.partial_answers,
				req.total_questions,
			) as i32,
			details: to_json(&req.details)?,
			memories_tested: to_json(&req.memories_tested)?,
			test_date: req.test_date.unwrap_or(now),
			created_at: now,
		};
		let stored = queries::insert_test_score(&self.db, &score).await?;

		tracing::info!(score_id = %stored.id, percentage = stored.percentage, "Test score saved.");

		Ok(stored.into())
	}

	pub async fn list_test_scores(&self, query: ListScoresQuery) -> Result<ScoresPage> {
		let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
		let offset = query.offset.unwrap_or(0);
		let order = match query.order.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
			Some(raw) => SortOrder::parse(raw).ok_or_else(|| Error::InvalidRequest {
				message: "order must be asc or desc.".to_string(),
			})?,
			None => SortOrder::default(),
		};

		if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
			return Err(Error::InvalidRequest {
				message: format!("limit must be between 1 and {MAX_PAGE_LIMIT}."),
			});
		}
		if offset < 0 {
			return Err(Error::InvalidRequest { message: "offset must not be negative.".to_string() });
		}

		let items = queries::list_test_scores(&self.db, limit, offset, order).await?;
		let total = queries::count_test_scores(&self.db).await?;

		Ok(ScoresPage {
			items: items.into_iter().map(TestScoreView::from).collect(),
			total,
			limit,
			offset,
			has_more: total > offset + limit,
		})
	}

	pub async fn get_test_score(&self, id: Uuid) -> Result<TestScoreView> {
		queries::get_test_score(&self.db, id)
			.await?
			.map(TestScoreView::from)
			.ok_or_else(|| Error::NotFound { message: format!("Test score {id} not found.") })
	}

	pub async fn score_stats(&self) -> Result<ScoreStats> {
		let aggregate = queries::score_aggregate(&self.db).await?;
		let recent = queries::recent_scores(&self.db, RECENT_SCORES).await?;
		let improvement_trend = improvement_trend(&recent);

		Ok(ScoreStats {
			total_tests: aggregate.total_tests,
			average_score: aggregate.average_score,
			best_score: aggregate.best_score,
			worst_score: aggregate.worst_score,
			average_final_score: aggregate.average_final_score,
			total_correct: aggregate.total_correct,
			total_questions_answered: aggregate.total_questions_answered,
			recent_scores: recent
				.into_iter()
				.map(|row| RecentScoreView { percentage: row.percentage, test_date: row.test_date })
				.collect(),
			improvement_trend,
		})
	}
}

fn validate_counts(total: u32, correct: u32, partial: u32) -> Result<()> {
	if total == 0 {
		return Err(Error::InvalidRequest {
			message: "total_questions must be greater than zero.".to_string(),
		});
	}
	if u64::from(correct) + u64::from(partial) > u64::from(total) {
		return Err(Error::InvalidRequest {
			message: "correct_answers plus partial_answers must not exceed total_questions."
				.to_string(),
		});
	}

	Ok(())
}

fn to_i32(field: &str, value: u32) -> Result<i32> {
	i32::try_from(value)
		.map_err(|_| Error::InvalidRequest { message: format!("{field} is out of range.") })
}

fn to_json<T>(value: &T) -> Result<serde_json::Value>
where
	T: Serialize,
{
	serde_json::to_value(value).map_err(|err| Error::InvalidRequest { message: err.to_string() })
}

/// `recent` is newest first.
fn improvement_trend(recent: &[RecentScore]) -> i32 {
	match (recent.first(), recent.last()) {
		(Some(newest), Some(oldest)) if recent.len() >= 2 => newest.percentage - oldest.percentage,
		_ => 0,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn recent(percentages: &[i32]) -> Vec<RecentScore> {
		percentages
			.iter()
			.map(|&percentage| RecentScore { percentage, test_date: OffsetDateTime::UNIX_EPOCH })
			.collect()
	}

	#[test]
	fn trend_is_newest_minus_oldest() {
		assert_eq!(improvement_trend(&recent(&[80, 50, 60])), 20);
		assert_eq!(improvement_trend(&recent(&[40, 90])), -50);
		assert_eq!(improvement_trend(&recent(&[70])), 0);
		assert_eq!(improvement_trend(&[]), 0);
	}

	#[test]
	fn counts_are_validated() {
		assert!(validate_counts(0, 0, 0).is_err());
		assert!(validate_counts(3, 2, 2).is_err());
		assert!(validate_counts(3, 2, 1).is_ok());
	}

	#[test]
	fn create_request_ignores_client_totals() {
		let json = serde_json::json!({
			"total_questions": 4,
			"correct_answers": 1,
			"partial_answers": 1,
			"final_score": 99.0,
			"percentage": 99,
			"details": [{ "question": "Q?", "correct": true, "partial": false }],
			"test_date": "2024-05-01T12:00:00Z"
		});
		let req: CreateScoreRequest = serde_json::from_value(json).expect("decode failed");

		assert_eq!(req.details[0].user_answer, "");
		assert!(req.details[0].source.is_none());
		assert!(req.test_date.is_some());
		assert!(req.memories_tested.is_empty());
	}

	#[test]
	fn stored_rows_with_foreign_details_still_render() {
		let score = TestScore {
			id: Uuid::nil(),
			total_questions: 1,
			correct_answers: 1,
			partial_answers: 0,
			final_score: 1.0,
			percentage: 100,
			details: serde_json::json!({ "unexpected": true }),
			memories_tested: serde_json::json!([Uuid::nil()]),
			test_date: OffsetDateTime::UNIX_EPOCH,
			created_at: OffsetDateTime::UNIX_EPOCH,
		};
		let view = TestScoreView::from(score);

		assert!(view.details.is_empty());
		assert_eq!(view.memories_tested, vec![Uuid::nil()]);
	}
}
