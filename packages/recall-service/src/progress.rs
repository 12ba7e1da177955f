//! Coach feedback over the most recent tests.

use regex::Regex;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{RecallService, Result};
use recall_providers::ollama::SamplingOptions;
use recall_storage::{models::TestScore, queries};

pub const NO_TESTS_FEEDBACK: &str = "I notice you haven't taken any memory tests yet! Take a few \
	tests first, and I'll be able to provide personalized insights about your memory performance \
	and suggest ways to improve.";

/// Applied in order to model output.
const CLEANUP_RULES: &[(&str, &str)] = &[
	(r"(?i)^(?:As a|I am a|You are).*?analysis[:\s]*", ""),
	(r"(?i)^\s*(?:AI\s+)?FEEDBACK:\s*", ""),
	(r"\*\*(.*?)\*\*", "$1"),
	(r"\*(.*?)\*", "$1"),
	(r"#+\s*", ""),
	(r"\n\s*\n\s*\n+", "\n\n"),
];

#[derive(Clone, Debug, Serialize)]
pub struct FeedbackTest {
	pub id: Uuid,
	#[serde(with = "crate::time_serde")]
	pub test_date: OffsetDateTime,
	pub correct_answers: i32,
	pub total_questions: i32,
	pub percentage: i32,
}
impl From<&TestScore> for FeedbackTest {
	fn from(score: &TestScore) -> Self {
		Self {
			id: score.id,
			test_date: score.test_date,
			correct_answers: score.correct_answers,
			total_questions: score.total_questions,
			percentage: score.percentage,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct CoachFeedback {
	pub feedback: String,
	pub using_ai: bool,
	/// Provider error code when the fallback text was used.
	pub error: Option<String>,
	/// Chronological.
	pub test_results: Vec<FeedbackTest>,
}

impl RecallService {
	pub async fn coach_feedback(&self) -> Result<CoachFeedback> {
		let limit = i64::from(self.cfg.feedback.recent_tests);
		let mut scores = queries::latest_test_scores(&self.db, limit).await?;

		scores.reverse();

		let test_results: Vec<FeedbackTest> = scores.iter().map(FeedbackTest::from).collect();

		if test_results.is_empty() {
			return Ok(CoachFeedback {
				feedback: NO_TESTS_FEEDBACK.to_string(),
				using_ai: false,
				error: None,
				test_results,
			});
		}

		let percentages: Vec<i32> = test_results.iter().map(|test| test.percentage).collect();

		match self.model_feedback(&percentages).await {
			Ok(feedback) => Ok(CoachFeedback { feedback, using_ai: true, error: None, test_results }),
			Err(err) => {
				tracing::warn!(code = err.code(), error = %err, "Coach feedback fell back to template.");

				Ok(CoachFeedback {
					feedback: fallback_feedback(&percentages),
					using_ai: false,
					error: Some(err.code().to_string()),
					test_results,
				})
			},
		}
	}

	async fn model_feedback(&self, percentages: &[i32]) -> recall_providers::Result<String> {
		self.ensure_model().await?;

		let feedback = &self.cfg.feedback;
		let options = SamplingOptions {
			temperature: feedback.temperature,
			top_p: feedback.top_p,
			max_tokens: feedback.max_tokens,
			stop: feedback.stop.clone(),
		};
		let prompt = crate::prompts::feedback_prompt(
			percentages,
			average_percentage(percentages),
			trend_label(percentages),
		);
		let cleaned = clean_feedback(&self.complete(&prompt, &options).await?);

		if cleaned.is_empty() {
			return Err(recall_providers::Error::EmptyResponse);
		}

		Ok(cleaned)
	}
}

/// Mean rounded half up. Zero for no scores.
pub fn average_percentage(percentages: &[i32]) -> i32 {
	if percentages.is_empty() {
		return 0;
	}

	let sum: i64 = percentages.iter().map(|&p| i64::from(p)).sum();
	let len = percentages.len() as i64;

	((2 * sum + len).div_euclid(2 * len)) as i32
}

/// `improving` when the latest score beats the first, `stable` otherwise.
pub fn trend_label(percentages: &[i32]) -> &'static str {
	match (percentages.first(), percentages.last()) {
		(Some(first), Some(last)) if percentages.len() > 1 && last > first => "improving",
		_ => "stable",
	}
}

/// Strips role preambles, feedback labels and markdown emphasis or headers from model output.
pub fn clean_feedback(raw: &str) -> String {
	let mut text = raw.to_string();

	for (pattern, replacement) in CLEANUP_RULES {
		if let Ok(re) = Regex::new(pattern) {
			text = re.replace_all(&text, *replacement).into_owned();
		}
	}

	text.trim().to_string()
}

/// Deterministic feedback tiered by average score.
pub fn fallback_feedback(percentages: &[i32]) -> String {
	let average = average_percentage(percentages);
	let best = percentages.iter().copied().max().unwrap_or_default();
	let latest = percentages.last().copied().unwrap_or_default();
	let body = if average >= 85 {
		format!(
			"Your average score of {average}% shows excellent memory performance, and your best \
			 result of {best}% shows what you can do at your peak.\n\n\
			 To keep it that way:\n\n\
			 1. Keep testing regularly, since the routine is clearly working.\n\
			 2. Add variety with new kinds of memory exercises.\n\
			 3. Protect the sleep, exercise and social time that support your memory.\n\n\
			 Your latest score was {latest}%. Keep up the wonderful work!"
		)
	} else if average >= 70 {
		format!(
			"Your average score of {average}% shows good memory performance with room to grow, and \
			 your best result of {best}% shows what you can reach.\n\n\
			 Some ideas to build on it:\n\n\
			 1. Take tests when you feel alert and the room is quiet.\n\
			 2. Try visualization or association when you log a memory.\n\
			 3. Keep regular sleep and exercise, which both help recall.\n\n\
			 Your latest score was {latest}%. Small, steady steps add up."
		)
	} else {
		format!(
			"Your average score is {average}%, and every test you take builds a clearer picture of \
			 your memory. Your best result of {best}% is a real achievement to build on.\n\n\
			 Some gentle ideas to try:\n\n\
			 1. Add a few details to each memory you log, like who was there and where.\n\
			 2. Review a handful of memories each day before testing.\n\
			 3. Keep a calm daily routine with good rest.\n\n\
			 Your latest score was {latest}%. Be patient with yourself and keep going."
		)
	};

	format!("Great work on staying consistent with your memory testing! {body}")
}
