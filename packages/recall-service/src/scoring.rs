//! Strict answer scoring: one batched model call, tolerant parsing, local overrides, and a per-pair
//! heuristic grader whenever the model verdict is unusable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
	Error, Question, RecallService, Result,
	prompts::{self, GradingPair},
};
use recall_domain::grading::{self, Grade, Verdict};
use recall_providers::ollama::SamplingOptions;

const RESULTS_KEY_TYPOS: &[&str] = &["\"reresults\":", "\"ressults\":"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
	Model,
	Heuristic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSource {
	Model,
	Heuristic,
	Mixed,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScoreAnswersRequest {
	pub questions: Vec<Question>,
	/// Positional. Missing or null entries count as empty answers.
	#[serde(default)]
	pub answers: Vec<Option<String>>,
}

/// One graded question. The same shape is persisted in a test score's `details`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
	pub question: String,
	#[serde(default)]
	pub user_answer: String,
	pub correct: bool,
	pub partial: bool,
	#[serde(default)]
	pub reasoning: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<ScoreSource>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreSummary {
	pub total_questions: u32,
	pub correct_answers: u32,
	pub partial_answers: u32,
	pub final_score: f64,
	pub percentage: u32,
	pub details: Vec<ScoreDetail>,
	/// Distinct memory ids in question order.
	pub memories_tested: Vec<Uuid>,
	pub scoring_source: ScoringSource,
}

/// A model verdict as parsed, before it is matched to a pair.
#[derive(Clone, Debug, PartialEq)]
struct ParsedVerdict {
	index: Option<usize>,
	verdict: Option<Verdict>,
	reasoning: String,
}

impl RecallService {
	pub async fn score_answers(&self, req: ScoreAnswersRequest) -> Result<ScoreSummary> {
		if req.questions.is_empty() {
			return Err(Error::InvalidRequest { message: "questions must not be empty.".to_string() });
		}

		let answers: Vec<&str> = (0..req.questions.len())
			.map(|idx| req.answers.get(idx).and_then(|answer| answer.as_deref()).unwrap_or(""))
			.collect();
		let pairs: Vec<GradingPair<'_>> = req
			.questions
			.iter()
			.zip(answers.iter().copied())
			.map(|(question, answer)| GradingPair {
				question: &question.text,
				answer,
				context: &question.context,
			})
			.collect();
		let model_grades = self.model_grades(&pairs).await;
		let details: Vec<ScoreDetail> = pairs
			.iter()
			.zip(model_grades)
			.map(|(pair, model_grade)| grade_pair(pair, model_grade))
			.collect();
		let summary = summarize(&req.questions, details);

		tracing::info!(
			total = summary.total_questions,
			correct = summary.correct_answers,
			partial = summary.partial_answers,
			scoring_source = ?summary.scoring_source,
			"Scored answers."
		);

		Ok(summary)
	}

	/// Model verdicts aligned to `pairs`. `None` marks a pair the model gave nothing usable for.
	async fn model_grades(&self, pairs: &[GradingPair<'_>]) -> Vec<Option<Grade>> {
		let scoring = &self.cfg.scoring;
		let options = SamplingOptions {
			temperature: scoring.temperature,
			top_p: scoring.top_p,
			max_tokens: scoring.max_tokens,
			stop: Vec::new(),
		};
		let response = match self.complete(&prompts::scoring_prompt(pairs), &options).await {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(
					code = err.code(),
					error = %err,
					"Scoring call failed. Using heuristic grader."
				);

				return vec![None; pairs.len()];
			},
		};

		match parse_scoring_response(&response) {
			Some(parsed) => align_verdicts(parsed, pairs.len()),
			None => {
				tracing::warn!("Scoring response was not parseable. Using heuristic grader.");

				vec![None; pairs.len()]
			},
		}
	}
}

/// Parses `{"results":[{"questionIndex","score","reasoning"}]}` out of free text.
fn parse_scoring_response(response: &str) -> Option<Vec<ParsedVerdict>> {
	let start = response.find('{')?;
	let end = response.rfind('}')?;

	if end < start {
		return None;
	}

	let mut json_text = response[start..=end].to_string();

	for typo in RESULTS_KEY_TYPOS {
		json_text = json_text.replace(typo, "\"results\":");
	}

	let json: Value = serde_json::from_str(&json_text).ok()?;
	let results = json.get("results")?.as_array()?;

	Some(
		results
			.iter()
			.map(|item| ParsedVerdict {
				index: item
					.get("questionIndex")
					.or_else(|| item.get("question_index"))
					.and_then(Value::as_u64)
					.and_then(|idx| usize::try_from(idx).ok()),
				verdict: item.get("score").and_then(Value::as_str).and_then(|raw| raw.parse().ok()),
				reasoning: item
					.get("reasoning")
					.and_then(Value::as_str)
					.unwrap_or_default()
					.trim()
					.to_string(),
			})
			.collect(),
	)
}

/// Places parsed verdicts by `questionIndex`, or by position when the index is absent. The first
/// usable verdict for a slot wins.
fn align_verdicts(parsed: Vec<ParsedVerdict>, len: usize) -> Vec<Option<Grade>> {
	let mut slots = vec![None; len];

	for (position, item) in parsed.into_iter().enumerate() {
		let idx = item.index.unwrap_or(position);
		let Some(verdict) = item.verdict else { continue };

		if let Some(slot) = slots.get_mut(idx)
			&& slot.is_none()
		{
			*slot = Some(Grade::new(verdict, item.reasoning));
		}
	}

	slots
}

fn grade_pair(pair: &GradingPair<'_>, model_grade: Option<Grade>) -> ScoreDetail {
	let (grade, source) = match model_grade {
		Some(grade) => (grading::apply_overrides(grade, pair.context, pair.answer), ScoreSource::Model),
		None => (grading::heuristic_grade(pair.context, pair.answer), ScoreSource::Heuristic),
	};

	ScoreDetail {
		question: pair.question.to_string(),
		user_answer: pair.answer.to_string(),
		correct: grade.verdict == Verdict::Correct,
		partial: grade.verdict == Verdict::Partial,
		reasoning: grade.reasoning,
		source: Some(source),
	}
}

fn summarize(questions: &[Question], details: Vec<ScoreDetail>) -> ScoreSummary {
	let total = details.len() as u32;
	let correct = details.iter().filter(|detail| detail.correct).count() as u32;
	let partial = details.iter().filter(|detail| detail.partial).count() as u32;
	let from_model = details.iter().filter(|detail| detail.source == Some(ScoreSource::Model)).count();
	let scoring_source = match from_model {
		0 => ScoringSource::Heuristic,
		n if n == details.len() => ScoringSource::Model,
		_ => ScoringSource::Mixed,
	};
	let mut memories_tested = Vec::new();

	for question in questions {
		if !memories_tested.contains(&question.memory_id) {
			memories_tested.push(question.memory_id);
		}
	}

	ScoreSummary {
		total_questions: total,
		correct_answers: correct,
		partial_answers: partial,
		final_score: grading::final_score(correct, partial),
		percentage: grading::percentage(correct, partial, total),
		details,
		memories_tested,
		scoring_source,
	}
}
