//! Quiz question generation.
//!
//! One model call per selected memory, a duplicate filter over this session and the last hour of
//! issued questions, rule-based fallbacks, and a single batch pass when the per-memory pass falls
//! short. Usage history is only written once the question set is final.

use std::{collections::HashSet, time::Duration as StdDuration};

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, RecallService, Result, prompts};
use recall_domain::{
	QuizMemory, fallback_question, history::UsageHistory, question_parse, selection, text,
};
use recall_providers::ollama::SamplingOptions;

pub const QUESTION_KIND: &str = "recall";
pub const GENERAL_CATEGORY: &str = "general";
/// Minimum coverage for a batch question to attach to a memory other than the first.
const BATCH_MATCH_THRESHOLD: f32 = 0.2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
	#[default]
	Model,
	Batch,
	Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
	pub text: String,
	/// The source memory's description. Grading reads it instead of resolving `memory_id`.
	#[serde(default)]
	pub context: String,
	pub memory_id: Uuid,
	#[serde(default = "default_category")]
	pub category: String,
	#[serde(rename = "type", default = "default_kind")]
	pub kind: String,
	#[serde(default)]
	pub source: QuestionSource,
}
impl Question {
	fn for_memory(memory: &QuizMemory, text: String, source: QuestionSource) -> Self {
		let category = memory
			.category
			.as_deref()
			.map(str::trim)
			.filter(|category| !category.is_empty())
			.unwrap_or(GENERAL_CATEGORY);

		Self {
			text,
			context: memory.description.clone(),
			memory_id: memory.id,
			category: category.to_string(),
			kind: QUESTION_KIND.to_string(),
			source,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenerateQuestionsRequest {
	pub memories: Vec<QuizMemory>,
	#[serde(default)]
	pub count: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryQuestionLink {
	pub question_text: String,
	pub memory_id: Uuid,
	pub memory_title: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationMetadata {
	pub total_memories: usize,
	pub selected_memories: usize,
	pub generated_questions: usize,
	pub used_memories_count: usize,
	pub categories: Vec<String>,
	pub fallback_questions: usize,
	pub batch_questions: usize,
	pub memory_question_map: Vec<MemoryQuestionLink>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerateQuestionsResponse {
	pub questions: Vec<Question>,
	pub metadata: GenerationMetadata,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionStats {
	pub used_memories_count: usize,
	pub recent_questions_count: usize,
	pub total_tracked_questions: usize,
}

#[derive(Clone, Copy, Debug)]
enum FallbackReason {
	ParseFailed,
	Duplicate,
	ProviderError,
}
impl FallbackReason {
	fn as_str(self) -> &'static str {
		match self {
			Self::ParseFailed => "parse_failed",
			Self::Duplicate => "duplicate",
			Self::ProviderError => "provider_error",
		}
	}
}

/// Questions accepted so far in one generation call.
struct Session {
	threshold: f32,
	prior: Vec<String>,
	accepted: Vec<Question>,
}
impl Session {
	fn is_duplicate(&self, candidate: &str) -> bool {
		let earlier = self
			.accepted
			.iter()
			.map(|question| question.text.as_str())
			.chain(self.prior.iter().map(String::as_str));

		text::is_duplicate_question(candidate, earlier, self.threshold)
	}

	fn has_question_for(&self, id: Uuid) -> bool {
		self.accepted.iter().any(|question| question.memory_id == id)
	}

	fn count_from(&self, source: QuestionSource) -> usize {
		self.accepted.iter().filter(|question| question.source == source).count()
	}
}

impl RecallService {
	pub async fn generate_questions(
		&self,
		req: GenerateQuestionsRequest,
	) -> Result<GenerateQuestionsResponse> {
		let count = req.count.unwrap_or(self.cfg.generation.default_count);

		validate_request(&req.memories, count, self.cfg.generation.max_count)?;

		// Generation calls run one at a time. The history lock is only taken to read and to commit.
		let _generation = self.generation_gate.lock().await;
		let window = self.history_window();
		let now = OffsetDateTime::now_utc();
		let (unique, prior) = {
			let mut history = self.history.lock().await;
			let mut rng = StdRng::from_entropy();
			let selected = selection::select_diverse(
				&req.memories,
				count as usize,
				&mut history,
				window,
				now,
				&mut rng,
			);
			let prior: Vec<String> =
				history.recent_question_texts(window, now).into_iter().map(str::to_string).collect();

			(dedupe_by_id(selected), prior)
		};
		let target = (count as usize).min(unique.len());

		tracing::info!(
			total = req.memories.len(),
			selected = unique.len(),
			requested = count,
			"Selected memories for quiz."
		);

		let mut session = Session {
			threshold: self.cfg.generation.duplicate_threshold,
			prior,
			accepted: Vec::with_capacity(target),
		};

		self.run_per_memory_pass(&unique, target, &mut session).await;

		if session.accepted.len() < target {
			self.run_batch_pass(&unique, target, &mut session).await;
		}
		if session.accepted.is_empty() {
			return Err(Error::Exhausted {
				message: "No questions could be generated for the selected memories.".to_string(),
			});
		}

		let committed_at = OffsetDateTime::now_utc();
		let used_memories_count = {
			let mut history = self.history.lock().await;

			commit_history(&mut history, &unique, &session.accepted, committed_at);

			history.stats(window, committed_at).used_memories
		};

		let metadata = GenerationMetadata {
			total_memories: req.memories.len(),
			selected_memories: unique.len(),
			generated_questions: session.accepted.len(),
			used_memories_count,
			categories: distinct_categories(&unique),
			fallback_questions: session.count_from(QuestionSource::Fallback),
			batch_questions: session.count_from(QuestionSource::Batch),
			memory_question_map: link_questions(&session.accepted, &unique),
		};

		Ok(GenerateQuestionsResponse { questions: session.accepted, metadata })
	}

	pub async fn reset_question_history(&self) {
		self.history.lock().await.reset();

		tracing::info!("Question history reset.");
	}

	pub async fn question_stats(&self) -> QuestionStats {
		let stats =
			self.history.lock().await.stats(self.history_window(), OffsetDateTime::now_utc());

		QuestionStats {
			used_memories_count: stats.used_memories,
			recent_questions_count: stats.recent_questions,
			total_tracked_questions: stats.tracked_questions,
		}
	}

	fn history_window(&self) -> Duration {
		Duration::seconds(i64::try_from(self.cfg.generation.history_window_secs).unwrap_or(i64::MAX))
	}

	fn generation_options(&self) -> SamplingOptions {
		let generation = &self.cfg.generation;

		SamplingOptions {
			temperature: generation.temperature,
			top_p: generation.top_p,
			max_tokens: generation.max_tokens,
			stop: Vec::new(),
		}
	}

	async fn run_per_memory_pass(
		&self,
		memories: &[&QuizMemory],
		target: usize,
		session: &mut Session,
	) {
		let options = self.generation_options();
		let delay = StdDuration::from_millis(self.cfg.generation.inter_call_delay_ms);

		for (idx, &memory) in memories.iter().enumerate() {
			if session.accepted.len() >= target {
				break;
			}
			if idx > 0 && !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}

			let outcome = match self.complete(&prompts::question_prompt(memory), &options).await {
				Ok(response) => match question_parse::parse_single_question(&response) {
					Some(text) if session.is_duplicate(&text) => Err(FallbackReason::Duplicate),
					Some(text) => Ok(text),
					None => Err(FallbackReason::ParseFailed),
				},
				Err(err) => {
					tracing::warn!(
						memory_id = %memory.id,
						code = err.code(),
						error = %err,
						"Question generation call failed."
					);

					Err(FallbackReason::ProviderError)
				},
			};

			match outcome {
				Ok(text) => {
					session.accepted.push(Question::for_memory(memory, text, QuestionSource::Model))
				},
				Err(reason) => accept_fallback(memory, reason, session),
			}
		}
	}

	/// One numbered-list request covering every memory still without a question.
	async fn run_batch_pass(&self, memories: &[&QuizMemory], target: usize, session: &mut Session) {
		let remaining: Vec<&QuizMemory> =
			memories.iter().copied().filter(|memory| !session.has_question_for(memory.id)).collect();
		let Some(&first) = remaining.first() else {
			return;
		};
		let wanted = target - session.accepted.len();
		let prompt = prompts::batch_prompt(&remaining, wanted);
		let response = match self.complete(&prompt, &self.generation_options()).await {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(code = err.code(), error = %err, "Batch question call failed.");

				return;
			},
		};
		let mut added = 0;

		for text in question_parse::parse_numbered_questions(&response) {
			if session.accepted.len() >= target {
				break;
			}
			if session.is_duplicate(&text) {
				continue;
			}

			let memory = best_matching_memory(&text, &remaining).unwrap_or(first);

			session.accepted.push(Question::for_memory(memory, text, QuestionSource::Batch));

			added += 1;
		}

		tracing::info!(wanted, added, "Batch question pass finished.");
	}
}

fn validate_request(memories: &[QuizMemory], count: u32, max_count: u32) -> Result<()> {
	if memories.is_empty() {
		return Err(Error::InvalidRequest { message: "memories must not be empty.".to_string() });
	}
	if count == 0 || count > max_count {
		return Err(Error::InvalidRequest {
			message: format!("count must be between 1 and {max_count}."),
		});
	}
	if memories.iter().any(|memory| memory.title.trim().is_empty()) {
		return Err(Error::InvalidRequest {
			message: "Every memory must have a non-empty title.".to_string(),
		});
	}

	Ok(())
}

fn accept_fallback(memory: &QuizMemory, reason: FallbackReason, session: &mut Session) {
	let candidates = fallback_question::fallback_candidates(&memory.title, &memory.description);
	let Some(text) = candidates.into_iter().find(|candidate| !session.is_duplicate(candidate)) else {
		tracing::warn!(
			memory_id = %memory.id,
			reason = reason.as_str(),
			"Every fallback question duplicates an earlier one."
		);

		return;
	};

	tracing::info!(
		memory_id = %memory.id,
		reason = reason.as_str(),
		question = text,
		"Using fallback question."
	);

	session.accepted.push(Question::for_memory(memory, text.to_string(), QuestionSource::Fallback));
}

fn dedupe_by_id(selected: Vec<&QuizMemory>) -> Vec<&QuizMemory> {
	let mut seen = HashSet::new();

	selected.into_iter().filter(|memory| seen.insert(memory.id)).collect()
}

/// The memory whose text best covers `question`, if any clears the match threshold.
fn best_matching_memory<'a>(question: &str, memories: &[&'a QuizMemory]) -> Option<&'a QuizMemory> {
	let mut best: Option<(&QuizMemory, f32)> = None;

	for &memory in memories {
		let score = text::question_coverage(question, &memory.combined_text());

		if score > BATCH_MATCH_THRESHOLD && best.is_none_or(|(_, best_score)| score > best_score) {
			best = Some((memory, score));
		}
	}

	best.map(|(memory, _)| memory)
}

fn commit_history(
	history: &mut UsageHistory,
	memories: &[&QuizMemory],
	questions: &[Question],
	now: OffsetDateTime,
) {
	for memory in memories {
		history.mark_used(memory.id, &memory.title, now);
	}
	for question in questions {
		history.record_question(&question.text, now);
	}
}

fn distinct_categories(memories: &[&QuizMemory]) -> Vec<String> {
	let mut categories: Vec<String> = Vec::new();

	for memory in memories {
		let key = memory.category_key();

		if !categories.iter().any(|category| category == key) {
			categories.push(key.to_string());
		}
	}

	categories
}

fn link_questions(questions: &[Question], memories: &[&QuizMemory]) -> Vec<MemoryQuestionLink> {
	questions
		.iter()
		.map(|question| MemoryQuestionLink {
			question_text: question.text.clone(),
			memory_id: question.memory_id,
			memory_title: memories
				.iter()
				.find(|memory| memory.id == question.memory_id)
				.map(|memory| memory.title.clone())
				.unwrap_or_default(),
		})
		.collect()
}

fn default_category() -> String {
	GENERAL_CATEGORY.to_string()
}

fn default_kind() -> String {
	QUESTION_KIND.to_string()
}
