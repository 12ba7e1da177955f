//! Process-wide record of recently quizzed memories and recently issued questions.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
	pub used_memories: usize,
	pub recent_questions: usize,
	pub tracked_questions: usize,
}

#[derive(Debug, Default, Clone)]
pub struct UsageHistory {
	used_memories: HashMap<(Uuid, String), OffsetDateTime>,
	recent_questions: HashMap<String, OffsetDateTime>,
}
impl UsageHistory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_recently_used(&self, id: Uuid, title: &str) -> bool {
		self.used_memories.contains_key(&(id, title.to_string()))
	}

	pub fn mark_used(&mut self, id: Uuid, title: &str, now: OffsetDateTime) {
		self.used_memories.insert((id, title.to_string()), now);
	}

	/// Question texts issued at or after `now - window`.
	pub fn recent_question_texts(&self, window: Duration, now: OffsetDateTime) -> Vec<&str> {
		let cutoff = now - window;

		self.recent_questions
			.iter()
			.filter(|(_, issued_at)| **issued_at >= cutoff)
			.map(|(text, _)| text.as_str())
			.collect()
	}

	pub fn record_question(&mut self, text: &str, now: OffsetDateTime) {
		self.recent_questions.insert(text.to_string(), now);
	}

	/// Drops memory entries older than the window. Returns how many were removed.
	pub fn prune_used_memories(&mut self, window: Duration, now: OffsetDateTime) -> usize {
		let cutoff = now - window;
		let before = self.used_memories.len();

		self.used_memories.retain(|_, used_at| *used_at >= cutoff);

		before - self.used_memories.len()
	}

	/// Drops question entries older than the window. Returns how many were removed.
	pub fn prune_questions(&mut self, window: Duration, now: OffsetDateTime) -> usize {
		let cutoff = now - window;
		let before = self.recent_questions.len();

		self.recent_questions.retain(|_, issued_at| *issued_at >= cutoff);

		before - self.recent_questions.len()
	}

	pub fn prune_older_than(&mut self, window: Duration, now: OffsetDateTime) {
		self.prune_used_memories(window, now);
		self.prune_questions(window, now);
	}

	/// Drops entries for `id` recorded under a different title.
	pub fn forget_renamed(&mut self, id: Uuid, current_title: &str) {
		self.used_memories
			.retain(|(used_id, used_title), _| *used_id != id || used_title == current_title);
	}

	pub fn reset(&mut self) {
		self.used_memories.clear();
		self.recent_questions.clear();
	}

	pub fn stats(&self, window: Duration, now: OffsetDateTime) -> HistoryStats {
		HistoryStats {
			used_memories: self.used_memories.len(),
			recent_questions: self.recent_question_texts(window, now).len(),
			tracked_questions: self.recent_questions.len(),
		}
	}
}
