pub mod fallback_question;
pub mod family;
pub mod grading;
pub mod history;
pub mod question_parse;
pub mod selection;
pub mod text;
pub mod upload;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category key used when a memory carries no category.
pub const UNCATEGORIZED: &str = "other";

/// The slice of a memory the quiz pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizMemory {
	pub id: Uuid,
	pub title: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub category: Option<String>,
}
impl QuizMemory {
	pub fn category_key(&self) -> &str {
		match self.category.as_deref().map(str::trim) {
			Some(category) if !category.is_empty() => category,
			_ => UNCATEGORIZED,
		}
	}

	/// Title and description joined the way prompts and keyword rules read them.
	pub fn combined_text(&self) -> String {
		format!("{} {}", self.title, self.description)
	}
}
