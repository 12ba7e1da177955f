use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Memory {
	pub id: Uuid,
	pub title: String,
	pub description: String,
	pub category: Option<String>,
	pub photo_path: Option<String>,
	/// JSON array text.
	pub tags: String,
	pub location: Option<String>,
	pub date_logged: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl Memory {
	/// Decoded tags. Text that is not a JSON string array reads as no tags.
	pub fn tag_list(&self) -> Vec<String> {
		serde_json::from_str(&self.tags).unwrap_or_default()
	}

	pub fn encode_tags(tags: &[String]) -> String {
		serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExtractedFact {
	pub id: Uuid,
	pub memory_id: Uuid,
	pub fact_text: String,
	pub confidence_score: f32,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TestScore {
	pub id: Uuid,
	pub total_questions: i32,
	pub correct_answers: i32,
	pub partial_answers: i32,
	pub final_score: f64,
	pub percentage: i32,
	/// JSON array of per-question detail objects, in question order.
	pub details: Value,
	/// JSON array of memory ids.
	pub memories_tested: Value,
	pub test_date: OffsetDateTime,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryCount {
	pub category: String,
	pub count: i64,
}

#[derive(Debug, Clone)]
pub struct MemoryStats {
	pub total: i64,
	pub by_category: Vec<CategoryCount>,
	pub this_week: i64,
}

/// Aggregates over every stored test. Averages and extremes are `None` when no tests exist.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreAggregate {
	pub total_tests: i64,
	pub average_score: Option<f64>,
	pub best_score: Option<i32>,
	pub worst_score: Option<i32>,
	pub average_final_score: Option<f64>,
	pub total_correct: i64,
	pub total_questions_answered: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecentScore {
	pub percentage: i32,
	pub test_date: OffsetDateTime,
}
