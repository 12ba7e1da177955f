use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{
		CategoryCount, ExtractedFact, Memory, MemoryStats, RecentScore, ScoreAggregate, TestScore,
	},
};

const MEMORY_COLUMNS: &str = "\
id,
	title,
	description,
	category,
	photo_path,
	tags,
	location,
	date_logged,
	updated_at";
const TEST_SCORE_COLUMNS: &str = "\
id,
	total_questions,
	correct_answers,
	partial_answers,
	final_score,
	percentage,
	details,
	memories_tested,
	test_date,
	created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
	Asc,
	#[default]
	Desc,
}
impl SortOrder {
	pub fn as_sql(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_uppercase().as_str() {
			"ASC" => Some(Self::Asc),
			"DESC" => Some(Self::Desc),
			_ => None,
		}
	}
}

/// Filters combine with AND. `search` matches title or description by substring.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
	pub category: Option<String>,
	pub search: Option<String>,
	pub date_from: Option<OffsetDateTime>,
	pub date_to: Option<OffsetDateTime>,
	pub limit: Option<i64>,
}

pub async fn insert_memory(db: &Db, memory: &Memory) -> Result<Memory> {
	let sql = format!(
		"\
INSERT INTO memories (
	{MEMORY_COLUMNS}
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
RETURNING
	{MEMORY_COLUMNS}"
	);
	let row = sqlx::query_as::<_, Memory>(&sql)
		.bind(memory.id)
		.bind(memory.title.as_str())
		.bind(memory.description.as_str())
		.bind(memory.category.as_deref())
		.bind(memory.photo_path.as_deref())
		.bind(memory.tags.as_str())
		.bind(memory.location.as_deref())
		.bind(memory.date_logged)
		.bind(memory.updated_at)
		.fetch_one(&db.pool)
		.await?;

	Ok(row)
}

pub async fn get_memory(db: &Db, id: Uuid) -> Result<Option<Memory>> {
	let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = $1");
	let row = sqlx::query_as::<_, Memory>(&sql).bind(id).fetch_optional(&db.pool).await?;

	Ok(row)
}

pub async fn list_memories(db: &Db, filter: &MemoryFilter) -> Result<Vec<Memory>> {
	let mut builder: QueryBuilder<Postgres> =
		QueryBuilder::new(format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE TRUE"));

	if let Some(category) = filter.category.as_deref() {
		builder.push(" AND category = ").push_bind(category.to_string());
	}
	if let Some(search) = filter.search.as_deref() {
		let pattern = format!("%{}%", escape_like(search));

		builder
			.push(" AND (title ILIKE ")
			.push_bind(pattern.clone())
			.push(" OR description ILIKE ")
			.push_bind(pattern)
			.push(")");
	}
	if let Some(date_from) = filter.date_from {
		builder.push(" AND date_logged >= ").push_bind(date_from);
	}
	if let Some(date_to) = filter.date_to {
		builder.push(" AND date_logged <= ").push_bind(date_to);
	}

	builder.push(" ORDER BY date_logged DESC, id");

	if let Some(limit) = filter.limit {
		if limit <= 0 {
			return Err(Error::InvalidArgument("limit must be greater than zero.".to_string()));
		}

		builder.push(" LIMIT ").push_bind(limit);
	}

	let rows = builder.build_query_as::<Memory>().fetch_all(&db.pool).await?;

	Ok(rows)
}

/// Writes every mutable column. Returns `None` when the memory does not exist.
pub async fn update_memory(db: &Db, memory: &Memory) -> Result<Option<Memory>> {
	let sql = format!(
		"\
UPDATE memories
SET
	title = $1,
	description = $2,
	category = $3,
	photo_path = $4,
	tags = $5,
	location = $6,
	updated_at = $7
WHERE id = $8
RETURNING
	{MEMORY_COLUMNS}"
	);
	let row = sqlx::query_as::<_, Memory>(&sql)
		.bind(memory.title.as_str())
		.bind(memory.description.as_str())
		.bind(memory.category.as_deref())
		.bind(memory.photo_path.as_deref())
		.bind(memory.tags.as_str())
		.bind(memory.location.as_deref())
		.bind(memory.updated_at)
		.bind(memory.id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

/// Deletes the memory and its extracted facts together. Returns whether the memory existed.
pub async fn delete_memory(db: &Db, id: Uuid) -> Result<bool> {
	let mut tx = db.pool.begin().await?;

	sqlx::query("DELETE FROM extracted_facts WHERE memory_id = $1")
		.bind(id)
		.execute(&mut *tx)
		.await?;

	let deleted =
		sqlx::query("DELETE FROM memories WHERE id = $1").bind(id).execute(&mut *tx).await?;

	tx.commit().await?;

	Ok(deleted.rows_affected() > 0)
}

pub async fn memory_stats(db: &Db, week_start: OffsetDateTime) -> Result<MemoryStats> {
	let total: i64 = sqlx::query_scalar("SELECT count(*) FROM memories").fetch_one(&db.pool).await?;
	let by_category = sqlx::query_as::<_, CategoryCount>(
		"\
SELECT category, count(*) AS count
FROM memories
WHERE category IS NOT NULL
GROUP BY category
ORDER BY count DESC, category",
	)
	.fetch_all(&db.pool)
	.await?;
	let this_week: i64 = sqlx::query_scalar("SELECT count(*) FROM memories WHERE date_logged >= $1")
		.bind(week_start)
		.fetch_one(&db.pool)
		.await?;

	Ok(MemoryStats { total, by_category, this_week })
}

pub async fn insert_fact(db: &Db, fact: &ExtractedFact) -> Result<ExtractedFact> {
	if !(0.0..=1.0).contains(&fact.confidence_score) {
		return Err(Error::InvalidArgument(
			"confidence_score must be in the range 0.0-1.0.".to_string(),
		));
	}

	let row = sqlx::query_as::<_, ExtractedFact>(
		"\
INSERT INTO extracted_facts (id, memory_id, fact_text, confidence_score, created_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING id, memory_id, fact_text, confidence_score, created_at",
	)
	.bind(fact.id)
	.bind(fact.memory_id)
	.bind(fact.fact_text.as_str())
	.bind(fact.confidence_score)
	.bind(fact.created_at)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

/// Newest first.
pub async fn list_facts(db: &Db, memory_id: Uuid) -> Result<Vec<ExtractedFact>> {
	let rows = sqlx::query_as::<_, ExtractedFact>(
		"\
SELECT id, memory_id, fact_text, confidence_score, created_at
FROM extracted_facts
WHERE memory_id = $1
ORDER BY created_at DESC, id",
	)
	.bind(memory_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn insert_test_score(db: &Db, score: &TestScore) -> Result<TestScore> {
	let sql = format!(
		"\
INSERT INTO test_scores (
	{TEST_SCORE_COLUMNS}
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
RETURNING
	{TEST_SCORE_COLUMNS}"
	);
	let row = sqlx::query_as::<_, TestScore>(&sql)
		.bind(score.id)
		.bind(score.total_questions)
		.bind(score.correct_answers)
		.bind(score.partial_answers)
		.bind(score.final_score)
		.bind(score.percentage)
		.bind(&score.details)
		.bind(&score.memories_tested)
		.bind(score.test_date)
		.bind(score.created_at)
		.fetch_one(&db.pool)
		.await?;

	Ok(row)
}

pub async fn get_test_score(db: &Db, id: Uuid) -> Result<Option<TestScore>> {
	let sql = format!("SELECT {TEST_SCORE_COLUMNS} FROM test_scores WHERE id = $1");
	let row = sqlx::query_as::<_, TestScore>(&sql).bind(id).fetch_optional(&db.pool).await?;

	Ok(row)
}

pub async fn list_test_scores(
	db: &Db,
	limit: i64,
	offset: i64,
	order: SortOrder,
) -> Result<Vec<TestScore>> {
	if limit <= 0 || offset < 0 {
		return Err(Error::InvalidArgument(
			"limit must be positive and offset must not be negative.".to_string(),
		));
	}

	let direction = order.as_sql();
	let sql = format!(
		"\
SELECT {TEST_SCORE_COLUMNS}
FROM test_scores
ORDER BY created_at {direction}, id {direction}
LIMIT $1 OFFSET $2"
	);
	let rows = sqlx::query_as::<_, TestScore>(&sql)
		.bind(limit)
		.bind(offset)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn count_test_scores(db: &Db) -> Result<i64> {
	let total: i64 =
		sqlx::query_scalar("SELECT count(*) FROM test_scores").fetch_one(&db.pool).await?;

	Ok(total)
}

pub async fn score_aggregate(db: &Db) -> Result<ScoreAggregate> {
	let row = sqlx::query_as::<_, ScoreAggregate>(
		"\
SELECT
	count(*) AS total_tests,
	avg(percentage)::float8 AS average_score,
	max(percentage) AS best_score,
	min(percentage) AS worst_score,
	avg(final_score)::float8 AS average_final_score,
	COALESCE(sum(correct_answers), 0)::int8 AS total_correct,
	COALESCE(sum(total_questions), 0)::int8 AS total_questions_answered
FROM test_scores",
	)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

/// Newest first.
pub async fn recent_scores(db: &Db, limit: i64) -> Result<Vec<RecentScore>> {
	let rows = sqlx::query_as::<_, RecentScore>(
		"\
SELECT percentage, test_date
FROM test_scores
ORDER BY created_at DESC, id DESC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// The `limit` most recently taken tests by `test_date`, newest first.
pub async fn latest_test_scores(db: &Db, limit: i64) -> Result<Vec<TestScore>> {
	if limit <= 0 {
		return Err(Error::InvalidArgument("limit must be greater than zero.".to_string()));
	}

	let sql = format!(
		"\
SELECT {TEST_SCORE_COLUMNS}
FROM test_scores
ORDER BY test_date DESC, id DESC
LIMIT $1"
	);
	let rows = sqlx::query_as::<_, TestScore>(&sql).bind(limit).fetch_all(&db.pool).await?;

	Ok(rows)
}

/// Escapes `LIKE` wildcards so user text matches literally.
pub fn escape_like(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '\\' | '%' | '_') {
			escaped.push('\\');
		}

		escaped.push(ch);
	}

	escaped
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn like_wildcards_are_escaped() {
		assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
		assert_eq!(escape_like("beach"), "beach");
	}

	#[test]
	fn sort_order_parses_case_insensitively() {
		assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
		assert_eq!(SortOrder::parse(" DESC "), Some(SortOrder::Desc));
		assert_eq!(SortOrder::parse("sideways"), None);
		assert_eq!(SortOrder::default().as_sql(), "DESC");
	}
}
