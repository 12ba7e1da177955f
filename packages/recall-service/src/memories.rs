use serde::{Deserialize, Serialize};
use time::{
	Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};
use uuid::Uuid;

use crate::{Error, PhotoUpload, RecallService, Result};
use recall_storage::{
	models::{ExtractedFact, Memory},
	queries::{self, MemoryFilter},
};

pub const DEFAULT_FACT_CONFIDENCE: f32 = 0.8;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryView {
	pub id: Uuid,
	pub title: String,
	pub description: String,
	pub category: Option<String>,
	pub photo_path: Option<String>,
	pub tags: Vec<String>,
	pub location: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub date_logged: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl From<Memory> for MemoryView {
	fn from(memory: Memory) -> Self {
		let tags = memory.tag_list();

		Self {
			id: memory.id,
			title: memory.title,
			description: memory.description,
			category: memory.category,
			photo_path: memory.photo_path,
			tags,
			location: memory.location,
			date_logged: memory.date_logged,
			updated_at: memory.updated_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FactView {
	pub id: Uuid,
	pub memory_id: Uuid,
	pub fact_text: String,
	pub confidence_score: f32,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<ExtractedFact> for FactView {
	fn from(fact: ExtractedFact) -> Self {
		Self {
			id: fact.id,
			memory_id: fact.memory_id,
			fact_text: fact.fact_text,
			confidence_score: fact.confidence_score,
			created_at: fact.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryDetail {
	#[serde(flatten)]
	pub memory: MemoryView,
	pub extracted_facts: Vec<FactView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryList {
	pub items: Vec<MemoryView>,
	pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryCountView {
	pub category: String,
	pub count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryStatsView {
	pub total: i64,
	pub by_category: Vec<CategoryCountView>,
	pub this_week: i64,
}

/// Query-string filters. Blank values are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListMemoriesQuery {
	pub category: Option<String>,
	pub search: Option<String>,
	/// RFC 3339 timestamp or `YYYY-MM-DD`.
	#[serde(alias = "dateFrom")]
	pub date_from: Option<String>,
	/// RFC 3339 timestamp or `YYYY-MM-DD`. A plain date includes the whole day.
	#[serde(alias = "dateTo")]
	pub date_to: Option<String>,
	pub limit: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct NewMemory {
	pub title: String,
	pub description: Option<String>,
	pub category: Option<String>,
	pub tags: Vec<String>,
	pub location: Option<String>,
	pub photo: Option<PhotoUpload>,
}

/// Fields left `None` keep their stored value.
#[derive(Clone, Debug, Default)]
pub struct MemoryPatch {
	pub title: Option<String>,
	pub description: Option<String>,
	pub category: Option<String>,
	pub tags: Option<Vec<String>>,
	pub location: Option<String>,
	pub photo: Option<PhotoUpload>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewFact {
	pub fact_text: String,
	#[serde(default)]
	pub confidence_score: Option<f32>,
}

#[derive(Clone, Copy)]
enum DayBound {
	Start,
	End,
}

impl RecallService {
	pub async fn create_memory(&self, new: NewMemory) -> Result<MemoryView> {
		let title = required_title(&new.title)?;
		let photo_path = match new.photo.as_ref() {
			Some(photo) => Some(self.store_photo(photo).await?),
			None => None,
		};
		let now = OffsetDateTime::now_utc();
		let memory = Memory {
			id: Uuid::new_v4(),
			title,
			description: new.description.unwrap_or_default().trim().to_string(),
			category: non_blank(new.category),
			photo_path,
			tags: Memory::encode_tags(&clean_tags(new.tags)),
			location: non_blank(new.location),
			date_logged: now,
			updated_at: now,
		};

		match queries::insert_memory(&self.db, &memory).await {
			Ok(stored) => {
				tracing::info!(memory_id = %stored.id, "Memory created.");

				Ok(stored.into())
			},
			Err(err) => {
				if let Some(path) = memory.photo_path.as_deref() {
					self.remove_photo(path).await;
				}

				Err(err.into())
			},
		}
	}

	pub async fn get_memory(&self, id: Uuid) -> Result<MemoryDetail> {
		let memory = self.load_memory(id).await?;
		let facts = queries::list_facts(&self.db, id).await?;

		Ok(MemoryDetail {
			memory: memory.into(),
			extracted_facts: facts.into_iter().map(FactView::from).collect(),
		})
	}

	pub async fn list_memories(&self, query: ListMemoriesQuery) -> Result<MemoryList> {
		let filter = MemoryFilter {
			category: non_blank(query.category),
			search: non_blank(query.search),
			date_from: non_blank(query.date_from)
				.map(|raw| parse_date_bound("date_from", &raw, DayBound::Start))
				.transpose()?,
			date_to: non_blank(query.date_to)
				.map(|raw| parse_date_bound("date_to", &raw, DayBound::End))
				.transpose()?,
			limit: query.limit,
		};
		let items: Vec<MemoryView> = queries::list_memories(&self.db, &filter)
			.await?
			.into_iter()
			.map(MemoryView::from)
			.collect();

		Ok(MemoryList { count: items.len(), items })
	}

	/// Applies `patch`. A new photo replaces the stored one and the old file is removed.
	pub async fn update_memory(&self, id: Uuid, patch: MemoryPatch) -> Result<MemoryView> {
		let mut memory = self.load_memory(id).await?;

		if let Some(title) = patch.title.as_deref() {
			memory.title = required_title(title)?;
		}
		if let Some(description) = patch.description {
			memory.description = description.trim().to_string();
		}
		if let Some(category) = patch.category {
			memory.category = non_blank(Some(category));
		}
		if let Some(tags) = patch.tags {
			memory.tags = Memory::encode_tags(&clean_tags(tags));
		}
		if let Some(location) = patch.location {
			memory.location = non_blank(Some(location));
		}

		let replaced_photo = match patch.photo.as_ref() {
			Some(photo) => {
				let path = self.store_photo(photo).await?;

				memory.photo_path.replace(path)
			},
			None => None,
		};

		memory.updated_at = OffsetDateTime::now_utc();

		let stored = match queries::update_memory(&self.db, &memory).await {
			Ok(Some(stored)) => stored,
			failed => {
				// The new photo was never recorded.
				if patch.photo.is_some()
					&& let Some(path) = memory.photo_path.as_deref()
				{
					self.remove_photo(path).await;
				}

				return Err(match failed {
					Ok(_) => not_found(id),
					Err(err) => err.into(),
				});
			},
		};

		if let Some(old) = replaced_photo.as_deref() {
			self.remove_photo(old).await;
		}

		tracing::info!(memory_id = %id, "Memory updated.");

		Ok(stored.into())
	}

	pub async fn delete_memory(&self, id: Uuid) -> Result<()> {
		let memory = self.load_memory(id).await?;

		if !queries::delete_memory(&self.db, id).await? {
			return Err(not_found(id));
		}
		if let Some(path) = memory.photo_path.as_deref() {
			self.remove_photo(path).await;
		}

		tracing::info!(memory_id = %id, "Memory deleted.");

		Ok(())
	}

	pub async fn memory_stats(&self) -> Result<MemoryStatsView> {
		let week_start = OffsetDateTime::now_utc() - time::Duration::days(7);
		let stats = queries::memory_stats(&self.db, week_start).await?;

		Ok(MemoryStatsView {
			total: stats.total,
			by_category: stats
				.by_category
				.into_iter()
				.map(|row| CategoryCountView { category: row.category, count: row.count })
				.collect(),
			this_week: stats.this_week,
		})
	}

	pub async fn add_extracted_fact(&self, memory_id: Uuid, new: NewFact) -> Result<FactView> {
		let fact_text = new.fact_text.trim();

		if fact_text.is_empty() {
			return Err(Error::InvalidRequest { message: "fact_text must not be empty.".to_string() });
		}

		self.load_memory(memory_id).await?;

		let fact = ExtractedFact {
			id: Uuid::new_v4(),
			memory_id,
			fact_text: fact_text.to_string(),
			confidence_score: new.confidence_score.unwrap_or(DEFAULT_FACT_CONFIDENCE),
			created_at: OffsetDateTime::now_utc(),
		};

		Ok(queries::insert_fact(&self.db, &fact).await?.into())
	}

	pub async fn list_extracted_facts(&self, memory_id: Uuid) -> Result<Vec<FactView>> {
		self.load_memory(memory_id).await?;

		let facts = queries::list_facts(&self.db, memory_id).await?;

		Ok(facts.into_iter().map(FactView::from).collect())
	}

	async fn load_memory(&self, id: Uuid) -> Result<Memory> {
		queries::get_memory(&self.db, id).await?.ok_or_else(|| not_found(id))
	}
}

/// Decodes a tags form field: a JSON array of strings. Blank input means no tags.
pub fn parse_tags(raw: &str) -> Result<Vec<String>> {
	let raw = raw.trim();

	if raw.is_empty() {
		return Ok(Vec::new());
	}

	serde_json::from_str(raw).map_err(|_| Error::InvalidRequest {
		message: "tags must be a JSON array of strings.".to_string(),
	})
}

fn required_title(raw: &str) -> Result<String> {
	let title = raw.trim();

	if title.is_empty() {
		return Err(Error::InvalidRequest { message: "Title is required.".to_string() });
	}

	Ok(title.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
	tags.into_iter().filter_map(|tag| non_blank(Some(tag))).collect()
}

fn not_found(id: Uuid) -> Error {
	Error::NotFound { message: format!("Memory {id} not found.") }
}

fn parse_date_bound(field: &str, raw: &str, bound: DayBound) -> Result<OffsetDateTime> {
	let invalid = || Error::InvalidRequest {
		message: format!("{field} must be an RFC 3339 timestamp or a YYYY-MM-DD date."),
	};

	if let Ok(timestamp) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Ok(timestamp);
	}

	let date = Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| invalid())?;
	let datetime = match bound {
		DayBound::Start => date.midnight(),
		DayBound::End => date.with_hms_nano(23, 59, 59, 999_999_999).map_err(|_| invalid())?,
	};

	Ok(datetime.assume_utc())
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn plain_dates_cover_the_whole_day() {
		let start = parse_date_bound("date_from", "2024-03-05", DayBound::Start).expect("parse failed");
		let end = parse_date_bound("date_to", "2024-03-05", DayBound::End).expect("parse failed");

		assert_eq!(start, datetime!(2024-03-05 0:00 UTC));
		assert_eq!(end, datetime!(2024-03-05 23:59:59.999999999 UTC));
	}

	#[test]
	fn timestamps_are_taken_as_given() {
		let parsed =
			parse_date_bound("date_to", "2024-03-05T10:30:00+02:00", DayBound::End).expect("parse failed");

		assert_eq!(parsed, datetime!(2024-03-05 8:30 UTC));
	}

	#[test]
	fn malformed_dates_are_rejected() {
		let err = parse_date_bound("date_from", "05/03/2024", DayBound::Start).expect_err("accepted");

		assert!(err.to_string().contains("date_from"));
	}

	#[test]
	fn tags_decode_from_json() {
		assert_eq!(parse_tags(r#"["beach", "summer"]"#).expect("parse failed"), vec![
			"beach".to_string(),
			"summer".to_string()
		]);
		assert!(parse_tags("  ").expect("parse failed").is_empty());
		assert!(parse_tags("beach,summer").is_err());
	}

	#[test]
	fn blank_fields_collapse_to_none() {
		assert_eq!(non_blank(Some("  ".to_string())), None);
		assert_eq!(non_blank(Some(" pets ".to_string())), Some("pets".to_string()));
		assert_eq!(clean_tags(vec![" a ".into(), "".into()]), vec!["a".to_string()]);
		assert!(required_title("   ").is_err());
	}
}
