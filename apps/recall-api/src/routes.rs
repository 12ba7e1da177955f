use std::collections::HashMap;

use axum::{
	Json, Router,
	extract::{
		DefaultBodyLimit, Multipart, Path, Query, State,
		multipart::{MultipartError, MultipartRejection},
		rejection::{JsonRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use time::OffsetDateTime;
use tower_http::{cors::CorsLayer, services::ServeDir};
use uuid::Uuid;

use crate::state::AppState;
use recall_service::{
	CoachFeedback, CreateScoreRequest, Error as ServiceError, FactView, GenerateQuestionsRequest,
	GenerateQuestionsResponse, ListMemoriesQuery, ListScoresQuery, MemoryDetail, MemoryList,
	MemoryPatch, MemoryStatsView, MemoryView, NewFact, NewMemory, PhotoUpload, ProviderStatus,
	QuestionStats, ScoreAnswersRequest, ScoreStats, ScoreSummary, ScoresPage, TestScoreView,
	memories::parse_tags,
};

/// Room for the text fields and multipart framing around a full-size photo.
const FORM_OVERHEAD_BYTES: u64 = 1_024 * 1_024;
const PHOTO_FIELD: &str = "photo";

pub fn router(state: AppState) -> Router {
	let uploads = &state.service.cfg.uploads;
	let body_limit =
		usize::try_from(uploads.max_bytes.saturating_add(FORM_OVERHEAD_BYTES)).unwrap_or(usize::MAX);
	let photos = ServeDir::new(&uploads.dir);
	let public_prefix = uploads.public_prefix.clone();

	Router::new()
		.route("/api/health", get(health))
		.route("/api/health/llm", get(provider_health))
		.route("/api/memories", get(list_memories).post(create_memory))
		.route("/api/memories/stats/overview", get(memory_stats))
		.route("/api/memories/{id}", get(get_memory).put(update_memory).delete(delete_memory))
		.route("/api/memories/{id}/facts", get(list_facts).post(add_fact))
		.route("/api/generate-questions", post(generate_questions))
		.route("/api/score-answers", post(score_answers))
		.route("/api/reset-question-history", get(reset_question_history))
		.route("/api/question-stats", get(question_stats))
		.route("/api/scores", get(list_scores).post(create_score))
		.route("/api/scores/stats", get(score_stats))
		.route("/api/scores/{id}", get(get_score))
		.route("/api/ai-feedback", get(ai_feedback))
		.nest_service(&public_prefix, photos)
		.layer(DefaultBodyLimit::max(body_limit))
		.layer(CorsLayer::permissive())
		.with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: &'static str,
	#[serde(with = "recall_service::time_serde")]
	timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
struct StatusMessage {
	message: &'static str,
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "ok", timestamp: OffsetDateTime::now_utc() })
}

async fn provider_health(State(state): State<AppState>) -> Json<ProviderStatus> {
	Json(state.service.provider_status().await)
}

async fn list_memories(
	State(state): State<AppState>,
	query: Result<Query<ListMemoriesQuery>, QueryRejection>,
) -> Result<Json<MemoryList>, ApiError> {
	let Query(query) = query?;
	let response = state.service.list_memories(query).await?;
	Ok(Json(response))
}

async fn create_memory(
	State(state): State<AppState>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<MemoryView>), ApiError> {
	let mut form = MemoryForm::read(multipart?).await?;
	let tags = form.take("tags").map(|raw| parse_tags(&raw)).transpose()?.unwrap_or_default();
	let new = NewMemory {
		title: form.take("title").unwrap_or_default(),
		description: form.take("description"),
		category: form.take("category"),
		tags,
		location: form.take("location"),
		photo: form.photo,
	};
	let response = state.service.create_memory(new).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

async fn memory_stats(State(state): State<AppState>) -> Result<Json<MemoryStatsView>, ApiError> {
	let response = state.service.memory_stats().await?;
	Ok(Json(response))
}

async fn get_memory(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<MemoryDetail>, ApiError> {
	let response = state.service.get_memory(parse_id(&id)?).await?;
	Ok(Json(response))
}

async fn update_memory(
	State(state): State<AppState>,
	Path(id): Path<String>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MemoryView>, ApiError> {
	let id = parse_id(&id)?;
	let mut form = MemoryForm::read(multipart?).await?;
	let patch = MemoryPatch {
		title: form.take("title"),
		description: form.take("description"),
		category: form.take("category"),
		tags: form.take("tags").map(|raw| parse_tags(&raw)).transpose()?,
		location: form.take("location"),
		photo: form.photo,
	};
	let response = state.service.update_memory(id, patch).await?;
	Ok(Json(response))
}

async fn delete_memory(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
	state.service.delete_memory(parse_id(&id)?).await?;
	Ok(Json(StatusMessage { message: "Memory deleted." }))
}

async fn list_facts(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Vec<FactView>>, ApiError> {
	let response = state.service.list_extracted_facts(parse_id(&id)?).await?;
	Ok(Json(response))
}

async fn add_fact(
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: Result<Json<NewFact>, JsonRejection>,
) -> Result<(StatusCode, Json<FactView>), ApiError> {
	let id = parse_id(&id)?;
	let Json(payload) = payload?;
	let response = state.service.add_extracted_fact(id, payload).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

async fn generate_questions(
	State(state): State<AppState>,
	payload: Result<Json<GenerateQuestionsRequest>, JsonRejection>,
) -> Result<Json<GenerateQuestionsResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.generate_questions(payload).await?;
	Ok(Json(response))
}

async fn score_answers(
	State(state): State<AppState>,
	payload: Result<Json<ScoreAnswersRequest>, JsonRejection>,
) -> Result<Json<ScoreSummary>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.score_answers(payload).await?;
	Ok(Json(response))
}

async fn reset_question_history(State(state): State<AppState>) -> Json<StatusMessage> {
	state.service.reset_question_history().await;
	Json(StatusMessage { message: "Question history reset." })
}

async fn question_stats(State(state): State<AppState>) -> Json<QuestionStats> {
	Json(state.service.question_stats().await)
}

async fn create_score(
	State(state): State<AppState>,
	payload: Result<Json<CreateScoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TestScoreView>), ApiError> {
	let Json(payload) = payload?;
	let response = state.service.create_test_score(payload).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

async fn list_scores(
	State(state): State<AppState>,
	query: Result<Query<ListScoresQuery>, QueryRejection>,
) -> Result<Json<ScoresPage>, ApiError> {
	let Query(query) = query?;
	let response = state.service.list_test_scores(query).await?;
	Ok(Json(response))
}

async fn score_stats(State(state): State<AppState>) -> Result<Json<ScoreStats>, ApiError> {
	let response = state.service.score_stats().await?;
	Ok(Json(response))
}

async fn get_score(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<TestScoreView>, ApiError> {
	let response = state.service.get_test_score(parse_id(&id)?).await?;
	Ok(Json(response))
}

async fn ai_feedback(State(state): State<AppState>) -> Result<Json<CoachFeedback>, ApiError> {
	let response = state.service.coach_feedback().await?;
	Ok(Json(response))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
	Uuid::parse_str(raw).map_err(|_| {
		json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			format!("{raw} is not a valid id."),
			Some(vec!["id".to_string()]),
		)
	})
}

/// Text fields and the optional photo of a memory form.
struct MemoryForm {
	fields: HashMap<String, String>,
	photo: Option<PhotoUpload>,
}
impl MemoryForm {
	async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
		let mut fields = HashMap::new();
		let mut photo = None;

		while let Some(field) = multipart.next_field().await? {
			let Some(name) = field.name().map(str::to_string) else {
				continue;
			};

			if name == PHOTO_FIELD {
				let file_name = field.file_name().unwrap_or_default().to_string();
				let content_type = field.content_type().map(str::to_string);
				let bytes = field.bytes().await?;

				// Browsers submit an empty part when no file was chosen.
				if file_name.is_empty() && bytes.is_empty() {
					continue;
				}

				photo = Some(PhotoUpload { file_name, content_type, bytes: bytes.to_vec() });
			} else {
				fields.insert(name, field.text().await?);
			}
		}

		Ok(Self { fields, photo })
	}

	fn take(&mut self, name: &str) -> Option<String> {
		self.fields.remove(name)
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::PayloadTooLarge { message } =>
				json_error(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message, None),
			ServiceError::Exhausted { message } =>
				json_error(StatusCode::BAD_GATEWAY, "generation_failed", message, None),
			ServiceError::Storage { message } | ServiceError::Io { message } => {
				tracing::error!(%message, "Request failed on storage.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"storage_error",
					"Internal storage error.",
					None,
				)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text(), None)
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text(), None)
	}
}

impl From<MultipartRejection> for ApiError {
	fn from(rejection: MultipartRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text(), None)
	}
}

impl From<MultipartError> for ApiError {
	fn from(err: MultipartError) -> Self {
		if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
			return json_error(
				StatusCode::PAYLOAD_TOO_LARGE,
				"payload_too_large",
				err.body_text(),
				Some(vec![PHOTO_FIELD.to_string()]),
			);
		}

		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text(), None)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };
		(self.status, Json(body)).into_response()
	}
}
