//! Client for an Ollama-compatible generative text API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};
use recall_config::LlmProviderConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingOptions {
	pub temperature: f32,
	pub top_p: f32,
	#[serde(rename = "num_predict")]
	pub max_tokens: u32,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub stop: Vec<String>,
}

/// Names of the installed models. Uses the short health timeout.
pub async fn list_models(cfg: &LlmProviderConfig) -> Result<Vec<String>> {
	let client = build_client(cfg.health_timeout_ms)?;
	let url = format!("{}/api/tags", cfg.api_base);
	let res = client
		.get(url)
		.headers(crate::request_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.send()
		.await
		.map_err(|err| classify_send_error(err, &cfg.api_base, cfg.health_timeout_ms))?;
	let json = read_json(res, &cfg.model, cfg.health_timeout_ms, &cfg.api_base).await?;

	parse_tags_response(json)
}

/// Single non-streaming completion. Uses the long request timeout.
pub async fn generate(
	cfg: &LlmProviderConfig,
	model: &str,
	prompt: &str,
	options: &SamplingOptions,
) -> Result<String> {
	let client = build_client(cfg.timeout_ms)?;
	let url = format!("{}/api/generate", cfg.api_base);
	let res = client
		.post(url)
		.headers(crate::request_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&generate_body(model, prompt, options))
		.send()
		.await
		.map_err(|err| classify_send_error(err, &cfg.api_base, cfg.timeout_ms))?;
	let json = read_json(res, model, cfg.timeout_ms, &cfg.api_base).await?;

	parse_generate_response(json)
}

pub fn generate_body(model: &str, prompt: &str, options: &SamplingOptions) -> Value {
	serde_json::json!({
		"model": model,
		"prompt": prompt,
		"stream": false,
		"options": options,
	})
}

pub fn parse_tags_response(json: Value) -> Result<Vec<String>> {
	let models = json.get("models").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Model list response is missing models array.".to_string() }
	})?;

	Ok(models
		.iter()
		.filter_map(|model| model.get("name").and_then(|v| v.as_str()))
		.map(str::to_string)
		.collect())
}

pub fn parse_generate_response(json: Value) -> Result<String> {
	if !json.is_object() {
		return Err(Error::InvalidResponse {
			message: "Generate response must be a JSON object.".to_string(),
		});
	}

	match json.get("response").and_then(|v| v.as_str()) {
		Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
		_ => Err(Error::EmptyResponse),
	}
}

/// Exact name match; an untagged name also matches its `:latest` tag.
pub fn model_is_listed(models: &[String], model: &str) -> bool {
	models.iter().any(|name| {
		name == model || (!model.contains(':') && name.strip_suffix(":latest") == Some(model))
	})
}

/// Maps a non-success status to its failure category.
pub fn classify_status(status: StatusCode, body: &str, model: &str) -> Error {
	let message = error_message(body);

	match status {
		StatusCode::NOT_FOUND => Error::ModelNotFound { model: model.to_string() },
		StatusCode::BAD_REQUEST => Error::InvalidRequest { message },
		_ => Error::Http { status: status.as_u16(), message },
	}
}

fn classify_send_error(err: reqwest::Error, api_base: &str, timeout_ms: u64) -> Error {
	if err.is_timeout() {
		Error::Timeout { timeout_ms }
	} else if err.is_connect() {
		Error::Unreachable { api_base: api_base.to_string(), source: err }
	} else {
		Error::Reqwest(err)
	}
}

async fn read_json(
	res: reqwest::Response,
	model: &str,
	timeout_ms: u64,
	api_base: &str,
) -> Result<Value> {
	let status = res.status();
	let body = res.text().await.map_err(|err| classify_send_error(err, api_base, timeout_ms))?;

	if !status.is_success() {
		return Err(classify_status(status, &body, model));
	}

	serde_json::from_str(&body).map_err(|err| Error::InvalidResponse {
		message: format!("Generative text service returned malformed JSON: {err}."),
	})
}

fn error_message(body: &str) -> String {
	serde_json::from_str::<Value>(body)
		.ok()
		.and_then(|json| json.get("error").and_then(|v| v.as_str()).map(str::to_string))
		.unwrap_or_else(|| body.trim().to_string())
}

fn build_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn options() -> SamplingOptions {
		SamplingOptions { temperature: 0.1, top_p: 0.8, max_tokens: 500, stop: Vec::new() }
	}

	#[test]
	fn generate_body_uses_ollama_option_names() {
		let body = generate_body("llama3", "Hi", &options());

		assert_eq!(body["stream"], false);
		assert_eq!(body["options"]["num_predict"], 500);
		assert!(body["options"].get("stop").is_none());

		let mut with_stop = options();

		with_stop.stop = vec!["\n\nUser:".to_string()];

		let body = generate_body("llama3", "Hi", &with_stop);

		assert_eq!(body["options"]["stop"][0], "\n\nUser:");
	}

	#[test]
	fn parses_model_names() {
		let json = serde_json::json!({
			"models": [{ "name": "llama3:latest" }, { "name": "gemma:2b" }, { "size": 1 }]
		});

		assert_eq!(parse_tags_response(json).expect("parse failed"), vec![
			"llama3:latest".to_string(),
			"gemma:2b".to_string(),
		]);
		assert!(parse_tags_response(serde_json::json!({})).is_err());
	}

	#[test]
	fn blank_generate_response_is_empty() {
		let err = parse_generate_response(serde_json::json!({ "response": "  " }))
			.expect_err("Expected empty response.");

		assert_eq!(err.code(), "EMPTY_RESPONSE");

		let err = parse_generate_response(serde_json::json!({ "done": true }))
			.expect_err("Expected empty response.");

		assert_eq!(err.code(), "EMPTY_RESPONSE");
		assert_eq!(
			parse_generate_response(serde_json::json!({ "response": "Question: Who?" }))
				.expect("parse failed"),
			"Question: Who?"
		);
	}

	#[test]
	fn model_listing_accepts_latest_tag() {
		let models = vec!["llama3:latest".to_string(), "gpt-oss:20b".to_string()];

		assert!(model_is_listed(&models, "llama3"));
		assert!(model_is_listed(&models, "gpt-oss:20b"));
		assert!(!model_is_listed(&models, "gpt-oss"));
		assert!(!model_is_listed(&models, "mistral"));
	}

	#[test]
	fn statuses_map_to_categories() {
		assert_eq!(classify_status(StatusCode::NOT_FOUND, "", "m").code(), "MODEL_NOT_FOUND");

		let err = classify_status(StatusCode::BAD_REQUEST, r#"{"error":"bad prompt"}"#, "m");

		assert_eq!(err.code(), "INVALID_REQUEST");
		assert_eq!(err.to_string(), "Generative text service rejected the request: bad prompt");
		assert_eq!(
			classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom", "m").code(),
			"HTTP_ERROR"
		);
	}
}
