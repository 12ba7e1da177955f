use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use recall_config::LlmProviderConfig;
use recall_providers::ollama::{self, SamplingOptions};

fn unreachable_config() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "ollama".to_string(),
		// Port 1 is reserved and closed on test hosts.
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: None,
		model: "llama3".to_string(),
		timeout_ms: 2_000,
		health_timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers = recall_providers::request_headers(Some("secret"), &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn omits_auth_header_without_key() {
	let mut defaults = Map::new();

	defaults.insert("X-Client".to_string(), Value::String("recall".to_string()));

	let headers =
		recall_providers::request_headers(None, &defaults).expect("Failed to build headers.");

	assert!(headers.get(AUTHORIZATION).is_none());
	assert_eq!(headers.get("x-client").expect("Missing default header."), "recall");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("X-Retries".to_string(), Value::from(3));

	let err = recall_providers::request_headers(None, &defaults)
		.expect_err("Expected invalid header config.");

	assert_eq!(err.code(), "PROVIDER_ERROR");
}

#[tokio::test]
async fn unreachable_service_is_reported_as_such() {
	let cfg = unreachable_config();
	let err = ollama::list_models(&cfg).await.expect_err("Expected connection failure.");

	assert_eq!(err.code(), "SERVICE_UNREACHABLE");

	let options =
		SamplingOptions { temperature: 0.1, top_p: 0.8, max_tokens: 16, stop: Vec::new() };
	let err = ollama::generate(&cfg, &cfg.model, "Say hi.", &options)
		.await
		.expect_err("Expected connection failure.");

	assert_eq!(err.code(), "SERVICE_UNREACHABLE");
}
