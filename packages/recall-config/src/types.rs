use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub uploads: Uploads,
	pub providers: Providers,
	#[serde(default)]
	pub generation: Generation,
	#[serde(default)]
	pub scoring: Scoring,
	#[serde(default)]
	pub feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Uploads {
	/// Directory photos are written to. Served under `public_prefix`.
	pub dir: String,
	#[serde(default = "default_upload_max_bytes")]
	pub max_bytes: u64,
	#[serde(default = "default_upload_public_prefix")]
	pub public_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Optional. Sent as a bearer token when the service sits behind an authenticating proxy.
	pub api_key: Option<String>,
	pub model: String,
	/// Upper bound for generation and scoring calls.
	pub timeout_ms: u64,
	/// Upper bound for model listing and availability checks.
	pub health_timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Generation {
	pub default_count: u32,
	pub max_count: u32,
	pub inter_call_delay_ms: u64,
	pub duplicate_threshold: f32,
	pub history_window_secs: u64,
	pub temperature: f32,
	pub top_p: f32,
	pub max_tokens: u32,
}
impl Default for Generation {
	fn default() -> Self {
		Self {
			default_count: 5,
			max_count: 20,
			inter_call_delay_ms: 500,
			duplicate_threshold: 0.7,
			history_window_secs: 3_600,
			temperature: 0.1,
			top_p: 0.8,
			max_tokens: 500,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scoring {
	pub temperature: f32,
	pub top_p: f32,
	pub max_tokens: u32,
}
impl Default for Scoring {
	fn default() -> Self {
		Self { temperature: 0.1, top_p: 0.8, max_tokens: 500 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Feedback {
	pub recent_tests: u32,
	pub temperature: f32,
	pub top_p: f32,
	pub max_tokens: u32,
	pub stop: Vec<String>,
}
impl Default for Feedback {
	fn default() -> Self {
		Self {
			recent_tests: 7,
			temperature: 0.3,
			top_p: 0.9,
			max_tokens: 400,
			stop: vec!["\n\nHuman:".to_string(), "\n\nUser:".to_string(), "\n\nQuestion:".to_string()],
		}
	}
}

fn default_upload_max_bytes() -> u64 {
	10 * 1_024 * 1_024
}

fn default_upload_public_prefix() -> String {
	"/uploads/photos".to_string()
}
