mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Feedback, Generation, LlmProviderConfig, Postgres, Providers, Scoring, Service, Storage,
	Uploads,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("uploads.dir", &cfg.uploads.dir),
		("uploads.public_prefix", &cfg.uploads.public_prefix),
		("providers.llm.api_base", &cfg.providers.llm.api_base),
		("providers.llm.model", &cfg.providers.llm.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.uploads.max_bytes == 0 {
		return Err(Error::Validation {
			message: "uploads.max_bytes must be greater than zero.".to_string(),
		});
	}
	if !cfg.uploads.public_prefix.starts_with('/') {
		return Err(Error::Validation {
			message: "uploads.public_prefix must start with '/'.".to_string(),
		});
	}
	if cfg.providers.llm.timeout_ms == 0 || cfg.providers.llm.health_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.llm timeouts must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.llm.health_timeout_ms > cfg.providers.llm.timeout_ms {
		return Err(Error::Validation {
			message: "providers.llm.health_timeout_ms must not exceed providers.llm.timeout_ms."
				.to_string(),
		});
	}
	if cfg.generation.default_count == 0 {
		return Err(Error::Validation {
			message: "generation.default_count must be greater than zero.".to_string(),
		});
	}
	if cfg.generation.default_count > cfg.generation.max_count {
		return Err(Error::Validation {
			message: "generation.default_count must not exceed generation.max_count.".to_string(),
		});
	}

	let threshold = cfg.generation.duplicate_threshold;

	if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
		return Err(Error::Validation {
			message: "generation.duplicate_threshold must be in the range (0.0, 1.0].".to_string(),
		});
	}
	if cfg.generation.history_window_secs == 0 {
		return Err(Error::Validation {
			message: "generation.history_window_secs must be greater than zero.".to_string(),
		});
	}

	for (label, temperature, top_p, max_tokens) in [
		(
			"generation",
			cfg.generation.temperature,
			cfg.generation.top_p,
			cfg.generation.max_tokens,
		),
		("scoring", cfg.scoring.temperature, cfg.scoring.top_p, cfg.scoring.max_tokens),
		("feedback", cfg.feedback.temperature, cfg.feedback.top_p, cfg.feedback.max_tokens),
	] {
		validate_sampling(label, temperature, top_p, max_tokens)?;
	}

	if cfg.feedback.recent_tests == 0 {
		return Err(Error::Validation {
			message: "feedback.recent_tests must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_sampling(label: &str, temperature: f32, top_p: f32, max_tokens: u32) -> Result<()> {
	if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
		return Err(Error::Validation {
			message: format!("{label}.temperature must be in the range 0.0-2.0."),
		});
	}
	if !top_p.is_finite() || !(0.0..=1.0).contains(&top_p) {
		return Err(Error::Validation {
			message: format!("{label}.top_p must be in the range 0.0-1.0."),
		});
	}
	if max_tokens == 0 {
		return Err(Error::Validation {
			message: format!("{label}.max_tokens must be greater than zero."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.providers.llm.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.providers.llm.api_key = None;
	}

	let api_base = cfg.providers.llm.api_base.trim().trim_end_matches('/').to_string();

	cfg.providers.llm.api_base = api_base;

	let prefix = cfg.uploads.public_prefix.trim().trim_end_matches('/').to_string();

	cfg.uploads.public_prefix = prefix;
}
