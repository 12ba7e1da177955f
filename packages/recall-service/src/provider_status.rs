use serde::Serialize;

use crate::RecallService;
use recall_providers::ollama;

#[derive(Clone, Debug, Serialize)]
pub struct ProviderStatus {
	pub running: bool,
	pub model_available: bool,
	pub available_models: Vec<String>,
	pub model: String,
	/// Provider error code when the service could not be listed.
	pub error: Option<String>,
}

impl RecallService {
	/// Never fails: an unreachable service is reported as not running.
	pub async fn provider_status(&self) -> ProviderStatus {
		let llm = &self.cfg.providers.llm;

		match self.providers.text.list_models(llm).await {
			Ok(models) => ProviderStatus {
				running: true,
				model_available: ollama::model_is_listed(&models, &llm.model),
				available_models: models,
				model: llm.model.clone(),
				error: None,
			},
			Err(err) => {
				tracing::warn!(code = err.code(), error = %err, "Generative text service check failed.");

				ProviderStatus {
					running: false,
					model_available: false,
					available_models: Vec::new(),
					model: llm.model.clone(),
					error: Some(err.code().to_string()),
				}
			},
		}
	}
}
