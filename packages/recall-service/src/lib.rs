pub mod memories;
pub mod progress;
pub mod prompts;
pub mod provider_status;
pub mod questions;
pub mod scores;
pub mod scoring;
pub mod time_serde;
pub mod uploads;

mod error;

pub use error::{Error, Result};
pub use memories::{
	FactView, ListMemoriesQuery, MemoryDetail, MemoryList, MemoryPatch, MemoryStatsView,
	MemoryView, NewFact, NewMemory,
};
pub use progress::{CoachFeedback, FeedbackTest};
pub use provider_status::ProviderStatus;
pub use questions::{
	GenerateQuestionsRequest, GenerateQuestionsResponse, GenerationMetadata, MemoryQuestionLink,
	Question, QuestionSource, QuestionStats,
};
pub use scores::{CreateScoreRequest, ListScoresQuery, ScoreStats, ScoresPage, TestScoreView};
pub use scoring::{ScoreAnswersRequest, ScoreDetail, ScoreSource, ScoreSummary, ScoringSource};
pub use uploads::PhotoUpload;

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::sync::Mutex;

use recall_config::{Config, LlmProviderConfig};
use recall_domain::history::UsageHistory;
use recall_providers::ollama::{self, SamplingOptions};
use recall_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The generative text backend, injectable so tests can run without a model server.
pub trait TextGenerator
where
	Self: Send + Sync,
{
	fn list_models<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
	) -> BoxFuture<'a, recall_providers::Result<Vec<String>>>;

	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		model: &'a str,
		prompt: &'a str,
		options: &'a SamplingOptions,
	) -> BoxFuture<'a, recall_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub text: Arc<dyn TextGenerator>,
}

pub struct RecallService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
	history: Mutex<UsageHistory>,
	generation_gate: Mutex<()>,
}

struct DefaultProviders;

impl TextGenerator for DefaultProviders {
	fn list_models<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
	) -> BoxFuture<'a, recall_providers::Result<Vec<String>>> {
		Box::pin(ollama::list_models(cfg))
	}

	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		model: &'a str,
		prompt: &'a str,
		options: &'a SamplingOptions,
	) -> BoxFuture<'a, recall_providers::Result<String>> {
		Box::pin(ollama::generate(cfg, model, prompt, options))
	}
}

impl Providers {
	pub fn new(text: Arc<dyn TextGenerator>) -> Self {
		Self { text }
	}
}

impl Default for Providers {
	fn default() -> Self {
		Self { text: Arc::new(DefaultProviders) }
	}
}

impl RecallService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_providers(cfg, db, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self {
			cfg,
			db,
			providers,
			history: Mutex::new(UsageHistory::new()),
			generation_gate: Mutex::new(()),
		}
	}

	/// One completion from the configured model.
	pub(crate) async fn complete(
		&self,
		prompt: &str,
		options: &SamplingOptions,
	) -> recall_providers::Result<String> {
		let llm = &self.cfg.providers.llm;

		self.providers.text.generate(llm, &llm.model, prompt, options).await
	}

	/// Lists installed models and checks the configured one is among them.
	pub(crate) async fn ensure_model(&self) -> recall_providers::Result<Vec<String>> {
		let llm = &self.cfg.providers.llm;
		let models = self.providers.text.list_models(llm).await?;

		if ollama::model_is_listed(&models, &llm.model) {
			Ok(models)
		} else {
			Err(recall_providers::Error::ModelNotFound { model: llm.model.clone() })
		}
	}
}
