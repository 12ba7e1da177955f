use std::sync::Arc;

use recall_service::RecallService;
use recall_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RecallService>,
}
impl AppState {
	pub async fn new(config: recall_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;
		tokio::fs::create_dir_all(&config.uploads.dir).await?;

		Ok(Self::from_service(RecallService::new(config, db)))
	}

	/// Wraps an already built service, e.g. one with stub providers.
	pub fn from_service(service: RecallService) -> Self {
		Self { service: Arc::new(service) }
	}
}
