//! Photo persistence under the configured uploads directory.

use std::path::PathBuf;

use rand::{SeedableRng, rngs::StdRng};
use time::OffsetDateTime;

use crate::{Error, RecallService, Result};
use recall_domain::upload::{self, UploadRejection};

/// A photo as received from a multipart form, before validation.
#[derive(Clone, Debug)]
pub struct PhotoUpload {
	pub file_name: String,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

impl RecallService {
	/// Validates and writes the photo. Returns its public URL path.
	pub async fn store_photo(&self, photo: &PhotoUpload) -> Result<String> {
		let uploads = &self.cfg.uploads;
		let accepted = upload::validate_image(
			&photo.file_name,
			photo.content_type.as_deref(),
			photo.bytes.len() as u64,
			uploads.max_bytes,
		)
		.map_err(rejection_error)?;
		let unix_millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
		let file_name =
			upload::photo_file_name(unix_millis, &accepted.extension, &mut StdRng::from_entropy());

		tokio::fs::create_dir_all(&uploads.dir).await?;
		tokio::fs::write(PathBuf::from(&uploads.dir).join(&file_name), &photo.bytes).await?;

		tracing::info!(file = %file_name, bytes = photo.bytes.len(), "Stored photo.");

		Ok(public_path(&uploads.public_prefix, &file_name))
	}

	/// Deletes a previously stored photo. Failures are logged, not returned.
	pub async fn remove_photo(&self, public: &str) {
		let Some(file_name) = stored_file_name(&self.cfg.uploads.public_prefix, public) else {
			tracing::warn!(path = public, "Photo path is outside the uploads prefix.");

			return;
		};
		let path = PathBuf::from(&self.cfg.uploads.dir).join(file_name);

		if let Err(err) = tokio::fs::remove_file(&path).await {
			tracing::warn!(path = %path.display(), error = %err, "Failed to remove photo.");
		}
	}
}

fn rejection_error(rejection: UploadRejection) -> Error {
	match rejection {
		UploadRejection::TooLarge { .. } => Error::PayloadTooLarge { message: rejection.to_string() },
		_ => Error::InvalidRequest { message: rejection.to_string() },
	}
}

fn public_path(prefix: &str, file_name: &str) -> String {
	format!("{}/{file_name}", prefix.trim_end_matches('/'))
}

/// The bare file name behind a public path, when it is one this service could have written.
fn stored_file_name<'a>(prefix: &str, public: &'a str) -> Option<&'a str> {
	let rest = public.strip_prefix(prefix.trim_end_matches('/'))?.strip_prefix('/')?;

	upload::is_safe_file_name(rest).then_some(rest)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn public_paths_join_prefix_and_name() {
		assert_eq!(public_path("/uploads/photos", "a.png"), "/uploads/photos/a.png");
		assert_eq!(public_path("/uploads/photos/", "a.png"), "/uploads/photos/a.png");
	}

	#[test]
	fn only_safe_names_under_prefix_resolve() {
		let prefix = "/uploads/photos";

		assert_eq!(stored_file_name(prefix, "/uploads/photos/memory-1-2.png"), Some("memory-1-2.png"));
		assert_eq!(stored_file_name(prefix, "/uploads/photos/../secret"), None);
		assert_eq!(stored_file_name(prefix, "/uploads/photos/a/b.png"), None);
		assert_eq!(stored_file_name(prefix, "/elsewhere/a.png"), None);
		assert_eq!(stored_file_name(prefix, "/uploads/photosa.png"), None);
	}

	#[test]
	fn oversize_maps_to_payload_too_large() {
		let err = rejection_error(UploadRejection::TooLarge { size: 2, limit: 1 });

		assert!(matches!(err, Error::PayloadTooLarge { .. }));
		assert!(matches!(rejection_error(UploadRejection::Empty), Error::InvalidRequest { .. }));
	}
}
