//! Photo upload checks and stored file naming.

use std::{fmt, path::Path};

use rand::Rng;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
	MissingExtension,
	UnsupportedExtension(String),
	UnsupportedContentType(String),
	TooLarge { size: u64, limit: u64 },
	Empty,
}

impl fmt::Display for UploadRejection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::MissingExtension => f.write_str("Photo file name must have an image extension."),
			Self::UnsupportedExtension(ext) =>
				write!(f, "Photo extension {ext:?} is not an allowed image type."),
			Self::UnsupportedContentType(content_type) =>
				write!(f, "Photo content type {content_type:?} is not an allowed image type."),
			Self::TooLarge { size, limit } =>
				write!(f, "Photo is {size} bytes; the limit is {limit} bytes."),
			Self::Empty => f.write_str("Photo must not be empty."),
		}
	}
}

/// A photo that passed validation. `extension` is lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
	pub extension: String,
}

/// Checks the declared content type, the file extension and the size.
pub fn validate_image(
	file_name: &str,
	content_type: Option<&str>,
	size: u64,
	limit: u64,
) -> Result<AcceptedImage, UploadRejection> {
	if size == 0 {
		return Err(UploadRejection::Empty);
	}
	if size > limit {
		return Err(UploadRejection::TooLarge { size, limit });
	}

	let extension = Path::new(file_name)
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase)
		.ok_or(UploadRejection::MissingExtension)?;

	if !ALLOWED_IMAGE_TYPES.contains(&extension.as_str()) {
		return Err(UploadRejection::UnsupportedExtension(extension));
	}

	let content_type = content_type.unwrap_or_default().trim().to_ascii_lowercase();
	let subtype = content_type
		.strip_prefix("image/")
		.map(|rest| rest.split(';').next().unwrap_or_default().trim());

	match subtype {
		Some(subtype) if ALLOWED_IMAGE_TYPES.contains(&subtype) => Ok(AcceptedImage { extension }),
		_ => Err(UploadRejection::UnsupportedContentType(content_type)),
	}
}

/// `memory-<unix-millis>-<random>.<ext>`.
pub fn photo_file_name<R>(unix_millis: i128, extension: &str, rng: &mut R) -> String
where
	R: Rng + ?Sized,
{
	let suffix: u32 = rng.gen_range(0..1_000_000_000);

	format!("memory-{unix_millis}-{suffix}.{extension}")
}

/// Accepts only names produced by [`photo_file_name`]-style storage: no separators or parent hops.
pub fn is_safe_file_name(name: &str) -> bool {
	!name.is_empty()
		&& !name.starts_with('.')
		&& name.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}
