pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Generative text service at {api_base} is unreachable.")]
	Unreachable {
		api_base: String,
		#[source]
		source: reqwest::Error,
	},
	#[error("Generative text service did not answer within {timeout_ms} ms.")]
	Timeout { timeout_ms: u64 },
	#[error("Model {model:?} is not available on the generative text service.")]
	ModelNotFound { model: String },
	#[error("Generative text service rejected the request: {message}")]
	InvalidRequest { message: String },
	#[error("Generative text service returned an empty response.")]
	EmptyResponse,
	#[error("Generative text service returned HTTP {status}: {message}")]
	Http { status: u16, message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
impl Error {
	/// Stable code reported to clients alongside fallback results.
	pub fn code(&self) -> &'static str {
		match self {
			Self::Unreachable { .. } => "SERVICE_UNREACHABLE",
			Self::Timeout { .. } => "TIMEOUT",
			Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
			Self::InvalidRequest { .. } => "INVALID_REQUEST",
			Self::EmptyResponse => "EMPTY_RESPONSE",
			Self::Http { .. } => "HTTP_ERROR",
			Self::InvalidResponse { .. } => "INVALID_RESPONSE",
			Self::InvalidConfig { .. }
			| Self::Reqwest(_)
			| Self::InvalidHeaderName(_)
			| Self::InvalidHeaderValue(_) => "PROVIDER_ERROR",
		}
	}
}
