use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in the pipeline.
///
/// All variants terminate the current run when they reach the orchestrator;
/// the fetch stage additionally isolates a subset of them per token (see
/// [`crate::fetch::FetchStage`]).
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("missing configuration: {0} is not set")]
	ConfigMissing(&'static str),

	#[error("upstream unavailable: {0}")]
	Upstream(String),

	#[error("unsupported locator: {0:?}")]
	UnsupportedLocator(String),

	#[error("storage i/o error at {path}: {source}")]
	Storage {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("malformed json payload: {0}")]
	Json(#[from] serde_json::Error),

	#[error("image processing failed: {0}")]
	Image(#[from] tf_images::Error),

	#[error("background task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
}

impl Error {
	pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Storage {
			path: path.into(),
			source,
		}
	}
}
