//! Errors of the binary edge.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read config {path}: {source}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}: {source}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid PORT value {0:?}")]
	InvalidPort(String),

	#[error(transparent)]
	Runtime(#[from] wa_runtime::Error),

	#[error("{0:#}")]
	Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
