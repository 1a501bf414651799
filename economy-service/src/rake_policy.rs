//! Loads a `RakeConfig` from a JSON policy file on disk. Club-level rake
//! policy storage itself is out of scope for this exercise (spec §3 lists
//! persistence as an external collaborator); this module only covers the
//! one load path `economy-service`'s binary entry point needs.

use std::path::Path;

use economy_core::RakeConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RakePolicyError {
	#[error("failed to read rake policy file {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse rake policy file {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: serde_json::Error,
	},
}

pub fn load_rake_config(path: &Path) -> Result<RakeConfig, RakePolicyError> {
	let raw = std::fs::read_to_string(path).map_err(|source| RakePolicyError::Io {
		path: path.display().to_string(),
		source,
	})?;
	serde_json::from_str(&raw).map_err(|source| RakePolicyError::Parse {
		path: path.display().to_string(),
		source,
	})
}
