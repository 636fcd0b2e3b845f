//! Error types for lesson tracking and focus patching.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the watcher, the controller, or the host binding.
///
/// Only [`Error::RootMissing`] is fatal. Everything else is absorbed where it
/// happens and logged, so a misbehaving page never takes the script down.
#[derive(Debug, Error)]
pub enum Error {
	/// The root container could not be found at startup.
	#[error("root container #{id} not found")]
	RootMissing { id: String },

	/// The lesson element carries no content region to observe.
	#[error("lesson has no content region matching `{selector}`")]
	ContentRegionMissing { selector: String },

	/// The host refused to create an observer or listener.
	#[error("host error: {0}")]
	Host(String),

	/// Embedded or supplied configuration failed to parse.
	#[error("invalid configuration: {0}")]
	Config(#[from] serde_json::Error),
}

impl Error {
	/// Returns `true` for errors that must halt startup.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::RootMissing { .. } | Self::Config(_))
	}
}
