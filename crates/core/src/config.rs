//! Build-time selectors and strings loaded from `lesson-focus.json`.

use std::sync::LazyLock;

use serde::Deserialize;

use crate::error::Result;

static BUILTIN: LazyLock<FeatureConfig> = LazyLock::new(|| {
	let json = include_str!("../lesson-focus.json");
	FeatureConfig::from_json(json).expect("Failed to parse lesson-focus.json")
});

/// Selectors, placeholder text, and shortcut key for one page integration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
	/// Id of the stable container lessons are mounted into.
	pub root_id: String,
	/// Class marking a lesson element.
	pub lesson_class: String,
	/// Class marking a dialogue lesson, which is left untouched.
	pub dialogue_class: String,
	/// Selector of the content region inside a lesson.
	pub content_selector: String,
	/// Selector of the answer field inside the content region.
	pub field_selector: String,
	/// Shortened placeholder written into the answer field.
	pub placeholder: String,
	/// `KeyboardEvent.key` value that refocuses the answer field.
	pub shortcut_key: String,
}

impl FeatureConfig {
	/// Returns the configuration embedded at build time.
	pub fn builtin() -> &'static FeatureConfig {
		&BUILTIN
	}

	/// Parses a configuration, filling absent fields with defaults.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}
}

impl Default for FeatureConfig {
	fn default() -> Self {
		Self {
			root_id: "app".to_string(),
			lesson_class: "mainCourse".to_string(),
			dialogue_class: "dialogMode".to_string(),
			content_selector: ".mainContent".to_string(),
			field_selector: "textarea".to_string(),
			placeholder: "Enter text.".to_string(),
			shortcut_key: "Tab".to_string(),
		}
	}
}
