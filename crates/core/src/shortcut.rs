//! Revocable keyboard shortcut that refocuses an answer field.

use std::fmt;

use tracing::{debug, trace};

use crate::error::Result;
use crate::host::{Host, Subscription};

/// One installed key-press listener bound to a single field.
///
/// The listener stays attached until [`unregister`](Self::unregister) is
/// called; that call is the only way to release it and may be repeated.
pub struct ShortcutRegistration<H: Host> {
	field: H::Node,
	key: String,
	listener: Option<H::Listener>,
}

impl<H: Host> ShortcutRegistration<H> {
	/// Installs a listener that focuses `field` whenever `key` is pressed.
	pub fn register(host: &H, key: &str, field: &H::Node) -> Result<Self> {
		let listener = host.listen_key(key, field)?;
		debug!(target = "lesson_focus.shortcut", key, ?field, "shortcut registered");
		Ok(Self {
			field: field.clone(),
			key: key.to_string(),
			listener: Some(listener),
		})
	}

	/// Detaches the listener. Subsequent calls do nothing.
	pub fn unregister(&mut self) {
		let Some(mut listener) = self.listener.take() else {
			trace!(target = "lesson_focus.shortcut", "shortcut already unregistered");
			return;
		};
		listener.cancel();
		debug!(target = "lesson_focus.shortcut", key = %self.key, field = ?self.field, "shortcut unregistered");
	}

	pub fn is_active(&self) -> bool {
		self.listener.is_some()
	}

	/// The field this shortcut focuses.
	pub fn field(&self) -> &H::Node {
		&self.field
	}

	pub fn key(&self) -> &str {
		&self.key
	}
}

impl<H: Host> fmt::Debug for ShortcutRegistration<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ShortcutRegistration")
			.field("field", &self.field)
			.field("key", &self.key)
			.field("active", &self.is_active())
			.finish()
	}
}
