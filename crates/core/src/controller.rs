//! Per-lesson answer-field patching.
//!
//! A [`LessonFocusController`] watches the content region of one lesson.
//! Whenever anything below it changes it looks for the answer field again:
//! if one is present it gets the short placeholder, input focus, and a
//! keyboard shortcut that pulls focus back to it; if none is present any
//! shortcut is revoked.
//!
//! # Lifecycle
//!
//! ```text
//! [inert] --(attach)--------> [watching]
//! [watching] --(field)------> [patched]   shortcut active
//! [patched] --(no field)----> [watching]  shortcut revoked
//! [watching|patched] --(cleanup)--> [disposed]
//! ```
//!
//! `Disposed` is terminal: notifications are ignored and `cleanup` does
//! nothing further.

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::config::FeatureConfig;
use crate::error::{Error, Result};
use crate::host::{Host, SessionId, Subscription};
use crate::shortcut::ShortcutRegistration;

/// Observable lifecycle phase of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
	/// Not yet observing. Only exists before [`LessonFocusController::attach`] returns.
	Inert,
	/// Observing the content region, no answer field patched.
	Watching,
	/// An answer field is patched and its shortcut is live.
	Patched,
	/// Released; terminal.
	Disposed,
}

enum FocusState<H: Host> {
	Watching,
	Patched {
		field: H::Node,
		shortcut: ShortcutRegistration<H>,
	},
	Disposed,
}

/// Keeps the answer field of one lesson patched until [`cleanup`](Self::cleanup).
pub struct LessonFocusController<H: Host> {
	host: H,
	session: SessionId,
	placeholder: String,
	field_selector: String,
	shortcut_key: String,
	content: H::Node,
	observer: Option<H::Observer>,
	state: FocusState<H>,
}

impl<H: Host> LessonFocusController<H> {
	/// Returns `true` when `lesson` is a dialogue lesson, which is never patched.
	pub fn is_dialogue_mode(host: &H, config: &FeatureConfig, lesson: &H::Node) -> bool {
		host.has_class(lesson, &config.dialogue_class)
	}

	/// Locates the lesson's content region and starts observing its subtree.
	///
	/// # Errors
	///
	/// [`Error::ContentRegionMissing`] when the lesson has no content region,
	/// or the host's error when it refuses the subscription.
	pub fn attach(host: H, config: &FeatureConfig, lesson: &H::Node, session: SessionId) -> Result<Self> {
		let content = host
			.query(lesson, &config.content_selector)
			.ok_or_else(|| Error::ContentRegionMissing {
				selector: config.content_selector.clone(),
			})?;
		let observer = host.observe_subtree(&content, session)?;
		info!(target = "lesson_focus.controller", %session, ?content, "watching content region");

		Ok(Self {
			host,
			session,
			placeholder: config.placeholder.clone(),
			field_selector: config.field_selector.clone(),
			shortcut_key: config.shortcut_key.clone(),
			content,
			observer: Some(observer),
			state: FocusState::Watching,
		})
	}

	/// Reacts to a change anywhere below the content region.
	///
	/// Patching is repeated on every notification, even when the field is
	/// unchanged. That refocuses the field on unrelated churn inside the
	/// region.
	pub fn on_mutations(&mut self) {
		if matches!(self.state, FocusState::Disposed) {
			trace!(target = "lesson_focus.controller", session = %self.session, "notification after cleanup ignored");
			return;
		}

		match self.host.query(&self.content, &self.field_selector) {
			Some(field) => self.patch(field),
			None => self.release_field(),
		}
	}

	fn patch(&mut self, field: H::Node) {
		self.host.set_placeholder(&field, &self.placeholder);
		self.host.focus(&field);

		if let FocusState::Patched { mut shortcut, .. } = std::mem::replace(&mut self.state, FocusState::Watching) {
			shortcut.unregister();
		}

		match ShortcutRegistration::register(&self.host, &self.shortcut_key, &field) {
			Ok(shortcut) => {
				debug!(target = "lesson_focus.controller", session = %self.session, ?field, "answer field patched");
				self.state = FocusState::Patched { field, shortcut };
			}
			Err(err) => {
				warn!(target = "lesson_focus.controller", session = %self.session, error = %err, "shortcut not installed");
			}
		}
	}

	fn release_field(&mut self) {
		if let FocusState::Patched { field, mut shortcut } = std::mem::replace(&mut self.state, FocusState::Watching) {
			shortcut.unregister();
			debug!(target = "lesson_focus.controller", session = %self.session, ?field, "answer field gone");
		}
	}

	/// Stops observing and revokes the shortcut. Safe to call repeatedly.
	pub fn cleanup(&mut self) {
		if let Some(mut observer) = self.observer.take() {
			observer.cancel();
		}
		match std::mem::replace(&mut self.state, FocusState::Disposed) {
			FocusState::Patched { mut shortcut, .. } => shortcut.unregister(),
			FocusState::Watching => {}
			FocusState::Disposed => return,
		}
		info!(target = "lesson_focus.controller", session = %self.session, "controller disposed");
	}

	pub fn phase(&self) -> ControllerPhase {
		match self.state {
			FocusState::Watching => ControllerPhase::Watching,
			FocusState::Patched { .. } => ControllerPhase::Patched,
			FocusState::Disposed => ControllerPhase::Disposed,
		}
	}

	/// The answer field currently patched, if any.
	pub fn patched_field(&self) -> Option<&H::Node> {
		match &self.state {
			FocusState::Patched { field, .. } => Some(field),
			_ => None,
		}
	}

	pub fn has_shortcut(&self) -> bool {
		matches!(&self.state, FocusState::Patched { shortcut, .. } if shortcut.is_active())
	}

	pub fn is_observing(&self) -> bool {
		self.observer.is_some()
	}

	pub fn session(&self) -> SessionId {
		self.session
	}

	pub fn content_region(&self) -> &H::Node {
		&self.content
	}
}

impl<H: Host> fmt::Debug for LessonFocusController<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LessonFocusController")
			.field("session", &self.session)
			.field("content", &self.content)
			.field("phase", &self.phase())
			.field("observing", &self.is_observing())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fake::{FakeDom, FakeNode, Notification};

	struct Lesson {
		dom: FakeDom,
		lesson: FakeNode,
		content: FakeNode,
	}

	fn lesson(classes: &[&str]) -> Lesson {
		let dom = FakeDom::new();
		let lesson = dom.create_element("div", classes);
		let content = dom.create_element("div", &["mainContent"]);
		dom.append_child(dom.document(), lesson);
		dom.append_child(lesson, content);
		Lesson { dom, lesson, content }
	}

	fn pump(dom: &FakeDom, controller: &mut LessonFocusController<FakeDom>) {
		for notification in dom.take_notifications() {
			if let Notification::Content(session) = notification {
				assert_eq!(session, controller.session());
				controller.on_mutations();
			}
		}
	}

	#[test]
	fn dialogue_predicate_reads_marker_class() {
		let config = FeatureConfig::default();
		let plain = lesson(&["mainCourse"]);
		assert!(!LessonFocusController::is_dialogue_mode(&plain.dom, &config, &plain.lesson));

		let dialogue = lesson(&["mainCourse", "dialogMode"]);
		assert!(LessonFocusController::is_dialogue_mode(&dialogue.dom, &config, &dialogue.lesson));
	}

	#[test]
	fn attach_observes_the_content_region() {
		let Lesson { dom, lesson, content } = lesson(&["mainCourse"]);
		let controller = LessonFocusController::attach(dom.clone(), &FeatureConfig::default(), &lesson, SessionId(1)).unwrap();

		assert_eq!(controller.phase(), ControllerPhase::Watching);
		assert_eq!(controller.content_region(), &content);
		assert!(controller.is_observing());
		assert_eq!(dom.live_subtree_observers(), 1);
	}

	#[test]
	fn attach_without_content_region_fails() {
		let dom = FakeDom::new();
		let lesson = dom.create_element("div", &["mainCourse"]);
		dom.append_child(dom.document(), lesson);

		let err = LessonFocusController::attach(dom.clone(), &FeatureConfig::default(), &lesson, SessionId(1)).unwrap_err();
		assert!(matches!(err, Error::ContentRegionMissing { .. }));
		assert_eq!(dom.live_observers(), 0);
	}

	#[test]
	fn field_is_patched_and_released() {
		let Lesson { dom, lesson, content } = lesson(&["mainCourse"]);
		let mut controller = LessonFocusController::attach(dom.clone(), &FeatureConfig::default(), &lesson, SessionId(1)).unwrap();

		let wrapper = dom.create_element("div", &[]);
		let field = dom.create_element("textarea", &[]);
		dom.append_child(content, wrapper);
		dom.append_child(wrapper, field);
		pump(&dom, &mut controller);

		assert_eq!(controller.phase(), ControllerPhase::Patched);
		assert_eq!(controller.patched_field(), Some(&field));
		assert_eq!(dom.placeholder(field).as_deref(), Some("Enter text."));
		assert_eq!(dom.focused(), Some(field));
		assert!(controller.has_shortcut());

		dom.remove(wrapper);
		pump(&dom, &mut controller);

		assert_eq!(controller.phase(), ControllerPhase::Watching);
		assert!(!controller.has_shortcut());
		assert_eq!(dom.live_key_listeners(), 0);
		assert!(controller.is_observing());
	}

	#[test]
	fn repeated_notifications_keep_one_listener() {
		let Lesson { dom, lesson, content } = lesson(&["mainCourse"]);
		let mut controller = LessonFocusController::attach(dom.clone(), &FeatureConfig::default(), &lesson, SessionId(3)).unwrap();

		dom.append_child(content, dom.create_element("textarea", &[]));
		pump(&dom, &mut controller);
		for _ in 0..3 {
			dom.touch(SessionId(3));
			pump(&dom, &mut controller);
		}

		assert_eq!(dom.live_key_listeners(), 1);
	}

	#[test]
	fn refused_shortcut_leaves_field_patched_but_watching() {
		let Lesson { dom, lesson, content } = lesson(&["mainCourse"]);
		let mut controller = LessonFocusController::attach(dom.clone(), &FeatureConfig::default(), &lesson, SessionId(1)).unwrap();

		let field = dom.create_element("textarea", &[]);
		dom.append_child(content, field);
		dom.refuse_subscriptions(true);
		pump(&dom, &mut controller);

		assert_eq!(dom.placeholder(field).as_deref(), Some("Enter text."));
		assert_eq!(controller.phase(), ControllerPhase::Watching);
		assert_eq!(dom.live_key_listeners(), 0);
	}

	#[test]
	fn cleanup_is_idempotent_and_terminal() {
		let Lesson { dom, lesson, content } = lesson(&["mainCourse"]);
		let mut controller = LessonFocusController::attach(dom.clone(), &FeatureConfig::default(), &lesson, SessionId(1)).unwrap();
		dom.append_child(content, dom.create_element("textarea", &[]));
		pump(&dom, &mut controller);

		controller.cleanup();
		assert_eq!(controller.phase(), ControllerPhase::Disposed);
		assert_eq!(dom.live_observers(), 0);
		assert_eq!(dom.live_key_listeners(), 0);

		controller.cleanup();
		assert_eq!(controller.phase(), ControllerPhase::Disposed);
		assert!(!controller.is_observing());

		controller.on_mutations();
		assert_eq!(controller.phase(), ControllerPhase::Disposed);
		assert_eq!(dom.live_key_listeners(), 0);
	}
}
