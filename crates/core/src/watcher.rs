//! Top-level lesson tracking.
//!
//! The [`RootWatcher`] observes the root container's direct children. When a
//! lesson element shows up it opens a [`LessonSession`]; non-dialogue lessons
//! get a [`LessonFocusController`]. When the tracked lesson element is
//! removed the session ends and its controller is cleaned up. At most one
//! session exists at a time.

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::config::FeatureConfig;
use crate::controller::LessonFocusController;
use crate::error::Result;
use crate::host::{Host, MutationRecord, SessionId, Subscription};

/// Whether a lesson is eligible for patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonMode {
	Dialogue,
	NonDialogue,
}

/// One lesson element's presence under the root container.
pub struct LessonSession<H: Host> {
	id: SessionId,
	lesson: H::Node,
	mode: LessonMode,
	controller: Option<LessonFocusController<H>>,
}

impl<H: Host> LessonSession<H> {
	pub fn id(&self) -> SessionId {
		self.id
	}

	/// The lesson element this session tracks.
	pub fn lesson(&self) -> &H::Node {
		&self.lesson
	}

	pub fn mode(&self) -> LessonMode {
		self.mode
	}

	pub fn controller(&self) -> Option<&LessonFocusController<H>> {
		self.controller.as_ref()
	}

	fn end(mut self) {
		if let Some(controller) = self.controller.as_mut() {
			controller.cleanup();
		}
		info!(target = "lesson_focus.watcher", session = %self.id, lesson = ?self.lesson, "lesson ended");
	}
}

impl<H: Host> fmt::Debug for LessonSession<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LessonSession")
			.field("id", &self.id)
			.field("lesson", &self.lesson)
			.field("mode", &self.mode)
			.field("controller", &self.controller)
			.finish()
	}
}

/// Owns the root subscription and the single active lesson session.
pub struct RootWatcher<H: Host> {
	host: H,
	config: FeatureConfig,
	root_observer: Option<H::Observer>,
	session: Option<LessonSession<H>>,
	next_session: u64,
}

impl<H: Host + Clone> RootWatcher<H> {
	/// Creates an idle watcher. Nothing is observed until [`observe`](Self::observe).
	pub fn new(host: H, config: FeatureConfig) -> Self {
		Self {
			host,
			config,
			root_observer: None,
			session: None,
			next_session: 1,
		}
	}

	/// Subscribes to child-list changes of `root`, replacing any earlier subscription.
	pub fn observe(&mut self, root: &H::Node) -> Result<()> {
		let observer = self.host.observe_children(root)?;
		if let Some(mut previous) = self.root_observer.replace(observer) {
			previous.cancel();
		}
		info!(target = "lesson_focus.watcher", ?root, "observing root container");
		Ok(())
	}

	/// Returns `true` when `node` is a lesson element. Non-elements never are.
	pub fn is_lesson_element(&self, node: &H::Node) -> bool {
		self.host.has_class(node, &self.config.lesson_class)
	}

	/// Handles one batch of child-list records from the root container.
	///
	/// Removal of the tracked lesson is handled first, so a batch that swaps
	/// one lesson for another ends the old session before the new one starts.
	pub fn on_root_mutations(&mut self, batch: &[MutationRecord<H::Node>]) {
		if let Some(session) = &self.session {
			let removed = batch.iter().flat_map(|record| &record.removed).any(|node| node == &session.lesson);
			if !removed {
				trace!(target = "lesson_focus.watcher", session = %session.id, "batch leaves lesson in place");
				return;
			}
			self.end_session();
		}

		let lesson = batch
			.iter()
			.flat_map(|record| &record.added)
			.find(|node| self.is_lesson_element(node))
			.cloned();
		match lesson {
			Some(lesson) => self.start_session(lesson),
			None => trace!(target = "lesson_focus.watcher", records = batch.len(), "no lesson element in batch"),
		}
	}

	/// Forwards a content-region notification to the active controller.
	///
	/// Notifications tagged with any other session are dropped.
	pub fn on_content_mutations(&mut self, session: SessionId) {
		let Some(active) = self.session.as_mut().filter(|s| s.id == session) else {
			trace!(target = "lesson_focus.watcher", %session, "notification for inactive session dropped");
			return;
		};
		if let Some(controller) = active.controller.as_mut() {
			controller.on_mutations();
		}
	}

	/// Stops observing the root and ends the active session. Safe to call repeatedly.
	pub fn shutdown(&mut self) {
		if let Some(mut observer) = self.root_observer.take() {
			observer.cancel();
			info!(target = "lesson_focus.watcher", "root observation stopped");
		}
		self.end_session();
	}

	fn start_session(&mut self, lesson: H::Node) {
		let id = SessionId(self.next_session);
		self.next_session += 1;

		let mode = if LessonFocusController::is_dialogue_mode(&self.host, &self.config, &lesson) {
			LessonMode::Dialogue
		} else {
			LessonMode::NonDialogue
		};

		let controller = match mode {
			LessonMode::Dialogue => None,
			LessonMode::NonDialogue => match LessonFocusController::attach(self.host.clone(), &self.config, &lesson, id) {
				Ok(controller) => Some(controller),
				Err(err) => {
					warn!(target = "lesson_focus.watcher", session = %id, error = %err, "lesson left unpatched");
					None
				}
			},
		};

		info!(target = "lesson_focus.watcher", session = %id, ?lesson, ?mode, "lesson started");
		self.session = Some(LessonSession {
			id,
			lesson,
			mode,
			controller,
		});
	}

	fn end_session(&mut self) {
		match self.session.take() {
			Some(session) => session.end(),
			None => debug!(target = "lesson_focus.watcher", "no active lesson to end"),
		}
	}

	pub fn session(&self) -> Option<&LessonSession<H>> {
		self.session.as_ref()
	}

	/// The active controller; `None` for dialogue lessons and when no lesson is open.
	pub fn controller(&self) -> Option<&LessonFocusController<H>> {
		self.session.as_ref().and_then(LessonSession::controller)
	}

	pub fn is_observing(&self) -> bool {
		self.root_observer.is_some()
	}

	pub fn config(&self) -> &FeatureConfig {
		&self.config
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::controller::ControllerPhase;
	use crate::fake::{FakeDom, FakeNode};

	fn watcher() -> (FakeDom, FakeNode, RootWatcher<FakeDom>) {
		let dom = FakeDom::new();
		let app = dom.create_element("div", &[]);
		dom.append_child(dom.document(), app);
		let mut watcher = RootWatcher::new(dom.clone(), FeatureConfig::default());
		watcher.observe(&app).unwrap();
		(dom, app, watcher)
	}

	fn lesson_element(dom: &FakeDom, classes: &[&str]) -> FakeNode {
		let lesson = dom.create_element("div", classes);
		let content = dom.create_element("div", &["mainContent"]);
		dom.append_child(lesson, content);
		lesson
	}

	#[test]
	fn unrelated_batch_leaves_state_unchanged() {
		let (dom, app, mut watcher) = watcher();
		dom.append_children(app, &[dom.create_text(), dom.create_element("div", &["banner"])]);
		dom.deliver(&mut watcher);

		assert!(watcher.session().is_none());
		assert!(watcher.controller().is_none());
	}

	#[test]
	fn non_dialogue_lesson_gets_controller() {
		let (dom, app, mut watcher) = watcher();
		let lesson = lesson_element(&dom, &["mainCourse"]);
		dom.append_child(app, lesson);
		dom.deliver(&mut watcher);

		let session = watcher.session().unwrap();
		assert_eq!(session.lesson(), &lesson);
		assert_eq!(session.mode(), LessonMode::NonDialogue);
		assert_eq!(watcher.controller().unwrap().phase(), ControllerPhase::Watching);
		assert_eq!(dom.live_subtree_observers(), 1);
	}

	#[test]
	fn dialogue_lesson_is_tracked_without_controller() {
		let (dom, app, mut watcher) = watcher();
		let lesson = lesson_element(&dom, &["mainCourse", "dialogMode"]);
		dom.append_child(app, lesson);
		dom.deliver(&mut watcher);

		assert_eq!(watcher.session().unwrap().mode(), LessonMode::Dialogue);
		assert!(watcher.controller().is_none());
		assert_eq!(dom.live_subtree_observers(), 0);

		dom.remove(lesson);
		dom.deliver(&mut watcher);
		assert!(watcher.session().is_none());
	}

	#[test]
	fn only_first_lesson_in_batch_is_used() {
		let (dom, app, mut watcher) = watcher();
		let first = lesson_element(&dom, &["mainCourse"]);
		let second = lesson_element(&dom, &["mainCourse"]);
		dom.append_children(app, &[dom.create_text(), first, second]);
		dom.deliver(&mut watcher);

		assert_eq!(watcher.session().unwrap().lesson(), &first);
		assert_eq!(dom.live_subtree_observers(), 1);
	}

	#[test]
	fn additions_ignored_while_session_active() {
		let (dom, app, mut watcher) = watcher();
		let first = lesson_element(&dom, &["mainCourse"]);
		dom.append_child(app, first);
		dom.deliver(&mut watcher);
		let id = watcher.session().unwrap().id();

		dom.append_child(app, dom.create_element("div", &["toast"]));
		dom.deliver(&mut watcher);

		assert_eq!(watcher.session().unwrap().id(), id);
	}

	#[test]
	fn swap_in_one_batch_replaces_session() {
		let (dom, app, mut watcher) = watcher();
		let old = lesson_element(&dom, &["mainCourse"]);
		dom.append_child(app, old);
		dom.deliver(&mut watcher);
		let old_id = watcher.session().unwrap().id();

		let new = lesson_element(&dom, &["mainCourse"]);
		dom.remove(old);
		dom.append_child(app, new);
		dom.deliver(&mut watcher);

		let session = watcher.session().unwrap();
		assert_eq!(session.lesson(), &new);
		assert_ne!(session.id(), old_id);
		assert_eq!(dom.live_subtree_observers(), 1);
	}

	#[test]
	fn missing_content_region_tracks_session_without_controller() {
		let (dom, app, mut watcher) = watcher();
		let lesson = dom.create_element("div", &["mainCourse"]);
		dom.append_child(app, lesson);
		dom.deliver(&mut watcher);

		assert_eq!(watcher.session().unwrap().mode(), LessonMode::NonDialogue);
		assert!(watcher.controller().is_none());

		dom.remove(lesson);
		dom.deliver(&mut watcher);
		assert!(watcher.session().is_none());
	}

	#[test]
	fn stale_session_notifications_are_dropped() {
		let (dom, app, mut watcher) = watcher();
		let lesson = lesson_element(&dom, &["mainCourse"]);
		dom.append_child(app, lesson);
		dom.deliver(&mut watcher);
		let id = watcher.session().unwrap().id();

		watcher.on_content_mutations(SessionId(id.0 + 100));
		assert_eq!(watcher.controller().unwrap().phase(), ControllerPhase::Watching);
	}

	#[test]
	fn shutdown_releases_everything() {
		let (dom, app, mut watcher) = watcher();
		let lesson = lesson_element(&dom, &["mainCourse"]);
		dom.append_child(app, lesson);
		dom.deliver(&mut watcher);

		watcher.shutdown();
		watcher.shutdown();

		assert!(!watcher.is_observing());
		assert!(watcher.session().is_none());
		assert_eq!(dom.live_observers(), 0);
	}

	#[test]
	fn observe_again_replaces_root_subscription() {
		let (dom, app, mut watcher) = watcher();
		watcher.observe(&app).unwrap();
		assert_eq!(dom.live_observers(), 1);
	}
}
