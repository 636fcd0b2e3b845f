//! In-memory document for exercising the watcher without a browser.
//!
//! [`FakeDom`] implements [`Host`] over a small node arena. Mutations made
//! through it queue child-list notifications for every live observer, the way
//! a browser queues `MutationObserver` records, and nothing reaches the core
//! until the test calls [`FakeDom::deliver`].
//!
//! # Example
//!
//! ```ignore
//! let dom = FakeDom::new();
//! let app = dom.create_element("div", &[]);
//! dom.append_child(dom.document(), app);
//!
//! let mut watcher = RootWatcher::new(dom.clone(), FeatureConfig::default());
//! watcher.observe(&app)?;
//!
//! let lesson = dom.create_element("div", &["mainCourse"]);
//! dom.append_child(app, lesson);
//! dom.deliver(&mut watcher);
//! assert!(watcher.controller().is_some());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::host::{Host, MutationRecord, SessionId, Subscription};
use crate::watcher::RootWatcher;

/// Handle to a node in a [`FakeDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeNode(usize);

/// A queued notification, as the host would dispatch it.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
	/// Batch of child-list records for a root observer.
	Root(Vec<MutationRecord<FakeNode>>),
	/// Something changed below a content region observed for `SessionId`.
	Content(SessionId),
}

/// Shared, cheaply cloneable in-memory document.
#[derive(Clone)]
pub struct FakeDom {
	inner: Rc<RefCell<DomState>>,
}

enum NodeKind {
	Document,
	Element {
		tag: String,
		classes: Vec<String>,
		placeholder: Option<String>,
	},
	Text,
}

struct NodeData {
	kind: NodeKind,
	parent: Option<FakeNode>,
	children: Vec<FakeNode>,
}

#[derive(Clone, Copy)]
enum Scope {
	Children,
	Subtree(SessionId),
}

struct ObserverEntry {
	target: FakeNode,
	scope: Scope,
	live: bool,
}

struct ListenerEntry {
	key: String,
	field: FakeNode,
	live: bool,
}

enum Pending {
	Root { observer: usize, record: MutationRecord<FakeNode> },
	Content { observer: usize, session: SessionId },
}

impl Pending {
	fn observer(&self) -> usize {
		match self {
			Self::Root { observer, .. } | Self::Content { observer, .. } => *observer,
		}
	}
}

#[derive(Default)]
struct DomState {
	nodes: Vec<NodeData>,
	focused: Option<FakeNode>,
	observers: Vec<ObserverEntry>,
	listeners: Vec<ListenerEntry>,
	pending: Vec<Pending>,
	refuse_subscriptions: bool,
}

impl DomState {
	fn node(&self, node: FakeNode) -> &NodeData {
		&self.nodes[node.0]
	}

	fn push(&mut self, kind: NodeKind) -> FakeNode {
		self.nodes.push(NodeData {
			kind,
			parent: None,
			children: Vec::new(),
		});
		FakeNode(self.nodes.len() - 1)
	}

	fn is_ancestor_or_self(&self, ancestor: FakeNode, node: FakeNode) -> bool {
		let mut current = Some(node);
		while let Some(n) = current {
			if n == ancestor {
				return true;
			}
			current = self.node(n).parent;
		}
		false
	}

	fn is_connected(&self, node: FakeNode) -> bool {
		self.is_ancestor_or_self(FakeNode(0), node)
	}

	fn has_class(&self, node: FakeNode, class: &str) -> bool {
		match &self.node(node).kind {
			NodeKind::Element { classes, .. } => classes.iter().any(|c| c == class),
			_ => false,
		}
	}

	fn matches(&self, node: FakeNode, selector: &str) -> bool {
		if let Some(class) = selector.strip_prefix('.') {
			return self.has_class(node, class);
		}
		match &self.node(node).kind {
			NodeKind::Element { tag, .. } => tag.eq_ignore_ascii_case(selector),
			_ => false,
		}
	}

	fn find_descendant(&self, scope: FakeNode, selector: &str) -> Option<FakeNode> {
		for &child in &self.node(scope).children {
			if self.matches(child, selector) {
				return Some(child);
			}
			if let Some(found) = self.find_descendant(child, selector) {
				return Some(found);
			}
		}
		None
	}

	/// Queues notifications for a child-list change under `parent`.
	fn record(&mut self, parent: FakeNode, record: MutationRecord<FakeNode>) {
		let mut queued = Vec::new();
		for (index, observer) in self.observers.iter().enumerate().filter(|(_, o)| o.live) {
			match observer.scope {
				Scope::Children if observer.target == parent => queued.push(Pending::Root {
					observer: index,
					record: record.clone(),
				}),
				Scope::Subtree(session) if self.is_ancestor_or_self(observer.target, parent) => {
					queued.push(Pending::Content { observer: index, session })
				}
				_ => {}
			}
		}
		self.pending.extend(queued);
	}

	fn detach(&mut self, child: FakeNode) {
		let Some(parent) = self.node(child).parent else {
			return;
		};
		self.record(parent, MutationRecord::removed([child]));
		self.nodes[parent.0].children.retain(|&c| c != child);
		self.nodes[child.0].parent = None;
		if self.focused.is_some_and(|f| !self.is_connected(f)) {
			self.focused = None;
		}
	}

	/// Drains the queue, coalescing records per observer in creation order.
	fn take_notifications(&mut self) -> Vec<Notification> {
		let pending = std::mem::take(&mut self.pending);
		let mut order: Vec<usize> = pending.iter().map(Pending::observer).collect();
		order.sort_unstable();
		order.dedup();

		let mut notifications = Vec::new();
		for observer in order {
			let mut batch = Vec::new();
			let mut content = None;
			for entry in pending.iter().filter(|p| p.observer() == observer) {
				match entry {
					Pending::Root { record, .. } => batch.push(record.clone()),
					Pending::Content { session, .. } => content = Some(*session),
				}
			}
			if !batch.is_empty() {
				notifications.push(Notification::Root(batch));
			}
			if let Some(session) = content {
				notifications.push(Notification::Content(session));
			}
		}
		notifications
	}
}

impl Default for FakeDom {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeDom {
	/// Creates an empty document.
	pub fn new() -> Self {
		let mut state = DomState::default();
		state.push(NodeKind::Document);
		Self {
			inner: Rc::new(RefCell::new(state)),
		}
	}

	/// The document node; everything connected descends from it.
	pub fn document(&self) -> FakeNode {
		FakeNode(0)
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str, classes: &[&str]) -> FakeNode {
		self.inner.borrow_mut().push(NodeKind::Element {
			tag: tag.to_string(),
			classes: classes.iter().map(|c| c.to_string()).collect(),
			placeholder: None,
		})
	}

	/// Creates a detached text node.
	pub fn create_text(&self) -> FakeNode {
		self.inner.borrow_mut().push(NodeKind::Text)
	}

	/// Appends `child` to `parent`, moving it if already attached.
	pub fn append_child(&self, parent: FakeNode, child: FakeNode) {
		self.append_children(parent, &[child]);
	}

	/// Appends several nodes in one mutation record.
	pub fn append_children(&self, parent: FakeNode, children: &[FakeNode]) {
		let mut state = self.inner.borrow_mut();
		for &child in children {
			state.detach(child);
			state.nodes[child.0].parent = Some(parent);
			state.nodes[parent.0].children.push(child);
		}
		state.record(parent, MutationRecord::added(children.iter().copied()));
	}

	/// Detaches `node` from its parent; a detached node is left alone.
	pub fn remove(&self, node: FakeNode) {
		self.inner.borrow_mut().detach(node);
	}

	/// Adds a class without queuing a child-list record.
	pub fn add_class(&self, node: FakeNode, class: &str) {
		if let NodeKind::Element { classes, .. } = &mut self.inner.borrow_mut().nodes[node.0].kind {
			classes.push(class.to_string());
		}
	}

	pub fn placeholder(&self, node: FakeNode) -> Option<String> {
		match &self.inner.borrow().node(node).kind {
			NodeKind::Element { placeholder, .. } => placeholder.clone(),
			_ => None,
		}
	}

	pub fn focused(&self) -> Option<FakeNode> {
		self.inner.borrow().focused
	}

	/// Dispatches a key press to every live listener for `key`, returning how many fired.
	pub fn press_key(&self, key: &str) -> usize {
		let targets: Vec<FakeNode> = self
			.inner
			.borrow()
			.listeners
			.iter()
			.filter(|l| l.live && l.key == key)
			.map(|l| l.field)
			.collect();
		for field in &targets {
			Host::focus(self, field);
		}
		targets.len()
	}

	pub fn live_key_listeners(&self) -> usize {
		self.inner.borrow().listeners.iter().filter(|l| l.live).count()
	}

	pub fn live_observers(&self) -> usize {
		self.inner.borrow().observers.iter().filter(|o| o.live).count()
	}

	/// Live observers watching a content region.
	pub fn live_subtree_observers(&self) -> usize {
		self.inner
			.borrow()
			.observers
			.iter()
			.filter(|o| o.live && matches!(o.scope, Scope::Subtree(_)))
			.count()
	}

	/// Makes every later observe/listen call fail with [`Error::Host`].
	pub fn refuse_subscriptions(&self, refuse: bool) {
		self.inner.borrow_mut().refuse_subscriptions = refuse;
	}

	/// Removes and returns queued notifications without dispatching them.
	pub fn take_notifications(&self) -> Vec<Notification> {
		self.inner.borrow_mut().take_notifications()
	}

	/// Queues a content notification for every live subtree observer of `session`.
	///
	/// Stands in for attribute or style churn the real observer would report.
	pub fn touch(&self, session: SessionId) {
		let mut state = self.inner.borrow_mut();
		let queued: Vec<Pending> = state
			.observers
			.iter()
			.enumerate()
			.filter(|(_, o)| o.live && matches!(o.scope, Scope::Subtree(s) if s == session))
			.map(|(observer, _)| Pending::Content { observer, session })
			.collect();
		state.pending.extend(queued);
	}

	/// Dispatches queued notifications to `watcher` until the queue is empty.
	pub fn deliver(&self, watcher: &mut RootWatcher<FakeDom>) {
		loop {
			let notifications = self.take_notifications();
			if notifications.is_empty() {
				break;
			}
			for notification in notifications {
				match notification {
					Notification::Root(batch) => watcher.on_root_mutations(&batch),
					Notification::Content(session) => watcher.on_content_mutations(session),
				}
			}
		}
	}

	fn subscribe(&self, target: FakeNode, scope: Scope) -> Result<FakeObserver> {
		let mut state = self.inner.borrow_mut();
		if state.refuse_subscriptions {
			return Err(Error::Host("observer refused".into()));
		}
		state.observers.push(ObserverEntry { target, scope, live: true });
		Ok(FakeObserver {
			dom: self.clone(),
			index: state.observers.len() - 1,
		})
	}
}

/// Observer handle; cancelling drops its queued records.
pub struct FakeObserver {
	dom: FakeDom,
	index: usize,
}

impl Subscription for FakeObserver {
	fn cancel(&mut self) {
		let mut state = self.dom.inner.borrow_mut();
		state.observers[self.index].live = false;
		let index = self.index;
		state.pending.retain(|p| p.observer() != index);
	}
}

/// Key listener handle.
pub struct FakeListener {
	dom: FakeDom,
	index: usize,
}

impl Subscription for FakeListener {
	fn cancel(&mut self) {
		self.dom.inner.borrow_mut().listeners[self.index].live = false;
	}
}

impl Host for FakeDom {
	type Node = FakeNode;
	type Observer = FakeObserver;
	type Listener = FakeListener;

	fn has_class(&self, node: &FakeNode, class: &str) -> bool {
		self.inner.borrow().has_class(*node, class)
	}

	fn query(&self, scope: &FakeNode, selector: &str) -> Option<FakeNode> {
		self.inner.borrow().find_descendant(*scope, selector)
	}

	fn observe_children(&self, root: &FakeNode) -> Result<FakeObserver> {
		self.subscribe(*root, Scope::Children)
	}

	fn observe_subtree(&self, region: &FakeNode, session: SessionId) -> Result<FakeObserver> {
		self.subscribe(*region, Scope::Subtree(session))
	}

	fn set_placeholder(&self, field: &FakeNode, text: &str) {
		if let NodeKind::Element { placeholder, .. } = &mut self.inner.borrow_mut().nodes[field.0].kind {
			*placeholder = Some(text.to_string());
		}
	}

	fn focus(&self, field: &FakeNode) {
		let mut state = self.inner.borrow_mut();
		let focusable = matches!(state.node(*field).kind, NodeKind::Element { .. }) && state.is_connected(*field);
		if focusable {
			state.focused = Some(*field);
		}
	}

	fn listen_key(&self, key: &str, field: &FakeNode) -> Result<FakeListener> {
		let mut state = self.inner.borrow_mut();
		if state.refuse_subscriptions {
			return Err(Error::Host("listener refused".into()));
		}
		state.listeners.push(ListenerEntry {
			key: key.to_string(),
			field: *field,
			live: true,
		});
		Ok(FakeListener {
			dom: self.clone(),
			index: state.listeners.len() - 1,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn query_walks_descendants_in_document_order() {
		let dom = FakeDom::new();
		let outer = dom.create_element("div", &["lesson"]);
		let first = dom.create_element("div", &[]);
		let nested = dom.create_element("textarea", &[]);
		let second = dom.create_element("textarea", &[]);
		dom.append_child(dom.document(), outer);
		dom.append_children(outer, &[first, second]);
		dom.append_child(first, nested);

		assert_eq!(dom.query(&outer, "textarea"), Some(nested));
		assert_eq!(dom.query(&dom.document(), ".lesson"), Some(outer));
		assert_eq!(dom.query(&outer, ".missing"), None);
	}

	#[test]
	fn text_nodes_have_no_classes() {
		let dom = FakeDom::new();
		let text = dom.create_text();
		assert!(!dom.has_class(&text, "mainCourse"));
		assert_eq!(dom.query(&text, "textarea"), None);
	}

	#[test]
	fn child_observer_sees_only_direct_children() {
		let dom = FakeDom::new();
		let root = dom.create_element("div", &[]);
		dom.append_child(dom.document(), root);
		let _observer = dom.observe_children(&root).unwrap();

		let child = dom.create_element("div", &[]);
		let grandchild = dom.create_element("span", &[]);
		dom.append_child(root, child);
		dom.append_child(child, grandchild);

		assert_eq!(
			dom.take_notifications(),
			vec![Notification::Root(vec![MutationRecord::added([child])])]
		);
	}

	#[test]
	fn subtree_observer_coalesces_into_one_notification() {
		let dom = FakeDom::new();
		let region = dom.create_element("div", &[]);
		dom.append_child(dom.document(), region);
		let _observer = dom.observe_subtree(&region, SessionId(7)).unwrap();

		let child = dom.create_element("div", &[]);
		dom.append_child(region, child);
		dom.append_child(child, dom.create_element("textarea", &[]));

		assert_eq!(dom.take_notifications(), vec![Notification::Content(SessionId(7))]);
	}

	#[test]
	fn cancelled_observer_drops_pending_records() {
		let dom = FakeDom::new();
		let root = dom.create_element("div", &[]);
		dom.append_child(dom.document(), root);
		let mut observer = dom.observe_children(&root).unwrap();

		dom.append_child(root, dom.create_element("div", &[]));
		observer.cancel();
		observer.cancel();

		assert!(dom.take_notifications().is_empty());
		assert_eq!(dom.live_observers(), 0);
	}

	#[test]
	fn focus_ignores_detached_nodes() {
		let dom = FakeDom::new();
		let field = dom.create_element("textarea", &[]);
		dom.focus(&field);
		assert_eq!(dom.focused(), None);

		dom.append_child(dom.document(), field);
		dom.focus(&field);
		assert_eq!(dom.focused(), Some(field));

		dom.remove(field);
		assert_eq!(dom.focused(), None);
	}
}
