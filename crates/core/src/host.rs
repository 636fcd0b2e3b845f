//! The seam between the lifecycle logic and a concrete document.
//!
//! The watcher and controller never touch a DOM directly. A [`Host`] hands
//! out opaque node handles, answers class and selector queries, applies the
//! focus patches, and creates revocable subscriptions. Notifications flow the
//! other way: the host calls [`RootWatcher::on_root_mutations`] for the root
//! container and [`RootWatcher::on_content_mutations`] for a content region,
//! always from the single UI event stream.
//!
//! [`RootWatcher::on_root_mutations`]: crate::RootWatcher::on_root_mutations
//! [`RootWatcher::on_content_mutations`]: crate::RootWatcher::on_content_mutations

use std::fmt;

use crate::error::Result;

/// A revocable registration held by the core.
///
/// `cancel` must be idempotent; the core may call it on an already cancelled
/// handle during teardown.
pub trait Subscription {
	fn cancel(&mut self);
}

/// Document operations the lifecycle logic depends on.
pub trait Host {
	/// Opaque handle to a node. Equality is node identity.
	type Node: Clone + PartialEq + fmt::Debug;
	/// Handle for a mutation observation.
	type Observer: Subscription;
	/// Handle for a key-press listener.
	type Listener: Subscription;

	/// Returns `true` when `node` is an element carrying `class`.
	///
	/// Text nodes and other non-elements yield `false`.
	fn has_class(&self, node: &Self::Node, class: &str) -> bool;

	/// Returns the first descendant of `scope`, in document order, matching `selector`.
	fn query(&self, scope: &Self::Node, selector: &str) -> Option<Self::Node>;

	/// Subscribes to child-list changes of `root` itself.
	fn observe_children(&self, root: &Self::Node) -> Result<Self::Observer>;

	/// Subscribes to child-list changes anywhere below `region`, tagged with `session`.
	fn observe_subtree(&self, region: &Self::Node, session: SessionId) -> Result<Self::Observer>;

	/// Writes the placeholder text of an answer field.
	fn set_placeholder(&self, field: &Self::Node, text: &str);

	/// Moves input focus to `field`.
	fn focus(&self, field: &Self::Node);

	/// Installs a global key-press listener that focuses `field` whenever `key` is pressed.
	fn listen_key(&self, key: &str, field: &Self::Node) -> Result<Self::Listener>;
}

/// One child-list mutation: nodes added and removed under a single target.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<N> {
	pub added: Vec<N>,
	pub removed: Vec<N>,
}

impl<N> MutationRecord<N> {
	pub fn added(nodes: impl IntoIterator<Item = N>) -> Self {
		Self {
			added: nodes.into_iter().collect(),
			removed: Vec::new(),
		}
	}

	pub fn removed(nodes: impl IntoIterator<Item = N>) -> Self {
		Self {
			added: Vec::new(),
			removed: nodes.into_iter().collect(),
		}
	}
}

impl<N> Default for MutationRecord<N> {
	fn default() -> Self {
		Self {
			added: Vec::new(),
			removed: Vec::new(),
		}
	}
}

/// Identifies one lesson session; tags its content-region subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session#{}", self.0)
	}
}
