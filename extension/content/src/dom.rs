//! [`Host`] implementation over the live page DOM.
//!
//! Mutation observers and key listeners hold their JS callbacks in the
//! returned handles. Cancelling (or dropping) a handle detaches it on the JS
//! side first, so the browser never calls into a freed closure.

use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};

use js_sys::Array;
use lesson_focus::{Error, Host, MutationRecord, Result, RootWatcher, SessionId, Subscription};
use tracing::{trace, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
	Document, Element, EventTarget, HtmlElement, HtmlInputElement, HtmlTextAreaElement, KeyboardEvent, MutationObserver,
	MutationObserverInit, Node, NodeList,
};

/// The watcher as shared between the entry points and DOM callbacks.
pub type SharedWatcher = Rc<RefCell<RootWatcher<DomHost>>>;

type ObserverCallback = Closure<dyn FnMut(Array, MutationObserver)>;

/// Page document plus the route back into the watcher for notifications.
#[derive(Clone)]
pub struct DomHost {
	document: Document,
	watcher: Rc<OnceCell<Weak<RefCell<RootWatcher<DomHost>>>>>,
}

impl DomHost {
	pub fn new(document: Document) -> Self {
		Self {
			document,
			watcher: Rc::new(OnceCell::new()),
		}
	}

	/// Routes notifications from observers created by this host to `watcher`.
	///
	/// Must happen before the first observe call; later calls are ignored.
	pub fn bind(&self, watcher: &SharedWatcher) {
		if self.watcher.set(Rc::downgrade(watcher)).is_err() {
			warn!(target = "lesson_focus.content", "host already bound to a watcher");
		}
	}

	fn bound_watcher(&self) -> Result<Weak<RefCell<RootWatcher<DomHost>>>> {
		self.watcher
			.get()
			.cloned()
			.ok_or_else(|| Error::Host("host is not bound to a watcher".into()))
	}

	fn observe(&self, target: &Node, subtree: bool, callback: ObserverCallback) -> Result<DomObserver> {
		let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(|err| host_error("MutationObserver", err))?;
		let init = MutationObserverInit::new();
		init.set_child_list(true);
		init.set_subtree(subtree);
		observer
			.observe_with_options(target, &init)
			.map_err(|err| host_error("MutationObserver.observe", err))?;
		Ok(DomObserver {
			observer,
			_callback: callback,
			connected: true,
		})
	}
}

/// Runs `f` against the watcher if it is still alive and not already borrowed.
fn dispatch(watcher: &Weak<RefCell<RootWatcher<DomHost>>>, f: impl FnOnce(&mut RootWatcher<DomHost>)) {
	let Some(shared) = watcher.upgrade() else {
		trace!(target = "lesson_focus.content", "notification after watcher dropped");
		return;
	};
	let Ok(mut guard) = shared.try_borrow_mut() else {
		warn!(target = "lesson_focus.content", "watcher busy, notification dropped");
		return;
	};
	f(&mut guard);
}

fn host_error(operation: &str, err: JsValue) -> Error {
	Error::Host(format!("{operation}: {err:?}"))
}

fn node_list(list: &NodeList) -> Vec<Node> {
	(0..list.length()).filter_map(|index| list.item(index)).collect()
}

fn to_batch(records: &Array) -> Vec<MutationRecord<Node>> {
	records
		.iter()
		.filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
		.map(|record| MutationRecord {
			added: node_list(&record.added_nodes()),
			removed: node_list(&record.removed_nodes()),
		})
		.collect()
}

fn focus_node(node: &Node) {
	let Some(element) = node.dyn_ref::<HtmlElement>() else {
		trace!(target = "lesson_focus.content", "focus target is not an HTML element");
		return;
	};
	if let Err(err) = element.focus() {
		warn!(target = "lesson_focus.content", error = ?err, "focus failed");
	}
}

/// A connected `MutationObserver` and the closure it calls.
pub struct DomObserver {
	observer: MutationObserver,
	_callback: ObserverCallback,
	connected: bool,
}

impl Subscription for DomObserver {
	fn cancel(&mut self) {
		if std::mem::replace(&mut self.connected, false) {
			self.observer.disconnect();
		}
	}
}

impl Drop for DomObserver {
	fn drop(&mut self) {
		self.cancel();
	}
}

/// A `keydown` listener and the closure it calls.
pub struct DomListener {
	target: EventTarget,
	callback: Closure<dyn FnMut(KeyboardEvent)>,
	attached: bool,
}

impl Subscription for DomListener {
	fn cancel(&mut self) {
		if !std::mem::replace(&mut self.attached, false) {
			return;
		}
		if let Err(err) = self
			.target
			.remove_event_listener_with_callback("keydown", self.callback.as_ref().unchecked_ref())
		{
			warn!(target = "lesson_focus.content", error = ?err, "keydown listener removal failed");
		}
	}
}

impl Drop for DomListener {
	fn drop(&mut self) {
		self.cancel();
	}
}

impl Host for DomHost {
	type Node = Node;
	type Observer = DomObserver;
	type Listener = DomListener;

	fn has_class(&self, node: &Node, class: &str) -> bool {
		node.dyn_ref::<Element>().is_some_and(|element| element.class_list().contains(class))
	}

	fn query(&self, scope: &Node, selector: &str) -> Option<Node> {
		let element = scope.dyn_ref::<Element>()?;
		match element.query_selector(selector) {
			Ok(found) => found.map(Node::from),
			Err(err) => {
				warn!(target = "lesson_focus.content", selector, error = ?err, "invalid selector");
				None
			}
		}
	}

	fn observe_children(&self, root: &Node) -> Result<DomObserver> {
		let watcher = self.bound_watcher()?;
		let callback = ObserverCallback::new(move |records: Array, _: MutationObserver| {
			let batch = to_batch(&records);
			dispatch(&watcher, |watcher| watcher.on_root_mutations(&batch));
		});
		self.observe(root, false, callback)
	}

	fn observe_subtree(&self, region: &Node, session: SessionId) -> Result<DomObserver> {
		let watcher = self.bound_watcher()?;
		let callback = ObserverCallback::new(move |_: Array, _: MutationObserver| {
			dispatch(&watcher, |watcher| watcher.on_content_mutations(session));
		});
		self.observe(region, true, callback)
	}

	fn set_placeholder(&self, field: &Node, text: &str) {
		if let Some(textarea) = field.dyn_ref::<HtmlTextAreaElement>() {
			textarea.set_placeholder(text);
		} else if let Some(input) = field.dyn_ref::<HtmlInputElement>() {
			input.set_placeholder(text);
		} else if let Some(element) = field.dyn_ref::<Element>() {
			if let Err(err) = element.set_attribute("placeholder", text) {
				warn!(target = "lesson_focus.content", error = ?err, "placeholder not set");
			}
		}
	}

	fn focus(&self, field: &Node) {
		focus_node(field);
	}

	fn listen_key(&self, key: &str, field: &Node) -> Result<DomListener> {
		let target: EventTarget = match self.document.body() {
			Some(body) => body.into(),
			None => self.document.clone().into(),
		};

		let key = key.to_string();
		let field = field.clone();
		let callback = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
			if event.key() == key {
				focus_node(&field);
			}
		});

		target
			.add_event_listener_with_callback("keydown", callback.as_ref().unchecked_ref())
			.map_err(|err| host_error("addEventListener", err))?;
		Ok(DomListener {
			target,
			callback,
			attached: true,
		})
	}
}
