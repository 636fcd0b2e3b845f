//! Content script entry points.
//!
//! `start` runs when the module is instantiated: it looks up the root
//! container, builds the watcher over the live DOM, and keeps it alive until
//! `stop` is called or the page goes away.

mod dom;
mod logging;

use std::cell::RefCell;
use std::rc::Rc;

use lesson_focus::{Error, FeatureConfig, Result, RootWatcher};
use tracing::{error, info};
use wasm_bindgen::prelude::*;

pub use dom::{DomHost, SharedWatcher};

thread_local! {
	static WATCHER: RefCell<Option<SharedWatcher>> = const { RefCell::new(None) };
}

/// Starts watching the page. A missing root container throws.
#[wasm_bindgen(start)]
pub fn start() -> std::result::Result<(), JsValue> {
	console_error_panic_hook::set_once();
	logging::init_logging(cfg!(debug_assertions));

	install(FeatureConfig::builtin()).map_err(|err| {
		error!(target = "lesson_focus.content", error = %err, "startup failed");
		JsValue::from(js_sys::Error::new(&format!("lesson-focus: {err}")))
	})
}

/// Stops watching and releases every observer and listener.
#[wasm_bindgen]
pub fn stop() {
	let active = WATCHER.with(|slot| slot.borrow_mut().take());
	if let Some(watcher) = active {
		watcher.borrow_mut().shutdown();
		info!(target = "lesson_focus.content", "stopped");
	}
}

fn install(config: &FeatureConfig) -> Result<()> {
	let document = web_sys::window()
		.and_then(|window| window.document())
		.ok_or_else(|| Error::Host("no document available".into()))?;
	let root = document.get_element_by_id(&config.root_id).ok_or_else(|| Error::RootMissing {
		id: config.root_id.clone(),
	})?;

	let host = DomHost::new(document);
	let watcher: SharedWatcher = Rc::new(RefCell::new(RootWatcher::new(host.clone(), config.clone())));
	host.bind(&watcher);
	watcher.borrow_mut().observe(&root.into())?;

	let previous = WATCHER.with(|slot| slot.borrow_mut().replace(watcher));
	if let Some(previous) = previous {
		previous.borrow_mut().shutdown();
	}
	info!(target = "lesson_focus.content", root = %config.root_id, "started");
	Ok(())
}
