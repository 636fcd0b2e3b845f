//! Tracing output routed to the browser console.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;
use web_sys::console;

/// Installs the global subscriber. Later calls leave the first one in place.
pub fn init_logging(verbose: bool) {
	let level = if verbose { Level::DEBUG } else { Level::INFO };

	let result = tracing_subscriber::fmt()
		.with_max_level(level)
		.with_writer(ConsoleMakeWriter)
		.without_time()
		.with_target(true)
		.try_init();

	if result.is_err() {
		tracing::debug!(target = "lesson_focus.content", "logging already initialised");
	}
}

struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
	type Writer = ConsoleWriter;

	fn make_writer(&'a self) -> Self::Writer {
		ConsoleWriter::new(Level::INFO)
	}

	fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
		ConsoleWriter::new(*meta.level())
	}
}

/// Buffers one formatted event and emits it on drop with the matching console method.
struct ConsoleWriter {
	level: Level,
	buffer: Vec<u8>,
}

impl ConsoleWriter {
	fn new(level: Level) -> Self {
		Self { level, buffer: Vec::new() }
	}
}

impl io::Write for ConsoleWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.buffer.extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl Drop for ConsoleWriter {
	fn drop(&mut self) {
		let text = String::from_utf8_lossy(&self.buffer);
		let text = text.trim_end();
		if text.is_empty() {
			return;
		}
		let message = JsValue::from_str(text);
		match self.level {
			Level::ERROR => console::error_1(&message),
			Level::WARN => console::warn_1(&message),
			Level::INFO => console::info_1(&message),
			_ => console::debug_1(&message),
		}
	}
}
