// lesson-focus: lesson lifecycle tracking and answer-field focus patches
//
// The crate is host-agnostic. A browser binding implements `Host` over the
// real DOM; tests use the in-memory `fake::FakeDom`.

pub mod config;
pub mod controller;
pub mod error;
pub mod fake;
pub mod host;
pub mod shortcut;
pub mod watcher;

pub use config::FeatureConfig;
pub use controller::{ControllerPhase, LessonFocusController};
pub use error::{Error, Result};
pub use host::{Host, MutationRecord, SessionId, Subscription};
pub use shortcut::ShortcutRegistration;
pub use watcher::{LessonMode, LessonSession, RootWatcher};
