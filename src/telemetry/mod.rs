//! # Telemetry Module
//!
//! Shared robot state between the broker connection and the dashboard.
//!
//! ```text
//! telemetry/
//! ├── mirror.rs      - StateMirror, one atomic cell per field
//! └── dispatcher.rs  - topic table, payload parsing, mirror updates
//! ```
//!
//! The dispatcher runs inside the MQTT event loop, the mirror is read by the
//! render loop and the status bar. Both sides share the mirror through an
//! `Arc`; there is no other coupling between them.

pub mod dispatcher;
pub mod mirror;

pub use dispatcher::{DispatchError, Topic, TopicDispatcher};
pub use mirror::{Field, FieldKind, FieldValue, StateMirror};
