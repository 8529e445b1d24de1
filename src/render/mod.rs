//! Render layer for the dashboard status buttons
//!
//! ```text
//! render/
//! ├── widgets.rs        - WidgetBackend trait, WidgetLock critical section
//! ├── blink.rs          - PeriodicTask / BlinkActivity with awaited stop
//! ├── state_machine.rs  - value → visual state transitions
//! └── render_loop.rs    - polls the StateMirror, feeds the state machine
//! ```
//!
//! # Threading
//!
//! ```text
//! RenderLoop task ──► RenderStateMachine ──┐
//!                                          ├──► WidgetLock ──► WidgetBackend
//! BlinkActivity tasks ─────────────────────┘
//! ```
//!
//! The lock is only ever taken around a synchronous mutation, never across
//! an `.await`.

pub mod blink;
pub mod render_loop;
pub mod state_machine;
pub mod widgets;

pub use blink::{BlinkActivity, PeriodicTask};
pub use render_loop::{RenderLoop, DEFAULT_RENDER_INTERVAL};
pub use state_machine::{RenderStateMachine, VisualState, DEFAULT_BLINK_INTERVAL};
pub use widgets::{Style, WidgetBackend, WidgetId, WidgetLock};
