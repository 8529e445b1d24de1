//! Widget collaborator boundary
//!
//! The widget library is not thread safe. Everything that mutates a widget,
//! the state machine as well as blink ticks, goes through one [`WidgetLock`]
//! and holds it only for the synchronous mutation itself.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Dashboard status buttons, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetId {
    EStop,
    SafetyMode,
    Handbrake,
    Autonomy,
    RobotMode,
    Battery,
}

impl WidgetId {
    pub const COUNT: usize = 6;

    pub const ALL: [WidgetId; WidgetId::COUNT] = [
        WidgetId::EStop,
        WidgetId::SafetyMode,
        WidgetId::Handbrake,
        WidgetId::Autonomy,
        WidgetId::RobotMode,
        WidgetId::Battery,
    ];

    /// Label shown before the first update arrives
    pub fn initial_label(self) -> &'static str {
        match self {
            WidgetId::EStop => "E-Stop",
            WidgetId::SafetyMode => "Safety Mode",
            WidgetId::Handbrake => "Handbrake",
            WidgetId::Autonomy => "Autonomous Control",
            WidgetId::RobotMode => "Robot Mode",
            WidgetId::Battery => "Battery %",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.initial_label())
    }
}

/// Canonical widget styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Unknown,
    Normal,
    Warning,
    Blue,
}

impl Style {
    pub const ALL: [Style; 4] = [Style::Unknown, Style::Normal, Style::Warning, Style::Blue];
}

/// Mutations the render layer issues against the widget library
pub trait WidgetBackend {
    fn set_style(&mut self, widget: WidgetId, style: Style);
    fn clear_style(&mut self, widget: WidgetId, style: Style);
    fn set_text(&mut self, widget: WidgetId, text: &str);
    /// Re-centers the label inside its button after a text change
    fn center(&mut self, widget: WidgetId);
}

/// Makes `style` the only canonical style on `widget`
///
/// Clearing first keeps repeated calls idempotent: styles never stack up no
/// matter which one was active before.
pub fn show_style<B: WidgetBackend + ?Sized>(backend: &mut B, widget: WidgetId, style: Style) {
    for s in Style::ALL {
        backend.clear_style(widget, s);
    }
    backend.set_style(widget, style);
}

/// The single critical section guarding the widget library
#[derive(Debug, Default)]
pub struct WidgetLock<B> {
    inner: Mutex<B>,
}

impl<B> WidgetLock<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Mutex::new(backend),
        }
    }

    /// Runs `f` with exclusive access to the widgets
    ///
    /// A poisoned lock is recovered: a panicking blink tick must not freeze
    /// the dashboard.
    pub fn with<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingBackend, WidgetCall};
    use super::*;

    #[test]
    fn show_style_clears_every_style_before_setting() {
        let lock = WidgetLock::new(RecordingBackend::default());

        lock.with(|b| show_style(b, WidgetId::EStop, Style::Warning));

        let calls = lock.with(|b| b.calls.clone());
        assert_eq!(calls.len(), Style::ALL.len() + 1);
        assert_eq!(
            calls.last(),
            Some(&WidgetCall::SetStyle(WidgetId::EStop, Style::Warning))
        );
        for style in Style::ALL {
            assert!(calls.contains(&WidgetCall::ClearStyle(WidgetId::EStop, style)));
        }
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let lock = std::sync::Arc::new(WidgetLock::new(RecordingBackend::default()));

        let poisoner = lock.clone();
        let _ = std::thread::spawn(move || {
            poisoner.with(|_| panic!("tick failed"));
        })
        .join();

        lock.with(|b| b.set_text(WidgetId::Battery, "Battery: 10.0%"));
        assert_eq!(
            lock.with(|b| b.last_text(WidgetId::Battery)),
            Some("Battery: 10.0%".to_string())
        );
    }

    #[test]
    fn widget_order_matches_layout() {
        for (i, widget) in WidgetId::ALL.iter().enumerate() {
            assert_eq!(widget.index(), i);
        }
    }
}
