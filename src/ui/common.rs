//! # UI Common Components
//!
//! Colours and the widget model shared between the render layer and the
//! egui window.
//!
//! [`DashboardModel`] is the concrete widget library: the render layer
//! mutates it through [`WidgetBackend`] while holding the
//! [`WidgetLock`](crate::render::WidgetLock), the window copies it out under
//! the same lock once per frame and paints the copy.

use eframe::egui::Color32;

use crate::render::{Style, WidgetBackend, WidgetId};

/// Centralized colour palette
pub struct UiColors;

impl UiColors {
    /// Window background (RGB: 20, 20, 20)
    pub const BACKGROUND: Color32 = Color32::from_rgb(20, 20, 20);

    /// Button fill before any style is applied (RGB: 45, 45, 45)
    pub const UNSTYLED: Color32 = Color32::from_rgb(45, 45, 45);

    /// Grey-green for unknown or inactive values
    pub const UNKNOWN: Color32 = Color32::from_rgb(70, 80, 75);

    /// Red for e-stop, handbrake, errors
    pub const WARNING: Color32 = Color32::from_rgb(255, 0, 0);

    /// Green for healthy values
    pub const NORMAL: Color32 = Color32::from_rgb(30, 180, 100);

    /// Blue for manual control
    pub const BLUE: Color32 = Color32::from_rgb(60, 170, 200);

    pub const TEXT: Color32 = Color32::from_rgb(235, 235, 235);

    /// Connected status indicator (RGB: 50, 200, 20)
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Disconnected status indicator (RGB: 200, 50, 20)
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    pub fn for_style(style: Style) -> Color32 {
        match style {
            Style::Unknown => Self::UNKNOWN,
            Style::Normal => Self::NORMAL,
            Style::Warning => Self::WARNING,
            Style::Blue => Self::BLUE,
        }
    }
}

/// Paint state of one status button
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub text: String,
    /// Applied styles, most recent last
    pub styles: Vec<Style>,
    /// Bumped on every `center`
    pub layout_generation: u64,
}

impl WidgetView {
    fn new(widget: WidgetId) -> Self {
        Self {
            text: widget.initial_label().to_string(),
            styles: Vec::new(),
            layout_generation: 0,
        }
    }

    /// Style that wins when painting
    pub fn active_style(&self) -> Option<Style> {
        self.styles.last().copied()
    }

    pub fn fill(&self) -> Color32 {
        self.active_style()
            .map(UiColors::for_style)
            .unwrap_or(UiColors::UNSTYLED)
    }
}

/// Widget library backing the dashboard window
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardModel {
    views: Vec<WidgetView>,
}

impl Default for DashboardModel {
    fn default() -> Self {
        Self {
            views: WidgetId::ALL.into_iter().map(WidgetView::new).collect(),
        }
    }
}

impl DashboardModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self, widget: WidgetId) -> &WidgetView {
        &self.views[widget.index()]
    }

    fn view_mut(&mut self, widget: WidgetId) -> &mut WidgetView {
        &mut self.views[widget.index()]
    }
}

impl WidgetBackend for DashboardModel {
    fn set_style(&mut self, widget: WidgetId, style: Style) {
        self.view_mut(widget).styles.push(style);
    }

    fn clear_style(&mut self, widget: WidgetId, style: Style) {
        self.view_mut(widget).styles.retain(|s| *s != style);
    }

    fn set_text(&mut self, widget: WidgetId, text: &str) {
        let view = self.view_mut(widget);
        view.text.clear();
        view.text.push_str(text);
    }

    fn center(&mut self, widget: WidgetId) {
        let view = self.view_mut(widget);
        view.layout_generation = view.layout_generation.wrapping_add(1);
    }
}
