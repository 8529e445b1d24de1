//! # Dashboard Window
//!
//! egui front end for the robot dashboard. The window itself holds no robot
//! state: each frame it copies the [`DashboardModel`] out of the widget lock
//! and paints the six status buttons, then reads the live telemetry and the
//! MQTT status for the bottom bar.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────┐
//! │         E-Stop           │
//! │      Safety Mode         │
//! │       Handbrake          │
//! │  Autonomous Control      │
//! │       Robot Mode         │
//! │       Battery %          │
//! ├──────────────────────────┤
//! │ ● MQTT  v  ω  brush      │
//! └──────────────────────────┘
//! ```
//!
//! Button order and labels match the robot's on-board panel so operators
//! find each indicator in the same place.

pub mod common;

use eframe::egui::{self, Button, RichText, Vec2};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::mqtt::{ConnectionState, MQTTStatus};
use crate::render::{WidgetId, WidgetLock};
use crate::telemetry::{Field, StateMirror};

pub use common::{DashboardModel, UiColors};

const BUTTON_HEIGHT: f32 = 22.0;
const BUTTON_SPACING: f32 = 3.0;

pub struct DashboardUI {
    /// Widget library shared with the render layer
    widgets: Arc<WidgetLock<DashboardModel>>,

    /// Live telemetry for the status bar
    mirror: Arc<StateMirror>,

    mqtt_status: watch::Receiver<MQTTStatus>,

    repaint_interval: Duration,
}

impl DashboardUI {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        widgets: Arc<WidgetLock<DashboardModel>>,
        mirror: Arc<StateMirror>,
        mqtt_status: watch::Receiver<MQTTStatus>,
        repaint_interval: Duration,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        Self {
            widgets,
            mirror,
            mqtt_status,
            repaint_interval,
        }
    }

    fn render_buttons(&self, ui: &mut egui::Ui, model: &DashboardModel) {
        let width = ui.available_width() - 20.0;

        ui.vertical_centered(|ui| {
            ui.add_space(BUTTON_SPACING);
            for widget in WidgetId::ALL {
                let view = model.view(widget);
                let button = Button::new(RichText::new(&view.text).color(UiColors::TEXT))
                    .fill(view.fill())
                    .min_size(Vec2 {
                        x: width,
                        y: BUTTON_HEIGHT,
                    });
                ui.add(button);
                ui.add_space(BUTTON_SPACING);
            }
        });
    }

    fn render_status_bar(&self, ui: &mut egui::Ui) {
        let status = self.mqtt_status.borrow().clone();
        let (dot, label) = match status.connection_state {
            ConnectionState::Connected => (UiColors::ACTIVE, "MQTT"),
            ConnectionState::Connecting => (UiColors::UNKNOWN, "MQTT…"),
            ConnectionState::Reconnecting => (UiColors::INACTIVE, "MQTT retry"),
            ConnectionState::Disconnected => (UiColors::INACTIVE, "MQTT off"),
        };

        ui.horizontal_centered(|ui| {
            ui.colored_label(dot, "●");
            ui.label(format!("{} ({})", label, status.messages_received));
            ui.separator();
            ui.label(format!(
                "v {} ω {}",
                self.mirror.get_field(Field::LinearX),
                self.mirror.get_field(Field::AngularZ)
            ));
            ui.label(format!(
                "Brush {}",
                self.mirror.get_field(Field::BrushSpeed)
            ));
        })
        .response
        .on_hover_text(status.error_messages.join("\n"));
    }
}

impl eframe::App for DashboardUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(self.repaint_interval);

        // Copy out so the lock is not held while painting.
        let model = self.widgets.with(|model| model.clone());

        egui::TopBottomPanel::bottom("status_bar")
            .show_separator_line(false)
            .show(ctx, |ui| self.render_status_bar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(UiColors::BACKGROUND))
            .show(ctx, |ui| self.render_buttons(ui, &model));
    }
}
