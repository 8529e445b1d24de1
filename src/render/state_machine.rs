//! Per-field rendering state machine
//!
//! Turns field values into widget commands. Most widgets are a pure mapping
//! from value to `(label, style)`. The battery and robot mode widgets can
//! also blink, and for those the machine remembers whether an activity is
//! running so it starts one only on entering the blinking value and stops it
//! only on leaving it.
//!
//! ```text
//!            enter blink value (no activity)
//!   Idle ───────────────────────────────────► Blinking(handle)
//!    ▲                                              │
//!    └──────────── leave blink value ───────────────┘
//!                  (stop awaits termination)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::blink::BlinkActivity;
use super::widgets::{show_style, Style, WidgetBackend, WidgetId, WidgetLock};

/// Phases shown by every blink activity
pub const BLINK_PHASES: [Style; 2] = [Style::Unknown, Style::Normal];

/// Default interval between blink phases
pub const DEFAULT_BLINK_INTERVAL: Duration = Duration::from_millis(500);

/// Robot mode value that makes the mode widget blink
pub const LITTER_PICKING: i32 = 3;

/// Derived visual classification of a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Steady(Style),
    Blinking,
}

impl Default for VisualState {
    fn default() -> Self {
        VisualState::Steady(Style::Unknown)
    }
}

/// How a robot mode value is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeVisual {
    pub label: &'static str,
    /// `None` while blinking, the activity owns the style
    pub style: Option<Style>,
    pub blink: bool,
}

const fn steady(label: &'static str, style: Style) -> ModeVisual {
    ModeVisual {
        label,
        style: Some(style),
        blink: false,
    }
}

const UNKNOWN_MODE: ModeVisual = steady("Mode: ?", Style::Unknown);

// 1 and 6 both mean idle on the robot side. 5 is unused.
const ROBOT_MODES: [(i32, ModeVisual); 7] = [
    (0, UNKNOWN_MODE),
    (1, steady("Mode: Idle", Style::Normal)),
    (2, steady("Mode: Coverage", Style::Normal)),
    (
        LITTER_PICKING,
        ModeVisual {
            label: "Mode: Litter Picking",
            style: None,
            blink: true,
        },
    ),
    (4, steady("Switching Mode", Style::Normal)),
    (6, steady("Mode: Idle", Style::Normal)),
    (7, steady("Error", Style::Warning)),
];

/// Looks up how `value` is rendered; unlisted values render as unknown
pub fn robot_mode_visual(value: i32) -> ModeVisual {
    ROBOT_MODES
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, visual)| *visual)
        .unwrap_or(UNKNOWN_MODE)
}

pub fn safety_mode_visual(value: i32) -> (&'static str, Style) {
    match value {
        1 => ("Safety Mode: On", Style::Normal),
        0 => ("Safety Mode: Off", Style::Warning),
        _ => ("Safety Mode: Unknown", Style::Unknown),
    }
}

pub fn autonomy_visual(direct_status: i32) -> (&'static str, Style) {
    if direct_status == 1 {
        ("Manual Control", Style::Blue)
    } else {
        ("Autonomous Control", Style::Unknown)
    }
}

pub fn battery_label(percentage: f32) -> String {
    format!("Battery: {:.1}%", percentage)
}

enum BlinkSlot {
    Idle,
    Blinking(BlinkActivity),
}

impl BlinkSlot {
    fn is_blinking(&self) -> bool {
        matches!(self, BlinkSlot::Blinking(_))
    }
}

/// Number of blink activities started and stopped so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlinkCounters {
    pub started: usize,
    pub stopped: usize,
}

/// Owns the visual state of every dashboard widget
pub struct RenderStateMachine<B> {
    widgets: Arc<WidgetLock<B>>,
    blink_interval: Duration,
    visual: HashMap<WidgetId, VisualState>,
    battery_blink: BlinkSlot,
    mode_blink: BlinkSlot,
    counters: BlinkCounters,
}

impl<B> RenderStateMachine<B>
where
    B: WidgetBackend + Send + 'static,
{
    pub fn new(widgets: Arc<WidgetLock<B>>, blink_interval: Duration) -> Self {
        Self {
            widgets,
            blink_interval,
            visual: HashMap::new(),
            battery_blink: BlinkSlot::Idle,
            mode_blink: BlinkSlot::Idle,
            counters: BlinkCounters::default(),
        }
    }

    pub fn visual_state(&self, widget: WidgetId) -> VisualState {
        self.visual.get(&widget).copied().unwrap_or_default()
    }

    pub fn is_blinking(&self, widget: WidgetId) -> bool {
        match widget {
            WidgetId::Battery => self.battery_blink.is_blinking(),
            WidgetId::RobotMode => self.mode_blink.is_blinking(),
            _ => false,
        }
    }

    pub fn blink_counters(&self) -> BlinkCounters {
        self.counters
    }

    pub fn update_e_stop(&mut self, e_stop: i32) {
        self.show_binary(WidgetId::EStop, e_stop);
    }

    pub fn update_handbrake(&mut self, handbrake: i32) {
        self.show_binary(WidgetId::Handbrake, handbrake);
    }

    pub fn update_direct_status(&mut self, direct_status: i32) {
        let (label, style) = autonomy_visual(direct_status);
        self.show_labelled(WidgetId::Autonomy, label, Some(style));
    }

    pub fn update_safety_mode(&mut self, safety_mode: i32) {
        let (label, style) = safety_mode_visual(safety_mode);
        self.show_labelled(WidgetId::SafetyMode, label, Some(style));
    }

    pub fn update_battery_percentage(&mut self, percentage: f32) {
        let label = battery_label(percentage);
        self.widgets
            .with(|b| b.set_text(WidgetId::Battery, &label));
    }

    pub async fn update_battery_charging(&mut self, charging: i32) {
        if charging == 1 {
            self.ensure_blinking(WidgetId::Battery);
            return;
        }

        // The final style must land after the last tick of the activity.
        self.stop_blinking(WidgetId::Battery).await;
        self.widgets
            .with(|b| show_style(b, WidgetId::Battery, Style::Unknown));
        self.visual
            .insert(WidgetId::Battery, VisualState::Steady(Style::Unknown));
    }

    pub async fn update_robot_mode(&mut self, robot_mode: i32) {
        let visual = robot_mode_visual(robot_mode);
        debug!("Robot mode {} -> {:?}", robot_mode, visual);

        if visual.blink {
            self.show_labelled(WidgetId::RobotMode, visual.label, None);
            self.ensure_blinking(WidgetId::RobotMode);
        } else {
            self.stop_blinking(WidgetId::RobotMode).await;
            self.show_labelled(WidgetId::RobotMode, visual.label, visual.style);
        }
    }

    /// Stops every running activity, waiting for each to terminate
    pub async fn shutdown(&mut self) {
        self.stop_blinking(WidgetId::Battery).await;
        self.stop_blinking(WidgetId::RobotMode).await;
        info!(
            "Render state machine shut down ({} blink activities started, {} stopped)",
            self.counters.started, self.counters.stopped
        );
    }

    fn show_binary(&mut self, widget: WidgetId, value: i32) {
        let style = if value == 1 {
            Style::Warning
        } else {
            Style::Unknown
        };
        self.widgets.with(|b| show_style(b, widget, style));
        self.visual.insert(widget, VisualState::Steady(style));
    }

    fn show_labelled(&mut self, widget: WidgetId, label: &str, style: Option<Style>) {
        self.widgets.with(|b| {
            b.set_text(widget, label);
            if let Some(style) = style {
                show_style(b, widget, style);
            }
            b.center(widget);
        });
        if let Some(style) = style {
            self.visual.insert(widget, VisualState::Steady(style));
        }
    }

    fn slot_mut(&mut self, widget: WidgetId) -> Option<&mut BlinkSlot> {
        match widget {
            WidgetId::Battery => Some(&mut self.battery_blink),
            WidgetId::RobotMode => Some(&mut self.mode_blink),
            _ => None,
        }
    }

    fn ensure_blinking(&mut self, widget: WidgetId) {
        let widgets = self.widgets.clone();
        let interval = self.blink_interval;
        let Some(slot) = self.slot_mut(widget) else {
            return;
        };
        if slot.is_blinking() {
            return;
        }

        *slot = BlinkSlot::Blinking(BlinkActivity::start(
            widgets,
            widget,
            interval,
            BLINK_PHASES,
        ));
        self.counters.started += 1;
        self.visual.insert(widget, VisualState::Blinking);
        debug!("Started blinking {}", widget);
    }

    async fn stop_blinking(&mut self, widget: WidgetId) {
        let Some(slot) = self.slot_mut(widget) else {
            return;
        };
        if let BlinkSlot::Blinking(activity) = std::mem::replace(slot, BlinkSlot::Idle) {
            let blinking = activity.widget();
            activity.stop().await;
            self.counters.stopped += 1;
            debug!("Stopped blinking {}", blinking);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::widgets::testing::{RecordingBackend, WidgetCall};

    const INTERVAL: Duration = Duration::from_millis(2);

    fn machine() -> (
        Arc<WidgetLock<RecordingBackend>>,
        RenderStateMachine<RecordingBackend>,
    ) {
        let widgets = Arc::new(WidgetLock::new(RecordingBackend::default()));
        let machine = RenderStateMachine::new(widgets.clone(), INTERVAL);
        (widgets, machine)
    }

    #[test]
    fn binary_widgets_warn_only_on_one() {
        let (widgets, mut machine) = machine();

        machine.update_e_stop(1);
        machine.update_handbrake(0);
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::EStop)), Some(Style::Warning));
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::Handbrake)), Some(Style::Unknown));

        machine.update_e_stop(2);
        machine.update_handbrake(1);
        assert_eq!(machine.visual_state(WidgetId::EStop), VisualState::Steady(Style::Unknown));
        assert_eq!(
            machine.visual_state(WidgetId::Handbrake),
            VisualState::Steady(Style::Warning)
        );
    }

    #[test]
    fn initial_state_is_unknown() {
        let (_, machine) = machine();
        for widget in WidgetId::ALL {
            assert_eq!(machine.visual_state(widget), VisualState::Steady(Style::Unknown));
            assert!(!machine.is_blinking(widget));
        }
    }

    #[test]
    fn autonomy_label_recenters_on_every_update() {
        let (widgets, mut machine) = machine();

        machine.update_direct_status(1);
        machine.update_direct_status(1);
        machine.update_direct_status(0);

        let calls = widgets.with(|b| b.calls_for(WidgetId::Autonomy));
        let centers = calls
            .iter()
            .filter(|c| **c == WidgetCall::Center(WidgetId::Autonomy))
            .count();
        assert_eq!(centers, 3);
        assert_eq!(
            widgets.with(|b| b.last_text(WidgetId::Autonomy)),
            Some("Autonomous Control".to_string())
        );
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::Autonomy)), Some(Style::Unknown));

        machine.update_direct_status(1);
        assert_eq!(
            widgets.with(|b| b.last_text(WidgetId::Autonomy)),
            Some("Manual Control".to_string())
        );
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::Autonomy)), Some(Style::Blue));
    }

    #[test]
    fn safety_mode_outside_known_values_is_unknown() {
        let (widgets, mut machine) = machine();

        for value in [-1, 2, 99] {
            machine.update_safety_mode(value);
            assert_eq!(
                widgets.with(|b| b.last_text(WidgetId::SafetyMode)),
                Some("Safety Mode: Unknown".to_string())
            );
            assert_eq!(
                widgets.with(|b| b.last_style(WidgetId::SafetyMode)),
                Some(Style::Unknown)
            );
        }

        machine.update_safety_mode(1);
        assert_eq!(safety_mode_visual(1), ("Safety Mode: On", Style::Normal));
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::SafetyMode)), Some(Style::Normal));

        machine.update_safety_mode(0);
        assert_eq!(
            widgets.with(|b| b.last_text(WidgetId::SafetyMode)),
            Some("Safety Mode: Off".to_string())
        );
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::SafetyMode)), Some(Style::Warning));
    }

    #[test]
    fn battery_percentage_sets_text_only() {
        let (widgets, mut machine) = machine();

        machine.update_battery_percentage(87.46);

        let calls = widgets.with(|b| b.calls_for(WidgetId::Battery));
        assert_eq!(
            calls,
            vec![WidgetCall::SetText(WidgetId::Battery, "Battery: 87.5%".to_string())]
        );
        assert_eq!(battery_label(0.0), "Battery: 0.0%");
    }

    #[test]
    fn robot_mode_table() {
        assert_eq!(robot_mode_visual(1), robot_mode_visual(6));
        assert_eq!(robot_mode_visual(1).label, "Mode: Idle");
        assert_eq!(robot_mode_visual(2).label, "Mode: Coverage");
        assert_eq!(robot_mode_visual(4).label, "Switching Mode");
        assert_eq!(robot_mode_visual(7), steady("Error", Style::Warning));
        assert!(robot_mode_visual(LITTER_PICKING).blink);
        for value in [0, 5, 8, -1] {
            assert_eq!(robot_mode_visual(value), UNKNOWN_MODE);
        }
    }

    #[tokio::test]
    async fn litter_picking_blinks_once_per_boundary() {
        let (widgets, mut machine) = machine();

        machine.update_robot_mode(1).await;
        machine.update_robot_mode(LITTER_PICKING).await;
        machine.update_robot_mode(LITTER_PICKING).await;
        assert!(machine.is_blinking(WidgetId::RobotMode));
        assert_eq!(machine.visual_state(WidgetId::RobotMode), VisualState::Blinking);
        tokio::time::sleep(INTERVAL * 4).await;

        machine.update_robot_mode(2).await;

        assert_eq!(
            machine.blink_counters(),
            BlinkCounters {
                started: 1,
                stopped: 1
            }
        );
        assert!(!machine.is_blinking(WidgetId::RobotMode));
        assert_eq!(
            widgets.with(|b| b.last_text(WidgetId::RobotMode)),
            Some("Mode: Coverage".to_string())
        );
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::RobotMode)), Some(Style::Normal));
    }

    #[tokio::test]
    async fn error_mode_stops_blink_before_warning() {
        let (widgets, mut machine) = machine();

        machine.update_robot_mode(LITTER_PICKING).await;
        tokio::time::sleep(INTERVAL * 3).await;
        machine.update_robot_mode(7).await;

        let recorded = widgets.with(|b| b.calls.len());
        tokio::time::sleep(INTERVAL * 5).await;

        assert_eq!(widgets.with(|b| b.calls.len()), recorded);
        assert_eq!(
            widgets.with(|b| b.last_text(WidgetId::RobotMode)),
            Some("Error".to_string())
        );
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::RobotMode)), Some(Style::Warning));
        assert_eq!(
            machine.visual_state(WidgetId::RobotMode),
            VisualState::Steady(Style::Warning)
        );
    }

    #[tokio::test]
    async fn unrecognized_mode_stops_blink() {
        let (widgets, mut machine) = machine();

        machine.update_robot_mode(LITTER_PICKING).await;
        machine.update_robot_mode(5).await;

        assert!(!machine.is_blinking(WidgetId::RobotMode));
        assert_eq!(
            widgets.with(|b| b.last_text(WidgetId::RobotMode)),
            Some("Mode: ?".to_string())
        );
    }

    #[tokio::test]
    async fn charging_toggles_never_leak_activities() {
        let (widgets, mut machine) = machine();

        for _ in 0..2 {
            machine.update_battery_charging(1).await;
            machine.update_battery_charging(1).await;
            tokio::time::sleep(INTERVAL * 2).await;
            machine.update_battery_charging(0).await;
        }

        assert_eq!(
            machine.blink_counters(),
            BlinkCounters {
                started: 2,
                stopped: 2
            }
        );
        assert!(!machine.is_blinking(WidgetId::Battery));

        let recorded = widgets.with(|b| b.calls.len());
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::Battery)), Some(Style::Unknown));
        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(widgets.with(|b| b.calls.len()), recorded);
    }

    #[tokio::test]
    async fn not_charging_while_idle_is_a_no_op_stop() {
        let (widgets, mut machine) = machine();

        machine.update_battery_charging(0).await;
        machine.update_battery_charging(0).await;

        assert_eq!(machine.blink_counters(), BlinkCounters::default());
        assert_eq!(widgets.with(|b| b.last_style(WidgetId::Battery)), Some(Style::Unknown));
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let (widgets, mut machine) = machine();

        machine.update_battery_charging(1).await;
        machine.update_robot_mode(LITTER_PICKING).await;
        machine.shutdown().await;

        assert!(!machine.is_blinking(WidgetId::Battery));
        assert!(!machine.is_blinking(WidgetId::RobotMode));
        let recorded = widgets.with(|b| b.calls.len());
        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(widgets.with(|b| b.calls.len()), recorded);
    }
}
