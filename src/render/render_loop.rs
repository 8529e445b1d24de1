//! Render context: polls the mirror and drives the state machine
//!
//! Runs in its own tokio task on a fixed cadence. A widget is only updated
//! when the value behind it changed since the last pass. Fields the robot
//! has not reported yet are skipped, so their widgets keep the initial label.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::state_machine::RenderStateMachine;
use super::widgets::WidgetBackend;
use crate::telemetry::{Field, FieldValue, StateMirror};

/// Default render cadence (~30 fps)
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(33);

/// Values rendered in the previous pass
#[derive(Debug, Default, Clone, PartialEq)]
struct Rendered {
    e_stop: Option<i32>,
    handbrake: Option<i32>,
    direct_status: Option<i32>,
    safety_mode: Option<i32>,
    battery_is_charging: Option<i32>,
    battery_percentage: Option<f32>,
    robot_mode: Option<i32>,
}

/// Returns the new value if it was reported and differs from `slot`
fn changed<T: PartialEq + Copy>(slot: &mut Option<T>, value: Option<T>) -> Option<T> {
    let value = value?;
    if *slot == Some(value) {
        return None;
    }
    *slot = Some(value);
    Some(value)
}

pub struct RenderLoop<B> {
    mirror: Arc<StateMirror>,
    machine: RenderStateMachine<B>,
    interval: Duration,
    rendered: Rendered,
}

impl<B> RenderLoop<B>
where
    B: WidgetBackend + Send + 'static,
{
    pub fn new(
        mirror: Arc<StateMirror>,
        machine: RenderStateMachine<B>,
        interval: Duration,
    ) -> Self {
        Self {
            mirror,
            machine,
            interval,
            rendered: Rendered::default(),
        }
    }

    /// Renders every reported field whose value changed, returns how many
    /// were updated
    pub async fn render_pass(&mut self) -> usize {
        let mirror = self.mirror.clone();
        let int = |field| mirror.read_applied(field).map(FieldValue::as_i32);
        let mut updated = 0;

        if let Some(e_stop) = changed(&mut self.rendered.e_stop, int(Field::EStop)) {
            self.machine.update_e_stop(e_stop);
            updated += 1;
        }

        if let Some(handbrake) = changed(&mut self.rendered.handbrake, int(Field::Handbrake)) {
            self.machine.update_handbrake(handbrake);
            updated += 1;
        }

        if let Some(direct_status) =
            changed(&mut self.rendered.direct_status, int(Field::DirectStatus))
        {
            self.machine.update_direct_status(direct_status);
            updated += 1;
        }

        if let Some(safety_mode) = changed(&mut self.rendered.safety_mode, int(Field::SafetyMode))
        {
            self.machine.update_safety_mode(safety_mode);
            updated += 1;
        }

        if let Some(charging) = changed(
            &mut self.rendered.battery_is_charging,
            int(Field::BatteryIsCharging),
        ) {
            self.machine.update_battery_charging(charging).await;
            updated += 1;
        }

        let percentage = mirror
            .read_applied(Field::BatteryPercentage)
            .map(FieldValue::as_f32);
        if let Some(percentage) = changed(&mut self.rendered.battery_percentage, percentage) {
            self.machine.update_battery_percentage(percentage);
            updated += 1;
        }

        if let Some(robot_mode) = changed(&mut self.rendered.robot_mode, int(Field::RobotMode)) {
            self.machine.update_robot_mode(robot_mode).await;
            updated += 1;
        }

        if updated > 0 {
            debug!("Render pass updated {} widget(s)", updated);
        }
        updated
    }

    /// Renders until `cancel` fires, then stops all blink activities
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Render loop started ({:?} interval)", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.render_pass().await;
                }
            }
        }

        self.machine.shutdown().await;
        info!("Render loop stopped");
    }
}
