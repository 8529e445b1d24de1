//! Periodic background activities bound to a widget
//!
//! A [`PeriodicTask`] runs a tick closure on a fixed interval in its own
//! tokio task. [`PeriodicTask::stop`] cancels it and waits for the task to
//! finish, so once it returns no tick can still be in flight. Dropping the
//! handle cancels the task without waiting.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::widgets::{show_style, Style, WidgetBackend, WidgetId, WidgetLock};

/// Owned handle to a running periodic task
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns `tick` on the current runtime, first tick immediately
    ///
    /// `tick` receives the zero-based tick count.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        let name = name.into();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_name = name.clone();

        let task = tokio::spawn(async move {
            debug!("Periodic task {} started", task_name);
            let mut count: u64 = 0;
            loop {
                if token.is_cancelled() {
                    break;
                }
                tick(count);
                count = count.wrapping_add(1);

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Periodic task {} finished after {} ticks", task_name, count);
        });

        Self {
            name,
            cancel,
            task: Some(task),
        }
    }

    /// Cancels the task and waits until it has terminated
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(()) => debug!("Periodic task {} stopped", self.name),
                Err(e) if e.is_panic() => error!("Periodic task {} panicked: {}", self.name, e),
                Err(e) => warn!("Periodic task {} ended abnormally: {}", self.name, e),
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Alternates a widget between two styles until stopped
#[derive(Debug)]
pub struct BlinkActivity {
    widget: WidgetId,
    task: PeriodicTask,
}

impl BlinkActivity {
    /// Starts blinking `widget`, showing `phases[0]` first
    pub fn start<B>(
        widgets: Arc<WidgetLock<B>>,
        widget: WidgetId,
        interval: Duration,
        phases: [Style; 2],
    ) -> Self
    where
        B: WidgetBackend + Send + 'static,
    {
        let task = PeriodicTask::spawn(format!("{} blink", widget), interval, move |count| {
            let style = phases[(count % 2) as usize];
            widgets.with(|backend| show_style(backend, widget, style));
        });
        Self { widget, task }
    }

    pub fn widget(&self) -> WidgetId {
        self.widget
    }

    /// Stops the blink; no style change from it happens after this returns
    pub async fn stop(self) {
        self.task.stop().await
    }
}
