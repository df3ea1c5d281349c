//! One displayed error, merged from three sources, each auto-dismissed.
//!
//! The weather and coordinate slots belong to their services; the duplicate
//! slot lives here. A supervisor task watches all three. Whenever a slot is
//! set its deadline restarts; when the deadline passes the slot's dismiss
//! command runs. No message outlives its deadline.

use std::sync::Arc;
use std::time::Duration;

use citycast_weather::{CoordinateService, WeatherFetchService};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default time a message stays visible
pub const DEFAULT_CLEAR_AFTER: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Weather,
    Coordinates,
    Duplicate,
}

const SLOTS: [Slot; 3] = [Slot::Weather, Slot::Coordinates, Slot::Duplicate];

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::Weather => 0,
            Slot::Coordinates => 1,
            Slot::Duplicate => 2,
        }
    }
}

pub struct ErrorLifecycleCoordinator {
    weather: Arc<WeatherFetchService>,
    coordinates: Arc<CoordinateService>,
    duplicate: Arc<watch::Sender<Option<String>>>,
    clear_after: Duration,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ErrorLifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLifecycleCoordinator")
            .field("current", &self.current_message())
            .field("clear_after", &self.clear_after)
            .finish()
    }
}

impl ErrorLifecycleCoordinator {
    /// Start supervising. Must be called from within a tokio runtime.
    pub fn spawn(
        weather: Arc<WeatherFetchService>,
        coordinates: Arc<CoordinateService>,
        clear_after: Duration,
    ) -> Self {
        let (duplicate, _) = watch::channel(None);
        let duplicate = Arc::new(duplicate);

        let supervisor = Supervisor {
            weather: weather.clone(),
            coordinates: coordinates.clone(),
            duplicate: duplicate.clone(),
            clear_after,
        };
        let task = tokio::spawn(supervisor.run());

        tracing::debug!("Error lifecycle started, clearing after {:?}", clear_after);
        Self {
            weather,
            coordinates,
            duplicate,
            clear_after,
            task,
        }
    }

    /// The message to show: weather, then coordinates, then duplicate
    pub fn current_message(&self) -> Option<String> {
        self.weather
            .error()
            .or_else(|| self.coordinates.error())
            .or_else(|| self.duplicate())
    }

    pub fn duplicate(&self) -> Option<String> {
        self.duplicate.borrow().clone()
    }

    pub fn set_duplicate(&self, message: impl Into<String>) {
        self.duplicate.send_replace(Some(message.into()));
    }

    pub fn clear_duplicate(&self) {
        self.duplicate.send_if_modified(|message| message.take().is_some());
    }

    pub fn clear_after(&self) -> Duration {
        self.clear_after
    }

    /// Stop the supervisor; messages set afterwards stay until cleared by hand
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ErrorLifecycleCoordinator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Supervisor {
    weather: Arc<WeatherFetchService>,
    coordinates: Arc<CoordinateService>,
    duplicate: Arc<watch::Sender<Option<String>>>,
    clear_after: Duration,
}

impl Supervisor {
    async fn run(self) {
        let mut weather_rx = self.weather.subscribe_error();
        let mut coordinates_rx = self.coordinates.subscribe_error();
        let mut duplicate_rx = self.duplicate.subscribe();

        // Slots already set before we subscribed still get a deadline
        let now = Instant::now();
        let mut deadlines: [Option<Instant>; 3] = [
            weather_rx.borrow().is_some().then(|| now + self.clear_after),
            coordinates_rx.borrow().is_some().then(|| now + self.clear_after),
            duplicate_rx.borrow().is_some().then(|| now + self.clear_after),
        ];

        loop {
            let next = deadlines.iter().flatten().min().copied();
            let expiry = async {
                match next {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                changed = weather_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let set = weather_rx.borrow_and_update().is_some();
                    self.rearm(&mut deadlines, Slot::Weather, set);
                }
                changed = coordinates_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let set = coordinates_rx.borrow_and_update().is_some();
                    self.rearm(&mut deadlines, Slot::Coordinates, set);
                }
                changed = duplicate_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let set = duplicate_rx.borrow_and_update().is_some();
                    self.rearm(&mut deadlines, Slot::Duplicate, set);
                }
                () = expiry => {
                    let now = Instant::now();
                    for slot in SLOTS {
                        if deadlines[slot.index()].is_some_and(|at| at <= now) {
                            deadlines[slot.index()] = None;
                            self.dismiss(slot).await;
                        }
                    }
                }
            }
        }

        tracing::debug!("Error lifecycle stopped");
    }

    fn rearm(&self, deadlines: &mut [Option<Instant>; 3], slot: Slot, set: bool) {
        deadlines[slot.index()] = if set {
            Some(Instant::now() + self.clear_after)
        } else {
            None
        };
    }

    async fn dismiss(&self, slot: Slot) {
        tracing::debug!("Dismissing {:?} error", slot);
        match slot {
            Slot::Weather => {
                self.weather.fetch("").await;
            }
            Slot::Coordinates => {
                self.coordinates.resolve("").await;
            }
            Slot::Duplicate => {
                self.duplicate
                    .send_if_modified(|message| message.take().is_some());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citycast_weather::{ApiClient, RetryConfig, RetryPolicy, WeatherCache};

    fn offline_api() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9", "k", "metric", Duration::from_millis(50)).unwrap()
    }

    fn coordinator() -> ErrorLifecycleCoordinator {
        let weather = Arc::new(WeatherFetchService::new(
            offline_api(),
            RetryPolicy::new(RetryConfig::new(0, 1)),
            WeatherCache::new(),
        ));
        let coordinates = Arc::new(CoordinateService::new(offline_api()));
        ErrorLifecycleCoordinator::spawn(weather, coordinates, DEFAULT_CLEAR_AFTER)
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_clears_after_three_seconds() {
        let errors = coordinator();
        errors.set_duplicate("Paris is already in your dashboard");

        wait(2990).await;
        assert_eq!(
            errors.current_message().as_deref(),
            Some("Paris is already in your dashboard")
        );

        wait(20).await;
        assert_eq!(errors.current_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_message_restarts_deadline() {
        let errors = coordinator();
        errors.set_duplicate("Paris is already in your dashboard");

        wait(2000).await;
        errors.set_duplicate("Oslo is already in your dashboard");

        wait(2500).await;
        assert_eq!(
            errors.duplicate().as_deref(),
            Some("Oslo is already in your dashboard")
        );

        wait(520).await;
        assert_eq!(errors.duplicate(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_clear_drops_deadline() {
        let errors = coordinator();
        errors.set_duplicate("first");
        wait(1000).await;
        errors.clear_duplicate();
        wait(1000).await;

        // A fresh message gets its own full window
        errors.set_duplicate("second");
        wait(2500).await;
        assert_eq!(errors.duplicate().as_deref(), Some("second"));
        wait(520).await;
        assert_eq!(errors.duplicate(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_clearing() {
        let errors = coordinator();
        errors.shutdown();
        wait(1).await;

        errors.set_duplicate("stays");
        wait(10_000).await;
        assert_eq!(errors.duplicate().as_deref(), Some("stays"));
    }
}
