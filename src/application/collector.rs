use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{History, Reading, DEFAULT_HISTORY_CAPACITY};
use crate::ports::{SensorSource, SourceError};

use super::MonitorError;

/// Default time between two sensor polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub type CallbackResult = Result<(), Box<dyn Error + Send + Sync>>;
pub type ReadingCallback = Arc<dyn Fn(&[Reading]) -> CallbackResult + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&MonitorError) -> CallbackResult + Send + Sync>;

/// Collector settings, fixed for the lifetime of the service
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval: Duration,
    pub history_capacity: usize,
}

impl CollectorConfig {
    pub fn new(interval: Duration, history_capacity: usize) -> Self {
        Self {
            interval,
            history_capacity,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_HISTORY_CAPACITY)
    }
}

/// What a single `drain_pending` call delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub batches: usize,
    pub errors: usize,
}

struct CollectorState {
    histories: HashMap<String, History>,
    running: bool,
}

/// State reachable from both the service and its sampling loop
struct Shared {
    source: Arc<dyn SensorSource>,
    history_capacity: usize,
    state: Mutex<CollectorState>,
    batch_tx: mpsc::UnboundedSender<Vec<Reading>>,
    error_tx: mpsc::UnboundedSender<MonitorError>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_readings(&self, batch: &[Reading]) {
        let mut state = self.state();
        for reading in batch {
            state
                .histories
                .entry(reading.key.clone())
                .or_insert_with(|| History::new(self.history_capacity))
                .append(reading.clone());
        }
    }

    fn set_running(&self, running: bool) {
        self.state().running = running;
    }

    // Sends only fail once the service (and its receivers) is gone.
    fn push_batch(&self, batch: Vec<Reading>) {
        let _ = self.batch_tx.send(batch);
    }

    fn push_error(&self, error: MonitorError) {
        let _ = self.error_tx.send(error);
    }
}

struct Worker {
    generation: u64,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    worker: Option<Worker>,
    generation: u64,
}

/// Polls a sensor source in the background, keeps per-sensor history and
/// hands new batches and errors to callbacks when the consumer drains.
///
/// Callbacks never run on the sampling task: they are invoked from
/// [`CollectorService::drain_pending`] on whatever context calls it.
pub struct CollectorService {
    shared: Arc<Shared>,
    interval: Duration,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    batch_rx: Mutex<mpsc::UnboundedReceiver<Vec<Reading>>>,
    error_rx: Mutex<mpsc::UnboundedReceiver<MonitorError>>,
    reading_callbacks: RwLock<Vec<ReadingCallback>>,
    error_callbacks: RwLock<Vec<ErrorCallback>>,
}

impl CollectorService {
    pub fn new(source: Arc<dyn SensorSource>, config: CollectorConfig) -> Self {
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                source,
                history_capacity: config.history_capacity,
                state: Mutex::new(CollectorState {
                    histories: HashMap::new(),
                    running: false,
                }),
                batch_tx,
                error_tx,
            }),
            interval: config.interval,
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
            batch_rx: Mutex::new(batch_rx),
            error_rx: Mutex::new(error_rx),
            reading_callbacks: RwLock::new(Vec::new()),
            error_callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn with_defaults(source: Arc<dyn SensorSource>) -> Self {
        Self::new(source, CollectorConfig::default())
    }

    /// Spawn the sampling loop unless one is already alive
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;

        if let Some(worker) = lifecycle.worker.as_ref() {
            if !worker.handle.is_finished() {
                debug!(generation = worker.generation, "collector already running");
                return;
            }
        }

        if let Some(Worker { generation, handle, .. }) = lifecycle.worker.take() {
            if let Err(e) = handle.await {
                warn!(generation, error = %e, "sampling loop exited abnormally");
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.shared.set_running(true);
        lifecycle.generation += 1;
        let generation = lifecycle.generation;

        let handle = tokio::spawn(sampling_loop(
            Arc::clone(&self.shared),
            self.interval,
            stop_rx,
            generation,
        ));

        lifecycle.worker = Some(Worker {
            generation,
            stop_tx,
            handle,
        });

        info!(generation, interval = ?self.interval, "collector started");
    }

    /// Signal the sampling loop and wait until it has exited
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;

        let Some(worker) = lifecycle.worker.as_mut() else {
            self.shared.set_running(false);
            return;
        };

        let _ = worker.stop_tx.send(true);
        if let Err(e) = (&mut worker.handle).await {
            warn!(generation = worker.generation, error = %e, "sampling loop join failed");
        }

        // The loop clears `running` on exit; this covers a task that was
        // aborted before it could.
        self.shared.set_running(false);
        let generation = worker.generation;
        lifecycle.worker = None;
        info!(generation, "collector stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    /// Generation number of the live sampling loop, if any
    pub async fn active_generation(&self) -> Option<u64> {
        let lifecycle = self.lifecycle.lock().await;
        lifecycle
            .worker
            .as_ref()
            .filter(|w| !w.handle.is_finished())
            .map(|w| w.generation)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn register_reading_callback<F>(&self, callback: F)
    where
        F: Fn(&[Reading]) -> CallbackResult + Send + Sync + 'static,
    {
        self.reading_callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn register_error_callback<F>(&self, callback: F)
    where
        F: Fn(&MonitorError) -> CallbackResult + Send + Sync + 'static,
    {
        self.error_callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Store a batch in the per-sensor histories
    pub fn record_readings(&self, batch: &[Reading]) {
        self.shared.record_readings(batch);
    }

    /// Deliver everything queued since the last drain.
    ///
    /// Batches go first, to every reading callback in registration order.
    /// A failing reading callback is turned into a queued error, so it is
    /// reported by the error pass of this same call. Failures inside error
    /// callbacks are dropped.
    pub fn drain_pending(&self) -> DrainStats {
        let mut stats = DrainStats::default();

        let reading_callbacks = self
            .reading_callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        while let Some(batch) = self.next_batch() {
            stats.batches += 1;
            for callback in &reading_callbacks {
                if let Err(message) = invoke(|| callback(batch.as_slice())) {
                    warn!(error = %message, "reading callback failed");
                    self.shared.push_error(MonitorError::Callback(message));
                }
            }
        }

        let error_callbacks = self
            .error_callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        while let Some(error) = self.next_error() {
            stats.errors += 1;
            for callback in &error_callbacks {
                if let Err(message) = invoke(|| callback(&error)) {
                    debug!(error = %message, "error callback failed");
                }
            }
        }

        stats
    }

    /// Read the source directly, bypassing history and the pending queues
    pub async fn current_readings(&self) -> Result<Vec<Reading>, SourceError> {
        self.shared.source.current_readings().await
    }

    pub fn history_for(&self, key: &str, window_minutes: u64) -> Vec<Reading> {
        let window = minutes(window_minutes);
        let state = self.shared.state();
        state
            .histories
            .get(key)
            .map(|h| h.window(window))
            .unwrap_or_default()
    }

    pub fn all_histories(&self, window_minutes: u64) -> HashMap<String, Vec<Reading>> {
        let window = minutes(window_minutes);
        let state = self.shared.state();
        state
            .histories
            .iter()
            .map(|(key, history)| (key.clone(), history.window(window)))
            .collect()
    }

    pub fn latest_reading(&self, key: &str) -> Option<Reading> {
        self.shared.state().histories.get(key).and_then(History::latest)
    }

    pub fn sensor_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shared.state().histories.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn next_batch(&self) -> Option<Vec<Reading>> {
        self.batch_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    fn next_error(&self) -> Option<MonitorError> {
        self.error_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    #[cfg(test)]
    fn enqueue_batch(&self, batch: Vec<Reading>) {
        self.shared.push_batch(batch);
    }

    #[cfg(test)]
    fn enqueue_error(&self, error: MonitorError) {
        self.shared.push_error(error);
    }
}

async fn sampling_loop(
    shared: Arc<Shared>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
    generation: u64,
) {
    debug!(generation, "sampling loop started");
    let _running = RunningGuard(&shared);

    loop {
        let stopped = *stop_rx.borrow();
        if stopped {
            break;
        }

        let sampled = AssertUnwindSafe(shared.source.current_readings())
            .catch_unwind()
            .await;

        match sampled {
            Ok(Ok(batch)) => {
                debug!(generation, readings = batch.len(), "sampled sensors");
                shared.record_readings(&batch);
                shared.push_batch(batch);
            }
            Ok(Err(e)) => {
                warn!(generation, error = %e, "sensor source failed");
                shared.push_error(MonitorError::Source(e));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(generation, error = %message, "sensor source panicked");
                shared.push_error(MonitorError::SourcePanic(message));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop_rx.changed() => {
                // Sender dropped: the service itself is gone.
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(generation, "sampling loop exited");
}

/// Clears the running flag however the sampling loop ends
struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set_running(false);
    }
}

fn invoke<F>(callback: F) -> Result<(), String>
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn minutes(window_minutes: u64) -> Duration {
    Duration::from_secs(window_minutes.saturating_mul(60))
}
