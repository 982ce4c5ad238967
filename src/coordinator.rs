//! Poll scheduler: owns the Redfish client and the last good snapshot.
//!
//! A failed poll never clears data. Readers keep seeing the previous
//! snapshot until a later poll succeeds and replaces it wholesale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::types::validate_poll_interval;
use crate::redfish::{RedfishClient, RedfishError};
use crate::telemetry::types::Snapshot;

pub type SnapshotReceiver = watch::Receiver<Option<Arc<Snapshot>>>;

pub struct Coordinator {
    client: Arc<RedfishClient>,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    interval_tx: watch::Sender<Duration>,
    /// Held from construction so `run` also sees changes made before it started.
    interval_rx: watch::Receiver<Duration>,
    /// Serializes polls so two refreshes never overlap.
    poll_lock: Mutex<()>,
    last_update_success: AtomicBool,
}

impl Coordinator {
    pub fn new(client: Arc<RedfishClient>, poll_interval_seconds: u64) -> Result<Self> {
        let seconds = validate_poll_interval(poll_interval_seconds)?;
        let (snapshot_tx, _) = watch::channel(None);
        let (interval_tx, interval_rx) = watch::channel(Duration::from_secs(seconds));
        Ok(Self {
            client,
            snapshot_tx,
            interval_tx,
            interval_rx,
            poll_lock: Mutex::new(()),
            last_update_success: AtomicBool::new(false),
        })
    }

    pub fn client(&self) -> &RedfishClient {
        &self.client
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_tx.subscribe()
    }

    pub fn poll_interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Initial poll. Failure means the CIMC is not ready and the agent should not start.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, RedfishError> {
        let snapshot = self.poll().await?;
        info!(
            "Initial CIMC poll of {} succeeded: {} fans, {} PSUs, {} temperature sensors",
            self.client.host(),
            snapshot.fans.len(),
            snapshot.psus().len(),
            snapshot.temperatures().len()
        );
        Ok(snapshot)
    }

    /// One poll. On failure the previous snapshot stays published.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RedfishError> {
        match self.poll().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!("Error fetching CIMC Redfish ({}) data: {}", self.client.host(), e);
                Err(e)
            }
        }
    }

    async fn poll(&self) -> Result<Arc<Snapshot>, RedfishError> {
        let _guard = self.poll_lock.lock().await;
        match self.client.fetch_all().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
                self.last_update_success.store(true, Ordering::SeqCst);
                debug!("Published new snapshot for {}", self.client.host());
                Ok(snapshot)
            }
            Err(e) => {
                self.last_update_success.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Change the poll interval. Takes effect immediately and triggers a refresh
    /// inside `run`.
    pub fn set_poll_interval(&self, seconds: u64) -> Result<()> {
        let seconds = validate_poll_interval(seconds)?;
        let period = Duration::from_secs(seconds);
        if self.interval_tx.send_replace(period) != period {
            info!("Poll interval changed to {}s", seconds);
        }
        Ok(())
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval_rx = self.interval_rx.clone();
        let mut ticker = poll_ticker(*interval_rx.borrow());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.refresh_until_shutdown(&mut shutdown).await {
                        break;
                    }
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let period = *interval_rx.borrow_and_update();
                    ticker = poll_ticker(period);
                    if self.refresh_until_shutdown(&mut shutdown).await {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Stopped polling {}", self.client.host());
    }

    /// A shutdown request abandons the in-flight poll. Returns true when polling should stop.
    async fn refresh_until_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = self.refresh() => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}

/// First tick lands one full period from now; the caller already holds fresh data.
fn poll_ticker(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
