//! Background stats-only refresh on a fixed interval.
//!
//! Full rebuilds are never scheduled; they happen on request. The task
//! stops when [`Refresher::shutdown`] is called, waiting up to the
//! configured timeout for an in-flight refresh before aborting it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::retriever::Retriever;

pub struct Refresher {
    retriever: Arc<Retriever>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl Refresher {
    /// Spawn the refresh loop. The first refresh runs one `interval` from now.
    pub fn spawn(retriever: Arc<Retriever>, interval: Duration, shutdown_timeout: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let task_retriever = Arc::clone(&retriever);
        let handle = tokio::spawn(async move {
            let retriever = task_retriever;
            loop {
                retriever.set_next_refresh_at(
                    chrono::Duration::from_std(interval)
                        .ok()
                        .and_then(|d| Utc::now().checked_add_signed(d)),
                );

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stopped.changed() => break,
                }

                match retriever.refresh(false).await {
                    Ok(stats) if stats.skipped => {
                        tracing::debug!("scheduled refresh skipped, another refresh is running");
                    }
                    Ok(stats) => {
                        tracing::debug!(version = ?stats.version, tables = stats.tables_processed, "scheduled refresh done");
                    }
                    Err(e) => tracing::warn!(error = %e, "scheduled refresh failed"),
                }
            }
            retriever.set_next_refresh_at(None);
        });

        tracing::info!(interval_secs = interval.as_secs(), "background refresher started");
        Self {
            retriever,
            stop,
            handle,
            shutdown_timeout,
        }
    }

    /// Signal the loop to stop and wait for it, aborting after the timeout.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let mut handle = self.handle;
        match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
            Ok(_) => tracing::info!("background refresher stopped"),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    "background refresher did not stop in time, aborting"
                );
                handle.abort();
            }
        }
        self.retriever.set_next_refresh_at(None);
    }
}
