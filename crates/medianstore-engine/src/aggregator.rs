//! Aggregator: buffers single samples into run-length batches.
//!
//! The owner task keeps `value -> Entry` in an ordered map and flushes it to a
//! [`MedianSink`] on whichever comes first:
//! - `buffer_size` occurrences buffered
//! - `flush_interval` elapsed since the last flush
//!
//! Size and interval flushes are spawned so a slow sink never stalls incoming
//! writes. Several flushes may be in flight at once; the sink serializes them.
//! `stop()` waits for every in-flight flush and then submits the remainder.
//! If any flush since start was rejected, `stop()` returns the first error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};

use medianstore_core::{Entry, MedianStoreError, Result};

use crate::config::AggregatorSection;
use crate::metric::Metric;
use crate::obs::StoreMetrics;
use crate::sink::MedianSink;

enum Command {
    Write {
        value: i64,
        accepted: oneshot::Sender<()>,
    },
    Stop {
        done: oneshot::Sender<Result<()>>,
    },
}

#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Size,
    Interval,
    Stop,
}

impl FlushTrigger {
    fn as_str(self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Interval => "interval",
            FlushTrigger::Stop => "stop",
        }
    }
}

/// Handle to the aggregator's owner task.
#[derive(Clone)]
pub struct Aggregator {
    tx: mpsc::Sender<Command>,
}

impl Aggregator {
    /// Spawn the owner task in front of `sink`. Must be called inside a tokio runtime.
    pub fn start<S>(cfg: &AggregatorSection, sink: Arc<S>, metrics: Arc<StoreMetrics>) -> Self
    where
        S: MedianSink + 'static,
    {
        let (tx, rx) = mpsc::channel::<Command>(1);
        let interval = cfg.flush_interval();

        let owner = Owner {
            rx,
            sink,
            metrics,
            buffer_size: cfg.buffer_size,
            interval,
            buffer: BTreeMap::new(),
            buffered: 0,
            inflight: JoinSet::new(),
            failure: None,
        };
        tokio::spawn(owner.run());

        tracing::info!(
            buffer_size = cfg.buffer_size,
            flush_interval_ms = cfg.flush_interval_ms,
            "aggregator started"
        );
        Self { tx }
    }

    /// Submit one sample. Returns once the owner task has taken it.
    pub async fn write<M: Metric + ?Sized>(&self, metric: &M) -> Result<()> {
        let (accepted, ack) = oneshot::channel();
        self.tx
            .send(Command::Write {
                value: metric.value(),
                accepted,
            })
            .await
            .map_err(|_| MedianStoreError::Closed)?;
        ack.await.map_err(|_| MedianStoreError::Closed)
    }

    /// Flush what is buffered and wait until the sink accepted it.
    ///
    /// Fails with the first flush error seen since start, e.g. `Closed` when
    /// the engine went away before taking a batch.
    pub async fn stop(self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Command::Stop { done })
            .await
            .map_err(|_| MedianStoreError::Closed)?;
        rx.await.map_err(|_| MedianStoreError::Closed)??;
        tracing::info!("aggregator stopped");
        Ok(())
    }
}

struct Owner<S> {
    rx: mpsc::Receiver<Command>,
    sink: Arc<S>,
    metrics: Arc<StoreMetrics>,
    buffer_size: u64,
    interval: Duration,
    buffer: BTreeMap<i64, Entry>,
    buffered: u64,
    inflight: JoinSet<Result<()>>,
    /// First rejected flush; reported by `stop()`.
    failure: Option<MedianStoreError>,
}

impl<S> Owner<S>
where
    S: MedianSink + 'static,
{
    async fn run(mut self) {
        let deadline = sleep_until(Instant::now() + self.interval);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Write { value, accepted }) => {
                        let _ = accepted.send(());
                        self.buffer
                            .entry(value)
                            .and_modify(Entry::increment)
                            .or_insert_with(|| Entry::new(value));
                        self.buffered += 1;

                        if self.buffered >= self.buffer_size {
                            self.spawn_flush(FlushTrigger::Size);
                            deadline.as_mut().reset(Instant::now() + self.interval);
                        }
                    }
                    Some(Command::Stop { done }) => {
                        let _ = done.send(self.drain().await);
                        return;
                    }
                    None => {
                        tracing::warn!(
                            buffered = self.buffered,
                            "all aggregator handles dropped without stop"
                        );
                        if let Err(e) = self.drain().await {
                            tracing::error!(error = %e, "buffered samples lost");
                        }
                        return;
                    }
                },

                _ = &mut deadline => {
                    self.spawn_flush(FlushTrigger::Interval);
                    deadline.as_mut().reset(Instant::now() + self.interval);
                }

                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    self.record_flush(joined);
                }
            }
        }
    }

    /// Take the buffer as a sorted batch, or `None` if nothing is buffered.
    fn take_batch(&mut self, trigger: FlushTrigger) -> Option<Vec<Entry>> {
        if self.buffer.is_empty() {
            return None;
        }
        let batch: Vec<Entry> = std::mem::take(&mut self.buffer).into_values().collect();
        tracing::debug!(
            trigger = trigger.as_str(),
            entries = batch.len(),
            occurrences = self.buffered,
            "flushing"
        );
        self.metrics.flushes.inc(&[("trigger", trigger.as_str())]);
        self.buffered = 0;
        Some(batch)
    }

    fn spawn_flush(&mut self, trigger: FlushTrigger) {
        let Some(batch) = self.take_batch(trigger) else {
            return;
        };
        let sink = Arc::clone(&self.sink);
        self.inflight.spawn(async move { sink.bulk_write(batch).await });
    }

    /// Wait for in-flight flushes, then hand over the remainder directly.
    async fn drain(&mut self) -> Result<()> {
        while let Some(joined) = self.inflight.join_next().await {
            self.record_flush(joined);
        }
        if let Some(batch) = self.take_batch(FlushTrigger::Stop) {
            let accepted = self.sink.bulk_write(batch).await;
            self.record_flush(Ok(accepted));
        }
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn record_flush(&mut self, joined: std::result::Result<Result<()>, JoinError>) {
        let err = match joined {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(e) => MedianStoreError::Internal(format!("flush task failed: {e}")),
        };
        tracing::error!(error = %err, "flush rejected");
        self.metrics.flush_errors.inc(&[]);
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }
}
