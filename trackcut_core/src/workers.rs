//! Bounded worker pool for offloading segment analysis.
//!
//! Spectral analysis is the only pipeline stage expensive enough to be
//! worth parallelizing across segments. The pool applies backpressure
//! through a bounded job queue: a full queue surfaces as
//! [`EngineError::Busy`] instead of growing without bound. Cancellation is
//! checked between jobs, never mid-computation, since an in-flight FFT is
//! not meaningfully interruptible.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::analysis::QualityAnalyzer;
use crate::buffer::AudioBuffer;
use crate::error::EngineError;
use crate::gate::{self, QualityReport};
use crate::profile::QualityProfile;

struct AnalysisJob {
    buffer: AudioBuffer,
    reply: Sender<Result<QualityReport, EngineError>>,
}

/// Handle on one submitted analysis job.
pub struct JobHandle {
    reply_rx: Receiver<Result<QualityReport, EngineError>>,
}

impl JobHandle {
    /// Wait for the job's report, bounded by `timeout` when given.
    pub fn wait(self, timeout: Option<Duration>) -> Result<QualityReport, EngineError> {
        let received = match timeout {
            Some(timeout) => self.reply_rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => {
                    EngineError::analysis(format!("analysis timed out after {timeout:?}"))
                }
                RecvTimeoutError::Disconnected => {
                    EngineError::analysis("analysis worker exited before replying")
                }
            }),
            None => self
                .reply_rx
                .recv()
                .map_err(|_| EngineError::analysis("analysis worker exited before replying")),
        };
        received?
    }
}

/// A fixed set of analysis workers behind a bounded queue.
pub struct AnalysisPool {
    job_tx: Option<SyncSender<AnalysisJob>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl AnalysisPool {
    /// Spawn `workers` threads sharing a queue of `queue_depth` slots.
    pub fn new(
        workers: NonZeroUsize,
        queue_depth: usize,
        analyzer: QualityAnalyzer,
        profile: QualityProfile,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::sync_channel::<AnalysisJob>(queue_depth);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let cancel = Arc::new(AtomicBool::new(false));

        let handles = (0..workers.get())
            .map(|worker| {
                let job_rx = Arc::clone(&job_rx);
                let cancel = Arc::clone(&cancel);
                let analyzer = analyzer.clone();
                let profile = profile.clone();
                thread::Builder::new()
                    .name(format!("trackcut-analysis-{worker}"))
                    .spawn(move || {
                        loop {
                            let job = {
                                let guard = job_rx.lock().unwrap_or_else(|e| e.into_inner());
                                guard.recv()
                            };
                            let Ok(job) = job else {
                                break;
                            };
                            // Checked between jobs only; a running FFT is
                            // allowed to finish.
                            let result = if cancel.load(Ordering::Acquire) {
                                Err(EngineError::analysis("analysis cancelled"))
                            } else {
                                analyzer
                                    .analyze(&job.buffer)
                                    .map(|metrics| gate::report(metrics, &profile))
                            };
                            // The submitter may have timed out and dropped
                            // its handle; that is not the worker's problem.
                            let _ = job.reply.send(result);
                        }
                        debug!("analysis worker {worker} shutting down");
                    })
                    .expect("spawning an analysis worker cannot fail")
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            workers: handles,
            cancel,
        }
    }

    /// Queue a buffer for analysis without blocking.
    ///
    /// Returns [`EngineError::Busy`] when every queue slot is taken; the
    /// caller decides whether to wait for outstanding results or give up.
    pub fn try_submit(&self, buffer: AudioBuffer) -> Result<JobHandle, EngineError> {
        let job_tx = self
            .job_tx
            .as_ref()
            .expect("job queue is open until the pool is dropped");
        let (reply_tx, reply_rx) = mpsc::channel();
        match job_tx.try_send(AnalysisJob {
            buffer,
            reply: reply_tx,
        }) {
            Ok(()) => Ok(JobHandle { reply_rx }),
            Err(TrySendError::Full(_)) => Err(EngineError::Busy),
            Err(TrySendError::Disconnected(_)) => {
                Err(EngineError::analysis("analysis worker pool has shut down"))
            }
        }
    }

    /// Request cancellation of all not-yet-started jobs.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }
}

impl Drop for AnalysisPool {
    fn drop(&mut self) {
        // Closing the queue lets each worker drain and exit.
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
