use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde_json::Value;
use thiserror::Error;

use crate::bridge::{Bridge, BridgeResponse, CHANNEL_NAME};

/// Jobs that may wait behind the one in flight
pub const JOB_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("bridge worker queue is full")]
    Busy,

    #[error("bridge call did not finish within {0:?}")]
    Timeout(Duration),

    #[error("bridge worker has stopped")]
    Disconnected,
}

struct Job {
    operation: String,
    arguments: Value,
    reply: Sender<BridgeResponse>,
}

/// Runs a [`Bridge`] on a dedicated thread so inference never blocks the
/// caller's own thread.
///
/// Jobs are processed one at a time in arrival order. A call abandoned by
/// [`BridgeWorker::call_timeout`] still runs to completion on the worker; its
/// reply is dropped. Submitting to a full queue fails with
/// [`WorkerError::Busy`] instead of blocking.
pub struct BridgeWorker {
    jobs: Option<Sender<Job>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl BridgeWorker {
    pub fn spawn(bridge: Bridge) -> std::io::Result<Self> {
        Self::with_capacity(bridge, JOB_QUEUE_CAPACITY)
    }

    /// Spawn with room for `capacity` queued jobs
    pub fn with_capacity(bridge: Bridge, capacity: usize) -> std::io::Result<Self> {
        let (jobs, job_rx) = bounded::<Job>(capacity);
        let thread = thread::Builder::new()
            .name(format!("{CHANNEL_NAME}-worker"))
            .spawn(move || run_worker_loop(bridge, job_rx))?;

        Ok(Self {
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }

    /// Submit a call and block until the worker replies
    pub fn call(&self, operation: &str, arguments: Value) -> Result<BridgeResponse, WorkerError> {
        self.submit(operation, arguments)?
            .recv()
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Submit a call and wait at most `timeout` for the reply
    pub fn call_timeout(
        &self,
        operation: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<BridgeResponse, WorkerError> {
        match self.submit(operation, arguments)?.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("{} timed out after {:?}, discarding result", operation, timeout);
                Err(WorkerError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }

    fn submit(
        &self,
        operation: &str,
        arguments: Value,
    ) -> Result<Receiver<BridgeResponse>, WorkerError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerError::Disconnected)?;
        let (reply, reply_rx) = bounded(1);
        jobs.try_send(Job {
            operation: operation.to_string(),
            arguments,
            reply,
        })
        .map_err(|e| match e {
            TrySendError::Full(job) => {
                tracing::warn!("Rejecting {}: worker queue is full", job.operation);
                WorkerError::Busy
            }
            TrySendError::Disconnected(_) => WorkerError::Disconnected,
        })?;
        Ok(reply_rx)
    }

    /// Finish queued jobs, close the bridge and join the worker thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Stop accepting jobs without waiting for the one in flight
    pub fn detach(mut self) {
        self.jobs.take();
        self.thread.take();
    }

    fn stop(&mut self) {
        // Dropping the sender ends the worker loop once the queue drains
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Bridge worker thread panicked");
            }
        }
    }
}

impl Drop for BridgeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker_loop(mut bridge: Bridge, jobs: Receiver<Job>) {
    tracing::debug!("Bridge worker started");

    for job in jobs.iter() {
        let response = bridge.handle(&job.operation, &job.arguments);
        if job.reply.send(response).is_err() {
            tracing::debug!("Caller stopped waiting for {}", job.operation);
        }
    }

    bridge.close();
    tracing::debug!("Bridge worker stopped");
}
