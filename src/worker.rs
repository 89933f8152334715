//! Background worker - runs jobs off the caller's thread
//!
//! Each submitted job gets its own handle; the caller polls or blocks on it
//! and is never held up while a job runs.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;

use crate::pipeline::{CompositionJob, CompositionOutput, Compositor, PipelineError};

pub struct PipelineWorker {
    pool: rayon::ThreadPool,
    compositor: Arc<Compositor>,
}

impl PipelineWorker {
    pub fn new(compositor: Compositor, threads: usize) -> Result<Self, PipelineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("photobooth-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::Worker(e.to_string()))?;
        Ok(Self {
            pool,
            compositor: Arc::new(compositor),
        })
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn submit(&self, job: CompositionJob) -> JobHandle {
        let (tx, rx) = mpsc::channel();
        let compositor = Arc::clone(&self.compositor);
        self.pool.spawn(move || {
            let result = compositor.run(&job);
            // receiver may be gone; the job still ran to completion
            let _ = tx.send(result);
        });
        JobHandle { rx: Some(rx) }
    }
}

/// Result slot for one submitted job.
pub struct JobHandle {
    rx: Option<Receiver<Result<CompositionOutput, PipelineError>>>,
}

impl JobHandle {
    /// Block until the job finishes.
    pub fn wait(mut self) -> Result<CompositionOutput, PipelineError> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| PipelineError::Worker("result already taken".into()))?;
        rx.recv()
            .map_err(|_| PipelineError::Worker("worker exited without a result".into()))?
    }

    /// `None` while the job is still running.
    pub fn try_result(&mut self) -> Option<Result<CompositionOutput, PipelineError>> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(Err(PipelineError::Worker(
                    "worker exited without a result".into(),
                )))
            }
        }
    }
}
