use super::RuntimeError;
use crate::router::{DispatchResult, Invocation, Router, RouterReply};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const POOL_POLL_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct PoolJob {
    pub sequence: u64,
    pub invocation: Invocation,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub sequence: u64,
    pub invocation_id: Option<String>,
    pub reply: RouterReply,
}

#[derive(Debug, Clone)]
pub enum PoolEvent {
    Completed(Completion),
    /// Fired on every pass of the scheduling loop, at least once per poll
    /// interval while the pool is waiting.
    Tick,
}

/// Runs each invocation on its own thread, at most `max_concurrency` at a
/// time. Jobs beyond the limit wait in arrival order; completions are
/// reported in whatever order they finish.
#[derive(Debug, Clone)]
pub struct RouterPool {
    router: Arc<Router>,
    max_concurrency: usize,
}

impl RouterPool {
    pub fn new(router: Arc<Router>, max_concurrency: usize) -> Self {
        Self {
            router,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Consumes jobs until the sender side hangs up and every admitted job
    /// has completed. Returns the number of completions delivered.
    pub fn run<F>(&self, jobs: Receiver<PoolJob>, mut on_complete: F) -> Result<usize, RuntimeError>
    where
        F: FnMut(Completion) -> Result<(), RuntimeError>,
    {
        self.run_events(jobs, |event| match event {
            PoolEvent::Completed(done) => on_complete(done),
            PoolEvent::Tick => Ok(()),
        })
    }

    pub fn run_events<F>(
        &self,
        jobs: Receiver<PoolJob>,
        mut on_event: F,
    ) -> Result<usize, RuntimeError>
    where
        F: FnMut(PoolEvent) -> Result<(), RuntimeError>,
    {
        let (result_tx, result_rx) = mpsc::channel::<Completion>();
        let mut pending: VecDeque<PoolJob> = VecDeque::new();
        let mut in_flight = 0usize;
        let mut completed = 0usize;
        let mut input_open = true;
        let poll = Duration::from_millis(POOL_POLL_MS);

        loop {
            while in_flight < self.max_concurrency {
                let Some(job) = pending.pop_front() else {
                    break;
                };
                let tx = result_tx.clone();
                let router = Arc::clone(&self.router);
                let _ = thread::spawn(move || {
                    let _ = tx.send(run_job(&router, job));
                });
                in_flight += 1;
            }

            while let Ok(done) = result_rx.try_recv() {
                in_flight = in_flight.saturating_sub(1);
                completed += 1;
                on_event(PoolEvent::Completed(done))?;
            }
            on_event(PoolEvent::Tick)?;

            if !input_open && pending.is_empty() && in_flight == 0 {
                break;
            }

            if input_open {
                match jobs.recv_timeout(poll) {
                    Ok(job) => pending.push_back(job),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => input_open = false,
                }
            } else if in_flight > 0 {
                match result_rx.recv_timeout(poll) {
                    Ok(done) => {
                        in_flight = in_flight.saturating_sub(1);
                        completed += 1;
                        on_event(PoolEvent::Completed(done))?;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(RuntimeError::CompletionChannelClosed)
                    }
                }
            }
        }

        Ok(completed)
    }

    pub fn run_all(&self, invocations: Vec<Invocation>) -> Result<Vec<Completion>, RuntimeError> {
        let (job_tx, job_rx) = mpsc::channel::<PoolJob>();
        for (sequence, invocation) in invocations.into_iter().enumerate() {
            job_tx
                .send(PoolJob {
                    sequence: sequence as u64,
                    invocation,
                })
                .map_err(|_| RuntimeError::CompletionChannelClosed)?;
        }
        drop(job_tx);

        let mut completions = Vec::new();
        self.run(job_rx, |done| {
            completions.push(done);
            Ok(())
        })?;
        Ok(completions)
    }
}

fn run_job(router: &Router, job: PoolJob) -> Completion {
    let reply = match panic::catch_unwind(AssertUnwindSafe(|| router.handle(&job.invocation))) {
        Ok(reply) => reply,
        Err(_) => {
            tracing::error!(sequence = job.sequence, "invocation handler panicked");
            RouterReply::Dispatched(DispatchResult::failure(
                "Internal error while handling the command",
                "invocation handler panicked",
            ))
        }
    };
    Completion {
        sequence: job.sequence,
        invocation_id: job.invocation.id,
        reply,
    }
}
