//! Background runtime thread and the blocking bridge into it.
//!
//! A dedicated OS thread runs a single-threaded tokio runtime that owns the
//! [`Session`]. Any thread can hand it work through a [`RuntimeHandle`]; jobs
//! run one at a time in submission order, and each reply comes back on its
//! own channel so the caller can block on it (with or without a deadline).
//!
//! Never call the blocking handle methods from the runtime thread itself.

use std::future::Future;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::{mpsc as async_mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use toolchat_core::types::Turn;

use crate::session::Session;

/// Reply when no session is live.
pub const NOT_READY: &str = "Agent is not ready yet.";

/// Bound used when the runtime is dropped without an explicit shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a timed-out caller waits for the runtime to acknowledge the cancel.
const CANCEL_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime thread is gone; nothing submitted now will run.
    #[error("background runtime has stopped")]
    Stopped,

    #[error("no reply within {0:?}")]
    TimedOut(Duration),

    /// The caller stopped waiting; the invocation was dropped.
    #[error("cancelled")]
    Cancelled,

    /// The process is shutting down; in-flight work was abandoned.
    #[error("interrupted")]
    Interrupted,

    #[error("agent failed: {0:#}")]
    Agent(anyhow::Error),
}

enum Job {
    Invoke {
        text: String,
        reply: SyncSender<Result<String, RuntimeError>>,
        cancel: oneshot::Receiver<()>,
    },
    Reset(SyncSender<()>),
    Transcript(SyncSender<Vec<Turn>>),
    ToolNames(SyncSender<Vec<String>>),
    Cleanup(SyncSender<()>),
    Stop,
}

// ─────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────

/// Cloneable, thread-safe entry point into the runtime.
#[derive(Clone)]
pub struct RuntimeHandle {
    jobs: async_mpsc::UnboundedSender<Job>,
    interrupt: Arc<watch::Sender<bool>>,
}

impl RuntimeHandle {
    /// Queue an invocation without waiting for it.
    ///
    /// Dropping the returned [`PendingReply`] before it resolves cancels the
    /// invocation.
    pub fn submit(&self, text: impl Into<String>) -> PendingReply {
        let (reply, rx) = mpsc::sync_channel(1);
        let (cancel_tx, cancel) = oneshot::channel();
        let job = Job::Invoke {
            text: text.into(),
            reply,
            cancel,
        };
        if let Err(async_mpsc::error::SendError(job)) = self.jobs.send(job) {
            // Hand the failure back through the reply channel.
            if let Job::Invoke { reply, .. } = job {
                let _ = reply.send(Err(RuntimeError::Stopped));
            }
        }
        PendingReply {
            rx,
            cancel: Some(cancel_tx),
        }
    }

    /// Send `text` to the agent and block until it replies.
    pub fn invoke(&self, text: impl Into<String>) -> Result<String, RuntimeError> {
        self.submit(text).wait()
    }

    /// Like [`invoke`](Self::invoke), but give up after `timeout`. The
    /// abandoned invocation is cancelled inside the runtime.
    pub fn invoke_timeout(
        &self,
        text: impl Into<String>,
        timeout: Duration,
    ) -> Result<String, RuntimeError> {
        self.submit(text).wait_timeout(timeout)
    }

    /// Clear the transcript. Queued behind any pending invocations.
    pub fn reset(&self) -> Result<(), RuntimeError> {
        self.request(Job::Reset)
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Result<Vec<Turn>, RuntimeError> {
        self.request(Job::Transcript)
    }

    pub fn tool_names(&self) -> Result<Vec<String>, RuntimeError> {
        self.request(Job::ToolNames)
    }

    /// Close the session and its tool server. Idempotent; later invocations
    /// get [`NOT_READY`].
    pub fn cleanup(&self) -> Result<(), RuntimeError> {
        self.request(Job::Cleanup)
    }

    /// Abort the in-flight invocation and make every later one fail with
    /// [`RuntimeError::Interrupted`]. Safe from any thread, including signal
    /// handlers.
    pub fn interrupt(&self) {
        self.interrupt.send_replace(true);
    }

    fn request<T>(&self, make: impl FnOnce(SyncSender<T>) -> Job) -> Result<T, RuntimeError> {
        let rx = self.enqueue(make)?;
        rx.recv().map_err(|_| RuntimeError::Stopped)
    }

    fn request_timeout<T>(
        &self,
        make: impl FnOnce(SyncSender<T>) -> Job,
        timeout: Duration,
    ) -> Result<T, RuntimeError> {
        let rx = self.enqueue(make)?;
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => RuntimeError::TimedOut(timeout),
            RecvTimeoutError::Disconnected => RuntimeError::Stopped,
        })
    }

    fn enqueue<T>(&self, make: impl FnOnce(SyncSender<T>) -> Job) -> Result<Receiver<T>, RuntimeError> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.jobs.send(make(tx)).map_err(|_| RuntimeError::Stopped)?;
        Ok(rx)
    }
}

/// An invocation that has been queued but not yet waited on.
pub struct PendingReply {
    rx: Receiver<Result<String, RuntimeError>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl PendingReply {
    pub fn wait(self) -> Result<String, RuntimeError> {
        self.rx.recv().unwrap_or(Err(RuntimeError::Stopped))
    }

    /// Wait at most `timeout`; on expiry the invocation is cancelled.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<String, RuntimeError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(cancel) = self.cancel.take() {
                    let _ = cancel.send(());
                }
                // The runtime answers a cancel right away unless the job is
                // still queued. A reply that beat the cancel was recorded, so
                // it is returned rather than dropped.
                match self.rx.recv_timeout(CANCEL_GRACE) {
                    Ok(Err(RuntimeError::Cancelled)) | Err(RecvTimeoutError::Timeout) => {
                        Err(RuntimeError::TimedOut(timeout))
                    }
                    Ok(result) => result,
                    Err(RecvTimeoutError::Disconnected) => Err(RuntimeError::Stopped),
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(RuntimeError::Stopped),
        }
    }
}

// ─────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────

/// Owns the runtime thread. Dropping it shuts the thread down.
pub struct AgentRuntime {
    handle: RuntimeHandle,
    thread: Option<JoinHandle<()>>,
    /// Disconnects when the worker finishes.
    done: Receiver<()>,
}

impl AgentRuntime {
    /// Spawn the runtime thread and run `bootstrap` on it, blocking until the
    /// session is ready. A bootstrap error stops the thread and is returned.
    pub fn start<F, Fut>(bootstrap: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Session>> + 'static,
    {
        let (jobs, job_rx) = async_mpsc::unbounded_channel();
        let (interrupt, _) = watch::channel(false);
        let interrupt = Arc::new(interrupt);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (done_tx, done) = mpsc::sync_channel::<()>(1);

        let worker_interrupt = Arc::clone(&interrupt);
        let thread = std::thread::Builder::new()
            .name("toolchat-runtime".into())
            .spawn(move || {
                let _done = done_tx;
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(e).context("failed to build tokio runtime")));
                        return;
                    }
                };

                rt.block_on(async move {
                    let session = match bootstrap().await {
                        Ok(session) => session,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    drop(ready_tx);
                    run_jobs(Some(session), job_rx, worker_interrupt).await;
                });
                debug!("runtime thread exiting");
            })
            .context("failed to spawn runtime thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.context("session startup failed"));
            }
            Err(_) => {
                let _ = thread.join();
                anyhow::bail!("runtime thread exited during startup");
            }
        }

        info!("background runtime ready");
        Ok(Self {
            handle: RuntimeHandle { jobs, interrupt },
            thread: Some(thread),
            done,
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Interrupt in-flight work, clean up the session, stop the loop and join
    /// the thread, all within `timeout`. Past the deadline the thread is
    /// abandoned. Idempotent.
    pub fn shutdown(&mut self, timeout: Duration) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let deadline = Instant::now() + timeout;

        self.handle.interrupt();
        match self.handle.request_timeout(Job::Cleanup, timeout) {
            Ok(()) => {}
            Err(RuntimeError::TimedOut(_)) => warn!("session cleanup did not finish in time"),
            Err(e) => debug!(error = %e, "session cleanup skipped"),
        }
        let _ = self.handle.jobs.send(Job::Stop);

        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.done.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => {
                warn!("runtime thread did not stop in time, abandoning it");
            }
            _ => {
                if thread.join().is_err() {
                    error!("runtime thread panicked");
                }
                info!("background runtime stopped");
            }
        }
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

/// The worker loop: one job at a time, in arrival order.
async fn run_jobs(
    mut session: Option<Session>,
    mut jobs: async_mpsc::UnboundedReceiver<Job>,
    interrupt: Arc<watch::Sender<bool>>,
) {
    let mut interrupted = interrupt.subscribe();

    while let Some(job) = jobs.recv().await {
        match job {
            Job::Invoke {
                text,
                reply,
                mut cancel,
            } => {
                let result = if *interrupted.borrow() {
                    Err(RuntimeError::Interrupted)
                } else if !matches!(cancel.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                    debug!("skipping invocation cancelled while queued");
                    Err(RuntimeError::Cancelled)
                } else {
                    match session.as_mut() {
                        None => Ok(NOT_READY.to_string()),
                        Some(s) => tokio::select! {
                            biased;
                            _ = &mut cancel => {
                                warn!("invocation cancelled by caller");
                                Err(RuntimeError::Cancelled)
                            }
                            _ = interrupted.wait_for(|stop| *stop) => {
                                warn!("invocation interrupted");
                                Err(RuntimeError::Interrupted)
                            }
                            r = s.invoke(&text) => r.map_err(RuntimeError::Agent),
                        },
                    }
                };
                if let Err(e) = &result {
                    debug!(error = %e, "invocation failed");
                }
                let _ = reply.send(result);
            }
            Job::Reset(reply) => {
                if let Some(s) = session.as_mut() {
                    s.reset();
                }
                let _ = reply.send(());
            }
            Job::Transcript(reply) => {
                let turns = session.as_ref().map(|s| s.transcript().to_vec());
                let _ = reply.send(turns.unwrap_or_default());
            }
            Job::ToolNames(reply) => {
                let names = session.as_ref().map(|s| s.tool_names().to_vec());
                let _ = reply.send(names.unwrap_or_default());
            }
            Job::Cleanup(reply) => {
                close_session(&mut session).await;
                let _ = reply.send(());
            }
            Job::Stop => break,
        }
    }

    close_session(&mut session).await;
}

async fn close_session(session: &mut Option<Session>) {
    if let Some(mut s) = session.take() {
        if let Err(e) = s.close().await {
            warn!(error = %e, "session cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use toolchat_core::types::Message;

    /// Echoes the input after an optional delay and logs what it handled.
    struct Echo {
        log: Arc<Mutex<Vec<String>>>,
        delay: Duration,
    }

    #[async_trait]
    impl Agent for Echo {
        async fn invoke(&self, history: &[Message], input: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(input.to_string());
            if input == "fail" {
                anyhow::bail!("model unavailable");
            }
            Ok(format!("echo:{input} after {}", history.len()))
        }
    }

    fn start(delay: Duration) -> (AgentRuntime, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let agent = Echo {
            log: log.clone(),
            delay,
        };
        let runtime = AgentRuntime::start(move || async move {
            Ok::<_, anyhow::Error>(Session::new(Box::new(agent), vec!["get_current_date".into()]))
        })
        .unwrap();
        (runtime, log)
    }

    #[test]
    fn test_invoke_records_transcript() {
        let (runtime, _) = start(Duration::ZERO);
        let handle = runtime.handle();

        assert_eq!(handle.invoke("a").unwrap(), "echo:a after 0");
        assert_eq!(handle.invoke("c").unwrap(), "echo:c after 2");
        assert_eq!(
            handle.transcript().unwrap(),
            vec![
                Turn::user("a"),
                Turn::assistant("echo:a after 0"),
                Turn::user("c"),
                Turn::assistant("echo:c after 2"),
            ]
        );
        assert_eq!(handle.tool_names().unwrap(), vec!["get_current_date"]);
    }

    #[test]
    fn test_results_in_submission_order() {
        let (runtime, log) = start(Duration::from_millis(5));
        let handle = runtime.handle();

        let pending: Vec<PendingReply> = (0..8).map(|i| handle.submit(format!("m{i}"))).collect();
        let replies: Vec<String> = pending.into_iter().map(|p| p.wait().unwrap()).collect();

        let expected: Vec<String> = (0..8).map(|i| format!("m{i}")).collect();
        assert_eq!(*log.lock().unwrap(), expected);
        for (i, reply) in replies.iter().enumerate() {
            assert_eq!(reply, &format!("echo:m{i} after {}", i * 2));
        }
    }

    #[test]
    fn test_concurrent_callers_each_get_their_reply() {
        let (runtime, _) = start(Duration::from_millis(1));
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let handle = runtime.handle();
                std::thread::spawn(move || {
                    let reply = handle.invoke(format!("t{i}")).unwrap();
                    assert!(reply.starts_with(&format!("echo:t{i} ")));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(runtime.handle().transcript().unwrap().len(), 8);
    }

    #[test]
    fn test_reset_then_read_is_empty() {
        let (runtime, _) = start(Duration::ZERO);
        let handle = runtime.handle();
        handle.reset().unwrap();
        assert!(handle.transcript().unwrap().is_empty());
        handle.invoke("a").unwrap();
        handle.reset().unwrap();
        assert!(handle.transcript().unwrap().is_empty());
    }

    #[test]
    fn test_agent_error_is_reported() {
        let (runtime, _) = start(Duration::ZERO);
        let err = runtime.handle().invoke("fail").unwrap_err();
        assert!(matches!(err, RuntimeError::Agent(_)));
        assert!(runtime.handle().transcript().unwrap().is_empty());
    }

    #[test]
    fn test_not_ready_after_cleanup_and_cleanup_twice() {
        let (runtime, _) = start(Duration::ZERO);
        let handle = runtime.handle();
        handle.cleanup().unwrap();
        handle.cleanup().unwrap();
        assert_eq!(handle.invoke("hello").unwrap(), NOT_READY);
        assert!(handle.tool_names().unwrap().is_empty());
    }

    #[test]
    fn test_timeout_cancels_in_flight_invocation() {
        let (runtime, log) = start(Duration::from_secs(10));
        let handle = runtime.handle();

        let started = Instant::now();
        let err = handle
            .invoke_timeout("slow", Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TimedOut(_)));

        // The cancelled invocation frees the runtime for the next job.
        assert!(handle.transcript().unwrap().is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_queued_invocation_cancelled_by_timeout_never_runs() {
        let (runtime, log) = start(Duration::from_millis(300));
        let handle = runtime.handle();

        let first = handle.submit("first");
        let err = handle
            .invoke_timeout("second", Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TimedOut(_)));

        assert!(first.wait().unwrap().starts_with("echo:first"));
        let turns = handle.transcript().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("first"));
        assert_eq!(*log.lock().unwrap(), vec!["first".to_string()]);
    }

    #[test]
    fn test_timed_out_reply_matches_transcript() {
        let (runtime, _log) = start(Duration::from_millis(30));
        let handle = runtime.handle();

        let mut expected = 0;
        for (i, ms) in [10u64, 25, 30, 35, 40, 60, 30, 28, 32].into_iter().enumerate() {
            let text = format!("msg{i}");
            match handle.invoke_timeout(text.as_str(), Duration::from_millis(ms)) {
                Ok(reply) => {
                    assert!(reply.starts_with(&format!("echo:{text}")));
                    expected += 2;
                }
                Err(RuntimeError::TimedOut(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
            assert_eq!(handle.transcript().unwrap().len(), expected, "after {text}");
        }
    }

    #[test]
    fn test_interrupt_aborts_in_flight_invocation() {
        let (runtime, _) = start(Duration::from_secs(10));
        let handle = runtime.handle();
        let pending = handle.submit("slow");
        std::thread::sleep(Duration::from_millis(20));
        handle.interrupt();
        assert!(matches!(pending.wait(), Err(RuntimeError::Interrupted)));
        assert!(matches!(handle.invoke("again"), Err(RuntimeError::Interrupted)));
    }

    #[test]
    fn test_shutdown_is_bounded_and_idempotent() {
        let (mut runtime, _) = start(Duration::from_secs(30));
        let handle = runtime.handle();
        let pending = handle.submit("slow");

        let started = Instant::now();
        runtime.shutdown(Duration::from_secs(2));
        runtime.shutdown(Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));

        assert!(pending.wait().is_err());
        assert!(matches!(handle.invoke("late"), Err(RuntimeError::Stopped)));
        assert!(matches!(handle.reset(), Err(RuntimeError::Stopped)));
    }

    #[test]
    fn test_startup_failure_is_returned() {
        let result = AgentRuntime::start(|| async {
            Err::<Session, _>(anyhow::anyhow!("tool server missing"))
        });
        let err = result.err().unwrap();
        assert!(format!("{err:#}").contains("tool server missing"));
    }
}
