//! Fixed-period background tasks with explicit teardown.

use std::ops::ControlFlow;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to a task started by [`spawn_interval`].
///
/// Cancelling (or dropping) the handle stops the task and joins its thread.
pub struct IntervalHandle {
    name: String,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    done_rx: crossbeam_channel::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

/// Run `task` every `period` on a dedicated thread, starting one period
/// from now.
///
/// Ticks that come due while `task` is still running are dropped, so a
/// slow task delays the schedule instead of queueing a backlog. The task
/// stops itself by returning `ControlFlow::Break`.
pub fn spawn_interval<F>(name: &str, period: Duration, mut task: F) -> std::io::Result<IntervalHandle>
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

    let handle = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // Disconnects `done_rx` when the thread exits, however it exits.
            let _done = done_tx;
            let ticker = crossbeam_channel::tick(period);
            loop {
                crossbeam_channel::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if task().is_break() {
                            break;
                        }
                    }
                }
            }
        })?;

    log::debug!("Started interval '{name}' every {period:?}");

    Ok(IntervalHandle {
        name: name.to_string(),
        stop_tx: Some(stop_tx),
        done_rx,
        handle: Some(handle),
    })
}

impl IntervalHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the task thread has exited.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.done_rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// Block until the task ends on its own or `limit` elapses.
    /// Returns true if the task ended.
    pub fn wait(&self, limit: Duration) -> bool {
        matches!(
            self.done_rx.recv_timeout(limit),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        )
    }

    /// Stop the task and join its thread. Idempotent.
    pub fn cancel(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Interval '{}' panicked", self.name);
            } else {
                log::debug!("Stopped interval '{}'", self.name);
            }
        }
    }
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
