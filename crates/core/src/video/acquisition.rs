//! Asynchronous stream acquisition.
//!
//! Opening a camera can block for seconds (device permissions, USB
//! negotiation), so `acquire` moves the open onto a capture thread and hands
//! back a [`PendingStream`]. Once the first frame has been decoded the same
//! thread keeps decoding into a latest-frame slot owned by a [`LiveStream`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::video_source::VideoSource;

/// Consecutive decode errors tolerated before the capture thread gives up.
const MAX_CONSECUTIVE_ERRORS: usize = 30;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("could not open {label}: {reason}")]
    Open { label: String, reason: String },
    #[error("{label} ended before delivering a frame")]
    NoFrames { label: String },
    #[error("no stream after {0:?}")]
    TimedOut(Duration),
    #[error("capture thread for {0} panicked")]
    Panicked(String),
}

type FrameSlot = Arc<Mutex<Option<Frame>>>;

/// Start opening `source` in the background.
pub fn acquire(mut source: Box<dyn VideoSource>, timeout: Duration) -> PendingStream {
    let label = source.label();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
    let slot: FrameSlot = Arc::new(Mutex::new(None));
    let cancelled = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let handle = {
        let slot = slot.clone();
        let cancelled = cancelled.clone();
        let finished = finished.clone();
        std::thread::spawn(move || {
            capture(&mut *source, &slot, &cancelled, &ready_tx);
            source.close();
            finished.store(true, Ordering::Release);
        })
    };

    PendingStream {
        label,
        timeout,
        ready_rx,
        stream: LiveStream {
            metadata: None,
            slot,
            cancelled,
            finished,
            handle: Some(handle),
        },
    }
}

fn capture(
    source: &mut dyn VideoSource,
    slot: &FrameSlot,
    cancelled: &AtomicBool,
    ready_tx: &crossbeam_channel::Sender<Result<StreamMetadata, AcquisitionError>>,
) {
    let label = source.label();
    let metadata = match source.open() {
        Ok(metadata) => metadata,
        Err(e) => {
            let _ = ready_tx.send(Err(AcquisitionError::Open {
                label,
                reason: e.to_string(),
            }));
            return;
        }
    };
    let pacing = source.pacing();

    let mut ready = Some(metadata);
    let mut consecutive_errors = 0;
    let mut frames = source.frames();

    while !cancelled.load(Ordering::Relaxed) {
        let started = Instant::now();
        match frames.next() {
            None => break,
            Some(Err(e)) => {
                consecutive_errors += 1;
                log::warn!("{label}: frame decode failed: {e}");
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    log::error!("{label}: giving up after {consecutive_errors} decode errors");
                    break;
                }
                continue;
            }
            Some(Ok(frame)) => {
                consecutive_errors = 0;
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
            }
        }

        if let Some(metadata) = ready.take() {
            if ready_tx.send(Ok(metadata)).is_err() {
                // Nobody is waiting any more.
                return;
            }
        }

        if let Some(interval) = pacing {
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    if ready.is_some() {
        let _ = ready_tx.send(Err(AcquisitionError::NoFrames { label }));
    }
}

/// A stream that is still being opened.
pub struct PendingStream {
    label: String,
    timeout: Duration,
    ready_rx: crossbeam_channel::Receiver<Result<StreamMetadata, AcquisitionError>>,
    stream: LiveStream,
}

impl PendingStream {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Block until the first frame arrives, the open fails, or the timeout
    /// elapses. On timeout the capture thread is told to stop and detached.
    pub fn wait(self) -> Result<LiveStream, AcquisitionError> {
        let PendingStream {
            label,
            timeout,
            ready_rx,
            mut stream,
        } = self;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(metadata)) => {
                log::info!(
                    "Stream {label} ready: {}x{} @ {:.1} fps",
                    metadata.width,
                    metadata.height,
                    metadata.fps
                );
                stream.metadata = Some(metadata);
                Ok(stream)
            }
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // The open may be stuck in a driver call; don't join it.
                stream.cancelled.store(true, Ordering::Relaxed);
                stream.handle = None;
                Err(AcquisitionError::TimedOut(timeout))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                let _ = stream.handle.take().map(JoinHandle::join);
                Err(AcquisitionError::Panicked(label))
            }
        }
    }
}

/// A running capture: the most recent decoded frame is always available.
pub struct LiveStream {
    metadata: Option<StreamMetadata>,
    slot: FrameSlot,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LiveStream {
    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.as_ref()
    }

    /// Copy of the newest frame, or `None` before the first one.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True once the source is exhausted or the capture thread has exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Stop capturing and release the device. Idempotent.
    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.stop();
    }
}
