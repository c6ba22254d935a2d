//! Background chunk loader.
//!
//! Reads the rest of the file in fixed-size chunks on a worker thread and
//! hands them to the owner through a channel, pausing between chunks so the
//! owner stays responsive. The owner applies chunks to its [`FileWindow`]
//! when it polls; the loader itself never touches shared state.
//!
//! [`FileWindow`]: super::FileWindow

use crate::error::Result;
use crate::filter::cancel::CancelToken;
use crate::reader::LineSource;
use crate::record::LogRecord;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub chunk_size: usize,
    pub delay: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5_000,
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub enum LoaderEvent {
    /// Records for 0-based lines `start .. start + records.len()`.
    Chunk {
        start: usize,
        records: Vec<LogRecord>,
    },
    /// Everything up to `loaded` has been sent.
    Complete { loaded: usize },
    Error(String),
}

pub struct BackgroundLoader {
    cancel: CancelToken,
    receiver: Receiver<LoaderEvent>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl BackgroundLoader {
    /// Start loading lines `from .. total` of `source`.
    pub fn spawn(
        source: Arc<dyn LineSource>,
        from: usize,
        total: usize,
        config: LoaderConfig,
    ) -> Self {
        let (tx, rx) = channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        log::debug!(
            "background load of lines {}..{} in chunks of {}",
            from,
            total,
            config.chunk_size
        );

        let handle = thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run(source.as_ref(), from, total, config, &worker_cancel, &tx)
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = tx.send(LoaderEvent::Error(e.to_string()));
                }
                Err(_) => {
                    let _ = tx.send(LoaderEvent::Error("Loader thread panicked".to_string()));
                }
            }
        });

        Self {
            cancel,
            receiver: rx,
            handle: Some(handle),
            finished: false,
        }
    }

    /// Next pending event, if any.
    pub fn try_next(&mut self) -> Option<LoaderEvent> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(event) => {
                if matches!(event, LoaderEvent::Complete { .. } | LoaderEvent::Error(_)) {
                    self.finished = true;
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Block up to `timeout` for the next event.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<LoaderEvent> {
        if self.finished {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => {
                if matches!(event, LoaderEvent::Complete { .. } | LoaderEvent::Error(_)) {
                    self.finished = true;
                }
                Some(event)
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// True once a terminal event has been taken or the worker is gone.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for BackgroundLoader {
    /// Cancels the worker without waiting for a read in progress.
    ///
    /// A worker caught inside `read_range` is detached; it stops at its next
    /// cancellation check and its sends go nowhere.
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::trace!("detaching background loader still reading");
            }
        }
    }
}

fn run(
    source: &dyn LineSource,
    from: usize,
    total: usize,
    config: LoaderConfig,
    cancel: &CancelToken,
    tx: &Sender<LoaderEvent>,
) -> Result<()> {
    let chunk_size = config.chunk_size.max(1);
    let mut next = from;

    while next < total {
        if cancel.is_cancelled() {
            log::debug!("background load cancelled at line {}", next);
            return Ok(());
        }

        let count = chunk_size.min(total - next);
        let records = source.read_range(next, count)?;
        if records.is_empty() {
            log::warn!("source ended at line {} before expected {}", next, total);
            break;
        }

        let read = records.len();
        if tx.send(LoaderEvent::Chunk { start: next, records }).is_err() {
            return Ok(());
        }
        next += read;

        if next < total && !cancel.sleep(config.delay) {
            log::debug!("background load cancelled at line {}", next);
            return Ok(());
        }
    }

    let _ = tx.send(LoaderEvent::Complete { loaded: next });
    Ok(())
}
