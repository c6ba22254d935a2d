//! Background computation of collapse-mode pages.
//!
//! The task works on an immutable snapshot of the view and streams pages back
//! in batches. Each task carries the generation id it was started under; any
//! change to the view or to collapse mode bumps the shared generation, and
//! the task stops at its next checkpoint once its id is stale. The owner also
//! drops batches whose generation is no longer current, so a superseded task
//! can never write into the page table.

use super::{PagePlanner, PageRange};
use crate::collapse::CollapseEngine;
use crate::record::SharedRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Monotonic counter shared between the owner and its page tasks.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    current: Arc<AtomicU64>,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Invalidate every outstanding ticket and return the new id.
    pub fn bump(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn ticket(&self) -> GenerationTicket {
        GenerationTicket {
            id: self.current(),
            current: Arc::clone(&self.current),
        }
    }
}

/// The generation a task was started under.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    id: u64,
    current: Arc<AtomicU64>,
}

impl GenerationTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTaskConfig {
    /// Pages computed between checkpoints.
    pub batch_size: usize,
    /// Pause after each batch.
    pub batch_delay: Duration,
}

impl Default for PageTaskConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Batch {
        generation: u64,
        pages: Vec<(usize, PageRange)>,
        /// Percentage of the view covered so far, below 100 until complete.
        progress: u8,
    },
    Complete {
        generation: u64,
        total_pages: usize,
    },
    Error(String),
}

/// Handle to a running page computation.
pub struct PageCalculation {
    generation: u64,
    receiver: Receiver<PageEvent>,
    finished: bool,
}

impl PageCalculation {
    /// Compute pages `first_page ..` starting at view index `start`.
    pub fn spawn(
        view: Arc<[SharedRecord]>,
        planner: PagePlanner,
        engine: CollapseEngine,
        first_page: usize,
        start: usize,
        ticket: GenerationTicket,
        config: PageTaskConfig,
    ) -> Self {
        let (tx, rx) = channel();
        let generation = ticket.id();

        thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run(&view, planner, engine, first_page, start, &ticket, config, &tx)
            }));
            if result.is_err() {
                let _ = tx.send(PageEvent::Error("Page calculation thread panicked".to_string()));
            }
        });

        Self {
            generation,
            receiver: rx,
            finished: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn try_next(&mut self) -> Option<PageEvent> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(event) => {
                if !matches!(event, PageEvent::Batch { .. }) {
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

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    view: &[SharedRecord],
    planner: PagePlanner,
    engine: CollapseEngine,
    first_page: usize,
    start: usize,
    ticket: &GenerationTicket,
    config: PageTaskConfig,
    tx: &Sender<PageEvent>,
) {
    let len = view.len();
    let batch_size = config.batch_size.max(1);
    let mut page = first_page.max(1);
    let mut start = start.min(len);

    loop {
        let mut pages = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            if !ticket.is_current() {
                log::debug!("page calculation {} superseded at page {}", ticket.id(), page);
                return;
            }
            if start >= len && !(page == 1 && len == 0) {
                break;
            }
            let range = planner.plan_from(start, view, Some(&engine));
            pages.push((page, range));
            start = range.end;
            page += 1;
            if start >= len {
                break;
            }
        }

        if !pages.is_empty() {
            let progress = if len == 0 {
                99
            } else {
                ((start * 100) / len).min(99) as u8
            };
            let event = PageEvent::Batch {
                generation: ticket.id(),
                pages,
                progress,
            };
            if tx.send(event).is_err() {
                return;
            }
        }

        if !ticket.is_current() {
            log::debug!("page calculation {} superseded", ticket.id());
            return;
        }
        if start >= len {
            break;
        }
        thread::sleep(config.batch_delay);
    }

    log::debug!(
        "page calculation {} finished with {} pages",
        ticket.id(),
        page - 1
    );
    let _ = tx.send(PageEvent::Complete {
        generation: ticket.id(),
        total_pages: page - 1,
    });
}
