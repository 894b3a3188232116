//! One-shot timers that fire mouth cues relative to playback start.

use crate::error::{Result, TalkboxError};
use crate::mouth::event::{MouthEvent, MouthKind};
use crate::mouth::renderer::MouthRenderer;
use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A batch of events sharing one time origin.
struct Batch {
    origin: Instant,
    events: Vec<MouthEvent>,
}

/// A single armed timer.
#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    /// Arming order, breaks ties between equal deadlines.
    seq: u64,
    kind: MouthKind,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Fires each scheduled mouth event `position_ms` after it was scheduled.
///
/// Every event gets its own deadline; nothing chains one timer to the next.
/// Timers live on a dedicated thread so scheduling never blocks the caller,
/// and events are copied in so a later session reset cannot affect them.
pub struct MouthScheduler {
    tx: Option<Sender<Batch>>,
    handle: Option<JoinHandle<()>>,
}

impl MouthScheduler {
    /// Start the timer thread, delivering fired cues to `renderer`.
    pub fn spawn(renderer: Arc<dyn MouthRenderer>) -> Result<Self> {
        let (tx, rx) = unbounded::<Batch>();

        let handle = thread::Builder::new()
            .name("talkbox-mouth".to_string())
            .spawn(move || {
                let mut timers: BinaryHeap<Reverse<Timer>> = BinaryHeap::new();
                let mut seq: u64 = 0;
                let mut disconnected = false;

                loop {
                    fire_due(&mut timers, renderer.as_ref());

                    let next_deadline = timers.peek().map(|Reverse(timer)| timer.deadline);

                    if disconnected {
                        // Let already-armed timers run out, then stop.
                        match next_deadline {
                            Some(deadline) => {
                                thread::sleep(deadline.saturating_duration_since(Instant::now()));
                                continue;
                            }
                            None => break,
                        }
                    }

                    let batch = match next_deadline {
                        Some(deadline) => match rx.recv_deadline(deadline) {
                            Ok(batch) => batch,
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => {
                                disconnected = true;
                                continue;
                            }
                        },
                        None => match rx.recv() {
                            Ok(batch) => batch,
                            Err(_) => break,
                        },
                    };

                    for event in batch.events {
                        timers.push(Reverse(Timer {
                            deadline: batch.origin + Duration::from_millis(event.position_ms),
                            seq,
                            kind: event.kind,
                        }));
                        seq += 1;
                    }
                }
            })
            .map_err(|e| TalkboxError::Other(format!("Failed to spawn mouth scheduler: {e}")))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Arm one timer per event, measured from now. Returns immediately.
    pub fn schedule(&self, events: &[MouthEvent]) {
        self.schedule_from(Instant::now(), events);
    }

    /// Arm timers measured from an explicit origin.
    pub fn schedule_from(&self, origin: Instant, events: &[MouthEvent]) {
        if events.is_empty() {
            return;
        }
        let batch = Batch {
            origin,
            events: events.to_vec(),
        };
        let sent = self.tx.as_ref().map(|tx| tx.send(batch).is_ok());
        if sent != Some(true) {
            tracing::warn!(
                events = events.len(),
                "mouth scheduler stopped, dropping events"
            );
        }
    }
}

impl Drop for MouthScheduler {
    fn drop(&mut self) {
        // Closing the channel lets pending timers fire, then the thread exits.
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("mouth scheduler thread panicked");
        }
    }
}

fn fire_due(timers: &mut BinaryHeap<Reverse<Timer>>, renderer: &dyn MouthRenderer) {
    let now = Instant::now();
    while let Some(Reverse(timer)) = timers.peek() {
        if timer.deadline > now {
            break;
        }
        let kind = timer.kind;
        timers.pop();
        renderer.render(kind);
    }
}
