//! Connection bindings
//!
//! Each connected client is bound to one `(match, slot)` pair and owns the
//! receiving half of a bounded frame queue. The match loop pushes frames in
//! through [`FrameSink`] without ever waiting on a slow socket.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::game::constants::net::{BROADCAST_FRAME_BYTES, OUTBOUND_QUEUE};
use crate::game::engine::FrameSink;
use crate::game::state::{MatchId, PlayerSlot};
use crate::net::protocol::BroadcastFrame;

pub type FrameBytes = [u8; BROADCAST_FRAME_BYTES];

/// Identifies one registration. A later bind to the same seat supersedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub match_id: MatchId,
    pub slot: PlayerSlot,
    generation: u64,
}

struct Outbound {
    generation: u64,
    frames: mpsc::Sender<FrameBytes>,
}

/// Live connection bindings, keyed by seat
pub struct SessionRegistry {
    bindings: RwLock<HashMap<(MatchId, PlayerSlot), Outbound>>,
    next_generation: AtomicU64,
    queue_len: usize,
}

impl SessionRegistry {
    pub fn new(queue_len: usize) -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            queue_len: queue_len.max(1),
        }
    }

    /// Bind a connection to a seat and hand back its frame queue
    pub fn register(
        &self,
        match_id: MatchId,
        slot: PlayerSlot,
    ) -> (Binding, mpsc::Receiver<FrameBytes>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_len);

        let previous = self.bindings.write().insert(
            (match_id, slot),
            Outbound {
                generation,
                frames: tx,
            },
        );
        if previous.is_some() {
            debug!(%match_id, "{} rebound, previous connection superseded", slot);
        }

        (
            Binding {
                match_id,
                slot,
                generation,
            },
            rx,
        )
    }

    /// Drop a binding, unless the seat has since been rebound
    pub fn unregister(&self, binding: &Binding) -> bool {
        let mut bindings = self.bindings.write();
        let key = (binding.match_id, binding.slot);
        if bindings
            .get(&key)
            .is_some_and(|o| o.generation == binding.generation)
        {
            bindings.remove(&key);
            return true;
        }
        false
    }

    pub fn is_bound(&self, match_id: MatchId, slot: PlayerSlot) -> bool {
        self.bindings.read().contains_key(&(match_id, slot))
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(OUTBOUND_QUEUE)
    }
}

impl FrameSink for SessionRegistry {
    fn send_frame(&self, match_id: MatchId, slot: PlayerSlot, frame: &BroadcastFrame) {
        let bindings = self.bindings.read();
        let Some(outbound) = bindings.get(&(match_id, slot)) else {
            return;
        };

        match outbound.frames.try_send(frame.encode()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(%match_id, "Frame queue full for {}, dropping", slot);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%match_id, "Frame queue closed for {}", slot);
            }
        }
    }
}
