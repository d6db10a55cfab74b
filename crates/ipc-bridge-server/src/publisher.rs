//! Event Publisher: process-wide MPSC-shaped sink with back-pressure drop
//! policy and progress-event coalescing, pumped out to the broadcast set.

use std::{
    collections::VecDeque,
    sync::Mutex,
};

use ipc_bridge_core::Environment;
use ipc_bridge_proto::Envelope;

use crate::registry::ConnectionRegistry;

/// Soft queue-length limit; droppable events are discarded once exceeded.
pub const EVENT_QUEUE_SOFT_MAX: usize = 5000;
/// Pump pacing between drains.
pub const PUMP_INTERVAL_MS: u64 = 10;

/// Sink accepting event records from any thread.
#[derive(Default)]
pub struct EventPublisher {
    queue: Mutex<VecDeque<ipc_bridge_proto::Event>>,
}

impl EventPublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `event`, applying the back-pressure drop policy: above the
    /// soft max, droppable events are discarded; progress events coalesce by
    /// `operation_id`, newer replacing older, regardless of queue length.
    #[allow(clippy::expect_used)]
    pub fn publish(&self, event: ipc_bridge_proto::Event) {
        let mut queue = self.queue.lock().expect("invariant: publisher lock is never held across a panic");

        if let Some(key) = event.kind.coalesce_key()
            && let Some(existing) = queue.iter_mut().find(|queued| queued.kind.coalesce_key() == Some(key))
        {
            *existing = event;
            return;
        }

        if queue.len() >= EVENT_QUEUE_SOFT_MAX && event.kind.droppable() {
            return;
        }

        queue.push_back(event);
    }

    #[allow(clippy::expect_used)]
    fn drain(&self) -> Vec<ipc_bridge_proto::Event> {
        self.queue.lock().expect("invariant: publisher lock is never held across a panic").drain(..).collect()
    }

    /// Length of the pending queue, for tests and diagnostics.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().expect("invariant: publisher lock is never held across a panic").len()
    }

    /// Run the pump loop: drain and broadcast at `PUMP_INTERVAL_MS` pacing,
    /// forever. Intended to be spawned as a background task.
    pub async fn pump<E: Environment>(&self, env: &E, registry: &ConnectionRegistry) {
        loop {
            env.sleep(std::time::Duration::from_millis(PUMP_INTERVAL_MS)).await;
            for event in self.drain() {
                let Ok(bytes) = Envelope::Event(event).encode() else { continue };
                let mut framed = bytes::BytesMut::new();
                if ipc_bridge_proto::frame::encode(&bytes, &mut framed).is_err() {
                    continue;
                }
                registry.broadcast(framed.to_vec()).await;
            }
        }
    }
}
