//! Acknowledgement batching and duplicate suppression.

use std::collections::{HashSet, VecDeque};

use tgcore_tl::{Serializable, enums, types};

/// Server msg_ids waiting to be acknowledged.
///
/// Each id is queued once; the batch is flushed when it reaches
/// [`AckQueue::THRESHOLD`] or piggy-backs on the next outgoing request.
#[derive(Debug, Default)]
pub struct AckQueue {
    ids: Vec<i64>,
}

impl AckQueue {
    pub const THRESHOLD: usize = 8;

    pub fn push(&mut self, msg_id: i64) {
        if !self.ids.contains(&msg_id) {
            self.ids.push(msg_id);
        }
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn should_flush(&self) -> bool {
        self.ids.len() >= Self::THRESHOLD
    }

    /// Drain the queue into an encoded `msgs_ack`, or `None` when empty.
    pub fn take_body(&mut self) -> Option<Vec<u8>> {
        if self.ids.is_empty() {
            return None;
        }
        let msg_ids = std::mem::take(&mut self.ids);
        Some(enums::MsgsAck::MsgsAck(types::MsgsAck { msg_ids }).to_bytes())
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// The most recent server msg_ids, to drop replays of the same message.
#[derive(Debug)]
pub struct SeenMsgIds {
    order: VecDeque<i64>,
    set: HashSet<i64>,
    capacity: usize,
}

impl SeenMsgIds {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn with_capacity(capacity: usize) -> Self {
        Self { order: VecDeque::with_capacity(capacity), set: HashSet::with_capacity(capacity), capacity }
    }

    /// Record `msg_id`; returns `false` if it was already seen.
    pub fn insert(&mut self, msg_id: i64) -> bool {
        if !self.set.insert(msg_id) {
            return false;
        }
        self.order.push_back(msg_id);
        if self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.set.clear();
    }
}

impl Default for SeenMsgIds {
    fn default() -> Self { Self::with_capacity(Self::DEFAULT_CAPACITY) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgcore_tl::Deserializable;

    #[test]
    fn batch_holds_each_id_once() {
        let mut q = AckQueue::default();
        for id in [1, 3, 5, 3, 7, 1] {
            q.push(id);
        }
        assert_eq!(q.len(), 4);
        assert!(!q.should_flush());

        let body = q.take_body().unwrap();
        let enums::MsgsAck::MsgsAck(ack) = enums::MsgsAck::from_bytes(&body).unwrap();
        assert_eq!(ack.msg_ids, [1, 3, 5, 7]);
        assert!(q.is_empty());
        assert!(q.take_body().is_none());
    }

    #[test]
    fn threshold_triggers_flush() {
        let mut q = AckQueue::default();
        for id in 0..AckQueue::THRESHOLD as i64 {
            q.push(id * 4 + 1);
        }
        assert!(q.should_flush());
    }

    #[test]
    fn seen_ids_forget_oldest() {
        let mut seen = SeenMsgIds::with_capacity(3);
        assert!(seen.insert(1));
        assert!(!seen.insert(1));
        assert!(seen.insert(2));
        assert!(seen.insert(3));
        assert!(seen.insert(4));
        // 1 fell out of the window.
        assert!(seen.insert(1));
        assert!(!seen.insert(4));
    }
}
