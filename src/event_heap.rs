/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A priority queue of staker events.
//!
//! One queue flavor orders by start time (the pending set: who joins next) and
//! the other by end time (the current set: who leaves next). Ties are broken by
//! transaction id byte order so every node pops events identically. The backing
//! vec is kept fully ordered rather than heap-ordered: queues are small, and a
//! canonical element order makes the serialized form deterministic across nodes.

use crate::codec::{Reader, Writer};
use crate::error::CodecError;
use crate::params::MAX_TIME;
use crate::txs::TimedTx;
use crate::types::{Id, UnixTime};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventHeap {
    sort_by_start_time: bool,
    txs: Vec<TimedTx>,
}

impl EventHeap {
    /// `sort_by_start_time` selects the comparison key: start time for pending
    /// queues, end time for current queues.
    pub fn new(sort_by_start_time: bool) -> Self {
        Self {
            sort_by_start_time,
            txs: Vec::new(),
        }
    }

    fn key(&self, tx: &TimedTx) -> (UnixTime, Id) {
        let time = if self.sort_by_start_time {
            tx.start_time()
        } else {
            tx.end_time()
        };
        (time, tx.id())
    }

    pub fn push(&mut self, tx: TimedTx) {
        let key = self.key(&tx);
        let at = self
            .txs
            .partition_point(|existing| self.key(existing) <= key);
        self.txs.insert(at, tx);
    }

    /// The event with the earliest key.
    pub fn peek(&self) -> Option<&TimedTx> {
        self.txs.first()
    }

    pub fn pop(&mut self) -> Option<TimedTx> {
        if self.txs.is_empty() {
            None
        } else {
            Some(self.txs.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// The key of the top event, or [MAX_TIME] if the queue is empty.
    pub fn timestamp(&self) -> UnixTime {
        self.peek().map(|tx| self.key(tx).0).unwrap_or(MAX_TIME)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedTx> {
        self.txs.iter()
    }

    pub fn write(&self, w: &mut Writer) {
        w.put_bool(self.sort_by_start_time);
        w.put_u32(self.txs.len() as u32);
        for tx in &self.txs {
            tx.write(w);
        }
    }

    pub fn read(r: &mut Reader) -> Result<Self, CodecError> {
        let sort_by_start_time = r.get_bool()?;
        let n = r.get_u32()? as usize;
        let mut heap = EventHeap::new(sort_by_start_time);
        for _ in 0..n {
            heap.push(TimedTx::read(r)?);
        }
        Ok(heap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EMPTY_SIGNATURE;
    use crate::params::{MINIMUM_STAKE_AMOUNT, MINIMUM_STAKING_DURATION};
    use crate::txs::AddDefaultSubnetValidatorTx;
    use crate::types::ShortId;

    fn staker(tag: u8, start: UnixTime, end: UnixTime) -> TimedTx {
        TimedTx::Validator(AddDefaultSubnetValidatorTx {
            node_id: ShortId::new([tag; 20]),
            weight: MINIMUM_STAKE_AMOUNT,
            start_time: start,
            end_time: end,
            network_id: 12345,
            nonce: 1,
            destination: ShortId::new([tag; 20]),
            shares: 0,
            sig: EMPTY_SIGNATURE,
        })
    }

    #[test]
    fn orders_by_start_time_when_pending() {
        let mut heap = EventHeap::new(true);
        heap.push(staker(1, 300, 300 + MINIMUM_STAKING_DURATION));
        heap.push(staker(2, 100, 100 + MINIMUM_STAKING_DURATION));
        heap.push(staker(3, 200, 200 + MINIMUM_STAKING_DURATION));

        assert_eq!(heap.timestamp(), 100);
        assert_eq!(heap.pop().unwrap().start_time(), 100);
        assert_eq!(heap.pop().unwrap().start_time(), 200);
        assert_eq!(heap.pop().unwrap().start_time(), 300);
        assert!(heap.pop().is_none());
    }

    #[test]
    fn orders_by_end_time_when_current() {
        let mut heap = EventHeap::new(false);
        heap.push(staker(1, 0, 500 + MINIMUM_STAKING_DURATION));
        heap.push(staker(2, 0, MINIMUM_STAKING_DURATION));

        assert_eq!(heap.timestamp(), MINIMUM_STAKING_DURATION);
        assert_eq!(heap.pop().unwrap().end_time(), MINIMUM_STAKING_DURATION);
    }

    #[test]
    fn ties_break_by_tx_id() {
        let a = staker(1, 100, 100 + MINIMUM_STAKING_DURATION);
        let b = staker(2, 100, 100 + MINIMUM_STAKING_DURATION);
        let first = if a.id() < b.id() { a.clone() } else { b.clone() };

        let mut forward = EventHeap::new(true);
        forward.push(a.clone());
        forward.push(b.clone());
        let mut reverse = EventHeap::new(true);
        reverse.push(b);
        reverse.push(a);

        assert_eq!(forward.pop().unwrap(), first);
        assert_eq!(reverse.pop().unwrap(), first);
    }

    #[test]
    fn empty_heap_reports_the_infinity_sentinel() {
        let heap = EventHeap::new(true);
        assert_eq!(heap.timestamp(), MAX_TIME);
    }

    #[test]
    fn wire_round_trip_preserves_order_and_flavor() {
        let mut heap = EventHeap::new(false);
        heap.push(staker(4, 0, 900 + MINIMUM_STAKING_DURATION));
        heap.push(staker(5, 0, MINIMUM_STAKING_DURATION));

        let mut w = Writer::new();
        heap.write(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let parsed = EventHeap::read(&mut r).unwrap();
        r.finish().unwrap();
        assert_eq!(parsed, heap);
    }
}
