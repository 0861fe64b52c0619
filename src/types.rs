/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines common data structures to be used inside this library, or from outside application.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Number of bytes in a full-length identifier (chains, subnets, blocks, transactions, VMs).
pub const ID_LEN: usize = 32;

/// Number of bytes in a short identifier (accounts, staker nodes).
pub const SHORT_ID_LEN: usize = 20;

/// Seconds since the Unix epoch. Chain time and staker windows are second-granular.
pub type UnixTime = u64;

/// A 32-byte identifier. Transaction and block ids are the SHA-256 of their
/// marshaled bytes; VM ids are ASCII names zero-padded on the right.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; ID_LEN]);

impl Id {
    /// The all-zero id. Identifies the default subnet and the platform chain itself.
    pub const EMPTY: Id = Id([0u8; ID_LEN]);

    pub const fn new(bytes: [u8; ID_LEN]) -> Self {
        Id(bytes)
    }

    /// The id of a serialized value: SHA-256 over its bytes.
    pub fn hash_of(bytes: &[u8]) -> Self {
        Id(Sha256::digest(bytes).into())
    }

    /// Builds an id from an ASCII tag, right-padded with zeros. Tags longer than
    /// [ID_LEN] are truncated.
    pub fn from_ascii(tag: &str) -> Self {
        let mut bytes = [0u8; ID_LEN];
        let src = tag.as_bytes();
        let n = src.len().min(ID_LEN);
        bytes[..n].copy_from_slice(&src[..n]);
        Id(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

/// A 20-byte identifier for accounts and staker nodes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId([u8; SHORT_ID_LEN]);

impl ShortId {
    pub const EMPTY: ShortId = ShortId([0u8; SHORT_ID_LEN]);

    pub const fn new(bytes: [u8; SHORT_ID_LEN]) -> Self {
        ShortId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortId({})", self)
    }
}

/// Message sent to the consensus engine over the channel handed to
/// [initialize](crate::vm::PlatformVm::initialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// The scheduler decided a block is ready; the engine should call `build_block`.
    PendingTxs,
}

/// Wall-clock source. Reads the system clock unless a fixed time has been set,
/// which tests use to step through staker windows deterministically.
#[derive(Clone, Default)]
pub struct Clock {
    faked: Arc<Mutex<Option<UnixTime>>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(&self) -> UnixTime {
        if let Some(t) = *self.faked.lock() {
            return t;
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Pins the clock to a fixed time. All subsequent reads return `time`.
    pub fn set_time(&self, time: UnixTime) {
        *self.faked.lock() = Some(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_ids_are_zero_padded() {
        let id = Id::from_ascii("avm");
        assert_eq!(&id.as_bytes()[..3], b"avm");
        assert!(id.as_bytes()[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn hash_ids_are_stable() {
        assert_eq!(Id::hash_of(b"abc"), Id::hash_of(b"abc"));
        assert_ne!(Id::hash_of(b"abc"), Id::hash_of(b"abd"));
    }

    #[test]
    fn faked_clock_overrides_wall_time() {
        let clock = Clock::new();
        clock.set_time(12345);
        assert_eq!(clock.time(), 12345);
    }
}
