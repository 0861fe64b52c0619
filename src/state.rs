/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Typed get/put over a byte-level [Database].
//!
//! Persisted state lives under typed key prefixes: the chain timestamp, the
//! per-subnet current and pending validator queues, the chain and subnet lists,
//! accounts keyed by address, blocks keyed by id, and the `initialized` flag that
//! distinguishes a fresh database from one being reopened.

use crate::codec::{Reader, Writer};
use crate::database::Database;
use crate::error::{CodecError, StateError, TransitionError};
use crate::event_heap::EventHeap;
use crate::txs::{CreateChainTx, CreateSubnetTx};
use crate::types::{Id, ShortId, UnixTime};

const TIMESTAMP_KEY: &[u8] = b"time";
const CURRENT_VALIDATORS_PREFIX: &[u8] = b"current";
const PENDING_VALIDATORS_PREFIX: &[u8] = b"pending";
const CHAINS_KEY: &[u8] = b"chains";
const SUBNETS_KEY: &[u8] = b"subnets";
const ACCOUNT_PREFIX: &[u8] = b"account";
const BLOCK_PREFIX: &[u8] = b"block";
const LAST_ACCEPTED_KEY: &[u8] = b"lastAccepted";
const INITIALIZED_KEY: &[u8] = b"initialized";

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

/// An account: an address holding a balance, with a nonce that orders the
/// transactions it pays for. Accounts are never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Account {
    pub address: ShortId,
    pub nonce: u64,
    pub balance: u64,
}

impl Account {
    pub fn new(address: ShortId) -> Self {
        Self {
            address,
            nonce: 0,
            balance: 0,
        }
    }

    /// Spends `amount` with `nonce`, which must be the account's next nonce.
    pub fn remove(&self, amount: u64, nonce: u64) -> Result<Account, TransitionError> {
        let next_nonce = self.nonce.checked_add(1).ok_or(TransitionError::WrongNonce)?;
        if nonce != next_nonce {
            return Err(TransitionError::WrongNonce);
        }
        if self.balance < amount {
            return Err(TransitionError::InsufficientBalance);
        }
        Ok(Account {
            address: self.address,
            nonce: next_nonce,
            balance: self.balance - amount,
        })
    }

    /// Credits `amount`. Ceiling to MAX for safety; overflow cannot happen with
    /// real denominations.
    pub fn add(&self, amount: u64) -> Account {
        Account {
            address: self.address,
            nonce: self.nonce,
            balance: self.balance.saturating_add(amount),
        }
    }

    fn write(&self, w: &mut Writer) {
        w.put_fixed(self.address.as_bytes());
        w.put_u64(self.nonce);
        w.put_u64(self.balance);
    }

    pub(crate) fn read(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self {
            address: ShortId::new(r.get_fixed()?),
            nonce: r.get_u64()?,
            balance: r.get_u64()?,
        })
    }
}

pub fn get_timestamp(db: &dyn Database) -> Result<UnixTime, StateError> {
    match db.get(TIMESTAMP_KEY)? {
        Some(bytes) => {
            let mut r = Reader::new(&bytes);
            let t = r.get_u64()?;
            r.finish()?;
            Ok(t)
        }
        None => Ok(0),
    }
}

pub fn put_timestamp(db: &dyn Database, time: UnixTime) -> Result<(), StateError> {
    let mut w = Writer::new();
    w.put_u64(time);
    db.put(TIMESTAMP_KEY, w.into_bytes())?;
    Ok(())
}

fn get_validators(
    db: &dyn Database,
    prefix: &[u8],
    subnet_id: Id,
    sort_by_start_time: bool,
) -> Result<EventHeap, StateError> {
    match db.get(&prefixed(prefix, subnet_id.as_bytes()))? {
        Some(bytes) => {
            let mut r = Reader::new(&bytes);
            let heap = EventHeap::read(&mut r)?;
            r.finish()?;
            Ok(heap)
        }
        None => Ok(EventHeap::new(sort_by_start_time)),
    }
}

fn put_validators(
    db: &dyn Database,
    prefix: &[u8],
    subnet_id: Id,
    heap: &EventHeap,
) -> Result<(), StateError> {
    let mut w = Writer::new();
    heap.write(&mut w);
    db.put(&prefixed(prefix, subnet_id.as_bytes()), w.into_bytes())?;
    Ok(())
}

/// The subnet's current validator set, ordered by end time.
pub fn get_current_validators(db: &dyn Database, subnet_id: Id) -> Result<EventHeap, StateError> {
    get_validators(db, CURRENT_VALIDATORS_PREFIX, subnet_id, false)
}

pub fn put_current_validators(
    db: &dyn Database,
    subnet_id: Id,
    heap: &EventHeap,
) -> Result<(), StateError> {
    put_validators(db, CURRENT_VALIDATORS_PREFIX, subnet_id, heap)
}

/// The subnet's pending validator set, ordered by start time.
pub fn get_pending_validators(db: &dyn Database, subnet_id: Id) -> Result<EventHeap, StateError> {
    get_validators(db, PENDING_VALIDATORS_PREFIX, subnet_id, true)
}

pub fn put_pending_validators(
    db: &dyn Database,
    subnet_id: Id,
    heap: &EventHeap,
) -> Result<(), StateError> {
    put_validators(db, PENDING_VALIDATORS_PREFIX, subnet_id, heap)
}

pub fn get_chains(db: &dyn Database) -> Result<Vec<CreateChainTx>, StateError> {
    match db.get(CHAINS_KEY)? {
        Some(bytes) => {
            let mut r = Reader::new(&bytes);
            let n = r.get_u32()? as usize;
            let mut chains = Vec::with_capacity(n);
            for _ in 0..n {
                chains.push(CreateChainTx::read_fields(&mut r)?);
            }
            r.finish()?;
            Ok(chains)
        }
        None => Ok(Vec::new()),
    }
}

pub fn put_chains(db: &dyn Database, chains: &[CreateChainTx]) -> Result<(), StateError> {
    let mut w = Writer::new();
    w.put_u32(chains.len() as u32);
    for chain in chains {
        chain.write_fields(&mut w);
    }
    db.put(CHAINS_KEY, w.into_bytes())?;
    Ok(())
}

pub fn get_subnets(db: &dyn Database) -> Result<Vec<CreateSubnetTx>, StateError> {
    match db.get(SUBNETS_KEY)? {
        Some(bytes) => {
            let mut r = Reader::new(&bytes);
            let n = r.get_u32()? as usize;
            let mut subnets = Vec::with_capacity(n);
            for _ in 0..n {
                subnets.push(CreateSubnetTx::read_fields(&mut r)?);
            }
            r.finish()?;
            Ok(subnets)
        }
        None => Ok(Vec::new()),
    }
}

pub fn put_subnets(db: &dyn Database, subnets: &[CreateSubnetTx]) -> Result<(), StateError> {
    let mut w = Writer::new();
    w.put_u32(subnets.len() as u32);
    for subnet in subnets {
        subnet.write_fields(&mut w);
    }
    db.put(SUBNETS_KEY, w.into_bytes())?;
    Ok(())
}

/// Reads an account, defaulting to a zero-balance account at nonce 0.
pub fn get_account(db: &dyn Database, address: ShortId) -> Result<Account, StateError> {
    match db.get(&prefixed(ACCOUNT_PREFIX, address.as_bytes()))? {
        Some(bytes) => {
            let mut r = Reader::new(&bytes);
            let account = Account::read(&mut r)?;
            r.finish()?;
            Ok(account)
        }
        None => Ok(Account::new(address)),
    }
}

pub fn put_account(db: &dyn Database, account: &Account) -> Result<(), StateError> {
    let mut w = Writer::new();
    account.write(&mut w);
    db.put(
        &prefixed(ACCOUNT_PREFIX, account.address.as_bytes()),
        w.into_bytes(),
    )?;
    Ok(())
}

pub fn get_block_bytes(db: &dyn Database, id: Id) -> Result<Option<Vec<u8>>, StateError> {
    Ok(db.get(&prefixed(BLOCK_PREFIX, id.as_bytes()))?)
}

pub fn put_block_bytes(db: &dyn Database, id: Id, bytes: Vec<u8>) -> Result<(), StateError> {
    db.put(&prefixed(BLOCK_PREFIX, id.as_bytes()), bytes)?;
    Ok(())
}

pub fn delete_block_bytes(db: &dyn Database, id: Id) -> Result<(), StateError> {
    db.delete(&prefixed(BLOCK_PREFIX, id.as_bytes()))?;
    Ok(())
}

pub fn get_last_accepted(db: &dyn Database) -> Result<Option<Id>, StateError> {
    match db.get(LAST_ACCEPTED_KEY)? {
        Some(bytes) => {
            let mut r = Reader::new(&bytes);
            let id = Id::new(r.get_fixed()?);
            r.finish()?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

pub fn put_last_accepted(db: &dyn Database, id: Id) -> Result<(), StateError> {
    db.put(LAST_ACCEPTED_KEY, id.as_bytes().to_vec())?;
    Ok(())
}

pub fn is_initialized(db: &dyn Database) -> Result<bool, StateError> {
    Ok(db.get(INITIALIZED_KEY)?.is_some())
}

pub fn set_initialized(db: &dyn Database) -> Result<(), StateError> {
    db.put(INITIALIZED_KEY, vec![1])?;
    Ok(())
}

/// The time of the next validator set change of one subnet: the top of its
/// pending queue if `start`, else the top of its current queue. [MAX_TIME] if
/// the queue is empty.
pub fn next_subnet_validator_change_time(
    db: &dyn Database,
    subnet_id: Id,
    start: bool,
) -> Result<UnixTime, StateError> {
    let heap = if start {
        get_pending_validators(db, subnet_id)?
    } else {
        get_current_validators(db, subnet_id)?
    };
    Ok(heap.timestamp())
}

/// The earliest validator set change across the default subnet and every created
/// subnet: next start if `start`, else next end.
pub fn next_validator_change_time(db: &dyn Database, start: bool) -> Result<UnixTime, StateError> {
    let mut earliest =
        next_subnet_validator_change_time(db, crate::params::DEFAULT_SUBNET_ID, start)?;
    for subnet in get_subnets(db)? {
        let t = next_subnet_validator_change_time(db, subnet.id(), start)?;
        earliest = earliest.min(t);
    }
    Ok(earliest)
}

/// Every subnet id with validator queues: the default subnet plus all created
/// subnets.
pub fn subnet_ids(db: &dyn Database) -> Result<Vec<Id>, StateError> {
    let mut ids = vec![crate::params::DEFAULT_SUBNET_ID];
    for subnet in get_subnets(db)? {
        ids.push(subnet.id());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemDb;

    #[test]
    fn missing_timestamp_reads_as_zero() {
        let db = MemDb::new();
        assert_eq!(get_timestamp(&db).unwrap(), 0);
        put_timestamp(&db, 777).unwrap();
        assert_eq!(get_timestamp(&db).unwrap(), 777);
    }

    #[test]
    fn missing_account_reads_as_empty() {
        let db = MemDb::new();
        let addr = ShortId::new([3u8; 20]);
        let account = get_account(&db, addr).unwrap();
        assert_eq!(account, Account::new(addr));

        put_account(&db, &account.add(500)).unwrap();
        assert_eq!(get_account(&db, addr).unwrap().balance, 500);
    }

    #[test]
    fn account_spend_enforces_nonce_and_balance() {
        let account = Account {
            address: ShortId::new([1u8; 20]),
            nonce: 4,
            balance: 100,
        };
        assert_eq!(account.remove(10, 4), Err(TransitionError::WrongNonce));
        assert_eq!(
            account.remove(101, 5),
            Err(TransitionError::InsufficientBalance)
        );
        let spent = account.remove(100, 5).unwrap();
        assert_eq!((spent.nonce, spent.balance), (5, 0));
    }

    #[test]
    fn validator_queues_are_separate_per_subnet() {
        let db = MemDb::new();
        let subnet = Id::hash_of(b"subnet");
        let current = get_current_validators(&db, subnet).unwrap();
        assert!(current.is_empty());
        put_current_validators(&db, subnet, &current).unwrap();

        assert!(get_current_validators(&db, Id::hash_of(b"other"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn change_time_defaults_to_the_sentinel() {
        use crate::params::MAX_TIME;

        let db = MemDb::new();
        assert_eq!(next_validator_change_time(&db, true).unwrap(), MAX_TIME);
        assert_eq!(next_validator_change_time(&db, false).unwrap(), MAX_TIME);
    }
}
