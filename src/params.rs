/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Protocol-defined constants of the platform chain. These are fixed in this
//! implementation; a governable parameter system is a declared non-goal.
//!
//! |Protocol Name          | Constant                      |
//! |:---                   |:---                           |
//! |Δ (synchrony bound)    | [DELTA]                       |
//! |Inflation rate cap     | [INFLATION_RATE]              |
//! |Decision batch size    | [BATCH_SIZE]                  |
//! |Minimum stake          | [MINIMUM_STAKE_AMOUNT]        |
//! |Staking duration       | [MINIMUM_STAKING_DURATION], [MAXIMUM_STAKING_DURATION] |
//! |Delegation shares      | [NUMBER_OF_SHARES]            |

use crate::types::{Id, UnixTime};

/// Base denomination of the staking token.
pub const NANO_AVA: u64 = 1;
pub const MICRO_AVA: u64 = 1_000 * NANO_AVA;
pub const MILLI_AVA: u64 = 1_000 * MICRO_AVA;
pub const AVA: u64 = 1_000 * MILLI_AVA;

/// The synchrony bound, in seconds. A staker tx is only buildable while its start
/// time is still at least this far ahead of local wall-clock time, which keeps
/// nodes with Δ-bounded clock skew from building blocks into the past.
pub const DELTA: u64 = 10;

/// Maximum annual inflation factor applied by the staking reward formula.
pub const INFLATION_RATE: f64 = 1.04;

/// Number of decision transactions placed into a single standard block.
pub const BATCH_SIZE: usize = 30;

/// Minimum amount that must be bonded to become a staker.
pub const MINIMUM_STAKE_AMOUNT: u64 = 10 * MICRO_AVA;

/// Shortest period a staker can bond their funds for.
pub const MINIMUM_STAKING_DURATION: u64 = 24 * 60 * 60;

/// Longest period a staker can bond their funds for.
pub const MAXIMUM_STAKING_DURATION: u64 = 365 * 24 * 60 * 60;

/// Granularity of a validator's delegation-fee entitlement.
pub const NUMBER_OF_SHARES: u32 = 1_000_000;

/// Fee charged for decision transactions, beyond spending a nonce.
pub const TX_FEE: u64 = 0;

/// Latest representable second. Doubles as the "no scheduled event" sentinel.
pub const MAX_TIME: UnixTime = UnixTime::MAX;

/// The default subnet. Its validators also secure the platform chain itself.
pub const DEFAULT_SUBNET_ID: Id = Id::EMPTY;
