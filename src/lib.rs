/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Platform Chain virtual machine: the meta-chain state machine of a
//! multi-chain proof-of-stake network. The platform chain records which
//! validators are staking, which subnets exist and which blockchains have been
//! created, so its genesis state is the genesis state of the entire network.
//!
//! ```text
//! clients ──txs──▶ unissued queues ──scheduler──▶ "block ready"
//!                                                      │
//! consensus engine ──build_block/verify/accept────────▶│
//!                                                      ▼
//!                                        speculative overlay ──accept──▶ base store
//! ```
//!
//! The [vm] module implements the contract the outer Snowman-style consensus
//! engine drives ([build_block](vm::PlatformVm::build_block),
//! [parse_block](vm::PlatformVm::parse_block), per-block verify/accept/reject)
//! and the wall-clock scheduler that decides when the next block is ready. The
//! [txs] module defines the transaction set and its two-outcome speculative
//! semantics, [block] the four block shapes, [database] the journaled overlay
//! they speculate through, and [genesis] the network's embedded genesis state.

pub mod block;
pub mod codec;
pub mod crypto;
pub mod database;
pub mod error;
pub mod event_heap;
pub mod genesis;
pub mod params;
pub mod reward;
pub mod service;
pub mod state;
pub mod timer;
pub mod txs;
pub mod types;
pub mod vm;

pub use error::{BlockError, CodecError, DbError, StateError, TransitionError, VmError};
pub use types::{Clock, Id, Message, ShortId, UnixTime};
pub use vm::{
    BlockHandle, ChainManager, ChainParameters, Context, Fx, PlatformVm, Status, Validator,
    ValidatorRegistry,
};
