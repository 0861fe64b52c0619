/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! error defines sets of error definitions in entire life time of state transitions.
//!
//! Database errors are transient: they surface to the caller unchanged and the
//! scheduler re-evaluates on its next trigger. Transaction-level errors reject the
//! transaction and never crash the VM. Block-level errors reject the block, taking
//! its descendants with it. A handful of conditions are fatal and halt the VM.

use thiserror::Error;

/// Errors raised by the binary codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A type tag was registered twice. Registration is one-shot at startup, so
    /// this is fatal.
    #[error("type tag {0} registered twice")]
    DuplicateType(u32),

    /// A value carried a tag the registry does not know.
    #[error("unknown type tag {0}")]
    UnknownType(u32),

    /// The input ended before the value was fully read.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A length prefix pointed past the end of the input.
    #[error("length prefix out of range")]
    LengthOutOfRange,

    /// A string field held bytes that are not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Bytes remained after the top-level value was fully read.
    #[error("trailing bytes after value")]
    TrailingBytes,
}

/// Errors raised by the key-value store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("database read failed: {0}")]
    Read(String),

    #[error("database write failed: {0}")]
    Write(String),

    #[error("database is closed")]
    Closed,
}

/// Errors raised while reading or writing typed state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error(transparent)]
    Db(#[from] DbError),

    /// Persisted bytes did not decode back into the expected type.
    #[error("corrupt persisted state: {0}")]
    Corrupt(#[from] CodecError),
}

/// Descriptive error definitions of a transaction-level verification failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Nonce is not the account's next nonce.
    #[error("transaction nonce does not follow the account nonce")]
    WrongNonce,

    /// Not enough balance to bond the stake or pay the fee.
    #[error("not enough balance")]
    InsufficientBalance,

    /// The staker's start time is not past chain time plus the synchrony bound.
    #[error("start time is not far enough past the chain time")]
    StartTimeTooSoon,

    /// Start time is not strictly before end time, or the staking period is
    /// outside the permitted duration bounds.
    #[error("staking period is invalid")]
    InvalidStakingPeriod,

    /// Stake amount is below the protocol minimum.
    #[error("stake amount is below the minimum")]
    StakeTooSmall,

    /// The node already validates during an overlapping period.
    #[error("node already validates during an overlapping period")]
    OverlappingValidation,

    /// A delegation period must lie within a validation period of the same node.
    #[error("delegation period is not covered by the node's validation period")]
    UncoveredDelegation,

    /// The transaction names a network this chain is not running.
    #[error("wrong network id")]
    WrongNetworkId,

    /// The referenced subnet does not exist.
    #[error("unknown subnet")]
    UnknownSubnet,

    /// A subnet with the same id already exists.
    #[error("subnet already exists")]
    SubnetAlreadyExists,

    /// Control signatures do not satisfy the subnet's threshold.
    #[error("control signatures do not meet the subnet threshold")]
    ControlThresholdNotMet,

    /// Signature bytes are malformed or do not recover to a key.
    #[error("signature is malformed or unrecoverable")]
    InvalidSignature,

    /// A proposed chain time is not strictly after the current chain time.
    #[error("proposed time does not advance the chain time")]
    TimeNotMonotonic,

    /// A proposed chain time is past local wall-clock time plus the synchrony bound.
    #[error("proposed time is too far in the future")]
    TimeTooAdvanced,

    /// A proposed chain time skips past the next validator set change.
    #[error("proposed time passes the next validator change")]
    TimeBeyondNextChange,

    /// No default-subnet validator is due to be rewarded at the current chain time.
    #[error("no validator is due to be rewarded")]
    RewardNotDue,

    /// The reward proposal names a staker other than the one due.
    #[error("wrong staker proposed for reward")]
    WrongRewardedStaker,

    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors raised during block verification or acceptance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The block's parent is neither pending nor accepted.
    #[error("missing parent block")]
    MissingParent,

    /// The block's height does not follow its parent's height.
    #[error("block height does not follow its parent")]
    WrongHeight,

    /// A commit or abort block whose parent is not an unresolved proposal.
    #[error("commit or abort block does not follow an open proposal")]
    OrphanedOption,

    /// A proposal or standard block must build on a decision block.
    #[error("block must build on a decision block")]
    NotADecisionParent,

    #[error(transparent)]
    Tx(#[from] TransitionError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors surfaced through the VM facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Chain time has reached the end of representable time. Fatal.
    #[error(
        "chain time is suspiciously far in the future. Either this codebase was way more \
         successful than expected, or a critical error has occurred"
    )]
    EndOfTime,

    /// The engine supplied feature extensions, which this VM does not support. Fatal.
    #[error("unsupported feature extensions")]
    UnsupportedFxs,

    /// Not an error state: `build_block` was called with nothing to build.
    #[error("no pending blocks")]
    NoPendingBlocks,

    /// The requested block is not known.
    #[error("missing block")]
    MissingBlock,

    /// Bytes handed to `parse_block` did not decode into a block.
    #[error("problem parsing block")]
    ParseFailed,

    /// The VM facade was used before `initialize`.
    #[error("vm is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Tx(#[from] TransitionError),
}
