/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Semantic verification of the staker-addition transactions.
//!
//! Each function layers the transaction's effects over the parent database: the
//! on-commit overlay bonds the stake and enqueues the staker into the pending
//! set, the on-abort overlay leaves the parent state untouched.

use std::sync::Arc;

use secp256k1::SecretKey;

use crate::crypto::{self, EMPTY_SIGNATURE};
use crate::database::{Database, VersionedStore};
use crate::error::TransitionError;
use crate::event_heap::EventHeap;
use crate::params::{DEFAULT_SUBNET_ID, DELTA, TX_FEE};
use crate::state;
use crate::txs::{
    verify_control_threshold, AddDefaultSubnetDelegatorTx, AddDefaultSubnetValidatorTx,
    AddNonDefaultSubnetValidatorTx, ProposalOutcome, SemanticContext, TimedTx,
};
use crate::types::{Id, ShortId, UnixTime};

/// True when `[start_a, end_a)` and `[start_b, end_b)` share any instant.
fn windows_overlap(start_a: UnixTime, end_a: UnixTime, start_b: UnixTime, end_b: UnixTime) -> bool {
    start_a < end_b && start_b < end_a
}

/// Rejects when `node_id` already has an event in `heap` overlapping the window.
fn check_no_overlap(
    heap: &EventHeap,
    node_id: ShortId,
    start: UnixTime,
    end: UnixTime,
) -> Result<(), TransitionError> {
    for event in heap.iter() {
        if event.node_id() == node_id
            && windows_overlap(event.start_time(), event.end_time(), start, end)
        {
            return Err(TransitionError::OverlappingValidation);
        }
    }
    Ok(())
}

/// True when some validator event in `heap` for `node_id` fully covers the
/// delegation window.
fn check_covered_by_validator(
    heap: &EventHeap,
    node_id: ShortId,
    start: UnixTime,
    end: UnixTime,
) -> bool {
    heap.iter().any(|event| {
        matches!(event, TimedTx::Validator(_))
            && event.node_id() == node_id
            && event.start_time() <= start
            && end <= event.end_time()
    })
}

/// The synchrony bound: a staker may only be scheduled strictly past the chain
/// time plus Δ.
fn check_synchrony_bound(
    parent: &Arc<dyn Database>,
    start: UnixTime,
) -> Result<(), TransitionError> {
    let chain_time = state::get_timestamp(parent.as_ref())?;
    if start <= chain_time.saturating_add(DELTA) {
        return Err(TransitionError::StartTimeTooSoon);
    }
    Ok(())
}

pub(crate) fn add_default_subnet_validator(
    ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &AddDefaultSubnetValidatorTx,
) -> Result<ProposalOutcome, TransitionError> {
    tx.syntactic_verify(ctx.network_id)?;
    check_synchrony_bound(parent, tx.start_time)?;

    let current = state::get_current_validators(parent.as_ref(), DEFAULT_SUBNET_ID)?;
    let mut pending = state::get_pending_validators(parent.as_ref(), DEFAULT_SUBNET_ID)?;
    check_no_overlap(&current, tx.node_id, tx.start_time, tx.end_time)?;
    check_no_overlap(&pending, tx.node_id, tx.start_time, tx.end_time)?;

    // Bond the stake from the payer's account.
    let payer = tx.payer_address()?;
    let account = state::get_account(parent.as_ref(), payer)?;
    let spent = account.remove(tx.weight, tx.nonce)?;

    let on_commit = Arc::new(VersionedStore::new(parent.clone()));
    pending.push(TimedTx::Validator(tx.clone()));
    state::put_pending_validators(on_commit.as_ref(), DEFAULT_SUBNET_ID, &pending)?;
    state::put_account(on_commit.as_ref(), &spent)?;

    let on_abort = Arc::new(VersionedStore::new(parent.clone()));
    Ok(ProposalOutcome {
        on_commit,
        on_abort,
    })
}

pub(crate) fn add_default_subnet_delegator(
    ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &AddDefaultSubnetDelegatorTx,
) -> Result<ProposalOutcome, TransitionError> {
    tx.syntactic_verify(ctx.network_id)?;
    check_synchrony_bound(parent, tx.start_time)?;

    let current = state::get_current_validators(parent.as_ref(), DEFAULT_SUBNET_ID)?;
    let mut pending = state::get_pending_validators(parent.as_ref(), DEFAULT_SUBNET_ID)?;
    if !check_covered_by_validator(&current, tx.node_id, tx.start_time, tx.end_time)
        && !check_covered_by_validator(&pending, tx.node_id, tx.start_time, tx.end_time)
    {
        return Err(TransitionError::UncoveredDelegation);
    }

    let payer = tx.payer_address()?;
    let account = state::get_account(parent.as_ref(), payer)?;
    let spent = account.remove(tx.weight, tx.nonce)?;

    let on_commit = Arc::new(VersionedStore::new(parent.clone()));
    pending.push(TimedTx::Delegator(tx.clone()));
    state::put_pending_validators(on_commit.as_ref(), DEFAULT_SUBNET_ID, &pending)?;
    state::put_account(on_commit.as_ref(), &spent)?;

    let on_abort = Arc::new(VersionedStore::new(parent.clone()));
    Ok(ProposalOutcome {
        on_commit,
        on_abort,
    })
}

pub(crate) fn add_non_default_subnet_validator(
    ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &AddNonDefaultSubnetValidatorTx,
) -> Result<ProposalOutcome, TransitionError> {
    tx.syntactic_verify(ctx.network_id)?;
    check_synchrony_bound(parent, tx.start_time)?;
    verify_control_threshold(parent, tx.subnet_id, &tx.unsigned_bytes(), &tx.control_sigs)?;

    let current = state::get_current_validators(parent.as_ref(), tx.subnet_id)?;
    let mut pending = state::get_pending_validators(parent.as_ref(), tx.subnet_id)?;
    check_no_overlap(&current, tx.node_id, tx.start_time, tx.end_time)?;
    check_no_overlap(&pending, tx.node_id, tx.start_time, tx.end_time)?;

    // No stake bond on non-default subnets; the payer only spends a nonce.
    let payer = tx.payer_address()?;
    let account = state::get_account(parent.as_ref(), payer)?;
    let spent = account.remove(TX_FEE, tx.nonce)?;

    let on_commit = Arc::new(VersionedStore::new(parent.clone()));
    pending.push(TimedTx::SubnetValidator(tx.clone()));
    state::put_pending_validators(on_commit.as_ref(), tx.subnet_id, &pending)?;
    state::put_account(on_commit.as_ref(), &spent)?;

    let on_abort = Arc::new(VersionedStore::new(parent.clone()));
    Ok(ProposalOutcome {
        on_commit,
        on_abort,
    })
}

/// Builds and signs a default-subnet validator addition.
#[allow(clippy::too_many_arguments)]
pub fn new_add_default_subnet_validator_tx(
    nonce: u64,
    weight: u64,
    start_time: UnixTime,
    end_time: UnixTime,
    node_id: ShortId,
    destination: ShortId,
    shares: u32,
    network_id: u32,
    key: &SecretKey,
) -> AddDefaultSubnetValidatorTx {
    let mut tx = AddDefaultSubnetValidatorTx {
        node_id,
        weight,
        start_time,
        end_time,
        network_id,
        nonce,
        destination,
        shares,
        sig: EMPTY_SIGNATURE,
    };
    tx.sig = crypto::sign(&tx.unsigned_bytes(), key);
    tx
}

/// Builds and signs a default-subnet delegator addition.
#[allow(clippy::too_many_arguments)]
pub fn new_add_default_subnet_delegator_tx(
    nonce: u64,
    weight: u64,
    start_time: UnixTime,
    end_time: UnixTime,
    node_id: ShortId,
    destination: ShortId,
    network_id: u32,
    key: &SecretKey,
) -> AddDefaultSubnetDelegatorTx {
    let mut tx = AddDefaultSubnetDelegatorTx {
        node_id,
        weight,
        start_time,
        end_time,
        network_id,
        nonce,
        destination,
        sig: EMPTY_SIGNATURE,
    };
    tx.sig = crypto::sign(&tx.unsigned_bytes(), key);
    tx
}

/// Builds a non-default-subnet validator addition, signed by the payer and the
/// given control keys.
#[allow(clippy::too_many_arguments)]
pub fn new_add_non_default_subnet_validator_tx(
    nonce: u64,
    weight: u64,
    start_time: UnixTime,
    end_time: UnixTime,
    node_id: ShortId,
    subnet_id: Id,
    network_id: u32,
    control_keys: &[SecretKey],
    payer_key: &SecretKey,
) -> AddNonDefaultSubnetValidatorTx {
    let mut tx = AddNonDefaultSubnetValidatorTx {
        node_id,
        weight,
        start_time,
        end_time,
        subnet_id,
        network_id,
        nonce,
        control_sigs: Vec::new(),
        payer_sig: EMPTY_SIGNATURE,
    };
    let unsigned = tx.unsigned_bytes();
    tx.control_sigs = control_keys
        .iter()
        .map(|key| crypto::sign(&unsigned, key))
        .collect();
    tx.payer_sig = crypto::sign(&unsigned, payer_key);
    tx
}
