/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Semantic verification of staker rewards.
//!
//! A reward proposal is valid only for the default-subnet staker at the head of
//! the current queue, and only at the exact chain time its period ends. Both
//! resolution paths remove the staker and return its bond; only the commit path
//! credits the reward. An abort is a forfeiture, the network's judgement that
//! the staker did not earn its reward.

use std::sync::Arc;

use crate::database::{Database, VersionedStore};
use crate::error::TransitionError;
use crate::params::DEFAULT_SUBNET_ID;
use crate::reward;
use crate::state;
use crate::txs::{ProposalOutcome, RewardValidatorTx, SemanticContext, TimedTx};
use crate::types::ShortId;

pub(crate) fn reward_validator(
    _ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &RewardValidatorTx,
) -> Result<ProposalOutcome, TransitionError> {
    let mut current = state::get_current_validators(parent.as_ref(), DEFAULT_SUBNET_ID)?;
    let chain_time = state::get_timestamp(parent.as_ref())?;

    let staker = current.pop().ok_or(TransitionError::RewardNotDue)?;
    if staker.end_time() != chain_time {
        return Err(TransitionError::RewardNotDue);
    }
    if staker.id() != tx.tx_id {
        return Err(TransitionError::WrongRewardedStaker);
    }

    let on_commit = Arc::new(VersionedStore::new(parent.clone()));
    state::put_current_validators(on_commit.as_ref(), DEFAULT_SUBNET_ID, &current)?;
    settle(on_commit.as_ref(), &staker, &current, true)?;

    let on_abort = Arc::new(VersionedStore::new(parent.clone()));
    state::put_current_validators(on_abort.as_ref(), DEFAULT_SUBNET_ID, &current)?;
    settle(on_abort.as_ref(), &staker, &current, false)?;

    Ok(ProposalOutcome {
        on_commit,
        on_abort,
    })
}

/// Returns the staker's bond to its destination and, when `rewarded`, credits
/// the reward, splitting a delegator's reward with its covering validator.
fn settle(
    db: &VersionedStore,
    staker: &TimedTx,
    remaining_current: &crate::event_heap::EventHeap,
    rewarded: bool,
) -> Result<(), TransitionError> {
    credit(db, staker.destination(), staker.weight())?;
    if !rewarded {
        return Ok(());
    }

    let duration = staker.end_time().saturating_sub(staker.start_time());
    let amount = reward::calculate(duration, staker.weight());
    match staker {
        TimedTx::Delegator(delegator) => {
            let validator = remaining_current.iter().find_map(|event| match event {
                TimedTx::Validator(v) if v.node_id == delegator.node_id => Some(v),
                _ => None,
            });
            match validator {
                Some(v) => {
                    let (validator_cut, delegator_cut) = reward::split(amount, v.shares);
                    credit(db, v.destination, validator_cut)?;
                    credit(db, delegator.destination, delegator_cut)?;
                }
                // The covering validator left first; nobody claims a fee.
                None => credit(db, delegator.destination, amount)?,
            }
        }
        _ => credit(db, staker.destination(), amount)?,
    }
    Ok(())
}

/// Read-modify-write through the overlay so consecutive credits to one address
/// accumulate.
fn credit(db: &VersionedStore, address: ShortId, amount: u64) -> Result<(), TransitionError> {
    if amount == 0 {
        return Ok(());
    }
    let account = state::get_account(db, address)?;
    state::put_account(db, &account.add(amount))?;
    Ok(())
}
