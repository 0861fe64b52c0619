/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Semantic verification of chain-time advancement.
//!
//! Committing an advancement to `T` moves chain time forward and settles every
//! subnet's validator queues at `T`: pending stakers whose start time has been
//! reached become current, and non-default-subnet stakers whose end time has
//! passed are dropped. Default-subnet stakers are never dropped here; they leave
//! through reward proposals so their bond and reward can be settled.

use std::sync::Arc;

use crate::database::{Database, VersionedStore};
use crate::error::TransitionError;
use crate::params::{DEFAULT_SUBNET_ID, DELTA};
use crate::state;
use crate::txs::{AdvanceTimeTx, ProposalOutcome, SemanticContext};
use crate::types::UnixTime;

pub(crate) fn advance_time(
    ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &AdvanceTimeTx,
) -> Result<ProposalOutcome, TransitionError> {
    let chain_time = state::get_timestamp(parent.as_ref())?;
    if tx.time <= chain_time {
        return Err(TransitionError::TimeNotMonotonic);
    }

    let local_time = ctx.clock.time();
    if tx.time > local_time.saturating_add(DELTA) {
        return Err(TransitionError::TimeTooAdvanced);
    }

    // Advancing past the next scheduled validator change would skip that change.
    let next_start = state::next_validator_change_time(parent.as_ref(), true)?;
    let next_end = state::next_validator_change_time(parent.as_ref(), false)?;
    if tx.time > next_start.min(next_end) {
        return Err(TransitionError::TimeBeyondNextChange);
    }

    let on_commit = Arc::new(VersionedStore::new(parent.clone()));
    state::put_timestamp(on_commit.as_ref(), tx.time)?;
    for subnet_id in state::subnet_ids(parent.as_ref())? {
        settle_subnet_at(parent, on_commit.as_ref(), subnet_id, tx.time)?;
    }

    let on_abort = Arc::new(VersionedStore::new(parent.clone()));
    Ok(ProposalOutcome {
        on_commit,
        on_abort,
    })
}

/// Writes the subnet's validator queues as they stand once chain time is `time`.
fn settle_subnet_at(
    parent: &Arc<dyn Database>,
    on_commit: &VersionedStore,
    subnet_id: crate::types::Id,
    time: UnixTime,
) -> Result<(), TransitionError> {
    let mut current = state::get_current_validators(parent.as_ref(), subnet_id)?;
    let mut pending = state::get_pending_validators(parent.as_ref(), subnet_id)?;

    // Default-subnet leavers are settled by reward proposals, not here.
    if subnet_id != DEFAULT_SUBNET_ID {
        while current.peek().is_some_and(|event| event.end_time() <= time) {
            current.pop();
        }
    }

    while pending.peek().is_some_and(|event| event.start_time() <= time) {
        if let Some(event) = pending.pop() {
            current.push(event);
        }
    }

    state::put_current_validators(on_commit, subnet_id, &current)?;
    state::put_pending_validators(on_commit, subnet_id, &pending)?;
    Ok(())
}
