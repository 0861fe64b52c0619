/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Semantic verification of subnet creation. A subnet record is immutable once
//! created; a duplicate id is rejected.

use std::sync::Arc;

use secp256k1::SecretKey;

use crate::crypto::{self, EMPTY_SIGNATURE};
use crate::database::{Database, VersionedStore};
use crate::error::TransitionError;
use crate::params::TX_FEE;
use crate::state;
use crate::txs::{CreateSubnetTx, SemanticContext};
use crate::types::ShortId;

pub(crate) fn create_subnet(
    ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &CreateSubnetTx,
) -> Result<Arc<VersionedStore>, TransitionError> {
    tx.syntactic_verify(ctx.network_id)?;

    let mut subnets = state::get_subnets(parent.as_ref())?;
    if subnets.iter().any(|existing| existing.id() == tx.id()) {
        return Err(TransitionError::SubnetAlreadyExists);
    }

    let payer = tx.payer_address()?;
    let account = state::get_account(parent.as_ref(), payer)?;
    let spent = account.remove(TX_FEE, tx.nonce)?;

    let on_accept = Arc::new(VersionedStore::new(parent.clone()));
    subnets.push(tx.clone());
    state::put_subnets(on_accept.as_ref(), &subnets)?;
    state::put_account(on_accept.as_ref(), &spent)?;
    Ok(on_accept)
}

/// Builds and signs a subnet creation.
pub fn new_create_subnet_tx(
    nonce: u64,
    control_keys: Vec<ShortId>,
    threshold: u16,
    network_id: u32,
    key: &SecretKey,
) -> CreateSubnetTx {
    let mut tx = CreateSubnetTx {
        network_id,
        nonce,
        control_keys,
        threshold,
        payer_sig: EMPTY_SIGNATURE,
    };
    tx.payer_sig = crypto::sign(&tx.unsigned_bytes(), key);
    tx
}
