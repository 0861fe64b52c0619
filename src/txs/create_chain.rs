/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Semantic verification of blockchain creation. The chain record is appended to
//! the chain list; telling the chain manager to actually spawn the chain happens
//! when the containing block is accepted, not here.

use std::sync::Arc;

use secp256k1::SecretKey;

use crate::crypto::{self, EMPTY_SIGNATURE};
use crate::database::{Database, VersionedStore};
use crate::error::TransitionError;
use crate::params::TX_FEE;
use crate::state;
use crate::txs::{verify_control_threshold, CreateChainTx, SemanticContext};
use crate::types::Id;

pub(crate) fn create_chain(
    ctx: &SemanticContext,
    parent: &Arc<dyn Database>,
    tx: &CreateChainTx,
) -> Result<Arc<VersionedStore>, TransitionError> {
    tx.syntactic_verify(ctx.network_id)?;
    verify_control_threshold(parent, tx.subnet_id(), &tx.unsigned_bytes(), &[])?;

    let payer = tx.payer_address()?;
    let account = state::get_account(parent.as_ref(), payer)?;
    let spent = account.remove(TX_FEE, tx.nonce)?;

    let on_accept = Arc::new(VersionedStore::new(parent.clone()));
    let mut chains = state::get_chains(parent.as_ref())?;
    chains.push(tx.clone());
    state::put_chains(on_accept.as_ref(), &chains)?;
    state::put_account(on_accept.as_ref(), &spent)?;
    Ok(on_accept)
}

/// Builds and signs a chain creation.
pub fn new_create_chain_tx(
    nonce: u64,
    chain_name: String,
    vm_id: Id,
    fx_ids: Vec<Id>,
    genesis_data: Vec<u8>,
    network_id: u32,
    key: &SecretKey,
) -> CreateChainTx {
    let mut tx = CreateChainTx {
        network_id,
        nonce,
        chain_name,
        vm_id,
        fx_ids,
        genesis_data,
        payer_sig: EMPTY_SIGNATURE,
    };
    tx.payer_sig = crypto::sign(&tx.unsigned_bytes(), key);
    tx
}
