/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The "platform" service surface the VM mounts for API handlers.
//!
//! The HTTP transport itself lives outside this crate; the VM only supplies the
//! handler objects. Every service method re-enters the VM through its lock, the
//! same as an engine entry point.

use std::collections::HashMap;

use secp256k1::SecretKey;

use crate::error::VmError;
use crate::event_heap::EventHeap;
use crate::genesis;
use crate::txs::{
    create_chain::new_create_chain_tx, create_subnet::new_create_subnet_tx,
    staking::new_add_default_subnet_delegator_tx, staking::new_add_default_subnet_validator_tx,
    DecisionTx, TimedTx,
};
use crate::types::{Id, ShortId, UnixTime};
use crate::vm::PlatformVm;

/// A mounted handler: the service plus whether calls into it need the chain lock
/// (they all do; queries included).
pub struct HttpHandler {
    pub lock_required: bool,
    pub service: Service,
}

/// The instance-bound platform service.
#[derive(Clone)]
pub struct Service {
    vm: PlatformVm,
}

impl Service {
    pub fn new(vm: PlatformVm) -> Self {
        Self { vm }
    }

    pub fn get_timestamp(&self) -> Result<UnixTime, VmError> {
        self.vm.chain_time()
    }

    pub fn get_balance(&self, address: ShortId) -> Result<u64, VmError> {
        Ok(self.vm.account(address)?.balance)
    }

    pub fn get_pending_validators(&self, subnet_id: Id) -> Result<EventHeap, VmError> {
        self.vm.pending_validators(subnet_id)
    }

    pub fn get_current_validators(&self, subnet_id: Id) -> Result<EventHeap, VmError> {
        self.vm.current_validators(subnet_id)
    }

    /// Builds, signs and buffers a default-subnet validator addition.
    #[allow(clippy::too_many_arguments)]
    pub fn add_default_subnet_validator(
        &self,
        nonce: u64,
        weight: u64,
        start_time: UnixTime,
        end_time: UnixTime,
        node_id: ShortId,
        destination: ShortId,
        shares: u32,
        network_id: u32,
        key: &SecretKey,
    ) -> Result<Id, VmError> {
        let tx = new_add_default_subnet_validator_tx(
            nonce,
            weight,
            start_time,
            end_time,
            node_id,
            destination,
            shares,
            network_id,
            key,
        );
        let id = tx.id();
        self.vm.issue_staker_tx(TimedTx::Validator(tx))?;
        Ok(id)
    }

    /// Builds, signs and buffers a default-subnet delegator addition.
    #[allow(clippy::too_many_arguments)]
    pub fn add_default_subnet_delegator(
        &self,
        nonce: u64,
        weight: u64,
        start_time: UnixTime,
        end_time: UnixTime,
        node_id: ShortId,
        destination: ShortId,
        network_id: u32,
        key: &SecretKey,
    ) -> Result<Id, VmError> {
        let tx = new_add_default_subnet_delegator_tx(
            nonce,
            weight,
            start_time,
            end_time,
            node_id,
            destination,
            network_id,
            key,
        );
        let id = tx.id();
        self.vm.issue_staker_tx(TimedTx::Delegator(tx))?;
        Ok(id)
    }

    /// Builds, signs and buffers a subnet creation.
    pub fn create_subnet(
        &self,
        nonce: u64,
        control_keys: Vec<ShortId>,
        threshold: u16,
        network_id: u32,
        key: &SecretKey,
    ) -> Result<Id, VmError> {
        let tx = new_create_subnet_tx(nonce, control_keys, threshold, network_id, key);
        let id = tx.id();
        self.vm.issue_decision_tx(DecisionTx::CreateSubnet(tx))?;
        Ok(id)
    }

    /// Builds, signs and buffers a chain creation.
    #[allow(clippy::too_many_arguments)]
    pub fn create_blockchain(
        &self,
        nonce: u64,
        chain_name: String,
        vm_id: Id,
        fx_ids: Vec<Id>,
        genesis_data: Vec<u8>,
        network_id: u32,
        key: &SecretKey,
    ) -> Result<Id, VmError> {
        let tx = new_create_chain_tx(
            nonce,
            chain_name,
            vm_id,
            fx_ids,
            genesis_data,
            network_id,
            key,
        );
        let id = tx.id();
        self.vm.issue_decision_tx(DecisionTx::CreateChain(tx))?;
        Ok(id)
    }
}

/// The static service: network helpers that need no chain instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticService;

impl StaticService {
    pub fn network_name(&self, network_id: u32) -> String {
        genesis::network_name(network_id)
    }

    pub fn network_id(&self, name: &str) -> Result<u32, genesis::NetworkNameError> {
        genesis::network_id(name)
    }
}

/// Mounts the "platform" service for the chain instance.
pub fn create_handlers(vm: &PlatformVm) -> HashMap<String, HttpHandler> {
    let mut handlers = HashMap::new();
    handlers.insert(
        String::new(),
        HttpHandler {
            lock_required: true,
            service: Service::new(vm.clone()),
        },
    );
    handlers
}

/// Mounts the static "platform" service.
pub fn create_static_handlers() -> HashMap<String, StaticService> {
    let mut handlers = HashMap::new();
    handlers.insert(String::new(), StaticService);
    handlers
}
