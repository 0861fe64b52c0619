/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The platform chain's transaction set.
//!
//! Proposal transactions (staker additions, time advancement, staker rewards) ride
//! in proposal blocks and produce two speculative databases: the state if the
//! proposal is committed and the state if it is aborted. Decision transactions
//! (chain and subnet creation) ride in standard blocks and produce a single
//! on-accept database. Semantic verification never touches the parent database;
//! it only layers journaled overlays on top of it.

pub mod advance_time;
pub mod create_chain;
pub mod create_subnet;
pub mod reward_validator;
pub mod staking;

use std::sync::Arc;

use crate::codec::{
    Reader, Writer, ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE, ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE,
    ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE, ADVANCE_TIME_TX_TYPE, CREATE_CHAIN_TX_TYPE,
    CREATE_SUBNET_TX_TYPE, REWARD_VALIDATOR_TX_TYPE,
    UNSIGNED_ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE, UNSIGNED_ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE,
    UNSIGNED_ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE, UNSIGNED_CREATE_CHAIN_TX_TYPE,
    UNSIGNED_CREATE_SUBNET_TX_TYPE,
};
use crate::crypto::{self, Signature, SIGNATURE_LEN};
use crate::database::{Database, VersionedStore};
use crate::error::{CodecError, TransitionError};
use crate::params::{
    DEFAULT_SUBNET_ID, MAXIMUM_STAKING_DURATION, MINIMUM_STAKE_AMOUNT, MINIMUM_STAKING_DURATION,
};
use crate::state;
use crate::types::{Clock, Id, ShortId, UnixTime};

/// Everything semantic verification needs besides the parent database.
pub struct SemanticContext<'a> {
    pub network_id: u32,
    pub clock: &'a Clock,
}

/// The two speculative databases a proposal's acceptance would yield.
pub struct ProposalOutcome {
    pub on_commit: Arc<VersionedStore>,
    pub on_abort: Arc<VersionedStore>,
}

/// Adds a default-subnet validator. Bonds `weight` from the payer's account for
/// the validation period; `destination` receives the bond (and any reward) back
/// when the staker leaves the validator set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddDefaultSubnetValidatorTx {
    pub node_id: ShortId,
    pub weight: u64,
    pub start_time: UnixTime,
    pub end_time: UnixTime,
    pub network_id: u32,
    pub nonce: u64,
    pub destination: ShortId,
    /// Portion (out of [NUMBER_OF_SHARES](crate::params::NUMBER_OF_SHARES)) of a
    /// delegator's reward this validator keeps.
    pub shares: u32,
    pub sig: Signature,
}

impl AddDefaultSubnetValidatorTx {
    fn write_unsigned_fields(&self, w: &mut Writer) {
        w.put_fixed(self.node_id.as_bytes());
        w.put_u64(self.weight);
        w.put_u64(self.start_time);
        w.put_u64(self.end_time);
        w.put_u32(self.network_id);
        w.put_u64(self.nonce);
        w.put_fixed(self.destination.as_bytes());
        w.put_u32(self.shares);
    }

    pub(crate) fn write_fields(&self, w: &mut Writer) {
        self.write_unsigned_fields(w);
        w.put_fixed(&self.sig);
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: ShortId::new(r.get_fixed()?),
            weight: r.get_u64()?,
            start_time: r.get_u64()?,
            end_time: r.get_u64()?,
            network_id: r.get_u32()?,
            nonce: r.get_u64()?,
            destination: ShortId::new(r.get_fixed()?),
            shares: r.get_u32()?,
            sig: r.get_fixed::<SIGNATURE_LEN>()?,
        })
    }

    /// The bytes covered by the signature.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(UNSIGNED_ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE);
        self.write_unsigned_fields(&mut w);
        w.into_bytes()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }

    pub fn payer_address(&self) -> Result<ShortId, TransitionError> {
        crypto::recover_address(&self.unsigned_bytes(), &self.sig)
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        if self.network_id != network_id {
            return Err(TransitionError::WrongNetworkId);
        }
        verify_staking_window(self.start_time, self.end_time)?;
        if self.weight < MINIMUM_STAKE_AMOUNT {
            return Err(TransitionError::StakeTooSmall);
        }
        Ok(())
    }
}

/// Adds a validator to a non-default subnet. No stake is bonded; instead the
/// subnet's control keys must authorize the addition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddNonDefaultSubnetValidatorTx {
    pub node_id: ShortId,
    pub weight: u64,
    pub start_time: UnixTime,
    pub end_time: UnixTime,
    pub subnet_id: Id,
    pub network_id: u32,
    pub nonce: u64,
    pub control_sigs: Vec<Signature>,
    pub payer_sig: Signature,
}

impl AddNonDefaultSubnetValidatorTx {
    fn write_unsigned_fields(&self, w: &mut Writer) {
        w.put_fixed(self.node_id.as_bytes());
        w.put_u64(self.weight);
        w.put_u64(self.start_time);
        w.put_u64(self.end_time);
        w.put_fixed(self.subnet_id.as_bytes());
        w.put_u32(self.network_id);
        w.put_u64(self.nonce);
    }

    pub(crate) fn write_fields(&self, w: &mut Writer) {
        self.write_unsigned_fields(w);
        w.put_u32(self.control_sigs.len() as u32);
        for sig in &self.control_sigs {
            w.put_fixed(sig);
        }
        w.put_fixed(&self.payer_sig);
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        let node_id = ShortId::new(r.get_fixed()?);
        let weight = r.get_u64()?;
        let start_time = r.get_u64()?;
        let end_time = r.get_u64()?;
        let subnet_id = Id::new(r.get_fixed()?);
        let network_id = r.get_u32()?;
        let nonce = r.get_u64()?;
        let n = r.get_u32()? as usize;
        let mut control_sigs = Vec::with_capacity(n);
        for _ in 0..n {
            control_sigs.push(r.get_fixed::<SIGNATURE_LEN>()?);
        }
        Ok(Self {
            node_id,
            weight,
            start_time,
            end_time,
            subnet_id,
            network_id,
            nonce,
            control_sigs,
            payer_sig: r.get_fixed::<SIGNATURE_LEN>()?,
        })
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(UNSIGNED_ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE);
        self.write_unsigned_fields(&mut w);
        w.into_bytes()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }

    pub fn payer_address(&self) -> Result<ShortId, TransitionError> {
        crypto::recover_address(&self.unsigned_bytes(), &self.payer_sig)
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        if self.network_id != network_id {
            return Err(TransitionError::WrongNetworkId);
        }
        if self.subnet_id == DEFAULT_SUBNET_ID {
            // Default-subnet validators are added with a stake bond, not control keys.
            return Err(TransitionError::UnknownSubnet);
        }
        verify_staking_window(self.start_time, self.end_time)?;
        if self.weight == 0 {
            return Err(TransitionError::StakeTooSmall);
        }
        Ok(())
    }
}

/// Adds a default-subnet delegator. The delegation period must lie within a
/// validation period of the delegated node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddDefaultSubnetDelegatorTx {
    pub node_id: ShortId,
    pub weight: u64,
    pub start_time: UnixTime,
    pub end_time: UnixTime,
    pub network_id: u32,
    pub nonce: u64,
    pub destination: ShortId,
    pub sig: Signature,
}

impl AddDefaultSubnetDelegatorTx {
    fn write_unsigned_fields(&self, w: &mut Writer) {
        w.put_fixed(self.node_id.as_bytes());
        w.put_u64(self.weight);
        w.put_u64(self.start_time);
        w.put_u64(self.end_time);
        w.put_u32(self.network_id);
        w.put_u64(self.nonce);
        w.put_fixed(self.destination.as_bytes());
    }

    pub(crate) fn write_fields(&self, w: &mut Writer) {
        self.write_unsigned_fields(w);
        w.put_fixed(&self.sig);
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: ShortId::new(r.get_fixed()?),
            weight: r.get_u64()?,
            start_time: r.get_u64()?,
            end_time: r.get_u64()?,
            network_id: r.get_u32()?,
            nonce: r.get_u64()?,
            destination: ShortId::new(r.get_fixed()?),
            sig: r.get_fixed::<SIGNATURE_LEN>()?,
        })
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(UNSIGNED_ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE);
        self.write_unsigned_fields(&mut w);
        w.into_bytes()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }

    pub fn payer_address(&self) -> Result<ShortId, TransitionError> {
        crypto::recover_address(&self.unsigned_bytes(), &self.sig)
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        if self.network_id != network_id {
            return Err(TransitionError::WrongNetworkId);
        }
        verify_staking_window(self.start_time, self.end_time)?;
        if self.weight < MINIMUM_STAKE_AMOUNT {
            return Err(TransitionError::StakeTooSmall);
        }
        Ok(())
    }
}

/// Proposes advancing the chain time. Never signed: any correct node proposes the
/// same advancement at the same point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceTimeTx {
    pub time: UnixTime,
}

impl AdvanceTimeTx {
    pub(crate) fn write_fields(&self, w: &mut Writer) {
        w.put_u64(self.time);
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self { time: r.get_u64()? })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(ADVANCE_TIME_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }
}

/// Proposes rewarding (or, on abort, forfeiting the reward of) the default-subnet
/// staker whose validation period ends at the current chain time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardValidatorTx {
    pub tx_id: Id,
}

impl RewardValidatorTx {
    pub(crate) fn write_fields(&self, w: &mut Writer) {
        w.put_fixed(self.tx_id.as_bytes());
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        Ok(Self {
            tx_id: Id::new(r.get_fixed()?),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(REWARD_VALIDATOR_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }
}

/// Creates a blockchain. The chain record is immutable once accepted; acceptance
/// additionally tells the chain manager to spawn the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateChainTx {
    pub network_id: u32,
    pub nonce: u64,
    pub chain_name: String,
    pub vm_id: Id,
    pub fx_ids: Vec<Id>,
    pub genesis_data: Vec<u8>,
    pub payer_sig: Signature,
}

impl CreateChainTx {
    fn write_unsigned_fields(&self, w: &mut Writer) {
        w.put_u32(self.network_id);
        w.put_u64(self.nonce);
        w.put_str(&self.chain_name);
        w.put_fixed(self.vm_id.as_bytes());
        w.put_u32(self.fx_ids.len() as u32);
        for fx in &self.fx_ids {
            w.put_fixed(fx.as_bytes());
        }
        w.put_byte_array(&self.genesis_data);
    }

    pub(crate) fn write_fields(&self, w: &mut Writer) {
        self.write_unsigned_fields(w);
        w.put_fixed(&self.payer_sig);
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        let network_id = r.get_u32()?;
        let nonce = r.get_u64()?;
        let chain_name = r.get_str()?;
        let vm_id = Id::new(r.get_fixed()?);
        let n = r.get_u32()? as usize;
        let mut fx_ids = Vec::with_capacity(n);
        for _ in 0..n {
            fx_ids.push(Id::new(r.get_fixed()?));
        }
        Ok(Self {
            network_id,
            nonce,
            chain_name,
            vm_id,
            fx_ids,
            genesis_data: r.get_byte_array()?,
            payer_sig: r.get_fixed::<SIGNATURE_LEN>()?,
        })
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(UNSIGNED_CREATE_CHAIN_TX_TYPE);
        self.write_unsigned_fields(&mut w);
        w.into_bytes()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(CREATE_CHAIN_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    /// The created chain's id.
    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }

    /// The subnet that validates this chain. The wire format predates per-subnet
    /// chains, so every chain is validated by the default subnet.
    pub fn subnet_id(&self) -> Id {
        DEFAULT_SUBNET_ID
    }

    pub fn payer_address(&self) -> Result<ShortId, TransitionError> {
        crypto::recover_address(&self.unsigned_bytes(), &self.payer_sig)
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        if self.network_id != network_id {
            return Err(TransitionError::WrongNetworkId);
        }
        Ok(())
    }
}

/// Creates a subnet, recording its control keys and signing threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSubnetTx {
    pub network_id: u32,
    pub nonce: u64,
    pub control_keys: Vec<ShortId>,
    pub threshold: u16,
    pub payer_sig: Signature,
}

impl CreateSubnetTx {
    fn write_unsigned_fields(&self, w: &mut Writer) {
        w.put_u32(self.network_id);
        w.put_u64(self.nonce);
        w.put_u32(self.control_keys.len() as u32);
        for key in &self.control_keys {
            w.put_fixed(key.as_bytes());
        }
        w.put_u16(self.threshold);
    }

    pub(crate) fn write_fields(&self, w: &mut Writer) {
        self.write_unsigned_fields(w);
        w.put_fixed(&self.payer_sig);
    }

    pub(crate) fn read_fields(r: &mut Reader) -> Result<Self, CodecError> {
        let network_id = r.get_u32()?;
        let nonce = r.get_u64()?;
        let n = r.get_u32()? as usize;
        let mut control_keys = Vec::with_capacity(n);
        for _ in 0..n {
            control_keys.push(ShortId::new(r.get_fixed()?));
        }
        Ok(Self {
            network_id,
            nonce,
            control_keys,
            threshold: r.get_u16()?,
            payer_sig: r.get_fixed::<SIGNATURE_LEN>()?,
        })
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(UNSIGNED_CREATE_SUBNET_TX_TYPE);
        self.write_unsigned_fields(&mut w);
        w.into_bytes()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(CREATE_SUBNET_TX_TYPE);
        self.write_fields(&mut w);
        w.into_bytes()
    }

    /// The created subnet's id.
    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }

    pub fn payer_address(&self) -> Result<ShortId, TransitionError> {
        crypto::recover_address(&self.unsigned_bytes(), &self.payer_sig)
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        if self.network_id != network_id {
            return Err(TransitionError::WrongNetworkId);
        }
        if self.threshold as usize > self.control_keys.len() {
            return Err(TransitionError::ControlThresholdNotMet);
        }
        Ok(())
    }
}

/// A staker event: a transaction ordered in a validator queue by its start or end
/// time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimedTx {
    Validator(AddDefaultSubnetValidatorTx),
    SubnetValidator(AddNonDefaultSubnetValidatorTx),
    Delegator(AddDefaultSubnetDelegatorTx),
}

impl TimedTx {
    pub fn id(&self) -> Id {
        match self {
            TimedTx::Validator(tx) => tx.id(),
            TimedTx::SubnetValidator(tx) => tx.id(),
            TimedTx::Delegator(tx) => tx.id(),
        }
    }

    pub fn node_id(&self) -> ShortId {
        match self {
            TimedTx::Validator(tx) => tx.node_id,
            TimedTx::SubnetValidator(tx) => tx.node_id,
            TimedTx::Delegator(tx) => tx.node_id,
        }
    }

    pub fn weight(&self) -> u64 {
        match self {
            TimedTx::Validator(tx) => tx.weight,
            TimedTx::SubnetValidator(tx) => tx.weight,
            TimedTx::Delegator(tx) => tx.weight,
        }
    }

    pub fn start_time(&self) -> UnixTime {
        match self {
            TimedTx::Validator(tx) => tx.start_time,
            TimedTx::SubnetValidator(tx) => tx.start_time,
            TimedTx::Delegator(tx) => tx.start_time,
        }
    }

    pub fn end_time(&self) -> UnixTime {
        match self {
            TimedTx::Validator(tx) => tx.end_time,
            TimedTx::SubnetValidator(tx) => tx.end_time,
            TimedTx::Delegator(tx) => tx.end_time,
        }
    }

    /// The subnet whose validator queues hold this event.
    pub fn subnet_id(&self) -> Id {
        match self {
            TimedTx::SubnetValidator(tx) => tx.subnet_id,
            _ => DEFAULT_SUBNET_ID,
        }
    }

    /// Where the bond and any reward are returned. Meaningless for subnet
    /// validators, which bond nothing.
    pub fn destination(&self) -> ShortId {
        match self {
            TimedTx::Validator(tx) => tx.destination,
            TimedTx::SubnetValidator(_) => ShortId::EMPTY,
            TimedTx::Delegator(tx) => tx.destination,
        }
    }

    pub fn write(&self, w: &mut Writer) {
        match self {
            TimedTx::Validator(tx) => {
                w.put_u32(ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE);
                tx.write_fields(w);
            }
            TimedTx::SubnetValidator(tx) => {
                w.put_u32(ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE);
                tx.write_fields(w);
            }
            TimedTx::Delegator(tx) => {
                w.put_u32(ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE);
                tx.write_fields(w);
            }
        }
    }

    pub fn read(r: &mut Reader) -> Result<Self, CodecError> {
        let type_id = r.get_u32()?;
        match type_id {
            ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE => Ok(TimedTx::Validator(
                AddDefaultSubnetValidatorTx::read_fields(r)?,
            )),
            ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE => Ok(TimedTx::SubnetValidator(
                AddNonDefaultSubnetValidatorTx::read_fields(r)?,
            )),
            ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE => Ok(TimedTx::Delegator(
                AddDefaultSubnetDelegatorTx::read_fields(r)?,
            )),
            other => Err(CodecError::UnknownType(other)),
        }
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        match self {
            TimedTx::Validator(tx) => tx.syntactic_verify(network_id),
            TimedTx::SubnetValidator(tx) => tx.syntactic_verify(network_id),
            TimedTx::Delegator(tx) => tx.syntactic_verify(network_id),
        }
    }
}

/// A transaction that rides in a proposal block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposalTx {
    Staker(TimedTx),
    AdvanceTime(AdvanceTimeTx),
    RewardValidator(RewardValidatorTx),
}

impl ProposalTx {
    pub fn id(&self) -> Id {
        match self {
            ProposalTx::Staker(tx) => tx.id(),
            ProposalTx::AdvanceTime(tx) => tx.id(),
            ProposalTx::RewardValidator(tx) => tx.id(),
        }
    }

    pub fn write(&self, w: &mut Writer) {
        match self {
            ProposalTx::Staker(tx) => tx.write(w),
            ProposalTx::AdvanceTime(tx) => {
                w.put_u32(ADVANCE_TIME_TX_TYPE);
                tx.write_fields(w);
            }
            ProposalTx::RewardValidator(tx) => {
                w.put_u32(REWARD_VALIDATOR_TX_TYPE);
                tx.write_fields(w);
            }
        }
    }

    pub fn read(r: &mut Reader) -> Result<Self, CodecError> {
        let type_id = r.get_u32()?;
        match type_id {
            ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE => Ok(ProposalTx::Staker(TimedTx::Validator(
                AddDefaultSubnetValidatorTx::read_fields(r)?,
            ))),
            ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE => Ok(ProposalTx::Staker(
                TimedTx::SubnetValidator(AddNonDefaultSubnetValidatorTx::read_fields(r)?),
            )),
            ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE => Ok(ProposalTx::Staker(TimedTx::Delegator(
                AddDefaultSubnetDelegatorTx::read_fields(r)?,
            ))),
            ADVANCE_TIME_TX_TYPE => Ok(ProposalTx::AdvanceTime(AdvanceTimeTx::read_fields(r)?)),
            REWARD_VALIDATOR_TX_TYPE => Ok(ProposalTx::RewardValidator(
                RewardValidatorTx::read_fields(r)?,
            )),
            other => Err(CodecError::UnknownType(other)),
        }
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        match self {
            ProposalTx::Staker(tx) => tx.syntactic_verify(network_id),
            ProposalTx::AdvanceTime(_) | ProposalTx::RewardValidator(_) => Ok(()),
        }
    }

    /// Produces the speculative databases this proposal's commit and abort would
    /// yield, both layered over `parent`.
    pub fn semantic_verify(
        &self,
        ctx: &SemanticContext,
        parent: &Arc<dyn Database>,
    ) -> Result<ProposalOutcome, TransitionError> {
        match self {
            ProposalTx::Staker(TimedTx::Validator(tx)) => {
                staking::add_default_subnet_validator(ctx, parent, tx)
            }
            ProposalTx::Staker(TimedTx::SubnetValidator(tx)) => {
                staking::add_non_default_subnet_validator(ctx, parent, tx)
            }
            ProposalTx::Staker(TimedTx::Delegator(tx)) => {
                staking::add_default_subnet_delegator(ctx, parent, tx)
            }
            ProposalTx::AdvanceTime(tx) => advance_time::advance_time(ctx, parent, tx),
            ProposalTx::RewardValidator(tx) => {
                reward_validator::reward_validator(ctx, parent, tx)
            }
        }
    }
}

/// A transaction that rides in a standard block and is decided by the block's
/// acceptance alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionTx {
    CreateChain(CreateChainTx),
    CreateSubnet(CreateSubnetTx),
}

impl DecisionTx {
    pub fn id(&self) -> Id {
        match self {
            DecisionTx::CreateChain(tx) => tx.id(),
            DecisionTx::CreateSubnet(tx) => tx.id(),
        }
    }

    pub fn write(&self, w: &mut Writer) {
        match self {
            DecisionTx::CreateChain(tx) => {
                w.put_u32(CREATE_CHAIN_TX_TYPE);
                tx.write_fields(w);
            }
            DecisionTx::CreateSubnet(tx) => {
                w.put_u32(CREATE_SUBNET_TX_TYPE);
                tx.write_fields(w);
            }
        }
    }

    pub fn read(r: &mut Reader) -> Result<Self, CodecError> {
        let type_id = r.get_u32()?;
        match type_id {
            CREATE_CHAIN_TX_TYPE => Ok(DecisionTx::CreateChain(CreateChainTx::read_fields(r)?)),
            CREATE_SUBNET_TX_TYPE => Ok(DecisionTx::CreateSubnet(CreateSubnetTx::read_fields(r)?)),
            other => Err(CodecError::UnknownType(other)),
        }
    }

    pub fn syntactic_verify(&self, network_id: u32) -> Result<(), TransitionError> {
        match self {
            DecisionTx::CreateChain(tx) => tx.syntactic_verify(network_id),
            DecisionTx::CreateSubnet(tx) => tx.syntactic_verify(network_id),
        }
    }

    /// Produces the speculative database this transaction's acceptance would
    /// yield, layered over `parent`.
    pub fn semantic_verify(
        &self,
        ctx: &SemanticContext,
        parent: &Arc<dyn Database>,
    ) -> Result<Arc<VersionedStore>, TransitionError> {
        match self {
            DecisionTx::CreateChain(tx) => create_chain::create_chain(ctx, parent, tx),
            DecisionTx::CreateSubnet(tx) => create_subnet::create_subnet(ctx, parent, tx),
        }
    }
}

/// Shared staking-window checks: a staker's period must be well-formed and within
/// the duration bounds.
fn verify_staking_window(start: UnixTime, end: UnixTime) -> Result<(), TransitionError> {
    if start >= end {
        return Err(TransitionError::InvalidStakingPeriod);
    }
    let duration = end - start;
    if !(MINIMUM_STAKING_DURATION..=MAXIMUM_STAKING_DURATION).contains(&duration) {
        return Err(TransitionError::InvalidStakingPeriod);
    }
    Ok(())
}

/// Checks that `sigs` over `unsigned_bytes` satisfy the target subnet's control
/// threshold. The default subnet has no control keys and imposes no threshold.
pub(crate) fn verify_control_threshold(
    db: &Arc<dyn Database>,
    subnet_id: Id,
    unsigned_bytes: &[u8],
    sigs: &[Signature],
) -> Result<(), TransitionError> {
    if subnet_id == DEFAULT_SUBNET_ID {
        return Ok(());
    }
    let subnets = state::get_subnets(db.as_ref())?;
    let subnet = subnets
        .iter()
        .find(|s| s.id() == subnet_id)
        .ok_or(TransitionError::UnknownSubnet)?;

    let mut signers = Vec::with_capacity(sigs.len());
    for sig in sigs {
        let addr = crypto::recover_address(unsigned_bytes, sig)?;
        if !signers.contains(&addr) {
            signers.push(addr);
        }
    }
    let authorized = signers
        .iter()
        .filter(|addr| subnet.control_keys.contains(addr))
        .count();
    if authorized < subnet.threshold as usize {
        return Err(TransitionError::ControlThresholdNotMet);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EMPTY_SIGNATURE;

    fn validator_tx() -> AddDefaultSubnetValidatorTx {
        AddDefaultSubnetValidatorTx {
            node_id: ShortId::new([7u8; 20]),
            weight: MINIMUM_STAKE_AMOUNT,
            start_time: 1_000_000,
            end_time: 1_000_000 + MINIMUM_STAKING_DURATION,
            network_id: 12345,
            nonce: 1,
            destination: ShortId::new([9u8; 20]),
            shares: 120_000,
            sig: EMPTY_SIGNATURE,
        }
    }

    #[test]
    fn timed_tx_round_trips() {
        let tx = TimedTx::Validator(validator_tx());
        let mut w = Writer::new();
        tx.write(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let parsed = TimedTx::read(&mut r).unwrap();
        r.finish().unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.id(), tx.id());
    }

    #[test]
    fn proposal_tx_round_trips() {
        for tx in [
            ProposalTx::AdvanceTime(AdvanceTimeTx { time: 99 }),
            ProposalTx::RewardValidator(RewardValidatorTx {
                tx_id: Id::hash_of(b"staker"),
            }),
            ProposalTx::Staker(TimedTx::Validator(validator_tx())),
        ] {
            let mut w = Writer::new();
            tx.write(&mut w);
            let bytes = w.into_bytes();
            let mut r = Reader::new(&bytes);
            assert_eq!(ProposalTx::read(&mut r).unwrap(), tx);
            r.finish().unwrap();
        }
    }

    #[test]
    fn decision_tx_round_trips() {
        let tx = DecisionTx::CreateSubnet(CreateSubnetTx {
            network_id: 12345,
            nonce: 1,
            control_keys: vec![ShortId::new([1u8; 20]), ShortId::new([2u8; 20])],
            threshold: 1,
            payer_sig: EMPTY_SIGNATURE,
        });
        let mut w = Writer::new();
        tx.write(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(DecisionTx::read(&mut r).unwrap(), tx);
        r.finish().unwrap();
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut w = Writer::new();
        w.put_u32(250);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(TimedTx::read(&mut r), Err(CodecError::UnknownType(250)));
    }

    #[test]
    fn staking_window_bounds_are_enforced() {
        let mut tx = validator_tx();
        tx.end_time = tx.start_time;
        assert_eq!(
            tx.syntactic_verify(12345),
            Err(TransitionError::InvalidStakingPeriod)
        );

        let mut tx = validator_tx();
        tx.end_time = tx.start_time + MAXIMUM_STAKING_DURATION + 1;
        assert_eq!(
            tx.syntactic_verify(12345),
            Err(TransitionError::InvalidStakingPeriod)
        );

        let mut tx = validator_tx();
        tx.weight = MINIMUM_STAKE_AMOUNT - 1;
        assert_eq!(
            tx.syntactic_verify(12345),
            Err(TransitionError::StakeTooSmall)
        );

        let mut tx = validator_tx();
        tx.network_id = 5;
        assert_eq!(
            tx.syntactic_verify(12345),
            Err(TransitionError::WrongNetworkId)
        );

        assert!(validator_tx().syntactic_verify(12345).is_ok());
    }
}
