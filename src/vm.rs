/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The platform chain VM: the leaf state machine driven by a Snowman-style
//! consensus engine.
//!
//! Every entry point serializes on one lock, so accepted blocks form a strict
//! total order and the validator registry observes a serial projection of that
//! order. The one auxiliary thread is the scheduler's timer; its callback
//! re-enters through the same lock.
//!
//! Pending blocks live in an in-memory arena keyed by id. Each verified block
//! caches the speculative overlay(s) its acceptance would commit, plus the chain
//! of not-yet-flushed overlays beneath it; acceptance commits the block's own
//! journal and then walks that chain so the writes cascade down to the base
//! store in order.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::block::{Block, BlockContent};
use crate::codec::{default_codec, Codec};
use crate::database::{Database, VersionedStore};
use crate::error::{BlockError, VmError};
use crate::event_heap::EventHeap;
use crate::genesis::Genesis;
use crate::params::{BATCH_SIZE, DEFAULT_SUBNET_ID, DELTA, MAX_TIME};
use crate::state;
use crate::timer::Timer;
use crate::txs::{
    AdvanceTimeTx, DecisionTx, ProposalTx, RewardValidatorTx, SemanticContext, TimedTx,
};
use crate::types::{Clock, Id, Message, ShortId};

/// The execution context the node hands to the VM.
#[derive(Clone)]
pub struct Context {
    pub network_id: u32,
    pub chain_id: Id,
    pub clock: Clock,
}

/// A feature extension. The platform VM supports none; `initialize` rejects a
/// non-empty list.
#[derive(Clone, Debug)]
pub struct Fx {
    pub id: Id,
}

/// What the chain manager needs to spawn a blockchain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainParameters {
    pub id: Id,
    pub subnet_id: Id,
    pub name: String,
    pub vm_id: Id,
    pub fx_ids: Vec<Id>,
    pub genesis_data: Vec<u8>,
}

/// Told to spawn child blockchains once their creation is accepted. The
/// notification is fire-and-forget: implementations must not call back into the
/// VM from inside it, because the VM lock is held at the call site.
pub trait ChainManager: Send + Sync {
    fn create_chain(&self, params: ChainParameters);
}

/// One entry of a published validator set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validator {
    pub node_id: ShortId,
    pub weight: u64,
}

/// Receives the authoritative validator list per subnet after every acceptance
/// that can change it.
pub trait ValidatorRegistry: Send + Sync {
    fn set_validators(&self, subnet_id: Id, validators: Vec<Validator>);
}

/// Acceptance state of a block the VM knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Processing,
    Accepted,
    Rejected,
}

/// A pending-arena entry: the block plus the speculative state its acceptance
/// would produce.
struct PendingBlock {
    block: Block,
    status: Status,
    /// Proposal blocks: the state if the proposal is committed.
    on_commit: Option<Arc<VersionedStore>>,
    /// Proposal blocks: the state if the proposal is aborted.
    on_abort: Option<Arc<VersionedStore>>,
    /// Decision blocks: the overlay whose commit realizes this block.
    on_accept: Option<Arc<VersionedStore>>,
    /// Overlays of not-yet-flushed ancestors, nearest first. Committed after
    /// `on_accept` so writes cascade to the base store.
    chain_below: Vec<Arc<VersionedStore>>,
}

impl PendingBlock {
    fn verified(&self) -> bool {
        match self.block.content {
            BlockContent::Proposal(_) => self.on_commit.is_some(),
            _ => self.on_accept.is_some(),
        }
    }
}

struct Inner {
    ctx: Context,
    codec: Codec,
    db: Option<Arc<VersionedStore>>,
    msgs: Option<Sender<Message>>,
    chain_manager: Arc<dyn ChainManager>,
    validators: Arc<dyn ValidatorRegistry>,
    preferred: Id,
    last_accepted: Id,
    current_blocks: HashMap<Id, PendingBlock>,
    /// Staker transactions that have not been put into blocks yet.
    unissued_events: EventHeap,
    /// Decision transactions that have not been put into blocks yet.
    unissued_decision_txs: Vec<DecisionTx>,
    timer: Option<Timer>,
}

/// A cheaply clonable handle to the VM. All engine entry points go through it
/// and serialize on the inner lock.
#[derive(Clone)]
pub struct PlatformVm {
    inner: Arc<Mutex<Inner>>,
}

/// An engine-facing view of one block. Lifecycle calls re-enter the VM under
/// its lock.
#[derive(Clone)]
pub struct BlockHandle {
    vm: PlatformVm,
    id: Id,
}

impl PlatformVm {
    /// The chain manager and validator registry must be wired before
    /// [initialize](Self::initialize) is called, as the original deployment does
    /// with its node-level singletons.
    pub fn new(chain_manager: Arc<dyn ChainManager>, validators: Arc<dyn ValidatorRegistry>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                ctx: Context {
                    network_id: 0,
                    chain_id: Id::EMPTY,
                    clock: Clock::new(),
                },
                codec: Codec::new(),
                db: None,
                msgs: None,
                chain_manager,
                validators,
                preferred: Id::EMPTY,
                last_accepted: Id::EMPTY,
                current_blocks: HashMap::new(),
                unissued_events: EventHeap::new(true),
                unissued_decision_txs: Vec::new(),
                timer: None,
            })),
        }
    }

    /// Initializes this blockchain from `genesis_bytes` on a fresh database, or
    /// reopens existing state. `fxs` must be empty.
    pub fn initialize(
        &self,
        ctx: Context,
        db: Arc<dyn Database>,
        genesis_bytes: &[u8],
        msgs: Sender<Message>,
        fxs: &[Fx],
    ) -> Result<(), VmError> {
        if !fxs.is_empty() {
            return Err(VmError::UnsupportedFxs);
        }

        let mut inner = self.inner.lock();
        inner.ctx = ctx;
        inner.codec = default_codec()?;
        let vm_db = Arc::new(VersionedStore::new(db));

        if !state::is_initialized(vm_db.as_ref())? {
            inner.initialize_genesis_state(vm_db.as_ref(), genesis_bytes)?;
            vm_db.commit()?;
        }

        inner.last_accepted = state::get_last_accepted(vm_db.as_ref())?
            .ok_or(VmError::MissingBlock)?;
        inner.preferred = inner.last_accepted;
        inner.db = Some(vm_db);
        inner.msgs = Some(msgs);
        inner.unissued_events = EventHeap::new(true);
        inner.unissued_decision_txs = Vec::new();

        // The timer callback re-enters under the VM lock, exactly like every
        // other entry point.
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        inner.timer = Some(Timer::new(Box::new(move || {
            if let Some(strong) = weak.upgrade() {
                strong.lock().reset_timer();
            }
        })));

        inner.update_all_validators()?;
        inner.announce_existing_chains()?;
        inner.reset_timer();
        Ok(())
    }

    /// Builds the block the scheduler decided is ready. Returns
    /// [VmError::NoPendingBlocks] if nothing is ready; the engine treats that as
    /// a normal signal, not a failure.
    pub fn build_block(&self) -> Result<BlockHandle, VmError> {
        let mut inner = self.inner.lock();
        let block = inner.build_block()?;
        Ok(BlockHandle {
            vm: self.clone(),
            id: block.id(),
        })
    }

    /// Parses a block from bytes. Idempotent: a block that is already known is
    /// returned as the known instance.
    pub fn parse_block(&self, bytes: &[u8]) -> Result<BlockHandle, VmError> {
        let inner = self.inner.lock();
        let block =
            Block::unmarshal(&inner.codec, bytes).map_err(|_| VmError::ParseFailed)?;
        let id = block.id();
        if inner.current_blocks.contains_key(&id) {
            return Ok(BlockHandle {
                vm: self.clone(),
                id,
            });
        }
        let db = inner.vm_db()?;
        if state::get_block_bytes(db.as_ref(), id)?.is_none() {
            state::put_block_bytes(db.as_ref(), id, block.bytes())?;
            db.commit()?;
        }
        Ok(BlockHandle {
            vm: self.clone(),
            id,
        })
    }

    pub fn get_block(&self, id: Id) -> Result<BlockHandle, VmError> {
        let inner = self.inner.lock();
        inner.fetch_block(id)?;
        Ok(BlockHandle {
            vm: self.clone(),
            id,
        })
    }

    /// Switches the speculative head the scheduler and builder work from.
    pub fn set_preference(&self, id: Id) {
        let mut inner = self.inner.lock();
        if inner.preferred != id {
            inner.preferred = id;
            inner.reset_timer();
        }
    }

    pub fn last_accepted(&self) -> Id {
        self.inner.lock().last_accepted
    }

    pub fn preferred(&self) -> Id {
        self.inner.lock().preferred
    }

    /// Buffers a staker transaction for a future proposal block.
    pub fn issue_staker_tx(&self, tx: TimedTx) -> Result<(), VmError> {
        let mut inner = self.inner.lock();
        tx.syntactic_verify(inner.ctx.network_id)?;
        inner.unissued_events.push(tx);
        inner.reset_timer();
        Ok(())
    }

    /// Buffers a decision transaction for a future standard block.
    pub fn issue_decision_tx(&self, tx: DecisionTx) -> Result<(), VmError> {
        let mut inner = self.inner.lock();
        tx.syntactic_verify(inner.ctx.network_id)?;
        inner.unissued_decision_txs.push(tx);
        inner.reset_timer();
        Ok(())
    }

    /// Stops the timer, then releases the database. Speculative overlays of
    /// pending blocks are implicitly dropped; their writes never reached the
    /// base store.
    pub fn shutdown(&self) {
        // Join the timer outside the lock: its callback takes the same lock.
        let timer = self.inner.lock().timer.take();
        if let Some(timer) = timer {
            timer.stop();
        }
        let mut inner = self.inner.lock();
        inner.current_blocks.clear();
        inner.db = None;
        inner.msgs = None;
    }

    /// The chain time of the last accepted state.
    pub fn chain_time(&self) -> Result<crate::types::UnixTime, VmError> {
        let inner = self.inner.lock();
        Ok(state::get_timestamp(inner.vm_db()?.as_ref())?)
    }

    /// An account of the last accepted state.
    pub fn account(&self, address: ShortId) -> Result<state::Account, VmError> {
        let inner = self.inner.lock();
        Ok(state::get_account(inner.vm_db()?.as_ref(), address)?)
    }

    /// The subnets of the last accepted state.
    pub fn subnets(&self) -> Result<Vec<crate::txs::CreateSubnetTx>, VmError> {
        let inner = self.inner.lock();
        Ok(state::get_subnets(inner.vm_db()?.as_ref())?)
    }

    /// The chains of the last accepted state.
    pub fn chains(&self) -> Result<Vec<crate::txs::CreateChainTx>, VmError> {
        let inner = self.inner.lock();
        Ok(state::get_chains(inner.vm_db()?.as_ref())?)
    }

    /// A subnet's current validator queue in the last accepted state.
    pub fn current_validators(&self, subnet_id: Id) -> Result<EventHeap, VmError> {
        let inner = self.inner.lock();
        Ok(state::get_current_validators(
            inner.vm_db()?.as_ref(),
            subnet_id,
        )?)
    }

    /// A subnet's pending validator queue in the last accepted state.
    pub fn pending_validators(&self, subnet_id: Id) -> Result<EventHeap, VmError> {
        let inner = self.inner.lock();
        Ok(state::get_pending_validators(
            inner.vm_db()?.as_ref(),
            subnet_id,
        )?)
    }

    /// Mounts the "platform" API service for this chain instance.
    pub fn create_handlers(
        &self,
    ) -> std::collections::HashMap<String, crate::service::HttpHandler> {
        crate::service::create_handlers(self)
    }

    /// Mounts the static "platform" API service.
    pub fn create_static_handlers(
        &self,
    ) -> std::collections::HashMap<String, crate::service::StaticService> {
        crate::service::create_static_handlers()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

impl BlockHandle {
    pub fn id(&self) -> Id {
        self.id
    }

    pub fn parent_id(&self) -> Result<Id, VmError> {
        self.vm
            .with_inner(|inner| inner.fetch_block(self.id).map(|b| b.parent_id))
    }

    pub fn height(&self) -> Result<u64, VmError> {
        self.vm
            .with_inner(|inner| inner.fetch_block(self.id).map(|b| b.height))
    }

    pub fn bytes(&self) -> Result<Vec<u8>, VmError> {
        self.vm
            .with_inner(|inner| inner.fetch_block(self.id).map(|b| b.bytes()))
    }

    pub fn block(&self) -> Result<Block, VmError> {
        self.vm.with_inner(|inner| inner.fetch_block(self.id))
    }

    pub fn status(&self) -> Status {
        self.vm.with_inner(|inner| inner.status_of(self.id))
    }

    /// A proposal block's two children: the commit block first, the abort block
    /// second. Exactly one of them will ever be accepted.
    pub fn options(&self) -> Result<[BlockHandle; 2], VmError> {
        let (commit, abort) = self
            .vm
            .with_inner(|inner| inner.options_of(self.id))?;
        Ok([
            BlockHandle {
                vm: self.vm.clone(),
                id: commit,
            },
            BlockHandle {
                vm: self.vm.clone(),
                id: abort,
            },
        ])
    }

    /// Recomputes the block's speculative databases against its parent and
    /// caches them for acceptance.
    pub fn verify(&self) -> Result<(), VmError> {
        self.vm.with_inner(|inner| inner.verify_block(self.id))
    }

    /// Commits the block's overlay to the base store and makes it canonical.
    pub fn accept(&self) -> Result<(), VmError> {
        self.vm.with_inner(|inner| inner.accept_block(self.id))
    }

    /// Discards the block's overlay. Its descendants become unverifiable and
    /// will be rejected in turn.
    pub fn reject(&self) -> Result<(), VmError> {
        self.vm.with_inner(|inner| inner.reject_block(self.id))
    }
}

impl Inner {
    fn vm_db(&self) -> Result<Arc<VersionedStore>, VmError> {
        self.db.clone().ok_or(VmError::NotInitialized)
    }

    fn initialize_genesis_state(
        &mut self,
        db: &VersionedStore,
        genesis_bytes: &[u8],
    ) -> Result<(), VmError> {
        let genesis = Genesis::parse(genesis_bytes)?;

        for account in &genesis.accounts {
            state::put_account(db, account)?;
        }
        state::put_current_validators(db, DEFAULT_SUBNET_ID, &genesis.validators)?;
        state::put_pending_validators(db, DEFAULT_SUBNET_ID, &EventHeap::new(true))?;
        state::put_subnets(db, &[])?;

        // Only chains declared for this network are created.
        let mut chains = Vec::new();
        for chain in genesis.chains {
            if chain.network_id == self.ctx.network_id {
                chains.push(chain);
            } else {
                warn!(
                    chain = %chain.chain_name,
                    chain_network = chain.network_id,
                    network = self.ctx.network_id,
                    "dropping genesis chain declared for another network"
                );
            }
        }
        state::put_chains(db, &chains)?;
        state::put_timestamp(db, genesis.timestamp)?;

        // The genesis block is accepted directly rather than through the block
        // lifecycle: it has no parent to derive a speculative database from.
        let genesis_block = Block::new_commit(Id::EMPTY, 0);
        state::put_block_bytes(db, genesis_block.id(), genesis_block.bytes())?;
        state::put_last_accepted(db, genesis_block.id())?;
        state::set_initialized(db)?;
        Ok(())
    }

    /// Announces every chain recorded in state to the chain manager, as on every
    /// startup.
    fn announce_existing_chains(&self) -> Result<(), VmError> {
        let db = self.vm_db()?;
        for chain in state::get_chains(db.as_ref())? {
            self.chain_manager.create_chain(ChainParameters {
                id: chain.id(),
                subnet_id: chain.subnet_id(),
                name: chain.chain_name.clone(),
                vm_id: chain.vm_id,
                fx_ids: chain.fx_ids.clone(),
                genesis_data: chain.genesis_data.clone(),
            });
        }
        Ok(())
    }

    fn fetch_block(&self, id: Id) -> Result<Block, VmError> {
        if let Some(entry) = self.current_blocks.get(&id) {
            return Ok(entry.block.clone());
        }
        let db = self.vm_db()?;
        match state::get_block_bytes(db.as_ref(), id)? {
            Some(bytes) => Ok(Block::unmarshal(&self.codec, &bytes)?),
            None => Err(VmError::MissingBlock),
        }
    }

    fn status_of(&self, id: Id) -> Status {
        if let Some(entry) = self.current_blocks.get(&id) {
            return entry.status;
        }
        if id == self.last_accepted {
            return Status::Accepted;
        }
        Status::Processing
    }

    /// The database a child of `parent_id` builds on, plus the overlays beneath
    /// it that have not reached the base store yet.
    #[allow(clippy::type_complexity)]
    fn parent_context(
        &self,
        parent_id: Id,
    ) -> Result<(Arc<dyn Database>, Vec<Arc<VersionedStore>>), VmError> {
        if let Some(entry) = self.current_blocks.get(&parent_id) {
            if matches!(entry.block.content, BlockContent::Proposal(_)) {
                return Err(BlockError::NotADecisionParent.into());
            }
            let overlay = entry
                .on_accept
                .clone()
                .ok_or(VmError::Block(BlockError::MissingParent))?;
            let mut chain = vec![overlay.clone()];
            chain.extend(entry.chain_below.iter().cloned());
            return Ok((overlay as Arc<dyn Database>, chain));
        }
        if parent_id == self.last_accepted {
            let db = self.vm_db()?;
            return Ok((db as Arc<dyn Database>, Vec::new()));
        }
        Err(BlockError::MissingParent.into())
    }

    fn verify_block(&mut self, id: Id) -> Result<(), VmError> {
        if let Some(entry) = self.current_blocks.get(&id) {
            match entry.status {
                Status::Rejected => return Err(BlockError::MissingParent.into()),
                _ if entry.verified() => return Ok(()),
                _ => {}
            }
        }

        let block = self.fetch_block(id)?;
        let parent = self.fetch_block(block.parent_id).map_err(|_| {
            debug!(block = %id, "block's parent is unknown");
            VmError::Block(BlockError::MissingParent)
        })?;
        if block.height != parent.height.saturating_add(1) {
            return Err(BlockError::WrongHeight.into());
        }

        let entry = match &block.content {
            BlockContent::Proposal(tx) => {
                tx.syntactic_verify(self.ctx.network_id)
                    .map_err(VmError::Tx)?;
                let (parent_db, chain_below) = self.parent_context(block.parent_id)?;
                let sem = SemanticContext {
                    network_id: self.ctx.network_id,
                    clock: &self.ctx.clock,
                };
                let outcome = tx.semantic_verify(&sem, &parent_db)?;
                PendingBlock {
                    block: block.clone(),
                    status: Status::Processing,
                    on_commit: Some(outcome.on_commit),
                    on_abort: Some(outcome.on_abort),
                    on_accept: None,
                    chain_below,
                }
            }
            BlockContent::Standard(txs) => {
                let (parent_db, chain_below) = self.parent_context(block.parent_id)?;
                let sem = SemanticContext {
                    network_id: self.ctx.network_id,
                    clock: &self.ctx.clock,
                };
                // The batch applies atomically: each transaction sees its
                // predecessors' writes, and the whole batch folds into one
                // overlay over the parent.
                let mut overlays: Vec<Arc<VersionedStore>> = Vec::with_capacity(txs.len());
                let mut head: Arc<dyn Database> = parent_db;
                for tx in txs {
                    tx.syntactic_verify(self.ctx.network_id)
                        .map_err(VmError::Tx)?;
                    let overlay = tx.semantic_verify(&sem, &head)?;
                    head = overlay.clone() as Arc<dyn Database>;
                    overlays.push(overlay);
                }
                let on_accept = match overlays.first().cloned() {
                    Some(first) => {
                        for overlay in overlays.iter().skip(1).rev() {
                            overlay.commit().map_err(VmError::Db)?;
                        }
                        first
                    }
                    // An empty batch still needs an overlay to accept through.
                    None => Arc::new(VersionedStore::new(
                        self.parent_context(block.parent_id)?.0,
                    )),
                };
                PendingBlock {
                    block: block.clone(),
                    status: Status::Processing,
                    on_commit: None,
                    on_abort: None,
                    on_accept: Some(on_accept),
                    chain_below,
                }
            }
            BlockContent::Commit | BlockContent::Abort => {
                let parent_entry = self
                    .current_blocks
                    .get(&block.parent_id)
                    .ok_or(VmError::Block(BlockError::OrphanedOption))?;
                if !matches!(parent_entry.block.content, BlockContent::Proposal(_)) {
                    return Err(BlockError::OrphanedOption.into());
                }
                let bound = if matches!(block.content, BlockContent::Commit) {
                    parent_entry.on_commit.clone()
                } else {
                    parent_entry.on_abort.clone()
                };
                let on_accept = bound.ok_or(VmError::Block(BlockError::OrphanedOption))?;
                PendingBlock {
                    block: block.clone(),
                    status: Status::Processing,
                    on_commit: None,
                    on_abort: None,
                    on_accept: Some(on_accept),
                    chain_below: parent_entry.chain_below.clone(),
                }
            }
        };

        self.current_blocks.insert(id, entry);
        Ok(())
    }

    fn accept_block(&mut self, id: Id) -> Result<(), VmError> {
        let entry = self
            .current_blocks
            .get(&id)
            .ok_or(VmError::MissingBlock)?;
        if !entry.verified() {
            return Err(VmError::Block(BlockError::MissingParent));
        }
        let block = entry.block.clone();
        debug!(block = %id, height = block.height, "accepting block");

        match &block.content {
            BlockContent::Proposal(_) => {
                // The proposal itself decides nothing; state commits when its
                // commit or abort child is accepted.
                if let Some(entry) = self.current_blocks.get_mut(&id) {
                    entry.status = Status::Accepted;
                }
                self.last_accepted = id;
                let db = self.vm_db()?;
                state::put_last_accepted(db.as_ref(), id)?;
                db.commit()?;
            }
            BlockContent::Commit | BlockContent::Abort => {
                self.commit_overlays(id)?;
                self.finalize_accept(id)?;
                // The resolved proposal leaves the arena with its option.
                self.current_blocks.remove(&block.parent_id);
                self.current_blocks.remove(&id);
                self.update_all_validators()?;
                self.reset_timer();
            }
            BlockContent::Standard(txs) => {
                self.commit_overlays(id)?;
                self.finalize_accept(id)?;
                self.current_blocks.remove(&id);
                for tx in txs {
                    if let DecisionTx::CreateChain(chain) = tx {
                        self.chain_manager.create_chain(ChainParameters {
                            id: chain.id(),
                            subnet_id: chain.subnet_id(),
                            name: chain.chain_name.clone(),
                            vm_id: chain.vm_id,
                            fx_ids: chain.fx_ids.clone(),
                            genesis_data: chain.genesis_data.clone(),
                        });
                    }
                }
                self.update_all_validators()?;
                self.reset_timer();
            }
        }
        Ok(())
    }

    /// Commits the block's overlay and every stale ancestor overlay beneath it,
    /// in order, then flushes the VM's own journal to the provided store.
    fn commit_overlays(&mut self, id: Id) -> Result<(), VmError> {
        let entry = self
            .current_blocks
            .get(&id)
            .ok_or(VmError::MissingBlock)?;
        let on_accept = entry
            .on_accept
            .clone()
            .ok_or(VmError::Block(BlockError::MissingParent))?;
        let chain_below = entry.chain_below.clone();

        on_accept.commit()?;
        for overlay in &chain_below {
            overlay.commit()?;
        }
        self.vm_db()?.commit()?;
        Ok(())
    }

    fn finalize_accept(&mut self, id: Id) -> Result<(), VmError> {
        self.last_accepted = id;
        self.preferred = id;
        let db = self.vm_db()?;
        state::put_last_accepted(db.as_ref(), id)?;
        db.commit()?;
        Ok(())
    }

    fn reject_block(&mut self, id: Id) -> Result<(), VmError> {
        debug!(block = %id, "rejecting block");
        if let Some(entry) = self.current_blocks.get_mut(&id) {
            entry.status = Status::Rejected;
            if let Some(overlay) = entry.on_commit.take() {
                overlay.abandon();
            }
            if let Some(overlay) = entry.on_abort.take() {
                overlay.abandon();
            }
            if let Some(overlay) = entry.on_accept.take() {
                overlay.abandon();
            }
            entry.chain_below.clear();
        }
        Ok(())
    }

    fn build_block(&mut self) -> Result<Block, VmError> {
        debug!("in build_block");
        let preferred = self.preferred;

        // If there are pending decision txs, build a standard block with a batch
        // of them.
        if !self.unissued_decision_txs.is_empty() {
            let n = BATCH_SIZE.min(self.unissued_decision_txs.len());
            let txs: Vec<DecisionTx> = self.unissued_decision_txs.drain(..n).collect();
            let parent = self.fetch_block(preferred)?;
            let block = Block::new_standard(preferred, parent.height + 1, txs);
            let id = block.id();
            state::put_block_bytes(self.vm_db()?.as_ref(), id, block.bytes())?;
            if let Err(e) = self.verify_block(id) {
                debug!(error = %e, "dropping just-built standard block");
                state::delete_block_bytes(self.vm_db()?.as_ref(), id)?;
                self.reset_timer();
                return Err(e);
            }
            self.vm_db()?.commit()?;
            return Ok(block);
        }

        // The chain state if the preferred block were to be accepted.
        let (db, _) = self.parent_context(preferred)?;
        let chain_time = state::get_timestamp(db.as_ref())?;
        if chain_time >= MAX_TIME {
            return Err(VmError::EndOfTime);
        }

        // If chain time is the moment the next default-subnet validator leaves,
        // propose removing it and paying (or forfeiting) its reward.
        let current = state::get_current_validators(db.as_ref(), DEFAULT_SUBNET_ID)?;
        if let Some(head) = current.peek() {
            if chain_time == head.end_time() {
                let tx = RewardValidatorTx { tx_id: head.id() };
                return self.issue_proposal_block(preferred, ProposalTx::RewardValidator(tx));
            }
        }

        // If local time has reached the next validator set change, propose
        // moving chain time forward to it.
        let next_start = state::next_validator_change_time(db.as_ref(), true)?;
        let next_end = state::next_validator_change_time(db.as_ref(), false)?;
        let next_change = next_start.min(next_end);
        let local_time = self.ctx.clock.time();
        if local_time >= next_change {
            let tx = AdvanceTimeTx { time: next_change };
            return self.issue_proposal_block(preferred, ProposalTx::AdvanceTime(tx));
        }

        // Propose adding a new staker, provided its start time still clears the
        // synchrony bound; stale ones are dropped.
        let sync_time = local_time.saturating_add(DELTA);
        while let Some(event) = self.unissued_events.pop() {
            if sync_time <= event.start_time() {
                return self.issue_proposal_block(preferred, ProposalTx::Staker(event));
            }
            debug!("dropping staker tx; its start time has passed");
        }

        debug!("build_block returning: no pending blocks");
        Err(VmError::NoPendingBlocks)
    }

    /// Creates and persists the commit and abort children of a proposal block.
    fn options_of(&mut self, id: Id) -> Result<(Id, Id), VmError> {
        let block = self.fetch_block(id)?;
        if !matches!(block.content, BlockContent::Proposal(_)) {
            return Err(BlockError::OrphanedOption.into());
        }
        let commit = Block::new_commit(id, block.height + 1);
        let abort = Block::new_abort(id, block.height + 1);
        let db = self.vm_db()?;
        state::put_block_bytes(db.as_ref(), commit.id(), commit.bytes())?;
        state::put_block_bytes(db.as_ref(), abort.id(), abort.bytes())?;
        db.commit()?;
        Ok((commit.id(), abort.id()))
    }

    /// Persists a freshly built proposal block. Verification happens when the
    /// engine asks for it.
    fn issue_proposal_block(&mut self, parent_id: Id, tx: ProposalTx) -> Result<Block, VmError> {
        let parent = self.fetch_block(parent_id)?;
        let block = Block::new_proposal(parent_id, parent.height + 1, tx);
        let db = self.vm_db()?;
        state::put_block_bytes(db.as_ref(), block.id(), block.bytes())?;
        db.commit()?;
        Ok(block)
    }

    /// The scheduler: decides whether a block is ready, and if not, when to wake
    /// up next. Runs on every preference change, every acceptance, every issued
    /// transaction, and every timer firing.
    fn reset_timer(&mut self) {
        if self.db.is_none() {
            return;
        }

        // A pending decision tx always makes a block.
        if !self.unissued_decision_txs.is_empty() {
            self.notify_block_ready();
            return;
        }

        let db = match self.parent_context(self.preferred) {
            Ok((db, _)) => db,
            Err(e) => {
                error!(error = %e, "the preferred block should always be a decision block");
                return;
            }
        };
        let chain_time = match state::get_timestamp(db.as_ref()) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "could not read the chain time");
                return;
            }
        };
        if chain_time >= MAX_TIME {
            error!("program time is suspiciously far in the future");
            return;
        }

        // A default-subnet validator leaves exactly at chain time: a reward
        // proposal is ready.
        match state::next_subnet_validator_change_time(db.as_ref(), DEFAULT_SUBNET_ID, false) {
            Ok(end) if chain_time == end => {
                self.notify_block_ready();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "could not read the current validator queue");
                return;
            }
        }

        let (next_start, next_end) = match (
            state::next_validator_change_time(db.as_ref(), true),
            state::next_validator_change_time(db.as_ref(), false),
        ) {
            (Ok(s), Ok(e)) => (s, e),
            _ => {
                error!("could not read the validator queues");
                return;
            }
        };
        let next_change = next_start.min(next_end);
        let local_time = self.ctx.clock.time();

        // Local time has caught up with the next validator change: an
        // advance-time proposal is ready.
        if local_time >= next_change {
            self.notify_block_ready();
            return;
        }

        // A buffered staker far enough in the future can be proposed right away;
        // stale ones can never be included and are dropped.
        let sync_time = local_time.saturating_add(DELTA);
        while let Some(head) = self.unissued_events.peek() {
            if sync_time <= head.start_time() {
                self.notify_block_ready();
                return;
            }
            self.unissued_events.pop();
            debug!("dropping staker tx; its start time has passed");
        }

        if next_change == MAX_TIME {
            // Nothing scheduled; sleep until a transaction arrives.
            return;
        }
        let wait = next_change - local_time;
        info!(seconds = wait, "next scheduled validator change");
        if let Some(timer) = &self.timer {
            timer.set_timeout_in(Duration::from_secs(wait));
        }
    }

    fn notify_block_ready(&self) {
        if let Some(msgs) = &self.msgs {
            if msgs.send(Message::PendingTxs).is_err() {
                warn!("dropping message to consensus engine");
            }
        }
    }

    /// Publishes the current validator set of every subnet to the registry.
    fn update_all_validators(&self) -> Result<(), VmError> {
        let db = self.vm_db()?;
        for subnet_id in state::subnet_ids(db.as_ref())? {
            let current = state::get_current_validators(db.as_ref(), subnet_id)?;
            self.validators
                .set_validators(subnet_id, aggregate_validators(&current));
        }
        Ok(())
    }
}

/// Collapses a validator queue into per-node weights; repeat node ids sum their
/// weights, saturating.
fn aggregate_validators(heap: &EventHeap) -> Vec<Validator> {
    let mut out: Vec<Validator> = Vec::with_capacity(heap.len());
    for event in heap.iter() {
        match out.iter_mut().find(|v| v.node_id == event.node_id()) {
            Some(v) => v.weight = v.weight.saturating_add(event.weight()),
            None => out.push(Validator {
                node_id: event.node_id(),
                weight: event.weight(),
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_sums_repeat_nodes() {
        use crate::crypto::EMPTY_SIGNATURE;
        use crate::params::{MINIMUM_STAKE_AMOUNT, MINIMUM_STAKING_DURATION};
        use crate::txs::AddDefaultSubnetValidatorTx;

        let node = ShortId::new([1u8; 20]);
        let mut heap = EventHeap::new(false);
        for nonce in 1..=2u64 {
            heap.push(TimedTx::Validator(AddDefaultSubnetValidatorTx {
                node_id: node,
                weight: MINIMUM_STAKE_AMOUNT,
                start_time: 0,
                end_time: MINIMUM_STAKING_DURATION,
                network_id: 12345,
                nonce,
                destination: node,
                shares: 0,
                sig: EMPTY_SIGNATURE,
            }));
        }
        let set = aggregate_validators(&heap);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].weight, 2 * MINIMUM_STAKE_AMOUNT);
    }
}
