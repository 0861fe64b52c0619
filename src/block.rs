/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The platform chain's block family.
//!
//! A proposal block carries one proposal transaction and offers consensus a
//! binary choice, resolved by exactly one of its commit or abort children. A
//! standard block carries a batch of decision transactions applied atomically.
//! Commit and abort blocks carry no payload of their own; they bind to the
//! speculative databases their parent proposal cached at verification.
//!
//! This module defines the block data and wire format. The lifecycle
//! (verify / accept / reject, and the speculative overlays cached per pending
//! block) is driven by the VM, which owns the arena of pending blocks.

use crate::codec::{
    Codec, Reader, Writer, ABORT_BLOCK_TYPE, COMMIT_BLOCK_TYPE, PROPOSAL_BLOCK_TYPE,
    STANDARD_BLOCK_TYPE,
};
use crate::error::CodecError;
use crate::txs::{DecisionTx, ProposalTx};
use crate::types::Id;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockContent {
    Proposal(ProposalTx),
    Commit,
    Abort,
    Standard(Vec<DecisionTx>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub parent_id: Id,
    pub height: u64,
    pub content: BlockContent,
}

impl Block {
    pub fn new_proposal(parent_id: Id, height: u64, tx: ProposalTx) -> Self {
        Self {
            parent_id,
            height,
            content: BlockContent::Proposal(tx),
        }
    }

    pub fn new_commit(parent_id: Id, height: u64) -> Self {
        Self {
            parent_id,
            height,
            content: BlockContent::Commit,
        }
    }

    pub fn new_abort(parent_id: Id, height: u64) -> Self {
        Self {
            parent_id,
            height,
            content: BlockContent::Abort,
        }
    }

    pub fn new_standard(parent_id: Id, height: u64, txs: Vec<DecisionTx>) -> Self {
        Self {
            parent_id,
            height,
            content: BlockContent::Standard(txs),
        }
    }

    /// A decision block's acceptance directly determines a state database.
    /// Proposal blocks instead defer the decision to their commit/abort child.
    pub fn is_decision(&self) -> bool {
        !matches!(self.content, BlockContent::Proposal(_))
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match &self.content {
            BlockContent::Proposal(tx) => {
                w.put_u32(PROPOSAL_BLOCK_TYPE);
                w.put_fixed(self.parent_id.as_bytes());
                w.put_u64(self.height);
                tx.write(&mut w);
            }
            BlockContent::Abort => {
                w.put_u32(ABORT_BLOCK_TYPE);
                w.put_fixed(self.parent_id.as_bytes());
                w.put_u64(self.height);
            }
            BlockContent::Commit => {
                w.put_u32(COMMIT_BLOCK_TYPE);
                w.put_fixed(self.parent_id.as_bytes());
                w.put_u64(self.height);
            }
            BlockContent::Standard(txs) => {
                w.put_u32(STANDARD_BLOCK_TYPE);
                w.put_fixed(self.parent_id.as_bytes());
                w.put_u64(self.height);
                w.put_u32(txs.len() as u32);
                for tx in txs {
                    tx.write(&mut w);
                }
            }
        }
        w.into_bytes()
    }

    pub fn id(&self) -> Id {
        Id::hash_of(&self.bytes())
    }

    pub fn unmarshal(codec: &Codec, bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let type_id = r.get_u32()?;
        codec.ensure_registered(type_id)?;
        let parent_id = Id::new(r.get_fixed()?);
        let height = r.get_u64()?;
        let content = match type_id {
            PROPOSAL_BLOCK_TYPE => BlockContent::Proposal(ProposalTx::read(&mut r)?),
            ABORT_BLOCK_TYPE => BlockContent::Abort,
            COMMIT_BLOCK_TYPE => BlockContent::Commit,
            STANDARD_BLOCK_TYPE => {
                let n = r.get_u32()? as usize;
                let mut txs = Vec::with_capacity(n);
                for _ in 0..n {
                    txs.push(DecisionTx::read(&mut r)?);
                }
                BlockContent::Standard(txs)
            }
            other => return Err(CodecError::UnknownType(other)),
        };
        r.finish()?;
        Ok(Self {
            parent_id,
            height,
            content,
        })
    }
}
