/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Length-prefixed binary serialization driven by a type registry.
//!
//! Every value that can appear in interface position (a block on the wire, a
//! transaction inside a block or a validator heap) is prefixed with a `u32` type
//! tag. Struct fields are emitted in declaration order; vectors as a `u32` count
//! followed by the elements; strings as a `u16` length followed by UTF-8 bytes;
//! byte blobs as a `u32` length followed by the bytes; fixed-size arrays raw;
//! integers big-endian; booleans a single byte.
//!
//! The registry is built exactly once at VM startup; registering a tag twice or
//! decoding an unknown tag fails the operation.

use std::collections::BTreeMap;

use crate::error::CodecError;

// Wire type tags, in the reference registration order. The numbering is part of
// the serialized format and must never change.
pub const PROPOSAL_BLOCK_TYPE: u32 = 0;
pub const ABORT_BLOCK_TYPE: u32 = 1;
pub const COMMIT_BLOCK_TYPE: u32 = 2;
pub const STANDARD_BLOCK_TYPE: u32 = 3;
pub const UNSIGNED_ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE: u32 = 4;
pub const ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE: u32 = 5;
pub const UNSIGNED_ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE: u32 = 6;
pub const ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE: u32 = 7;
pub const UNSIGNED_ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE: u32 = 8;
pub const ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE: u32 = 9;
pub const UNSIGNED_CREATE_CHAIN_TX_TYPE: u32 = 10;
pub const CREATE_CHAIN_TX_TYPE: u32 = 11;
pub const UNSIGNED_CREATE_SUBNET_TX_TYPE: u32 = 12;
pub const CREATE_SUBNET_TX_TYPE: u32 = 13;
pub const ADVANCE_TIME_TX_TYPE: u32 = 14;
pub const REWARD_VALIDATOR_TX_TYPE: u32 = 15;

/// The type registry. Maps a wire tag to the registered type's name.
#[derive(Debug, Default)]
pub struct Codec {
    registered: BTreeMap<u32, &'static str>,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type under `type_id`. Fails on duplicates.
    pub fn register(&mut self, type_id: u32, name: &'static str) -> Result<(), CodecError> {
        if self.registered.insert(type_id, name).is_some() {
            return Err(CodecError::DuplicateType(type_id));
        }
        Ok(())
    }

    /// Fails unless `type_id` names a registered type.
    pub fn ensure_registered(&self, type_id: u32) -> Result<(), CodecError> {
        if self.registered.contains_key(&type_id) {
            Ok(())
        } else {
            Err(CodecError::UnknownType(type_id))
        }
    }
}

/// Builds the registry with every platform-chain block and transaction type.
pub fn default_codec() -> Result<Codec, CodecError> {
    let mut codec = Codec::new();
    codec.register(PROPOSAL_BLOCK_TYPE, "ProposalBlock")?;
    codec.register(ABORT_BLOCK_TYPE, "AbortBlock")?;
    codec.register(COMMIT_BLOCK_TYPE, "CommitBlock")?;
    codec.register(STANDARD_BLOCK_TYPE, "StandardBlock")?;
    codec.register(
        UNSIGNED_ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE,
        "UnsignedAddDefaultSubnetValidatorTx",
    )?;
    codec.register(
        ADD_DEFAULT_SUBNET_VALIDATOR_TX_TYPE,
        "AddDefaultSubnetValidatorTx",
    )?;
    codec.register(
        UNSIGNED_ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE,
        "UnsignedAddNonDefaultSubnetValidatorTx",
    )?;
    codec.register(
        ADD_NON_DEFAULT_SUBNET_VALIDATOR_TX_TYPE,
        "AddNonDefaultSubnetValidatorTx",
    )?;
    codec.register(
        UNSIGNED_ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE,
        "UnsignedAddDefaultSubnetDelegatorTx",
    )?;
    codec.register(
        ADD_DEFAULT_SUBNET_DELEGATOR_TX_TYPE,
        "AddDefaultSubnetDelegatorTx",
    )?;
    codec.register(UNSIGNED_CREATE_CHAIN_TX_TYPE, "UnsignedCreateChainTx")?;
    codec.register(CREATE_CHAIN_TX_TYPE, "CreateChainTx")?;
    codec.register(UNSIGNED_CREATE_SUBNET_TX_TYPE, "UnsignedCreateSubnetTx")?;
    codec.register(CREATE_SUBNET_TX_TYPE, "CreateSubnetTx")?;
    codec.register(ADVANCE_TIME_TX_TYPE, "AdvanceTimeTx")?;
    codec.register(REWARD_VALIDATOR_TX_TYPE, "RewardValidatorTx")?;
    Ok(codec)
}

/// Append-only byte sink for marshaling.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Raw bytes, no length prefix. For fixed-size fields.
    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// A `u16`-length-prefixed UTF-8 string.
    pub fn put_str(&mut self, s: &str) {
        self.put_u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// A `u32`-length-prefixed byte blob.
    pub fn put_byte_array(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor for unmarshaling.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .offset
            .checked_add(n)
            .ok_or(CodecError::LengthOutOfRange)?;
        if end > self.bytes.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    pub fn get_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(u64::from_be_bytes(out))
    }

    pub fn get_fixed<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let b = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }

    pub fn get_str(&mut self) -> Result<String, CodecError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn get_byte_array(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.get_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Fails unless every input byte was consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes)
        }
    }
}
