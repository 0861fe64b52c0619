/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Network identities and the genesis state of the platform chain.
//!
//! Since a network has exactly one platform chain, and the platform chain
//! defines the genesis state of the network (who is staking, which chains
//! exist), defining the genesis state of the platform chain is the same as
//! defining the genesis state of the network. The local-network genesis blob is
//! embedded verbatim; its byte layout must never change, because every node
//! derives the same chain ids and aliases from it.

use std::collections::HashMap;

use crate::codec::Reader;
use crate::error::CodecError;
use crate::event_heap::EventHeap;
use crate::state::Account;
use crate::txs::{CreateChainTx, TimedTx};
use crate::types::{Id, UnixTime};

pub const MAINNET_ID: u32 = 1;
pub const TESTNET_ID: u32 = 2;
pub const BOREALIS_ID: u32 = 2;
pub const LOCAL_ID: u32 = 12345;

pub const MAINNET_NAME: &str = "mainnet";
pub const TESTNET_NAME: &str = "testnet";
pub const BOREALIS_NAME: &str = "borealis";
pub const LOCAL_NAME: &str = "local";

/// Ids of the VMs that ship with the network.
pub fn platform_vm_id() -> Id {
    Id::from_ascii("platformvm")
}

pub fn avm_id() -> Id {
    Id::from_ascii("avm")
}

pub fn evm_id() -> Id {
    Id::from_ascii("evm")
}

pub fn spdag_vm_id() -> Id {
    Id::from_ascii("spdagvm")
}

pub fn spchain_vm_id() -> Id {
    Id::from_ascii("spchainvm")
}

pub fn timestamp_vm_id() -> Id {
    Id::from_ascii("timestamp")
}

/// A human readable name for the network with id `network_id`. Ids 1, 2 and
/// 12345 have special names; everything else renders as `network-<id>`.
pub fn network_name(network_id: u32) -> String {
    match network_id {
        MAINNET_ID => MAINNET_NAME.to_owned(),
        BOREALIS_ID => BOREALIS_NAME.to_owned(),
        LOCAL_ID => LOCAL_NAME.to_owned(),
        other => format!("network-{other}"),
    }
}

/// The id of the network with name `network_name`. Accepts the canonical names
/// case-insensitively, a bare decimal, or `network-<decimal>`.
pub fn network_id(network_name: &str) -> Result<u32, NetworkNameError> {
    let name = network_name.to_lowercase();
    match name.as_str() {
        MAINNET_NAME => return Ok(MAINNET_ID),
        TESTNET_NAME => return Ok(TESTNET_ID),
        BOREALIS_NAME => return Ok(BOREALIS_ID),
        LOCAL_NAME => return Ok(LOCAL_ID),
        _ => {}
    }

    let digits = name.strip_prefix("network-").unwrap_or(&name);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return match digits.parse::<u64>() {
            Ok(id) if id <= u32::MAX as u64 => Ok(id as u32),
            _ => Err(NetworkNameError::OutOfRange(network_name.to_owned())),
        };
    }
    Err(NetworkNameError::Unparsable(network_name.to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkNameError {
    #[error("network id {0} is not in [0, 2^32)")]
    OutOfRange(String),

    #[error("failed to parse {0} as a network name")]
    Unparsable(String),
}

/// The genesis state decoded from the blob: the accounts, default-subnet
/// validators and chains that exist at the moment the network starts.
#[derive(Clone, Debug)]
pub struct Genesis {
    pub accounts: Vec<Account>,
    pub validators: EventHeap,
    pub chains: Vec<CreateChainTx>,
    pub timestamp: UnixTime,
}

impl Genesis {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);

        let n = r.get_u32()? as usize;
        let mut accounts = Vec::with_capacity(n);
        for _ in 0..n {
            accounts.push(Account::read(&mut r)?);
        }

        let validators = EventHeap::read(&mut r)?;
        for event in validators.iter() {
            if !matches!(event, TimedTx::Validator(_)) {
                // Genesis stakers are always default-subnet validators.
                return Err(CodecError::UnknownType(u32::MAX));
            }
        }

        let n = r.get_u32()? as usize;
        let mut chains = Vec::with_capacity(n);
        for _ in 0..n {
            chains.push(CreateChainTx::read_fields(&mut r)?);
        }

        let timestamp = r.get_u64()?;
        r.finish()?;
        Ok(Self {
            accounts,
            validators,
            chains,
            timestamp,
        })
    }
}

/// The genesis data of the platform chain, and therefore of the entire network
/// with id `network_id`.
///
/// # Panics
///
/// Only the local network's genesis is wired in so far; any other id panics.
pub fn genesis(network_id: u32) -> Vec<u8> {
    if network_id != LOCAL_ID {
        panic!("unknown network ID provided");
    }
    hex::decode(GENESIS_LOCAL_HEX).expect("embedded genesis blob is valid hex")
}

/// The genesis chain-creation transaction for the chain running `vm_id`, if any.
pub fn vm_genesis(network_id: u32, vm_id: Id) -> Result<Option<CreateChainTx>, CodecError> {
    let parsed = Genesis::parse(&genesis(network_id))?;
    Ok(parsed.chains.into_iter().find(|chain| chain.vm_id == vm_id))
}

/// The default aliases of a network: routing aliases (`vm/…`, `bc/…`), chain
/// aliases keyed by chain id, and VM aliases keyed by VM id.
#[derive(Clone, Debug, Default)]
pub struct Aliases {
    pub general: HashMap<String, Vec<String>>,
    pub chain: HashMap<Id, Vec<String>>,
    pub vm: HashMap<Id, Vec<String>>,
}

/// Builds the default aliases for the network with id `network_id`, deriving the
/// chain aliases from the chains the genesis blob creates.
pub fn aliases(network_id: u32) -> Result<Aliases, CodecError> {
    let mut out = Aliases::default();
    out.general.insert(
        format!("vm/{}", platform_vm_id()),
        vec!["vm/platform".to_owned()],
    );
    out.general
        .insert(format!("vm/{}", avm_id()), vec!["vm/avm".to_owned()]);
    out.general
        .insert(format!("vm/{}", evm_id()), vec!["vm/evm".to_owned()]);
    out.general
        .insert(format!("vm/{}", spdag_vm_id()), vec!["vm/spdag".to_owned()]);
    out.general.insert(
        format!("vm/{}", spchain_vm_id()),
        vec!["vm/spchain".to_owned()],
    );
    out.general.insert(
        format!("vm/{}", timestamp_vm_id()),
        vec!["vm/timestamp".to_owned()],
    );
    out.general.insert(
        format!("bc/{}", Id::EMPTY),
        ["P", "platform", "bc/P", "bc/platform"]
            .map(str::to_owned)
            .to_vec(),
    );
    out.chain
        .insert(Id::EMPTY, ["P", "platform"].map(str::to_owned).to_vec());

    out.vm
        .insert(platform_vm_id(), vec!["platform".to_owned()]);
    out.vm.insert(avm_id(), vec!["avm".to_owned()]);
    out.vm.insert(evm_id(), vec!["evm".to_owned()]);
    out.vm.insert(spdag_vm_id(), vec!["spdag".to_owned()]);
    out.vm.insert(spchain_vm_id(), vec!["spchain".to_owned()]);
    out.vm
        .insert(timestamp_vm_id(), vec!["timestamp".to_owned()]);

    let parsed = Genesis::parse(&genesis(network_id))?;
    for chain in &parsed.chains {
        let chain_id = chain.id();
        let (general, short): (&[&str], &[&str]) = match chain.vm_id {
            id if id == avm_id() => (&["X", "avm", "bc/X", "bc/avm"], &["X", "avm"]),
            id if id == evm_id() => (&["C", "evm", "bc/C", "bc/evm"], &["C", "evm"]),
            id if id == spdag_vm_id() => (&["bc/spdag"], &["spdag"]),
            id if id == spchain_vm_id() => (&["bc/spchain"], &["spchain"]),
            id if id == timestamp_vm_id() => (&["bc/timestamp"], &["timestamp"]),
            _ => continue,
        };
        out.general.insert(
            format!("bc/{chain_id}"),
            general.iter().map(|s| s.to_string()).collect(),
        );
        out.chain
            .insert(chain_id, short.iter().map(|s| s.to_string()).collect());
    }
    Ok(out)
}

const GENESIS_LOCAL_HEX: &str = concat!(
    "000000013cb7d3842e8cee6a0ebd09f1fe884f6861e1b29c0000000000000000",
    "000012309ce54000000000000500000005de31b4d8b22991d51aa6aa1fc733f2",
    "3a851a8c94000012309ce54000000000005dbb7580000000005f9ca900000030",
    "3900000000000000003cb7d3842e8cee6a0ebd09f1fe884f6861e1b29c000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "000000000005aa18d3991cf637aa6c162f5e95cf163f69cd8291000012309ce5",
    "4000000000005dbb7580000000005f9ca9000000303900000000000000003cb7",
    "d3842e8cee6a0ebd09f1fe884f6861e1b29c0000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "000000000000000000000000000000000000000000000000000005e9094f7369",
    "8002fd52c90819b457b9fbc866ab80000012309ce54000000000005dbb758000",
    "0000005f9ca9000000303900000000000000003cb7d3842e8cee6a0ebd09f1fe",
    "884f6861e1b29c00000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000005479f66c8be895830547e70b4b298cafd",
    "433dba6e000012309ce54000000000005dbb7580000000005f9ca90000003039",
    "00000000000000003cb7d3842e8cee6a0ebd09f1fe884f6861e1b29c00000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000005f29bce5f34a74301eb0de716d5194e4a4aea5d7a000012309ce540",
    "00000000005dbb7580000000005f9ca9000000303900000000000000003cb7d3",
    "842e8cee6a0ebd09f1fe884f6861e1b29c000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000005000030390000",
    "000000000000000341564d61766d000000000000000000000000000000000000",
    "000000000000000000000000000001736563703235366b316678000000000000",
    "0000000000000000000000000000000000007c00000001000341564100000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000341564100034156410900000001000000000000000100",
    "000004009fdf42f6e48000000000000000000000000001000000013cb7d3842e",
    "8cee6a0ebd09f1fe884f6861e1b29c0000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000003039000000000000000000084174",
    "68657265756d65766d0000000000000000000000000000000000000000000000",
    "00000000000000000000000002c97b22636f6e666967223a7b22636861696e49",
    "64223a34333131302c22686f6d657374656164426c6f636b223a302c2264616f",
    "466f726b426c6f636b223a302c2264616f466f726b537570706f7274223a7472",
    "75652c22656970313530426c6f636b223a302c2265697031353048617368223a",
    "2230783230383637393961656562656165313335633234366336353032316338",
    "3262346531356132633435313334303939336161636664323735313838363531",
    "346630222c22656970313535426c6f636b223a302c22656970313538426c6f63",
    "6b223a302c2262797a616e7469756d426c6f636b223a302c22636f6e7374616e",
    "74696e6f706c65426c6f636b223a302c2270657465727362757267426c6f636b",
    "223a307d2c226e6f6e6365223a22307830222c2274696d657374616d70223a22",
    "307830222c22657874726144617461223a2230783030222c226761734c696d69",
    "74223a22307835663565313030222c22646966666963756c7479223a22307830",
    "222c226d697848617368223a2230783030303030303030303030303030303030",
    "3030303030303030303030303030303030303030303030303030303030303030",
    "303030303030303030303030303030222c22636f696e62617365223a22307830",
    "3030303030303030303030303030303030303030303030303030303030303030",
    "30303030303030222c22616c6c6f63223a7b2237353161306239366531303432",
    "626565373839343532656362323032353366626134306462653835223a7b2262",
    "616c616e6365223a223078333362326533633966643038303430303030303030",
    "3030227d7d2c226e756d626572223a22307830222c2267617355736564223a22",
    "307830222c22706172656e7448617368223a2230783030303030303030303030",
    "3030303030303030303030303030303030303030303030303030303030303030",
    "303030303030303030303030303030303030303030227d000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000303900000000",
    "00000000001353696d706c6520444147205061796d656e74737370646167766d",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "6000000002000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000100000000000012309ce5400000000000000000",
    "0000000001000000013cb7d3842e8cee6a0ebd09f1fe884f6861e1b29c000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000030390000000000000000001553696d706c6520436861696e20506179",
    "6d656e74737370636861696e766d000000000000000000000000000000000000",
    "00000000000000000000000028000000013cb7d3842e8cee6a0ebd09f1fe884f",
    "6861e1b29c0000000000000000000012309ce540000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000003039000000000000",
    "0000001753696d706c652054696d657374616d702053657276657274696d6573",
    "74616d7000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000005dbb7580",
);
