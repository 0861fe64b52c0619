#![allow(dead_code)]

use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use parking_lot::Mutex;
use secp256k1::SecretKey;

use platform_vm::database::MemDb;
use platform_vm::genesis::{genesis, LOCAL_ID};
use platform_vm::types::Clock;
use platform_vm::vm::{
    ChainManager, ChainParameters, Context, PlatformVm, Validator, ValidatorRegistry,
};
use platform_vm::{Id, Message, ShortId};

/// Start of the local network, as recorded in its genesis blob.
pub const GENESIS_TIME: u64 = 1_572_566_400;

/// End of the genesis validators' staking period.
pub const GENESIS_VALIDATORS_END: u64 = 1_604_102_400;

/// Balance of the pre-funded local-network account.
pub const GENESIS_BALANCE: u64 = 20_000_000_000_000;

/// Address of the pre-funded local-network account.
pub fn genesis_address() -> ShortId {
    ShortId::new([
        0x3c, 0xb7, 0xd3, 0x84, 0x2e, 0x8c, 0xee, 0x6a, 0x0e, 0xbd, 0x09, 0xf1, 0xfe, 0x88, 0x4f,
        0x68, 0x61, 0xe1, 0xb2, 0x9c,
    ])
}

/// The well-known key controlling the pre-funded local-network account.
pub fn funded_key() -> SecretKey {
    let bytes =
        hex::decode("56289e99c94b6912bfc12adc093c9b51124f0dc54ac7a766b2bc5ccf558d8027").unwrap();
    SecretKey::from_slice(&bytes).unwrap()
}

/// Records every chain the VM asks to be spawned.
#[derive(Default)]
pub struct RecordingChainManager {
    pub created: Mutex<Vec<ChainParameters>>,
}

impl ChainManager for RecordingChainManager {
    fn create_chain(&self, params: ChainParameters) {
        self.created.lock().push(params);
    }
}

/// Records the latest validator set published per subnet.
#[derive(Default)]
pub struct RecordingRegistry {
    pub sets: Mutex<Vec<(Id, Vec<Validator>)>>,
}

impl RecordingRegistry {
    pub fn latest(&self, subnet_id: Id) -> Option<Vec<Validator>> {
        self.sets
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| *id == subnet_id)
            .map(|(_, set)| set.clone())
    }
}

impl ValidatorRegistry for RecordingRegistry {
    fn set_validators(&self, subnet_id: Id, validators: Vec<Validator>) {
        self.sets.lock().push((subnet_id, validators));
    }
}

pub struct Fixture {
    pub vm: PlatformVm,
    pub clock: Clock,
    pub msgs: Receiver<Message>,
    pub chain_manager: Arc<RecordingChainManager>,
    pub registry: Arc<RecordingRegistry>,
}

impl Fixture {
    /// Drains the engine channel and reports whether a block-ready notification
    /// arrived.
    pub fn block_ready(&self) -> bool {
        let mut ready = false;
        while let Ok(msg) = self.msgs.try_recv() {
            ready |= msg == Message::PendingTxs;
        }
        ready
    }
}

/// A VM initialized from the local-network genesis, with the clock pinned to
/// genesis time.
pub fn local_vm() -> Fixture {
    let chain_manager = Arc::new(RecordingChainManager::default());
    let registry = Arc::new(RecordingRegistry::default());
    let vm = PlatformVm::new(chain_manager.clone(), registry.clone());

    let clock = Clock::new();
    clock.set_time(GENESIS_TIME);
    let (sender, msgs) = channel();
    vm.initialize(
        Context {
            network_id: LOCAL_ID,
            chain_id: Id::EMPTY,
            clock: clock.clone(),
        },
        Arc::new(MemDb::new()),
        &genesis(LOCAL_ID),
        sender,
        &[],
    )
    .expect("initialize local vm");

    Fixture {
        vm,
        clock,
        msgs,
        chain_manager,
        registry,
    }
}
