mod common;

use common::*;
use platform_vm::block::BlockContent;
use platform_vm::genesis::LOCAL_ID;
use platform_vm::service::Service;
use platform_vm::{Id, ShortId, Status, VmError};

#[test]
fn initialization_announces_genesis_chains_and_validators() {
    let fixture = local_vm();

    let created = fixture.chain_manager.created.lock();
    assert_eq!(created.len(), 5);
    assert!(created.iter().any(|c| c.name == "AVM"));
    assert!(created.iter().any(|c| c.name == "Athereum"));

    let set = fixture
        .registry
        .latest(platform_vm::params::DEFAULT_SUBNET_ID)
        .expect("default subnet published");
    assert_eq!(set.len(), 5);
    assert!(set.iter().all(|v| v.weight == GENESIS_BALANCE));
}

#[test]
fn created_subnets_become_queryable_after_acceptance() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    let control_key = ShortId::new([8u8; 20]);
    let subnet_id = service
        .create_subnet(1, vec![control_key], 1, LOCAL_ID, &funded_key())
        .unwrap();
    assert!(fixture.block_ready());

    let block = fixture.vm.build_block().unwrap();
    assert!(matches!(
        block.block().unwrap().content,
        BlockContent::Standard(_)
    ));
    block.verify().unwrap();
    block.accept().unwrap();

    let subnets = fixture.vm.subnets().unwrap();
    assert_eq!(subnets.len(), 1);
    assert_eq!(subnets[0].id(), subnet_id);
    assert_eq!(subnets[0].threshold, 1);
    assert_eq!(fixture.vm.account(genesis_address()).unwrap().nonce, 1);
}

#[test]
fn duplicate_subnet_creation_is_rejected() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    let control_key = ShortId::new([8u8; 20]);
    service
        .create_subnet(1, vec![control_key], 1, LOCAL_ID, &funded_key())
        .unwrap();
    let block = fixture.vm.build_block().unwrap();
    block.verify().unwrap();
    block.accept().unwrap();

    // The same signed payload again: same subnet id, and a stale nonce.
    service
        .create_subnet(1, vec![control_key], 1, LOCAL_ID, &funded_key())
        .unwrap();
    assert!(fixture.vm.build_block().is_err());
}

#[test]
fn accepted_chain_creation_notifies_the_chain_manager() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    let chain_id = service
        .create_blockchain(
            1,
            "Custom Chain".to_owned(),
            Id::from_ascii("timestamp"),
            vec![],
            b"custom genesis".to_vec(),
            LOCAL_ID,
            &funded_key(),
        )
        .unwrap();

    let block = fixture.vm.build_block().unwrap();
    block.verify().unwrap();
    block.accept().unwrap();

    let created = fixture.chain_manager.created.lock();
    let ours = created
        .iter()
        .find(|c| c.id == chain_id)
        .expect("chain manager told about the new chain");
    assert_eq!(ours.name, "Custom Chain");
    assert_eq!(ours.genesis_data, b"custom genesis");
    assert_eq!(fixture.vm.chains().unwrap().len(), 6);
}

#[test]
fn rejected_standard_blocks_change_nothing() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    service
        .create_subnet(1, vec![ShortId::new([8u8; 20])], 1, LOCAL_ID, &funded_key())
        .unwrap();

    let block = fixture.vm.build_block().unwrap();
    block.verify().unwrap();
    block.reject().unwrap();

    assert_eq!(block.status(), Status::Rejected);
    assert!(fixture.vm.subnets().unwrap().is_empty());
    assert_eq!(fixture.vm.account(genesis_address()).unwrap().nonce, 0);
}

#[test]
fn parse_block_is_idempotent() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    service
        .create_subnet(1, vec![ShortId::new([8u8; 20])], 1, LOCAL_ID, &funded_key())
        .unwrap();

    let built = fixture.vm.build_block().unwrap();
    let bytes = built.bytes().unwrap();
    let reparsed = fixture.vm.parse_block(&bytes).unwrap();
    assert_eq!(reparsed.id(), built.id());
    let again = fixture.vm.parse_block(&bytes).unwrap();
    assert_eq!(again.id(), built.id());
}

#[test]
fn build_block_with_nothing_pending_signals_no_blocks() {
    let fixture = local_vm();
    assert!(matches!(
        fixture.vm.build_block(),
        Err(VmError::NoPendingBlocks)
    ));
}

#[test]
fn feature_extensions_are_unsupported() {
    use platform_vm::database::MemDb;
    use platform_vm::genesis::genesis;
    use platform_vm::vm::{Context, Fx, PlatformVm};
    use platform_vm::Clock;
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    let fixture = local_vm();
    let vm = PlatformVm::new(fixture.chain_manager.clone(), fixture.registry.clone());
    let (sender, _receiver) = channel();
    let result = vm.initialize(
        Context {
            network_id: LOCAL_ID,
            chain_id: Id::EMPTY,
            clock: Clock::new(),
        },
        Arc::new(MemDb::new()),
        &genesis(LOCAL_ID),
        sender,
        &[Fx { id: Id::EMPTY }],
    );
    assert!(matches!(result, Err(VmError::UnsupportedFxs)));
}

#[test]
fn reopening_the_database_preserves_state() {
    use platform_vm::database::MemDb;
    use platform_vm::genesis::genesis;
    use platform_vm::vm::{Context, PlatformVm};
    use platform_vm::Clock;
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    let db = Arc::new(MemDb::new());
    let chain_manager = Arc::new(RecordingChainManager::default());
    let registry = Arc::new(RecordingRegistry::default());
    let clock = Clock::new();
    clock.set_time(GENESIS_TIME);

    let vm = PlatformVm::new(chain_manager.clone(), registry.clone());
    let (sender, _r) = channel();
    vm.initialize(
        Context {
            network_id: LOCAL_ID,
            chain_id: Id::EMPTY,
            clock: clock.clone(),
        },
        db.clone(),
        &genesis(LOCAL_ID),
        sender,
        &[],
    )
    .unwrap();
    let last_accepted = vm.last_accepted();
    vm.shutdown();

    // Reopen over the same bytes: genesis must not be re-applied, and the
    // accepted head must survive.
    let vm2 = PlatformVm::new(chain_manager.clone(), registry);
    let (sender, _r) = channel();
    vm2.initialize(
        Context {
            network_id: LOCAL_ID,
            chain_id: Id::EMPTY,
            clock,
        },
        db,
        &genesis(LOCAL_ID),
        sender,
        &[],
    )
    .unwrap();
    assert_eq!(vm2.last_accepted(), last_accepted);
    assert_eq!(vm2.chain_time().unwrap(), GENESIS_TIME);
    // Chains are announced again on every startup: 5 at first boot, 5 more now.
    assert_eq!(chain_manager.created.lock().len(), 10);
}
