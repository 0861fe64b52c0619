mod common;

use common::*;
use platform_vm::crypto;
use platform_vm::genesis::LOCAL_ID;
use platform_vm::service::Service;
use platform_vm::txs::staking::new_add_non_default_subnet_validator_tx;
use platform_vm::txs::TimedTx;
use platform_vm::{Id, ShortId, TransitionError, VmError};
use secp256k1::SecretKey;

fn control_key() -> SecretKey {
    SecretKey::from_slice(&[7u8; 32]).unwrap()
}

fn subnet_node() -> ShortId {
    ShortId::new([5u8; 20])
}

/// Creates a subnet controlled by `control_key` with threshold 1 and returns its
/// id.
fn create_subnet(fixture: &Fixture) -> Id {
    let service = Service::new(fixture.vm.clone());
    let subnet_id = service
        .create_subnet(
            1,
            vec![crypto::address_of_secret(&control_key())],
            1,
            LOCAL_ID,
            &funded_key(),
        )
        .unwrap();
    let block = fixture.vm.build_block().unwrap();
    block.verify().unwrap();
    block.accept().unwrap();
    subnet_id
}

fn accept_next_proposal_commit(fixture: &Fixture) {
    let proposal = fixture.vm.build_block().unwrap();
    proposal.verify().unwrap();
    let [commit, abort] = proposal.options().unwrap();
    commit.verify().unwrap();
    abort.verify().unwrap();
    proposal.accept().unwrap();
    commit.accept().unwrap();
    abort.reject().unwrap();
}

#[test]
fn subnet_validators_move_through_both_queues() {
    let fixture = local_vm();
    let subnet_id = create_subnet(&fixture);

    let start = GENESIS_TIME + 3_600;
    let end = start + 24 * 3_600;
    let tx = new_add_non_default_subnet_validator_tx(
        2,
        1,
        start,
        end,
        subnet_node(),
        subnet_id,
        LOCAL_ID,
        &[control_key()],
        &funded_key(),
    );
    fixture
        .vm
        .issue_staker_tx(TimedTx::SubnetValidator(tx))
        .unwrap();
    accept_next_proposal_commit(&fixture);

    let pending = fixture.vm.pending_validators(subnet_id).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.peek().unwrap().node_id(), subnet_node());
    // No stake is bonded for subnet validators.
    assert_eq!(
        fixture.vm.account(genesis_address()).unwrap().balance,
        GENESIS_BALANCE
    );

    // Reaching the start time migrates the staker into the current queue.
    fixture.clock.set_time(start);
    accept_next_proposal_commit(&fixture);
    assert_eq!(fixture.vm.chain_time().unwrap(), start);
    assert!(fixture.vm.pending_validators(subnet_id).unwrap().is_empty());
    assert_eq!(fixture.vm.current_validators(subnet_id).unwrap().len(), 1);
    let published = fixture.registry.latest(subnet_id).unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].node_id, subnet_node());

    // Reaching the end time drops the staker; non-default subnets have no
    // reward step.
    fixture.clock.set_time(end);
    accept_next_proposal_commit(&fixture);
    assert_eq!(fixture.vm.chain_time().unwrap(), end);
    assert!(fixture.vm.current_validators(subnet_id).unwrap().is_empty());
    assert!(fixture.registry.latest(subnet_id).unwrap().is_empty());
}

#[test]
fn missing_control_signatures_fail_the_threshold() {
    let fixture = local_vm();
    let subnet_id = create_subnet(&fixture);

    let start = GENESIS_TIME + 3_600;
    let tx = new_add_non_default_subnet_validator_tx(
        2,
        1,
        start,
        start + 24 * 3_600,
        subnet_node(),
        subnet_id,
        LOCAL_ID,
        &[], // nobody authorized this
        &funded_key(),
    );
    fixture
        .vm
        .issue_staker_tx(TimedTx::SubnetValidator(tx))
        .unwrap();

    let proposal = fixture.vm.build_block().unwrap();
    assert_eq!(
        proposal.verify(),
        Err(VmError::Tx(TransitionError::ControlThresholdNotMet))
    );
}

#[test]
fn unknown_subnets_are_rejected() {
    let fixture = local_vm();
    let start = GENESIS_TIME + 3_600;
    let tx = new_add_non_default_subnet_validator_tx(
        1,
        1,
        start,
        start + 24 * 3_600,
        subnet_node(),
        Id::hash_of(b"no such subnet"),
        LOCAL_ID,
        &[control_key()],
        &funded_key(),
    );
    fixture
        .vm
        .issue_staker_tx(TimedTx::SubnetValidator(tx))
        .unwrap();

    let proposal = fixture.vm.build_block().unwrap();
    assert_eq!(
        proposal.verify(),
        Err(VmError::Tx(TransitionError::UnknownSubnet))
    );
}
