mod common;

use common::*;
use platform_vm::block::BlockContent;
use platform_vm::crypto;
use platform_vm::params::{DEFAULT_SUBNET_ID, MINIMUM_STAKE_AMOUNT};
use platform_vm::service::Service;
use platform_vm::txs::ProposalTx;
use platform_vm::{BlockHandle, ShortId, TransitionError, VmError};

fn staker_node() -> ShortId {
    ShortId::new([42u8; 20])
}

/// Issues the scenario staker (start = T+1h, end = T+25h, minimum stake) and
/// returns the built proposal block with its two options.
fn build_staker_proposal(fixture: &Fixture) -> (BlockHandle, BlockHandle, BlockHandle) {
    let service = Service::new(fixture.vm.clone());
    service
        .add_default_subnet_validator(
            1,
            MINIMUM_STAKE_AMOUNT,
            GENESIS_TIME + 3_600,
            GENESIS_TIME + 25 * 3_600,
            staker_node(),
            genesis_address(),
            120_000,
            platform_vm::genesis::LOCAL_ID,
            &funded_key(),
        )
        .unwrap();
    assert!(fixture.block_ready(), "scheduler should signal a block");

    let proposal = fixture.vm.build_block().unwrap();
    assert!(matches!(
        proposal.block().unwrap().content,
        BlockContent::Proposal(ProposalTx::Staker(_))
    ));
    proposal.verify().unwrap();
    let [commit, abort] = proposal.options().unwrap();
    commit.verify().unwrap();
    abort.verify().unwrap();
    proposal.accept().unwrap();
    (proposal, commit, abort)
}

#[test]
fn funded_key_controls_the_genesis_account() {
    assert_eq!(crypto::address_of_secret(&funded_key()), genesis_address());
}

#[test]
fn committed_validator_addition_bonds_the_stake() {
    let fixture = local_vm();
    let (_, commit, abort) = build_staker_proposal(&fixture);

    commit.accept().unwrap();
    abort.reject().unwrap();

    let pending = fixture
        .vm
        .pending_validators(DEFAULT_SUBNET_ID)
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.peek().unwrap().node_id(), staker_node());

    let account = fixture.vm.account(genesis_address()).unwrap();
    assert_eq!(account.balance, GENESIS_BALANCE - MINIMUM_STAKE_AMOUNT);
    assert_eq!(account.nonce, 1);
}

#[test]
fn aborted_validator_addition_leaves_state_unchanged() {
    let fixture = local_vm();
    let (_, commit, abort) = build_staker_proposal(&fixture);

    abort.accept().unwrap();
    commit.reject().unwrap();

    assert!(fixture
        .vm
        .pending_validators(DEFAULT_SUBNET_ID)
        .unwrap()
        .is_empty());
    let account = fixture.vm.account(genesis_address()).unwrap();
    assert_eq!(account.balance, GENESIS_BALANCE);
    assert_eq!(account.nonce, 0);
}

#[test]
fn stakers_inside_the_synchrony_bound_are_dropped() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    // Start time only 5 seconds ahead of the wall clock: inside Δ, can never be
    // included.
    service
        .add_default_subnet_validator(
            1,
            MINIMUM_STAKE_AMOUNT,
            GENESIS_TIME + 5,
            GENESIS_TIME + 5 + 25 * 3_600,
            staker_node(),
            genesis_address(),
            0,
            platform_vm::genesis::LOCAL_ID,
            &funded_key(),
        )
        .unwrap();

    assert!(!fixture.block_ready());
    assert!(matches!(
        fixture.vm.build_block(),
        Err(VmError::NoPendingBlocks)
    ));
}

#[test]
fn stakers_inside_the_synchrony_bound_fail_verification() {
    use platform_vm::block::Block;
    use platform_vm::txs::staking::new_add_default_subnet_validator_tx;
    use platform_vm::txs::TimedTx;

    let fixture = local_vm();
    // A proposal whose staker starts inside chain time + Δ must never verify,
    // no matter how it reached this node.
    let tx = new_add_default_subnet_validator_tx(
        1,
        MINIMUM_STAKE_AMOUNT,
        GENESIS_TIME + 5,
        GENESIS_TIME + 5 + 25 * 3_600,
        staker_node(),
        genesis_address(),
        0,
        platform_vm::genesis::LOCAL_ID,
        &funded_key(),
    );
    let block = Block::new_proposal(
        fixture.vm.last_accepted(),
        1,
        ProposalTx::Staker(TimedTx::Validator(tx)),
    );
    let handle = fixture.vm.parse_block(&block.bytes()).unwrap();
    assert_eq!(
        handle.verify(),
        Err(VmError::Tx(TransitionError::StartTimeTooSoon))
    );
}

#[test]
fn overlapping_validation_is_rejected_at_verification() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    // Same node as a genesis validator, and a window inside its current
    // validation period.
    let genesis_node = fixture
        .vm
        .current_validators(DEFAULT_SUBNET_ID)
        .unwrap()
        .peek()
        .unwrap()
        .node_id();
    service
        .add_default_subnet_validator(
            1,
            MINIMUM_STAKE_AMOUNT,
            GENESIS_TIME + 3_600,
            GENESIS_TIME + 25 * 3_600,
            genesis_node,
            genesis_address(),
            0,
            platform_vm::genesis::LOCAL_ID,
            &funded_key(),
        )
        .unwrap();
    assert!(fixture.block_ready());

    let proposal = fixture.vm.build_block().unwrap();
    assert_eq!(
        proposal.verify(),
        Err(VmError::Tx(TransitionError::OverlappingValidation))
    );
}

#[test]
fn wrong_nonce_is_rejected_at_verification() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    service
        .add_default_subnet_validator(
            7, // the account is at nonce 0; only nonce 1 can spend
            MINIMUM_STAKE_AMOUNT,
            GENESIS_TIME + 3_600,
            GENESIS_TIME + 25 * 3_600,
            staker_node(),
            genesis_address(),
            0,
            platform_vm::genesis::LOCAL_ID,
            &funded_key(),
        )
        .unwrap();

    let proposal = fixture.vm.build_block().unwrap();
    assert_eq!(
        proposal.verify(),
        Err(VmError::Tx(TransitionError::WrongNonce))
    );
}

#[test]
fn delegation_requires_a_covering_validator() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    // No validator for this node at all.
    service
        .add_default_subnet_delegator(
            1,
            MINIMUM_STAKE_AMOUNT,
            GENESIS_TIME + 3_600,
            GENESIS_TIME + 25 * 3_600,
            ShortId::new([99u8; 20]),
            genesis_address(),
            platform_vm::genesis::LOCAL_ID,
            &funded_key(),
        )
        .unwrap();

    let proposal = fixture.vm.build_block().unwrap();
    assert_eq!(
        proposal.verify(),
        Err(VmError::Tx(TransitionError::UncoveredDelegation))
    );
}

#[test]
fn delegating_to_a_genesis_validator_is_accepted() {
    let fixture = local_vm();
    let service = Service::new(fixture.vm.clone());
    let genesis_node = fixture
        .vm
        .current_validators(DEFAULT_SUBNET_ID)
        .unwrap()
        .peek()
        .unwrap()
        .node_id();
    // Genesis validators validate until GENESIS_VALIDATORS_END; delegate a
    // window inside it.
    service
        .add_default_subnet_delegator(
            1,
            MINIMUM_STAKE_AMOUNT,
            GENESIS_TIME + 3_600,
            GENESIS_TIME + 25 * 3_600,
            genesis_node,
            genesis_address(),
            platform_vm::genesis::LOCAL_ID,
            &funded_key(),
        )
        .unwrap();

    let proposal = fixture.vm.build_block().unwrap();
    proposal.verify().unwrap();
    let [commit, abort] = proposal.options().unwrap();
    commit.verify().unwrap();
    abort.verify().unwrap();
    proposal.accept().unwrap();
    commit.accept().unwrap();
    abort.reject().unwrap();

    let pending = fixture
        .vm
        .pending_validators(DEFAULT_SUBNET_ID)
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(
        fixture.vm.account(genesis_address()).unwrap().balance,
        GENESIS_BALANCE - MINIMUM_STAKE_AMOUNT
    );
}
