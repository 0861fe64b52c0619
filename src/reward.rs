/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The staking reward formula.
//!
//! A staker that stays to the end of its period earns
//! `stake × (INFLATION_RATE ^ years − 1)`, compounding the annual inflation cap
//! over the staking duration. A delegator's reward is split with its validator
//! according to the validator's advertised share count.

use crate::params::{INFLATION_RATE, MAXIMUM_STAKING_DURATION, NUMBER_OF_SHARES};
use crate::types::UnixTime;

/// The reward for bonding `amount` for `duration` seconds.
pub fn calculate(duration: UnixTime, amount: u64) -> u64 {
    let years = duration as f64 / MAXIMUM_STAKING_DURATION as f64;
    let inflation = INFLATION_RATE.powf(years);
    (amount as f64 * (inflation - 1.0)) as u64
}

/// Splits a delegator's reward: the validator keeps `shares / NUMBER_OF_SHARES`
/// of it, the delegator the rest.
pub fn split(total: u64, shares: u32) -> (u64, u64) {
    let shares = shares.min(NUMBER_OF_SHARES);
    let validator_cut = (total as u128 * shares as u128 / NUMBER_OF_SHARES as u128) as u64;
    (validator_cut, total - validator_cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MINIMUM_STAKING_DURATION;

    #[test]
    fn a_full_year_earns_the_inflation_cap() {
        let reward = calculate(MAXIMUM_STAKING_DURATION, 1_000_000);
        // 4% of the bonded amount, up to float truncation.
        assert_eq!(reward, 40_000);
    }

    #[test]
    fn shorter_periods_earn_less() {
        let day = calculate(MINIMUM_STAKING_DURATION, 1_000_000_000);
        let year = calculate(MAXIMUM_STAKING_DURATION, 1_000_000_000);
        assert!(0 < day && day < year);
    }

    #[test]
    fn zero_duration_earns_nothing() {
        assert_eq!(calculate(0, 1_000_000), 0);
    }

    #[test]
    fn split_respects_the_share_count() {
        let (validator, delegator) = split(1_000, NUMBER_OF_SHARES / 4);
        assert_eq!(validator, 250);
        assert_eq!(delegator, 750);
        assert_eq!(validator + delegator, 1_000);

        let (validator, delegator) = split(1_000, NUMBER_OF_SHARES);
        assert_eq!((validator, delegator), (1_000, 0));

        let (validator, delegator) = split(1_000, 0);
        assert_eq!((validator, delegator), (0, 1_000));
    }
}
