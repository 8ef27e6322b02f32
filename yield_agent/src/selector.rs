//! Allocation selector
//!
//! Ranks pools by their sampled yield and splits [`TOTAL_BASIS_POINTS`] equally
//! between the `top_n` best ones. The integer-division remainder goes to the
//! lowest-ranked winner.
//!
//! ```plain
//! rates    [10, 8, 15, 3, 1]      top_n = 3
//! ranking  [2, 0, 1, 3, 4]
//! winners  [2, 0, 1]              base = 10000 / 3 = 3333, remainder = 1
//! output   [3333, 3334, 3333, 0, 0]
//! ```

use std::cmp::Ordering;

use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::{
    constants::TOTAL_BASIS_POINTS,
    utils::error::{invalid_parameter, ManagerResult},
};

/// Basis-point allocation, one entry per pool, indexed like the rate vector it was derived from.
#[derive(Clone, Debug, Default, PartialEq, Eq, CandidType, Serialize, Deserialize)]
pub struct Allocation(pub Vec<u64>);

impl Allocation {
    /// Sum of all entries in basis points
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Indices of the pools with a non-zero share, in pool order
    pub fn winners(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, share)| **share > 0)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

/// Orders pool indices by rate, highest first.
/// Equal rates keep ascending index order.
///
/// Fails with `InvalidParameter` if `rates` is empty or contains `NaN`.
pub fn rank(rates: &[f64]) -> ManagerResult<Vec<usize>> {
    if rates.is_empty() {
        return Err(invalid_parameter("the rate vector is empty"));
    }

    if let Some(index) = rates.iter().position(|rate| rate.is_nan()) {
        return Err(invalid_parameter(format!(
            "the rate of pool {} is not a number",
            index
        )));
    }

    let mut ranking: Vec<(usize, f64)> = rates.iter().copied().enumerate().collect();

    // `sort_by` is stable, so the index order survives for equal rates.
    ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    Ok(ranking.into_iter().map(|(index, _)| index).collect())
}

/// Selects the `top_n` highest-yielding pools and assigns each of them an equal share of
/// [`TOTAL_BASIS_POINTS`]. The remainder of the integer division is added to the winner in
/// the `top_n`-th place, so the output always sums to exactly [`TOTAL_BASIS_POINTS`].
///
/// # Errors
/// `ManagerError::InvalidParameter` when `rates` is empty, holds a `NaN`,
/// or `top_n` is outside `1..=rates.len()`.
pub fn select(rates: &[f64], top_n: usize) -> ManagerResult<Allocation> {
    if top_n < 1 {
        return Err(invalid_parameter("top_n must be at least 1"));
    }

    if top_n > rates.len() {
        return Err(invalid_parameter(format!(
            "top_n ({}) exceeds the number of pools ({})",
            top_n,
            rates.len()
        )));
    }

    let ranking = rank(rates)?;
    let winners = &ranking[..top_n];

    let top_n = top_n as u64;
    let base = TOTAL_BASIS_POINTS / top_n;
    let remainder = TOTAL_BASIS_POINTS - base * top_n;

    let mut allocation = vec![0_u64; rates.len()];
    for &index in winners {
        allocation[index] = base;
    }

    if let Some(&last_winner) = winners.last() {
        allocation[last_winner] += remainder;
    }

    Ok(Allocation(allocation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ManagerError;
    use proptest::prelude::*;

    #[test]
    fn picks_the_two_highest_rates() {
        let allocation = select(&[10.0, 8.0, 15.0, 3.0, 1.0], 2).unwrap();
        assert_eq!(allocation.0, vec![5000, 0, 5000, 0, 0]);
    }

    #[test]
    fn remainder_goes_to_the_lowest_ranked_winner() {
        let allocation = select(&[10.0, 8.0, 15.0, 3.0, 1.0], 3).unwrap();
        assert_eq!(allocation.0, vec![3333, 3334, 3333, 0, 0]);
    }

    #[test]
    fn ties_are_won_by_lower_indices() {
        let allocation = select(&[5.0, 5.0, 5.0], 2).unwrap();
        assert_eq!(allocation.winners(), vec![0, 1]);
        assert_eq!(allocation.0, vec![5000, 5000, 0]);
    }

    #[test]
    fn ranking_keeps_index_order_on_ties() {
        let ranking = rank(&[1.0, 7.0, 1.0, 7.0]).unwrap();
        assert_eq!(ranking, vec![1, 3, 0, 2]);
    }

    #[test]
    fn all_pools_win_when_top_n_equals_pool_count() {
        let rates = [2.0, 9.0, 4.0, 7.0, 1.0, 3.0];
        let allocation = select(&rates, rates.len()).unwrap();

        // 10000 / 6 = 1666, remainder 4 goes to pool 4 (rate 1.0, ranked last)
        assert_eq!(allocation.0, vec![1666, 1666, 1666, 1666, 1670, 1666]);
        assert_eq!(allocation.total(), 10_000);
    }

    #[test]
    fn single_pool_takes_everything() {
        let allocation = select(&[-3.5], 1).unwrap();
        assert_eq!(allocation.0, vec![10_000]);
    }

    #[test]
    fn negative_and_infinite_rates_are_ranked() {
        let allocation = select(&[-1.0, f64::INFINITY, f64::NEG_INFINITY, 0.0], 2).unwrap();
        assert_eq!(allocation.0, vec![0, 5000, 0, 5000]);
    }

    #[test]
    fn rejects_zero_top_n() {
        let result = select(&[1.0, 2.0], 0);
        assert!(matches!(result, Err(ManagerError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_top_n_above_pool_count() {
        let result = select(&[1.0, 2.0], 3);
        assert!(matches!(result, Err(ManagerError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_empty_rates() {
        let result = select(&[], 1);
        assert!(matches!(result, Err(ManagerError::InvalidParameter(_))));
        assert!(matches!(rank(&[]), Err(ManagerError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_nan() {
        let result = select(&[1.0, f64::NAN, 3.0], 1);
        assert!(matches!(result, Err(ManagerError::InvalidParameter(_))));
    }

    #[test]
    fn input_is_left_untouched() {
        let rates = vec![3.0, 1.0, 2.0];
        let copy = rates.clone();
        let _ = select(&rates, 2).unwrap();
        assert_eq!(rates, copy);
    }

    fn rates_and_top_n() -> impl Strategy<Value = (Vec<f64>, usize)> {
        prop::collection::vec(-1_000.0f64..1_000.0, 1..64)
            .prop_flat_map(|rates| {
                let len = rates.len();
                (Just(rates), 1..=len)
            })
    }

    proptest! {
        #[test]
        fn allocation_always_sums_to_total((rates, top_n) in rates_and_top_n()) {
            let allocation = select(&rates, top_n).unwrap();
            prop_assert_eq!(allocation.len(), rates.len());
            prop_assert_eq!(allocation.total(), TOTAL_BASIS_POINTS);
        }

        #[test]
        fn exactly_top_n_pools_are_funded((rates, top_n) in rates_and_top_n()) {
            let allocation = select(&rates, top_n).unwrap();
            prop_assert_eq!(allocation.winners().len(), top_n);
        }

        #[test]
        fn selection_is_deterministic((rates, top_n) in rates_and_top_n()) {
            prop_assert_eq!(select(&rates, top_n).unwrap(), select(&rates, top_n).unwrap());
        }

        #[test]
        fn winners_outrank_every_other_pool((rates, top_n) in rates_and_top_n()) {
            let allocation = select(&rates, top_n).unwrap();
            let winners = allocation.winners();
            let lowest_winner = winners
                .iter()
                .map(|&index| rates[index])
                .fold(f64::INFINITY, f64::min);

            for (index, rate) in rates.iter().enumerate() {
                if !winners.contains(&index) {
                    prop_assert!(*rate <= lowest_winner);
                }
            }
        }

        #[test]
        fn full_selection_shares_base_evenly(rates in prop::collection::vec(0.0f64..50.0, 1..40)) {
            let pools = rates.len();
            let allocation = select(&rates, pools).unwrap();
            let base = TOTAL_BASIS_POINTS / pools as u64;
            let last_ranked = *rank(&rates).unwrap().last().unwrap();

            for (index, share) in allocation.0.iter().enumerate() {
                if index == last_ranked {
                    prop_assert_eq!(*share, base + TOTAL_BASIS_POINTS - base * pools as u64);
                } else {
                    prop_assert_eq!(*share, base);
                }
            }
        }
    }
}
