//! Makes fee estimations for the transactions submitted through the TransactionBuilder

use candid::Nat;

use crate::{
    constants::{FEE_HISTORY_BLOCKS, MIN_PRIORITY_FEE_PER_GAS, RPC_CALL_CYCLES},
    providers::extract_multi_rpc_result,
};

use super::{
    common::{extract_call_result, get_rpc_config, nat_to_u128},
    error::{arithmetic_err, ManagerError, ManagerResult},
    evm_rpc::{BlockTag, FeeHistory, FeeHistoryArgs, Service},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeEstimates {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

pub async fn fee_history(
    block_count: Nat,
    newest_block: BlockTag,
    reward_percentiles: Option<Vec<u8>>,
    providers: &[String],
    rpc_services: evm_rpc_types::RpcServices,
    evm_rpc: &Service,
) -> ManagerResult<FeeHistory> {
    let fee_history_args = FeeHistoryArgs {
        block_count,
        newest_block,
        reward_percentiles,
    };

    let config = get_rpc_config(None, providers.len());
    let call_result = evm_rpc
        .eth_fee_history(rpc_services, Some(config), fee_history_args, RPC_CALL_CYCLES)
        .await;

    let canister_response = extract_call_result(call_result)?;

    extract_multi_rpc_result(providers, canister_response)
}

fn median_index(length: usize) -> usize {
    length.saturating_sub(1) / 2
}

/// Derives EIP-1559 fees from a fee history.
///
/// The priority fee is the median of the 95th-percentile tips, floored at
/// `MIN_PRIORITY_FEE_PER_GAS`. The max fee covers twice the latest base fee plus the tip.
pub fn fees_from_history(fee_history: FeeHistory) -> ManagerResult<FeeEstimates> {
    let base_fee_per_gas = fee_history
        .base_fee_per_gas
        .last()
        .ok_or(ManagerError::NonExistentValue)?;
    let base_fee_per_gas = nat_to_u128(base_fee_per_gas)?;

    // obtain the 95th percentile of the tips for the past blocks
    let mut percentiles: Vec<u128> = fee_history
        .reward
        .iter()
        .flat_map(|rewards| rewards.iter())
        .map(nat_to_u128)
        .collect::<ManagerResult<Vec<u128>>>()?;

    // sort and retrieve the median reward
    percentiles.sort_unstable();
    let median_reward = percentiles
        .get(median_index(percentiles.len()))
        .copied()
        .unwrap_or_default();

    let max_priority_fee_per_gas = median_reward.max(MIN_PRIORITY_FEE_PER_GAS);
    let max_fee_per_gas = base_fee_per_gas
        .checked_mul(2)
        .and_then(|fee| fee.checked_add(max_priority_fee_per_gas))
        .ok_or_else(|| arithmetic_err("max fee per gas overflows u128"))?;

    Ok(FeeEstimates {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    })
}

pub async fn estimate_transaction_fees(
    providers: &[String],
    rpc_services: evm_rpc_types::RpcServices,
    evm_rpc: &Service,
) -> ManagerResult<FeeEstimates> {
    let fee_history = fee_history(
        Nat::from(FEE_HISTORY_BLOCKS),
        BlockTag::Latest,
        Some(vec![95]),
        providers,
        rpc_services,
        evm_rpc,
    )
    .await?;

    fees_from_history(fee_history)
}
