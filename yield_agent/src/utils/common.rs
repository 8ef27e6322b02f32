//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::Address;
use candid::{Nat, Principal};
use evm_rpc_types::{ConsensusStrategy, RpcConfig};
use ic_cdk::api::call::CallResult;
use num_traits::ToPrimitive;

use crate::constants::{PROVIDER_COUNT, PROVIDER_THRESHOLD};

use super::error::{ManagerError, ManagerResult};

/// Current time in seconds.
/// Reads the IC clock inside the canister and the system clock in native builds (tests).
pub fn now_secs() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        ic_cdk::api::time() / 1_000_000_000
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

/// Writes a line to the canister's debug log.
pub fn print<S: AsRef<str>>(message: S) {
    #[cfg(target_arch = "wasm32")]
    ic_cdk::api::print(message.as_ref());

    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{}", message.as_ref());
}

/// Returns Err if the `caller` is not a controller of the canister
pub fn only_controller(caller: Principal) -> ManagerResult<()> {
    if !ic_cdk::api::is_controller(&caller) {
        // only the controller should be able to call this function
        return Err(ManagerError::Unauthorized);
    }
    Ok(())
}

/// Converts String to Address and returns ManagerError on failure
pub fn string_to_address(input: String) -> ManagerResult<Address> {
    Address::from_str(&input).map_err(|err| ManagerError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `Nat` to `u128`
pub fn nat_to_u128(n: &Nat) -> ManagerResult<u128> {
    n.0.to_u128().ok_or(ManagerError::DecodingError(format!(
        "{} does not fit into 128 bits.",
        n
    )))
}

/// Converts values of type `Nat` to `u64`
pub fn nat_to_u64(n: &Nat) -> ManagerResult<u64> {
    n.0.to_u64().ok_or(ManagerError::DecodingError(format!(
        "{} does not fit into 64 bits.",
        n
    )))
}

/// Builds the RPC config for a request answered by `provider_count` providers.
/// The consensus threshold is capped by the number of providers.
pub fn get_rpc_config(max_response_bytes: Option<u64>, provider_count: usize) -> RpcConfig {
    let total = (provider_count as u8).clamp(1, PROVIDER_COUNT);
    RpcConfig {
        response_size_estimate: max_response_bytes,
        response_consensus: Some(ConsensusStrategy::Threshold {
            total: Some(total),
            min: PROVIDER_THRESHOLD.min(total),
        }),
    }
}

/// Extracts the Ok or Err values of a canister call and returns them.
pub fn extract_call_result<T>(result: CallResult<(T,)>) -> ManagerResult<T> {
    result
        .map(|(success_value,)| success_value)
        .map_err(|(rejection_code, error_message)| {
            ManagerError::CallResult(rejection_code, error_message)
        })
}

/// Turns the output of `raw_rand` into an RNG seed
pub fn seed_from_bytes(bytes: Vec<u8>) -> ManagerResult<[u8; 32]> {
    bytes.try_into().map_err(|_| {
        ManagerError::DecodingError(
            "Couldn't convert the seed bytes into a fixed length slice.".to_string(),
        )
    })
}

/// Fetches 32 bytes of randomness from the management canister
pub async fn random_seed() -> ManagerResult<[u8; 32]> {
    let call_result = ic_cdk::api::management_canister::main::raw_rand().await;
    seed_from_bytes(extract_call_result(call_result)?)
}

/// Cuts `text` down to at most `max_chars` characters
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
