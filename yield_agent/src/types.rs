use alloy_sol_types::sol;
use candid::{CandidType, Principal};
use serde::Deserialize;

pub type DerivationPath = Vec<Vec<u8>>;

/// Where the agent takes its yield samples from
#[derive(Clone, Copy, CandidType, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum RateSourceKind {
    /// Pseudo-random APYs, seeded from the IC's randomness
    #[default]
    Simulated,
    /// Rates pushed by an authorized reporter through `report_rates`
    Reported,
}

#[derive(Clone, CandidType, Debug, Deserialize)]
pub struct InitArgs {
    pub rpc_principal: Principal,
    pub rpc_urls: Vec<String>,
    pub chain_id: Option<u64>,
    pub contract: String,
    pub ecdsa_key_name: String,
    pub top_n: Option<u8>,
    pub interval_secs: Option<u64>,
    pub gas_limit: Option<u64>,
    pub rate_source: RateSourceKind,
    pub reporters: Vec<Principal>,
}

sol!(
    // DeFAI YieldMax vault
    function suggestRebalance(uint256[15] newAllocations) external;
);
