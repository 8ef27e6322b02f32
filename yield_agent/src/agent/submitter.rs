//! Chain submission of the selected allocation

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::{
    constants::POOL_COUNT,
    selector::Allocation,
    state::SETTINGS,
    types::{suggestRebalanceCall, DerivationPath},
    utils::{
        error::{invalid_parameter, ManagerError, ManagerResult},
        evm_rpc::{SendRawTransactionStatus, Service},
        signer::{get_canister_public_key, key_id, pubkey_bytes_to_address},
        transaction_builder::{get_nonce, TransactionBuilder},
    },
};

use super::{dashboard::TransactionReceipt, settings::AgentSettings};

/// Turns an allocation into a transaction against the vault contract.
#[allow(async_fn_in_trait)]
pub trait ChainSubmitter {
    async fn submit(&self, allocation: &Allocation) -> ManagerResult<TransactionReceipt>;
}

/// ABI-encodes `suggestRebalance(uint256[15])` for `allocation`
pub fn rebalance_calldata(allocation: &Allocation) -> ManagerResult<Vec<u8>> {
    let shares: [U256; POOL_COUNT] = allocation
        .as_slice()
        .iter()
        .map(|share| U256::from(*share))
        .collect::<Vec<U256>>()
        .try_into()
        .map_err(|shares: Vec<U256>| {
            invalid_parameter(format!(
                "the vault expects {} allocations, got {}",
                POOL_COUNT,
                shares.len()
            ))
        })?;

    Ok(suggestRebalanceCall {
        newAllocations: shares,
    }
    .abi_encode())
}

/// Maps the broadcast status to a receipt, treating every rejection as an error
pub fn receipt_from_status(
    status: SendRawTransactionStatus,
    nonce: u64,
    chain_id: u64,
) -> ManagerResult<TransactionReceipt> {
    match status {
        SendRawTransactionStatus::Ok(tx_hash) => Ok(TransactionReceipt {
            tx_hash,
            nonce,
            chain_id,
        }),
        SendRawTransactionStatus::InsufficientFunds => Err(ManagerError::Custom(
            "The agent's EOA cannot pay for gas.".to_string(),
        )),
        SendRawTransactionStatus::NonceTooLow => {
            Err(ManagerError::Custom(format!("Nonce {} is too low.", nonce)))
        }
        SendRawTransactionStatus::NonceTooHigh => {
            Err(ManagerError::Custom(format!("Nonce {} is too high.", nonce)))
        }
    }
}

/// Explicit configuration of the EVM submitter.
/// The signing credential is referenced by key name and derivation path only.
#[derive(Clone, Debug)]
pub struct SubmitterConfig {
    pub rpc_canister: Service,
    pub contract: Address,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub ecdsa_key_name: String,
    pub derivation_path: DerivationPath,
}

impl From<&AgentSettings> for SubmitterConfig {
    fn from(value: &AgentSettings) -> Self {
        Self {
            rpc_canister: value.rpc_canister,
            contract: value.contract,
            chain_id: value.chain_id,
            gas_limit: value.gas_limit,
            ecdsa_key_name: value.ecdsa_key_name.clone(),
            derivation_path: value.derivation_path.clone(),
        }
    }
}

/// Submits allocations through the EVM RPC canister, signing with the threshold key
pub struct EvmSubmitter {
    config: SubmitterConfig,
}

impl EvmSubmitter {
    pub fn new(config: SubmitterConfig) -> Self {
        Self { config }
    }

    /// Returns the agent's EOA, deriving it from the threshold public key on first use
    pub async fn signer_address(&self) -> ManagerResult<Address> {
        if let Some(eoa) = SETTINGS.with(|settings| settings.borrow().as_ref().and_then(|s| s.eoa))
        {
            return Ok(eoa);
        }

        let public_key = get_canister_public_key(
            key_id(&self.config.ecdsa_key_name),
            self.config.derivation_path.clone(),
        )
        .await?;
        let eoa = pubkey_bytes_to_address(&public_key)?;

        SETTINGS.with(|settings| {
            if let Some(settings) = settings.borrow_mut().as_mut() {
                settings.eoa(Some(eoa));
            }
        });

        Ok(eoa)
    }
}

impl ChainSubmitter for EvmSubmitter {
    async fn submit(&self, allocation: &Allocation) -> ManagerResult<TransactionReceipt> {
        let data = rebalance_calldata(allocation)?;
        let eoa = self.signer_address().await?;
        let nonce = get_nonce(&self.config.rpc_canister, self.config.chain_id, eoa).await?;

        let status = TransactionBuilder::default()
            .to(self.config.contract)
            .from(eoa)
            .data(data)
            .value(U256::ZERO)
            .nonce(nonce)
            .gas_limit(self.config.gas_limit)
            .chain_id(self.config.chain_id)
            .key_name(self.config.ecdsa_key_name.clone())
            .derivation_path(self.config.derivation_path.clone())
            .send(&self.config.rpc_canister)
            .await?;

        receipt_from_status(status, nonce, self.config.chain_id)
    }
}
