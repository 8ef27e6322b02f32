//! Transaction builder (and sender) that interacts with the EVM RPC canister

use alloy::consensus::TxEip1559;
use alloy_primitives::{Address, Bytes, TxKind, U256};

use crate::{
    constants::{DEFAULT_MAX_RESPONSE_BYTES, RPC_CALL_CYCLES},
    providers::{extract_multi_rpc_result, get_ranked_rpc_providers},
    types::DerivationPath,
};

use super::{
    common::{extract_call_result, get_rpc_config, nat_to_u64},
    error::{ManagerError, ManagerResult},
    evm_rpc::{BlockTag, GetTransactionCountArgs, SendRawTransactionStatus, Service},
    gas::{estimate_transaction_fees, FeeEstimates},
    signer::{key_id, sign_eip1559_transaction},
};

/// On success, returns the nonce associated with the given address
pub async fn get_nonce(
    rpc_canister: &Service,
    chain_id: u64,
    address: Address,
) -> ManagerResult<u64> {
    let (providers, rpc) = get_ranked_rpc_providers(chain_id);
    let args = GetTransactionCountArgs {
        address: address.to_string(),
        block: BlockTag::Latest,
    };

    let config = get_rpc_config(Some(DEFAULT_MAX_RESPONSE_BYTES), providers.len());
    let result = rpc_canister
        .eth_get_transaction_count(rpc, Some(config), args, RPC_CALL_CYCLES)
        .await;

    let wrapped_number = extract_call_result(result)?;
    let number = extract_multi_rpc_result(&providers, wrapped_number)?;
    nat_to_u64(&number)
}

/// Transaction builder struct
#[derive(Default)]
pub struct TransactionBuilder {
    to: Address,
    from: Address,
    data: Vec<u8>,
    value: U256,
    nonce: u64,
    gas_limit: u64,
    chain_id: u64,
    key_name: String,
    derivation_path: DerivationPath,
}

impl TransactionBuilder {
    /// Sets the `to` field
    pub fn to(mut self, to: Address) -> Self {
        self.to = to;
        self
    }

    /// Sets the `from` field, the address the threshold key signs for
    pub fn from(mut self, from: Address) -> Self {
        self.from = from;
        self
    }

    /// Sets the `data` field
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Sets the `value` field
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the `nonce` field
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the `gas_limit` field
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the `chain_id` field
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the threshold ECDSA key name
    pub fn key_name(mut self, key_name: String) -> Self {
        self.key_name = key_name;
        self
    }

    /// Sets the `derivation_path` field
    pub fn derivation_path(mut self, derivation_path: DerivationPath) -> Self {
        self.derivation_path = derivation_path;
        self
    }

    /// Builds the unsigned EIP-1559 transaction
    pub fn build(&self, fees: &FeeEstimates) -> TxEip1559 {
        TxEip1559 {
            chain_id: self.chain_id,
            to: TxKind::Call(self.to),
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            value: self.value,
            nonce: self.nonce,
            gas_limit: self.gas_limit.into(),
            access_list: Default::default(),
            input: Bytes::from(self.data.clone()),
        }
    }

    /// Builds the TransactionBuilder into a Transaction, signs and sends it
    pub async fn send(self, rpc_canister: &Service) -> ManagerResult<SendRawTransactionStatus> {
        if self.from == Address::ZERO {
            return Err(ManagerError::NonExistentValue);
        }

        let (providers, rpc) = get_ranked_rpc_providers(self.chain_id);
        let fees = estimate_transaction_fees(&providers, rpc.clone(), rpc_canister).await?;

        let request = self.build(&fees);
        let signed_transaction = sign_eip1559_transaction(
            request,
            key_id(&self.key_name),
            self.derivation_path.clone(),
            self.from,
        )
        .await?;

        let config = get_rpc_config(Some(DEFAULT_MAX_RESPONSE_BYTES), providers.len());
        let call_result = rpc_canister
            .eth_send_raw_transaction(rpc, Some(config), signed_transaction, RPC_CALL_CYCLES)
            .await;

        let response = extract_call_result(call_result)?;
        extract_multi_rpc_result(&providers, response)
    }
}
