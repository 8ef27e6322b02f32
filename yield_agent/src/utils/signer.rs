//! Threshold ECDSA signing.
//!
//! The agent never holds a private key. Its EOA is derived from the subnet's threshold key
//! (`key name` + `derivation path`), and transactions are signed by the management canister.

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718,
};
use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use ic_cdk::api::management_canister::ecdsa::{
    ecdsa_public_key, sign_with_ecdsa, EcdsaCurve, EcdsaKeyId, EcdsaPublicKeyArgument,
    SignWithEcdsaArgument,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::types::DerivationPath;

use super::{
    common::extract_call_result,
    error::{ManagerError, ManagerResult},
};

/// Key id of the threshold key named `name`
pub fn key_id(name: &str) -> EcdsaKeyId {
    EcdsaKeyId {
        curve: EcdsaCurve::Secp256k1,
        name: name.to_string(),
    }
}

/// Fetches the SEC1-encoded public key of the canister for `derivation_path`
pub async fn get_canister_public_key(
    key_id: EcdsaKeyId,
    derivation_path: DerivationPath,
) -> ManagerResult<Vec<u8>> {
    let call_result = ecdsa_public_key(EcdsaPublicKeyArgument {
        canister_id: None,
        derivation_path,
        key_id,
    })
    .await;

    extract_call_result(call_result).map(|response| response.public_key)
}

/// Converts a SEC1 public key (compressed or not) into an Ethereum address
pub fn pubkey_bytes_to_address(pubkey_bytes: &[u8]) -> ManagerResult<Address> {
    let public_key = k256::PublicKey::from_sec1_bytes(pubkey_bytes)
        .map_err(|err| ManagerError::DecodingError(format!("Invalid public key: {}", err)))?;
    let point = public_key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Rebuilds a recoverable signature from the 64-byte `r || s` returned by the IC.
/// The y-parity is the one that recovers `signer`.
pub fn recoverable_signature(
    signature_bytes: &[u8],
    prehash: &B256,
    signer: Address,
) -> ManagerResult<Signature> {
    if signature_bytes.len() != 64 {
        return Err(ManagerError::DecodingError(format!(
            "Expected a 64-byte signature, got {} bytes.",
            signature_bytes.len()
        )));
    }

    let r = U256::from_be_slice(&signature_bytes[..32]);
    let s = U256::from_be_slice(&signature_bytes[32..]);

    for parity in [0_u64, 1] {
        let signature = Signature::from_rs_and_parity(r, s, parity)
            .map_err(|err| ManagerError::DecodingError(err.to_string()))?;

        if signature.recover_address_from_prehash(prehash).ok() == Some(signer) {
            return Ok(signature);
        }
    }

    Err(ManagerError::Custom(
        "The signature does not recover to the agent's address.".to_string(),
    ))
}

/// Serializes a signed transaction into the `0x`-prefixed raw form expected by `eth_sendRawTransaction`
pub fn encode_signed_transaction(transaction: TxEip1559, signature: Signature) -> String {
    let envelope = TxEnvelope::from(transaction.into_signed(signature));
    format!("0x{}", hex::encode(envelope.encoded_2718()))
}

/// Signs an EIP-1559 transaction with the threshold key and returns the raw transaction
pub async fn sign_eip1559_transaction(
    transaction: TxEip1559,
    key_id: EcdsaKeyId,
    derivation_path: DerivationPath,
    signer: Address,
) -> ManagerResult<String> {
    let prehash = transaction.signature_hash();

    let call_result = sign_with_ecdsa(SignWithEcdsaArgument {
        message_hash: prehash.to_vec(),
        derivation_path,
        key_id,
    })
    .await;

    let response = extract_call_result(call_result)?;
    let signature = recoverable_signature(&response.signature, &prehash, signer)?;

    Ok(encode_signed_transaction(transaction, signature))
}
