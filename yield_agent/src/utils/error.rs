use std::fmt;

use candid::CandidType;
use evm_rpc_types::RpcError;
use ic_cdk::api::call::RejectionCode;
use serde::Deserialize;

/// Yield Agent Result
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Yield Agent Errors
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum ManagerError {
    /// `CallResult` error
    CallResult(RejectionCode, String),
    /// Unauthorized access
    Unauthorized,
    /// A requested value does not exist
    NonExistentValue,
    /// Wrapper for the RPC errors returned by the EVM RPC canister
    RpcResponseError(RpcError),
    /// Decoding issue
    DecodingError(String),
    /// A cycle is already being executed
    Locked,
    /// Unknown/Custom error
    Custom(String),
    /// No consensus was reached among RPC providers
    NoConsensus,
    /// Arithmetic error
    Arithmetic(String),
    /// Selection parameters or rate inputs are out of range
    InvalidParameter(String),
    /// The latest reported rates are older than the accepted age.
    /// Carries the age of the report in seconds.
    StaleRates(u64),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::CallResult(code, message) => {
                write!(f, "call rejected ({:?}): {}", code, message)
            }
            ManagerError::Unauthorized => write!(f, "unauthorized"),
            ManagerError::NonExistentValue => write!(f, "value does not exist"),
            ManagerError::RpcResponseError(err) => write!(f, "rpc error: {:?}", err),
            ManagerError::DecodingError(message) => write!(f, "decoding error: {}", message),
            ManagerError::Locked => write!(f, "a cycle is already running"),
            ManagerError::Custom(message) => write!(f, "{}", message),
            ManagerError::NoConsensus => write!(f, "no consensus among rpc providers"),
            ManagerError::Arithmetic(message) => write!(f, "arithmetic error: {}", message),
            ManagerError::InvalidParameter(message) => write!(f, "invalid parameter: {}", message),
            ManagerError::StaleRates(age) => write!(f, "reported rates are {}s old", age),
        }
    }
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> ManagerError {
    ManagerError::Arithmetic(format!("{:#?}", s.as_ref()))
}

pub fn invalid_parameter<S: AsRef<str>>(s: S) -> ManagerError {
    ManagerError::InvalidParameter(s.as_ref().to_string())
}
