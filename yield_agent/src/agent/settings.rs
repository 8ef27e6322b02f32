//! Agent settings, validated once from the init arguments

use alloy_primitives::Address;
use candid::{CandidType, Principal};

use crate::{
    constants::{
        CHAIN_ID, DEFAULT_GAS_LIMIT, DEFAULT_INTERVAL_SECS, DEFAULT_TOP_N, POOL_COUNT,
    },
    types::{DerivationPath, InitArgs, RateSourceKind},
    utils::{
        common::string_to_address,
        error::{invalid_parameter, ManagerResult},
        evm_rpc::Service,
    },
};

/// Settings of the agent.
/// Set at install time and replaced only through a canister upgrade.
#[derive(Clone, Debug)]
pub struct AgentSettings {
    /// Number of pools funded per cycle
    pub top_n: usize,
    /// Seconds between two cycles
    pub interval_secs: u64,
    /// Vault contract exposing `suggestRebalance`
    pub contract: Address,
    /// Chain ID of the network the vault lives on
    pub chain_id: u64,
    /// Gas limit of the rebalance transaction
    pub gas_limit: u64,
    /// Name of the threshold ECDSA key
    pub ecdsa_key_name: String,
    /// Derivation path of the agent's EOA
    pub derivation_path: DerivationPath,
    /// The EOA's address, known after the first public key lookup
    pub eoa: Option<Address>,
    /// RPC canister service
    pub rpc_canister: Service,
    /// Active rate source
    pub rate_source: RateSourceKind,
    /// Principals allowed to report rates
    pub reporters: Vec<Principal>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N as usize,
            interval_secs: DEFAULT_INTERVAL_SECS,
            contract: Address::ZERO,
            chain_id: CHAIN_ID,
            gas_limit: DEFAULT_GAS_LIMIT,
            ecdsa_key_name: String::new(),
            derivation_path: vec![],
            eoa: None,
            rpc_canister: Service::default(),
            rate_source: RateSourceKind::default(),
            reporters: vec![],
        }
    }
}

impl AgentSettings {
    /// Sets the number of funded pools.
    pub fn top_n(&mut self, top_n: usize) -> &mut Self {
        self.top_n = top_n;
        self
    }

    /// Sets the cycle interval, in seconds.
    pub fn interval_secs(&mut self, interval_secs: u64) -> &mut Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Sets the vault contract address.
    pub fn contract(&mut self, contract: Address) -> &mut Self {
        self.contract = contract;
        self
    }

    /// Sets the chain ID.
    pub fn chain_id(&mut self, chain_id: u64) -> &mut Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the gas limit.
    pub fn gas_limit(&mut self, gas_limit: u64) -> &mut Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the threshold ECDSA key name.
    pub fn ecdsa_key_name(&mut self, ecdsa_key_name: String) -> &mut Self {
        self.ecdsa_key_name = ecdsa_key_name;
        self
    }

    /// Sets the derivation path of the EOA.
    pub fn derivation_path(&mut self, derivation_path: DerivationPath) -> &mut Self {
        self.derivation_path = derivation_path;
        self
    }

    /// Sets the EOA address.
    pub fn eoa(&mut self, eoa: Option<Address>) -> &mut Self {
        self.eoa = eoa;
        self
    }

    /// Sets the RPC canister service.
    pub fn rpc_canister(&mut self, rpc_canister: Service) -> &mut Self {
        self.rpc_canister = rpc_canister;
        self
    }

    /// Sets the rate source.
    pub fn rate_source(&mut self, rate_source: RateSourceKind) -> &mut Self {
        self.rate_source = rate_source;
        self
    }

    /// Sets the reporters allowed to push rates.
    pub fn reporters(&mut self, reporters: Vec<Principal>) -> &mut Self {
        self.reporters = reporters;
        self
    }

    /// Checks the invariants the agent relies on
    pub fn validate(&self) -> ManagerResult<()> {
        if self.top_n < 1 || self.top_n > POOL_COUNT {
            return Err(invalid_parameter(format!(
                "top_n must be between 1 and {}, got {}",
                POOL_COUNT, self.top_n
            )));
        }
        if self.interval_secs == 0 {
            return Err(invalid_parameter("interval_secs must be positive"));
        }
        if self.chain_id == 0 {
            return Err(invalid_parameter("chain_id must be positive"));
        }
        if self.gas_limit == 0 {
            return Err(invalid_parameter("gas_limit must be positive"));
        }
        if self.ecdsa_key_name.is_empty() {
            return Err(invalid_parameter("ecdsa_key_name is empty"));
        }
        Ok(())
    }
}

impl TryFrom<InitArgs> for AgentSettings {
    type Error = crate::utils::error::ManagerError;

    fn try_from(value: InitArgs) -> Result<Self, Self::Error> {
        if value.rpc_urls.is_empty() {
            return Err(invalid_parameter("at least one rpc url is required"));
        }

        let contract = string_to_address(value.contract)?;

        let mut settings = AgentSettings::default();
        settings
            .top_n(value.top_n.unwrap_or(DEFAULT_TOP_N) as usize)
            .interval_secs(value.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS))
            .contract(contract)
            .chain_id(value.chain_id.unwrap_or(CHAIN_ID))
            .gas_limit(value.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT))
            .ecdsa_key_name(value.ecdsa_key_name)
            .derivation_path(vec![b"yield-agent".to_vec()])
            .rpc_canister(Service(value.rpc_principal))
            .rate_source(value.rate_source)
            .reporters(value.reporters);

        settings.validate()?;
        Ok(settings)
    }
}

/// Read-only view of the settings
#[derive(Clone, CandidType)]
pub struct SettingsQuery {
    pub top_n: u8,
    pub pool_count: u8,
    pub interval_secs: u64,
    pub contract: String,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub ecdsa_key_name: String,
    pub eoa: Option<String>,
    pub rpc_canister: Principal,
    pub rate_source: RateSourceKind,
    pub reporters: Vec<Principal>,
}

impl From<AgentSettings> for SettingsQuery {
    fn from(value: AgentSettings) -> Self {
        Self {
            top_n: value.top_n as u8,
            pool_count: POOL_COUNT as u8,
            interval_secs: value.interval_secs,
            contract: value.contract.to_string(),
            chain_id: value.chain_id,
            gas_limit: value.gas_limit,
            ecdsa_key_name: value.ecdsa_key_name,
            eoa: value.eoa.map(|address| address.to_string()),
            rpc_canister: value.rpc_canister.0,
            rate_source: value.rate_source,
            reporters: value.reporters,
        }
    }
}
