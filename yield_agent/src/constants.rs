//! Yield Agent's Constants
// The defaults below are starting points; every tunable one can be overridden through `InitArgs`.

/// Basis points that make up a complete allocation (100.00%)
pub const TOTAL_BASIS_POINTS: u64 = 10_000;

/// Number of pools tracked by the vault (3 platforms with 5 pools each).
/// Must match the `uint256[15]` argument of `suggestRebalance`.
pub const POOL_COUNT: usize = 15;

/// Default number of pools funded per cycle
pub const DEFAULT_TOP_N: u8 = 5;

/// Default cycle interval in seconds (10 minutes)
pub const DEFAULT_INTERVAL_SECS: u64 = 600;

/// Default gas limit of a `suggestRebalance` transaction
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Simulated APY range, in percent
pub const SIMULATED_APY_MIN: f64 = 1.0;
pub const SIMULATED_APY_MAX: f64 = 20.0;

/// Reported rates older than this many cycle intervals are rejected
pub const RATE_MAX_AGE_INTERVALS: u64 = 2;

/// Chain ID
#[cfg(feature = "amoy")]
pub const CHAIN_ID: u64 = 80_002; // Polygon Amoy testnet
#[cfg(not(feature = "amoy"))]
pub const CHAIN_ID: u64 = 137; // Polygon PoS

/// Max number of submission attempts per cycle
pub const MAX_RETRY_ATTEMPTS: u8 = 2;

/// A held cycle lock is considered abandoned after this many seconds
pub const CYCLE_LOCK_TIMEOUT: u64 = 3_600;

/// Interval of the journal and reputation cleanup, in seconds (24 hours)
pub const CLEANUP_INTERVAL_SECS: u64 = 86_400;

/// Number of journal collections kept by the cleanup
pub const JOURNAL_CAPACITY: u64 = 300;

/// Max entries and note length kept per journal collection
pub const MAX_JOURNAL_ENTRIES: usize = 16;
pub const MAX_NOTE_LENGTH: usize = 256;

/// Number of recommendations served to the dashboard
pub const DASHBOARD_HISTORY: usize = 50;

/// Default max response bytes
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 8_000;

/// Cycles attached to EVM RPC canister calls
pub const RPC_CALL_CYCLES: u128 = 10_000_000_000;

/// Number of providers to use
pub const PROVIDER_COUNT: u8 = 3;

/// Number of providers needed to reach consensus
pub const PROVIDER_THRESHOLD: u8 = 2;

/// Number of past blocks used for fee estimation
pub const FEE_HISTORY_BLOCKS: u8 = 9;

/// The minimum suggested maximum priority fee per gas (30 gwei, Polygon's floor).
pub const MIN_PRIORITY_FEE_PER_GAS: u128 = 30_000_000_000;
