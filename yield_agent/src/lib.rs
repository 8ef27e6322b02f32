mod agent;
mod canister;
mod cleanup;
mod constants;
mod journal;
mod providers;
mod scheduler;
pub mod selector;
mod state;
mod types;
mod utils;

// Types named by the endpoint signatures, resolved by `export_candid!`
use crate::{
    agent::{dashboard::Recommendation, settings::SettingsQuery},
    journal::StableJournalCollection,
    scheduler::AgentStatus,
    selector::Allocation,
    types::InitArgs,
    utils::error::ManagerResult,
};

ic_cdk::export_candid!();
