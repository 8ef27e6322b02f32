//! Canister entry points

use candid::Principal;
use ic_cdk::{caller, init, post_upgrade, query, trap, update};

use crate::{
    agent::{
        dashboard::Recommendation,
        rates::{AgentRateSource, RateReport},
        run::execute_cycle,
        settings::{AgentSettings, SettingsQuery},
        submitter::{EvmSubmitter, SubmitterConfig},
    },
    constants::POOL_COUNT,
    journal::{JournalCollection, LogType, StableJournalCollection},
    providers::set_providers,
    scheduler::{self, AgentStatus},
    selector::{select, Allocation},
    state::{settings, DASHBOARD, JOURNAL, RATE_SOURCE, SETTINGS},
    types::InitArgs,
    utils::{
        common::{now_secs, only_controller},
        error::{ManagerError, ManagerResult},
    },
};

// INITIALIZATION
#[init]
fn init(args: InitArgs) {
    setup(args);
}

// Heap state does not survive upgrades, so the agent is set up again from the upgrade arguments.
#[post_upgrade]
fn post_upgrade(args: InitArgs) {
    setup(args);
}

fn setup(args: InitArgs) {
    let rpc_urls = args.rpc_urls.clone();
    let settings = AgentSettings::try_from(args).unwrap_or_else(|err| trap(&err.to_string()));
    let interval_secs = settings.interval_secs;

    set_providers(rpc_urls);
    RATE_SOURCE.with(|source| {
        *source.borrow_mut() = AgentRateSource::configured(settings.rate_source, interval_secs)
    });
    SETTINGS.with(|state| *state.borrow_mut() = Some(settings));

    JournalCollection::open(None).append_note(
        Ok(()),
        LogType::Info,
        "Agent settings are applied.",
    );

    scheduler::schedule_seeding();
    scheduler::start_cleanup_timer();
    if let Err(err) = scheduler::start(interval_secs) {
        trap(&err.to_string());
    }
}

fn configured_settings() -> ManagerResult<AgentSettings> {
    settings().ok_or(ManagerError::NonExistentValue)
}

/// Returns Err unless `caller` may push rates
fn only_reporter(caller: Principal, reporters: &[Principal]) -> ManagerResult<()> {
    if reporters.contains(&caller) {
        return Ok(());
    }
    only_controller(caller)
}

// SCHEDULER
#[update]
fn start_agent() -> ManagerResult<AgentStatus> {
    only_controller(caller())?;
    let settings = configured_settings()?;
    scheduler::start(settings.interval_secs)
}

#[update]
fn stop_agent(reason: Option<String>) -> ManagerResult<AgentStatus> {
    only_controller(caller())?;
    Ok(scheduler::stop(reason))
}

#[update]
async fn run_cycle() -> ManagerResult<Recommendation> {
    only_controller(caller())?;
    execute_cycle().await
}

#[query]
fn get_status() -> AgentStatus {
    scheduler::status()
}

// RATES
#[update]
fn report_rates(rates: Vec<f64>) -> ManagerResult<()> {
    let caller = caller();
    let settings = configured_settings()?;
    only_reporter(caller, &settings.reporters)?;

    let report = RateReport::new(rates, POOL_COUNT, caller, now_secs())?;
    RATE_SOURCE.with(|source| source.borrow_mut().report(report))
}

#[query]
fn preview_allocation(rates: Vec<f64>, top_n: u8) -> ManagerResult<Allocation> {
    select(&rates, top_n as usize)
}

// SETTINGS
#[query]
fn get_settings() -> ManagerResult<SettingsQuery> {
    configured_settings().map(SettingsQuery::from)
}

#[update]
async fn get_signer_address() -> ManagerResult<String> {
    only_controller(caller())?;
    let settings = configured_settings()?;
    let submitter = EvmSubmitter::new(SubmitterConfig::from(&settings));
    submitter
        .signer_address()
        .await
        .map(|address| address.to_string())
}

// DASHBOARD
#[query]
fn get_recommendation() -> Option<Recommendation> {
    DASHBOARD.with(|board| board.borrow().latest().cloned())
}

#[query]
fn get_recommendations(depth: u64) -> Vec<Recommendation> {
    DASHBOARD.with(|board| board.borrow().recent(depth as usize))
}

#[query]
fn get_dashboard_json(depth: u64) -> ManagerResult<String> {
    DASHBOARD.with(|board| board.borrow().to_json(depth as usize))
}

// JOURNAL
/// Returns the latest `depth` journal collections, newest first
#[query]
fn get_logs(depth: u64) -> Vec<StableJournalCollection> {
    JOURNAL.with(|journal| {
        let journal = journal.borrow();
        let skip = journal.len().saturating_sub(depth);
        let mut collections: Vec<StableJournalCollection> = journal
            .iter()
            .skip(skip as usize)
            .map(|(_, collection)| collection)
            .collect();
        collections.reverse();
        collections
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporters_are_allowed_without_controller_rights() {
        let reporter = Principal::from_slice(&[7; 29]);
        assert_eq!(only_reporter(reporter, &[reporter]), Ok(()));
    }

    #[test]
    fn preview_runs_the_selector() {
        assert_eq!(
            preview_allocation(vec![10.0, 8.0, 15.0, 3.0, 1.0], 3).unwrap(),
            Allocation(vec![3_333, 3_334, 3_333, 0, 0])
        );
        assert!(matches!(
            preview_allocation(vec![], 1),
            Err(ManagerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn logs_are_served_newest_first() {
        for note in ["older", "newer"] {
            JournalCollection::open(None).append_note(Ok(()), LogType::Info, note);
        }

        let logs = get_logs(2);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].entries[0].note.as_deref(), Some("newer"));
        assert_eq!(logs[1].entries[0].note.as_deref(), Some("older"));
    }

    #[test]
    fn settings_are_missing_before_install() {
        assert_eq!(get_settings().err(), Some(ManagerError::NonExistentValue));
    }
}
