use crate::{
    journal::{JournalCollection, LogType},
    state::{next_cycle, settings},
    utils::error::{ManagerError, ManagerResult},
};

use super::{
    cycle::run_cycle,
    dashboard::{Recommendation, StateDashboard},
    lock::CycleGuard,
    rates::StateRateSource,
    submitter::{EvmSubmitter, SubmitterConfig},
};

/// Runs one cycle with the canister's collaborators.
/// Fails with `ManagerError::Locked` while another cycle is in flight.
pub async fn execute_cycle() -> ManagerResult<Recommendation> {
    let settings = match settings() {
        Some(settings) => settings,
        None => {
            JournalCollection::open(None).append_note(
                Err(ManagerError::NonExistentValue),
                LogType::Scheduler,
                "The agent has no settings. Skipping this tick.",
            );
            return Err(ManagerError::NonExistentValue);
        }
    };

    // held until the end of the cycle, across every await point
    let _guard = match CycleGuard::acquire() {
        Ok(guard) => guard,
        Err(err) => {
            JournalCollection::open(None).append_note(
                Err(err.clone()),
                LogType::Scheduler,
                "A cycle is already running. Skipping this tick.",
            );
            return Err(err);
        }
    };

    let cycle = next_cycle();
    let mut journal = JournalCollection::open(Some(cycle));
    journal.append_note(Ok(()), LogType::Info, "Cycle started.");

    let submitter = EvmSubmitter::new(SubmitterConfig::from(&settings));

    run_cycle(
        cycle,
        settings.top_n,
        &mut StateRateSource,
        &submitter,
        &mut StateDashboard,
        &mut journal,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::settings::{tests::init_args, AgentSettings},
        journal::StableJournalCollection,
        state::{JOURNAL, SETTINGS},
    };

    fn last_collection() -> Option<StableJournalCollection> {
        JOURNAL.with(|journal| journal.borrow().last_key_value().map(|(_, collection)| collection))
    }

    #[tokio::test]
    async fn locked_cycle_is_skipped_and_journaled() {
        let settings = AgentSettings::try_from(init_args()).unwrap();
        SETTINGS.with(|state| *state.borrow_mut() = Some(settings));

        let _running = CycleGuard::acquire().unwrap();
        assert_eq!(execute_cycle().await, Err(ManagerError::Locked));

        let collection = last_collection().unwrap();
        assert_eq!(collection.cycle, None);
        assert_eq!(collection.entries[0].log_type, LogType::Scheduler);
        assert_eq!(collection.entries[0].entry, Err(ManagerError::Locked));
    }

    #[tokio::test]
    async fn missing_settings_are_journaled() {
        SETTINGS.with(|state| *state.borrow_mut() = None);

        assert_eq!(execute_cycle().await, Err(ManagerError::NonExistentValue));

        let collection = last_collection().unwrap();
        assert_eq!(collection.entries[0].log_type, LogType::Scheduler);
        assert_eq!(collection.entries[0].entry, Err(ManagerError::NonExistentValue));
    }
}
