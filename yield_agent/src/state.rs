use std::cell::{Cell, RefCell};

use ic_stable_structures::{
    memory_manager::{MemoryId, MemoryManager, VirtualMemory},
    BTreeMap as StableBTreeMap, DefaultMemoryImpl,
};

use crate::{
    agent::{
        dashboard::DashboardBoard, lock::CycleLock, rates::AgentRateSource,
        settings::AgentSettings,
    },
    journal::StableJournalCollection,
    scheduler::SchedulerState,
};

type Memory = VirtualMemory<DefaultMemoryImpl>;

const JOURNAL_MEMORY_ID: MemoryId = MemoryId::new(0);

thread_local! {
    pub static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));

    /// Journal collections keyed by an increasing sequence number
    pub static JOURNAL: RefCell<StableBTreeMap<u64, StableJournalCollection, Memory>> =
        RefCell::new(StableBTreeMap::init(
            MEMORY_MANAGER.with(|manager| manager.borrow().get(JOURNAL_MEMORY_ID)),
        ));

    pub static SETTINGS: RefCell<Option<AgentSettings>> = const { RefCell::new(None) };
    pub static RATE_SOURCE: RefCell<AgentRateSource> = RefCell::new(AgentRateSource::default());
    pub static DASHBOARD: RefCell<DashboardBoard> = RefCell::new(DashboardBoard::default());
    pub static CYCLE_LOCK: RefCell<CycleLock> = RefCell::new(CycleLock::default());
    pub static CYCLE_COUNTER: Cell<u64> = const { Cell::new(0) };
    pub static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());

    /// RPC provider URLs and their reputation scores
    pub static RPC_REPUTATIONS: RefCell<Vec<(i64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Appends a collection to the stable journal
pub fn insert_journal_collection(collection: StableJournalCollection) {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();
        let key = journal
            .last_key_value()
            .map(|(key, _)| key + 1)
            .unwrap_or_default();
        journal.insert(key, collection);
    });
}

/// Returns the current settings, if the agent was initialized
pub fn settings() -> Option<AgentSettings> {
    SETTINGS.with(|settings| settings.borrow().clone())
}

/// Increments the cycle counter and returns the new cycle number
pub fn next_cycle() -> u64 {
    CYCLE_COUNTER.with(|counter| {
        let next = counter.get() + 1;
        counter.set(next);
        next
    })
}
