//! Journal of the agent's activity
//!
//! Every unit of work (a cycle, a cleanup, a scheduler change) opens a [`JournalCollection`]
//! and appends entries to it. The collection is committed to stable memory when it is dropped.

use std::borrow::Cow;

use candid::{CandidType, Decode, Encode};
use ic_stable_structures::{storable::Bound, Storable};
use serde::Deserialize;

use crate::{
    constants::{MAX_JOURNAL_ENTRIES, MAX_NOTE_LENGTH},
    state::insert_journal_collection,
    utils::{
        common::{now_secs, print, truncate},
        error::ManagerResult,
    },
};

/// Category of a journal entry
#[derive(Clone, Copy, CandidType, Debug, Deserialize, PartialEq, Eq)]
pub enum LogType {
    Info,
    RateSample,
    Selection,
    Submission,
    Dashboard,
    Scheduler,
    ProviderReputationChange,
}

/// Journal entry
#[derive(Clone, CandidType, Debug, Deserialize)]
pub struct JournalEntry {
    pub timestamp: u64,
    pub entry: ManagerResult<()>,
    pub log_type: LogType,
    pub note: Option<String>,
}

/// Runtime journal collection.
/// Commits itself to the stable journal when it goes out of scope.
pub struct JournalCollection {
    pub start_date_and_time: u64,
    pub cycle: Option<u64>,
    pub entries: Vec<JournalEntry>,
    /// Entries that did not fit into the collection
    pub dropped_entries: u32,
}

impl JournalCollection {
    /// Opens a new collection, optionally bound to a cycle number
    pub fn open(cycle: Option<u64>) -> Self {
        Self {
            start_date_and_time: now_secs(),
            cycle,
            entries: vec![],
            dropped_entries: 0,
        }
    }

    /// Appends an entry to the collection and echoes it to the debug log
    pub fn append_note<S: AsRef<str>>(
        &mut self,
        entry: ManagerResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        let note = truncate(note.as_ref(), MAX_NOTE_LENGTH);

        print(format!(
            "[{:?}] cycle={:?} {} {}",
            log_type,
            self.cycle,
            match &entry {
                Ok(()) => "ok".to_string(),
                Err(err) => format!("err={}", err),
            },
            note
        ));

        if self.entries.len() >= MAX_JOURNAL_ENTRIES {
            self.dropped_entries += 1;
            return self;
        }

        self.entries.push(JournalEntry {
            timestamp: now_secs(),
            entry,
            log_type,
            note: Some(note),
        });
        self
    }
}

impl Drop for JournalCollection {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            insert_journal_collection(StableJournalCollection::from(&*self));
        }
    }
}

/// Journal collection as kept in stable memory
#[derive(Clone, CandidType, Debug, Deserialize)]
pub struct StableJournalCollection {
    pub start_date_and_time: u64,
    pub end_date_and_time: u64,
    pub cycle: Option<u64>,
    pub entries: Vec<JournalEntry>,
    pub dropped_entries: u32,
}

impl StableJournalCollection {
    /// Returns `true` if every entry is a provider reputation change
    pub fn is_reputation_change(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|entry| entry.log_type == LogType::ProviderReputationChange)
    }
}

impl From<&JournalCollection> for StableJournalCollection {
    fn from(value: &JournalCollection) -> Self {
        Self {
            start_date_and_time: value.start_date_and_time,
            end_date_and_time: now_secs(),
            cycle: value.cycle,
            entries: value.entries.clone(),
            dropped_entries: value.dropped_entries,
        }
    }
}

impl Storable for StableJournalCollection {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(Encode!(self).unwrap())
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        Decode!(bytes.as_ref(), Self).unwrap()
    }

    const BOUND: Bound = Bound::Unbounded;
}
