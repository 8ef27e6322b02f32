//! Cleanup functionality for managing the journal and provider reputations.
//!
//! Runs once a day:
//! 1. **Journal**: drops collections that only hold reputation changes, then keeps the most
//!    recent `JOURNAL_CAPACITY` collections.
//! 2. **Provider reputations**: resets every score to zero and shuffles the provider list
//!    with an RNG seeded from the IC's randomness, so early winners do not stay on top forever.

use rand::seq::SliceRandom;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

use crate::{
    constants::JOURNAL_CAPACITY,
    journal::{JournalCollection, LogType},
    state::{JOURNAL, RPC_REPUTATIONS},
    utils::{common::random_seed, error::ManagerResult},
};

/// Performs the daily cleanup and journals its outcome.
pub async fn daily_cleanup() {
    let removed = journal_cleanup();

    // opened after the journal cleanup, so it is never pruned by it
    let mut journal = JournalCollection::open(None);
    journal.append_note(
        Ok(()),
        LogType::Info,
        format!("Removed {} journal collections.", removed),
    );

    match reputations_cleanup().await {
        Ok(()) => journal.append_note(
            Ok(()),
            LogType::Info,
            "Reset provider reputations back to zero and shuffled the list.",
        ),
        Err(err) => journal.append_note(
            Err(err),
            LogType::Info,
            "Failed to reset the provider reputations list.",
        ),
    };
}

/// Resets the provider reputations and shuffles the providers with `seed`
pub fn reset_reputations(seed: [u8; 32]) {
    let mut rng = ChaCha8Rng::from_seed(seed);

    RPC_REPUTATIONS.with(|reputations| {
        let mut reputations = reputations.borrow_mut();
        reputations.shuffle(&mut rng);
        reputations.iter_mut().for_each(|(score, _)| *score = 0);
    });
}

/// Resets and randomizes the RPC provider reputation rankings.
pub async fn reputations_cleanup() -> ManagerResult<()> {
    let seed = random_seed().await?;
    reset_reputations(seed);
    Ok(())
}

/// Prunes the journal. Returns the number of removed collections.
pub fn journal_cleanup() -> u64 {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();

        let mut stale_keys: Vec<u64> = journal
            .iter()
            .filter(|(_, collection)| collection.is_reputation_change())
            .map(|(key, _)| key)
            .collect();

        let kept = journal.len() - stale_keys.len() as u64;
        if kept > JOURNAL_CAPACITY {
            let excess = (kept - JOURNAL_CAPACITY) as usize;
            // keys grow with time, so the first ones are the oldest
            let oldest: Vec<u64> = journal
                .iter()
                .filter(|(_, collection)| !collection.is_reputation_change())
                .map(|(key, _)| key)
                .take(excess)
                .collect();
            stale_keys.extend(oldest);
        }

        stale_keys.iter().for_each(|key| {
            journal.remove(key);
        });

        stale_keys.len() as u64
    })
}
