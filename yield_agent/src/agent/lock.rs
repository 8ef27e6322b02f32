//! Cycle Locking System
//!
//! A timeout-based lock that keeps two cycles from overlapping while still recovering
//! from a cycle that never released it (e.g. a trapped callback).
//!
//! ```plain
//! Lock State Machine:
//!
//!                   ┌──────────┐
//!              ┌────► Unlocked │◄─────┐
//!              │    └──────────┘      │
//!              │         │            │
//! Auto-Unlock  │     try_lock     guard drop
//! (Timeout)    │         │            │
//!              │         ▼            │
//!              │    ┌─────────┐       │
//!              └────┤ Locked  ├───────┘
//!                   └─────────┘
//!
//! Timeout = CYCLE_LOCK_TIMEOUT (3600s)
//! ```

use crate::{
    constants::CYCLE_LOCK_TIMEOUT,
    state::CYCLE_LOCK,
    utils::{
        common::now_secs,
        error::{ManagerError, ManagerResult},
    },
};

/// Runtime lock with automatic timeout recovery.
#[derive(Clone, Debug, Default)]
pub struct CycleLock {
    /// Current lock state
    pub is_locked: bool,
    /// Last successful lock acquisition time, in seconds
    pub last_locked_at: Option<u64>,
    /// Incremented on every acquisition, identifies the current holder
    pub generation: u64,
}

impl CycleLock {
    /// Attempts to acquire the lock at `now` (seconds).
    ///
    /// Succeeds if the lock is free, or if the current holder has exceeded the timeout.
    /// Returns the generation that identifies the new holder.
    pub fn try_lock_at(&mut self, now: u64) -> ManagerResult<u64> {
        if let Some(last_locked_at) = self.last_locked_at {
            if self.is_locked && now.saturating_sub(last_locked_at) > CYCLE_LOCK_TIMEOUT {
                self.is_locked = false;
            }
        }

        if !self.is_locked {
            self.is_locked = true;
            self.last_locked_at = Some(now);
            self.generation = self.generation.wrapping_add(1);
            Ok(self.generation)
        } else {
            Err(ManagerError::Locked)
        }
    }

    /// Releases the lock if `generation` still holds it.
    /// A holder whose lock expired and was taken over releases nothing.
    pub fn release(&mut self, generation: u64) -> &mut Self {
        if self.is_locked && self.generation == generation {
            self.is_locked = false;
            self.last_locked_at = None;
        }
        self
    }
}

/// Holds the global cycle lock until dropped.
pub struct CycleGuard {
    generation: u64,
}

impl CycleGuard {
    /// Takes the global cycle lock, failing with `ManagerError::Locked` if a cycle is running.
    pub fn acquire() -> ManagerResult<Self> {
        let generation = CYCLE_LOCK.with(|lock| lock.borrow_mut().try_lock_at(now_secs()))?;
        Ok(Self { generation })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        CYCLE_LOCK.with(|lock| {
            lock.borrow_mut().release(self.generation);
        });
    }
}
