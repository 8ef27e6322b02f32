//! Interval scheduler driving the agent's cycles.
//!
//! The loop is an interval timer that can be started and stopped at any time. Stopping
//! clears the timer: a cycle already in flight finishes, and no new cycle is started.

use std::time::Duration;

use candid::CandidType;
use ic_cdk::spawn;
use ic_cdk_timers::{clear_timer, set_timer, set_timer_interval, TimerId};
use serde::Deserialize;

use crate::{
    agent::{rates::AgentRateSource, run::execute_cycle},
    cleanup::daily_cleanup,
    constants::CLEANUP_INTERVAL_SECS,
    journal::{JournalCollection, LogType},
    state::{RATE_SOURCE, SCHEDULER},
    utils::{
        common::{now_secs, random_seed},
        error::{invalid_parameter, ManagerResult},
    },
};

/// Status of the cycle loop
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum AgentStatus {
    Running {
        /// Time the loop was started, in seconds
        since: u64,
        interval_secs: u64,
    },
    Stopped {
        /// Time the loop was stopped, in seconds (0 if it never ran)
        at: u64,
        reason: Option<String>,
    },
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Stopped { at: 0, reason: None }
    }
}

#[derive(Default)]
pub struct SchedulerState {
    timer: Option<TimerId>,
    cleanup_timer: Option<TimerId>,
    status: AgentStatus,
}

impl SchedulerState {
    pub fn status(&self) -> AgentStatus {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, AgentStatus::Running { .. })
    }

    /// Records a started loop. Returns the timer it replaces, if any.
    pub fn running(&mut self, timer: TimerId, since: u64, interval_secs: u64) -> Option<TimerId> {
        self.status = AgentStatus::Running {
            since,
            interval_secs,
        };
        self.timer.replace(timer)
    }

    /// Records a stopped loop. Returns the timer that has to be cleared, if any.
    pub fn stopped(&mut self, at: u64, reason: Option<String>) -> Option<TimerId> {
        self.status = AgentStatus::Stopped { at, reason };
        self.timer.take()
    }
}

async fn tick() {
    // every failure path of `execute_cycle` writes its own journal entry
    let _ = execute_cycle().await;
}

/// Starts the cycle loop with the given interval. Does nothing if it is already running.
pub fn start(interval_secs: u64) -> ManagerResult<AgentStatus> {
    if interval_secs == 0 {
        return Err(invalid_parameter("interval_secs must be positive"));
    }

    if SCHEDULER.with(|scheduler| scheduler.borrow().is_running()) {
        return Ok(status());
    }

    let timer = set_timer_interval(Duration::from_secs(interval_secs), || spawn(tick()));
    let replaced = SCHEDULER.with(|scheduler| {
        scheduler
            .borrow_mut()
            .running(timer, now_secs(), interval_secs)
    });
    if let Some(replaced) = replaced {
        clear_timer(replaced);
    }

    JournalCollection::open(None).append_note(
        Ok(()),
        LogType::Scheduler,
        format!("Started the agent with a {}s interval.", interval_secs),
    );

    Ok(status())
}

/// Stops the cycle loop.
pub fn stop(reason: Option<String>) -> AgentStatus {
    if !SCHEDULER.with(|scheduler| scheduler.borrow().is_running()) {
        return status();
    }

    let note = format!(
        "Stopped the agent. Reason: {}",
        reason.as_deref().unwrap_or("none given")
    );
    let timer = SCHEDULER.with(|scheduler| scheduler.borrow_mut().stopped(now_secs(), reason));
    if let Some(timer) = timer {
        clear_timer(timer);
    }

    JournalCollection::open(None).append_note(Ok(()), LogType::Scheduler, note);

    status()
}

pub fn status() -> AgentStatus {
    SCHEDULER.with(|scheduler| scheduler.borrow().status())
}

/// Installs the daily journal and reputation cleanup
pub fn start_cleanup_timer() {
    let timer = set_timer_interval(Duration::from_secs(CLEANUP_INTERVAL_SECS), || {
        spawn(daily_cleanup())
    });

    let previous = SCHEDULER.with(|scheduler| scheduler.borrow_mut().cleanup_timer.replace(timer));
    if let Some(previous) = previous {
        clear_timer(previous);
    }
}

/// Seeds the simulated rate source. Does nothing for other sources.
pub fn apply_seed(seed: [u8; 32]) -> bool {
    RATE_SOURCE.with(|source| match &mut *source.borrow_mut() {
        AgentRateSource::Simulated(simulated) => {
            simulated.seed(seed);
            true
        }
        AgentRateSource::Reported(_) => false,
    })
}

async fn seed_rate_source() {
    let mut journal = JournalCollection::open(None);

    match random_seed().await {
        Ok(seed) => {
            if apply_seed(seed) {
                journal.append_note(Ok(()), LogType::Info, "Seeded the simulated rate source.");
            }
        }
        Err(err) => {
            journal.append_note(
                Err(err),
                LogType::Info,
                "Failed to fetch randomness for the simulated rate source.",
            );
        }
    };
}

/// Seeds the simulated rate source right after the current call returns.
/// `raw_rand` is not callable from `init`, hence the zero-delay timer.
pub fn schedule_seeding() {
    set_timer(Duration::ZERO, || spawn(seed_rate_source()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::rates::{RateSource, ReportedRateSource, SimulatedRateSource};
    use crate::constants::POOL_COUNT;

    #[test]
    fn new_scheduler_is_stopped() {
        let scheduler = SchedulerState::default();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.status(), AgentStatus::Stopped { at: 0, reason: None });
    }

    #[test]
    fn running_and_stopped_transitions() {
        let mut scheduler = SchedulerState::default();
        assert_eq!(scheduler.running(TimerId::default(), 100, 600), None);
        assert!(scheduler.is_running());
        assert_eq!(
            scheduler.status(),
            AgentStatus::Running {
                since: 100,
                interval_secs: 600
            }
        );

        let cleared = scheduler.stopped(700, Some("maintenance".to_string()));
        assert_eq!(cleared, Some(TimerId::default()));
        assert_eq!(
            scheduler.status(),
            AgentStatus::Stopped {
                at: 700,
                reason: Some("maintenance".to_string())
            }
        );

        // a second stop has no timer left to clear
        assert_eq!(scheduler.stopped(800, None), None);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(start(0).is_err());
    }

    #[test]
    fn stopping_a_stopped_agent_is_a_no_op() {
        assert_eq!(stop(Some("nothing to stop".to_string())), status());
        assert!(!SCHEDULER.with(|scheduler| scheduler.borrow().is_running()));
    }

    #[test]
    fn seed_reaches_the_simulated_source_only() {
        RATE_SOURCE.with(|source| {
            *source.borrow_mut() = AgentRateSource::Simulated(SimulatedRateSource::new(POOL_COUNT))
        });
        assert!(apply_seed([9; 32]));
        let rates = RATE_SOURCE.with(|source| source.borrow_mut().sample());
        assert_eq!(rates.map(|rates| rates.len()), Ok(POOL_COUNT));

        RATE_SOURCE.with(|source| {
            *source.borrow_mut() = AgentRateSource::Reported(ReportedRateSource::new(1_200))
        });
        assert!(!apply_seed([9; 32]));
    }
}
