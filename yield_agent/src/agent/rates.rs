//! Rate sources that feed the selector with one APY per pool

use candid::{CandidType, Principal};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use serde::Deserialize;

use crate::{
    constants::{POOL_COUNT, RATE_MAX_AGE_INTERVALS, SIMULATED_APY_MAX, SIMULATED_APY_MIN},
    state::RATE_SOURCE,
    types::RateSourceKind,
    utils::{
        common::now_secs,
        error::{invalid_parameter, ManagerError, ManagerResult},
    },
};

/// Produces one yield sample per pool, indexed by pool identity.
#[cfg_attr(test, mockall::automock)]
pub trait RateSource {
    fn sample(&mut self) -> ManagerResult<Vec<f64>>;
}

/// Uniformly distributed APYs in `[SIMULATED_APY_MIN, SIMULATED_APY_MAX)`.
/// Sampling fails until the RNG is seeded.
#[derive(Clone, Debug)]
pub struct SimulatedRateSource {
    rng: Option<ChaCha8Rng>,
    pools: usize,
}

impl SimulatedRateSource {
    pub fn new(pools: usize) -> Self {
        Self { rng: None, pools }
    }

    /// Seeds the RNG. Seeding again restarts the sequence.
    pub fn seed(&mut self, seed: [u8; 32]) -> &mut Self {
        self.rng = Some(ChaCha8Rng::from_seed(seed));
        self
    }
}

impl RateSource for SimulatedRateSource {
    fn sample(&mut self) -> ManagerResult<Vec<f64>> {
        let rng = self.rng.as_mut().ok_or(ManagerError::NonExistentValue)?;
        Ok((0..self.pools)
            .map(|_| rng.gen_range(SIMULATED_APY_MIN..SIMULATED_APY_MAX))
            .collect())
    }
}

/// A set of rates pushed by a reporter
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub struct RateReport {
    pub rates: Vec<f64>,
    pub reported_at: u64,
    pub reporter: Principal,
}

impl RateReport {
    /// Validates the rates: one finite value per pool.
    pub fn new(
        rates: Vec<f64>,
        pools: usize,
        reporter: Principal,
        reported_at: u64,
    ) -> ManagerResult<Self> {
        if rates.len() != pools {
            return Err(invalid_parameter(format!(
                "expected {} rates, got {}",
                pools,
                rates.len()
            )));
        }

        if let Some(index) = rates.iter().position(|rate| !rate.is_finite()) {
            return Err(invalid_parameter(format!(
                "the rate of pool {} is not a finite number",
                index
            )));
        }

        Ok(Self {
            rates,
            reported_at,
            reporter,
        })
    }
}

/// Serves the latest report as long as it is younger than `max_age_secs`.
#[derive(Clone, Debug, Default)]
pub struct ReportedRateSource {
    latest: Option<RateReport>,
    max_age_secs: u64,
}

impl ReportedRateSource {
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            latest: None,
            max_age_secs,
        }
    }

    pub fn report(&mut self, report: RateReport) -> &mut Self {
        self.latest = Some(report);
        self
    }
}

impl RateSource for ReportedRateSource {
    fn sample(&mut self) -> ManagerResult<Vec<f64>> {
        let report = self.latest.as_ref().ok_or(ManagerError::NonExistentValue)?;
        let age = now_secs().saturating_sub(report.reported_at);
        if age > self.max_age_secs {
            return Err(ManagerError::StaleRates(age));
        }
        Ok(report.rates.clone())
    }
}

/// The rate source configured for the canister
#[derive(Clone, Debug)]
pub enum AgentRateSource {
    Simulated(SimulatedRateSource),
    Reported(ReportedRateSource),
}

impl Default for AgentRateSource {
    fn default() -> Self {
        Self::Simulated(SimulatedRateSource::new(POOL_COUNT))
    }
}

impl AgentRateSource {
    /// Builds the configured source. Reports expire after `RATE_MAX_AGE_INTERVALS` intervals.
    pub fn configured(kind: RateSourceKind, interval_secs: u64) -> Self {
        match kind {
            RateSourceKind::Simulated => Self::Simulated(SimulatedRateSource::new(POOL_COUNT)),
            RateSourceKind::Reported => Self::Reported(ReportedRateSource::new(
                interval_secs.saturating_mul(RATE_MAX_AGE_INTERVALS),
            )),
        }
    }

    /// Stores a report, if the agent is fed by reporters
    pub fn report(&mut self, report: RateReport) -> ManagerResult<()> {
        match self {
            AgentRateSource::Reported(source) => {
                source.report(report);
                Ok(())
            }
            AgentRateSource::Simulated(_) => Err(ManagerError::Custom(
                "The agent samples simulated rates and does not accept reports.".to_string(),
            )),
        }
    }
}

impl RateSource for AgentRateSource {
    fn sample(&mut self) -> ManagerResult<Vec<f64>> {
        match self {
            AgentRateSource::Simulated(source) => source.sample(),
            AgentRateSource::Reported(source) => source.sample(),
        }
    }
}

/// Rate source backed by the canister state.
/// Every sample borrows `RATE_SOURCE` only for the duration of the call.
pub struct StateRateSource;

impl RateSource for StateRateSource {
    fn sample(&mut self) -> ManagerResult<Vec<f64>> {
        RATE_SOURCE.with(|source| source.borrow_mut().sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_simulation_fails() {
        let mut source = SimulatedRateSource::new(POOL_COUNT);
        assert_eq!(source.sample(), Err(ManagerError::NonExistentValue));
    }

    #[test]
    fn simulated_rates_are_in_range() {
        let mut source = SimulatedRateSource::new(POOL_COUNT);
        source.seed([7; 32]);

        for _ in 0..20 {
            let rates = source.sample().unwrap();
            assert_eq!(rates.len(), POOL_COUNT);
            assert!(rates
                .iter()
                .all(|rate| (SIMULATED_APY_MIN..SIMULATED_APY_MAX).contains(rate)));
        }
    }

    #[test]
    fn same_seed_gives_same_rates() {
        let mut first = SimulatedRateSource::new(5);
        let mut second = SimulatedRateSource::new(5);
        first.seed([42; 32]);
        second.seed([42; 32]);
        assert_eq!(first.sample().unwrap(), second.sample().unwrap());
    }

    #[test]
    fn report_validation() {
        let reporter = Principal::anonymous();
        assert!(RateReport::new(vec![1.0; 3], 3, reporter, 0).is_ok());
        assert!(matches!(
            RateReport::new(vec![1.0; 2], 3, reporter, 0),
            Err(ManagerError::InvalidParameter(_))
        ));
        assert!(matches!(
            RateReport::new(vec![1.0, f64::NAN, 2.0], 3, reporter, 0),
            Err(ManagerError::InvalidParameter(_))
        ));
        assert!(matches!(
            RateReport::new(vec![1.0, f64::INFINITY, 2.0], 3, reporter, 0),
            Err(ManagerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn reported_source_serves_fresh_reports() {
        let mut source = ReportedRateSource::new(1_200);
        assert_eq!(source.sample(), Err(ManagerError::NonExistentValue));

        let report = RateReport::new(vec![4.0, 2.0], 2, Principal::anonymous(), now_secs()).unwrap();
        source.report(report);
        assert_eq!(source.sample().unwrap(), vec![4.0, 2.0]);
    }

    #[test]
    fn reported_source_rejects_stale_reports() {
        let mut source = ReportedRateSource::new(1_200);
        let reported_at = now_secs() - 5_000;
        source.report(RateReport::new(vec![4.0], 1, Principal::anonymous(), reported_at).unwrap());
        assert!(matches!(source.sample(), Err(ManagerError::StaleRates(age)) if age >= 5_000));
    }

    #[test]
    fn configured_sources() {
        let mut simulated = AgentRateSource::configured(RateSourceKind::Simulated, 600);
        let report = RateReport::new(
            vec![1.0; POOL_COUNT],
            POOL_COUNT,
            Principal::anonymous(),
            now_secs(),
        )
        .unwrap();
        assert!(matches!(
            simulated.report(report.clone()),
            Err(ManagerError::Custom(_))
        ));

        let mut reported = AgentRateSource::configured(RateSourceKind::Reported, 600);
        match &reported {
            AgentRateSource::Reported(source) => assert_eq!(source.max_age_secs, 1_200),
            AgentRateSource::Simulated(_) => panic!("expected a reported source"),
        }
        assert!(reported.report(report).is_ok());
        assert_eq!(reported.sample().unwrap(), vec![1.0; POOL_COUNT]);
    }

    #[test]
    fn state_source_delegates_to_the_configured_source() {
        RATE_SOURCE.with(|source| {
            let mut simulated = SimulatedRateSource::new(POOL_COUNT);
            simulated.seed([1; 32]);
            *source.borrow_mut() = AgentRateSource::Simulated(simulated);
        });

        let rates = StateRateSource.sample().unwrap();
        assert_eq!(rates.len(), POOL_COUNT);
    }
}
