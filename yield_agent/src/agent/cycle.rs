//! One pass of the agent: sample, select, submit and publish.

use crate::{
    constants::MAX_RETRY_ATTEMPTS,
    journal::{JournalCollection, LogType},
    selector::{rank, select, Allocation},
    utils::{common::now_secs, error::ManagerResult},
};

use super::{
    dashboard::{DashboardSink, Recommendation, SubmissionOutcome},
    rates::RateSource,
    submitter::ChainSubmitter,
};

/// Runs a single cycle against the given collaborators.
///
/// Only sampling and selection errors are returned. A failed submission is journaled
/// and recorded in the published recommendation; it never aborts the cycle.
pub async fn run_cycle<R, C, D>(
    cycle: u64,
    top_n: usize,
    source: &mut R,
    submitter: &C,
    sink: &mut D,
    journal: &mut JournalCollection,
) -> ManagerResult<Recommendation>
where
    R: RateSource,
    C: ChainSubmitter,
    D: DashboardSink,
{
    let rates = match source.sample() {
        Ok(rates) => {
            journal.append_note(
                Ok(()),
                LogType::RateSample,
                format!("Sampled rates {}", format_rates(&rates)),
            );
            rates
        }
        Err(err) => {
            journal.append_note(
                Err(err.clone()),
                LogType::RateSample,
                "Could not sample the rates. Skipping the cycle.",
            );
            return Err(err);
        }
    };

    let allocation = match select(&rates, top_n) {
        Ok(allocation) => allocation,
        Err(err) => {
            journal.append_note(
                Err(err.clone()),
                LogType::Selection,
                "The allocation could not be selected.",
            );
            return Err(err);
        }
    };

    // select succeeded, so ranking the same rates cannot fail
    let ranked_winners: Vec<u64> = rank(&rates)?
        .into_iter()
        .take(top_n)
        .map(|index| index as u64)
        .collect();

    journal.append_note(
        Ok(()),
        LogType::Selection,
        format!(
            "Winners {:?}, allocation {:?}",
            ranked_winners,
            allocation.as_slice()
        ),
    );

    let submission = submit_with_retries(submitter, &allocation, journal).await;

    let recommendation = Recommendation {
        cycle,
        timestamp: now_secs(),
        rates,
        allocation,
        ranked_winners,
        submission,
    };

    sink.publish(recommendation.clone());
    journal.append_note(
        Ok(()),
        LogType::Dashboard,
        format!("Published the recommendation of cycle {}.", cycle),
    );

    Ok(recommendation)
}

/// Renders rates with two decimals so a full sample fits into one journal note
fn format_rates(rates: &[f64]) -> String {
    let rates: Vec<String> = rates.iter().map(|rate| format!("{:.2}", rate)).collect();
    format!("[{}]", rates.join(", "))
}

async fn submit_with_retries<C: ChainSubmitter>(
    submitter: &C,
    allocation: &Allocation,
    journal: &mut JournalCollection,
) -> SubmissionOutcome {
    let mut last_error = String::new();

    for turn in 1..=MAX_RETRY_ATTEMPTS {
        match submitter.submit(allocation).await {
            Ok(receipt) => {
                journal.append_note(
                    Ok(()),
                    LogType::Submission,
                    format!(
                        "Submitted the rebalance. Attempt {}/{}, nonce {}, hash {:?}",
                        turn, MAX_RETRY_ATTEMPTS, receipt.nonce, receipt.tx_hash
                    ),
                );
                return SubmissionOutcome::Submitted(receipt);
            }
            Err(err) => {
                last_error = err.to_string();
                journal.append_note(
                    Err(err),
                    LogType::Submission,
                    format!("Submission failed. Attempt {}/{}", turn, MAX_RETRY_ATTEMPTS),
                );
            }
        }
    }

    SubmissionOutcome::Failed(last_error)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::{
        agent::{
            dashboard::{MockDashboardSink, TransactionReceipt},
            rates::MockRateSource,
        },
        utils::error::ManagerError,
    };

    /// Fails the first `failures` submissions, then succeeds.
    struct FakeSubmitter {
        failures: Cell<u8>,
        calls: Cell<u8>,
        submitted: RefCell<Vec<Allocation>>,
    }

    impl FakeSubmitter {
        fn failing(failures: u8) -> Self {
            Self {
                failures: Cell::new(failures),
                calls: Cell::new(0),
                submitted: RefCell::new(vec![]),
            }
        }
    }

    impl ChainSubmitter for FakeSubmitter {
        async fn submit(&self, allocation: &Allocation) -> ManagerResult<TransactionReceipt> {
            self.calls.set(self.calls.get() + 1);
            self.submitted.borrow_mut().push(allocation.clone());

            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(ManagerError::Custom("rpc unreachable".to_string()));
            }

            Ok(TransactionReceipt {
                tx_hash: Some("0x01".to_string()),
                nonce: u64::from(self.calls.get()),
                chain_id: 137,
            })
        }
    }

    fn source_returning(rates: Vec<f64>) -> MockRateSource {
        let mut source = MockRateSource::new();
        source.expect_sample().times(1).return_once(move || Ok(rates));
        source
    }

    #[test]
    fn a_full_sample_fits_into_a_note() {
        let rates = vec![19.999_999_999_9; crate::constants::POOL_COUNT];
        let note = format!("Sampled rates {}", format_rates(&rates));

        assert!(note.len() <= crate::constants::MAX_NOTE_LENGTH);
        assert_eq!(format_rates(&[1.0, 12.345]), "[1.00, 12.35]");
    }

    #[tokio::test]
    async fn successful_cycle_submits_and_publishes() {
        let mut source = source_returning(vec![10.0, 8.0, 15.0, 3.0, 1.0]);
        let submitter = FakeSubmitter::failing(0);
        let mut sink = MockDashboardSink::new();
        sink.expect_publish()
            .withf(|recommendation| {
                recommendation.cycle == 4
                    && recommendation.allocation.as_slice() == [5_000, 0, 5_000, 0, 0]
            })
            .times(1)
            .return_const(());

        let mut journal = JournalCollection::open(Some(4));
        let recommendation = run_cycle(4, 2, &mut source, &submitter, &mut sink, &mut journal)
            .await
            .unwrap();

        assert_eq!(recommendation.ranked_winners, vec![2, 0]);
        assert!(matches!(
            recommendation.submission,
            SubmissionOutcome::Submitted(_)
        ));
        assert_eq!(submitter.calls.get(), 1);
        assert_eq!(
            submitter.submitted.borrow()[0].as_slice(),
            &[5_000, 0, 5_000, 0, 0]
        );
    }

    #[tokio::test]
    async fn submission_is_retried() {
        let mut source = source_returning(vec![10.0, 8.0, 15.0]);
        let submitter = FakeSubmitter::failing(1);
        let mut sink = MockDashboardSink::new();
        sink.expect_publish().times(1).return_const(());

        let mut journal = JournalCollection::open(Some(1));
        let recommendation = run_cycle(1, 1, &mut source, &submitter, &mut sink, &mut journal)
            .await
            .unwrap();

        assert_eq!(submitter.calls.get(), 2);
        assert!(matches!(
            recommendation.submission,
            SubmissionOutcome::Submitted(TransactionReceipt { nonce: 2, .. })
        ));
    }

    #[tokio::test]
    async fn failed_submission_still_publishes() {
        let mut source = source_returning(vec![1.0, 2.0, 3.0]);
        let submitter = FakeSubmitter::failing(u8::MAX);
        let mut sink = MockDashboardSink::new();
        sink.expect_publish()
            .withf(|recommendation| {
                matches!(recommendation.submission, SubmissionOutcome::Failed(_))
            })
            .times(1)
            .return_const(());

        let mut journal = JournalCollection::open(Some(2));
        let result = run_cycle(2, 3, &mut source, &submitter, &mut sink, &mut journal).await;

        assert!(result.is_ok());
        assert_eq!(submitter.calls.get(), MAX_RETRY_ATTEMPTS);
        assert!(journal
            .entries
            .iter()
            .any(|entry| entry.log_type == LogType::Submission && entry.entry.is_err()));
    }

    #[tokio::test]
    async fn sampling_failure_skips_the_cycle() {
        let mut source = MockRateSource::new();
        source
            .expect_sample()
            .times(1)
            .returning(|| Err(ManagerError::StaleRates(1_800)));
        let submitter = FakeSubmitter::failing(0);
        let mut sink = MockDashboardSink::new();
        sink.expect_publish().never();

        let mut journal = JournalCollection::open(Some(3));
        let result = run_cycle(3, 2, &mut source, &submitter, &mut sink, &mut journal).await;

        assert_eq!(result, Err(ManagerError::StaleRates(1_800)));
        assert_eq!(submitter.calls.get(), 0);
        assert_eq!(journal.entries.len(), 1);
    }

    #[tokio::test]
    async fn invalid_top_n_propagates() {
        let mut source = source_returning(vec![1.0, 2.0]);
        let submitter = FakeSubmitter::failing(0);
        let mut sink = MockDashboardSink::new();
        sink.expect_publish().never();

        let mut journal = JournalCollection::open(Some(5));
        let result = run_cycle(5, 3, &mut source, &submitter, &mut sink, &mut journal).await;

        assert!(matches!(result, Err(ManagerError::InvalidParameter(_))));
        assert_eq!(submitter.calls.get(), 0);
    }
}
