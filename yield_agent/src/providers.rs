//! Implementation of a reputation-based ranking system for the RPC providers

use evm_rpc_types::{MultiRpcResult, RpcApi, RpcService, RpcServices};

use crate::{
    constants::{PROVIDER_COUNT, PROVIDER_THRESHOLD},
    journal::{JournalCollection, LogType},
    state::RPC_REPUTATIONS,
    utils::error::{ManagerError, ManagerResult},
};

/// Replaces the provider list. Every provider starts with a zero score.
pub fn set_providers(urls: Vec<String>) {
    RPC_REPUTATIONS.with(|leaderboard| {
        *leaderboard.borrow_mut() = urls.into_iter().map(|url| (0, url)).collect();
    });
}

/// Getter function to retrieve the ranked list of providers from the thread's local storage
fn fetch_provider_list() -> Vec<(i64, String)> {
    RPC_REPUTATIONS.with(|leaderboard| leaderboard.borrow().clone())
}

/// Sorts the providers and returns the top ones.
pub fn ranked_provider_list() -> Vec<String> {
    let mut provider_list = fetch_provider_list();

    // Sort the providers by score in descending order, keeping the configured order on ties
    provider_list.sort_by(|a, b| b.0.cmp(&a.0));

    provider_list
        .into_iter()
        .map(|(_, url)| url)
        .take(PROVIDER_COUNT as usize)
        .collect()
}

/// Returns the top ranked providers as custom RPC services for `chain_id`
pub fn get_ranked_rpc_providers(chain_id: u64) -> (Vec<String>, RpcServices) {
    let urls = ranked_provider_list();
    let services = urls
        .iter()
        .map(|url| RpcApi {
            url: url.clone(),
            headers: None,
        })
        .collect();

    (urls, RpcServices::Custom { chain_id, services })
}

/// Increments the score of a specific provider by 1
pub fn increment_provider_score(url: &str) {
    change_provider_score(url, 1);
}

/// Decrements the score of a specific provider by 1
pub fn decrement_provider_score(url: &str) {
    change_provider_score(url, -1);
}

fn change_provider_score(url: &str, delta: i64) {
    RPC_REPUTATIONS.with(|leaderboard| {
        let mut leaderboard = leaderboard.borrow_mut();

        if let Some(entry) = leaderboard.iter_mut().find(|(_, p)| p == url) {
            entry.0 += delta;
        }
    });
}

/// Unwraps a multi-provider response and updates the reputations of the providers.
///
/// A consistent response is returned as is. An inconsistent one is accepted only if
/// at least `PROVIDER_THRESHOLD` providers (or all of them, if fewer were asked) returned
/// the same successful value.
pub fn extract_multi_rpc_result<T: PartialEq + Clone>(
    providers: &[String],
    result: MultiRpcResult<T>,
) -> ManagerResult<T> {
    let mut journal = JournalCollection::open(None);

    match result {
        MultiRpcResult::Consistent(Ok(value)) => {
            providers.iter().for_each(|url| {
                increment_provider_score(url);
                journal.append_note(Ok(()), LogType::ProviderReputationChange, format!("+1 {}", url));
            });
            Ok(value)
        }
        MultiRpcResult::Consistent(Err(err)) => {
            providers.iter().for_each(|url| {
                decrement_provider_score(url);
                journal.append_note(Ok(()), LogType::ProviderReputationChange, format!("-1 {}", url));
            });
            Err(ManagerError::RpcResponseError(err))
        }
        MultiRpcResult::Inconsistent(results) => {
            let threshold = (PROVIDER_THRESHOLD as usize).min(providers.len().max(1));
            let mut tally: Vec<(T, usize)> = vec![];

            for (service, response) in results {
                let url = match service {
                    RpcService::Custom(api) => Some(api.url),
                    _ => None,
                };

                match response {
                    Ok(value) => {
                        if let Some(url) = url {
                            increment_provider_score(&url);
                            journal.append_note(Ok(()), LogType::ProviderReputationChange, format!("+1 {}", url));
                        }
                        match tally.iter_mut().find(|(seen, _)| *seen == value) {
                            Some(entry) => entry.1 += 1,
                            None => tally.push((value, 1)),
                        }
                    }
                    Err(_) => {
                        if let Some(url) = url {
                            decrement_provider_score(&url);
                            journal.append_note(Ok(()), LogType::ProviderReputationChange, format!("-1 {}", url));
                        }
                    }
                }
            }

            tally
                .into_iter()
                .max_by_key(|(_, count)| *count)
                .filter(|(_, count)| *count >= threshold)
                .map(|(value, _)| value)
                .ok_or(ManagerError::NoConsensus)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm_rpc_types::{ProviderError, RpcError};

    fn custom(url: &str) -> RpcService {
        RpcService::Custom(RpcApi {
            url: url.to_string(),
            headers: None,
        })
    }

    fn providers(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|url| url.to_string()).collect()
    }

    fn score_of(url: &str) -> i64 {
        fetch_provider_list()
            .into_iter()
            .find(|(_, p)| p == url)
            .map(|(score, _)| score)
            .unwrap()
    }

    #[test]
    fn ranking_prefers_higher_scores() {
        set_providers(providers(&["a", "b", "c", "d"]));
        increment_provider_score("d");
        decrement_provider_score("a");

        assert_eq!(ranked_provider_list(), providers(&["d", "b", "c"]));
    }

    #[test]
    fn ranked_services_are_custom_apis() {
        set_providers(providers(&["https://one", "https://two"]));
        let (urls, services) = get_ranked_rpc_providers(137);

        assert_eq!(urls, providers(&["https://one", "https://two"]));
        match services {
            RpcServices::Custom { chain_id, services } => {
                assert_eq!(chain_id, 137);
                assert_eq!(services.len(), 2);
                assert_eq!(services[0].url, "https://one");
            }
            _ => panic!("expected custom services"),
        }
    }

    #[test]
    fn consistent_success_rewards_every_provider() {
        let urls = providers(&["a", "b"]);
        set_providers(urls.clone());

        let value = extract_multi_rpc_result(&urls, MultiRpcResult::Consistent(Ok(5_u64)));
        assert_eq!(value, Ok(5));
        assert_eq!(score_of("a"), 1);
        assert_eq!(score_of("b"), 1);
    }

    #[test]
    fn consistent_error_penalizes_every_provider() {
        let urls = providers(&["a", "b"]);
        set_providers(urls.clone());

        let error = RpcError::ProviderError(ProviderError::NoPermission);
        let value: ManagerResult<u64> =
            extract_multi_rpc_result(&urls, MultiRpcResult::Consistent(Err(error.clone())));
        assert_eq!(value, Err(ManagerError::RpcResponseError(error)));
        assert_eq!(score_of("a"), -1);
    }

    #[test]
    fn inconsistent_results_need_a_threshold() {
        let urls = providers(&["a", "b", "c"]);
        set_providers(urls.clone());

        let agreeing = MultiRpcResult::Inconsistent(vec![
            (custom("a"), Ok(7_u64)),
            (custom("b"), Ok(7_u64)),
            (custom("c"), Ok(8_u64)),
        ]);
        assert_eq!(extract_multi_rpc_result(&urls, agreeing), Ok(7));

        let split = MultiRpcResult::Inconsistent(vec![
            (custom("a"), Ok(1_u64)),
            (custom("b"), Ok(2_u64)),
            (
                custom("c"),
                Err(RpcError::ProviderError(ProviderError::NoPermission)),
            ),
        ]);
        assert_eq!(
            extract_multi_rpc_result(&urls, split),
            Err(ManagerError::NoConsensus)
        );
        assert_eq!(score_of("c"), 0);
    }
}
