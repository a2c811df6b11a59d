//! Azure
//!
//! Scopes are (subscription, resource group) pairs, listed and counted with
//! the `az` CLI.

use super::{log_count_failure, parse_count, AssetSource, FailureSignatures, Provider, Scope};
use crate::error::{CountError, ScopeError};
use crate::shell::{display_command, CommandRunner, SystemRunner};
use async_trait::async_trait;
use crate::dispatch::DEFAULT_CONCURRENCY;
use futures::stream::{self, StreamExt};

const AZ: &str = "az";

pub const AZURE_SIGNATURES: FailureSignatures = FailureSignatures {
    rate_limit: &["RateLimitExceeded"],
    permission_denied: &["AuthorizationFailed"],
};

/// Azure asset source backed by the `az` CLI
pub struct AzureCli<R = SystemRunner> {
    runner: R,
    /// Resource-group listings in flight at once
    concurrency: usize,
}

impl AzureCli<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for AzureCli<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> AzureCli<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// List subscription ids visible to the signed-in account
    pub async fn list_subscriptions(&self) -> Result<Vec<String>, ScopeError> {
        let args = to_args(&["account", "list", "--query", "[].id", "--output", "json"]);
        let out = self.runner.run(AZ, &args).await;
        if !out.is_success() {
            tracing::error!("Error listing subscriptions: {}", out.stderr.trim());
            return Err(ScopeError::Command(out.stderr.trim().to_string()));
        }
        serde_json::from_str(&out.stdout).map_err(|e| ScopeError::Decode(e.to_string()))
    }

    /// List resource group names of one subscription
    pub async fn list_resource_groups(&self, subscription_id: &str) -> Result<Vec<String>, ScopeError> {
        let args = to_args(&[
            "group",
            "list",
            "--subscription",
            subscription_id,
            "--query",
            "[].name",
            "--output",
            "json",
        ]);
        let out = self.runner.run(AZ, &args).await;
        if !out.is_success() {
            tracing::error!(
                "Error listing resource groups for subscription {}: {}",
                subscription_id,
                out.stderr.trim()
            );
            return Err(ScopeError::Command(out.stderr.trim().to_string()));
        }
        serde_json::from_str(&out.stdout).map_err(|e| ScopeError::Decode(e.to_string()))
    }
}

#[async_trait]
impl<R: CommandRunner> AssetSource for AzureCli<R> {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    async fn list_scopes(&self) -> Result<Vec<Scope>, ScopeError> {
        let subscriptions = self.list_subscriptions().await?;
        if subscriptions.is_empty() {
            return Err(ScopeError::NoneFound);
        }

        let lookups: Vec<_> = subscriptions
            .iter()
            .map(|sub| self.list_resource_groups(sub))
            .collect();
        let groups: Vec<_> = stream::iter(lookups)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut scopes = Vec::new();
        for (sub, groups) in subscriptions.iter().zip(groups) {
            match groups {
                Ok(groups) => {
                    tracing::info!("Subscription {}: {} resource groups", sub, groups.len());
                    scopes.extend(groups.into_iter().map(|rg| Scope::with_group(sub, rg)));
                }
                // Already logged; the subscription contributes nothing
                Err(_) => continue,
            }
        }

        Ok(scopes)
    }

    async fn count_assets(&self, scope: &Scope, asset_type: &str) -> Result<usize, CountError> {
        let group = scope.group.as_deref().unwrap_or_default();
        let args = to_args(&[
            "resource",
            "list",
            "--subscription",
            scope.id.as_str(),
            "--resource-group",
            group,
            "--resource-type",
            asset_type,
            "--query",
            "[]",
            "--output",
            "json",
        ]);
        let out = self.runner.run(AZ, &args).await;

        let result = if out.is_success() {
            parse_count(&out.stdout)
        } else {
            Err(AZURE_SIGNATURES.classify(&out.stderr))
        };

        if let Err(err) = &result {
            tracing::debug!("{} failed", display_command(AZ, &args));
            log_count_failure(scope, asset_type, err);
        }
        result
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::CommandOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers through a canned function, records every call
    struct FakeAz {
        calls: Mutex<Vec<Vec<String>>>,
        respond: fn(&[String]) -> CommandOutput,
    }

    #[async_trait]
    impl CommandRunner for FakeAz {
        async fn run(&self, program: &str, args: &[String]) -> CommandOutput {
            assert_eq!(program, "az");
            self.calls.lock().unwrap().push(args.to_vec());
            (self.respond)(args)
        }
    }

    fn fake(respond: fn(&[String]) -> CommandOutput) -> AzureCli<FakeAz> {
        AzureCli::with_runner(FakeAz {
            calls: Mutex::new(Vec::new()),
            respond,
        })
    }

    #[tokio::test]
    async fn test_list_scopes_pairs_subscriptions_with_groups() {
        let az = fake(|args| match (args[0].as_str(), args.get(3).map(String::as_str)) {
            ("account", _) => CommandOutput::success(r#"["sub-a","sub-b"]"#),
            ("group", Some("sub-a")) => CommandOutput::success(r#"["rg-1","rg-2"]"#),
            ("group", Some("sub-b")) => CommandOutput::failure(1, "AuthorizationFailed"),
            _ => panic!("unexpected call {:?}", args),
        });

        let scopes = az.list_scopes().await.unwrap();
        assert_eq!(
            scopes,
            vec![Scope::with_group("sub-a", "rg-1"), Scope::with_group("sub-a", "rg-2")]
        );
        // one account listing plus one group listing per subscription
        assert_eq!(az.runner.calls.lock().unwrap().len(), 3);
    }

    /// Many subscriptions, slow group listings, tracks listings in flight
    #[derive(Default)]
    struct SlowGroups {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl CommandRunner for SlowGroups {
        async fn run(&self, _program: &str, args: &[String]) -> CommandOutput {
            if args[0] == "account" {
                let subs: Vec<String> = (0..50).map(|i| format!("sub-{}", i)).collect();
                return CommandOutput::success(&serde_json::to_string(&subs).unwrap());
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            CommandOutput::success(&format!(r#"["rg-of-{}"]"#, args[3]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_listing_is_bounded_and_ordered() {
        let az = AzureCli::with_runner(SlowGroups::default()).with_concurrency(4);

        let scopes = az.list_scopes().await.unwrap();
        assert_eq!(scopes.len(), 50);
        assert_eq!(scopes[0], Scope::with_group("sub-0", "rg-of-sub-0"));
        assert_eq!(scopes[49], Scope::with_group("sub-49", "rg-of-sub-49"));

        let max = az.runner.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "{} group listings ran at once", max);
        assert!(max >= 1);
    }

    #[tokio::test]
    async fn test_no_subscriptions_is_none_found() {
        let az = fake(|_| CommandOutput::success("[]"));
        assert!(matches!(az.list_scopes().await, Err(ScopeError::NoneFound)));
    }

    #[tokio::test]
    async fn test_subscription_listing_failure() {
        let az = fake(|_| CommandOutput::failure(1, "Please run 'az login'"));
        assert!(matches!(az.list_scopes().await, Err(ScopeError::Command(_))));
    }

    #[tokio::test]
    async fn test_count_assets_builds_resource_list_command() {
        let az = fake(|_| CommandOutput::success(r#"[{"id":"a"},{"id":"b"}]"#));
        let scope = Scope::with_group("sub-a", "rg-1");

        let count = az
            .count_assets(&scope, "Microsoft.Compute/virtualMachines")
            .await
            .unwrap();
        assert_eq!(count, 2);

        let calls = az.runner.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            to_args(&[
                "resource",
                "list",
                "--subscription",
                "sub-a",
                "--resource-group",
                "rg-1",
                "--resource-type",
                "Microsoft.Compute/virtualMachines",
                "--query",
                "[]",
                "--output",
                "json",
            ])
        );
    }

    #[tokio::test]
    async fn test_count_assets_classifies_failures() {
        let scope = Scope::with_group("sub-a", "rg-1");

        let az = fake(|_| CommandOutput::failure(1, "(RateLimitExceeded) Too many requests"));
        assert!(az.count_assets(&scope, "t").await.unwrap_err().is_rate_limited());

        let az = fake(|_| CommandOutput::failure(1, "(AuthorizationFailed) denied"));
        assert_eq!(
            az.count_assets(&scope, "t").await.unwrap_err().to_string(),
            "Permission Denied"
        );

        let az = fake(|_| CommandOutput::success("WARNING: not json"));
        assert_eq!(
            az.count_assets(&scope, "t").await.unwrap_err().to_string(),
            "JSON decoding error"
        );
    }
}
