//! Count cloud assets by type across Azure subscriptions and GCP projects.
//!
//! Scopes are enumerated by a [`provider::AssetSource`], every
//! (scope, asset type) pair is counted on a bounded pool by
//! [`dispatch::Dispatcher`], and [`report::Report`] writes the results.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gcp;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod report;
pub mod retry;
pub mod shell;

pub use dispatch::{AssetCountResult, AssetTask, Dispatcher, TaskEvent};
pub use error::{CountError, ScopeError};
pub use pipeline::{run, RunOutcome, RunSettings};
pub use provider::{AssetSource, Provider, Scope};
pub use report::Summary;
pub use retry::RetryPolicy;
