//! Core application logic for the DBM samples
//!
//! This module contains the Bid Manager REST client, the API resource models,
//! report polling, and the query and line item helpers the commands build on.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dbm_samples::app::{queries, BidManagerClient, ClientConfig};
//! use dbm_samples::auth::{AuthOptions, Authenticator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authenticator = Authenticator::from_options(&AuthOptions::default()).await?;
//! let client = BidManagerClient::new(&ClientConfig::default(), authenticator)?;
//!
//! for query in queries::list_all_queries(&client).await? {
//!     println!("{}", query.metadata.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod line_items;
pub mod models;
pub mod poller;
pub mod queries;

// Re-export main public API
pub use client::{BidManagerClient, ClientConfig};
pub use models::{Query, Report, ReportJob, ReportKey, ReportState};
pub use poller::{BackoffPolicy, PollOutcome, PollingConfig, ReportPoller};
