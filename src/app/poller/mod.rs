//! Report completion polling
//!
//! Reports are generated asynchronously: running a query returns immediately
//! with a report in a non-terminal state. [`ReportPoller`] re-fetches the
//! report's status on a [`BackoffPolicy`] schedule until the report is done,
//! has failed, the elapsed-time budget runs out, or cancellation is requested.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dbm_samples::app::{BackoffPolicy, BidManagerClient, PollOutcome, ReportPoller};
//!
//! # async fn example(client: BidManagerClient) -> Result<(), Box<dyn std::error::Error>> {
//! let job = client.run_query(1234).await?;
//! let outcome = ReportPoller::new(BackoffPolicy::default())
//!     .poll(job, |key| client.get_report(key))
//!     .await?;
//!
//! match outcome {
//!     PollOutcome::Done(job) => println!("ready at {:?}", job.storage_path),
//!     PollOutcome::Failed(job) => println!("report {} failed", job.report_id),
//!     PollOutcome::GaveUp { elapsed, .. } => println!("still running after {:?}", elapsed),
//!     PollOutcome::Cancelled { .. } => println!("cancelled"),
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::models::{ReportJob, ReportKey, ReportState};

pub mod backoff;

pub use self::backoff::{BackoffPolicy, PollingConfig};

/// How a polling session ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The report finished successfully
    Done(ReportJob),
    /// The report finished in error
    Failed(ReportJob),
    /// The elapsed-time budget ran out while the report was still pending
    GaveUp { last: ReportJob, elapsed: Duration },
    /// Cancellation was requested before the report finished
    Cancelled { last: ReportJob },
}

impl PollOutcome {
    /// The most recent snapshot observed
    pub fn job(&self) -> &ReportJob {
        match self {
            PollOutcome::Done(job) | PollOutcome::Failed(job) => job,
            PollOutcome::GaveUp { last, .. } | PollOutcome::Cancelled { last } => last,
        }
    }

    fn terminal(job: ReportJob) -> Self {
        match job.state {
            ReportState::Failed => PollOutcome::Failed(job),
            _ => PollOutcome::Done(job),
        }
    }
}

/// Drives a fetch-wait-fetch loop for a single report
///
/// The poller is consumed by [`poll`](Self::poll), so one instance serves
/// exactly one report.
#[derive(Debug)]
pub struct ReportPoller {
    policy: BackoffPolicy,
    cancel: CancellationToken,
}

impl ReportPoller {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops polling as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Polls until the report reaches a terminal state or polling stops
    ///
    /// A report that is already terminal is returned without fetching.
    /// Otherwise `fetch` is called immediately, then once after every wait
    /// handed out by the policy. Errors from `fetch` are returned unchanged
    /// and end the session: only "not finished yet" is a reason to poll again.
    pub async fn poll<F, Fut, E>(mut self, job: ReportJob, mut fetch: F) -> Result<PollOutcome, E>
    where
        F: FnMut(ReportKey) -> Fut,
        Fut: Future<Output = Result<ReportJob, E>>,
    {
        if job.is_terminal() {
            return Ok(PollOutcome::terminal(job));
        }

        let key = job.key();
        let mut previous = job;

        loop {
            if self.cancel.is_cancelled() {
                info!("Polling for {} cancelled", key);
                return Ok(PollOutcome::Cancelled { last: previous });
            }

            let snapshot = fetch(key).await?;
            debug!("Report {} is {}", key, snapshot.state);

            if snapshot.is_terminal() {
                info!("Report {} finished with state {}", key, snapshot.state);
                return Ok(PollOutcome::terminal(snapshot));
            }

            if self.cancel.is_cancelled() {
                info!("Polling for {} cancelled", key);
                return Ok(PollOutcome::Cancelled { last: snapshot });
            }

            let Some(wait) = self.policy.next_interval() else {
                warn!(
                    "Report {} has taken more than {} minutes to generate",
                    key,
                    self.policy.max_elapsed().as_secs() / 60
                );
                return Ok(PollOutcome::GaveUp {
                    elapsed: self.policy.elapsed(),
                    last: snapshot,
                });
            };

            info!(
                "Report {} has not yet completed. Waiting {} seconds before polling again",
                key,
                wait.as_secs()
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Polling for {} cancelled while waiting", key);
                    return Ok(PollOutcome::Cancelled { last: snapshot });
                }
                _ = tokio::time::sleep(wait) => {}
            }

            previous = snapshot;
        }
    }
}
