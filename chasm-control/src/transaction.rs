//! Client-side tracking of a staged configuration change.
//!
//! The daemon keeps at most one staged change set. A [`Transaction`] records
//! the hash seen before staging, stages changes through its client, and
//! commits against a hash fetched immediately beforehand so a change set
//! altered by someone else in the meantime is not applied blind.

use std::fmt::{Display, Formatter};

use tracing::{debug, info};

use crate::{
    client::ControlClient,
    error::Result,
    types::{HashHgPair, HostGroupConfig},
};

/// Result of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The daemon applied this many groups
    Committed(u64),
    /// Nothing was staged, or the hash no longer matched
    NotApplied,
}

impl CommitOutcome {
    #[must_use]
    pub const fn from_count(count: u64) -> Self {
        if count == 0 {
            Self::NotApplied
        } else {
            Self::Committed(count)
        }
    }

    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

impl Display for CommitOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed(count) => write!(f, "Committed {count} group(s)"),
            Self::NotApplied => f.write_str("Nothing committed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Nothing staged through this handle
    None,
    /// At least one change accepted by the daemon
    Staged,
    Committed(u64),
    Aborted,
}

#[derive(Debug)]
pub struct Transaction<'a> {
    client: &'a ControlClient,
    baseline: HashHgPair,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    /// Record the current hash as the baseline
    ///
    /// # Errors
    ///
    /// Returns an error if the hash cannot be fetched
    pub async fn begin(client: &'a ControlClient) -> Result<Self> {
        let baseline = client.config_hash().await?;
        debug!("Transaction baseline: {baseline}");
        Ok(Self {
            client,
            baseline,
            state: TransactionState::None,
        })
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Hash of the staged configuration when this handle was created
    #[must_use]
    pub const fn baseline(&self) -> &HashHgPair {
        &self.baseline
    }

    fn staged(&mut self, accepted: bool) -> bool {
        if accepted {
            self.state = TransactionState::Staged;
        }
        accepted
    }

    /// Stage `config`; `true` if the daemon accepted it
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails
    pub async fn add_host_group(&mut self, config: &HostGroupConfig) -> Result<bool> {
        let accepted = self.client.add_host_group(config).await?;
        Ok(self.staged(accepted))
    }

    /// Stage removal of `group`; `true` if the daemon accepted it
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails
    pub async fn remove_host_group(&mut self, group: &str) -> Result<bool> {
        let accepted = self.client.remove_host_group(group).await?;
        Ok(self.staged(accepted))
    }

    /// Commit against a freshly fetched hash.
    ///
    /// A [`CommitOutcome::NotApplied`] leaves the handle staged so the caller
    /// can inspect, retry or abort.
    ///
    /// # Errors
    ///
    /// Returns an error if either call fails
    pub async fn commit(&mut self) -> Result<CommitOutcome> {
        let outcome = self.client.commit_with_fresh_hash().await?;
        if let CommitOutcome::Committed(count) = outcome {
            info!("Committed {count} staged group(s)");
            self.state = TransactionState::Committed(count);
        }
        Ok(outcome)
    }

    /// Discard every staged change
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails
    pub async fn abort(&mut self) -> Result<bool> {
        let cleared = self.client.clear_transaction().await?;
        if cleared {
            self.state = TransactionState::Aborted;
        }
        Ok(cleared)
    }
}
