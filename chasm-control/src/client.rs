//! Client for the daemon's control socket

use std::{fmt, path::Path, sync::Arc, time::Duration};

use chasm_common::config::{ControlConfig, ProtocolGeneration, TimeoutConfig};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    error::{ControlError, Result},
    protocol::{self, ControlProtocol, verbs},
    symbols::{self, LogLevel},
    transaction::{CommitOutcome, Transaction},
    transport::Connection,
    types::{DnsSchedInfo, HashHgPair, HostCheckReport, HostGroupConfig, ThreadInfo, Tunable},
};

/// Run one bounded exchange on a fresh connection
macro_rules! exchange {
    ($client:ident, $verb:expr, |$conn:ident| $call:expr) => {
        $client.bounded($verb, async {
            $client.ensure_supported($verb)?;
            let mut $conn = $client.connect().await?;
            let result = $call.await;
            $conn.close();
            result
        })
    };
}

/// Client for the NetCHASM control socket.
///
/// Every call opens its own connection, runs one exchange and closes it.
/// Calls are bounded by the configured request timeout; dropping a pending
/// call drops its connection.
#[derive(Clone)]
pub struct ControlClient {
    config: Arc<ControlConfig>,
    protocol: Arc<dyn ControlProtocol>,
    request_timeout: Duration,
}

impl fmt::Debug for ControlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlClient")
            .field("socket_path", &self.config.socket_path)
            .field("generation", &self.config.generation)
            .finish_non_exhaustive()
    }
}

impl ControlClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a symbol table is
    /// inconsistent
    pub fn new(config: ControlConfig) -> Result<Self> {
        config.validate()?;
        symbols::validate_symbol_tables()?;

        let protocol = protocol::for_generation(config.generation, config.max_frame_size);
        debug!(
            "Control client for {} using the {} protocol",
            config.socket_path.display(),
            config.generation
        );

        Ok(Self {
            request_timeout: config.timeouts.request_timeout(),
            config: Arc::new(config),
            protocol: Arc::from(protocol),
        })
    }

    /// Create a client for `socket_path` with default settings
    ///
    /// # Errors
    ///
    /// See [`ControlClient::new`]
    pub fn with_socket(socket_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::new(ControlConfig::with_socket(socket_path))
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    #[must_use]
    pub fn generation(&self) -> ProtocolGeneration {
        self.protocol.generation()
    }

    fn ensure_supported(&self, verb: &'static str) -> Result<()> {
        if self.protocol.supports(verb) {
            Ok(())
        } else {
            Err(ControlError::Unsupported {
                verb,
                generation: self.protocol.generation(),
            })
        }
    }

    async fn connect(&self) -> Result<Connection> {
        let timeout = self.config.timeouts.connect_timeout();
        tokio::time::timeout(timeout, Connection::connect(&self.config.socket_path))
            .await
            .map_err(|_| ControlError::Timeout(timeout))?
    }

    async fn bounded<T>(
        &self,
        verb: &'static str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        let timeout = self.request_timeout;
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::Timeout(timeout)),
        };

        match &result {
            Ok(_) => debug!(verb, elapsed = ?started.elapsed(), "Control call complete"),
            Err(err) => warn!(verb, elapsed = ?started.elapsed(), "Control call failed: {err}"),
        }
        result
    }

    /// Pending checks in the daemon's work queue
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or times out
    pub async fn work_queue_info(&self) -> Result<u64> {
        exchange!(self, verbs::WORK_QUEUE_INFO, |conn| self
            .protocol
            .work_queue_info(&mut conn))
        .await
    }

    /// Total and idle worker threads
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or times out
    pub async fn thread_info(&self) -> Result<ThreadInfo> {
        exchange!(self, verbs::THREAD_INFO, |conn| self
            .protocol
            .thread_info(&mut conn))
        .await
    }

    /// Entries waiting in the scheduler
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or times out
    pub async fn schedule_queue_info(&self) -> Result<u64> {
        exchange!(self, verbs::SCHEDULE_QUEUE_INFO, |conn| self
            .protocol
            .schedule_queue_info(&mut conn))
        .await
    }

    /// Names of every configured host group, in daemon order
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or times out
    pub async fn host_group_list(&self) -> Result<Vec<String>> {
        exchange!(self, verbs::HOST_GROUP_LIST, |conn| self
            .protocol
            .host_group_list(&mut conn))
        .await
    }

    /// Hosts in `group`
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not a valid argument, or the call fails
    pub async fn host_list(&self, group: &str) -> Result<Vec<String>> {
        exchange!(self, verbs::HOST_LIST, |conn| self
            .protocol
            .host_list(&mut conn, group))
        .await
    }

    /// Latest check results for `host` in `group`
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is invalid, or the call fails
    pub async fn host_check(&self, group: &str, host: &str) -> Result<HostCheckReport> {
        exchange!(self, verbs::HOST_CHECK, |conn| self
            .protocol
            .host_check(&mut conn, group, host))
        .await
    }

    /// DNS and check scheduling for `host` in `group`
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is invalid, or the call fails
    pub async fn host_sched_info(&self, group: &str, host: &str) -> Result<DnsSchedInfo> {
        exchange!(self, verbs::HOST_SCHED_INFO, |conn| self
            .protocol
            .host_sched_info(&mut conn, group, host))
        .await
    }

    /// Configuration of `group`, or `None` if the daemon has no such group
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not a valid argument, or the call fails
    pub async fn host_group_params(&self, group: &str) -> Result<Option<HostGroupConfig>> {
        exchange!(self, verbs::HOST_GROUP_PARAMS, |conn| self
            .protocol
            .host_group_params(&mut conn, group))
        .await
    }

    /// Fingerprint of the staged configuration; empty when nothing is staged
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn config_hash(&self) -> Result<HashHgPair> {
        exchange!(self, verbs::CONFIG_HASH, |conn| self
            .protocol
            .config_hash(&mut conn))
        .await
    }

    /// Stage a new or replacement host group
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn add_host_group(&self, config: &HostGroupConfig) -> Result<bool> {
        exchange!(self, verbs::ADD_HOST_GROUP, |conn| self
            .protocol
            .add_host_group(&mut conn, config))
        .await
    }

    /// Stage removal of `group`
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn remove_host_group(&self, group: &str) -> Result<bool> {
        exchange!(self, verbs::REMOVE_HOST_GROUP, |conn| self
            .protocol
            .remove_host_group(&mut conn, group))
        .await
    }

    /// Discard every staged change
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn clear_transaction(&self) -> Result<bool> {
        exchange!(self, verbs::CLEAR_TRANSACTION, |conn| self
            .protocol
            .clear_transaction(&mut conn))
        .await
    }

    /// Apply staged changes if `hash` still matches them.
    ///
    /// Returns the number of groups committed; zero means the hash was stale
    /// or nothing was staged.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn commit_transaction(&self, hash: &HashHgPair) -> Result<u64> {
        exchange!(self, verbs::COMMIT_TRANSACTION, |conn| self
            .protocol
            .commit_transaction(&mut conn, hash))
        .await
    }

    /// Fetch the current hash and commit against it
    ///
    /// # Errors
    ///
    /// Returns an error if either call fails
    pub async fn commit_with_fresh_hash(&self) -> Result<CommitOutcome> {
        let hash = self.config_hash().await?;
        if hash.is_empty() {
            debug!("Nothing staged, skipping commit");
            return Ok(CommitOutcome::NotApplied);
        }
        Ok(CommitOutcome::from_count(self.commit_transaction(&hash).await?))
    }

    /// Begin tracking a staged change set
    ///
    /// # Errors
    ///
    /// Returns an error if the baseline hash cannot be fetched
    pub async fn transaction(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self).await
    }

    /// Reload daemon configuration, optionally from `config_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn reload(&self, config_dir: Option<&str>) -> Result<bool> {
        exchange!(self, verbs::RELOAD, |conn| self
            .protocol
            .reload(&mut conn, config_dir))
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn log_level(&self) -> Result<LogLevel> {
        exchange!(self, verbs::GET_LOG_LEVEL, |conn| self
            .protocol
            .log_level(&mut conn))
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn set_log_level(&self, level: LogLevel) -> Result<()> {
        exchange!(self, verbs::SET_LOG_LEVEL, |conn| self
            .protocol
            .set_log_level(&mut conn, level))
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn tunable(&self, tunable: Tunable) -> Result<u64> {
        exchange!(self, tunable.get_verb(), |conn| self
            .protocol
            .tunable(&mut conn, tunable))
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn set_tunable(&self, tunable: Tunable, value: u64) -> Result<()> {
        exchange!(self, tunable.set_verb(), |conn| self
            .protocol
            .set_tunable(&mut conn, tunable, value))
        .await
    }

    /// Whether idle worker threads are recycled
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn recycle(&self) -> Result<bool> {
        exchange!(self, verbs::GET_RECYCLE, |conn| self
            .protocol
            .recycle(&mut conn))
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the call fails, or the legacy protocol is in use
    pub async fn set_recycle(&self, enabled: bool) -> Result<()> {
        exchange!(self, verbs::SET_RECYCLE, |conn| self
            .protocol
            .set_recycle(&mut conn, enabled))
        .await
    }

    /// Force `host` in `group` down, or release a previous force
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is invalid, or the call fails
    pub async fn set_force_host_down(&self, group: &str, host: &str, down: bool) -> Result<()> {
        exchange!(self, verbs::HOST_SET, |conn| self
            .protocol
            .set_force_host_down(&mut conn, group, host, down))
        .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ControlConfig::with_socket("/tmp/chasm.sock");
        config.max_frame_size = 0;
        assert!(matches!(
            ControlClient::new(config),
            Err(ControlError::Config(_))
        ));
    }

    #[test]
    fn test_client_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<ControlClient>();
    }

    #[tokio::test]
    async fn test_missing_socket_is_connection_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let client = ControlClient::with_socket(dir.path().join("none.sock")).unwrap();

        let err = client.work_queue_info().await.unwrap_err();
        assert!(matches!(err, ControlError::Connection { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_legacy_rejects_transactions_without_connecting() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ControlConfig::with_socket(dir.path().join("none.sock"));
        config.generation = ProtocolGeneration::Legacy;
        let client = ControlClient::new(config).unwrap();

        // No socket exists, so anything but Unsupported means a connect was tried
        let err = client.config_hash().await.unwrap_err();
        assert!(matches!(
            err,
            ControlError::Unsupported {
                verb: "gettransconfighash",
                generation: ProtocolGeneration::Legacy
            }
        ));
        assert!(matches!(
            client.set_tunable(Tunable::Stride, 5).await,
            Err(ControlError::Unsupported { .. })
        ));
    }
}
