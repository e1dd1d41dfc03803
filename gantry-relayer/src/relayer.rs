use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use color_eyre::{eyre::ensure, Result};
use ethers_core::types::H256;
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, info, instrument};

use gantry_core::{Commitment, CommitmentBundle};

use crate::settings::Settings;

/// A finality source on the bridged chain
#[async_trait]
pub trait CommitmentSource: Send + Sync + 'static {
    /// The latest finalized commitment with its signature and membership
    /// proofs, if one is available
    async fn latest(&self) -> Result<Option<CommitmentBundle>>;
}

/// The light-client verifier endpoint on the home chain
#[async_trait]
pub trait CommitmentSink: Send + Sync + 'static {
    /// The verifier's current commitment
    async fn current(&self) -> Result<Commitment>;

    /// Submit a bundle for import; returns the imported block height
    async fn import(&self, bundle: &CommitmentBundle) -> Result<u32>;
}

/// Ferries finality commitments from a source chain to a sink verifier.
///
/// Each tick fetches the source's latest bundle and submits it when it
/// supersedes the sink's current commitment; stale or absent bundles are
/// skipped without an import call.
#[derive(Debug)]
pub struct CommitmentRelayer<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    interval_seconds: u64,
    expected_root: Option<H256>,
}

impl<S, K> CommitmentRelayer<S, K>
where
    S: CommitmentSource,
    K: CommitmentSink,
{
    /// Instantiate a new relayer
    pub fn new(source: S, sink: K, interval_seconds: u64) -> Self {
        Self {
            source: Arc::new(source),
            sink: Arc::new(sink),
            interval_seconds,
            expected_root: None,
        }
    }

    /// Require the sink to hold `root` before polling begins
    pub fn with_expected_root(mut self, root: H256) -> Self {
        self.expected_root = Some(root);
        self
    }

    /// Instantiate from loaded settings
    pub fn from_settings(source: S, sink: K, settings: &Settings) -> Result<Self> {
        let relayer = Self::new(source, sink, settings.polling_interval);
        Ok(match settings.expected_root()? {
            Some(root) => relayer.with_expected_root(root),
            None => relayer,
        })
    }

    /// One relay attempt. Returns whether a commitment was imported.
    #[instrument(skip_all)]
    async fn poll_and_relay(source: &S, sink: &K) -> Result<bool> {
        let Some(bundle) = source.latest().await? else {
            return Ok(false);
        };
        let current = sink.current().await?;
        if !bundle.signed.commitment.supersedes(&current) {
            debug!(
                block = bundle.signed.commitment.block_number,
                "Source commitment does not supersede sink, skipping"
            );
            return Ok(false);
        }
        let height = sink.import(&bundle).await?;
        info!(height, "Commitment imported");
        Ok(true)
    }

    /// Spawn the polling loop.
    ///
    /// When an expected root is configured, first checks that the sink's
    /// verifier actually holds it and aborts otherwise.
    pub fn run(&self) -> JoinHandle<Result<()>> {
        let source = self.source.clone();
        let sink = self.sink.clone();
        let expected = self.expected_root;
        let mut interval = interval(Duration::from_secs(self.interval_seconds));

        tokio::spawn(async move {
            if let Some(root) = expected {
                let current = sink.current().await?;
                ensure!(
                    current.payload.message_root == root,
                    "Sink verifier does not hold the expected root. On-chain: {}. Configured: {}",
                    current.payload.message_root,
                    root
                );
            }

            loop {
                if let Err(e) = Self::poll_and_relay(source.as_ref(), sink.as_ref()).await {
                    tracing::error!("Error relaying commitment: {:?}", e);
                }
                interval.tick().await;
            }
        })
    }
}
