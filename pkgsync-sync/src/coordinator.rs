//! Request-scoped reconciliation.
//!
//! The coordinator holds no mutable state: every pass re-observes both tiers,
//! classifies, and dispatches. Concurrent passes over the same key are safe
//! because every driver is idempotent.

use crate::driver::{Driver, Tiers, dispatch};
use crate::error::{SyncError, SyncResult};
use crate::event::{ChangeKind, ContentChangeEvent, classify};
use crate::settings::{GlobalSettings, PropagationMode};
use futures::stream::{self, StreamExt};
use pkgsync_types::{ArtifactKey, ArtifactRecord, WriteKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a request is about to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestScope {
    /// A single package file.
    Artifact(ArtifactKey),
    /// A listing, optionally narrowed to keys starting with `prefix`.
    Listing { prefix: Option<String> },
}

impl RequestScope {
    pub fn listing() -> Self {
        RequestScope::Listing { prefix: None }
    }
}

/// Result of reconciling one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyOutcome {
    pub key: ArtifactKey,
    pub kind: ChangeKind,
    pub driver: Driver,
    pub bytes: u64,
}

/// Result of a reconciliation pass over one or more keys.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Keys that reconciled, sorted by key.
    pub outcomes: Vec<KeyOutcome>,
    /// Keys whose driver failed, sorted by key.
    pub failures: Vec<(ArtifactKey, SyncError)>,
}

impl ReconcileReport {
    fn single(outcome: KeyOutcome) -> Self {
        Self {
            outcomes: vec![outcome],
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Outcomes where a driver actually changed a tier.
    pub fn changed(&self) -> impl Iterator<Item = &KeyOutcome> {
        self.outcomes.iter().filter(|o| o.kind.needs_action())
    }

    pub fn outcome(&self, key: &ArtifactKey) -> Option<&KeyOutcome> {
        self.outcomes.iter().find(|o| &o.key == key)
    }

    /// Turns the first failure, if any, into the pass's error.
    pub fn into_result(self) -> SyncResult<Self> {
        match self.failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(Self {
                outcomes: self.outcomes,
                failures: Vec::new(),
            }),
        }
    }
}

/// Runs reconciliation passes around requests.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    settings: Arc<GlobalSettings>,
    tiers: Tiers,
}

impl SyncCoordinator {
    pub fn new(settings: Arc<GlobalSettings>, tiers: Tiers) -> Self {
        Self { settings, tiers }
    }

    /// Builds the storage tiers described by `settings`.
    pub fn from_settings(settings: GlobalSettings) -> SyncResult<Self> {
        let tiers = settings.build_tiers()?;
        Ok(Self::new(Arc::new(settings), tiers))
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn tiers(&self) -> &Tiers {
        &self.tiers
    }

    /// Stats `key` on both tiers concurrently.
    pub async fn observe(&self, key: &ArtifactKey) -> SyncResult<(ArtifactRecord, ArtifactRecord)> {
        observe_pair(&self.tiers, key).await
    }

    /// One classify-then-drive pass for a single key.
    pub async fn reconcile_key(&self, key: &ArtifactKey) -> SyncResult<KeyOutcome> {
        let (local, remote) = self.observe(key).await?;
        let event = classify(local, remote)?;
        drive(&event, &self.tiers).await
    }

    /// Reconciles the union of both tiers' listings under `prefix`.
    ///
    /// Only a failure to list either tier fails the call. Per-key failures
    /// are collected in the report so one broken key never stops the others;
    /// use [`ReconcileReport::into_result`] to fail on them.
    pub async fn reconcile_listing(&self, prefix: Option<&str>) -> SyncResult<ReconcileReport> {
        let (local, remote) =
            futures::try_join!(self.tiers.local.list(prefix), self.tiers.remote.list(prefix))?;

        let mut pairs: BTreeMap<ArtifactKey, (Option<ArtifactRecord>, Option<ArtifactRecord>)> =
            BTreeMap::new();
        for record in local {
            let key = record.key.clone();
            pairs.entry(key).or_default().0 = Some(record);
        }
        for record in remote {
            let key = record.key.clone();
            pairs.entry(key).or_default().1 = Some(record);
        }

        let mut report = ReconcileReport::default();
        let mut pending = Vec::new();
        for (key, (local, remote)) in pairs {
            let local = local.unwrap_or_else(|| ArtifactRecord::absent(key.clone()));
            let remote = remote.unwrap_or_else(|| ArtifactRecord::absent(key.clone()));
            match classify(local, remote) {
                Ok(event) if event.kind().needs_action() => pending.push(event),
                Ok(event) => report.outcomes.push(KeyOutcome {
                    key,
                    kind: event.kind(),
                    driver: Driver::Noop,
                    bytes: 0,
                }),
                Err(err) => report.failures.push((key, err)),
            }
        }

        debug!(
            prefix = ?prefix,
            keys = report.outcomes.len() + pending.len(),
            pending = pending.len(),
            "listing reconciliation"
        );

        let limit = self.settings.max_concurrent_transfers.max(1);
        let tiers = &self.tiers;
        let results: Vec<_> = stream::iter(pending)
            .map(|event| async move {
                let result = drive(&event, tiers).await;
                (event, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (event, result) in results {
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(err) => report.failures.push((event.key().clone(), err)),
            }
        }
        report.outcomes.sort_by(|a, b| a.key.cmp(&b.key));
        report.failures.sort_by(|a, b| a.0.cmp(&b.0));

        if !report.is_clean() {
            warn!(
                prefix = ?prefix,
                failed = report.failures.len(),
                "listing reconciliation incomplete"
            );
        }
        Ok(report)
    }

    /// Pre-request pass. Fails when any key in scope could not be brought in
    /// sync, so the request never serves stale data.
    pub async fn reconcile_before_read(&self, scope: &RequestScope) -> SyncResult<ReconcileReport> {
        match scope {
            RequestScope::Artifact(key) => self.reconcile_key(key).await.map(ReconcileReport::single),
            RequestScope::Listing { prefix } => {
                self.reconcile_listing(prefix.as_deref()).await?.into_result()
            }
        }
    }

    /// Post-write pass propagating a completed local mutation to the remote
    /// tier.
    ///
    /// Returns `None` in deferred mode, where the pass runs in the background
    /// and its failures are only logged.
    pub async fn reconcile_after_write(
        &self,
        key: &ArtifactKey,
        kind: WriteKind,
    ) -> SyncResult<Option<KeyOutcome>> {
        match self.settings.propagation {
            PropagationMode::Synchronous => {
                Self::propagate_write(&self.tiers, key, kind).await.map(Some)
            }
            PropagationMode::Deferred => {
                let tiers = self.tiers.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    if let Err(err) = Self::propagate_write(&tiers, &key, kind).await {
                        error!(key = %key, write = %kind, error = %err, "deferred propagation failed");
                    }
                });
                Ok(None)
            }
        }
    }

    /// Classifies a finished local write and runs its driver.
    pub async fn propagate_write(
        tiers: &Tiers,
        key: &ArtifactKey,
        kind: WriteKind,
    ) -> SyncResult<KeyOutcome> {
        let (local, remote) = observe_pair(tiers, key).await?;
        let local = match kind {
            WriteKind::Create => local,
            WriteKind::Delete if local.exists => {
                warn!(key = %key, "deleted artifact is back on the local tier, reconciling as-is");
                local
            }
            WriteKind::Delete => ArtifactRecord::tombstone(key.clone()),
        };

        let event = classify(local, remote)?;
        if kind == WriteKind::Create && event.kind() == ChangeKind::Conflict {
            warn!(key = %key, "uploaded artifact differs from the remote copy, remote wins");
        }
        drive(&event, tiers).await
    }

    /// Applies an operator signal that `key` was removed from the remote
    /// store: the local copy is dropped as well.
    pub async fn reconcile_remote_removal(&self, key: &ArtifactKey) -> SyncResult<KeyOutcome> {
        let (local, remote) = self.observe(key).await?;
        if remote.exists {
            warn!(key = %key, "remote removal signalled but the remote copy still exists");
            let event = classify(local, remote)?;
            return drive(&event, &self.tiers).await;
        }
        let event = classify(local, ArtifactRecord::tombstone(key.clone()))?;
        drive(&event, &self.tiers).await
    }
}

async fn observe_pair(
    tiers: &Tiers,
    key: &ArtifactKey,
) -> SyncResult<(ArtifactRecord, ArtifactRecord)> {
    let pair = futures::try_join!(tiers.local.observe(key), tiers.remote.observe(key))?;
    Ok(pair)
}

async fn drive(event: &ContentChangeEvent, tiers: &Tiers) -> SyncResult<KeyOutcome> {
    let key = event.key();
    match dispatch(event, tiers).await {
        Ok(outcome) => {
            if outcome.driver != Driver::Noop {
                info!(key = %key, kind = %event.kind(), driver = %outcome.driver, "reconciled");
            } else {
                debug!(key = %key, kind = %event.kind(), "no action");
            }
            Ok(KeyOutcome {
                key: key.clone(),
                kind: event.kind(),
                driver: outcome.driver,
                bytes: outcome.bytes,
            })
        }
        Err(err) => {
            warn!(key = %key, kind = %event.kind(), error = %err, "reconciliation failed");
            Err(err)
        }
    }
}
