use crate::error::{Result, TrackerError};
use crate::models::{ItemId, ItemStatus, SourceFile, Stage, TrackedItem};
use crate::services::pipeline_client::{PipelineApi, ProgressCallback};
use crate::services::reducer::{TrackingEvent, reduce};
use crate::services::transport::TransportAdapter;
use crate::utils::validation::validate_extension;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const GENERIC_UPLOAD_FAILURE: &str = "Upload failed";
pub const TRACKING_ENDED: &str = "Tracking ended without a final status.";

/// Tracks a set of uploads from file selection to a terminal state.
///
/// Each added file gets one worker task that performs the upload, attaches
/// the configured transport and folds its events through [`reduce`]. Items
/// never share state, so a failing worker only ever touches its own record.
/// Dropping the queue cancels every worker.
pub struct UploadQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    items: DashMap<ItemId, TrackedItem>,
    order: RwLock<Vec<ItemId>>,
    workers: DashMap<ItemId, CancellationToken>,
    api: Arc<dyn PipelineApi>,
    transport: Arc<dyn TransportAdapter>,
    snapshots: watch::Sender<Vec<TrackedItem>>,
}

impl UploadQueue {
    pub fn new(api: Arc<dyn PipelineApi>, transport: Arc<dyn TransportAdapter>) -> Self {
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(QueueInner {
                items: DashMap::new(),
                order: RwLock::new(Vec::new()),
                workers: DashMap::new(),
                api,
                transport,
                snapshots,
            }),
        }
    }

    /// Enqueues `files` and starts their uploads in the background.
    ///
    /// The whole batch is rejected if any file has an extension outside the
    /// allow-list. Must be called from within a tokio runtime.
    pub fn add(&self, files: Vec<SourceFile>) -> Result<Vec<ItemId>> {
        for file in &files {
            validate_extension(file.name())?;
        }

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = ItemId::new();
            let token = CancellationToken::new();

            self.inner
                .items
                .insert(id, TrackedItem::new(id, file.info()));
            self.write_order().push(id);
            self.inner.workers.insert(id, token.clone());

            tracing::info!("Queued '{}' as item {}", file.name(), id);

            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Worker for item {} cancelled", id);
                    }
                    _ = inner.clone().run_item(id, file) => {}
                }
                inner.workers.remove(&id);
            });

            ids.push(id);
        }

        self.inner.publish();
        Ok(ids)
    }

    /// Dismisses a finished item, cancelling anything still attached to it.
    pub fn remove(&self, id: ItemId) -> Result<()> {
        let status = self
            .inner
            .items
            .get(&id)
            .map(|item| item.status)
            .ok_or(TrackerError::ItemNotFound(id))?;

        if !status.is_terminal() {
            return Err(TrackerError::ItemNotTerminal(id));
        }

        if let Some((_, token)) = self.inner.workers.remove(&id) {
            token.cancel();
        }
        self.inner.items.remove(&id);
        self.write_order().retain(|other| *other != id);
        self.inner.publish();

        tracing::info!("Removed item {}", id);
        Ok(())
    }

    /// Live view of the queue in insertion order.
    pub fn observe(&self) -> watch::Receiver<Vec<TrackedItem>> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Vec<TrackedItem> {
        self.inner.collect()
    }

    pub fn get(&self, id: ItemId) -> Option<TrackedItem> {
        self.inner.items.get(&id).map(|item| item.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }

    /// True once at least one document is ready for querying.
    pub fn has_completed(&self) -> bool {
        self.inner
            .items
            .iter()
            .any(|item| item.status == ItemStatus::Done)
    }

    /// Waits until every item in the queue is terminal and returns the
    /// final snapshot.
    pub async fn settled(&self) -> Vec<TrackedItem> {
        let mut rx = self.observe();
        match rx
            .wait_for(|items| items.iter().all(TrackedItem::is_terminal))
            .await
        {
            Ok(items) => items.clone(),
            Err(_) => self.snapshot(),
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.inner.transport.name()
    }

    fn write_order(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ItemId>> {
        self.inner
            .order
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        for entry in self.inner.workers.iter() {
            entry.value().cancel();
        }
    }
}

impl QueueInner {
    async fn run_item(self: Arc<Self>, id: ItemId, file: SourceFile) {
        self.update(id, |item| {
            item.status = ItemStatus::Uploading;
            item.stage = Stage::Uploading;
        });

        let progress: ProgressCallback = {
            let inner = Arc::downgrade(&self);
            Arc::new(move |pct: u8| {
                if let Some(inner) = inner.upgrade() {
                    inner.update(id, |item| {
                        if item.status == ItemStatus::Uploading {
                            item.upload_progress = pct.min(100);
                        }
                    });
                }
            })
        };

        let response = match self.api.upload(&file, progress).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Upload of '{}' failed: {}", file.name(), e);
                let message = e
                    .server_detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| GENERIC_UPLOAD_FAILURE.to_string());
                self.update(id, |item| {
                    item.status = ItemStatus::Error;
                    item.error_message = Some(message);
                });
                return;
            }
        };
        drop(file);

        let document_id = response.document_id();
        self.update(id, |item| {
            item.status = ItemStatus::Processing;
            item.stage = Stage::Preprocessing;
            item.upload_progress = 100;
            item.remote_document_id = document_id;
        });

        let Some(document_id) = document_id else {
            tracing::info!("Item {} uploaded without a document id; nothing to track", id);
            self.update(id, |item| {
                item.status = ItemStatus::Done;
                item.stage = Stage::Done;
            });
            return;
        };

        tracing::info!(
            "Item {} uploaded as document {}, tracking via {}",
            id,
            document_id,
            self.transport.name()
        );

        let mut events = self.transport.track(document_id);
        while let Some(event) = events.next().await {
            match self.apply(id, &event) {
                Some(status) if status.is_terminal() => {
                    tracing::info!("Item {} finished: {}", id, status);
                    return;
                }
                Some(_) => {}
                None => return,
            }
        }

        self.apply(id, &TrackingEvent::failed(TRACKING_ENDED));
    }

    /// Folds one event into the item's record. Returns the resulting status,
    /// or `None` if the item no longer exists.
    fn apply(&self, id: ItemId, event: &TrackingEvent) -> Option<ItemStatus> {
        let (status, changed) = {
            let mut entry = self.items.get_mut(&id)?;
            let next = reduce(&entry, event);
            let changed = next != *entry;
            let status = next.status;
            if changed {
                tracing::debug!(
                    "Item {}: {} at stage {} after {:?}",
                    id,
                    next.status,
                    next.stage,
                    event
                );
                *entry = next;
            }
            (status, changed)
        };

        if changed {
            self.publish();
        }
        Some(status)
    }

    /// Applies a direct mutation made by the worker itself (upload phase).
    /// Terminal items and illegal status moves are left untouched.
    fn update(&self, id: ItemId, mutate: impl FnOnce(&mut TrackedItem)) {
        let changed = {
            let Some(mut entry) = self.items.get_mut(&id) else {
                return;
            };
            if entry.status.is_terminal() {
                return;
            }

            let mut next = entry.clone();
            mutate(&mut next);

            if next.status != entry.status && !entry.status.can_transition_to(next.status) {
                tracing::warn!(
                    "Rejected illegal transition {} -> {} for item {}",
                    entry.status,
                    next.status,
                    id
                );
                return;
            }

            let changed = next != *entry;
            *entry = next;
            changed
        };

        if changed {
            self.publish();
        }
    }

    fn collect(&self) -> Vec<TrackedItem> {
        let order = self
            .order
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        order
            .iter()
            .filter_map(|id| self.items.get(id).map(|item| item.clone()))
            .collect()
    }

    /// Rebuilds the snapshot while holding the channel's write lock, so
    /// concurrent publishers cannot overwrite a newer snapshot with an older
    /// one. Callers must not hold any item guard here.
    fn publish(&self) {
        self.snapshots.send_modify(|items| *items = self.collect());
    }
}
