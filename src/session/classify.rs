use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::task::JoinHandle;

use super::lanes::{Lane, LaneCoordinator, LaneNotice, Settlement};
use super::lock;
use crate::api::{Classification, ClassifyRequest, FileRef, SharedApi};

/// Drives the global and scoped classification lanes for the file currently picked in a view.
///
/// The global lane runs whenever a file is picked. The scoped lane runs only while both a file
/// and a grouping key are set. Requests are spawned on the ambient tokio runtime, and the returned
/// handles resolve to the request's [`Settlement`].
pub struct ClassificationSession {
    api: SharedApi,
    lanes: Arc<Mutex<LaneCoordinator<Classification>>>,
    file: Option<FileRef>,
    group_key: Option<String>,
    stage: String,
    subject: String,
}

impl ClassificationSession {
    pub fn new(api: SharedApi, stage: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            api,
            lanes: Arc::new(Mutex::new(LaneCoordinator::new())),
            file: None,
            group_key: None,
            stage: stage.into(),
            subject: subject.into(),
        }
    }

    pub fn file(&self) -> Option<&FileRef> { self.file.as_ref() }
    pub fn group_key(&self) -> Option<&str> { self.group_key.as_deref() }

    /// Pick a new file. Both lanes and the last good result are reset before the new requests go out.
    pub fn select_file(&mut self, file: FileRef) -> Vec<JoinHandle<Settlement>> {
        lock(&self.lanes).reset();
        self.file = Some(file);
        let mut started = vec![self.spawn(Lane::Global)];
        if self.group_key.is_some() {
            started.push(self.spawn(Lane::Scoped));
        }
        started
    }

    /// Change the grouping key. Starts a scoped request when a file is picked; clearing the key
    /// invalidates the scoped lane and leaves the global lane alone.
    pub fn select_group(&mut self, key: Option<String>) -> Option<JoinHandle<Settlement>> {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        if key == self.group_key {
            return None;
        }
        self.group_key = key;
        lock(&self.lanes).invalidate(Lane::Scoped);
        if self.file.is_some() && self.group_key.is_some() {
            Some(self.spawn(Lane::Scoped))
        } else {
            None
        }
    }

    /// Re-issue the lanes for the current selection, e.g. after a failure. Settled values stay on
    /// screen until the new answers arrive.
    pub fn retry(&mut self) -> Vec<JoinHandle<Settlement>> {
        let mut started = Vec::new();
        if self.file.is_some() {
            started.push(self.spawn(Lane::Global));
            if self.group_key.is_some() {
                started.push(self.spawn(Lane::Scoped));
            }
        }
        started
    }

    fn spawn(&self, lane: Lane) -> JoinHandle<Settlement> {
        let token = lock(&self.lanes).issue(lane);
        let request = ClassifyRequest {
            // spawn is only reached with a file picked
            file: self.file.clone().unwrap_or_else(|| FileRef::named("")),
            group_key: match lane {
                Lane::Global => None,
                Lane::Scoped => self.group_key.clone(),
            },
            stage: self.stage.clone(),
            subject: self.subject.clone(),
        };
        let api = Arc::clone(&self.api);
        let lanes = Arc::clone(&self.lanes);
        tokio::spawn(async move {
            let outcome = api
                .classify(&request)
                .await
                .with_context(|| format!("{} of '{}'", lane.operation(), request.file.name));
            lock(&lanes).settle(token, outcome)
        })
    }

    /// Read the lane state under the lock.
    pub fn with_lanes<R>(&self, read: impl FnOnce(&LaneCoordinator<Classification>) -> R) -> R {
        read(&lock(&self.lanes))
    }

    pub fn resolved(&self) -> Option<Classification> {
        self.with_lanes(|l| l.resolve().value().cloned())
    }

    pub fn notice(&self) -> LaneNotice {
        self.with_lanes(|l| l.notice())
    }
}
