use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::task::JoinHandle;

use super::lanes::{LaneNotice, LaneState, Settlement};
use super::lock;
use crate::api::{SearchRequest, SearchResponse, SharedApi, WorkspaceId};
use crate::graph_utils::graph::NodeId;

const OPERATION: &str = "semantic search";

#[derive(Debug, Default)]
struct SearchState {
    lane: LaneState<SearchResponse>,
    last_good: Option<SearchResponse>,
    // Bumped whenever the displayed results change
    revision: u64,
}

impl SearchState {
    fn shown(&self) -> Option<&SearchResponse> {
        self.lane.current().or(self.last_good.as_ref())
    }
}

/// Single-lane semantic search. Only the newest query's answer is ever shown; a failure keeps the
/// previous good results on screen.
pub struct SearchSession {
    api: SharedApi,
    workspace_id: WorkspaceId,
    top_k: u32,
    state: Arc<Mutex<SearchState>>,
}

impl SearchSession {
    pub fn new(api: SharedApi, workspace_id: WorkspaceId, top_k: u32) -> Self {
        Self { api, workspace_id, top_k: top_k.clamp(1, 20), state: Arc::new(Mutex::new(SearchState::default())) }
    }

    /// Submit a query. A blank query clears the results instead and returns `None`.
    pub fn submit(&self, query: &str) -> Option<JoinHandle<Settlement>> {
        let query = query.trim();
        if query.is_empty() {
            self.clear();
            return None;
        }
        let seq = lock(&self.state).lane.issue();
        let request = SearchRequest { workspace_id: self.workspace_id, query: query.to_string(), top_k: self.top_k };
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        Some(tokio::spawn(async move {
            let outcome = api
                .semantic_search(&request)
                .await
                .with_context(|| format!("{} for '{}'", OPERATION, request.query));
            let mut guard = lock(&state);
            let SearchState { lane, last_good, revision } = &mut *guard;
            let settlement = lane.settle(seq, outcome, last_good);
            match settlement {
                Settlement::Applied => *revision += 1,
                Settlement::Failed => log::warn!("{}", lane.error().unwrap_or_default()),
                Settlement::Stale => log::debug!("discarded stale search result seq={}", seq),
            }
            settlement
        }))
    }

    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.lane.invalidate();
        state.last_good = None;
        state.revision += 1;
    }

    pub fn revision(&self) -> u64 { lock(&self.state).revision }

    pub fn results(&self) -> Option<SearchResponse> { lock(&self.state).shown().cloned() }

    pub fn highlights(&self) -> HashSet<NodeId> {
        lock(&self.state).shown().map(SearchResponse::highlight_nodes).unwrap_or_default()
    }

    pub fn notice(&self) -> LaneNotice {
        let state = lock(&self.state);
        if let Some(message) = state.lane.error() {
            return LaneNotice::from_failure(OPERATION, message, state.last_good.is_some());
        }
        if state.lane.is_pending() {
            return LaneNotice::Pending { operation: OPERATION };
        }
        LaneNotice::Idle
    }
}
