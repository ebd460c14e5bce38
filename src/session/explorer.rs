use std::collections::HashSet;

use anyhow::{Context, anyhow};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::classify::ClassificationSession;
use super::poller::{JobEvent, PollExit, PollOptions, PollerSlot};
use super::search::SearchSession;
use crate::api::{BootstrapRequest, BootstrapSubmission, GraphQuery, JobId, SharedApi};
use crate::graph_utils::filter::{FilterState, GraphModel};
use crate::graph_utils::graph::{GraphSnapshot, NodeId};
use crate::persistence::settings::ExplorerSettings;
use crate::view::boundary::{RenderBoundary, RenderMode, RenderOutcome};
use crate::view::lod::{LabelFocus, LabelScheduler};

/// One open knowledge-graph view. Owns the graph model and every piece of async state tied to it;
/// dropping the session stops its job poller.
pub struct ExplorerSession {
    view_id: Uuid,
    api: SharedApi,
    graph_query: GraphQuery,
    model: GraphModel,
    labels: LabelScheduler,
    selected: Option<NodeId>,
    render: RenderBoundary,
    classification: ClassificationSession,
    search: SearchSession,
    jobs: PollerSlot,
    job_events: mpsc::UnboundedReceiver<JobEvent>,
    // Job id of the latest submission; events for any other job are dropped
    submitted: Option<Option<JobId>>,
    poll: PollOptions,
    // (search revision, highlight set) last handed to the label scheduler
    highlights: (u64, HashSet<NodeId>),
}

impl ExplorerSession {
    pub fn new(api: SharedApi, settings: &ExplorerSettings) -> Self {
        let view_id = Uuid::now_v7();
        let mut labels = LabelScheduler::new(settings.lod.clone());
        labels.set_size_scale(Some(settings.size_scale));
        let (jobs, job_events) = PollerSlot::new(api.clone());
        log::debug!("explorer view {} opened for workspace {}", view_id, settings.workspace_id);
        Self {
            view_id,
            graph_query: settings.graph_query(),
            model: GraphModel::new(),
            labels,
            selected: None,
            render: RenderBoundary::new(settings.render_mode),
            classification: ClassificationSession::new(api.clone(), &settings.stage, &settings.subject),
            search: SearchSession::new(api.clone(), settings.workspace_id, settings.search_top_k),
            jobs,
            job_events,
            submitted: None,
            poll: PollOptions { interval: settings.poll_interval(), notify: settings.notify_on_job_completion },
            highlights: (0, HashSet::new()),
            api,
        }
    }

    pub fn view_id(&self) -> Uuid { self.view_id }
    pub fn graph_query(&self) -> &GraphQuery { &self.graph_query }
    pub fn set_graph_query(&mut self, query: GraphQuery) { self.graph_query = query; }

    /// Fetch a fresh snapshot and replace the current one.
    pub async fn refresh_graph(&mut self) -> anyhow::Result<()> {
        let snapshot = self
            .api
            .fetch_graph(&self.graph_query)
            .await
            .with_context(|| format!("fetch graph for workspace {}", self.graph_query.workspace_id))?;
        self.install_snapshot(snapshot);
        Ok(())
    }

    pub fn install_snapshot(&mut self, snapshot: GraphSnapshot) {
        if let Some(id) = &self.selected {
            if !snapshot.contains(id) {
                log::debug!("view {}: selected node {} left the graph", self.view_id, id);
                self.selected = None;
            }
        }
        self.model.replace_snapshot(snapshot);
        self.render.reset();
    }

    pub fn model(&self) -> &GraphModel { &self.model }
    pub fn visible(&self) -> &GraphSnapshot { self.model.visible() }

    pub fn update_filters<R>(&mut self, edit: impl FnOnce(&mut FilterState) -> R) -> R {
        self.model.update_filters(edit)
    }

    /// Select a node by id. Unknown ids are rejected and leave the selection unchanged.
    pub fn select_node(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.selected = None;
                true
            }
            Some(id) if self.model.snapshot().contains(id) => {
                self.selected = Some(id.to_string());
                true
            }
            Some(_) => false,
        }
    }

    pub fn selected(&self) -> Option<&str> { self.selected.as_deref() }

    pub fn set_size_scale(&mut self, scale: Option<f32>) {
        self.labels.set_size_scale(scale);
    }

    pub fn labels(&self) -> &LabelScheduler { &self.labels }

    fn label_focus(&mut self) -> LabelFocus {
        let revision = self.search.revision();
        if self.highlights.0 != revision {
            self.highlights = (revision, self.search.highlights());
        }
        LabelFocus { selected: self.selected.clone(), highlighted: self.highlights.1.clone() }
    }

    /// Ids of the nodes whose labels are drawn at `zoom`, in snapshot order.
    pub fn frame_labels(&mut self, zoom: f32) -> Vec<NodeId> {
        let focus = self.label_focus();
        self.labels
            .labels_for_frame(self.model.visible(), self.model.generation(), zoom, &focus)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Draw one frame through the render fault boundary.
    pub fn render_frame<T>(
        &mut self,
        zoom: f32,
        draw: impl FnOnce(RenderMode, &GraphSnapshot, &[NodeId]) -> anyhow::Result<T>,
    ) -> RenderOutcome<T> {
        let labelled = self.frame_labels(zoom);
        let visible = self.model.visible();
        self.render.render(|mode| draw(mode, visible, &labelled))
    }

    pub fn render_mode(&self) -> RenderMode { self.render.mode() }

    pub fn classification(&self) -> &ClassificationSession { &self.classification }
    pub fn classification_mut(&mut self) -> &mut ClassificationSession { &mut self.classification }
    pub fn search(&self) -> &SearchSession { &self.search }

    /// Submit a graph build and start polling it. Any poller for an earlier job is cancelled first.
    pub async fn start_bootstrap(
        &mut self,
        request: &BootstrapRequest,
    ) -> anyhow::Result<(BootstrapSubmission, JoinHandle<PollExit>)> {
        self.jobs.cancel();
        self.submitted = None;
        let submission = self
            .api
            .submit_bootstrap(request)
            .await
            .with_context(|| format!("submit graph build for workspace {}", self.graph_query.workspace_id))?;
        log::info!(
            "view {}: graph build submitted, job {:?} status {}",
            self.view_id,
            submission.job_id,
            submission.status
        );
        self.submitted = Some(submission.job_id);
        let task = self.jobs.start(submission.clone(), self.poll);
        Ok((submission, task))
    }

    pub fn cancel_bootstrap(&mut self) {
        self.jobs.cancel();
        self.submitted = None;
    }

    pub fn is_polling(&self) -> bool { self.jobs.is_running() }

    pub async fn next_job_event(&mut self) -> Option<JobEvent> {
        self.job_events.recv().await
    }

    /// React to a poller event: refresh the graph on completion and return the user-facing
    /// message, if one was requested. A poll transport failure comes back as an error. Events for a
    /// job other than the latest submission are ignored.
    pub async fn handle_job_event(&mut self, event: JobEvent) -> anyhow::Result<Option<String>> {
        if self.submitted != Some(event.job_id()) {
            log::debug!(
                "view {}: dropping event for job {:?}, current submission {:?}",
                self.view_id,
                event.job_id(),
                self.submitted
            );
            return Ok(None);
        }
        match event {
            JobEvent::Finished { job_id, status, notice, .. } => {
                log::info!("view {}: job {:?} ended {}, refreshing graph", self.view_id, job_id, status);
                self.refresh_graph().await?;
                Ok(notice.map(|n| n.to_string()))
            }
            JobEvent::PollFailed { job_id, error, polls } => {
                Err(anyhow!("graph build job {:?} could not be polled after {} polls: {}", job_id, polls, error))
            }
        }
    }
}
