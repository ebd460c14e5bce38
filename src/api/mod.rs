//! Boundary to the catalogue backend. Everything behind [`KnowledgeApi`] is an opaque collaborator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::graph_utils::graph::GraphSnapshot;

pub mod types;
#[cfg(feature = "http")]
pub mod http;

pub use types::{
    BootstrapJob, BootstrapRequest, BootstrapSubmission, Classification, ClassifyRequest, FileRef, GraphQuery,
    GraphScope, JobHandle, JobId, JobStatus, SearchRequest, SearchResponse, WorkspaceId,
};

#[async_trait]
pub trait KnowledgeApi: Send + Sync {
    async fn fetch_graph(&self, query: &GraphQuery) -> anyhow::Result<GraphSnapshot>;
    async fn classify(&self, request: &ClassifyRequest) -> anyhow::Result<Classification>;
    async fn semantic_search(&self, request: &SearchRequest) -> anyhow::Result<SearchResponse>;
    async fn submit_bootstrap(&self, request: &BootstrapRequest) -> anyhow::Result<BootstrapSubmission>;
    async fn bootstrap_status(&self, job: JobHandle) -> anyhow::Result<BootstrapJob>;
}

pub type SharedApi = Arc<dyn KnowledgeApi>;
