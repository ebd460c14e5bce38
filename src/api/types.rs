use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::graph_utils::graph::NodeId;

pub type WorkspaceId = u64;
pub type JobId = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphScope {
    #[default]
    Public,
    Mixed,
}

impl GraphScope {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphScope::Public => "public",
            GraphScope::Mixed => "mixed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphQuery {
    pub workspace_id: WorkspaceId,
    pub scope: GraphScope,
    pub limit: u32,
    pub include_format_nodes: bool,
    pub q: Option<String>,
}

impl GraphQuery {
    pub const MIN_LIMIT: u32 = 40;
    pub const MAX_LIMIT: u32 = 800;

    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self { workspace_id, scope: GraphScope::Public, limit: 200, include_format_nodes: true, q: None }
    }

    // The endpoint rejects caps outside 40..=800
    pub fn clamped_limit(&self) -> u32 { self.limit.clamp(Self::MIN_LIMIT, Self::MAX_LIMIT) }
}

/// A file picked for classification. Identity is the name; content is optional so callers can
/// classify by filename alone.
#[derive(Clone, Debug)]
pub struct FileRef {
    pub name: String,
    pub content: Option<Arc<[u8]>>,
}

impl FileRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), content: None }
    }

    pub fn with_content(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self { name: name.into(), content: Some(Arc::from(content)) }
    }

    // Title guess used by the classifier: the filename without its extension
    pub fn stem(&self) -> &str {
        let base = self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name);
        match base.rfind('.') {
            Some(i) if i > 0 => &base[..i],
            _ => base,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClassifyRequest {
    pub file: FileRef,
    // Volume code narrowing the candidate chapters; None for the global lane
    pub group_key: Option<String>,
    pub stage: String,
    pub subject: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    #[default]
    Low,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationCandidate {
    pub chapter_id: i64,
    pub volume_code: String,
    pub title: String,
    pub score: f64,
    pub probability: f64,
    pub reasons: Vec<String>,
    pub rule_score: f64,
    pub lexical_score: f64,
    pub vector_score: f64,
    pub final_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub picked_chapter_id: Option<i64>,
    pub picked_volume_code: Option<String>,
    pub recommended_chapter_id: Option<i64>,
    pub confidence: f64,
    pub confidence_level: ConfidenceTier,
    pub is_low_confidence: bool,
    pub candidates: Vec<ClassificationCandidate>,
    pub rule_hits: Vec<String>,
    pub reason: String,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            picked_chapter_id: None,
            picked_volume_code: None,
            recommended_chapter_id: None,
            confidence: 0.0,
            confidence_level: ConfidenceTier::Low,
            is_low_confidence: true,
            candidates: Vec::new(),
            rule_hits: Vec::new(),
            reason: String::new(),
        }
    }
}

impl Classification {
    pub fn top_candidate(&self) -> Option<&ClassificationCandidate> { self.candidates.first() }
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchRequest {
    #[serde(skip)]
    pub workspace_id: WorkspaceId,
    pub query: String,
    pub top_k: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreFactors {
    pub vector: f64,
    pub summary: f64,
    pub content: f64,
    pub tags: f64,
    pub raw: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTarget {
    pub resource_id: Option<i64>,
    pub source_id: Option<i64>,
    pub canonical_key: Option<String>,
    pub title: String,
    pub file_format: Option<String>,
    pub chapter_id: Option<i64>,
    pub section_id: Option<i64>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub score: f64,
    pub probability: f64,
    pub factors: ScoreFactors,
    pub target: Option<SearchTarget>,
    pub highlight_nodes: Vec<NodeId>,
    pub highlight_edges: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub query: String,
    pub answer: Option<String>,
    pub threshold: f64,
    pub returned_count: usize,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn highlight_nodes(&self) -> HashSet<NodeId> {
        self.results.iter().flat_map(|hit| hit.highlight_nodes.iter().cloned()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    PartialFailed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::PartialFailed => "partial_failed",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, Serialize)]
pub struct BootstrapRequest {
    pub stage: String,
    pub subject: String,
    pub force_extract: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobHandle {
    pub workspace_id: WorkspaceId,
    pub job_id: JobId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: WorkspaceId,
    #[serde(default)]
    pub name: String,
}

fn skipped() -> JobStatus { JobStatus::Skipped }

/// Initial state returned when a graph build is requested. The server may decline to start a job,
/// in which case there is no job id and the status is terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapSubmission {
    #[serde(default)]
    pub workspace: Option<WorkspaceRef>,
    #[serde(default, rename = "bootstrap_job_id")]
    pub job_id: Option<JobId>,
    #[serde(default = "skipped", rename = "bootstrap_status")]
    pub status: JobStatus,
    #[serde(default, rename = "extract_reason")]
    pub reason: String,
    #[serde(default)]
    pub source_count: u32,
    #[serde(default, rename = "failed_sources_count")]
    pub failed_count: u32,
}

impl BootstrapSubmission {
    pub fn handle(&self) -> Option<JobHandle> {
        match (&self.workspace, self.job_id) {
            (Some(ws), Some(job_id)) => Some(JobHandle { workspace_id: ws.id, job_id }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapJob {
    pub job_id: JobId,
    #[serde(default)]
    pub workspace_id: WorkspaceId,
    pub status: JobStatus,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub processed_sources: u32,
    #[serde(default, rename = "succeeded_sources")]
    pub succeeded_count: u32,
    #[serde(default, rename = "failed_sources_count")]
    pub failed_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        serialize_with = "time::serde::rfc3339::option::serialize"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

// Timestamps that do not parse as RFC 3339 are treated as absent
fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<OffsetDateTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| OffsetDateTime::parse(s.trim(), &Rfc3339).ok()))
}
