use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

// Basic type aliases for clarity
pub type NodeId = String;
type MetaBag = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Chapter,
    Section,
    Format,
    Resource,
    KnowledgePoint,
    Formula,
    Experiment,
    ProblemType,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Chapter,
        NodeType::Section,
        NodeType::Format,
        NodeType::Resource,
        NodeType::KnowledgePoint,
        NodeType::Formula,
        NodeType::Experiment,
        NodeType::ProblemType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Chapter => "chapter",
            NodeType::Section => "section",
            NodeType::Format => "format",
            NodeType::Resource => "resource",
            NodeType::KnowledgePoint => "knowledge_point",
            NodeType::Formula => "formula",
            NodeType::Experiment => "experiment",
            NodeType::ProblemType => "problem_type",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = normalize_key(raw);
        Self::ALL.into_iter().find(|t| t.as_str() == key)
    }

    // Resource and format nodes are additionally gated by difficulty and format group
    pub fn is_content_gated(self) -> bool {
        matches!(self, NodeType::Resource | NodeType::Format)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Contains,
    RelatedTo,
    AppearsIn,
}

impl EdgeType {
    pub const ALL: [EdgeType; 3] = [EdgeType::Contains, EdgeType::RelatedTo, EdgeType::AppearsIn];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Contains => "contains",
            EdgeType::RelatedTo => "related_to",
            EdgeType::AppearsIn => "appears_in",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = normalize_key(raw);
        Self::ALL.into_iter().find(|t| t.as_str() == key)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Ordinal difficulty of a resource. Ordering follows the catalogue: basic < advanced < challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Basic,
    Advanced,
    Challenge,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Basic, Difficulty::Advanced, Difficulty::Challenge];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Basic => "basic",
            Difficulty::Advanced => "advanced",
            Difficulty::Challenge => "challenge",
        }
    }

    // Accepts both the English ordinals and the catalogue's own labels
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "基础" => return Some(Difficulty::Basic),
            "进阶" => return Some(Difficulty::Advanced),
            "挑战" => return Some(Difficulty::Challenge),
            _ => {}
        }
        let key = normalize_key(raw);
        Self::ALL.into_iter().find(|d| d.as_str() == key)
    }

    pub fn rank(self) -> u8 {
        match self {
            Difficulty::Basic => 0,
            Difficulty::Advanced => 1,
            Difficulty::Challenge => 2,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

/// Typed view over a node's open attribute bag. Keys that are not understood stay in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(flatten)]
    pub extra: MetaBag,
}

impl NodeMeta {
    // Missing or malformed known keys are treated as absent
    pub fn from_bag(mut bag: MetaBag) -> Self {
        let difficulty = bag.remove("difficulty").as_ref().and_then(Value::as_str).and_then(Difficulty::parse);
        let format_group = bag
            .remove("format_group")
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let tags = match bag.remove("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let summary = bag
            .remove("summary")
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let visibility = bag.remove("visibility").as_ref().and_then(Value::as_str).and_then(Visibility::parse);
        Self { difficulty, format_group, tags, summary, visibility, extra: bag }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.extra.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_label: Option<String>,
    #[serde(default)]
    pub meta: NodeMeta,
}

impl Node {
    // keyword_label wins when it carries any text
    pub fn display_label(&self) -> &str {
        match self.keyword_label.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => k,
            _ => &self.label,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub weight: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_resources: usize,
    pub embedded_resources: usize,
    pub chapter_nodes: usize,
    pub section_nodes: usize,
    pub format_nodes: usize,
    pub public_sources: usize,
    pub private_sources: usize,
    pub similarity_edges: usize,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<OffsetDateTime>,
}

impl GraphStats {
    pub fn tally(nodes: &[Node], edges: &[Edge]) -> Self {
        let mut stats = GraphStats::default();
        for node in nodes {
            match node.node_type {
                NodeType::Resource => {
                    stats.total_resources += 1;
                    if node.meta.flag("has_embedding") { stats.embedded_resources += 1; }
                    match node.meta.visibility {
                        Some(Visibility::Public) => stats.public_sources += 1,
                        Some(Visibility::Private) => stats.private_sources += 1,
                        None => {}
                    }
                }
                NodeType::Chapter => stats.chapter_nodes += 1,
                NodeType::Section => stats.section_nodes += 1,
                NodeType::Format => stats.format_nodes += 1,
                _ => {}
            }
        }
        stats.similarity_edges = edges.iter().filter(|e| e.edge_type != EdgeType::Contains).count();
        stats
    }
}

// Wire shapes as delivered by the graph endpoint. Everything optional defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
    #[serde(default)]
    pub stats: Option<RawStats>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub keyword_label: Option<String>,
    #[serde(default, alias = "type")]
    pub node_type: String,
    #[serde(default)]
    pub meta: MetaBag,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub edge_type: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawStats {
    #[serde(default)]
    pub total_resources: usize,
    #[serde(default)]
    pub embedded_resources: usize,
    #[serde(default)]
    pub chapter_nodes: usize,
    #[serde(default)]
    pub section_nodes: usize,
    #[serde(default)]
    pub format_nodes: usize,
    #[serde(default)]
    pub public_sources: usize,
    #[serde(default)]
    pub private_sources: usize,
    #[serde(default)]
    pub similarity_edges: usize,
    #[serde(default)]
    pub generated_at: Option<String>,
}

impl From<RawStats> for GraphStats {
    fn from(raw: RawStats) -> Self {
        GraphStats {
            total_resources: raw.total_resources,
            embedded_resources: raw.embedded_resources,
            chapter_nodes: raw.chapter_nodes,
            section_nodes: raw.section_nodes,
            format_nodes: raw.format_nodes,
            public_sources: raw.public_sources,
            private_sources: raw.private_sources,
            similarity_edges: raw.similarity_edges,
            // Unparseable timestamps are dropped rather than failing the snapshot
            generated_at: raw.generated_at.as_deref().and_then(|s| OffsetDateTime::parse(s.trim(), &Rfc3339).ok()),
        }
    }
}

/// What normalization threw away or adjusted while building a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub empty_ids: usize,
    pub duplicate_nodes: usize,
    pub unknown_node_types: usize,
    pub unknown_edge_types: usize,
    pub dangling_edges: usize,
    pub duplicate_edges: usize,
    pub adjusted_weights: usize,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool { *self == NormalizeReport::default() }
}

impl fmt::Display for NormalizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "empty_ids={} dup_nodes={} unknown_node_types={} unknown_edge_types={} dangling_edges={} dup_edges={} adjusted_weights={}",
            self.empty_ids,
            self.duplicate_nodes,
            self.unknown_node_types,
            self.unknown_edge_types,
            self.dangling_edges,
            self.duplicate_edges,
            self.adjusted_weights
        )
    }
}

/// An immutable, normalized node/edge graph. A new snapshot replaces the old one wholesale.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<GraphStats>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

impl PartialEq for GraphSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges && self.stats == other.stats
    }
}

impl GraphSnapshot {
    // Instantiate a new, empty snapshot
    pub fn new() -> Self {
        GraphSnapshot::default()
    }

    // Callers guarantee unique ids and no dangling edges
    pub(crate) fn from_trusted(nodes: Vec<Node>, edges: Vec<Edge>, stats: Option<GraphStats>) -> Self {
        let index = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
        GraphSnapshot { nodes, edges, stats, index }
    }

    /// Normalize raw endpoint output into a snapshot.
    ///
    /// Nodes keep their delivery order with the first occurrence of an id winning; edges whose
    /// endpoints did not survive are dropped as dangling. Server stats are kept when present,
    /// otherwise they are tallied from the normalized content.
    pub fn from_raw(raw: RawGraph) -> (Self, NormalizeReport) {
        let mut report = NormalizeReport::default();
        let mut nodes: Vec<Node> = Vec::with_capacity(raw.nodes.len());
        let mut seen_nodes: HashSet<NodeId> = HashSet::with_capacity(raw.nodes.len());

        for rn in raw.nodes {
            let id = rn.id.trim().to_string();
            if id.is_empty() {
                report.empty_ids += 1;
                continue;
            }
            let Some(node_type) = NodeType::parse(&rn.node_type) else {
                report.unknown_node_types += 1;
                continue;
            };
            if !seen_nodes.insert(id.clone()) {
                report.duplicate_nodes += 1;
                continue;
            }
            let keyword_label = rn.keyword_label.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
            nodes.push(Node { id, node_type, label: rn.label, keyword_label, meta: NodeMeta::from_bag(rn.meta) });
        }

        let mut edges: Vec<Edge> = Vec::with_capacity(raw.edges.len());
        let mut seen_edges: HashSet<(NodeId, NodeId, EdgeType)> = HashSet::with_capacity(raw.edges.len());
        for re in raw.edges {
            let Some(edge_type) = EdgeType::parse(&re.edge_type) else {
                report.unknown_edge_types += 1;
                continue;
            };
            let source = re.source.trim().to_string();
            let target = re.target.trim().to_string();
            if !seen_nodes.contains(&source) || !seen_nodes.contains(&target) {
                report.dangling_edges += 1;
                continue;
            }
            if !seen_edges.insert((source.clone(), target.clone(), edge_type)) {
                report.duplicate_edges += 1;
                continue;
            }
            let weight = match re.weight {
                None => 1.0,
                Some(w) if !w.is_finite() => {
                    report.adjusted_weights += 1;
                    1.0
                }
                Some(w) if w < 0.0 => {
                    report.adjusted_weights += 1;
                    0.0
                }
                Some(w) => w,
            };
            edges.push(Edge { source, target, edge_type, weight });
        }

        let stats = match raw.stats {
            Some(s) => GraphStats::from(s),
            None => GraphStats::tally(&nodes, &edges),
        };
        (GraphSnapshot::from_trusted(nodes, edges, Some(stats)), report)
    }

    pub fn nodes(&self) -> &[Node] { &self.nodes }
    pub fn edges(&self) -> &[Edge] { &self.edges }
    pub fn stats(&self) -> Option<&GraphStats> { self.stats.as_ref() }
    pub fn get_node(&self, id: &str) -> Option<&Node> { self.index.get(id).map(|&i| &self.nodes[i]) }
    pub fn contains(&self, id: &str) -> bool { self.index.contains_key(id) }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    // Fetch helpers:
    // Nodes
    pub fn find_node_ids_by_type(&self, node_type: NodeType) -> Vec<&str> {
        self
            .nodes
            .iter()
            .filter_map(|n| if n.node_type == node_type { Some(n.id.as_str()) } else { None })
            .collect()
    }

    pub fn find_node_ids_by_tag(&self, tag: &str) -> Vec<&str> {
        self
            .nodes
            .iter()
            .filter_map(|n| if n.meta.tags.iter().any(|t| t == tag) { Some(n.id.as_str()) } else { None })
            .collect()
    }
}
