use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::graph::{Difficulty, Edge, EdgeType, GraphSnapshot, GraphStats, Node, NodeType};

/// Per-dimension enable flags for the values observed in the current snapshot.
///
/// Lookups for values without an entry answer `true`: an unknown value is never excluded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub node_types: BTreeMap<NodeType, bool>,
    pub edge_types: BTreeMap<EdgeType, bool>,
    pub difficulties: BTreeMap<Difficulty, bool>,
    pub format_groups: BTreeMap<String, bool>,
}

impl FilterState {
    pub fn new() -> Self {
        FilterState::default()
    }

    /// Build a state with every observed value enabled.
    pub fn for_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut state = FilterState::new();
        state.sync_with(snapshot);
        state
    }

    /// Re-derive the toggleable value sets from `snapshot`.
    ///
    /// Values that vanished lose their entry, new values come in enabled, and values still present
    /// keep whatever flag they had.
    pub fn sync_with(&mut self, snapshot: &GraphSnapshot) {
        let mut node_types = BTreeMap::new();
        let mut edge_types = BTreeMap::new();
        let mut difficulties = BTreeMap::new();
        let mut format_groups = BTreeMap::new();

        for node in snapshot.nodes() {
            node_types.entry(node.node_type).or_insert_with(|| flag_or_on(&self.node_types, &node.node_type));
            if let Some(d) = node.meta.difficulty {
                difficulties.entry(d).or_insert_with(|| flag_or_on(&self.difficulties, &d));
            }
            if let Some(g) = &node.meta.format_group {
                if !format_groups.contains_key(g) {
                    let on = flag_or_on(&self.format_groups, g);
                    format_groups.insert(g.clone(), on);
                }
            }
        }
        for edge in snapshot.edges() {
            edge_types.entry(edge.edge_type).or_insert_with(|| flag_or_on(&self.edge_types, &edge.edge_type));
        }

        self.node_types = node_types;
        self.edge_types = edge_types;
        self.difficulties = difficulties;
        self.format_groups = format_groups;
    }

    pub fn node_type_enabled(&self, t: NodeType) -> bool { flag_or_on(&self.node_types, &t) }
    pub fn edge_type_enabled(&self, t: EdgeType) -> bool { flag_or_on(&self.edge_types, &t) }
    pub fn difficulty_enabled(&self, d: Difficulty) -> bool { flag_or_on(&self.difficulties, &d) }
    pub fn format_group_enabled(&self, g: &str) -> bool { self.format_groups.get(g).copied().unwrap_or(true) }

    // Setters only touch values the snapshot actually has; they return false otherwise
    pub fn set_node_type(&mut self, t: NodeType, enabled: bool) -> bool { set_known(&mut self.node_types, &t, enabled) }
    pub fn set_edge_type(&mut self, t: EdgeType, enabled: bool) -> bool { set_known(&mut self.edge_types, &t, enabled) }
    pub fn set_difficulty(&mut self, d: Difficulty, enabled: bool) -> bool { set_known(&mut self.difficulties, &d, enabled) }
    pub fn set_format_group(&mut self, g: &str, enabled: bool) -> bool {
        match self.format_groups.get_mut(g) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    /// Show only the listed node types; every other known type is switched off.
    pub fn isolate_node_types(&mut self, keep: &[NodeType]) {
        for (t, flag) in self.node_types.iter_mut() {
            *flag = keep.contains(t);
        }
    }

    pub fn node_passes(&self, node: &Node) -> bool {
        if !self.node_type_enabled(node.node_type) {
            return false;
        }
        if !node.node_type.is_content_gated() {
            return true;
        }
        let difficulty_ok = node.meta.difficulty.is_none_or(|d| self.difficulty_enabled(d));
        let group_ok = node.meta.format_group.as_deref().is_none_or(|g| self.format_group_enabled(g));
        difficulty_ok && group_ok
    }
}

fn flag_or_on<K: Ord>(map: &BTreeMap<K, bool>, key: &K) -> bool {
    map.get(key).copied().unwrap_or(true)
}

fn set_known<K: Ord>(map: &mut BTreeMap<K, bool>, key: &K, enabled: bool) -> bool {
    match map.get_mut(key) {
        Some(flag) => {
            *flag = enabled;
            true
        }
        None => false,
    }
}

/// Derive the visible subgraph. Pure: the snapshot is only read.
pub fn compute_visible_graph(snapshot: &GraphSnapshot, filter: &FilterState) -> GraphSnapshot {
    let nodes: Vec<Node> = snapshot.nodes().iter().filter(|n| filter.node_passes(n)).cloned().collect();
    if nodes.is_empty() {
        return GraphSnapshot::from_trusted(Vec::new(), Vec::new(), Some(GraphStats::default()));
    }

    let retained: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges: Vec<Edge> = snapshot
        .edges()
        .iter()
        .filter(|e| {
            filter.edge_type_enabled(e.edge_type)
                && retained.contains(e.source.as_str())
                && retained.contains(e.target.as_str())
        })
        .cloned()
        .collect();

    let stats = GraphStats::tally(&nodes, &edges);
    GraphSnapshot::from_trusted(nodes, edges, Some(stats))
}

/// Owns the current snapshot, its filters and the cached visible graph.
#[derive(Debug, Default)]
pub struct GraphModel {
    snapshot: GraphSnapshot,
    filters: FilterState,
    visible: GraphSnapshot,
    generation: u64,
}

impl GraphModel {
    pub fn new() -> Self {
        GraphModel::default()
    }

    pub fn replace_snapshot(&mut self, snapshot: GraphSnapshot) {
        self.filters.sync_with(&snapshot);
        self.snapshot = snapshot;
        self.generation += 1;
        self.recompute();
        log::info!(
            "graph snapshot replaced: generation={} nodes={} edges={} visible_nodes={} visible_edges={}",
            self.generation,
            self.snapshot.node_count(),
            self.snapshot.edge_count(),
            self.visible.node_count(),
            self.visible.edge_count()
        );
    }

    /// Apply an edit to the filters and recompute the visible graph.
    pub fn update_filters<R>(&mut self, edit: impl FnOnce(&mut FilterState) -> R) -> R {
        let out = edit(&mut self.filters);
        self.generation += 1;
        self.recompute();
        out
    }

    fn recompute(&mut self) {
        self.visible = compute_visible_graph(&self.snapshot, &self.filters);
    }

    pub fn snapshot(&self) -> &GraphSnapshot { &self.snapshot }
    pub fn filters(&self) -> &FilterState { &self.filters }
    pub fn visible(&self) -> &GraphSnapshot { &self.visible }
    // Bumped on every snapshot or filter change
    pub fn generation(&self) -> u64 { self.generation }
}
