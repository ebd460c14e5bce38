//! Level-of-detail label scheduling.
//!
//! Each frame starts with [`LabelScheduler::begin_frame`], which resolves the zoom bucket and
//! resets the label budget. [`LabelScheduler::should_show`] is then asked once per candidate node.
//! Pinned nodes (the selection and highlighted nodes) always get a label and never consume budget.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::sizing::{effective_scale, node_size, top_fraction_len};
use crate::graph_utils::graph::{GraphSnapshot, Node, NodeId, NodeType};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub lod_enabled: bool,
    // Ascending zoom magnitudes splitting the four buckets
    pub zoom_thresholds: [f32; 3],
    pub leaf_types: Vec<NodeType>,
    pub structural_types: Vec<NodeType>,
    // Non-pinned label cap per bucket, indexed by ZoomBucket::index
    pub bucket_caps: [usize; 4],
    pub important_fraction: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            lod_enabled: true,
            zoom_thresholds: [0.6, 1.1, 1.8],
            leaf_types: vec![NodeType::Resource],
            structural_types: vec![NodeType::Resource, NodeType::Chapter, NodeType::Section, NodeType::KnowledgePoint],
            bucket_caps: [0, 40, 90, 160],
            important_fraction: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoomBucket {
    Overview,
    Leaf,
    Structural,
    Detailed,
}

impl ZoomBucket {
    pub fn from_zoom(zoom: f32, thresholds: &[f32; 3]) -> Self {
        if !zoom.is_finite() || zoom < thresholds[0] {
            ZoomBucket::Overview
        } else if zoom < thresholds[1] {
            ZoomBucket::Leaf
        } else if zoom < thresholds[2] {
            ZoomBucket::Structural
        } else {
            ZoomBucket::Detailed
        }
    }

    pub fn index(self) -> usize {
        match self {
            ZoomBucket::Overview => 0,
            ZoomBucket::Leaf => 1,
            ZoomBucket::Structural => 2,
            ZoomBucket::Detailed => 3,
        }
    }
}

/// Nodes whose labels bypass both the zoom rules and the budget.
#[derive(Clone, Debug, Default)]
pub struct LabelFocus {
    pub selected: Option<NodeId>,
    pub highlighted: HashSet<NodeId>,
}

impl LabelFocus {
    pub fn is_pinned(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id) || self.highlighted.contains(id)
    }
}

#[derive(Clone, Copy, Debug)]
struct FrameBudget {
    bucket: ZoomBucket,
    cap: usize,
    used: usize,
}

#[derive(Debug)]
pub struct LabelScheduler {
    config: LodConfig,
    size_scale: f32,
    // (model generation, scale bits) the important set was computed for
    importance_key: Option<(u64, u32)>,
    important: HashSet<NodeId>,
    importance_threshold: Option<f32>,
    frame: FrameBudget,
}

impl LabelScheduler {
    pub fn new(config: LodConfig) -> Self {
        let cap = config.bucket_caps[0];
        Self {
            config,
            size_scale: 1.0,
            importance_key: None,
            important: HashSet::new(),
            importance_threshold: None,
            frame: FrameBudget { bucket: ZoomBucket::Overview, cap, used: 0 },
        }
    }

    pub fn config(&self) -> &LodConfig { &self.config }

    pub fn size_scale(&self) -> f32 { self.size_scale }

    pub fn set_size_scale(&mut self, scale: Option<f32>) {
        self.size_scale = effective_scale(scale);
    }

    pub fn bucket(&self) -> ZoomBucket { self.frame.bucket }
    pub fn labels_used(&self) -> usize { self.frame.used }
    pub fn importance_threshold(&self) -> Option<f32> { self.importance_threshold }

    /// Recompute the important set if the model generation or the size scale changed since the
    /// last call. Returns whether a recomputation happened.
    ///
    /// The set holds the largest `ceil(n * important_fraction)` visible nodes. Equal sizes are
    /// ranked by snapshot order, so ties never push the set past its cap.
    pub fn sync_visible(&mut self, generation: u64, visible: &GraphSnapshot) -> bool {
        let key = (generation, self.size_scale.to_bits());
        if self.importance_key == Some(key) {
            return false;
        }
        let scale = self.size_scale;
        let mut ranked: Vec<(&Node, f32)> = visible.nodes().iter().map(|n| (n, node_size(n, scale))).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_fraction_len(ranked.len(), self.config.important_fraction));
        self.importance_threshold = ranked.last().map(|(_, size)| *size);
        self.important = ranked.into_iter().map(|(n, _)| n.id.clone()).collect();
        self.importance_key = Some(key);
        log::debug!(
            "label importance recomputed: generation={} nodes={} important={} threshold={:?}",
            generation,
            visible.node_count(),
            self.important.len(),
            self.importance_threshold
        );
        true
    }

    pub fn begin_frame(&mut self, zoom: f32) {
        let bucket = ZoomBucket::from_zoom(zoom, &self.config.zoom_thresholds);
        if bucket != self.frame.bucket {
            log::debug!("zoom bucket {:?} -> {:?}", self.frame.bucket, bucket);
        }
        self.frame = FrameBudget { bucket, cap: self.config.bucket_caps[bucket.index()], used: 0 };
    }

    pub fn is_important(&self, node: &Node) -> bool {
        self.important.contains(&node.id)
    }

    pub fn should_show(&mut self, node: &Node, focus: &LabelFocus) -> bool {
        if focus.is_pinned(&node.id) || !self.config.lod_enabled {
            return true;
        }
        let eligible = match self.frame.bucket {
            ZoomBucket::Overview => false,
            ZoomBucket::Leaf => self.config.leaf_types.contains(&node.node_type),
            ZoomBucket::Structural => self.config.structural_types.contains(&node.node_type),
            ZoomBucket::Detailed => self.config.structural_types.contains(&node.node_type) || self.is_important(node),
        };
        if !eligible || self.frame.used >= self.frame.cap {
            return false;
        }
        self.frame.used += 1;
        true
    }

    /// Run a whole frame over `visible` in snapshot order and return the labelled node ids.
    /// `generation` identifies the visible set; see [`GraphModel::generation`].
    ///
    /// [`GraphModel::generation`]: crate::graph_utils::filter::GraphModel::generation
    pub fn labels_for_frame<'a>(
        &mut self,
        visible: &'a GraphSnapshot,
        generation: u64,
        zoom: f32,
        focus: &LabelFocus,
    ) -> Vec<&'a str> {
        self.sync_visible(generation, visible);
        self.begin_frame(zoom);
        visible
            .nodes()
            .iter()
            .filter(|n| self.should_show(n, focus))
            .map(|n| n.id.as_str())
            .collect()
    }
}

impl Default for LabelScheduler {
    fn default() -> Self {
        LabelScheduler::new(LodConfig::default())
    }
}
