use crate::graph_utils::graph::{Difficulty, Node, NodeType};

// World-space radius per node type before any scaling
pub fn base_size(node_type: NodeType) -> f32 {
    match node_type {
        NodeType::Chapter => 14.0,
        NodeType::Section => 10.0,
        NodeType::Format => 8.0,
        NodeType::KnowledgePoint => 7.0,
        NodeType::Experiment => 7.0,
        NodeType::Resource => 6.0,
        NodeType::Formula => 6.0,
        NodeType::ProblemType => 6.0,
    }
}

pub fn difficulty_increment(difficulty: Option<Difficulty>) -> f32 {
    match difficulty {
        None => 0.0,
        Some(d) => 1.5 * f32::from(d.rank()),
    }
}

/// Resolve a user size multiplier. Missing, non-finite or non-positive values mean neutral scaling.
pub fn effective_scale(scale: Option<f32>) -> f32 {
    match scale {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => 1.0,
    }
}

pub fn node_size(node: &Node, scale: f32) -> f32 {
    (base_size(node.node_type) + difficulty_increment(node.meta.difficulty)) * scale
}

/// How many of `len` nodes make up the top `fraction`: `ceil(len * fraction)`, at least one when
/// the fraction is positive and never more than `len`.
///
/// A missing, non-finite or non-positive fraction selects nothing.
pub fn top_fraction_len(len: usize, fraction: f32) -> usize {
    if len == 0 || !fraction.is_finite() || fraction <= 0.0 {
        return 0;
    }
    // f32 fractions sit slightly above their decimal value; 10 * 0.3 must stay 3
    let take = ((len as f64) * f64::from(fraction.min(1.0)) - 1e-6).ceil() as usize;
    take.clamp(1, len)
}
