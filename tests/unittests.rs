use kg_explorer::api::types::{BootstrapJob, BootstrapSubmission, Classification, GraphQuery, JobStatus};
use kg_explorer::graph_utils::filter::{FilterState, GraphModel, compute_visible_graph};
use kg_explorer::graph_utils::graph::{Difficulty, EdgeType, GraphSnapshot, NodeType, RawGraph};
use kg_explorer::persistence::settings::ExplorerSettings;
use kg_explorer::session::lanes::{Lane, LaneCoordinator, LaneNotice, Resolved, Settlement};
use kg_explorer::view::boundary::{RenderBoundary, RenderMode, RenderOutcome};
use kg_explorer::view::lod::{LabelFocus, LabelScheduler, LodConfig, ZoomBucket};
use kg_explorer::view::sizing::{effective_scale, top_fraction_len};
use proptest::prelude::*;
use serde_json::{Value, json};
use uuid::Uuid;

fn snapshot(v: Value) -> GraphSnapshot {
    let raw: RawGraph = serde_json::from_value(v).expect("raw graph");
    GraphSnapshot::from_raw(raw).0
}

// Three chapters, five resources; chapters are linked to each other and contain the resources
fn chapters_and_resources() -> GraphSnapshot {
    let mut nodes = vec![
        json!({"id": "c1", "label": "Motion", "type": "chapter"}),
        json!({"id": "c2", "label": "Force", "type": "chapter"}),
        json!({"id": "c3", "label": "Energy", "type": "chapter"}),
    ];
    for i in 1..=5 {
        nodes.push(json!({
            "id": format!("r{i}"),
            "label": format!("resource {i}"),
            "type": "resource",
            "meta": {"difficulty": if i % 2 == 0 { "进阶" } else { "基础" }, "format_group": "video"}
        }));
    }
    let mut edges = vec![
        json!({"source": "c1", "target": "c2", "edge_type": "related_to", "weight": 0.8}),
        json!({"source": "c2", "target": "c3", "edge_type": "related_to", "weight": 0.6}),
    ];
    for i in 1..=5 {
        let chapter = format!("c{}", (i % 3) + 1);
        edges.push(json!({"source": chapter, "target": format!("r{i}"), "edge_type": "contains"}));
    }
    snapshot(json!({"nodes": nodes, "edges": edges}))
}

#[test]
fn normalize_drops_dangling_duplicate_and_unknown_entries() {
    let raw: RawGraph = serde_json::from_value(json!({
        "nodes": [
            {"id": " a ", "label": "first", "type": "chapter"},
            {"id": "a", "label": "second", "type": "section"},
            {"id": "", "label": "blank", "type": "chapter"},
            {"id": "b", "label": "b", "type": "knowledge-point"},
            {"id": "x", "label": "x", "type": "galaxy"}
        ],
        "edges": [
            {"source": "a", "target": "b", "edge_type": "contains"},
            {"source": "a", "target": "b", "edge_type": "contains", "weight": 3.0},
            {"source": "a", "target": "x", "edge_type": "contains"},
            {"source": "a", "target": "b", "edge_type": "teleports"},
            {"source": "b", "target": "a", "edge_type": "related_to", "weight": -2.0}
        ]
    }))
    .unwrap();
    let (snap, report) = GraphSnapshot::from_raw(raw);

    assert_eq!(snap.node_count(), 2);
    // First occurrence wins
    assert_eq!(snap.get_node("a").unwrap().label, "first");
    assert_eq!(snap.get_node("b").unwrap().node_type, NodeType::KnowledgePoint);
    assert_eq!(snap.edge_count(), 2);
    assert_eq!(snap.edges()[0].weight, 1.0);
    assert_eq!(snap.edges()[1].weight, 0.0);

    assert_eq!(report.empty_ids, 1);
    assert_eq!(report.duplicate_nodes, 1);
    assert_eq!(report.unknown_node_types, 1);
    assert_eq!(report.unknown_edge_types, 1);
    assert_eq!(report.dangling_edges, 1);
    assert_eq!(report.duplicate_edges, 1);
    assert_eq!(report.adjusted_weights, 1);
    assert!(!report.is_clean());
}

#[test]
fn normalize_reads_meta_bag_and_tallies_missing_stats() {
    let snap = snapshot(json!({
        "nodes": [
            {"id": "r1", "label": "file.pdf", "keyword_label": "  Newton's laws ", "type": "resource",
             "meta": {"difficulty": "挑战", "tags": ["force", 3, "motion"], "visibility": "public", "has_embedding": true}},
            {"id": "r2", "label": "slides.ppt", "keyword_label": "   ", "type": "resource",
             "meta": {"difficulty": "impossible", "visibility": "private"}},
            {"id": "c1", "label": "Mechanics", "type": "chapter"}
        ],
        "edges": [
            {"source": "r1", "target": "r2", "edge_type": "related_to"},
            {"source": "c1", "target": "r1", "edge_type": "contains"}
        ]
    }));
    let r1 = snap.get_node("r1").unwrap();
    assert_eq!(r1.display_label(), "Newton's laws");
    assert_eq!(r1.meta.difficulty, Some(Difficulty::Challenge));
    assert_eq!(r1.meta.tags, vec!["force".to_string(), "motion".to_string()]);
    let r2 = snap.get_node("r2").unwrap();
    assert_eq!(r2.display_label(), "slides.ppt");
    assert_eq!(r2.meta.difficulty, None);

    let stats = snap.stats().expect("tallied stats");
    assert_eq!(stats.total_resources, 2);
    assert_eq!(stats.embedded_resources, 1);
    assert_eq!(stats.public_sources, 1);
    assert_eq!(stats.private_sources, 1);
    assert_eq!(stats.chapter_nodes, 1);
    assert_eq!(stats.similarity_edges, 1);
    assert_eq!(snap.find_node_ids_by_tag("motion"), vec!["r1"]);
}

#[test]
fn server_stats_are_kept_with_lenient_timestamp() {
    let snap = snapshot(json!({
        "nodes": [],
        "edges": [],
        "stats": {"total_resources": 42, "generated_at": "not a date"}
    }));
    let stats = snap.stats().unwrap();
    assert_eq!(stats.total_resources, 42);
    assert!(stats.generated_at.is_none());
}

#[test]
fn hiding_resources_leaves_chapters_and_their_links() {
    let snap = chapters_and_resources();
    let mut filters = FilterState::for_snapshot(&snap);
    assert!(filters.set_node_type(NodeType::Resource, false));

    let visible = compute_visible_graph(&snap, &filters);
    assert_eq!(visible.node_count(), 3);
    assert!(visible.nodes().iter().all(|n| n.node_type == NodeType::Chapter));
    assert_eq!(visible.edge_count(), 2);
    assert!(visible.edges().iter().all(|e| e.edge_type == EdgeType::RelatedTo));
    // Input untouched
    assert_eq!(snap.node_count(), 8);
}

#[test]
fn resources_only_drops_every_contains_edge() {
    let snap = chapters_and_resources();
    let mut filters = FilterState::for_snapshot(&snap);
    filters.isolate_node_types(&[NodeType::Resource]);
    let visible = compute_visible_graph(&snap, &filters);
    assert_eq!(visible.node_count(), 5);
    assert_eq!(visible.edge_count(), 0);
    assert_eq!(visible.stats().map(|s| s.total_resources), Some(5));
}

#[test]
fn difficulty_and_format_gates_apply_to_content_nodes_only() {
    let snap = chapters_and_resources();
    let mut filters = FilterState::for_snapshot(&snap);
    assert!(filters.set_difficulty(Difficulty::Advanced, false));
    let visible = compute_visible_graph(&snap, &filters);
    // r2 and r4 are advanced
    assert_eq!(visible.node_count(), 6);
    assert!(!visible.contains("r2") && !visible.contains("r4"));

    assert!(filters.set_format_group("video", false));
    let visible = compute_visible_graph(&snap, &filters);
    assert_eq!(visible.find_node_ids_by_type(NodeType::Resource).len(), 0);
    assert_eq!(visible.find_node_ids_by_type(NodeType::Chapter).len(), 3);

    // Unknown values are not toggleable and default to enabled
    assert!(!filters.set_format_group("hologram", false));
    assert!(filters.format_group_enabled("hologram"));
    assert!(filters.difficulty_enabled(Difficulty::Challenge));
}

#[test]
fn empty_filtered_node_set_yields_no_edges() {
    let snap = chapters_and_resources();
    let mut filters = FilterState::for_snapshot(&snap);
    filters.isolate_node_types(&[]);
    let visible = compute_visible_graph(&snap, &filters);
    assert!(visible.is_empty());
    assert_eq!(visible.edge_count(), 0);

    let empty = compute_visible_graph(&GraphSnapshot::new(), &FilterState::new());
    assert!(empty.is_empty());
}

#[test]
fn filter_sync_keeps_flags_drops_vanished_and_adds_new_values() {
    let mut model = GraphModel::new();
    model.replace_snapshot(chapters_and_resources());
    model.update_filters(|f| f.set_node_type(NodeType::Chapter, false));
    assert_eq!(model.visible().node_count(), 5);
    let generation = model.generation();

    model.replace_snapshot(snapshot(json!({
        "nodes": [
            {"id": "c9", "label": "Waves", "type": "chapter"},
            {"id": "f1", "label": "F = ma", "type": "formula"}
        ],
        "edges": []
    })));
    assert!(model.generation() > generation);
    let filters = model.filters();
    assert_eq!(filters.node_types.get(&NodeType::Chapter), Some(&false));
    assert_eq!(filters.node_types.get(&NodeType::Formula), Some(&true));
    assert!(!filters.node_types.contains_key(&NodeType::Resource));
    assert!(filters.format_groups.is_empty());
    assert_eq!(model.visible().node_count(), 1);
    assert!(model.visible().contains("f1"));
}

fn arb_graph() -> impl Strategy<Value = (GraphSnapshot, FilterState)> {
    let types = ["chapter", "section", "resource", "format", "formula"];
    let edge_types = ["contains", "related_to", "appears_in"];
    (
        prop::collection::vec((0usize..types.len(), 0usize..4), 0..20),
        prop::collection::vec((0usize..25, 0usize..25, 0usize..edge_types.len()), 0..40),
        prop::collection::vec(any::<bool>(), 8),
    )
        .prop_map(move |(nodes, edges, flags)| {
            let nodes: Vec<Value> = nodes
                .iter()
                .enumerate()
                .map(|(i, (t, d))| {
                    let difficulty = ["basic", "advanced", "challenge", "none"][*d];
                    json!({"id": format!("n{i}"), "label": "", "type": types[*t], "meta": {"difficulty": difficulty}})
                })
                .collect();
            let edges: Vec<Value> = edges
                .iter()
                .map(|(s, t, e)| json!({"source": format!("n{s}"), "target": format!("n{t}"), "edge_type": edge_types[*e]}))
                .collect();
            let snap = snapshot(json!({"nodes": nodes, "edges": edges}));
            let mut filters = FilterState::for_snapshot(&snap);
            for (i, t) in NodeType::ALL.iter().enumerate() {
                filters.set_node_type(*t, flags[i % flags.len()]);
            }
            filters.set_edge_type(EdgeType::RelatedTo, flags[5]);
            filters.set_difficulty(Difficulty::Advanced, flags[6]);
            (snap, filters)
        })
}

proptest! {
    #[test]
    fn visible_graph_has_no_dangling_edges((snap, filters) in arb_graph()) {
        let visible = compute_visible_graph(&snap, &filters);
        for e in visible.edges() {
            prop_assert!(visible.contains(&e.source));
            prop_assert!(visible.contains(&e.target));
            prop_assert!(filters.edge_type_enabled(e.edge_type));
        }
        for n in visible.nodes() {
            prop_assert!(filters.node_passes(n));
        }
    }

    #[test]
    fn filtering_is_idempotent((snap, filters) in arb_graph()) {
        let once = compute_visible_graph(&snap, &filters);
        let twice = compute_visible_graph(&once, &filters);
        prop_assert_eq!(once, twice);
    }
}

fn resource_field(resources: usize) -> GraphSnapshot {
    let mut nodes = vec![json!({"id": "c1", "label": "Chapter", "type": "chapter"})];
    for i in 0..resources {
        nodes.push(json!({"id": format!("r{i}"), "label": format!("r{i}"), "type": "resource"}));
    }
    snapshot(json!({"nodes": nodes, "edges": []}))
}

#[test]
fn zoom_buckets_follow_thresholds() {
    let t = LodConfig::default().zoom_thresholds;
    assert_eq!(ZoomBucket::from_zoom(0.3, &t), ZoomBucket::Overview);
    assert_eq!(ZoomBucket::from_zoom(0.6, &t), ZoomBucket::Leaf);
    assert_eq!(ZoomBucket::from_zoom(1.5, &t), ZoomBucket::Structural);
    assert_eq!(ZoomBucket::from_zoom(5.0, &t), ZoomBucket::Detailed);
    assert_eq!(ZoomBucket::from_zoom(f32::NAN, &t), ZoomBucket::Overview);
}

#[test]
fn overview_shows_only_pinned_labels() {
    let snap = resource_field(10);
    let mut labels = LabelScheduler::default();
    let focus = LabelFocus { selected: Some("r3".into()), highlighted: ["r7".to_string()].into_iter().collect() };
    let shown = labels.labels_for_frame(&snap, 1, 0.2, &focus);
    assert_eq!(shown, vec!["r3", "r7"]);
    assert_eq!(labels.labels_used(), 0);
}

#[test]
fn budget_caps_unpinned_labels_but_not_pinned_ones() {
    let snap = resource_field(100);
    let mut labels = LabelScheduler::default();
    let focus = LabelFocus { selected: Some("c1".into()), ..Default::default() };

    // Leaf bucket: resources only, capped at 40
    let shown = labels.labels_for_frame(&snap, 1, 0.8, &focus);
    assert_eq!(labels.bucket(), ZoomBucket::Leaf);
    assert_eq!(shown.len(), 41);
    assert_eq!(shown[0], "c1");
    assert_eq!(labels.labels_used(), 40);

    // Next frame starts with a fresh budget
    let again = labels.labels_for_frame(&snap, 1, 0.9, &focus);
    assert_eq!(again.len(), 41);
}

#[test]
fn detailed_bucket_adds_top_fractile_nodes() {
    let mut nodes = Vec::new();
    for i in 0..3 {
        nodes.push(json!({"id": format!("c{i}"), "label": "", "type": "chapter"}));
    }
    nodes.push(json!({"id": "hard", "label": "", "type": "formula", "meta": {"difficulty": "challenge"}}));
    for i in 0..6 {
        nodes.push(json!({"id": format!("f{i}"), "label": "", "type": "formula"}));
    }
    let snap = snapshot(json!({"nodes": nodes, "edges": []}));
    let config = LodConfig { important_fraction: 0.4, ..LodConfig::default() };
    let mut labels = LabelScheduler::new(config);
    let focus = LabelFocus::default();

    assert_eq!(labels.labels_for_frame(&snap, 1, 1.5, &focus), vec!["c0", "c1", "c2"]);
    assert_eq!(labels.labels_for_frame(&snap, 1, 2.5, &focus), vec!["c0", "c1", "c2", "hard"]);
    assert_eq!(labels.importance_threshold(), Some(9.0));
}

#[test]
fn equal_sizes_do_not_push_the_important_set_past_its_cap() {
    let mut nodes = vec![json!({"id": "ch", "label": "Optics", "type": "chapter"})];
    for i in 0..20 {
        nodes.push(json!({"id": format!("f{i}"), "label": "", "type": "formula"}));
    }
    let snap = snapshot(json!({"nodes": nodes, "edges": []}));
    let mut labels = LabelScheduler::default();

    // ceil(21 * 0.3) = 7: the chapter, then the first six formulas in snapshot order
    let shown = labels.labels_for_frame(&snap, 1, 3.0, &LabelFocus::default());
    assert_eq!(shown, vec!["ch", "f0", "f1", "f2", "f3", "f4", "f5"]);
    assert_eq!(labels.importance_threshold(), Some(6.0));
}

#[test]
fn importance_recomputes_on_scale_or_generation_change() {
    let mut model = GraphModel::new();
    model.replace_snapshot(resource_field(5));
    let mut labels = LabelScheduler::default();
    assert!(labels.sync_visible(model.generation(), model.visible()));
    assert!(!labels.sync_visible(model.generation(), model.visible()));
    let before = labels.importance_threshold().unwrap();

    labels.set_size_scale(Some(2.0));
    assert!(labels.sync_visible(model.generation(), model.visible()));
    assert_eq!(labels.importance_threshold(), Some(before * 2.0));

    // Unusable scale falls back to neutral
    labels.set_size_scale(Some(f32::NAN));
    assert_eq!(labels.size_scale(), 1.0);
    assert!(labels.sync_visible(model.generation(), model.visible()));

    model.update_filters(|f| f.set_node_type(NodeType::Chapter, false));
    assert!(labels.sync_visible(model.generation(), model.visible()));
    assert_eq!(labels.importance_threshold(), Some(6.0));
    model.replace_snapshot(resource_field(6));
    assert!(labels.sync_visible(model.generation(), model.visible()));
}

#[test]
fn disabled_lod_labels_everything() {
    let snap = resource_field(300);
    let mut labels = LabelScheduler::new(LodConfig { lod_enabled: false, ..LodConfig::default() });
    assert_eq!(labels.labels_for_frame(&snap, 1, 0.1, &LabelFocus::default()).len(), 301);
}

#[test]
fn sizing_helpers_handle_edge_inputs() {
    assert_eq!(effective_scale(None), 1.0);
    assert_eq!(effective_scale(Some(-3.0)), 1.0);
    assert_eq!(effective_scale(Some(0.5)), 0.5);
    assert_eq!(top_fraction_len(0, 0.3), 0);
    assert_eq!(top_fraction_len(4, 0.5), 2);
    assert_eq!(top_fraction_len(10, 0.3), 3);
    assert_eq!(top_fraction_len(2, 0.01), 1);
    assert_eq!(top_fraction_len(3, 2.0), 3);
    assert_eq!(top_fraction_len(5, f32::NAN), 0);
}

#[test]
fn render_boundary_downgrades_on_error_and_panic() {
    let mut boundary = RenderBoundary::new(RenderMode::Scene3d);
    let out = boundary.render(|_| -> anyhow::Result<()> { anyhow::bail!("webgl context lost") });
    match out {
        RenderOutcome::Failed { mode, fallback, reason } => {
            assert_eq!(mode, RenderMode::Scene3d);
            assert_eq!(fallback, Some(RenderMode::Flat2d));
            assert!(reason.contains("webgl"));
        }
        RenderOutcome::Rendered { .. } => panic!("expected failure"),
    }
    assert_eq!(boundary.mode(), RenderMode::Flat2d);

    let out = boundary.render(|_| -> anyhow::Result<()> { panic!("layout exploded") });
    assert!(matches!(out, RenderOutcome::Failed { fallback: None, .. }));
    assert_eq!(boundary.mode(), RenderMode::Flat2d);
    assert_eq!(boundary.faults(), 2);

    let out = boundary.render(|mode| Ok(mode));
    assert!(out.is_rendered());
    boundary.reset();
    assert_eq!(boundary.mode(), RenderMode::Scene3d);
}

fn picked(code: &str) -> Classification {
    Classification { picked_volume_code: Some(code.to_string()), ..Default::default() }
}

#[test]
fn lanes_resolve_in_priority_order_with_last_good_fallback() {
    let mut lanes: LaneCoordinator<Classification> = LaneCoordinator::new();
    assert_eq!(lanes.resolve(), Resolved::Nothing);

    let g = lanes.issue(Lane::Global);
    let s = lanes.issue(Lane::Scoped);
    assert_eq!(lanes.notice(), LaneNotice::Pending { operation: "scoped classification" });
    assert_eq!(lanes.settle(g, Ok(picked("global"))), Settlement::Applied);
    assert_eq!(lanes.resolve(), Resolved::Global(&picked("global")));
    assert_eq!(lanes.settle(s, Ok(picked("scoped"))), Settlement::Applied);
    assert_eq!(lanes.resolve(), Resolved::Scoped(&picked("scoped")));

    // A failed scoped retry falls back to the global value
    let s2 = lanes.issue(Lane::Scoped);
    assert_eq!(lanes.settle(s2, Err(anyhow::anyhow!("timeout"))), Settlement::Failed);
    assert_eq!(lanes.resolve(), Resolved::Global(&picked("global")));
    assert!(matches!(lanes.notice(), LaneNotice::SoftFailure { operation: "scoped classification", .. }));

    // Both lanes empty: the last good value still shows
    let g2 = lanes.issue(Lane::Global);
    lanes.settle(g2, Err(anyhow::anyhow!("502")));
    assert_eq!(lanes.resolve(), Resolved::LastGood(&picked("scoped")));
    assert!(!lanes.notice().is_error());
}

#[test]
fn reissue_keeps_the_settled_value_until_it_settles() {
    let mut lanes: LaneCoordinator<Classification> = LaneCoordinator::new();
    let s = lanes.issue(Lane::Scoped);
    lanes.settle(s, Ok(picked("V1")));

    let again = lanes.issue(Lane::Scoped);
    assert!(lanes.lane(Lane::Scoped).is_pending());
    assert_eq!(lanes.resolve(), Resolved::Scoped(&picked("V1")));
    assert_eq!(lanes.settle(again, Ok(picked("V2"))), Settlement::Applied);
    assert_eq!(lanes.resolve(), Resolved::Scoped(&picked("V2")));

    // Explicit invalidation is what drops the value
    lanes.invalidate(Lane::Scoped);
    assert_eq!(lanes.resolve(), Resolved::LastGood(&picked("V2")));
}

#[test]
fn stale_settlement_changes_nothing() {
    let mut lanes: LaneCoordinator<Classification> = LaneCoordinator::new();
    let old = lanes.issue(Lane::Global);
    let new = lanes.issue(Lane::Global);
    assert_eq!(lanes.settle(new, Ok(picked("new"))), Settlement::Applied);
    assert_eq!(lanes.settle(old, Ok(picked("old"))), Settlement::Stale);
    assert_eq!(lanes.settle(old, Err(anyhow::anyhow!("late"))), Settlement::Stale);
    assert_eq!(lanes.resolve(), Resolved::Global(&picked("new")));
    assert_eq!(lanes.last_good(), Some(&picked("new")));
    assert_eq!(lanes.notice(), LaneNotice::Idle);
}

#[test]
fn failure_without_last_good_is_a_hard_error() {
    let mut lanes: LaneCoordinator<Classification> = LaneCoordinator::new();
    let g = lanes.issue(Lane::Global);
    lanes.settle(g, Err(anyhow::anyhow!("connection refused")));
    let notice = lanes.notice();
    assert!(notice.is_error());
    assert!(notice.to_string().contains("connection refused"));

    lanes.reset();
    assert_eq!(lanes.notice(), LaneNotice::Idle);
    assert_eq!(lanes.resolve(), Resolved::Nothing);
}

#[test]
fn settings_roundtrip_and_partial_files() {
    let dir = std::env::temp_dir().join(format!("kg-explorer-test-{}", Uuid::now_v7()));
    let path = dir.join("settings.json");

    let mut settings = ExplorerSettings::default();
    settings.workspace_id = 7;
    settings.lod.bucket_caps = [0, 10, 20, 30];
    settings.render_mode = RenderMode::Flat2d;
    settings.save_to(&path).expect("save");
    let loaded = ExplorerSettings::load_from(&path).expect("load");
    assert_eq!(loaded, settings);

    std::fs::write(&path, r#"{"api_base_url": "https://kb.example.org/", "poll_interval_ms": 5}"#).unwrap();
    let partial = ExplorerSettings::load_from(&path).expect("load partial");
    assert_eq!(partial.api_base_url, "https://kb.example.org/");
    assert_eq!(partial.workspace_id, 1);
    assert_eq!(partial.lod, LodConfig::default());
    assert_eq!(partial.poll_interval().as_millis(), 200);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn graph_query_limit_is_clamped() {
    let mut q = GraphQuery::new(3);
    q.limit = 5;
    assert_eq!(q.clamped_limit(), 40);
    q.limit = 5000;
    assert_eq!(q.clamped_limit(), 800);
}

#[test]
fn bootstrap_wire_shapes_decode() {
    let submission: BootstrapSubmission = serde_json::from_value(json!({
        "workspace": {"id": 4, "name": "physics"},
        "bootstrap_job_id": 19,
        "bootstrap_status": "queued",
        "extract_reason": "new sources",
        "source_count": 12,
        "failed_sources_count": 0
    }))
    .unwrap();
    assert_eq!(submission.status, JobStatus::Queued);
    assert_eq!(submission.handle().map(|h| (h.workspace_id, h.job_id)), Some((4, 19)));

    let skipped: BootstrapSubmission = serde_json::from_value(json!({"workspace": {"id": 4}})).unwrap();
    assert_eq!(skipped.status, JobStatus::Skipped);
    assert!(skipped.handle().is_none());

    let job: BootstrapJob = serde_json::from_value(json!({
        "job_id": 19,
        "workspace_id": 4,
        "status": "partial_failed",
        "succeeded_sources": 10,
        "failed_sources_count": 2,
        "updated_at": "2026-03-01T10:00:00Z"
    }))
    .unwrap();
    assert!(job.status.is_terminal());
    assert_eq!(job.failed_count, 2);
    assert!(job.updated_at.is_some());

    let odd: BootstrapJob =
        serde_json::from_value(json!({"job_id": 1, "status": "processing", "updated_at": "yesterday"})).unwrap();
    assert!(!odd.status.is_terminal());
    assert!(odd.updated_at.is_none());
}
