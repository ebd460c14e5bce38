// kg-explorer: command-line front end for the knowledge-graph explorer core
// Build with: cargo build --features cli --bin kg-explorer

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};

use kg_explorer::api::http::HttpKnowledgeApi;
use kg_explorer::api::{BootstrapRequest, FileRef, SharedApi};
use kg_explorer::graph_utils::filter::FilterState;
use kg_explorer::graph_utils::graph::{Difficulty, EdgeType, NodeType};
use kg_explorer::persistence::settings::ExplorerSettings;
use kg_explorer::session::explorer::ExplorerSession;
use kg_explorer::session::lanes::LaneNotice;
use kg_explorer::session::poller::PollExit;

fn cli() -> Command {
    let hide = |id: &'static str, long: &'static str, help: &'static str| {
        Arg::new(id).long(long).value_name("VALUE").action(ArgAction::Append).global(true).help(help)
    };
    Command::new("kg-explorer")
        .about("Explore a workspace knowledge graph from the terminal")
        .subcommand_required(true)
        .arg(Arg::new("base_url").long("base-url").value_name("URL").global(true).help("Catalogue API base URL"))
        .arg(Arg::new("token").long("token").value_name("TOKEN").global(true).help("Bearer token forwarded to the API"))
        .arg(
            Arg::new("workspace")
                .long("workspace")
                .value_name("ID")
                .value_parser(clap::value_parser!(u64))
                .global(true)
                .help("Workspace id"),
        )
        .arg(hide("hide_type", "hide-type", "Hide a node type (repeatable)"))
        .arg(hide("hide_edge", "hide-edge", "Hide an edge type (repeatable)"))
        .arg(hide("hide_difficulty", "hide-difficulty", "Hide a difficulty (repeatable)"))
        .arg(hide("hide_format", "hide-format", "Hide a format group (repeatable)"))
        .subcommand(Command::new("graph").about("Fetch the graph and print a summary of the visible part"))
        .subcommand(
            Command::new("labels").about("Print the labels drawn for one frame").arg(
                Arg::new("zoom")
                    .long("zoom")
                    .value_parser(clap::value_parser!(f32))
                    .default_value("1.0")
                    .help("Zoom magnitude"),
            ),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify a file into the chapter catalogue")
                .arg(Arg::new("file").required(true).value_name("FILE"))
                .arg(Arg::new("group").long("group").value_name("KEY").help("Volume code to narrow the candidates")),
        )
        .subcommand(
            Command::new("search")
                .about("Semantic search over the workspace")
                .arg(Arg::new("query").required(true).value_name("QUERY")),
        )
        .subcommand(
            Command::new("bootstrap").about("Build the workspace graph and wait for it").arg(
                Arg::new("force").long("force").action(ArgAction::SetTrue).help("Re-extract sources already processed"),
            ),
        )
}

fn load_settings(matches: &ArgMatches) -> ExplorerSettings {
    let mut settings = ExplorerSettings::load().unwrap_or_else(|e| {
        log::warn!("using default settings: {:#}", e);
        ExplorerSettings::default()
    });
    if let Some(url) = matches.get_one::<String>("base_url") {
        settings.api_base_url = url.clone();
    }
    if let Some(token) = matches.get_one::<String>("token") {
        settings.api_token = Some(token.clone());
    }
    if let Some(ws) = matches.get_one::<u64>("workspace") {
        settings.workspace_id = *ws;
    }
    settings
}

fn values<'a>(matches: &'a ArgMatches, id: &str) -> impl Iterator<Item = &'a String> + 'a {
    matches.get_many::<String>(id).into_iter().flatten()
}

fn apply_hidden(matches: &ArgMatches, filters: &mut FilterState) -> anyhow::Result<()> {
    for raw in values(matches, "hide_type") {
        let Some(t) = NodeType::parse(raw) else { bail!("unknown node type '{}'", raw) };
        filters.set_node_type(t, false);
    }
    for raw in values(matches, "hide_edge") {
        let Some(t) = EdgeType::parse(raw) else { bail!("unknown edge type '{}'", raw) };
        filters.set_edge_type(t, false);
    }
    for raw in values(matches, "hide_difficulty") {
        let Some(d) = Difficulty::parse(raw) else { bail!("unknown difficulty '{}'", raw) };
        filters.set_difficulty(d, false);
    }
    for raw in values(matches, "hide_format") {
        if !filters.set_format_group(raw, false) {
            log::info!("format group '{}' not present in this graph", raw);
        }
    }
    Ok(())
}

async fn load_graph(session: &mut ExplorerSession, matches: &ArgMatches) -> anyhow::Result<()> {
    session.refresh_graph().await?;
    session.update_filters(|f| apply_hidden(matches, f))
}

fn print_graph(session: &ExplorerSession) {
    let model = session.model();
    let visible = model.visible();
    println!(
        "nodes: {} of {} visible, edges: {} of {} visible",
        visible.node_count(),
        model.snapshot().node_count(),
        visible.edge_count(),
        model.snapshot().edge_count()
    );
    for t in NodeType::ALL {
        let n = visible.find_node_ids_by_type(t).len();
        if n > 0 {
            println!("  {:<16} {}", t, n);
        }
    }
    if let Some(stats) = model.snapshot().stats() {
        println!(
            "resources: {} ({} embedded), public sources: {}, private sources: {}, similarity edges: {}",
            stats.total_resources,
            stats.embedded_resources,
            stats.public_sources,
            stats.private_sources,
            stats.similarity_edges
        );
    }
}

fn print_notice(notice: &LaneNotice) {
    match notice {
        LaneNotice::Idle => {}
        n if n.is_error() => eprintln!("error: {}", n),
        n => eprintln!("note: {}", n),
    }
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let settings = load_settings(&matches);
    let api: SharedApi = Arc::new(HttpKnowledgeApi::from_settings(&settings)?);
    let mut session = ExplorerSession::new(api, &settings);

    match matches.subcommand() {
        Some(("graph", _)) => {
            load_graph(&mut session, &matches).await?;
            print_graph(&session);
        }
        Some(("labels", sub)) => {
            let zoom = sub.get_one::<f32>("zoom").copied().unwrap_or(1.0);
            load_graph(&mut session, &matches).await?;
            let ids = session.frame_labels(zoom);
            println!("zoom {} ({:?}): {} labels", zoom, session.labels().bucket(), ids.len());
            for id in &ids {
                if let Some(node) = session.visible().get_node(id) {
                    println!("  [{}] {}", node.node_type, node.display_label());
                }
            }
        }
        Some(("classify", sub)) => {
            let Some(path) = sub.get_one::<String>("file") else { bail!("missing FILE") };
            let content = tokio::fs::read(path).await.with_context(|| format!("read {}", path))?;
            let name = Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.clone());
            let classification = session.classification_mut();
            classification.select_group(sub.get_one::<String>("group").cloned());
            for task in classification.select_file(FileRef::with_content(name, content)) {
                task.await.context("classification task")?;
            }
            print_notice(&classification.notice());
            match classification.resolved() {
                Some(c) => {
                    println!("confidence {:.2} ({:?}){}", c.confidence, c.confidence_level, if c.is_low_confidence { ", low" } else { "" });
                    if let Some(top) = c.top_candidate() {
                        println!("best match: {} [{}]", top.title, top.volume_code);
                    }
                    for cand in &c.candidates {
                        println!("  {:>6.3}  {} [{}] #{}", cand.probability, cand.title, cand.volume_code, cand.chapter_id);
                    }
                }
                None => bail!("no classification result"),
            }
        }
        Some(("search", sub)) => {
            let Some(query) = sub.get_one::<String>("query") else { bail!("missing QUERY") };
            if let Some(task) = session.search().submit(query) {
                task.await.context("search task")?;
            }
            print_notice(&session.search().notice());
            if let Some(resp) = session.search().results() {
                if let Some(answer) = resp.answer.as_deref().filter(|a| !a.is_empty()) {
                    println!("{}", answer);
                }
                for hit in &resp.results {
                    let title = hit.target.as_ref().map(|t| t.title.as_str()).unwrap_or("?");
                    println!("  {:>6.3}  {}", hit.score, title);
                }
            }
        }
        Some(("bootstrap", sub)) => {
            let request = BootstrapRequest {
                stage: settings.stage.clone(),
                subject: settings.subject.clone(),
                force_extract: sub.get_flag("force"),
            };
            let (submission, task) = session.start_bootstrap(&request).await?;
            println!("submitted: job {:?}, status {}", submission.job_id, submission.status);
            if task.await.context("poller task")? == PollExit::Cancelled {
                bail!("polling was cancelled");
            }
            if let Some(event) = session.next_job_event().await {
                if let Some(message) = session.handle_job_event(event).await? {
                    println!("{}", message);
                }
                print_graph(&session);
            }
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let matches = cli().get_matches();
    if let Err(e) = run(matches).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
