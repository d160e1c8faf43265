mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use config::AppConfig;
use waypoint_engine::{
    HeadlessSurface, HttpRequestConfig, LogLevel, LogSink, NodeConfig, NodeEditor, NodeExecutor,
    NodeType, NullEventSink, OrchestrationId, OrchestrationRunner, Position, ReqwestHttpClient,
    Workspace,
};
use waypoint_storage::Database;

#[derive(Parser)]
#[command(name = "waypoint", version, about = "Build and run API test workflows")]
struct Cli {
    /// Directory holding config.json and, by default, the database
    #[arg(short, long, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects, orchestrations and their graphs
    List,
    /// Write the current configuration to config.json
    Config,
    /// Add a sample orchestration: Start, GET, Set Variable, Log
    Seed {
        /// URL the sample GET node requests
        #[arg(long, default_value = "https://httpbin.org/get")]
        url: String,
    },
    /// Add a node to an orchestration
    AddNode {
        orchestration: OrchestrationId,
        /// Type tag, e.g. HTTP_GET or LOG
        node_type: String,
        #[arg(long, default_value_t = 0.0)]
        x: f32,
        #[arg(long, default_value_t = 0.0)]
        y: f32,
        /// Escaped field payload, `|`-separated
        #[arg(long)]
        data: Option<String>,
    },
    /// Connect an output pin to an input pin
    Link {
        orchestration: OrchestrationId,
        start_attr: i32,
        end_attr: i32,
    },
    /// Delete a node and every link touching it
    DeleteNode {
        orchestration: OrchestrationId,
        node: i32,
    },
    /// Execute an orchestration from its Start node
    Run { orchestration: OrchestrationId },
    /// Execute a single node on its own
    RunNode {
        orchestration: OrchestrationId,
        node: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_dir)
        .await
        .context("failed to load configuration")?;

    let db_path = config.database_path_in(&cli.config_dir);
    let mut db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {:?}", db_path))?;
    let log_sink = Arc::new(LogSink::with_limits(
        config.log.max_lines,
        config.log.prune_batch,
    ));

    match cli.command {
        Commands::List => {
            let workspace = db.load_or_bootstrap(log_sink);
            print_workspace(&workspace);
        }
        Commands::Config => {
            config.save(&cli.config_dir).await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Seed { url } => {
            let mut workspace = db.load_or_bootstrap(log_sink);
            let orchestration_id = seed(&mut workspace, &url)?;
            db.save_workspace(&mut workspace)?;
            println!("Created orchestration {}", orchestration_id);
        }
        Commands::AddNode {
            orchestration,
            node_type,
            x,
            y,
            data,
        } => {
            let mut workspace = db.load_or_bootstrap(log_sink);
            ensure_orchestration(&workspace, orchestration)?;
            let editor = workspace.editor_mut();
            let id = editor.create_node_from_tag(orchestration, &node_type, Position::new(x, y))?;
            if let (Some(data), Some(node)) = (data, editor.node_mut(orchestration, id)) {
                node.deserialize_data(&data);
            }
            db.save_workspace(&mut workspace)?;
            println!("Created node {} with pins {:?}", id, pins_of(&workspace, orchestration, id));
        }
        Commands::Link {
            orchestration,
            start_attr,
            end_attr,
        } => {
            let mut workspace = db.load_or_bootstrap(log_sink);
            ensure_orchestration(&workspace, orchestration)?;
            let id = workspace
                .editor_mut()
                .create_link(orchestration, start_attr, end_attr);
            db.save_workspace(&mut workspace)?;
            println!("Created link {}", id);
        }
        Commands::DeleteNode { orchestration, node } => {
            let mut workspace = db.load_or_bootstrap(log_sink);
            if workspace.editor_mut().delete_node(orchestration, node).is_none() {
                bail!("node {} not found in orchestration {}", node, orchestration);
            }
            db.save_workspace(&mut workspace)?;
            println!("Deleted node {}", node);
        }
        Commands::Run { orchestration } => {
            let mut workspace = db.load_or_bootstrap(log_sink);
            let runner = OrchestrationRunner::new(executor(&config)?);
            let run = workspace
                .execute(orchestration, &runner, &NullEventSink)
                .await?;

            print_log(run.context.log_lines());
            println!(
                "Run {} {:?}: {} nodes in {}ms ({:?})",
                run.report.execution_id,
                run.report.state,
                run.report.executed.len(),
                run.report.execution_time_ms,
                run.report.termination
            );
            if !run.report.success() {
                bail!("orchestration {} failed", orchestration);
            }
        }
        Commands::RunNode { orchestration, node } => {
            let rows = db.load_rows().context("failed to load workspace")?;
            let mut surface = HeadlessSurface::new();
            surface.select_nodes([node]);
            let mut workspace = Workspace::from_rows_with_editor(
                &rows,
                NodeEditor::new(Box::new(surface)),
                log_sink,
            );

            let run = workspace
                .execute_selected(orchestration, &executor(&config)?)
                .await?;
            match run {
                Some(run) => {
                    print_log(run.context.log_lines());
                    if !run.success {
                        bail!("node {} failed", run.node_id);
                    }
                }
                None => bail!("no node selected"),
            }
        }
    }

    Ok(())
}

fn executor(config: &AppConfig) -> anyhow::Result<NodeExecutor> {
    let client = ReqwestHttpClient::with_user_agent(&config.http.user_agent)?;
    Ok(NodeExecutor::new(Arc::new(client)))
}

fn ensure_orchestration(workspace: &Workspace, id: OrchestrationId) -> anyhow::Result<()> {
    if !workspace.projects().contains_orchestration(id) {
        bail!("orchestration {} does not exist", id);
    }
    Ok(())
}

fn pins_of(workspace: &Workspace, orchestration: OrchestrationId, id: i32) -> Vec<(i32, &'static str)> {
    workspace
        .editor()
        .get(orchestration)
        .and_then(|data| data.node(id))
        .map(|node| {
            node.attribute_ids()
                .into_iter()
                .zip(node.node_type().pins().iter().map(|p| p.name))
                .collect()
        })
        .unwrap_or_default()
}

/// Add the sample workflow to the first project
fn seed(workspace: &mut Workspace, url: &str) -> anyhow::Result<OrchestrationId> {
    let project_id = match workspace.projects().projects().first() {
        Some(project) => project.id,
        None => workspace.projects_mut().add_project("Default Project"),
    };
    let orchestration = workspace
        .projects_mut()
        .add_orchestration(project_id, "Sample Orchestration")?;

    let editor = workspace.editor_mut();
    let start = editor.create_node(orchestration, NodeType::Start, Position::new(50.0, 100.0));
    let get = editor.create_node(orchestration, NodeType::HttpGet, Position::new(250.0, 100.0));
    let set = editor.create_node(orchestration, NodeType::SetVariable, Position::new(500.0, 100.0));
    let log = editor.create_node(orchestration, NodeType::Log, Position::new(750.0, 100.0));

    let configs = [
        (
            get,
            NodeConfig::HttpGet(HttpRequestConfig {
                url: url.to_string(),
                headers: "Accept: application/json".to_string(),
                body: String::new(),
            }),
        ),
        (
            set,
            NodeConfig::SetVariable {
                var_name: "response".to_string(),
            },
        ),
        (
            log,
            NodeConfig::Log {
                message: "Sample workflow finished".to_string(),
            },
        ),
    ];
    for (id, config) in configs {
        if let Some(node) = editor.node_mut(orchestration, id) {
            *node.config_mut() = config;
        }
    }

    let chain = [start, get, set, log];
    for pair in chain.windows(2) {
        let from = editor
            .get(orchestration)
            .and_then(|data| data.node(pair[0]))
            .and_then(|node| node.next_attribute());
        if let Some(from) = from {
            editor.create_link(orchestration, from, pair[1] + 1);
        }
    }

    Ok(orchestration)
}

fn print_workspace(workspace: &Workspace) {
    for project in workspace.projects().projects() {
        println!("Project {}: {}", project.id, project.name);
        for orchestration in project.orchestrations() {
            let (nodes, links) = workspace
                .editor()
                .get(orchestration.id)
                .map(|data| (data.nodes().len(), data.links().len()))
                .unwrap_or((0, 0));
            println!(
                "  Orchestration {}: {} ({} nodes, {} links)",
                orchestration.id, orchestration.name, nodes, links
            );
            if let Some(data) = workspace.editor().get(orchestration.id) {
                for node in data.nodes() {
                    println!(
                        "    [{}] {} at ({:.0}, {:.0}) {}",
                        node.id(),
                        node.type_tag(),
                        node.position().x,
                        node.position().y,
                        node.serialize_data()
                    );
                }
                for link in data.links() {
                    println!("    link {}: {} -> {}", link.id, link.start_attr, link.end_attr);
                }
            }
        }
    }
}

fn print_log<'a>(lines: impl Iterator<Item = &'a str>) {
    for line in lines {
        match LogLevel::classify(line) {
            LogLevel::Error | LogLevel::Warning => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}
