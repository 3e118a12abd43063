//! TaskTree CLI - project a workflow execution into a task tree.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tasktree_core::{ExecutionRef, TaskGroup};
use tasktree_projector::{
    DirectoryEventSource, EventSource, HttpEventSource, ProjectorConfig, TaskTreeBuilder,
    TransformRegistry,
};

/// TaskTree CLI - Execution history projection tool
#[derive(Parser)]
#[command(name = "tasktree")]
#[command(about = "Project workflow execution histories into task trees", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory of exported histories (<dir>/<execution_id>/<run_id>.json)
    #[arg(short, long, global = true, conflicts_with = "url")]
    dir: Option<PathBuf>,

    /// Base URL of the history service
    #[arg(short, long, global = true)]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the task tree of an execution run
    Show {
        /// Execution to project, as <execution_id>/<run_id>
        execution: ExecutionRef,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,

        /// Seconds allowed for fetching each history (0 disables the limit)
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Maximum child execution nesting
        #[arg(long, default_value_t = 16)]
        max_depth: usize,
    },

    /// List the event types the projector handles
    #[command(name = "event-types")]
    EventTypes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasktree=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let registry = Arc::new(TransformRegistry::standard());

    match cli.command {
        Commands::Show {
            execution,
            json,
            timeout_secs,
            max_depth,
        } => {
            let source = open_source(&cli.source)?;
            let fetch_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
            let config = ProjectorConfig::default()
                .with_fetch_timeout(fetch_timeout)
                .with_max_depth(max_depth);
            let builder = TaskTreeBuilder::new(source, registry).with_config(config);

            show(&builder, &execution, json).await?;
        }
        Commands::EventTypes => {
            for event_type in registry.event_types() {
                println!("{event_type}");
            }
        }
    }

    Ok(())
}

fn open_source(args: &SourceArgs) -> Result<Arc<dyn EventSource>, Box<dyn std::error::Error>> {
    match (&args.dir, &args.url) {
        (Some(dir), _) => {
            debug!(dir = %dir.display(), "Using directory source");
            Ok(Arc::new(DirectoryEventSource::new(dir)))
        }
        (None, Some(url)) => {
            debug!(url = %url, "Using HTTP source");
            Ok(Arc::new(HttpEventSource::new(url)))
        }
        (None, None) => Err("one of --dir or --url is required".into()),
    }
}

async fn show(
    builder: &TaskTreeBuilder,
    execution: &ExecutionRef,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling projection");
            on_interrupt.cancel();
        }
    });

    let group = builder.transform_with_cancel(execution, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&group)?);
    } else {
        print_group(&group);
    }

    Ok(())
}

fn print_group(group: &TaskGroup) {
    println!("Execution: {}", group.execution());
    println!("Status:    {}", group.status);
    println!("Tasks ({}):", group.total_tasks());

    for (depth, task) in group.walk() {
        let indent = "  ".repeat(depth + 1);
        println!(
            "{indent}[{:<2}] {} (#{})",
            task.status.short_code(),
            task.name,
            task.id
        );
    }
}
