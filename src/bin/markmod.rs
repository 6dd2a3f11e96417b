//! markmod CLI - turn markup files into modules and serve live updates
//!
//! Project-level settings (`pre`, `post`, `minify`, `live`, `remedy`) come from
//! the `markmod.yaml` at the project root. Per-file settings come from the
//! nearest manifest above each file.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use markmod::config::MANIFEST_NAME;
use markmod::live::LiveConfig;
use markmod::{
    apply_plugin, create_handler, transform, ConfigPatch, EmitOptions, FileConfig, LiveServer,
    NatsChannel, PipelineError, Remedy, Session, TransformOutput, WatchList,
};

#[derive(Parser)]
#[command(name = "markmod")]
#[command(version, about = "Markup to module build pipeline", long_about = None)]
struct Cli {
    /// Project root; file identities are relative to it
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated module for a file (or the file itself if not handled)
    Transform {
        file: PathBuf,

        /// Minify the processed source
        #[arg(short, long)]
        minify: bool,

        /// Emit the live update subscription
        #[arg(short, long)]
        live: bool,
    },

    /// Run a file through the pipeline and print the processed source
    Process {
        file: PathBuf,

        /// Minify the processed source
        #[arg(short, long)]
        minify: bool,
    },

    /// Re-process files named on stdin (one path per line) and broadcast them
    Live {
        /// NATS server url (default: NATS_URL, manifest `live`, nats://localhost:4222)
        #[arg(short, long)]
        url: Option<String>,

        /// Channel namespace (default: MARKMOD_NAMESPACE or "markmod")
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform { file, minify, live } => run_transform(cli.root, file, minify, live).await,
        Commands::Process { file, minify } => run_process(cli.root, file, minify).await,
        Commands::Live { url, namespace } => run_live(cli.root, url, namespace).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Create the session and apply the project manifest, if there is one.
async fn open_project(root: PathBuf, minify: bool) -> Result<(Session, FileConfig), PipelineError> {
    let session = Session::new(root);
    let manifest = session.root().join(MANIFEST_NAME);

    let project = if tokio::fs::try_exists(&manifest).await? {
        let config = FileConfig::load(&manifest).await?;
        apply_plugin(&session, &config).await?;
        tracing::debug!("Applied project manifest {}", manifest.display());
        config
    } else {
        FileConfig::default()
    };

    if minify {
        session.set_config(ConfigPatch::minify(true)).await;
    }
    Ok((session, project))
}

async fn read_source(session: &Session, file: &Path) -> Result<String, PipelineError> {
    let path = markmod::identity::absolutize(session.root(), file);
    tokio::fs::read_to_string(&path).await.map_err(|e| {
        PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
    })
}

async fn run_transform(root: PathBuf, file: PathBuf, minify: bool, live: bool) -> Result<(), PipelineError> {
    let (session, project) = open_project(root, minify).await?;
    if live || project.live.is_some() {
        session.enable_live().await;
    }

    let code = read_source(&session, &file).await?;
    let options = EmitOptions::default();

    let output = if project.remedy {
        Remedy::new(project)?.apply(&session, &file, code, &options).await?
    } else {
        transform(&session, &file, code, None, &options).await?
    };

    if let TransformOutput::PassThrough(_) = output {
        tracing::info!("{} is not handled, printing it unchanged", file.display());
    }
    println!("{}", output.into_code());
    Ok(())
}

async fn run_process(root: PathBuf, file: PathBuf, minify: bool) -> Result<(), PipelineError> {
    let (session, _project) = open_project(root, minify).await?;

    let handler = create_handler(&session, &file, None).await?.ok_or_else(|| {
        PipelineError::Config(format!("{} is not handled by any configuration", file.display()))
    })?;

    let code = read_source(&session, &file).await?;
    let result = handler.run(code).await?;
    println!("{}", result.src);
    Ok(())
}

async fn run_live(root: PathBuf, url: Option<String>, namespace: Option<String>) -> Result<(), PipelineError> {
    let (session, project) = open_project(root, false).await?;

    let mut config = LiveConfig::default();
    if std::env::var("NATS_URL").is_err() {
        if let Some(live) = project.live {
            config.url = live;
        }
    }
    if let Some(url) = url {
        config.url = url;
    }
    if let Some(namespace) = namespace {
        config.namespace = namespace;
    }

    let channel = NatsChannel::connect(config).await?;
    let watcher = Arc::new(WatchList::new());
    let server = LiveServer::attach(&session, Arc::new(channel), watcher).await?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(PathBuf::from(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    tracing::info!("Waiting for changed paths on stdin");
    server.run(rx).await;
    Ok(())
}
