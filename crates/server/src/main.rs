//! Validator Server
//!
//! CLI and axum server for product idea validation. `run` validates one idea
//! in the terminal; `serve` exposes the same coordinator over HTTP with an
//! SSE event feed.

mod api;

use axum::Router;
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc, RwLock},
};

use validator_core::sources::ResearchPlan;
use validator_core::swarm::{Coordinator, Event, EventKind, InvocationContext};
use validator_core::ValidatorConfig;

use api::validation::{initial_status, ValidationStatus};

/// Application state
pub struct AppState {
    status: RwLock<ValidationStatus>,
    event_tx: broadcast::Sender<Event>,
    /// Context of the last paused run, taken on resume
    paused: RwLock<Option<InvocationContext>>,
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "Validator - multi-source product idea validation")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the validator server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Validate one idea in the terminal (no server)
    Run {
        /// The product idea to validate
        #[arg(long)]
        idea: String,
        /// Source to query; repeat for several, all when omitted
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Search keyword; repeat for several
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        /// Make a source fail with a transport error; repeat for several
        #[arg(long = "fail")]
        fail: Vec<String>,
        /// What the sources should look for
        #[arg(long)]
        focus: Option<String>,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "validator_core=info,validator_server=info".into()),
        )
        .init();
}

fn print_event(event: &Event) {
    let marker = match event.kind {
        EventKind::Progress => "…",
        EventKind::Output => "✓",
        EventKind::Skipped => "-",
        EventKind::AgentState => return,
        EventKind::InputRequired => "?",
    };
    let scope = event.branch.as_deref().unwrap_or(&event.author);
    println!(
        "{} [{}] {}",
        marker,
        scope,
        event.content.as_deref().unwrap_or_default()
    );
}

async fn run_cli(
    idea: String,
    sources: Vec<String>,
    keywords: Vec<String>,
    fail: Vec<String>,
    focus: Option<String>,
) -> anyhow::Result<()> {
    let mut config = ValidatorConfig::load().await?;
    config.failing_sources.extend(fail);

    let mut plan = ResearchPlan::new(idea).with_keywords(keywords);
    if !sources.is_empty() {
        plan = plan.with_sources(sources);
    }
    if let Some(focus) = focus {
        plan = plan.with_focus(focus);
    }

    println!("🔎 Validating: {}", plan.product_idea);

    let (tx, mut rx) = mpsc::channel::<Event>(100);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let mut coordinator = Coordinator::new(config).with_event_channel(tx);
    let outcome = coordinator.run(plan).await;
    drop(coordinator);
    let _ = printer.await;

    let result = outcome?;
    if result.paused {
        println!("⏸  Paused awaiting input; use the server to resume");
        return Ok(());
    }

    println!(
        "✅ {} of {} sources reported",
        result.reported_sources.len(),
        result.reported_sources.len() + result.missing_sources.len()
    );
    if !result.missing_sources.is_empty() {
        println!("   Missing: {}", result.missing_sources.join(", "));
    }
    match (&result.report_path, &result.report) {
        (Some(path), _) => println!("📄 Report saved to {}", path.display()),
        (None, Some(report)) => println!("\n{}", report),
        (None, None) => {}
    }
    Ok(())
}

pub async fn run_server(port: u16) -> anyhow::Result<()> {
    let (event_tx, _) = broadcast::channel::<Event>(256);

    let state: SharedState = Arc::new(AppState {
        status: RwLock::new(initial_status()),
        event_tx,
        paused: RwLock::new(None),
    });

    let app = Router::new()
        .nest("/api/v1", api::api_routes())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(%addr, "Validator server listening");
    println!("🚀 Validator Server running at http://{}", addr);
    println!("   Validation: /api/v1/validation/status, /start, /resume, /events");
    println!("   Sources:    /api/v1/sources");
    println!("   Reports:    /api/v1/reports");
    println!("   Config:     /api/v1/config (GET, PATCH)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Run {
            idea,
            sources,
            keywords,
            fail,
            focus,
        }) => run_cli(idea, sources, keywords, fail, focus).await,
        Some(CliCommand::Serve { port }) => run_server(port).await,
        None => run_server(8080).await,
    }
}
