mod advisor;
mod config;
mod courses;
mod gemini;
mod ingest;
mod search;
mod store;
mod web;

pub const USER_AGENT: &str = concat!("course-pilot/", env!("CARGO_PKG_VERSION"));

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::RwLock;
use tracing::{info, warn};

use config::Settings;
use courses::{JsonFileSource, SampleCourses};
use gemini::{GeminiClient, GeminiEmbedder, Prompt, TextGenerator};
use search::{ReviewSearcher, TavilyClient};
use store::VectorStore;
use web::AppState;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "course-pilot", version, about = "Course advisor: parse schedules, research professors, recommend courses")]
struct Cli {
    /// Vector index directory (overrides COURSE_PILOT_INDEX_DIR)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the browser UI
    Serve {
        #[arg(long, default_value = "127.0.0.1:8501")]
        addr: SocketAddr,
    },
    /// Load courses, enrich them with professor reviews and index them
    Ingest {
        /// JSON array of course objects
        #[arg(long, default_value = "data/courses.json")]
        file: PathBuf,
        /// Ingest the built-in sample courses instead of a file
        #[arg(long)]
        sample: bool,
    },
    /// Semantic search over the ingested catalog
    Query {
        text: String,
        #[arg(short, default_value_t = 5)]
        k: usize,
    },
    /// List Gemini models that support content generation
    Models,
    /// Send a one-line prompt to check the Gemini key and model
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("course_pilot=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(dir) = cli.index_dir {
        settings.index_dir = dir;
    }

    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()?;

    match cli.command {
        Command::Serve { addr } => serve(http, &settings, addr).await?,
        Command::Ingest { file, sample } => ingest(http, &settings, file, sample).await?,
        Command::Query { text, k } => query(http, &settings, &text, k).await?,
        Command::Models => {
            let client = GeminiClient::from_settings(http, &settings.gemini).await?;
            for model in client.list_generation_models().await? {
                match model.display_name {
                    Some(display) => println!("{}\t{display}", model.name),
                    None => println!("{}", model.name),
                }
            }
        }
        Command::Ping => {
            let client = GeminiClient::from_settings(http, &settings.gemini).await?;
            let reply = client.generate(&Prompt::text("Hello, are you online?")).await?;
            println!("{}: {}", client.model(), reply.trim());
        }
    }
    Ok(())
}

async fn serve(
    http: reqwest::Client,
    settings: &Settings,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = AppState::default();

    match GeminiClient::from_settings(http.clone(), &settings.gemini).await {
        Ok(client) => {
            let embedder = GeminiEmbedder::new(client.clone(), settings.gemini.embedding_model.clone());
            match VectorStore::open(&settings.index_dir, embedder).await {
                Ok(index) => {
                    let count = index.len().await?;
                    info!(dir = %settings.index_dir.display(), count, "catalog loaded");
                    state.catalog = Some(RwLock::new(index));
                }
                Err(e) => warn!(error = %e, "catalog disabled: could not open index"),
            }
            state.model = Some(client);
        }
        Err(e) => {
            warn!(error = %e, "generation disabled");
            state.warnings.push(web::MODEL_UNAVAILABLE.to_string());
        }
    }

    match TavilyClient::from_settings(http, settings) {
        Ok(client) => state.searcher = Some(ReviewSearcher::new(client)),
        Err(e) => {
            warn!(error = %e, "review search disabled");
            state.warnings.push(web::SEARCH_UNAVAILABLE.to_string());
        }
    }

    web::serve(addr, state).await?;
    Ok(())
}

async fn ingest(
    http: reqwest::Client,
    settings: &Settings,
    file: PathBuf,
    sample: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = GeminiClient::from_settings(http.clone(), &settings.gemini).await?;
    let searcher = match TavilyClient::from_settings(http, settings) {
        Ok(client) => Some(ReviewSearcher::new(client)),
        Err(e) => {
            warn!(error = %e, "ingesting without review enrichment");
            None
        }
    };
    let embedder = GeminiEmbedder::new(model.clone(), settings.gemini.embedding_model.clone());
    let mut store = VectorStore::open(&settings.index_dir, embedder).await?;

    let report = if sample {
        ingest::run(&SampleCourses, searcher.as_ref(), Some(&model), &mut store).await?
    } else {
        let source = JsonFileSource::new(file);
        ingest::run(&source, searcher.as_ref(), Some(&model), &mut store).await?
    };
    println!(
        "loaded {}, enriched {}, stored {} (index: {})",
        report.loaded,
        report.enriched,
        report.stored,
        settings.index_dir.display()
    );
    Ok(())
}

async fn query(
    http: reqwest::Client,
    settings: &Settings,
    text: &str,
    k: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = GeminiClient::from_settings(http, &settings.gemini).await?;
    let embedder = GeminiEmbedder::new(model, settings.gemini.embedding_model.clone());
    let store = VectorStore::open(&settings.index_dir, embedder).await?;
    if store.is_empty().await? {
        warn!(dir = %settings.index_dir.display(), "index is empty; run `course-pilot ingest` first");
    }

    for hit in store.query(text, k).await? {
        let field = |key: &str| hit.metadata.get(key).and_then(|v| v.as_str()).unwrap_or("?");
        println!(
            "{}\t{}\t{}\t(distance {:.3})",
            hit.id,
            field("name"),
            field("instructor"),
            hit.distance
        );
    }
    Ok(())
}
