use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use medwiki_core::{AppConfig, ExitCode, GraphSchema, MedwikiError, load_term_feed, save_term_feed};
use medwiki_science::enrichment::FeedReport;
use medwiki_science::formats::{QuickStatementsWriter, TableWriter};
use medwiki_science::sources::europepmc::EuropePmcClient;
use medwiki_science::sources::mesh::MeshLabelClient;
use medwiki_science::sources::wikidata::WikidataClient;
use medwiki_science::{
    BatchResolver, BulkLicenseList, EnrichmentPipeline, EutilsClient, FeedGenerator,
    LicenseReconciler, PipelineSettings, ScienceError,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "medwiki",
    about = "Enrich Wikidata from PubMed: licenses, subjects, retractions",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.config/medwiki/config.toml.
    /// Also settable with MEDWIKI_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the run summary as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every term of a feed and write the report and statement files.
    Run {
        /// JSON array of MeSH terms.
        #[arg(long)]
        feed: PathBuf,
        /// NCBI E-utilities key; falls back to the configured env var.
        #[arg(long)]
        ncbi_api_key: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Download the PMC open-access license list.
    FetchLicenses,

    /// Build a term feed from the medical specialties in Wikidata.
    GenerateFeed {
        #[arg(long, default_value = "generated_feed.json")]
        output: PathBuf,
    },

    /// Print the effective configuration.
    Config,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medwiki=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    };
    std::process::exit(code as i32);
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            feed,
            ncbi_api_key,
            output_dir,
        } => {
            let mut config = config;
            if let Some(dir) = output_dir {
                config.set_output_dir(dir);
            }
            run_feed(&config, &feed, ncbi_api_key.as_deref(), cli.json).await
        }

        Commands::FetchLicenses => {
            let bytes = BulkLicenseList::download(&config.licenses).await?;
            println!("Downloaded {bytes} bytes to {}", config.license_list_path().display());
            Ok(ExitCode::Success)
        }

        Commands::GenerateFeed { output } => {
            let schema = Arc::new(load_schema(&config)?);
            let generator = FeedGenerator::new(
                Arc::new(WikidataClient::new(&config.wikidata)?),
                Arc::new(MeshLabelClient::new(&config.wikidata)?),
                schema,
            );
            let terms = generator.generate().await?;
            save_term_feed(&output, &terms)?;
            println!("Wrote {} terms to {}", terms.len(), output.display());
            Ok(ExitCode::Success)
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::Success)
        }
    }
}

// ─── Run ─────────────────────────────────────────────────────────────────────

async fn run_feed(
    config: &AppConfig,
    feed: &Path,
    api_key: Option<&str>,
    json_output: bool,
) -> Result<ExitCode> {
    // Everything that can be checked locally is checked before the first request.
    let terms = load_term_feed(feed)?;
    let api_key = config.resolve_api_key(api_key)?;
    let schema = Arc::new(load_schema(config)?);
    if terms.is_empty() {
        warn!(feed = %feed.display(), "term feed is empty");
    }

    let bulk = BulkLicenseList::load_or_download(&config.licenses)
        .await
        .with_context(|| format!("license list {}", config.license_list_path().display()))?;
    if bulk.is_empty() {
        warn!("license list has no entries; only detail lookups can license records");
    }

    let index = Arc::new(EutilsClient::new(api_key, &config.eutils)?);
    let graph = Arc::new(WikidataClient::new(&config.wikidata)?);
    let resolver = BatchResolver::new(graph, schema.clone(), config.wikidata.max_values_per_query);
    let settings = PipelineSettings {
        batch_size: config.eutils.batch_size,
        fetch_delay: config.fetch_delay(),
    };
    let mut pipeline = EnrichmentPipeline::new(
        index,
        resolver,
        LicenseReconciler::new(schema.clone()),
        Arc::new(bulk),
        settings,
    );
    if config.europepmc.enabled {
        pipeline = pipeline.with_detail_source(Arc::new(EuropePmcClient::new(&config.europepmc)?));
    }

    std::fs::create_dir_all(&config.output.directory)?;
    let mut table = TableWriter::new(BufWriter::new(create_file(&config.table_path())?))?;
    let mut statements = QuickStatementsWriter::new(
        BufWriter::new(create_file(&config.statements_path())?),
        schema,
        chrono::Local::now().date_naive(),
    );

    info!(terms = terms.len(), output = %config.output.directory, "starting run");
    let report = pipeline
        .run_feed(&terms, |term| config.search_query(term), &mut table, &mut statements)
        .await;
    table.flush()?;
    statements.flush()?;

    print_report(&report, json_output)?;
    if report.has_failures() {
        Ok(ExitCode::PartialFailure)
    } else {
        Ok(ExitCode::Success)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) if !path.exists() => {
            return Err(MedwikiError::ConfigError(format!("{} does not exist", path.display())).into());
        }
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn load_schema(config: &AppConfig) -> Result<GraphSchema> {
    Ok(match &config.schema_path {
        Some(path) => GraphSchema::load_from(Path::new(path))?,
        None => GraphSchema::default(),
    })
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("cannot create {}", path.display()))
}

fn print_report(report: &FeedReport, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for outcome in &report.terms {
        match (&outcome.report, &outcome.error) {
            (Some(r), _) => println!(
                "✓ {}: {} matched, {} licensed, {} statements",
                outcome.term, r.matched, r.licensed, r.statements
            ),
            (None, Some(e)) => println!("✗ {}: {e}", outcome.term),
            (None, None) => println!("✗ {}", outcome.term),
        }
    }
    let failed = report.failed().count();
    println!(
        "\n{} terms, {} rows, {} statements, {failed} failed",
        report.terms.len(),
        report.total_rows(),
        report.total_statements()
    );
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(e) = err.downcast_ref::<MedwikiError>() {
        return e.exit_code();
    }
    match err.downcast_ref::<ScienceError>() {
        Some(ScienceError::Http(_) | ScienceError::ApiError(..) | ScienceError::RateLimit(..)) => {
            ExitCode::NetworkError
        }
        Some(ScienceError::SourceUnavailable(_)) => ExitCode::NetworkError,
        Some(ScienceError::Io(_)) => ExitCode::FileSystemError,
        Some(ScienceError::MissingCredential(_)) => ExitCode::InvalidArgs,
        _ if err.downcast_ref::<std::io::Error>().is_some() => ExitCode::FileSystemError,
        _ => ExitCode::GeneralError,
    }
}
