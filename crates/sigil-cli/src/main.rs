mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use sigil_core::{
    BreathPhase, BreathStrategy, Category, CuratedStrategy, Encoder, Sigil, SigilEngine,
    SigilFilter, SigilMetadata, SourceType,
};
use sigil_store::SqliteStore;

#[derive(Parser)]
#[command(name = "sigil", about = "Neural sigil pattern engine CLI")]
struct Cli {
    /// Engine settings file (defaults to $SIGIL_DATA_DIR/sigil.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode text and print the analysis without storing it
    Encode {
        text: String,
        #[arg(long, default_value = "dream", value_parser = parse_source)]
        source: SourceType,
    },

    /// Generate and store a sigil from text
    Add {
        text: String,
        #[arg(long, default_value = "dream", value_parser = parse_source)]
        source: SourceType,
        #[arg(long, value_parser = parse_phase)]
        phase: Option<BreathPhase>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        dream: Option<String>,
    },

    /// Generate a sigil from the current breath phase
    Breathe {
        #[arg(value_parser = parse_phase)]
        phase: BreathPhase,
        /// Completed breath cycles so far
        #[arg(long, default_value_t = 0)]
        cycle: u32,
        #[arg(long)]
        note: Option<String>,
    },

    /// Generate a sigil from a curated entry, or list entries when no name is given
    Curated { name: Option<String> },

    /// Stored sigils similar to the given one
    Similar {
        id: Uuid,
        /// Defaults to the configured `thresholds.similar`
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Braid two or more stored sigils
    Braid {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<Uuid>,
    },

    /// Cluster the given sigils, or the whole store
    Cluster { ids: Vec<Uuid> },

    /// Match a stored sigil against the pattern library
    Recognize { id: Uuid },

    /// Evolution report over the store
    Summary {
        #[arg(long, value_parser = parse_source)]
        source: Option<SourceType>,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },

    /// Find the most recent sigil by decimal or t-prefixed ternary code
    Lookup { code: String },

    /// Show engine statistics
    Stats,

    /// Export the stored snapshot to a JSON file
    Export { path: PathBuf },

    /// Replace the stored snapshot with a JSON file
    Import { path: PathBuf },
}

fn parse_source(s: &str) -> std::result::Result<SourceType, String> {
    SourceType::parse(s).ok_or_else(|| {
        let names: Vec<&str> = SourceType::ALL.iter().map(|t| t.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn parse_phase(s: &str) -> std::result::Result<BreathPhase, String> {
    BreathPhase::parse(s).ok_or_else(|| {
        let names: Vec<&str> = BreathPhase::ALL.iter().map(|p| p.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn parse_category(s: &str) -> std::result::Result<Category, String> {
    Category::parse(s).ok_or_else(|| {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn open_store(dir: &Path) -> Result<SqliteStore> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    SqliteStore::open(&dir.join(config::DB_FILE)).context("failed to open sigil store")
}

/// A loaded engine bound to the store it came from.
struct Session {
    engine: SigilEngine,
    store: SqliteStore,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let dir = config::data_dir();
        let engine_config = config::load(cli.config.as_deref(), &dir)?;
        let store = open_store(&dir)?;
        let engine =
            SigilEngine::load_from(engine_config, &store).context("failed to load engine state")?;
        Ok(Self { engine, store })
    }

    /// Write the engine snapshot on a blocking task.
    async fn save(self) -> Result<()> {
        let snapshot = self.engine.snapshot();
        let store = self.store;
        tokio::task::spawn_blocking(move || store.save_snapshot(&snapshot))
            .await
            .context("save task panicked")?
            .context("failed to save engine state")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Encode { text, source } => cmd_encode(&cli, text, *source),
        Commands::Add {
            text,
            source,
            phase,
            user,
            dream,
        } => {
            let metadata = SigilMetadata {
                breath_phase: *phase,
                user_id: user.clone(),
                dream_id: dream.clone(),
                ..SigilMetadata::default()
            };
            cmd_add(&cli, text, *source, metadata).await
        }
        Commands::Breathe { phase, cycle, note } => {
            let strategy = BreathStrategy {
                phase: *phase,
                cycle: *cycle,
                note: note.clone(),
            };
            let mut session = Session::open(&cli)?;
            let sigil = session.engine.generate_from(&strategy);
            print_sigil(&sigil);
            session.save().await
        }
        Commands::Curated { name } => cmd_curated(&cli, name.as_deref()).await,
        Commands::Similar { id, threshold } => cmd_similar(&cli, *id, *threshold),
        Commands::Braid { ids } => cmd_braid(&cli, ids).await,
        Commands::Cluster { ids } => cmd_cluster(&cli, ids),
        Commands::Recognize { id } => cmd_recognize(&cli, *id),
        Commands::Summary { source, category } => cmd_summary(&cli, *source, *category),
        Commands::Lookup { code } => cmd_lookup(&cli, code),
        Commands::Stats => cmd_stats(&cli),
        Commands::Export { path } => cmd_export(path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn print_sigil(sigil: &Sigil) {
    println!("id:        {}", sigil.id);
    println!("category:  {}", sigil.category.as_str());
    println!("source:    {}", sigil.source_type.as_str());
    println!("strength:  {:.3}", sigil.strength);
    println!("code:      {} (t{})", sigil.hash, sigil.ternary_code());
    if let Some(reason) = sigil.metadata.fallback_reason() {
        println!("fallback:  {reason}");
    }
}

fn cmd_encode(cli: &Cli, text: &str, source: SourceType) -> Result<()> {
    let engine_config = config::load(cli.config.as_deref(), &config::data_dir())?;
    let encoder = Encoder::new(engine_config.dimensions)?;
    let encoding = encoder
        .try_analyze(text, source)
        .context("failed to encode text")?;

    #[derive(Serialize)]
    struct EncodeOutput<'a> {
        category: Category,
        strength: f64,
        degenerate: bool,
        vector: &'a [f64],
    }
    print_json(&EncodeOutput {
        category: encoding.category,
        strength: encoding.strength,
        degenerate: encoding.degenerate,
        vector: &encoding.vector,
    })
}

async fn cmd_add(cli: &Cli, text: &str, source: SourceType, metadata: SigilMetadata) -> Result<()> {
    let mut session = Session::open(cli)?;
    let sigil = session.engine.generate(text, source, metadata);
    print_sigil(&sigil);
    session.save().await
}

async fn cmd_curated(cli: &Cli, name: Option<&str>) -> Result<()> {
    let Some(name) = name else {
        for name in CuratedStrategy::names() {
            println!("{name}");
        }
        return Ok(());
    };
    let strategy =
        CuratedStrategy::named(name).ok_or_else(|| anyhow!("no curated sigil named '{name}'"))?;
    let mut session = Session::open(cli)?;
    let sigil = session.engine.generate_from(&strategy);
    print_sigil(&sigil);
    session.save().await
}

fn cmd_similar(cli: &Cli, id: Uuid, threshold: Option<f64>) -> Result<()> {
    let session = Session::open(cli)?;
    let engine = &session.engine;
    engine.require(id)?;
    let threshold = threshold.unwrap_or(engine.config().thresholds.similar);

    let matches = engine.find_similar(id, threshold);
    if matches.is_empty() {
        println!("(no similar sigils)");
    }
    for m in matches {
        println!(
            "{:.4}  {}  {:<11}  {}",
            m.score,
            m.sigil.id,
            m.sigil.category.as_str(),
            m.sigil.timestamp.to_rfc3339()
        );
    }
    Ok(())
}

async fn cmd_braid(cli: &Cli, ids: &[Uuid]) -> Result<()> {
    let mut session = Session::open(cli)?;
    let braid = session.engine.braid(ids).context("failed to braid")?;
    println!("braid:     {}", braid.id);
    println!("members:   {}", braid.members.len());
    println!("strength:  {:.3}", braid.strength);
    for c in &braid.connections {
        println!("  {} -> {}  {:<8}  {:.4}", c.from, c.to, c.kind.as_str(), c.score);
    }
    session.save().await
}

fn cmd_cluster(cli: &Cli, ids: &[Uuid]) -> Result<()> {
    let session = Session::open(cli)?;
    let report = if ids.is_empty() {
        session.engine.cluster_all()
    } else {
        session.engine.cluster(ids).context("failed to cluster")?
    };
    print_json(&report)
}

fn cmd_recognize(cli: &Cli, id: Uuid) -> Result<()> {
    let session = Session::open(cli)?;
    let matches = session.engine.recognize(id)?;
    if matches.is_empty() {
        println!("(no patterns recognized)");
    }
    for m in matches {
        println!("{:.4}  {:<18}  {}", m.score, m.name, m.category.as_str());
    }
    Ok(())
}

fn cmd_summary(cli: &Cli, source: Option<SourceType>, category: Option<Category>) -> Result<()> {
    let session = Session::open(cli)?;
    let filter = SigilFilter {
        source_type: source,
        category,
        ..SigilFilter::default()
    };
    print_json(&session.engine.summarize_filtered(&filter))
}

fn cmd_lookup(cli: &Cli, code: &str) -> Result<()> {
    let session = Session::open(cli)?;
    match session.engine.lookup_code(code) {
        Some(sigil) => print_sigil(sigil),
        None => println!("(no sigil with code {code})"),
    }
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let session = Session::open(cli)?;
    let engine = &session.engine;
    let retention = &engine.config().retention;
    println!("sigils:     {}/{}", engine.len(), retention.max_sigils);
    println!("braids:     {}/{}", engine.braids().count(), retention.max_braids);
    println!("edges:      {}", engine.index().len());
    println!("patterns:   {}", engine.library().templates().len());
    println!("dimensions: {}", engine.config().dimensions);
    Ok(())
}

fn cmd_export(path: &Path) -> Result<()> {
    let store = open_store(&config::data_dir())?;
    store
        .export_json_file(path)
        .context("failed to export JSON")?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let mut session = Session::open(cli)?;
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot = sigil_core::import_json(&json).context("invalid snapshot JSON")?;
    session
        .engine
        .restore(snapshot)
        .context("failed to restore snapshot")?;
    session
        .store
        .save_snapshot(&session.engine.snapshot())
        .context("failed to save imported state")?;
    println!(
        "imported from {}. sigils={}, braids={}",
        path.display(),
        session.engine.len(),
        session.engine.braids().count()
    );
    Ok(())
}
