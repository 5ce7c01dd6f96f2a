use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use pageturn::config::Config;
use pageturn::content::{FullTextFetcher, DEFAULT_BASE_URL};
use pageturn::drawer::DrawerModel;
use pageturn::mobilizer::{spawn_mobilizer, Mobilizer};
use pageturn::reader::{
    Direction, EntryReader, HtmlBuffer, NoProgress, ReaderAction, ReaderCommand, ReaderPlatform,
    ReaderSettings, SessionSnapshot, SurfacePair, SystemLauncher, TcpProbe,
};
use pageturn::storage::{Database, DatabaseError, EntryId, Scope};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Get the config directory path (~/.config/pageturn/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("pageturn"))
}

#[derive(Parser, Debug)]
#[command(name = "pageturn", about = "Entry reader with full-text fetching")]
struct Args {
    /// Database file (default: ~/.config/pageturn/pageturn.db)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/pageturn/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the navigation drawer
    Drawer,
    /// Read entries interactively from stdin
    Read {
        entry_id: EntryId,
        /// all, favorites, feed:<id> or group:<id>
        #[arg(long, default_value = "all", value_parser = parse_scope)]
        scope: Scope,
        /// Where the displayed document is written
        #[arg(long, value_name = "FILE", default_value = "pageturn.html")]
        out: PathBuf,
        /// Resume the last saved reading session instead
        #[arg(long)]
        resume: bool,
    },
    /// Fetch full text for entries and wait for the queue to drain
    Mobilize {
        #[arg(required = true)]
        entry_ids: Vec<EntryId>,
    },
}

fn parse_scope(s: &str) -> Result<Scope, String> {
    Scope::parse(s).ok_or_else(|| format!("invalid scope '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config_dir.join("pageturn.db"));
    let db = open_database(&db_path).await?;

    match args.command {
        Command::Drawer => print_drawer(&db, &config).await,
        Command::Read {
            entry_id,
            scope,
            out,
            resume,
        } => read(db, &config, entry_id, scope, &out, resume).await,
        Command::Mobilize { entry_ids } => mobilize(db, &config, &entry_ids).await,
    }
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database is locked by another process. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn build_fetcher(config: &Config) -> Result<FullTextFetcher> {
    // The environment wins over the config file
    let api_key = std::env::var("JINA_API_KEY")
        .ok()
        .or_else(|| config.jina_api_key.clone())
        .filter(|k| !k.is_empty())
        .map(SecretString::from);
    let client = reqwest::Client::builder()
        .user_agent(concat!("pageturn/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    FullTextFetcher::new(client, config.mobilizer_base_url.as_deref(), api_key)
        .context("Invalid mobilizer configuration")
}

async fn print_drawer(db: &Database, config: &Config) -> Result<()> {
    let mut drawer = DrawerModel::new(config);
    drawer.refresh(db).await.context("Failed to load drawer")?;
    for position in 0..drawer.len() {
        if let Some(item) = drawer.item(position) {
            println!("{item}");
        }
    }
    Ok(())
}

async fn mobilize(db: Database, config: &Config, entry_ids: &[EntryId]) -> Result<()> {
    let (worker, handle) = Mobilizer::new(db, build_fetcher(config)?);
    let added = handle.submit(entry_ids).await?;
    println!("Queued {added} of {} entries", entry_ids.len());

    let report = worker.run_to_completion().await?;
    println!(
        "Completed: {}, failed: {}, dropped: {}",
        report.completed, report.failed, report.dropped
    );
    Ok(())
}

async fn read(
    db: Database,
    config: &Config,
    entry_id: EntryId,
    scope: Scope,
    out: &Path,
    resume: bool,
) -> Result<()> {
    let (mobilizer, worker) = spawn_mobilizer(db.clone(), build_fetcher(config)?);

    let probe_base = config
        .mobilizer_base_url
        .as_deref()
        .unwrap_or(DEFAULT_BASE_URL);
    let connectivity = TcpProbe::for_url(probe_base, PROBE_TIMEOUT)
        .unwrap_or_else(|| TcpProbe::new("r.jina.ai:443", PROBE_TIMEOUT));
    let platform = ReaderPlatform {
        progress: Box::new(NoProgress),
        connectivity: Arc::new(connectivity),
        launcher: Arc::new(SystemLauncher),
    };

    let (mut reader, mut events) = EntryReader::new(
        db.clone(),
        mobilizer.clone(),
        SurfacePair::<HtmlBuffer>::default(),
        platform,
        ReaderSettings::from_config(config),
        scope,
    );

    match SessionSnapshot::load(&db).await {
        Ok(Some(snapshot)) if resume => reader.restore_session(snapshot).await,
        Ok(_) => reader.open(entry_id).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load reader session");
            reader.open(entry_id).await;
        }
    }

    let mut written = None;
    show(&mut reader, out, &mut written)?;
    println!("commands: n p f o s u e l z, click <url>, q");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = parse_command(line.trim(), &reader) else {
                    if line.trim() == "q" {
                        break;
                    }
                    println!("unknown command");
                    continue;
                };
                if reader.handle_command(command).await == ReaderAction::Close {
                    println!("closed");
                    break;
                }
            }
            Some(event) = events.recv() => reader.handle_event(event).await,
        }
        show(&mut reader, out, &mut written)?;
    }

    if let Err(e) = reader.save_session().await {
        tracing::warn!(error = %e, "Failed to save reader session");
    }
    reader.dispose();
    mobilizer.shutdown().await;
    let _ = worker.await;
    Ok(())
}

fn parse_command(input: &str, reader: &EntryReader<HtmlBuffer>) -> Option<ReaderCommand> {
    if let Some(url) = input.strip_prefix("click ") {
        return Some(ReaderCommand::from_link(url.trim()));
    }
    let command = match input {
        "n" => ReaderCommand::Navigate(Direction::Next),
        "p" => ReaderCommand::Navigate(Direction::Previous),
        "f" => ReaderCommand::ToggleFullText(true),
        "o" => ReaderCommand::ToggleFullText(false),
        "s" => ReaderCommand::ToggleFavorite,
        "u" => ReaderCommand::MarkUnread,
        "e" => ReaderCommand::OpenEnclosure,
        "l" => ReaderCommand::OpenLink(reader.entry()?.link.clone()?),
        "z" => ReaderCommand::ToggleFullscreen,
        _ => return None,
    };
    Some(command)
}

/// Print the reader status and write the active document when it changed.
fn show(
    reader: &mut EntryReader<HtmlBuffer>,
    out: &Path,
    written: &mut Option<String>,
) -> Result<()> {
    if let Some(notice) = reader.take_notice() {
        println!("! {notice}");
    }

    let document = reader.surfaces().active().document();
    if document != written.as_deref() {
        if let Some(html) = document {
            std::fs::write(out, html)
                .with_context(|| format!("Failed to write {}", out.display()))?;
        }
        *written = document.map(str::to_string);
    }

    let browsing = reader.browsing();
    match reader.entry() {
        Some(entry) => println!(
            "[{:?}] {} | {} | prev={:?} next={:?} full_text={} favorite={}",
            reader.state(),
            reader.feed_title(),
            entry.title,
            browsing.previous_id,
            browsing.next_id,
            browsing.prefer_full_text,
            entry.is_favorite
        ),
        None => println!("[{:?}] nothing to display", reader.state()),
    }
    Ok(())
}
