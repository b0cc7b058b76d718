use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use time::macros::format_description;
use tracing_subscriber::EnvFilter;

use tagbook::config::{self, Config};
use tagbook::{App, Commit, Contact, EditorInput, Entry, MatchMode, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "tagbook", about = "Browse and tag contacts")]
struct Cli {
    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print contacts and labels as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Log store calls and navigation to stderr
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init(InitArgs),
    /// List all contacts
    List,
    /// Filter contacts by words found in their entries and names
    Search(SearchArgs),
    /// Create a contact and print its id
    New(NewArgs),
    /// Attach an entry to a contact
    Tag(TagArgs),
    /// Remove every entry with the given key from a contact
    Untag(UntagArgs),
    /// Show a contact and its entries
    Show(IdArgs),
    /// Labels in use, most common first
    Labels,
    /// Labels a contact does not use yet, most common first
    Suggest(IdArgs),
    /// Print the key that would be inferred for a value
    Infer(InferArgs),
    /// Delete contacts
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Database location written into the new config
    #[arg(long)]
    database: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    query: String,

    /// Override search.mode from the config
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Fold accented and non-Latin text to ASCII (include mode only)
    #[arg(long, default_value_t = false)]
    fold: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Include,
    Exclude,
}

impl From<ModeArg> for MatchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Include => MatchMode::Include,
            ModeArg::Exclude => MatchMode::Exclude,
        }
    }
}

#[derive(Args, Debug)]
struct NewArgs {
    #[arg(long)]
    given: Option<String>,
    #[arg(long)]
    family: Option<String>,
    #[arg(long)]
    nickname: Option<String>,
    #[arg(long)]
    org: Option<String>,
}

#[derive(Args, Debug)]
struct TagArgs {
    /// Contact id (a unique prefix is enough)
    id: String,
    value: String,
    /// Label for the entry; inferred from the value when omitted
    #[arg(long)]
    key: Option<String>,
}

#[derive(Args, Debug)]
struct UntagArgs {
    id: String,
    key: String,
}

#[derive(Args, Debug)]
struct IdArgs {
    id: String,
}

#[derive(Args, Debug)]
struct InferArgs {
    value: String,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    #[arg(required = true)]
    ids: Vec<String>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tagbook=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::Init(args) = &cli.command {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => config::default_config_path()?,
        };
        let written = config::init(&path, args.database.as_deref())?;
        println!("Wrote configuration to {}", written.display());
        return Ok(());
    }

    let config = config::load(cli.config.as_deref())?;
    let store = SqliteStore::open(&config.database)?;
    let mut app = App::new(store, &config);
    app.load().await;

    let result = run(&mut app, &config, cli.command, cli.json).await;

    for notice in app.take_notices() {
        eprintln!("{}", notice);
    }
    result
}

async fn run(app: &mut App<SqliteStore>, config: &Config, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Init(_) => bail!("init does not take an existing configuration"),
        Command::List => print_contacts(app, app.contacts().iter().collect(), json),
        Command::Search(args) => {
            if let Some(mode) = args.mode {
                app.set_mode(mode.into());
            }
            if args.fold {
                app.set_fold(true);
            }
            print_contacts(app, app.search(&args.query), json)
        }
        Command::New(args) => handle_new(app, args).await,
        Command::Tag(args) => handle_tag(app, args).await,
        Command::Untag(args) => handle_untag(app, args).await,
        Command::Show(args) => handle_show(app, &args.id, json),
        Command::Labels => {
            let limit = config.suggestions.limit;
            if json {
                let labels: Vec<_> = app
                    .labels()
                    .counts()
                    .take(limit)
                    .map(|(key, count)| {
                        serde_json::json!({
                            "value": key,
                            "description": tagbook::suggest::category(key),
                            "count": count,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&labels)?);
            } else {
                for (key, count) in app.labels().counts().take(limit) {
                    println!("{}\t{}\t{}", count, key, tagbook::suggest::category(key));
                }
            }
            Ok(())
        }
        Command::Suggest(args) => {
            let id = resolve_id(app, &args.id)?;
            let index = app.open_editor(&id)?;
            let suggestions = app.suggestions_for(index)?;
            app.close_editor(index).await?;
            let suggestions: Vec<_> = suggestions
                .into_iter()
                .take(config.suggestions.limit)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            } else {
                for s in suggestions {
                    println!("{}\t{}", s.value, s.description);
                }
            }
            Ok(())
        }
        Command::Infer(args) => {
            println!("{}", app.infer_key(&args.value));
            Ok(())
        }
        Command::Delete(args) => {
            let mut ids = HashSet::new();
            for raw in &args.ids {
                ids.insert(resolve_id(app, raw)?);
            }
            let removed = app.delete_contacts(&ids).await?;
            println!("Deleted {} contact(s).", removed);
            Ok(())
        }
    }
}

fn print_contacts(app: &App<SqliteStore>, contacts: Vec<&Contact>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&contacts)?);
        return Ok(());
    }
    for contact in contacts {
        println!("{}\t{}", contact.id, app.display_name(Some(contact)));
    }
    Ok(())
}

/// Exact id, or a prefix matching exactly one contact.
fn resolve_id(app: &App<SqliteStore>, raw: &str) -> Result<String> {
    if app.contact(raw).is_some() {
        return Ok(raw.to_string());
    }
    let matches: Vec<&Contact> = app
        .contacts()
        .iter()
        .filter(|c| c.id.starts_with(raw))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => bail!("no contact with id `{}`", raw),
        _ => bail!("id prefix `{}` matches {} contacts", raw, matches.len()),
    }
}

fn commit_result(commit: Commit) -> Result<()> {
    match commit {
        Commit::Unchanged | Commit::Saved => Ok(()),
        Commit::RolledBack(err) => Err(anyhow::Error::new(err).context("changes were rolled back")),
    }
}

async fn handle_new(app: &mut App<SqliteStore>, args: NewArgs) -> Result<()> {
    let index = app.open_new_editor().await?;
    let id = app
        .editor(index)
        .map(|editor| editor.contact_id().to_string())
        .context("new editor vanished")?;

    let has_names = args.given.is_some()
        || args.family.is_some()
        || args.nickname.is_some()
        || args.org.is_some();
    if has_names {
        let mut contact = app.contact(&id).cloned().context("new contact vanished")?;
        contact.given_name = args.given;
        contact.family_name = args.family;
        contact.nickname = args.nickname;
        contact.organization = args.org;
        app.save_contact(contact).await?;
    }

    commit_result(app.close_editor(index).await?)?;
    println!("{}", id);
    Ok(())
}

async fn handle_tag(app: &mut App<SqliteStore>, args: TagArgs) -> Result<()> {
    let value = args.value.trim().to_string();
    if value.is_empty() {
        bail!("entry value must not be empty");
    }
    let id = resolve_id(app, &args.id)?;
    let key = match args.key {
        Some(key) => key,
        None => app.infer_key(&value),
    };

    let index = app.open_editor(&id)?;
    app.handle_input(index, EditorInput::AddEntry(Entry::new(key.clone(), value.clone())))?;
    commit_result(app.close_editor(index).await?)?;

    let name = app.display_name(app.contact(&id));
    println!("{}: {}:{}", name, key, value);
    Ok(())
}

async fn handle_untag(app: &mut App<SqliteStore>, args: UntagArgs) -> Result<()> {
    let id = resolve_id(app, &args.id)?;
    let index = app.open_editor(&id)?;
    let before = app.editor(index).map(|e| e.entries().len()).unwrap_or(0);
    app.handle_input(index, EditorInput::RemoveKey(args.key.clone()))?;
    let after = app.editor(index).map(|e| e.entries().len()).unwrap_or(0);
    commit_result(app.close_editor(index).await?)?;

    let removed = before - after;
    let noun = if removed == 1 { "entry" } else { "entries" };
    println!("Removed {} `{}` {}.", removed, args.key, noun);
    Ok(())
}

fn handle_show(app: &App<SqliteStore>, raw: &str, json: bool) -> Result<()> {
    let id = resolve_id(app, raw)?;
    let contact = app.contact(&id).context("contact vanished")?;
    if json {
        println!("{}", serde_json::to_string_pretty(contact)?);
        return Ok(());
    }

    println!("{}", app.display_name(Some(contact)));
    println!("id: {}", contact.id);
    if let Some(created) = app.store().created_at(&id)? {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
        println!("created: {}", created.format(&format)?);
    }
    for entry in &contact.entries {
        println!("  {}: {}", entry.key, entry.value);
    }
    Ok(())
}
