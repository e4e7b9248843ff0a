//! CLI entry point for `listmgr`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use listmgr::config::{self, Config};
use listmgr::engine::{roster, settings, subscribe, Role};
use listmgr::form::{self, FormData};
use listmgr::lock;
use listmgr::model::list::MailingList;
use listmgr::model::password::PasswordHash;
use listmgr::schema::{Category, OptionKind};
use listmgr::store::ListStore;

/// Site administration tool for mailing lists.
#[derive(Parser)]
#[command(name = "listmgr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Override the data directory
    #[arg(long, value_name = "DIR", global = true, env = "LISTMGR_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new list
    Create {
        name: String,
        /// Host name the list lives on (defaults to general.default_host)
        #[arg(long)]
        host: Option<String>,
        /// Initial administrator password
        #[arg(long, env = "LISTMGR_ADMIN_PASSWORD")]
        password: String,
        /// Owner addresses
        #[arg(long = "owner", value_name = "ADDR")]
        owners: Vec<String>,
    },
    /// Show list settings
    Show {
        name: String,
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Change list settings (FIELD=VALUE pairs)
    Set {
        name: String,
        category: String,
        #[arg(value_name = "FIELD=VALUE", required = true)]
        assignments: Vec<String>,
    },
    /// Mass-subscribe addresses, one per line, from FILE or stdin
    Subscribe {
        name: String,
        file: Option<PathBuf>,
        /// Subscribe as digest members where the list allows it
        #[arg(long)]
        digest: bool,
        /// Send welcome messages to this batch
        #[arg(long)]
        welcome: bool,
    },
    /// List members
    Members {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the parsed bounce matching rules
    BounceRules { name: String },
    /// Re-enable delivery for members disabled by an admin or by bounces
    Reenable { name: String },
    /// Print the effective configuration (optionally writing it out)
    Config {
        #[arg(long)]
        write: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(dir) = cli.data_dir {
        config.general.data_dir = Some(dir);
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);
    lock::install_termination_handler()?;

    match cli.command {
        Commands::Create {
            name,
            host,
            password,
            owners,
        } => cmd_create(&config, &name, host.as_deref(), &password, owners),
        Commands::Show {
            name,
            category,
            json,
        } => cmd_show(&config, &name, category.as_deref(), json),
        Commands::Set {
            name,
            category,
            assignments,
        } => cmd_set(&config, &name, &category, &assignments),
        Commands::Subscribe {
            name,
            file,
            digest,
            welcome,
        } => cmd_subscribe(&config, &name, file.as_deref(), digest, welcome),
        Commands::Members { name, json } => cmd_members(&config, &name, json),
        Commands::BounceRules { name } => cmd_bounce_rules(&config, &name),
        Commands::Reenable { name } => cmd_reenable(&config, &name),
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Log to stderr, and also to `listmgr.log` in the cache dir when that
/// directory is usable. `RUST_LOG` overrides `level`.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_path = config::log_file_path(config);
    let file_layer = match (log_path.parent(), log_path.file_name()) {
        (Some(dir), Some(name)) if std::fs::create_dir_all(dir).is_ok() => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(tracing_appender::rolling::never(dir, name)),
        ),
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<ListStore> {
    Ok(ListStore::from_config(config)?)
}

fn parse_category(name: &str) -> anyhow::Result<Category> {
    Category::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
        anyhow::anyhow!("Unknown category '{name}'. Known: {}", known.join(", "))
    })
}

fn cmd_create(
    config: &Config,
    name: &str,
    host: Option<&str>,
    password: &str,
    owners: Vec<String>,
) -> anyhow::Result<()> {
    if password.trim().is_empty() {
        anyhow::bail!("The administrator password may not be blank");
    }
    let store = open_store(config)?;
    let host = host.unwrap_or(&config.general.default_host);
    let mut list = MailingList::new(name, host, PasswordHash::new(password));
    list.config.preferred_language = config.general.default_language.clone();
    list.available_languages = config.site.languages.clone();
    list.config.owner = listmgr::validate::valid_addresses(&owners.join("\n"));
    store.create(&list)?;
    println!("  Created list {}@{}", list.internal_name(), list.host_name());
    Ok(())
}

fn cmd_show(config: &Config, name: &str, category: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let list = store.load(name)?;
    let categories = match category {
        Some(c) => vec![parse_category(c)?],
        None => Category::ALL.to_vec(),
    };
    let allow_open = config.site.allow_open_subscribe;

    if json {
        let mut out = serde_json::Map::new();
        for category in &categories {
            let mut fields = serde_json::Map::new();
            for d in category.descriptors().iter().filter(|d| !d.is_action()) {
                fields.insert(d.name.to_string(), serde_json::to_value(d.current(&list.config))?);
            }
            out.insert(category.name().to_string(), serde_json::Value::Object(fields));
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} ({}@{})", list.config.real_name, list.internal_name(), list.host_name());
    for category in categories {
        let descriptors = category.descriptors();
        if descriptors.is_empty() {
            continue;
        }
        println!();
        println!("  {}", category.label());
        println!("  {}", "-".repeat(60));
        for d in descriptors.iter().filter(|d| !d.is_action()) {
            let value = d.current(&list.config);
            let shown = match (d.kind, &value) {
                (OptionKind::Toggle | OptionKind::Radio, listmgr::schema::ConfigValue::Int(n)) => {
                    form::outbound_index(d.name, *n, allow_open).to_string()
                }
                _ => value.to_string().replace('\n', "\\n"),
            };
            let shown: String = shown.chars().take(50).collect();
            println!("  {:<40} {}", d.name, shown);
        }
    }
    for warning in list.sanity_warnings() {
        println!();
        println!("  Warning: {warning}");
    }
    println!();
    Ok(())
}

fn cmd_set(config: &Config, name: &str, category: &str, assignments: &[String]) -> anyhow::Result<()> {
    let category = parse_category(category)?;
    let mut form = FormData::new();
    for assignment in assignments {
        let Some((field, value)) = assignment.split_once('=') else {
            anyhow::bail!("Expected FIELD=VALUE, got '{assignment}'");
        };
        // Literal "\n" separates list entries on the command line.
        form.insert(field.trim(), value.replace("\\n", "\n"));
    }
    let store = open_store(config)?;
    let report = settings::submit_admin_form(&store, name, Role::SiteAdmin, category, &form, &config.site)?;

    for field in &report.config.changed {
        println!("  changed  {field}");
    }
    for action in &report.config.actions {
        println!("  ran      {action}");
    }
    for (field, reason) in &report.config.rejected {
        println!("  rejected {field}: {reason}");
    }
    for err in &report.config.bounce_errors {
        println!("  bounce rule {err}");
    }
    for warning in &report.config.warnings {
        println!("  Warning: {warning}");
    }
    if let Some(roster) = &report.roster {
        for (addr, err) in &roster.errors {
            println!("  {addr} -- {err}");
        }
    }
    if report.config.changed.is_empty() && report.config.actions.is_empty() {
        println!("  No changes");
    }
    Ok(())
}

fn cmd_subscribe(
    config: &Config,
    name: &str,
    file: Option<&Path>,
    digest: bool,
    welcome: bool,
) -> anyhow::Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let lines = subscribe::parse_batch_text(&text);
    let store = open_store(config)?;
    let report = store.with_list(name, |list| {
        Ok(subscribe::batch_subscribe(list, &lines, digest, welcome, &config.site))
    })?;

    let accepted: Vec<&str> = report.accepted().collect();
    if !accepted.is_empty() {
        println!("  Successfully subscribed:");
        for addr in accepted {
            println!("    {addr}");
        }
    }
    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("  Error subscribing:");
        for (line, outcome) in failures {
            let line = if line.is_empty() { "<blank line>" } else { line };
            println!("    {line} -- {}", outcome.describe());
        }
    }
    Ok(())
}

fn cmd_members(config: &Config, name: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let list = store.load(name)?;
    if json {
        let members: Vec<serde_json::Value> = list
            .members()
            .map(|m| {
                serde_json::json!({
                    "address": m.address,
                    "name": m.name,
                    "mode": m.mode,
                    "status": m.status,
                    "flags": m.flags.bits(),
                    "language": m.language,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }
    println!();
    println!("  {} member(s)", list.member_count());
    println!();
    for m in list.members() {
        let mode = if m.is_digest() { "digest" } else { "regular" };
        let status = if m.status.is_enabled() { "" } else { "  (delivery disabled)" };
        println!("  {:<40} {:<8}{}", m.address, mode, status);
    }
    println!();
    Ok(())
}

fn cmd_bounce_rules(config: &Config, name: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let rules = store.load(name)?.bounce_rules();
    for rule in &rules.rules {
        println!("  {:<20} {}", rule.header, rule.pattern.as_str().trim_start_matches("(?i)"));
    }
    for err in &rules.errors {
        println!("  error: {err}");
    }
    Ok(())
}

fn cmd_reenable(config: &Config, name: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let done = store.with_list(name, |list| Ok(roster::reenable_site_disabled(list)))?;
    println!("  Re-enabled {} member(s)", done.len());
    for addr in done {
        println!("    {addr}");
    }
    Ok(())
}

fn cmd_config(config: &Config, write: bool) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    if write {
        config::save_config(config)?;
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "listmgr", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
