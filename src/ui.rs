// UI layer: terminal flows for the `olog` binary. Each subcommand is one
// small synchronous function; `run` picks the right one.

use crate::api::{ClientConfig, DeleteTarget, SearchQuery};
use crate::cli::{parse_pair, parse_property, Cli, Command, Connection, EntryArgs};
use crate::config::Config;
use crate::model::Property;
use crate::simple::{LogRequest, SimpleClient};
use anyhow::{bail, Context, Result};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::process::Command as Process;
use std::time::Duration;

/// Executes the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("Failed to read config files")?;
    let client = connect(&cli.conn, config.clone())?;
    let quiet = cli.quiet;
    match cli.command {
        None => handle_log(&client, &config, cli.entry, quiet),
        Some(Command::Find { params }) => handle_find(&client, &params),
        Some(Command::Logbooks) => {
            for name in client.logbooks()? {
                println!("{name}");
            }
            Ok(())
        }
        Some(Command::Tags) => {
            for tag in client.client().list_tags()? {
                println!("{}\t{}", tag.name, tag.state);
            }
            Ok(())
        }
        Some(Command::Properties) => {
            for p in client.client().list_properties()? {
                let keys: Vec<&str> = p.attributes.keys().map(String::as_str).collect();
                println!("{}\t{}", p.name, keys.join(","));
            }
            Ok(())
        }
        Some(Command::Attachments { id, output }) => handle_attachments(&client, id, &output, quiet),
        Some(Command::CreateLogbook { name, owner }) => {
            client.create_logbook(&name, owner.as_deref())?;
            report(quiet, &format!("Logbook '{name}' created."));
            Ok(())
        }
        Some(Command::CreateTag { name, inactive }) => {
            client.create_tag(&name, !inactive)?;
            report(quiet, &format!("Tag '{name}' created."));
            Ok(())
        }
        Some(Command::CreateProperty { name, keys }) => {
            client.create_property(&name, keys)?;
            report(quiet, &format!("Property '{name}' created."));
            Ok(())
        }
        Some(Command::Delete {
            entry,
            logbook,
            tag,
            property,
            yes,
        }) => {
            let target = match (entry, logbook, tag, property) {
                (Some(id), None, None, None) => DeleteTarget::LogEntry(id),
                (None, Some(n), None, None) => DeleteTarget::Logbook(n),
                (None, None, Some(n), None) => DeleteTarget::Tag(n),
                (None, None, None, Some(n)) => DeleteTarget::Property(n),
                _ => bail!("Specify exactly one of --entry, --logbook, --tag or --property"),
            };
            handle_delete(&client, &target, yes, quiet)
        }
    }
}

/// Builds the client from command line flags layered over the config files.
pub fn connect(conn: &Connection, config: Config) -> Result<SimpleClient> {
    let mut settings = ClientConfig::new().config(config).prompt(!conn.no_prompt);
    if let Some(url) = &conn.url {
        settings = settings.url(url);
    }
    if let Some(u) = &conn.username {
        settings = settings.username(u);
    }
    if let Some(p) = &conn.password {
        settings = settings.password(p);
    }
    if conn.anonymous {
        settings = settings.anonymous();
    }
    if conn.insecure {
        settings = settings.accept_invalid_certs(true);
    }
    SimpleClient::new(settings).context("Failed to set up Olog client")
}

fn report(quiet: bool, msg: &str) {
    if !quiet {
        println!("{msg}");
    }
}

fn spinner(quiet: bool, msg: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Log text from `--file`, piped stdin, or the user's editor, in that order.
pub fn read_text(file: Option<&Path>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut buf = String::new();
        stdin.lock().read_to_string(&mut buf).context("Failed to read stdin")?;
        return Ok(buf);
    }
    edit_text()
}

fn edit_text() -> Result<String> {
    let temp_file = tempfile::Builder::new()
        .prefix("olog-")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create temporary file")?;
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = Process::new(&editor)
        .arg(temp_file.path())
        .status()
        .with_context(|| format!("Failed to start editor '{editor}'"))?;
    if !status.success() {
        bail!("Editor '{editor}' exited with {status}");
    }
    std::fs::read_to_string(temp_file.path()).context("Failed to read edited text")
}

/// Builds the facade request from entry flags, falling back to the
/// `logbooks`/`tags` defaults in the config.
pub fn log_request(text: String, args: &EntryArgs, config: &Config) -> Result<LogRequest> {
    let mut req = LogRequest::new(text).verify(!args.no_verify);
    req.logbooks = if args.logbooks.is_empty() {
        config.list("logbooks")
    } else {
        args.logbooks.clone()
    };
    req.tags = if args.tags.is_empty() {
        config.list("tags")
    } else {
        args.tags.clone()
    };

    let mut properties: Vec<Property> = Vec::new();
    for raw in &args.properties {
        let (name, key, value) =
            parse_property(raw).with_context(|| format!("Bad --property '{raw}', expected NAME:KEY=VALUE"))?;
        match properties.iter_mut().find(|p| p.name == name) {
            Some(p) => {
                p.attributes.insert(key, value);
            }
            None => properties.push(Property::new(name).attribute(key, value)),
        }
    }
    req.properties = properties;

    for path in &args.attachments {
        req = req.attach(path.clone());
    }
    Ok(req)
}

fn handle_log(client: &SimpleClient, config: &Config, args: EntryArgs, quiet: bool) -> Result<()> {
    let text = read_text(args.file.as_deref())?;
    if text.trim().is_empty() {
        eprintln!("Empty log entry, nothing posted.");
        return Ok(());
    }
    let req = log_request(text, &args, config)?;

    let pb = spinner(quiet, "Posting log entry...");
    let result = client.log(req);
    pb.finish_and_clear();
    let entry = result.context("Failed to create log entry")?;
    match entry.id() {
        Some(id) => report(quiet, &format!("Log entry {id} created.")),
        None => report(quiet, "Log entry created."),
    }
    Ok(())
}

fn handle_find(client: &SimpleClient, params: &[String]) -> Result<()> {
    let mut query = SearchQuery::new();
    for raw in params {
        let (k, v) = parse_pair(raw).with_context(|| format!("Bad search term '{raw}', expected KEY=VALUE"))?;
        query = query.param(k, v);
    }
    for e in client.find(&query)? {
        let when = e
            .create_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!(
            "[{}] {} {} | Logbooks: {} | Tags: {}",
            e.id,
            when,
            e.owner.as_deref().unwrap_or("-"),
            e.logbooks.join(","),
            e.tags.join(",")
        );
        println!("{}", e.text.trim_end());
        println!("{}", "─".repeat(40));
    }
    Ok(())
}

fn handle_attachments(client: &SimpleClient, id: u64, output: &Path, quiet: bool) -> Result<()> {
    let pb = spinner(quiet, "Downloading attachments...");
    let result = client.client().list_attachments(id);
    pb.finish_and_clear();
    let attachments = result.with_context(|| format!("Failed to list attachments of entry {id}"))?;
    std::fs::create_dir_all(output)?;
    for a in attachments {
        // Never let a server-supplied name escape the output directory.
        let name = Path::new(a.file_name())
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("Refusing attachment name '{}'", a.file_name()))?;
        let dest = output.join(name);
        std::fs::write(&dest, a.read()?).with_context(|| format!("Failed to write {}", dest.display()))?;
        report(quiet, &format!("Saved {}", dest.display()));
    }
    Ok(())
}

fn handle_delete(client: &SimpleClient, target: &DeleteTarget, yes: bool, quiet: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Permanently delete {target:?}?"))
            .default(false)
            .interact()?;
        if !confirmed {
            report(quiet, "Cancelled.");
            return Ok(());
        }
    }
    client.client().delete(target)?;
    report(quiet, "Deleted.");
    Ok(())
}
