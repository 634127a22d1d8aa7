//! regwatch - live peripheral register watch-list
//!
//! Command line host for [`regwatch_rs::WatchSession`].

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use owo_colors::OwoColorize;
use regwatch_rs::{
    codec::parse_integer,
    config::{self, AppConfig, LogConfig},
    watch::{Palette, WatchListStore},
    MockMemory, NumericBase, ProbeMemory, TargetMemory, WatchSession,
};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    /// Configuration file (default: platform config directory)
    #[arg(global = true, long = "config")]
    config: Option<PathBuf>,

    /// Watch-list file (overrides the configuration)
    #[arg(global = true, short = 'w', long = "watch-list")]
    watch_list: Option<PathBuf>,

    /// Use an in-memory target instead of a debug probe
    #[arg(global = true, long = "mock", default_value_t = false)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a watch-list for a device catalog (.json or .toml)
    Init {
        catalog: String,
        /// Overwrite an existing watch-list
        #[arg(short = 'f', long = "force", default_value_t = false)]
        force: bool,
    },
    /// Watch a register (PERIPH.REG) or field (PERIPH.REG.FIELD)
    Add { name: String, alias: Option<String> },
    /// Stop watching an entry, by alias or catalog name
    Remove { key: String },
    /// Read and display every watched value once
    Show {
        #[arg(short = 'b', long = "base", value_parser = parse_base)]
        base: Option<NumericBase>,
        #[arg(long = "width")]
        width: Option<usize>,
    },
    /// Refresh the display continuously; type commands on stdin
    Watch {
        #[arg(short = 'b', long = "base", value_parser = parse_base)]
        base: Option<NumericBase>,
        #[arg(long = "width")]
        width: Option<usize>,
        #[arg(long = "interval-ms")]
        interval_ms: Option<u64>,
        /// Stop after this many refreshes
        #[arg(long = "count")]
        count: Option<usize>,
    },
    /// Write a value (0x.., 0b.. or decimal) to a watched entry
    Set { alias: String, value: String },
    /// Show the catalog with watch-list selection marks
    Tree { peripheral: Option<String> },
    /// Toggle catalog nodes in the watch-list
    Select {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Set or clear (no alias given) the alias of a watched entry
    Alias { name: String, alias: Option<String> },
    /// List connected debug probes
    Probes,
}

fn parse_base(s: &str) -> Result<NumericBase, String> {
    NumericBase::from_str(s).map_err(|e| e.to_string())
}

fn init_logging(log: &LogConfig) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.filter_or_default()))
    };
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    match log.directory {
        Some(ref directory) => {
            let appender = tracing_appender::rolling::daily(directory, "regwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry().with(stderr).with(file).try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stderr).try_init()?;
            Ok(None)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_default()?,
    };
    Ok(config)
}

fn display_width(config: &AppConfig, cli_width: Option<usize>) -> usize {
    cli_width
        .or(config.display.width)
        .or_else(|| std::env::var("COLUMNS").ok().and_then(|c| c.parse().ok()))
        .unwrap_or(config::DEFAULT_DISPLAY_WIDTH)
}

fn open_memory(config: &AppConfig, mock: bool) -> anyhow::Result<Box<dyn TargetMemory>> {
    if mock {
        tracing::info!("Using in-memory mock target");
        return Ok(Box::new(MockMemory::new()));
    }
    let mut probe = ProbeMemory::new(config.probe.clone());
    probe.connect().context("Failed to connect to the target")?;
    Ok(Box::new(probe))
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let _guard = init_logging(&config.log)?;

    let store = WatchListStore::new(cli.watch_list.clone().unwrap_or_else(|| config.watch_list.clone()));
    let palette = if config.display.color && std::io::stdout().is_terminal() {
        Palette::ansi()
    } else {
        Palette::plain()
    };
    let mut session = WatchSession::new(store)
        .with_base(config.display.default_base)
        .with_show_changes(config.display.show_changes)
        .with_palette(palette);

    match cli.command {
        Command::Init { catalog, force } => {
            if session.store().exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    session.store().path().display()
                );
            }
            session.store().create(&catalog)?;
            println!("Created {} for {}", session.store().path().display(), catalog);
        }
        Command::Add { name, alias } => {
            let entry = session.add_entry(&name, alias.as_deref())?;
            println!("Watching {} as {}", entry.name, entry.display_name());
        }
        Command::Remove { key } => {
            session.remove_entry(&key)?;
            println!("Removed {}", key);
        }
        Command::Show { base, width } => {
            if let Some(base) = base {
                session = session.with_base(base);
            }
            let mut memory = open_memory(&config, cli.mock)?;
            for line in session.render(display_width(&config, width), memory.as_mut())? {
                println!("{}", line);
            }
        }
        Command::Watch {
            base,
            width,
            interval_ms,
            count,
        } => {
            if let Some(base) = base {
                session = session.with_base(base);
            }
            let mut memory = open_memory(&config, cli.mock)?;
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.display.refresh_interval_ms));
            let width = display_width(&config, width);
            watch(&mut session, memory.as_mut(), width, interval, count)?;
        }
        Command::Set { alias, value } => {
            let value = parse_integer(&value)?;
            let mut memory = open_memory(&config, cli.mock)?;
            let word = session.set_value(&alias, value, memory.as_mut())?;
            println!("{} <- 0x{:08x}", alias, word);
        }
        Command::Tree { peripheral } => {
            for line in session.render_catalog_tree(peripheral.as_deref())? {
                println!("{}", line);
            }
        }
        Command::Select { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            for outcome in session.select(&names)? {
                println!("{}", outcome);
            }
        }
        Command::Alias { name, alias } => {
            session.set_alias(&name, alias.as_deref().unwrap_or(""))?;
            match alias {
                Some(alias) => println!("{} is now shown as {}", name, alias),
                None => println!("Cleared alias of {}", name),
            }
        }
        Command::Probes => {
            let probes = ProbeMemory::list_probes();
            if probes.is_empty() {
                println!("No debug probes found");
            }
            for (i, probe) in probes.iter().enumerate() {
                println!("{}: {}", i, probe);
            }
        }
    }
    Ok(())
}

/// Spawn a thread forwarding stdin lines until EOF
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// One refresh; a failed refresh becomes a one-line message so the loop
/// keeps polling until the watch-list is fixed
fn draw_frame(session: &mut WatchSession, memory: &mut dyn TargetMemory, width: usize) -> Vec<String> {
    match session.render(width, memory) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!("Refresh failed: {}", e);
            vec![format!("error: {}", e)]
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

fn watch(
    session: &mut WatchSession,
    memory: &mut dyn TargetMemory,
    width: usize,
    interval: Duration,
    count: Option<usize>,
) -> anyhow::Result<()> {
    let commands = spawn_stdin_reader();
    let interactive = std::io::stdout().is_terminal();
    let mut refreshes = 0usize;
    let mut status = String::new();

    loop {
        let lines = draw_frame(session, memory, width);
        let mut out = std::io::stdout().lock();
        if interactive {
            // Clear screen, cursor home
            write!(out, "\x1b[2J\x1b[H")?;
        }
        for line in &lines {
            writeln!(out, "{}", line)?;
        }
        if !status.is_empty() {
            writeln!(out, "{}", status)?;
        }
        out.flush()?;
        drop(out);

        refreshes += 1;
        if count.is_some_and(|n| refreshes >= n) {
            return Ok(());
        }

        match commands.recv_timeout(interval) {
            Ok(line) => match handle_command(session, memory, line.trim()) {
                Ok((Flow::Quit, _)) => return Ok(()),
                Ok((Flow::Continue, message)) => status = message,
                Err(e) => status = format!("error: {:#}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed: keep refreshing on the timer alone
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(interval),
        }
    }
}

fn handle_command(
    session: &mut WatchSession,
    memory: &mut dyn TargetMemory,
    line: &str,
) -> anyhow::Result<(Flow, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let message = match tokens.as_slice() {
        [] => String::new(),
        ["q" | "quit" | "exit"] => return Ok((Flow::Quit, String::new())),
        ["changes"] => {
            let on = session.toggle_show_changes();
            format!("change log {}", if on { "on" } else { "off" })
        }
        ["set", alias, value] => {
            let word = session.set_value(alias, parse_integer(value)?, memory)?;
            format!("{} <- 0x{:08x}", alias, word)
        }
        ["add", name] => format!("watching {}", session.add_entry(name, None)?.display_name()),
        ["add", name, alias] => {
            format!("watching {}", session.add_entry(name, Some(*alias))?.display_name())
        }
        ["remove", key] => {
            session.remove_entry(key)?;
            format!("removed {}", key)
        }
        [base] => match NumericBase::from_str(base) {
            Ok(base) => {
                session.set_base(base);
                format!("base {}", base)
            }
            Err(_) => bail!("unknown command '{}'", line),
        },
        _ => bail!("unknown command '{}'", line),
    };
    Ok((Flow::Continue, message))
}
