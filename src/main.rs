//! polyglot-check CLI - verify a polyglot runtime and install missing languages

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use polyglot_check::{
    error_code, find_install_root, CapabilityProbe, Engine, EngineOptions, InstallState, Language,
    Snapshot,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "polyglot-check", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Probe an installation and report its status
    Probe {
        /// Installation root; discovered from the environment when omitted
        path: Option<PathBuf>,

        /// Print the capabilities as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the component installer for a language
    Install {
        /// Installation root
        path: PathBuf,

        /// Language id: js, ruby, R or python
        #[arg(value_parser = parse_language)]
        language: Language,
    },
}

fn parse_language(id: &str) -> Result<Language, String> {
    Language::from_id(id).ok_or_else(|| {
        let known: Vec<&str> = Language::all().map(|lang| lang.id()).collect();
        format!("unknown language '{}', expected one of {}", id, known.join(", "))
    })
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("polyglot_check=debug")
    } else {
        EnvFilter::new("polyglot_check=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { path, json } => probe(path, json).await,
        Commands::Install { path, language } => install(path, language).await,
    }
}

async fn probe(path: Option<PathBuf>, json: bool) -> Result<i32> {
    let options = EngineOptions::default();
    let root = match path {
        Some(path) => path,
        None => find_install_root(&options.layout).with_context(|| {
            format!(
                "no installation found; set GRAALVM_HOME or put bin/{} on PATH",
                options.layout.launcher
            )
        })?,
    };

    let caps = CapabilityProbe::new(&options).probe(&root).await;
    let status = error_code(&options.layout, Some(&root), Some(&caps));

    if json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
    } else {
        println!("Installation: {}", root.display());
        if let Some(error) = &caps.launcher_error {
            println!("Launcher error: {}", error);
        }
        println!(
            "Host interop: {}",
            caps.embedded_host_type_name.as_deref().unwrap_or("-")
        );
        println!(
            "Worker threads: {}",
            caps.worker_threads_type_name.as_deref().unwrap_or("-")
        );
        for lang in Language::all() {
            let mark = if caps.is_available(lang) { "yes" } else { "no" };
            println!("  {:<12} {}", lang.display_name(), mark);
        }
    }
    println!("Status {}: {}", status.code(), status.description());

    Ok(status.code())
}

async fn install(path: PathBuf, language: Language) -> Result<i32> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Engine::start(EngineOptions::default(), move |snapshot: &Snapshot| {
        let _ = tx.send(snapshot.clone());
    });

    engine.set_install_path(&path);
    if !engine.request_install(language) {
        bail!("background lane is not running");
    }

    let mut printed = String::new();
    let mut outcome = InstallState::Idle;
    while let Some(snapshot) = rx.recv().await {
        print_progress(&snapshot.process_output, &mut printed)?;
        match snapshot.install {
            InstallState::Idle | InstallState::Running { .. } => {}
            finished => {
                outcome = finished;
                break;
            }
        }
    }
    println!();

    let status = engine.status();
    engine.shutdown().await?;

    match outcome {
        InstallState::Succeeded { language } => {
            println!("{} installed", language.display_name());
            println!("Status {}: {}", status.code(), status.description());
            Ok(0)
        }
        InstallState::Failed { error, .. } => {
            bail!("{}\n  fix: {}", error, error.fix_suggestion())
        }
        other => bail!("{}", other.description()),
    }
}

fn print_progress(text: &str, printed: &mut String) -> Result<()> {
    let update = progress_update(printed, text);
    if !update.is_empty() {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{}", update)?;
        stdout.flush()?;
    }
    printed.clear();
    printed.push_str(text);
    Ok(())
}

/// Terminal output that turns a screen showing `previous` into `current`.
///
/// Appended text is written as is. When the installer redrew part of its
/// output, the cursor returns to the start of the line holding the first
/// changed character and the line is rewritten; leftovers of a longer old
/// line are blanked.
fn progress_update(previous: &str, current: &str) -> String {
    if let Some(appended) = current.strip_prefix(previous) {
        return appended.to_string();
    }

    let common = previous
        .char_indices()
        .zip(current.chars())
        .take_while(|((_, old), new)| old == new)
        .last()
        .map_or(0, |((i, c), _)| i + c.len_utf8());
    let line_start = current[..common].rfind('\n').map_or(0, |i| i + 1);

    let old_line = previous[line_start..].split('\n').next().unwrap_or("");
    let new_tail = &current[line_start..];
    let new_line = new_tail.split('\n').next().unwrap_or("");

    let mut update = format!("\r{}", new_tail);
    let leftover = old_line.chars().count().saturating_sub(new_line.chars().count());
    if leftover > 0 && !new_tail.contains('\n') {
        update.push_str(&" ".repeat(leftover));
        update.push_str(&"\u{8}".repeat(leftover));
    }
    update
}
