//! Shellquest CLI - Play shell adventures in a terminal
//!
//! Usage:
//!   shellquest                          # Play the bundled adventure
//!   shellquest --adventure quest.json   # Play an adventure file
//!   shellquest -c 'ls -la'              # Run one line and exit

mod render;
#[cfg(feature = "interactive")]
mod repl;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use shellquest::{Adventure, MemoryProgressStore, ProgressStore, Shell, ShellConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use store::JsonDirStore;

const BUNDLED_ADVENTURE: &str = include_str!("../adventures/first-steps.json");

/// Shellquest - Learn the Unix shell through missions
#[derive(Parser, Debug)]
#[command(name = "shellquest")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Adventure definition (JSON). Defaults to the bundled first-steps adventure
    #[arg(long)]
    adventure: Option<PathBuf>,

    /// Learner account name
    #[arg(long, default_value = shellquest::config::DEFAULT_USERNAME)]
    user: String,

    /// Directory to save progress in. Without it progress lasts one run
    #[arg(long)]
    progress_dir: Option<PathBuf>,

    /// Discard saved progress and start over
    #[arg(long)]
    fresh: bool,

    /// Run the given command line and exit
    #[arg(short = 'c')]
    command: Option<String>,

    /// Log session events to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let adventure = load_adventure(args.adventure.as_deref())?;
    let store: Arc<dyn ProgressStore> = match &args.progress_dir {
        Some(dir) => Arc::new(JsonDirStore::new(dir)),
        None => Arc::new(MemoryProgressStore::new()),
    };

    let mut shell = Shell::builder()
        .adventure(adventure)
        .config(ShellConfig::new().username(&args.user))
        .store(store)
        .build()
        .await
        .context("Failed to start adventure")?;

    let saved = if args.fresh {
        shell
            .reset_exercise()
            .await
            .context("Failed to clear saved progress")?;
        None
    } else {
        shell
            .saved_progress()
            .context("Failed to load saved progress")?
    };

    if let Some(cmd) = args.command {
        if let Some(saved) = saved {
            shell.resume(saved);
        }
        let outcome = shell.submit(&cmd).await;
        let exit_code = outcome.result.exit_code;
        render::drive(&mut shell, outcome, &mut |_, _, _| None).await;
        std::process::exit(exit_code);
    }

    #[cfg(feature = "interactive")]
    return repl::run(&mut shell, saved).await;

    #[cfg(not(feature = "interactive"))]
    {
        let _ = saved;
        eprintln!("shellquest: interactive mode requires the 'interactive' feature; use -c");
        std::process::exit(2)
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("shellquest=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_adventure(path: Option<&Path>) -> Result<Adventure> {
    let Some(path) = path else {
        return Adventure::from_json(BUNDLED_ADVENTURE).context("Bundled adventure is invalid");
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read adventure: {}", path.display()))?;
    Adventure::from_json(&json)
        .with_context(|| format!("Invalid adventure: {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_adventure_is_valid() {
        let adventure = load_adventure(None).unwrap();
        adventure.check().unwrap();
        assert_eq!(adventure.id, "first-steps");
        assert!(!adventure.missions.is_empty());
    }

    #[test]
    fn test_missing_adventure_file() {
        let err = load_adventure(Some(Path::new("/nonexistent/quest.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read adventure"));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["shellquest", "--user", "ada", "-c", "pwd", "--fresh"]);
        assert_eq!(args.user, "ada");
        assert_eq!(args.command.as_deref(), Some("pwd"));
        assert!(args.fresh);
        assert!(args.progress_dir.is_none());
    }

    #[tokio::test]
    async fn test_progress_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        let start = || async move {
            Shell::builder()
                .adventure(load_adventure(None).unwrap())
                .store(Arc::new(JsonDirStore::new(path)))
                .build()
                .await
                .unwrap()
        };

        let mut shell = start().await;
        let outcome = shell.submit("pwd").await;
        assert!(!outcome.events.is_empty());

        let shell = start().await;
        let saved = shell.saved_progress().unwrap().unwrap();
        assert!(saved.completed_tasks.contains(&"where-am-i".to_string()));
    }
}
