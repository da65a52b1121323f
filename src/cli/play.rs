//! Interactive player mode
//!
//! Runs a script in the terminal: a tokio loop interleaves reveal ticks with
//! lines typed on stdin and hands both to a [`PlayerSession`].

use crate::cli::render;
use crate::config::EngineOptions;
use crate::player::{Control, HELP, PlayerSession};
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, Persistence};
use crate::types::state::AdvanceMode;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};

/// Interval between reveal ticks
const TICK: Duration = Duration::from_millis(16);

/// Options of the `play` command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayArgs {
    pub script: PathBuf,
    pub auto: bool,
    pub debug: bool,
    pub speed_ms: Option<u64>,
    pub save: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Forget saved progress before playing
    pub fresh: bool,
}

impl PlayArgs {
    /// Parse the arguments following `play`
    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut parsed = PlayArgs::default();
        let mut script = None;
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--auto" => parsed.auto = true,
                "--debug" => parsed.debug = true,
                "--fresh" => parsed.fresh = true,
                "--speed" => {
                    let value = iter.next().context("--speed needs a value in milliseconds")?;
                    let speed = value
                        .parse()
                        .with_context(|| format!("Invalid --speed value '{value}'"))?;
                    parsed.speed_ms = Some(speed);
                }
                "--save" => {
                    let value = iter.next().context("--save needs a file path")?;
                    parsed.save = Some(PathBuf::from(value));
                }
                "--config" => {
                    let value = iter.next().context("--config needs a file path")?;
                    parsed.config = Some(PathBuf::from(value));
                }
                flag if flag.starts_with("--") => anyhow::bail!("Unknown option '{flag}'"),
                path => {
                    if script.is_some() {
                        anyhow::bail!("Unexpected argument '{path}'");
                    }
                    script = Some(PathBuf::from(path));
                }
            }
        }

        parsed.script = script.context("Missing script file path")?;
        Ok(parsed)
    }

    /// Engine options from the config file with flags applied on top
    pub fn engine_options(&self) -> anyhow::Result<EngineOptions> {
        let mut options = match &self.config {
            Some(path) => EngineOptions::from_json_file(path)?,
            None => EngineOptions::default(),
        };
        if self.auto {
            options.mode = AdvanceMode::Auto;
        }
        if let Some(speed) = self.speed_ms {
            options.typing_speed_ms = speed;
        }
        Ok(options)
    }
}

/// Run the player. Returns `false` when the script could not be loaded.
pub async fn run_play(args: &PlayArgs) -> anyhow::Result<bool> {
    let source = tokio::fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("Failed to read script file {}", args.script.display()))?;
    let options = args.engine_options()?;

    match &args.save {
        Some(path) => match JsonFileStore::open(path) {
            Ok(store) => drive(&source, options, store, args).await,
            Err(err) => {
                log::warn!("save file unusable, progress will not be kept: {}", err);
                eprintln!("Warning: {} ({})", err, path.display());
                drive(&source, options, MemoryStore::new(), args).await
            }
        },
        None => drive(&source, options, MemoryStore::new(), args).await,
    }
}

async fn drive<S: KeyValueStore>(
    source: &str,
    options: EngineOptions,
    store: S,
    args: &PlayArgs,
) -> anyhow::Result<bool> {
    let store = if args.fresh {
        let mut persistence = Persistence::new(store, options.storage_prefix.clone());
        persistence.clear();
        persistence.into_store()
    } else {
        store
    };

    let mut session = PlayerSession::new(source, options, store, args.debug);
    if session.error().is_none() {
        print_banner(&args.script);
    }
    session.start();
    render(session.drain())?;
    if session.error().is_some() {
        return Ok(false);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    while !session.is_completed() {
        tokio::select! {
            now = interval.tick() => {
                session.tick(now.duration_since(last));
                last = now;
            }
            line = lines.next_line() => {
                match line.context("Failed to read from stdin")? {
                    Some(line) => {
                        if session.input(&line) == Control::Quit {
                            render(session.drain())?;
                            println!("Goodbye!");
                            return Ok(true);
                        }
                    }
                    // stdin closed
                    None => break,
                }
            }
        }
        render(session.drain())?;
    }

    render(session.drain())?;
    Ok(true)
}

fn print_banner(script: &Path) {
    println!("=== terminal-vn: {} ===", script.display());
    println!();
    print!("{HELP}");
    println!();
}
