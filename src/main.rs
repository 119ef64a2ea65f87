use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use keyscribe::console::{print_console_line, ConsoleCommand, ConsoleReporter};
use keyscribe::control::ControlPort;
use keyscribe::diff::compute_script;
use keyscribe::events::Outcome;
use keyscribe::inject::{open_injector, resolve_backend, InjectBackend};
use keyscribe::keyboard::{find_first_unsupported_char, normalize_line_endings};
use keyscribe::model::{DeleteStrategy, SessionConfig, SessionKind, TypeMode};
use keyscribe::session::{Controller, Launch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    X11,
    DryRun,
}

impl BackendArg {
    fn to_library(self) -> InjectBackend {
        match self {
            BackendArg::Auto => InjectBackend::Auto,
            BackendArg::X11 => InjectBackend::X11,
            BackendArg::DryRun => InjectBackend::DryRun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Human pacing, pauses and typos.
    Human,
    /// Everything at once, no delays.
    Bot,
}

impl ModeArg {
    fn to_library(self) -> TypeMode {
        match self {
            ModeArg::Human => TypeMode::Human,
            ModeArg::Bot => TypeMode::Bot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeleteStrategyArg {
    /// Shift+Right over the text, then one Delete.
    Select,
    /// One Delete per character.
    PerChar,
}

impl DeleteStrategyArg {
    fn to_library(self) -> DeleteStrategy {
        match self {
            DeleteStrategyArg::Select => DeleteStrategy::Select,
            DeleteStrategyArg::PerChar => DeleteStrategy::PerChar,
        }
    }
}

/// Typing settings. Flags override values from `--config`.
#[derive(Debug, Args, Clone)]
struct TypingArgs {
    /// JSON settings file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Target speed in words per minute (default 65)
    #[arg(long)]
    wpm: Option<u32>,

    /// Delay jitter, 0.0-1.0 (default 0.5)
    #[arg(long)]
    variability: Option<f64>,

    /// Chance of a typo per letter, in percent, 0-50 (default 0)
    #[arg(long)]
    typo_rate: Option<f64>,

    /// Countdown seconds before typing starts (default 3)
    #[arg(long)]
    countdown: Option<u64>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Character offset to start from
    #[arg(long)]
    start_offset: Option<usize>,

    /// How Human mode deletes text when replacing
    #[arg(long, value_enum)]
    delete_strategy: Option<DeleteStrategyArg>,
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    /// Keystroke backend.
    ///
    /// - auto: choose a backend based on the runtime environment
    /// - x11: force X11 (XTEST)
    /// - dry-run: type into an in-memory editor and print the result
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Optional RNG seed (for debugging)
    #[arg(long)]
    seed: Option<u64>,

    /// Disable console event output
    #[arg(long)]
    no_trace: bool,
}

#[derive(Debug, Parser)]
#[command(name = "keyscribe")]
#[command(about = "Types text into the focused window with human-like timing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Type a text at the caret
    Type {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        #[command(flatten)]
        typing: TypingArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Rewrite the text after the caret into a new version
    Replace {
        /// Text currently in the editor, starting at the caret
        #[arg(long, value_name = "PATH")]
        original: PathBuf,

        /// Text it should become
        #[arg(long, value_name = "PATH")]
        replacement: PathBuf,

        #[command(flatten)]
        typing: TypingArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the edit script between two texts (JSON)
    Diff {
        #[arg(long, value_name = "PATH")]
        original: PathBuf,

        #[arg(long, value_name = "PATH")]
        replacement: PathBuf,
    },
}

fn read_input(path: &Path) -> Result<String> {
    let text = if path.as_os_str() == std::ffi::OsStr::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    Ok(normalize_line_endings(&text))
}

fn load_config(path: &Path) -> Result<SessionConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn build_config(
    kind: SessionKind,
    original: String,
    replacement: String,
    args: &TypingArgs,
) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::default(),
    };
    config.kind = kind;
    config.original_text = original;
    config.replacement_text = replacement;

    let options = &mut config.options;
    if let Some(wpm) = args.wpm {
        options.speed = wpm;
    }
    if let Some(variability) = args.variability {
        options.variability = variability;
    }
    if let Some(rate) = args.typo_rate {
        options.typo_rate_percent = rate;
    }
    if let Some(countdown) = args.countdown {
        options.start_delay_secs = countdown;
    }
    if let Some(mode) = args.mode {
        options.mode = mode.to_library();
    }
    if let Some(offset) = args.start_offset {
        config.start_offset = offset;
    }
    if let Some(strategy) = args.delete_strategy {
        config.delete_strategy = strategy.to_library();
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("KEYSCRIBE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn spawn_stdin_commands(port: ControlPort) -> Result<()> {
    thread::Builder::new()
        .name("keyscribe-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleCommand::parse(&line) {
                    Some(command) => eprintln!("{}", command.apply(&port)),
                    None => eprintln!("Unknown command {line:?} (p, s, j N, q)"),
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

fn run_session(config: SessionConfig, run: &RunArgs, read_stdin: bool) -> Result<()> {
    // Fail fast on unsupported environments/backends.
    let backend = resolve_backend(run.backend.to_library())?;
    let (document, typed) = match config.kind {
        SessionKind::Fresh => ("", config.original_text.as_str()),
        SessionKind::Replace => (
            config.original_text.as_str(),
            config.replacement_text.as_str(),
        ),
    };
    if backend == InjectBackend::X11 {
        if let Some((idx, c)) = find_first_unsupported_char(typed) {
            return Err(anyhow!(
                "character {c:?} at offset {idx} cannot be typed with the US keyboard layout"
            ));
        }
    }
    let (injector, dry_run) = open_injector(backend, document)?;

    let mut launch = Launch::default();
    if let Some(seed) = run.seed {
        launch = launch.seed(seed);
    }

    let controller = Controller::new();
    let handle = controller.start_with(config, injector, launch)?;

    let stop_port = handle.control().clone();
    ctrlc::set_handler(move || stop_port.request_stop())
        .context("failed to install Ctrl+C handler")?;
    if read_stdin {
        spawn_stdin_commands(handle.control().clone())?;
        eprintln!("Commands: p = pause/resume, s = skip, j N = jump, q = stop");
    }

    let mut reporter = ConsoleReporter::new();
    let trace = !run.no_trace;
    let outcome = handle.wait(|event| {
        if !trace {
            return;
        }
        if let Some(line) = reporter.line_for(event) {
            print_console_line(&line);
        }
    });

    if let Some(editor) = dry_run {
        println!("{}", editor.text());
    }

    match outcome {
        Outcome::Completed | Outcome::NoChanges | Outcome::Stopped => Ok(()),
        Outcome::Errored(message) => Err(anyhow!(message)),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Type { input, typing, run } => {
            let text = read_input(&input)?;
            let config = build_config(SessionKind::Fresh, text, String::new(), &typing)?;
            let read_stdin = input.as_os_str() != std::ffi::OsStr::new("-");
            run_session(config, &run, read_stdin)?;
        }
        Command::Replace {
            original,
            replacement,
            typing,
            run,
        } => {
            let original = read_input(&original)?;
            let replacement = read_input(&replacement)?;
            let config = build_config(SessionKind::Replace, original, replacement, &typing)?;
            run_session(config, &run, true)?;
        }
        Command::Diff {
            original,
            replacement,
        } => {
            let original = read_input(&original)?;
            let replacement = read_input(&replacement)?;
            let script = compute_script(&original, &replacement);
            let json =
                serde_json::to_string_pretty(&script).context("failed to serialize edit script")?;
            println!("{json}");
        }
    }

    Ok(())
}
