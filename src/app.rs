//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to the command handlers.

use crate::commands::{self, RunOptions};
use crate::config::VisualizationType;
use crate::logging;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;

/// A live audio spectrum line plot for the terminal
#[derive(Parser)]
#[command(name = "specline")]
#[command(version)]
#[command(about = "A live audio spectrum line plot for the terminal")]
#[command(long_about = "A live audio spectrum line plot for the terminal.\n\nDEFAULT COMMAND:\n    If no command is specified, 'run' is used by default.\n    Run options (--device, --fft-size, ...) can be used without explicitly saying 'run'.\n\nEXAMPLES:\n    # Plot the default input device\n    $ specline\n\n    # Plot device #2 with a finer FFT\n    $ specline --device 2 --fft-size 4096\n\n    # Show the waveform instead of the spectrum\n    $ specline --visualization waveform\n\n    # Try the view without any audio input\n    $ specline --preview")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/specline/specline.toml\n    Logs:               ~/.local/state/specline/specline.log.*"
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Input device: "default", an ID, or a name from list-devices
    #[arg(short, long, value_name = "DEVICE", global = true)]
    device: Option<String>,

    /// FFT size in samples (power of two, at least 16)
    #[arg(short, long, value_name = "N", global = true)]
    fft_size: Option<usize>,

    /// Plot to show
    #[arg(short, long, value_enum, global = true)]
    visualization: Option<VisualizationType>,

    /// Show the placeholder plot without opening an input device
    #[arg(long, global = true)]
    preview: bool,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        Self {
            device: args.device,
            fft_size: args.fft_size,
            visualization: args.visualization,
            preview: args.preview,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live plot (default)
    ///
    /// Press Space to freeze or unfreeze the plot, Escape/q to quit.
    #[command(visible_alias = "r")]
    Run,

    /// Open configuration file in your preferred editor
    ///
    /// Writes the default configuration first if none exists.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in specline.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   specline completions bash > specline.bash
    ///   specline completions zsh > _specline
    ///   specline completions fish > specline.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that print to the terminal and need no log file
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "specline", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return commands::handle_list_devices(),
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Run) => commands::handle_run(cli.run.into())?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
