use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use chcc::{
    commands,
    environment::{Propagator, Shell},
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "chcc")]
#[command(about = "CHCC - API Site Configuration Manager")]
#[command(
    long_about = "Manage API endpoint profiles (name, base URL, token) and export the default one \
                  as ANTHROPIC_BASE_URL / ANTHROPIC_AUTH_TOKEN."
)]
#[command(version)]
struct Cli {
    /// Use this config file instead of ~/.chcc.yaml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_enum, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all profiles and the default one (default action)
    List,

    /// Add a new profile or update an existing one
    Add {
        /// Profile name
        #[arg(short, long)]
        name: String,

        /// Base URL of the API endpoint
        #[arg(short, long)]
        url: String,

        /// Access token (prompted for when omitted)
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Set the default profile and export it to your environment
    #[command(alias = "use")]
    SetDefault {
        /// Profile name (pick interactively when omitted)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Remove a profile
    #[command(alias = "rm")]
    Remove {
        /// Profile name
        #[arg(short, long)]
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show the default profile and whether this shell exports it
    Current,

    /// Print commands that export the default profile, e.g. eval "$(chcc env)"
    Env {
        /// Shell syntax: posix, cmd, powershell
        #[arg(long, value_name = "SHELL")]
        shell: Option<Shell>,
    },

    /// Run diagnostics on the chcc setup
    Doctor,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ui = Ui::new(cli.color, cli.no_color);

    // `completions` must work even where no home directory exists
    let config = cli.config;
    let resolve = || -> Result<(Paths, Propagator)> {
        let paths = Paths::resolve(config.clone())?;
        let propagator = Propagator::for_current_platform(paths.home.clone());
        Ok((paths, propagator))
    };

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => commands::list(&resolve()?.0, &ui),
        Commands::Add { name, url, token } => {
            commands::add(&resolve()?.0, &name, &url, token, &ui)
        }
        Commands::SetDefault { name } => {
            let (paths, propagator) = resolve()?;
            commands::set_default(&paths, name.as_deref(), &ui, &propagator)
        }
        Commands::Remove { name, force } => {
            let (paths, propagator) = resolve()?;
            commands::remove(&paths, &name, force, &ui, &propagator)
        }
        Commands::Current => commands::current(&resolve()?.0, &ui),
        Commands::Env { shell } => commands::env(&resolve()?.0, shell, &ui),
        Commands::Doctor => {
            let (paths, propagator) = resolve()?;
            commands::doctor(&paths, &ui, &propagator)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "chcc", &mut std::io::stdout());
            Ok(())
        }
    }
}
