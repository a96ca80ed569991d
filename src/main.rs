use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use kubeseq::cli::apply::ApplyArgs;
use kubeseq::cli::plan::PlanArgs;
use kubeseq::Result;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kubeseq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Apply Kubernetes manifests in ordered, stabilized phases", long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,

    // Running without a subcommand is the same as `kubeseq apply`
    #[command(flatten)]
    apply: ApplyArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every phase in order (the default)
    Apply(ApplyArgs),

    /// Show the deployment plan without applying anything
    Plan(PlanArgs),

    /// Write a default kubeseq.toml
    Init {
        /// Where to write the config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kubeseq={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Error: failed to create tokio runtime: {}", e).red());
            std::process::exit(1);
        }
    };

    match runtime.block_on(run_async(cli)) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", format!("Error: {:#}", e).red());
            std::process::exit(1);
        }
    }
}

async fn run_async(cli: Cli) -> Result<i32> {
    match cli.command {
        None => kubeseq::cli::apply::run(cli.apply).await,

        Some(Commands::Apply(args)) => kubeseq::cli::apply::run(args).await,

        Some(Commands::Plan(args)) => {
            kubeseq::cli::plan::run(args)?;
            Ok(0)
        }

        Some(Commands::Init { config, force }) => {
            kubeseq::cli::init::run(config.as_deref(), force)?;
            Ok(0)
        }

        Some(Commands::Completions { shell }) => {
            generate(shell, &mut Cli::command(), "kubeseq", &mut io::stdout());
            Ok(0)
        }
    }
}
