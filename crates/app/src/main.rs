//! Enrol - join-code enrollment server
//!
//! Runs the join server, or issues and rotates section codes for operators.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use enrol_net::JoinServer;

mod state;

use state::{load_config, AppState};

/// enrol - join-code enrollment server
#[derive(Parser, Debug)]
#[command(name = "enrol")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "ENROL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the join server until interrupted (default)
    Serve,

    /// Print a section's member code, issuing one if needed
    MemberCode {
        /// Section ID
        section_id: Uuid,
    },

    /// Replace a section's member code and print the new one
    RotateMemberCode {
        /// Section ID
        section_id: Uuid,
    },

    /// Replace a section's supervisor code and print it (shown only once)
    RotateSupervisorCode {
        /// Section ID
        section_id: Uuid,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("enrol: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;
    let state = AppState::new(config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&state),
        Commands::MemberCode { section_id } => {
            println!("{}", state.registry().ensure_member_code(section_id)?);
            Ok(())
        }
        Commands::RotateMemberCode { section_id } => {
            println!("{}", state.registry().rotate_member_code(section_id)?);
            Ok(())
        }
        Commands::RotateSupervisorCode { section_id } => {
            println!("{}", state.registry().rotate_supervisor_code(section_id)?);
            Ok(())
        }
    }
}

fn serve(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting Enrol");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = JoinServer::start(state.config.server.bind, state.server_context()).await?;
        tracing::info!(addr = %server.addr(), "Accepting joins");

        tokio::signal::ctrl_c().await?;
        server.shutdown();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
