use crate::demo::{run_demo, run_sweep, DemoArgs, SweepArgs};
use crate::server;
use care_visit::config::ServerConfig;
use care_visit::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Care Visit Service",
    about = "Run the care visit verification service or its batch jobs from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Mark overdue shifts from a roster export as missed and print the sweep report
    Sweep(SweepArgs),
    /// Walk through a full visit day: check-in, vitals, sweep, and compliance scan
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

impl ServeArgs {
    /// Applies command-line overrides on top of the loaded server settings.
    pub(crate) fn apply_to(self, server: &mut ServerConfig) {
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sweep(args) => run_sweep(args),
        Command::Demo(args) => run_demo(args),
    }
}
