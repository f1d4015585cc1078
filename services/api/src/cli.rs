use crate::quote::{run_options, run_quote, run_settings, OptionsArgs, QuoteArgs, SettingsAction};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lease_quote::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lease Quote",
    about = "Price lease-financing quotes and manage their settings from the command line",
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
    /// Price a single lease and print the installment plan
    Quote(QuoteArgs),
    /// List down-payment ratios and the lease terms allowed for one of them
    Options(OptionsArgs),
    /// Inspect, export, import or reset the pricing settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
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

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Quote(args) => run_quote(args),
        Command::Options(args) => run_options(args),
        Command::Settings { action } => run_settings(action),
    }
}
