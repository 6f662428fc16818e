use crate::commands::{run_check, run_score, CheckArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use psychoscales::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "psychoscales",
    about = "Serve, validate and score psychological self-assessment scales",
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
    /// Operator tooling for scale definition files
    Scales {
        #[command(subcommand)]
        command: ScalesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ScalesCommand {
    /// Validate every scale in a directory and report rejected files
    Check(CheckArgs),
    /// Score one scale file against a JSON object of answers
    Score(ScoreArgs),
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
        Command::Scales {
            command: ScalesCommand::Check(args),
        } => run_check(args),
        Command::Scales {
            command: ScalesCommand::Score(args),
        } => run_score(args),
    }
}
