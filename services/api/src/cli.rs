use crate::server;
use clap::{Args, Parser, Subcommand};
use mortgage_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Mortgage Intake",
    about = "Serve the mortgage application intake store over HTTP",
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
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured store backend (`mongo` or `memory`)
    #[arg(long)]
    pub(crate) store: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "mortgage-intake-api",
            "serve",
            "--port",
            "9090",
            "--store",
            "memory",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(9090));
                assert_eq!(args.store.as_deref(), Some("memory"));
                assert!(args.host.is_none());
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["mortgage-intake-api"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
