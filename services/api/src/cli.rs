use crate::demo::{run_demo, run_policy_check, DemoArgs, PolicyCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use propad::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "PropAd",
    about = "Run the PropAd marketplace API or exercise its listing policy and reward ledger",
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
    /// Inspect the listing language policy
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Walk through listing moderation and reward payouts against an in-memory marketplace
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Evaluate text against the configured block and flag lists
    Check(PolicyCheckArgs),
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
        Command::Policy {
            command: PolicyCommand::Check(args),
        } => run_policy_check(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["propad-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_policy_check_text() {
        let cli = Cli::try_parse_from(["propad-api", "policy", "check", "No viewing fee", "--json"])
            .expect("parses");
        match cli.command {
            Some(Command::Policy {
                command: PolicyCommand::Check(args),
            }) => {
                assert_eq!(args.text, "No viewing fee");
                assert!(args.json);
            }
            other => panic!("expected policy check, got {other:?}"),
        }
    }

    #[test]
    fn demo_amounts_must_be_decimal() {
        assert!(Cli::try_parse_from(["propad-api", "demo", "--pool", "abc"]).is_err());
        let cli = Cli::try_parse_from(["propad-api", "demo", "--pool", "120.50"]).expect("parses");
        match cli.command {
            Some(Command::Demo(args)) => assert_eq!(args.pool.cents(), 12_050),
            other => panic!("expected demo, got {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "propad-api",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
                assert_eq!(args.port, Some(8080));
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }
}
