mod commands;
mod terminal;

use commands::{CommandLine, Commands, check, icmp, tcp};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.quiet);

    match commands.command {
        Commands::Icmp { scan, concurrency } => {
            print::header("icmp sweep", commands.quiet);
            icmp::icmp(scan, concurrency).await
        }
        Commands::Tcp { scan, sport, dport } => {
            print::header("tcp syn sweep", commands.quiet);
            tcp::tcp(scan, sport, dport).await
        }
        Commands::Check {
            targets,
            port,
            timeout_ms,
            concurrency,
        } => {
            print::header("service check", commands.quiet);
            check::check(targets, port, timeout_ms, concurrency).await
        }
    }
}
