use std::path::PathBuf;

use clap::{ Parser, arg, command, Subcommand, Args };
use tracing::{ info, error };
use anyhow::{ Result, Error, anyhow };

use crate::report::ReportFormat;
use crate::runner::{ ScanOpt, ScanRunner };

mod logger;
mod utils;
mod error;
mod observation;
mod ip_list;
mod blocklist;
mod reputation;
mod scanner;
mod aggregate;
mod runner;
mod report;

const IPSUM_LEVELS_URL: &str = "https://raw.githubusercontent.com/stamparm/ipsum/master/levels";
const ABUSEIPDB_CHECK_URL: &str = "https://api.abuseipdb.com/api/v2/check";

#[derive(Parser)]
#[command(
    version,
    about = "Repscan IP reputation scanner",
    long_about = "Repscan IP reputation scanner\n\n\
    Repscan checks a list of IP addresses against the IPsum tiered blocklist,\n\
    escalating through levels 1-8, or runs a single AbuseIPDB pass when an\n\
    API key is supplied, and writes the merged per-address results to a\n\
    text or CSV report."
)]
struct Cli {
    #[command(subcommand)]
    subcommand: SubCommands,
    /// Increase logging verbosity
    #[arg(short('v'), long, action = clap::ArgAction::Count)]
    verbosity: u8,
    /// Emit log lines as JSON
    #[arg(short('j'), long = "json", default_value_t = false)]
    use_json: bool,
}

#[derive(Subcommand)]
pub enum SubCommands {
    #[command(
        about = "Scan a list of IP addresses against reputation sources",
        name = "scan"
    )] ScanCommand(ScanArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// File containing one IP address per line
    #[arg(
        short('i'),
        long = "input",
        env = "REPSCAN_INPUT",
        value_name = "path",
        default_value = "ips.txt"
    )]
    input: PathBuf,
    /// AbuseIPDB API key; when set, a single keyed pass replaces the tiered scan
    #[arg(short('k'), long = "api-key", env = "ABUSEIPDB_API_KEY", value_name = "string")]
    api_key: Option<String>,
    /// Report file to write; defaults to results.txt or results.csv to match the format
    #[arg(short('o'), long = "output", env = "REPSCAN_OUTPUT", value_name = "path")]
    output: Option<PathBuf>,
    /// Report format
    #[arg(
        short('F'),
        long = "format",
        env = "REPSCAN_FORMAT",
        value_name = "txt|csv",
        default_value_t = ReportFormat::Text
    )]
    format: ReportFormat,
    /// Base URL serving the blocklist tiers as <url>/<level>.txt
    #[arg(
        long = "blocklist-url",
        env = "REPSCAN_BLOCKLIST_URL",
        value_name = "url",
        default_value = IPSUM_LEVELS_URL
    )]
    blocklist_url: String,
    /// Reputation check endpoint
    #[arg(
        long = "reputation-url",
        env = "REPSCAN_REPUTATION_URL",
        value_name = "url",
        default_value = ABUSEIPDB_CHECK_URL
    )]
    reputation_url: String,
    /// Skip input addresses that aren't globally routable
    #[arg(long = "skip-private-ip", env = "REPSCAN_SKIP_PRIVATE_IP", default_value_t = false)]
    skip_private_ip: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}

fn log_startup_err(context: &str, err: Error) -> Error {
    error!("error {}: {:?}", context, err);
    err
}

async fn run(args: Cli) -> Result<()> {
    let level = logger::verbosity_to_level_filter(args.verbosity);
    let sub = logger::setup_logger(level, args.use_json);
    tracing::subscriber::set_global_default(sub)?;

    let SubCommands::ScanCommand(sargs) = args.subcommand;
    info!("starting repscan using blocklist at {}", sargs.blocklist_url);

    let targets = ip_list
        ::load_targets(&sargs.input, sargs.skip_private_ip)
        .map_err(|e| log_startup_err("loading targets", e))?;
    if targets.is_empty() {
        return Err(
            log_startup_err(
                "loading targets",
                anyhow!("no scannable addresses in {}", sargs.input.display())
            )
        );
    }

    let opt = ScanOpt {
        targets,
        credential: sargs.api_key,
        blocklist_url: sargs.blocklist_url,
        reputation_url: sargs.reputation_url,
        scorer: scanner::linear_tier_score,
    };
    let runner = ScanRunner::new(opt).map_err(|e| log_startup_err("preparing scan", e))?;
    let records = runner.run().await.map_err(|e| {
        error!("{}", e);
        Error::from(e)
    })?;

    let output = sargs.output.unwrap_or_else(|| PathBuf::from(sargs.format.default_output()));
    report::write_report(&records, &output, sargs.format)?;
    Ok(())
}
