use std::path::PathBuf;
use std::process::exit;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use zabbix_ssl::config::{Config, OutputFormat};
use zabbix_ssl::{discover_ssl_servers, get_issuer, get_validity, DiscoveryReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    /// Print discovered TLS virtual hosts in Zabbix LLD format
    Discover,
    /// Print the issuer common name of a host's certificate
    Issuer,
    /// Print the days left before a host's certificate expires
    Validity,
    /// Print a sample TOML configuration file
    ExampleConfig,
}

/// Zabbix SSL certificate monitoring with auto-discovery of Nginx and Apache virtual hosts
#[derive(Debug, Parser)]
#[command(name = "zabbix-ssl", version, author, about, long_about = None)]
struct Cli {
    #[arg(value_enum)]
    command: Command,

    /// Host to check
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to check
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Nginx configuration directory
    #[arg(long)]
    nginx_dir: Option<PathBuf>,

    /// Apache configuration directory
    #[arg(long)]
    apache_dir: Option<PathBuf>,

    /// Output format for discover
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Connect/read timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Exit with an error when a configuration file could not be parsed
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{}", failure_message(err.as_ref()));
        exit(1);
    }
}

/// Single stderr line for a failed run.
fn failure_message(err: &dyn std::error::Error) -> String {
    format!("zabbix-ssl: {}", err)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let file_config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = Config::defaults().merge_with(file_config).merge_with(Config::from_cli_args(
        cli.nginx_dir,
        cli.apache_dir,
        cli.output,
        cli.timeout,
        cli.strict.then_some(true),
    ));

    match cli.command {
        Command::Discover => {
            let discovery = discover_ssl_servers(config.nginx_dir(), config.apache_dir());
            let report = DiscoveryReport::from_servers(&discovery.servers);
            match config.output() {
                OutputFormat::Json => println!("{}", report.to_json()?),
                OutputFormat::Text => println!("{}", report.to_table()),
            }
            if config.strict() && !discovery.is_clean() {
                for failure in &discovery.failures {
                    eprintln!("{}: {}", failure.path.display(), failure.error);
                }
                return Err(format!(
                    "{} configuration file(s) could not be parsed",
                    discovery.failures.len()
                )
                .into());
            }
        }
        Command::ExampleConfig => print!("{}", Config::example_toml()),
        Command::Issuer | Command::Validity => {
            let (host, port) = match (cli.host, cli.port) {
                (Some(host), Some(port)) => (host, port),
                _ => Cli::command()
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "For \"issuer\" and \"validity\" commands \"host\" and \"port\" options are required",
                    )
                    .exit(),
            };
            if cli.command == Command::Issuer {
                println!("{}", get_issuer(&host, port, config.timeout())?);
            } else {
                println!("{}", get_validity(&host, port, config.timeout())?);
            }
        }
    }

    Ok(())
}
