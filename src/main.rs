use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fundcast::api::{Cli, project_file, run_http_server};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fundcast",
    about = "Multi-year fund portfolio projection with layered costs and capital gains tax"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the projection API over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[command(flatten)]
        defaults: Cli,
    },
    /// Project a JSON payload file ("-" reads stdin) and print the result
    Project {
        input: PathBuf,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
        #[command(flatten)]
        defaults: Cli,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // stdout is reserved for projection output
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    let result = match args.command {
        Command::Serve { port, defaults } => run_http_server(port, defaults).await,
        Command::Project {
            input,
            pretty,
            defaults,
        } => project_file(&defaults, &input, pretty).map(|json| println!("{json}")),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fundcast failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
