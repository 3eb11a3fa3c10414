use anyhow::Result;
use clap::{Parser, Subcommand};

use skill402::{cli, config, webapp};

#[derive(Parser)]
#[command(name = "skill402")]
#[command(about = "L402 pay-per-request content server")]
#[command(long_about = "\
L402 pay-per-request content server

skill402 sells a fixed catalog of markdown content over HTTP. A request for an
item without a credential is answered with 402 Payment Required, a Lightning
invoice and a signed credential bound to it. After paying, the client retries
with `Authorization: L402 <macaroon>:<preimage>` and receives the content.

TYPICAL WORKFLOWS:

  Try it locally without a Lightning node:
    1. skill402 --mock --content-dir ./skills catalog   # Check the content
    2. skill402 --mock -v serve                          # Serve on :8402

  Production against LNbits:
    1. skill402 secret                                   # Generate SERVER_SECRET
    2. LNBITS_URL=... LNBITS_API_KEY=... LNBITS_ADMIN_KEY=... \\
       SERVER_SECRET=... skill402 serve

For more details on each command, use: skill402 <command> --help
")]
struct Cli {
    /// Global configuration arguments
    #[command(flatten)]
    config: config::ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the L402 content server
    ///
    /// Example:
    ///
    ///  $ skill402 serve
    ///
    ///  $ skill402 --port 8080 --price basic=60 serve --ready-file ./ready
    ///
    Serve(webapp::ServeArgs),

    /// Print the catalog as it would be served
    ///
    ///  - Loads the manifest and content directory with the configured prices.
    ///
    /// Example:
    ///
    ///  $ skill402 --content-dir ./skills catalog
    ///
    Catalog(cli::catalog::CatalogArgs),

    /// Generate a random credential signing secret
    ///
    /// Example:
    ///
    ///  $ export SERVER_SECRET=$(skill402 secret)
    ///
    Secret(cli::secret::SecretArgs),

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let global_config = config::GlobalConfig::from_args(&cli.config)?;

    // Initialize tracing after config is fully merged
    global_config.init_tracing();

    tracing::debug!(config = ?global_config, "skill402 starting");

    match cli.command {
        Commands::Serve(args) => webapp::run(args, &global_config).await?,
        Commands::Catalog(args) => cli::catalog::run(args, &global_config).await?,
        Commands::Secret(args) => cli::secret::run(args).await?,
        Commands::Version => println!("{}", cli::version("skill402")),
    }

    tracing::debug!("skill402 shutting down");

    Ok(())
}
