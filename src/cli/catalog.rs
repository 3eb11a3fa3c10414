use anyhow::Result;
use clap::Args;

use crate::catalog::CatalogStore;
use crate::config::GlobalConfig;

#[derive(Args)]
pub struct CatalogArgs {
    /// Print the listing as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

fn render_table(catalog: &CatalogStore) -> String {
    let mut out = format!("{:<5} {:<13} {:>6}  {}\n", "ID", "TIER", "SATS", "TITLE");
    for entry in catalog.list() {
        out.push_str(&format!(
            "{:<5} {:<13} {:>6}  {}\n",
            entry.id,
            entry.tier.as_str(),
            entry.price,
            entry.title
        ));
    }
    out.push_str(&format!("{} items\n", catalog.len()));
    out
}

/// Load the catalog exactly as `serve` would and print it
pub async fn run(args: CatalogArgs, config: &GlobalConfig) -> Result<()> {
    let catalog = config.build_catalog()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog.list())?);
    } else {
        print!("{}", render_table(&catalog));
    }
    Ok(())
}
