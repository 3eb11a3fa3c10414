use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct SecretArgs {
    /// Secret length in bytes
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u16).range(16..=128))]
    pub bytes: u16,
}

fn random_secret(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
    hex::encode(bytes)
}

/// Print a fresh signing secret, suitable for SERVER_SECRET
pub async fn run(args: SecretArgs) -> Result<()> {
    println!("{}", random_secret(args.bytes as usize));
    Ok(())
}
