use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use dashboard_api::{run_server, AppState};
use store::{CredentialCipher, Store};

#[derive(Parser, Debug)]
#[command(
    name = "ledgerboard-server",
    about = "Sheet-backed personal finance dashboard API."
)]
struct Args {
    /// Path to settings.json; built-in defaults apply when omitted
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut settings = settings_loader::load_optional_settings(args.settings.as_ref())?;
    settings_loader::apply_env_overrides(&mut settings);

    // Fail fast: without a usable master key the credential store is dead
    // weight, so refuse to boot rather than erroring on first use.
    let master_key = settings_loader::master_key_from_env()?;
    let cipher = CredentialCipher::from_base64_key(&master_key)
        .context("validating LEDGERBOARD_MASTER_KEY")?;

    let store = Store::open(&settings.database_path)?;

    let state = Arc::new(AppState { store, cipher });
    run_server(state, &settings.host, settings.port).await
}
