//! tapdesk client, entry point.
//!
//! ```text
//! tapdesk                        List saved profiles
//! tapdesk --config <path>        Use custom config TOML
//! tapdesk --gen-config           Dump default config and exit
//! tapdesk --gen-config <path>    Write default config to a file and exit
//! tapdesk --check <profile>      Validate a profile and show its connection parameters
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tapdesk_core::{ProfileStore, StaticProfileStore};
use tapdesk_client::config::ClientConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tapdesk", about = "Touch-driven remote desktop client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tapdesk.toml")]
    config: PathBuf,

    /// Print the default configuration and exit. Writes it to PATH when
    /// one is given.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    gen_config: Option<Option<PathBuf>>,

    /// List saved profiles and exit.
    #[arg(long)]
    list_profiles: bool,

    /// Validate the named profile and print the resolved connection.
    #[arg(long, value_name = "PROFILE")]
    check: Option<String>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.gen_config {
        Some(Some(path)) => {
            ClientConfig::write_default(&path)?;
            println!("wrote {}", path.display());
            return Ok(ExitCode::SUCCESS);
        }
        Some(None) => {
            println!("{}", ClientConfig::default().to_toml()?);
            return Ok(ExitCode::SUCCESS);
        }
        None => {}
    }

    let config = ClientConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("tapdesk v{}", env!("CARGO_PKG_VERSION"));

    let store = config.profile_store();

    if let Some(name) = cli.check {
        return Ok(check_profile(&store, &name, &config).await);
    }

    if !cli.list_profiles {
        info!("no action given; listing profiles");
    }
    list_profiles(&store).await;
    Ok(ExitCode::SUCCESS)
}

async fn list_profiles(store: &StaticProfileStore) {
    let profiles = store.profiles().await;
    if profiles.is_empty() {
        println!("no saved profiles");
        return;
    }
    for profile in profiles {
        let status = match profile.validate() {
            Ok(()) => "ok".to_owned(),
            Err(e) => e.to_string(),
        };
        println!("{:<16} {:<28} {}", profile.name, profile.label(), status);
    }
}

async fn check_profile(store: &StaticProfileStore, name: &str, config: &ClientConfig) -> ExitCode {
    let request = match store.profile(name).await {
        Ok(profile) => profile.to_connect_request(config.display.width, config.display.height),
        Err(e) => Err(e),
    };
    match request {
        Ok(request) => {
            let session = config.session.to_session_config();
            let scale = if config.display.reduced { "reduced" } else { "full" };
            println!("{request:#?}");
            println!(
                "connect timeout {:?}, join timeout {:?}, first frame grace {:?}, {scale} scale",
                session.connect_timeout, session.join_timeout, session.first_frame_grace
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(profile = name, "profile check failed: {e}");
            ExitCode::FAILURE
        }
    }
}
