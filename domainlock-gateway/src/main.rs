//! domainlock operator binary
//!
//! Runs the license gateway and manages the local activation:
//!
//!   domainlock --config license.json serve --port 8080
//!   domainlock --config license.json activate --host example.com --key ABC123
//!   domainlock --config license.json check --host example.com
//!   domainlock --config license.json deactivate --host example.com

use std::{net::{IpAddr, SocketAddr}, path::PathBuf};
use anyhow::{bail, Context, Result};
use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use domainlock_gateway::{build_router, protect};
use domainlock_license::{
    Decision, Domain, LicenseConfig, LicenseKey, ProtectionGate, RecheckMode, RequestContext,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "domainlock")]
#[command(about = "Domain-bound license gateway")]
struct Args {
    /// Path to a JSON license configuration
    #[arg(short, long, env = "DOMAINLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Licensing authority endpoint
    #[arg(long, env = "DOMAINLOCK_ENDPOINT")]
    endpoint: Option<String>,

    /// API key sent to the authority
    #[arg(long, env = "DOMAINLOCK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Secret keying the verification file hash
    #[arg(long, env = "DOMAINLOCK_SALT", hide_env_values = true)]
    salt: Option<String>,

    /// License key
    #[arg(long, env = "DOMAINLOCK_LICENSE_KEY", hide_env_values = true)]
    license_key: Option<String>,

    /// Path of the local verification file
    #[arg(long, env = "DOMAINLOCK_VERIFICATION_FILE")]
    verification_file: Option<PathBuf>,

    /// Recheck on a background task while serving the grace verdict
    #[arg(long)]
    background_recheck: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the license API and a gated root route
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,

        /// HTTP port
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Activate a license for a domain
    Activate {
        /// Domain to bind the license to
        #[arg(long)]
        host: String,

        /// License key; defaults to the configured one
        #[arg(long)]
        key: Option<String>,

        /// Bind to every domain instead of `host`
        #[arg(long)]
        wildcard: bool,
    },
    /// Deactivate the license and delete the local record
    Deactivate {
        #[arg(long)]
        host: String,
    },
    /// Run one authorization for a domain
    Check {
        #[arg(long)]
        host: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = load_config(&args)?;
    let license_key = config.license_key.clone();
    let gate = ProtectionGate::new(config).context("invalid license configuration")?;

    match args.command {
        Command::Serve { bind, port } => serve(gate, SocketAddr::new(bind, port)).await,
        Command::Activate {
            host,
            key,
            wildcard,
        } => {
            let raw = key
                .or(license_key)
                .context("no license key given; pass --key or configure license_key")?;
            let key = LicenseKey::parse(&raw)?;
            let ctx = RequestContext::new(&host, "");
            let record = if wildcard {
                gate.activate_binding(&ctx, key, Domain::wildcard()).await
            } else {
                gate.activate(&ctx, key).await
            }
            .context("activation failed")?;

            println!("License activated");
            println!("  Key:        {}", record.license_key().masked());
            println!("  Domain:     {}", record.domain());
            println!("  Validation: {}", record.validation_type().as_str());
            println!("  Expires:    {}", record.expires());
            Ok(())
        }
        Command::Deactivate { host } => {
            let removed = gate
                .deactivate(&RequestContext::new(&host, ""))
                .await
                .context("deactivation failed")?;
            if removed {
                println!("License deactivated; local record removed");
            } else {
                println!("License deactivated; no local record was present");
            }
            Ok(())
        }
        Command::Check { host } => {
            let decision = gate.authorize(&RequestContext::new(&host, "")).await;
            gate.settle().await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            match decision {
                Decision::Deny(reason) => bail!("{reason}"),
                _ => Ok(()),
            }
        }
    }
}

fn load_config(args: &Args) -> Result<LicenseConfig> {
    let mut config = match &args.config {
        Some(path) => LicenseConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => LicenseConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.endpoint_url = endpoint.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(salt) = &args.salt {
        config.salt = salt.clone();
    }
    if let Some(key) = &args.license_key {
        config.license_key = Some(key.clone());
    }
    if let Some(path) = &args.verification_file {
        config.verification_file = path.clone();
    }
    if args.background_recheck {
        config.recheck_mode = RecheckMode::Background;
    }
    Ok(config)
}

async fn serve(gate: ProtectionGate, addr: SocketAddr) -> Result<()> {
    let gated = Router::new().route("/", get(|| async { "OK" }));
    let app = build_router(gate.clone()).merge(protect(gated, gate.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("License gateway listening on {}", addr);
    info!("Verification file: {}", gate.store().path().display());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server failed")
}
