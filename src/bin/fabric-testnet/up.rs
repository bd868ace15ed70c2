use fabric_testnet::prelude::*;
use fabric_testnet::DockerTestLedger;
use miette::IntoDiagnostic;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Use the image already present locally instead of pulling it
    #[arg(long)]
    skip_pull: bool,

    /// Enroll the admin and a registered user once the ledger is healthy
    #[arg(long)]
    enroll: bool,
}

async fn bring_up(ledger: &mut DockerTestLedger, args: &Args) -> miette::Result<()> {
    let container = ledger.start(args.skip_pull).await?;

    let profile = ledger.connection_profile().await?;
    let ssh = ledger.ssh_config().await?;

    let mut summary = json!({
        "container": container.id,
        "image": container.image,
        "connectionProfile": profile,
        "ssh": ssh,
    });

    if args.enroll {
        let (admin, mut wallet) = ledger.enroll_admin().await?;
        let user = ledger.enroll_user(&mut wallet).await?;

        summary["identities"] = json!({
            ADMIN_ENROLLMENT_ID: admin,
            USER_ENROLLMENT_ID: user,
        });
    }

    let summary = serde_json::to_string_pretty(&summary).into_diagnostic()?;
    println!("{summary}");

    info!(%container, "ledger is up, press ctrl-c to tear it down");

    tokio::signal::ctrl_c().await.into_diagnostic()?;
    warn!("exit signal detected");

    Ok(())
}

#[tokio::main]
pub async fn run(config: crate::Config, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let mut ledger = DockerTestLedger::with_docker(config.ledger).await?;

    let outcome = bring_up(&mut ledger, args).await;

    if ledger.container().is_ok() {
        info!("removing ledger container");
        ledger.destroy().await?;
    }

    outcome
}
