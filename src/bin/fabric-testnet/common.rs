use tracing_subscriber::{filter::Targets, prelude::*};

use crate::LoggingConfig;

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = tracing::Level::from(config.max_level);

    let mut filter = Targets::new()
        .with_target("fabric_testnet", level)
        .with_target("fabric_testnet_core", level);

    if config.include_bollard {
        filter = filter.with_target("bollard", level);
    }

    if config.include_http {
        filter = filter.with_target("reqwest", level).with_target("hyper", level);
    }

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish()
        .with(filter)
        .init();

    Ok(())
}
