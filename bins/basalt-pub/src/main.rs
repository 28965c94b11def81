use anyhow::Context;
use basalt_bus::{ClientDomain, DomainOptions};
use basalt_config::config::BusConfig;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Flag bits advertising the ticker payload format: ASCII `tick <n> @ <ns>`.
const TICKER_FORMAT_ASCII_V1: u32 = 1;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => BusConfig::load(path)?,
        None => BusConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let opts = DomainOptions {
        prefix: config.prefix.clone().into(),
        domain_bytes: config.domain_bytes,
        slot_bytes: config.slot_bytes,
    };
    let dom = ClientDomain::open_or_create_with(&config.domain, &opts)
        .context("failed to open domain")?;
    let slot = dom.get_slot("ticker").context("failed to open slot")?;
    slot.set_flags(TICKER_FORMAT_ASCII_V1);

    info!(
        "BASALT-PUB: publishing to '{prefix}/{domain}' slot 'ticker' at 100 Hz",
        prefix = config.prefix,
        domain = config.domain,
    );

    let mut n: u64 = 0;
    loop {
        let now_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let payload = format!("tick {n} @ {now_ns}");
        slot.write(payload.as_bytes()).context("write failed")?;
        n += 1;
        std::thread::sleep(Duration::from_millis(10));
    }
}
