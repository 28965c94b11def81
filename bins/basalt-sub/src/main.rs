use anyhow::Context;
use basalt_bus::{ClientDomain, Waiter};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")),
        )
        .init();

    let domain = std::env::args().nth(1).unwrap_or_else(|| "basalt".into());

    let dom = ClientDomain::open_or_create(&domain)
        .context("failed to open domain (start basalt-pub first?)")?;
    let slot = dom.get_slot("ticker").context("failed to open slot")?;

    let mut waiter = Waiter::new(&dom);
    waiter.subscribe(&slot, true);

    info!(
        "BASALT-SUB: attached to '{domain}' slot 'ticker' (format flags {:#x}). Waiting...",
        slot.flags()
    );

    let mut last = Instant::now();
    let mut count: u64 = 0;
    let mut last_len = 0usize;

    loop {
        waiter.wait_exclusive().context("wait failed")?;
        let n = waiter
            .for_each_new_slot(|view| last_len = view.len())
            .context("visit failed")?;
        count += u64::from(n);

        if last.elapsed() >= Duration::from_secs(1) {
            info!("BASALT-SUB: msg rate ~ {count}/s | last_len={last_len}");
            count = 0;
            last = Instant::now();
        }
    }
}
