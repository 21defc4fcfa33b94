use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use network_broker::{
    broker::Dispatcher,
    bus::Subscription,
    runtime::{cli::Cli, conf::Conf},
};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (conf, _cli) = Conf::new(cli).context("failed to load configuration")?;

    let filter = EnvFilter::new(format!("warn,network_broker={}", conf.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(std::env::var("NO_COLOR").is_err()))
        .init();

    info!(
        event.name = "broker.starting",
        hook.root = %conf.hook_root.display(),
        "network-broker starting"
    );

    let (connection, handle, _) =
        rtnetlink::new_connection().context("failed to open rtnetlink connection")?;
    tokio::spawn(connection);

    let mut bus = Subscription::connect(conf.channel_capacity)
        .await
        .context("failed to subscribe to systemd-networkd signals")?;

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(conf), handle));

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    // Each notification gets its own fire-and-forget task; in-flight
    // dispatches are not drained on shutdown.
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(event.name = "broker.stopping", "interrupt received");
                break;
            }
            _ = sigterm.recv() => {
                info!(event.name = "broker.stopping", "SIGTERM received");
                break;
            }
            event = bus.next_event() => match event {
                Some(event) => {
                    debug!(
                        event.name = "broker.signal_received",
                        subject.path = %event.path,
                        "received state-change notification"
                    );
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move { dispatcher.dispatch(event).await });
                }
                None => {
                    info!(event.name = "broker.bus_closed", "bus connection closed");
                    break;
                }
            }
        }
    }

    Ok(())
}
