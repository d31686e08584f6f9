//! Connection supervisor
//!
//! While the operator wants a connection, the supervisor keeps both links
//! alive: it opens the panel port when no session exists, re-sends the
//! handshake ping while the panel has not answered, and reconnects the
//! simulator. It never retries after a failed handshake, because the engine
//! clears the keep-connected intent in that case.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::bridge::BridgeInner;

/// Periodic supervisor loop, stopped by the bridge shutdown token
pub(crate) async fn run_supervisor(inner: Arc<BridgeInner>) {
    let mut ticker = interval(inner.config.supervisor_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        "Supervisor running every {:?}",
        inner.config.supervisor_period()
    );

    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if inner.keep_connected() {
            inner.supervise_once().await;
        }
    }
    debug!("Supervisor stopped");
}

/// One supervision pass; the caller holds the supervision lock
pub(crate) async fn supervise_once(inner: &Arc<BridgeInner>) {
    if !inner.keep_connected() {
        return;
    }

    if !inner.device_connected() {
        debug!("Panel not connected, opening port");
        inner.connect_device().await;
    } else if let Some(ping) = inner.handshake_ping() {
        debug!("Panel has not answered, pinging again");
        inner.ping(ping).await;
    }

    if inner.keep_connected() && !inner.sim_connected() {
        debug!("Simulator not connected, connecting");
        inner.connect_sim().await;
    }
}
