//! Shadow oracle relay
//!
//! Drains decryption requests from the shadow oracle, signs the plaintexts
//! and feeds them back through the controller's callback entry point, the
//! same way an external oracle would over HTTP.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::metrics;
use crate::state::SharedState;

/// Answer every pending request once; returns how many revealed a config
pub async fn relay_once(state: &SharedState) -> usize {
    let (oracle, pending) = {
        let state = state.read().await;
        let pending = state.oracle.take_pending();
        (state.oracle.clone(), pending)
    };
    if pending.is_empty() {
        return 0;
    }

    let mut revealed = 0;
    for request in &pending {
        let fulfillment = oracle.fulfill(request);
        let mut state = state.write().await;
        match state.controller.on_reveal_callback(
            fulfillment.request_id,
            &fulfillment.bundle,
            &fulfillment.proof,
        ) {
            Ok(_) => {
                revealed += 1;
                metrics::record_callback(metrics::CALLBACK_REVEALED);
            }
            Err(e) => {
                // a sibling request for the same config already won
                debug!(request_id = request.request_id, error = %e, "Relay callback not applied");
                metrics::record_callback(metrics::CALLBACK_REJECTED);
            }
        }
        metrics::set_pending_reveals(state.controller.stats().pending_reveals);
    }

    info!(requests = pending.len(), revealed, "Relay pass complete");
    revealed
}

/// Run `relay_once` on a fixed interval until the task is aborted
pub fn spawn_relay(state: SharedState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = period.as_millis() as u64, "Starting shadow oracle relay");
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            relay_once(&state).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::create_shared_state;
    use cipherlane_core::{DecryptedConfig, Principal};
    use cipherlane_engine::RevealState;

    const ADMIN: Principal = Principal::new([0xaa; 20]);
    const SENSOR: Principal = Principal::new([0x01; 20]);

    #[tokio::test]
    async fn test_relay_reveals_once() {
        let mut config = ServerConfig::new(ADMIN);
        config.shadow_mode = true;
        let state = create_shared_state(&config).unwrap();

        let id = {
            let mut s = state.write().await;
            let alu = s.alu.clone();
            let id = s.controller.submit(
                &SENSOR,
                alu.encrypt(100),
                alu.encrypt(50),
                alu.encrypt(80),
                alu.encrypt(40),
            );
            s.controller.plan(&ADMIN, id).unwrap();
            s.controller.request_reveal(&ADMIN, id).unwrap();
            s.controller.request_reveal(&ADMIN, id).unwrap();
            id
        };

        assert_eq!(relay_once(&state).await, 1);
        assert_eq!(relay_once(&state).await, 0);

        let s = state.read().await;
        assert_eq!(s.controller.reveal_state(id), RevealState::Revealed);
        assert_eq!(s.controller.decrypted_config(id), DecryptedConfig::revealed(0, 2, 480));
        assert_eq!(s.controller.stats().pending_reveals, 0);
    }
}
