// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The outbound-transport contract.
//!
//! The concrete IPC bus (RFCLIENT_RFSERVER / RFSERVER_RFPROXY) is an
//! excluded external collaborator; callers plug in whatever actually moves
//! bytes. This mirrors how `hdds-discovery-server/src/server/relay.rs`
//! separates `RelayRouter` (routing decisions) from the per-client
//! `mpsc`-backed `ClientConnectionHandle` that performs the actual send —
//! here the split is the same, just expressed as a trait so the engine
//! crate itself never depends on a socket.
//!
//! §5: "No handler may block for I/O other than the outbound IPC send; the
//! send is permitted to block the engine." A `Transport` impl is therefore
//! free to block; the engine never retries or routes around a failed send
//! (§7: "IPC send failure: propagate to transport layer, no internal retry").

use crate::ids::{CtId, VmId};
use crate::message::{PortConfig, ProxyOutbound};

/// Error returned by a transport when a send cannot be delivered.
#[derive(Debug, Clone, thiserror::Error)]
#[error("ipc send failed: {0}")]
pub struct SendError(pub String);

/// Everything the engines need from the outbound side of the two IPC
/// channels. Implementations own the actual socket/queue; the engine only
/// ever calls these two methods and never inspects delivery state.
pub trait Transport {
    /// Send to the client channel, addressed to a specific VM.
    fn send_client(&mut self, vm_id: VmId, body: PortConfig) -> Result<(), SendError>;

    /// Send to the proxy channel, addressed to a specific controller id.
    fn send_proxy(&mut self, ct_id: CtId, body: ProxyOutbound) -> Result<(), SendError>;
}

/// An in-memory `Transport` used by tests: records every send instead of
/// moving bytes anywhere, the same role `hdds-discovery-server`'s test
/// module's channel-backed stand-ins play. Kept available outside `cfg(test)`
/// so the crate's integration tests (`tests/scenarios.rs`) can use it too.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub client_sends: Vec<(VmId, PortConfig)>,
    pub proxy_sends: Vec<(CtId, ProxyOutbound)>,
}

impl Transport for RecordingTransport {
    fn send_client(&mut self, vm_id: VmId, body: PortConfig) -> Result<(), SendError> {
        self.client_sends.push((vm_id, body));
        Ok(())
    }

    fn send_proxy(&mut self, ct_id: CtId, body: ProxyOutbound) -> Result<(), SendError> {
        self.proxy_sends.push((ct_id, body));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::VmPort;

    #[test]
    fn recording_transport_collects_sends_in_order() {
        let mut t = RecordingTransport::default();
        t.send_client(
            VmId::new(1),
            PortConfig::Reset {
                vm_id: VmId::new(1),
                vm_port: VmPort::new(0),
            },
        )
        .unwrap();
        assert_eq!(t.client_sends.len(), 1);
    }
}
