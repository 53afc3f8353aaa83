// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatcher: demultiplexes inbound messages by kind and routes each to
//! its handler (§4.6). The engine never raises to its caller (§7); it
//! returns whether the message kind was recognized, the same "handled"
//! boolean shape `hdds-discovery-server`'s connection loop uses to decide
//! whether to acknowledge.

use crate::ipc::Transport;
use crate::message::InboundMessage;
use crate::server::RfServer;

impl RfServer {
    /// Dispatch one inbound message. Returns `true` if the message kind was
    /// recognized and routed to a handler (even if that handler then
    /// dropped it for a domain reason, e.g. an unknown VM port), `false` for
    /// an unrecognized kind — the transport decides whether to acknowledge
    /// in that case (§4.6, §7 "unknown inbound message type").
    pub fn dispatch<T: Transport>(&mut self, msg: InboundMessage, transport: &mut T) -> bool {
        match msg {
            InboundMessage::PortRegister { vm_id, vm_port, eth_addr } => {
                self.register_vm_port(vm_id, vm_port, eth_addr);
                true
            }
            InboundMessage::RouteMod(rm) => {
                self.register_route_mod(rm, transport);
                true
            }
            InboundMessage::DatapathPortRegister { ct_id, dp_id, dp_port } => {
                self.register_dp_port(ct_id, dp_id, dp_port, transport);
                true
            }
            InboundMessage::DatapathDown { ct_id, dp_id } => {
                self.set_dp_down(ct_id, dp_id, transport);
                true
            }
            InboundMessage::VirtualPlaneMap {
                vm_id,
                vm_port,
                vs_id,
                vs_port,
            } => {
                self.map_port(vm_id, vm_port, vs_id, vs_port, transport);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EthAddr, VmId, VmPort};
    use crate::ipc::RecordingTransport;

    #[test]
    fn dispatch_returns_true_for_every_known_variant() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        let mut t = RecordingTransport::default();
        let handled = s.dispatch(
            InboundMessage::PortRegister {
                vm_id: VmId::new(1),
                vm_port: VmPort::new(0),
                eth_addr: EthAddr::ZERO,
            },
            &mut t,
        );
        assert!(handled);
    }
}
