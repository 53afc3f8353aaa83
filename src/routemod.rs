// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RouteMod engine: `register_route_mod` (§4.5). Grounded on `rfserver.py`'s
//! `register_route_mod`/`_send_rm_with_matches`, reworked per Design Notes
//! into clone-per-emission (no in-place push/pop of matches or options) and
//! an explicit `replace_option` primitive instead of positional stack
//! popping.
//!
//! Fan-out ordering resolves an ambiguity between this module's prose and
//! its own worked examples: every local-fan-out pass first sends the
//! rewritten RouteMod unmodified ("primary send"), then sends one
//! additional copy per live neighbour with the extra ethernet/in-port
//! matches appended. See DESIGN.md for the full resolution.

use crate::ids::{CtId, DpId, EthAddr, VmId, VmPort};
use crate::ipc::Transport;
use crate::message::{Match, ProxyOutbound, RmOption, RouteMod};
use crate::server::RfServer;
use tracing::{info, warn};

impl RfServer {
    /// §4.5. Rewrites a VM-addressed RouteMod into a DP-addressed one and
    /// fans it out locally and across any active ISLs.
    pub fn register_route_mod<T: Transport>(&mut self, mut rm: RouteMod, transport: &mut T) {
        let Some(output_port) = rm.output_port() else {
            warn!(vm_id = rm.id, "ROUTE_MOD with no OUTPUT action, dropped");
            return;
        };

        let vm_id = VmId::new(rm.id);
        let vm_port = VmPort::new(output_port);
        let Some(handle) = self.binding.find_by_vm(vm_id, vm_port) else {
            info!(%vm_id, %vm_port, "ROUTE_MOD references unknown VM port, dropped");
            return;
        };

        let entry = self.binding.get(handle);
        if entry.is_idle_vm() {
            info!(%vm_id, %vm_port, "ROUTE_MOD references unassociated VM port, dropped");
            return;
        }

        let ct_id = entry.ct_id.expect("non-idle-vm entry has ct_id");
        let dp_id = entry.dp_id.expect("non-idle-vm entry has dp_id");
        let dp_port = entry.dp_port.expect("non-idle-vm entry has dp_port");

        rm.id = dp_id.get();
        match rm.kind {
            crate::message::ModKind::Delete => rm.clear_output(),
            crate::message::ModKind::Add => rm.set_output(dp_port.get()),
        }
        rm.replace_option(RmOption::CtId(ct_id.get()));

        self.emit_fanout(ct_id, dp_id, dp_port.get(), &mut rm, transport);

        let remote_isls: Vec<_> = self.isl.active_for_remote(ct_id, dp_id).cloned().collect();
        for r in remote_isls {
            let r_ct_id = r.ct_id.expect("active isl entry has local identity");
            let r_dp_id = r.dp_id.expect("active isl entry has local identity");
            let r_dp_port = r.dp_port.expect("active isl entry has local identity");
            let r_eth_addr = r.eth_addr.expect("active isl entry has local identity");

            let mut crossed = rm.clone();
            crossed.replace_option(RmOption::CtId(r_ct_id.get()));
            crossed.id = r_dp_id.get();
            crossed.actions.clear();
            crossed.actions.push(crate::message::Action::SetEthSrc(r_eth_addr));
            crossed
                .actions
                .push(crate::message::Action::SetEthDst(r.rem_eth_addr.expect("active isl has rem_eth_addr")));
            crossed.actions.push(crate::message::Action::Output(r_dp_port.get()));

            self.emit_fanout(r_ct_id, r_dp_id, r_dp_port.get(), &mut crossed, transport);
        }
    }

    /// Sends `rm` once as-is (the "primary" send), then once more per live
    /// neighbour of `(ct_id, dp_id)` other than `output_port`, each copy
    /// carrying two additional matches (ethernet destination + in-port) that
    /// are appended then stripped around the send (§4.5).
    fn emit_fanout<T: Transport>(&self, ct_id: CtId, dp_id: DpId, output_port: u16, rm: &mut RouteMod, transport: &mut T) {
        if let Err(e) = transport.send_proxy(ct_id, ProxyOutbound::RouteMod(rm.clone())) {
            warn!(%ct_id, %dp_id, error = %e, "failed to send primary RouteMod");
        }

        let neighbours: Vec<(EthAddr, u16)> = self
            .binding
            .for_dp(ct_id, dp_id)
            .filter(|e| e.is_active() && e.dp_port.map(|p| p.get()) != Some(output_port))
            .filter_map(|e| Some((e.eth_addr?, e.dp_port?.get())))
            .chain(
                self.isl
                    .active_for_local(ct_id, dp_id)
                    .filter(|e| e.dp_port.map(|p| p.get()) != Some(output_port))
                    .filter_map(|e| Some((e.eth_addr?, e.dp_port?.get()))),
            )
            .collect();

        for (eth_addr, in_port) in neighbours {
            let extra = [Match::Ethernet(eth_addr), Match::InPort(in_port)];
            rm.with_extra_matches(&extra, |r| {
                if let Err(e) = transport.send_proxy(ct_id, ProxyOutbound::RouteMod(r.clone())) {
                    warn!(%ct_id, %dp_id, error = %e, "failed to send neighbour-augmented RouteMod");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{BindingConfigEntry, IslConfigEntry};
    use crate::ids::{DpId, DpPort, VmId, VmPort, VsId, VsPort};
    use crate::ipc::RecordingTransport;
    use crate::message::{Action, ModKind};

    fn bind(s: &mut RfServer, vm_id: u64, vm_port: u16, ct_id: u32, dp_id: u64, dp_port: u16, mac: [u8; 6]) {
        s.binding_config.push(BindingConfigEntry {
            vm_id: VmId::new(vm_id),
            vm_port: VmPort::new(vm_port),
            ct_id: CtId::new(ct_id),
            dp_id: DpId::new(dp_id),
            dp_port: DpPort::new(dp_port),
        });
        let mut t = RecordingTransport::default();
        s.register_dp_port(CtId::new(ct_id), DpId::new(dp_id), DpPort::new(dp_port), &mut t);
        s.register_vm_port(VmId::new(vm_id), VmPort::new(vm_port), EthAddr(mac));
        s.map_port(VmId::new(vm_id), VmPort::new(vm_port), VsId::new(vm_id), VsPort::new(vm_port), &mut t);
    }

    #[test]
    fn routemod_fanout_scenario_three() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        bind(&mut s, 1, 0, 0, 0xA, 3, [0x11; 6]);
        bind(&mut s, 2, 0, 0, 0xA, 4, [0x22; 6]);

        let mut t = RecordingTransport::default();
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.actions.push(Action::Output(0));
        s.register_route_mod(rm, &mut t);

        assert_eq!(t.proxy_sends.len(), 2);
        let ProxyOutbound::RouteMod(primary) = &t.proxy_sends[0].1 else {
            panic!("expected routemod")
        };
        assert_eq!(primary.id, 0xA);
        assert_eq!(primary.output_port(), Some(3));
        assert_eq!(primary.matches.len(), 0);

        let ProxyOutbound::RouteMod(secondary) = &t.proxy_sends[1].1 else {
            panic!("expected routemod")
        };
        assert!(secondary.matches.contains(&Match::Ethernet(EthAddr([0x22; 6]))));
        assert!(secondary.matches.contains(&Match::InPort(4)));
    }

    #[test]
    fn routemod_with_no_output_action_is_dropped() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        let mut t = RecordingTransport::default();
        s.register_route_mod(RouteMod::new(ModKind::Add, 1), &mut t);
        assert!(t.proxy_sends.is_empty());
    }

    #[test]
    fn routemod_for_unassociated_port_is_dropped() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        let mut t = RecordingTransport::default();
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.actions.push(Action::Output(0));
        s.register_route_mod(rm, &mut t);
        assert!(t.proxy_sends.is_empty());
    }

    #[test]
    fn every_outbound_routemod_carries_exactly_one_ct_id_option() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        bind(&mut s, 1, 0, 0, 0xA, 3, [0x11; 6]);
        let mut t = RecordingTransport::default();
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.actions.push(Action::Output(0));
        s.register_route_mod(rm, &mut t);

        for (_, body) in &t.proxy_sends {
            if let ProxyOutbound::RouteMod(sent) = body {
                assert_eq!(sent.ct_id_option_count(), 1);
            }
        }
    }

    #[test]
    fn cross_isl_fanout_scenario_six() {
        let mut s = RfServer::new(
            vec![],
            vec![IslConfigEntry {
                vm_id: VmId::new(9),
                ct_id: CtId::new(0),
                dp_id: DpId::new(0xA),
                dp_port: DpPort::new(10),
                eth_addr: EthAddr([0xAA; 6]),
                rem_ct: CtId::new(1),
                rem_id: DpId::new(0xB),
                rem_port: DpPort::new(20),
                rem_eth_addr: EthAddr([0xBB; 6]),
            }],
            vec![],
        );
        let mut t = RecordingTransport::default();
        s.register_dp_port(CtId::new(0), DpId::new(0xA), DpPort::new(10), &mut t);
        s.register_dp_port(CtId::new(1), DpId::new(0xB), DpPort::new(20), &mut t);

        bind(&mut s, 1, 0, 0, 0xA, 3, [0x11; 6]);

        let mut t2 = RecordingTransport::default();
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.actions.push(Action::Output(0));
        s.register_route_mod(rm, &mut t2);

        assert!(t2.proxy_sends.iter().any(|(ct, body)| {
            *ct == CtId::new(1)
                && matches!(body, ProxyOutbound::RouteMod(rm)
                    if rm.id == 0xB
                    && rm.actions == vec![
                        Action::SetEthSrc(EthAddr([0xBB; 6])),
                        Action::SetEthDst(EthAddr([0xAA; 6])),
                        Action::Output(20),
                    ])
        }));
    }
}
