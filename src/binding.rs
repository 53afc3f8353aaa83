// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binding engine: `register_vm_port`, `register_dp_port`, `set_dp_down`,
//! `map_port`, `config_dp` (§4.3). Grounded on `rfserver.py`'s
//! `register_vm_port`/`register_dp_port`/`set_dp_down`/`map_port`/
//! `config_dp`, translated from its dict-keyed table lookups into the typed
//! `BindingTable` index lookups in `store.rs`.

use crate::ids::{CtId, DpId, DpPort, EthAddr, VmId, VmPort, VsId, VsPort};
use crate::ipc::Transport;
use crate::message::{ModKind, PortConfig, ProxyOutbound, RmOption, RouteMod};
use crate::server::{is_rfvs, RfServer};
use tracing::{info, warn};

impl RfServer {
    /// §4.3.1. Records a VM-port announcement, associating it with a
    /// waiting `IdleDp` row when the binding config says they belong
    /// together.
    pub fn register_vm_port(&mut self, vm_id: VmId, vm_port: VmPort, eth_addr: EthAddr) {
        let Some(cfg) = self.binding_config_for(vm_id, vm_port).copied() else {
            warn!(%vm_id, %vm_port, "PORT_REGISTER with no matching binding config");
            self.binding.register_vm(vm_id, vm_port, eth_addr);
            return;
        };

        match self.binding.find_by_dp(cfg.ct_id, cfg.dp_id, cfg.dp_port) {
            None => {
                self.binding.register_vm(vm_id, vm_port, eth_addr);
            }
            Some(handle) if self.binding.get(handle).is_idle_dp() => {
                let entry = self.binding.get_mut(handle);
                entry.associate_vm(vm_id, vm_port, eth_addr);
                self.binding.reindex_vm(handle);
                info!(%vm_id, %vm_port, dp_id = %cfg.dp_id, dp_port = %cfg.dp_port, "binding associated (vm arrived second)");
            }
            Some(_) => {
                // DP side already associated/active; leave it alone.
            }
        }
    }

    /// §4.3.2. Configures the datapath (see `config_dp`) then, unless it was
    /// the virtual switch, registers the DP-port announcement against the
    /// binding config or the ISL config.
    pub fn register_dp_port<T: Transport>(&mut self, ct_id: CtId, dp_id: DpId, dp_port: DpPort, transport: &mut T) {
        let is_vs = self.config_dp(ct_id, dp_id, transport);
        if is_vs {
            return;
        }

        if let Some(cfg) = self.binding_config_for_dp(ct_id, dp_id, dp_port).copied() {
            match self.binding.find_by_vm(cfg.vm_id, cfg.vm_port) {
                None => {
                    self.binding.register_dp(ct_id, dp_id, dp_port);
                }
                Some(handle) if self.binding.get(handle).is_idle_vm() => {
                    let entry = self.binding.get_mut(handle);
                    entry.associate_dp(ct_id, dp_id, dp_port);
                    self.binding.reindex_dp(handle);
                    info!(vm_id = %cfg.vm_id, vm_port = %cfg.vm_port, %dp_id, %dp_port, "binding associated (dp arrived second)");
                }
                Some(_) => {}
            }
            return;
        }

        if !self.isl_configs_matching(ct_id, dp_id, dp_port).is_empty() {
            self.register_islconf(ct_id, dp_id, dp_port);
            return;
        }

        self.binding.register_dp(ct_id, dp_id, dp_port);
    }

    /// §4.3.3. Moves every binding on `(ct_id, dp_id)` back to `IdleVm` and
    /// marks every ISL entry touching that datapath as half-idle, emitting a
    /// PortConfig::Reset for each binding that still has a VM side.
    pub fn set_dp_down<T: Transport>(&mut self, ct_id: CtId, dp_id: DpId, transport: &mut T) {
        let handles: Vec<_> = self
            .binding
            .iter()
            .filter(|(_, e)| e.ct_id == Some(ct_id) && e.dp_id == Some(dp_id))
            .map(|(h, _)| h)
            .collect();

        for handle in handles {
            let entry = self.binding.get_mut(handle);
            let vm_id = entry.vm_id;
            let vm_port = entry.vm_port;
            entry.make_idle_vm();
            self.binding.reindex_vm(handle);

            if let (Some(vm_id), Some(vm_port)) = (vm_id, vm_port) {
                if let Err(e) = transport.send_client(vm_id, PortConfig::Reset { vm_id, vm_port }) {
                    warn!(%vm_id, %vm_port, error = %e, "failed to send PortConfig::Reset");
                }
            }
        }

        let isl_handles: Vec<_> = self
            .isl
            .iter()
            .filter(|(_, e)| {
                (e.ct_id == Some(ct_id) && e.dp_id == Some(dp_id)) || (e.rem_ct == Some(ct_id) && e.rem_id == Some(dp_id))
            })
            .map(|(h, _)| h)
            .collect();

        for handle in isl_handles {
            let entry = self.isl.get_mut(handle);
            if entry.ct_id == Some(ct_id) && entry.dp_id == Some(dp_id) {
                // This entry's own local side is the datapath going down:
                // clear the local side, keep the remote side — IDLE_REMOTE
                // (§4.3.3: "entries whose local side matches are marked
                // IDLE_REMOTE").
                entry.clear_local();
            } else {
                // This entry's remote side is the datapath going down:
                // clear the remote side, keep the local side — IDLE_DP
                // (§4.3.3: "entries whose remote side matches are marked
                // IDLE_DP").
                entry.clear_remote();
            }
        }

        info!(%ct_id, %dp_id, "datapath down");
    }

    /// §4.3.4. Finalizes a binding with its virtual-plane port assignment.
    /// Only fires on an `Associated` entry; any other status is a no-op.
    pub fn map_port<T: Transport>(&mut self, vm_id: VmId, vm_port: VmPort, vs_id: VsId, vs_port: VsPort, transport: &mut T) {
        let Some(handle) = self.binding.find_by_vm(vm_id, vm_port) else {
            warn!(%vm_id, %vm_port, "VIRTUAL_PLANE_MAP for unknown binding");
            return;
        };

        if !self.binding.get(handle).is_associated() {
            warn!(%vm_id, %vm_port, status = %self.binding.get(handle).status(), "VIRTUAL_PLANE_MAP on non-associated binding, ignored");
            return;
        }

        let entry = self.binding.get_mut(handle);
        entry.activate(vs_id, vs_port);
        let (ct_id, dp_id, dp_port) = (
            entry.ct_id.expect("associated entry has ct_id"),
            entry.dp_id.expect("associated entry has dp_id"),
            entry.dp_port.expect("associated entry has dp_port"),
        );

        if let Err(e) = transport.send_proxy(
            ct_id,
            ProxyOutbound::DataPlaneMap(crate::message::DataPlaneMap {
                ct_id,
                dp_id,
                dp_port,
                vs_id,
                vs_port,
            }),
        ) {
            warn!(%ct_id, error = %e, "failed to send DataPlaneMap");
        }

        if let Err(e) = transport.send_client(
            vm_id,
            PortConfig::MapSuccess {
                vm_id,
                vm_port,
                vs_id,
                vs_port,
            },
        ) {
            warn!(%vm_id, error = %e, "failed to send PortConfig::MapSuccess");
        }

        info!(%vm_id, %vm_port, %vs_id, %vs_port, "binding active");
    }

    /// §4.3.5. Configures a datapath's flow table on first sight. Returns
    /// `true` for the virtual switch (no bindings tracked for it), `false`
    /// for a physical datapath. A no-op past the first call per `(ct_id,
    /// dp_id)` — §4.3.2's "configure if not previously configured".
    pub fn config_dp<T: Transport>(&mut self, ct_id: CtId, dp_id: DpId, transport: &mut T) -> bool {
        let already_configured = !self.configured_dps.insert((ct_id, dp_id));

        if is_rfvs(dp_id) {
            if !already_configured {
                info!(%ct_id, %dp_id, "configuring RFVS");
                for rule in self.rules.iter().filter(|r| r.vs_only) {
                    self.send_rule(ct_id, dp_id, rule, transport);
                }
            }
            return true;
        }

        if !already_configured {
            info!(%ct_id, %dp_id, "configuring datapath");
            let mut clear = RouteMod::new(ModKind::Delete, dp_id.get());
            clear.options.push(RmOption::Priority(crate::message::Priority::Lowest));
            clear.replace_option(RmOption::CtId(ct_id.get()));
            if let Err(e) = transport.send_proxy(ct_id, ProxyOutbound::RouteMod(clear)) {
                warn!(%ct_id, %dp_id, error = %e, "failed to send flowtable-clear RouteMod");
            }

            for rule in self.rules.iter().filter(|r| !r.vs_only).cloned().collect::<Vec<_>>() {
                self.send_rule(ct_id, dp_id, &rule, transport);
            }
        }
        false
    }

    fn send_rule<T: Transport>(&self, ct_id: CtId, dp_id: DpId, rule: &crate::rule::RuleEntry, transport: &mut T) {
        let mut rm = rule.routemod.clone();
        rm.id = dp_id.get();
        rm.replace_option(RmOption::CtId(ct_id.get()));
        if let Err(e) = transport.send_proxy(ct_id, ProxyOutbound::RouteMod(rm)) {
            warn!(%ct_id, %dp_id, rule = %rule.name, error = %e, "failed to send rule RouteMod");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::BindingConfigEntry;
    use crate::ipc::RecordingTransport;

    fn server() -> RfServer {
        RfServer::new(
            vec![BindingConfigEntry {
                vm_id: VmId::new(1),
                vm_port: VmPort::new(0),
                ct_id: CtId::new(0),
                dp_id: DpId::new(0xA),
                dp_port: DpPort::new(3),
            }],
            vec![],
            vec![],
        )
    }

    #[test]
    fn bind_and_map_scenario() {
        let mut s = server();
        let mut t = RecordingTransport::default();

        s.register_dp_port(CtId::new(0), DpId::new(0xA), DpPort::new(3), &mut t);
        s.register_vm_port(VmId::new(1), VmPort::new(0), EthAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));

        let handle = s.binding.find_by_vm(VmId::new(1), VmPort::new(0)).unwrap();
        assert!(s.binding.get(handle).is_associated());

        s.map_port(VmId::new(1), VmPort::new(0), VsId::new(0xFFFF), VsPort::new(7), &mut t);
        assert!(s.binding.get(handle).is_active());
        assert_eq!(t.proxy_sends.len(), 1);
        assert_eq!(t.client_sends.len(), 1);
    }

    #[test]
    fn vm_register_with_no_config_records_idle_vm_and_warns() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        s.register_vm_port(VmId::new(9), VmPort::new(9), EthAddr::ZERO);
        let handle = s.binding.find_by_vm(VmId::new(9), VmPort::new(9)).unwrap();
        assert!(s.binding.get(handle).is_idle_vm());
    }

    #[test]
    fn dp_down_resets_active_binding_and_sends_reset() {
        let mut s = server();
        let mut t = RecordingTransport::default();
        s.register_dp_port(CtId::new(0), DpId::new(0xA), DpPort::new(3), &mut t);
        s.register_vm_port(VmId::new(1), VmPort::new(0), EthAddr::ZERO);
        s.map_port(VmId::new(1), VmPort::new(0), VsId::new(1), VsPort::new(1), &mut t);

        s.set_dp_down(CtId::new(0), DpId::new(0xA), &mut t);

        let handle = s.binding.find_by_vm(VmId::new(1), VmPort::new(0)).unwrap();
        assert!(s.binding.get(handle).is_idle_vm());
        assert!(t.client_sends.iter().any(|(_, b)| matches!(b, PortConfig::Reset { .. })));
    }

    #[test]
    fn config_dp_sends_clear_before_any_rule() {
        use crate::message::Priority;
        use crate::rule::RuleEntry;

        let mut s = RfServer::new(
            vec![],
            vec![],
            vec![RuleEntry {
                name: "drop-all".into(),
                priority: Priority::Lowest,
                vs_only: false,
                routemod: RouteMod::new(ModKind::Add, 0),
            }],
        );
        let mut t = RecordingTransport::default();
        s.config_dp(CtId::new(0), DpId::new(0xA), &mut t);

        assert_eq!(t.proxy_sends.len(), 2);
        match &t.proxy_sends[0].1 {
            ProxyOutbound::RouteMod(rm) => assert_eq!(rm.kind, ModKind::Delete),
            _ => panic!("expected RouteMod"),
        }
    }

    #[test]
    fn config_dp_is_idempotent_past_first_call() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        let mut t = RecordingTransport::default();
        s.config_dp(CtId::new(0), DpId::new(0xA), &mut t);
        let first_count = t.proxy_sends.len();
        s.config_dp(CtId::new(0), DpId::new(0xA), &mut t);
        assert_eq!(t.proxy_sends.len(), first_count);
    }

    #[test]
    fn config_dp_returns_true_and_skips_bindings_for_rfvs() {
        let mut s = RfServer::new(vec![], vec![], vec![]);
        let mut t = RecordingTransport::default();
        let is_vs = s.config_dp(CtId::new(0), crate::server::RFVS_DP_ID, &mut t);
        assert!(is_vs);
    }

    #[test]
    fn dp_down_marks_own_isl_side_idle_remote_and_peer_side_idle_dp() {
        use crate::entry::{IslConfigEntry, IslStatus};

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

        s.set_dp_down(CtId::new(0), DpId::new(0xA), &mut t);

        let own = s.isl.get(s.isl.find_by_local(CtId::new(0), DpId::new(0xA), DpPort::new(10)).unwrap());
        assert_eq!(own.status(), IslStatus::IdleRemote);
        assert_eq!(own.ct_id, None);
        assert_eq!(own.rem_ct, Some(CtId::new(1)));

        let peer = s.isl.get(s.isl.find_by_local(CtId::new(1), DpId::new(0xB), DpPort::new(20)).unwrap());
        assert_eq!(peer.status(), IslStatus::IdleDp);
        assert_eq!(peer.rem_ct, None);
        assert_eq!(peer.ct_id, Some(CtId::new(1)));
    }
}
