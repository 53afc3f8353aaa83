// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message envelope types exchanged over the two IPC channels (§6).
//!
//! The concrete transport and its wire encoding are excluded external
//! collaborators; what's specified here is the typed contract the engines
//! produce and consume, the way `hdds-discovery-server/src/server/protocol.rs`
//! specifies `DiscoveryMessage` independent of the socket code that moves it.

use crate::ids::{CtId, DpId, DpPort, EthAddr, VmId, VmPort, VsId, VsPort};

/// A RouteMod modification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModKind {
    Add,
    Delete,
}

/// Flow-table priority bucket, matching the four buckets the rule compiler
/// groups rules into (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Lowest,
    Low,
    High,
    Highest,
}

/// A single match predicate. `InPort` and the network matches carry an
/// explicit mask/address pair per §4.2 ("use exact mask").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    Ethernet(EthAddr),
    Ethertype(u16),
    Ipv4 { addr: [u8; 4], mask: [u8; 4] },
    Ipv6 { addr: [u8; 16], mask: [u8; 16] },
    NwProto(u8),
    TpSrc(u16),
    TpDst(u16),
    InPort(u16),
}

/// An action to apply on a matching packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Controller,
    Output(u16),
    SetEthSrc(EthAddr),
    SetEthDst(EthAddr),
}

/// A RouteMod option. `CtId` is the one the engines stack-manipulate during
/// fan-out (§4.5, §9 "stack-like option manipulation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmOption {
    Priority(Priority),
    CtId(u32),
}

/// A route-modification message: carries an id (VM or DP depending on
/// direction), ordered matches/options/actions lists, and a modification
/// kind. §9 Design Notes call for an explicit "replace option of kind K"
/// primitive in place of the original's positional stack-popping, and for
/// clone-per-emission instead of in-place push/pop during fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMod {
    pub kind: ModKind,
    pub id: u64,
    pub matches: Vec<Match>,
    pub options: Vec<RmOption>,
    pub actions: Vec<Action>,
}

impl RouteMod {
    pub fn new(kind: ModKind, id: u64) -> Self {
        Self {
            kind,
            id,
            matches: Vec::new(),
            options: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// The first OUTPUT action's port value, if any.
    pub fn output_port(&self) -> Option<u16> {
        self.actions.iter().find_map(|a| match a {
            Action::Output(p) => Some(*p),
            _ => None,
        })
    }

    /// Remove every OUTPUT action (used when rewriting a DELETE-kind mod,
    /// which carries no output value — §4.5).
    pub fn clear_output(&mut self) {
        self.actions.retain(|a| !matches!(a, Action::Output(_)));
    }

    /// Replace the value of the first OUTPUT action in place.
    pub fn set_output(&mut self, port: u16) {
        for a in &mut self.actions {
            if let Action::Output(_) = a {
                *a = Action::Output(port);
                return;
            }
        }
    }

    /// Replace the existing option of the same kind as `opt`, or append it
    /// if none exists. This is the explicit primitive Design Notes call
    /// for, replacing the original's "pop the last option" positional hack.
    pub fn replace_option(&mut self, opt: RmOption) {
        let same_kind = |a: &RmOption, b: &RmOption| {
            matches!(
                (a, b),
                (RmOption::Priority(_), RmOption::Priority(_)) | (RmOption::CtId(_), RmOption::CtId(_))
            )
        };
        if let Some(slot) = self.options.iter_mut().find(|o| same_kind(o, &opt)) {
            *slot = opt;
        } else {
            self.options.push(opt);
        }
    }

    pub fn ct_id_option(&self) -> Option<u32> {
        self.options.iter().find_map(|o| match o {
            RmOption::CtId(c) => Some(*c),
            _ => None,
        })
    }

    pub fn ct_id_option_count(&self) -> usize {
        self.options.iter().filter(|o| matches!(o, RmOption::CtId(_))).count()
    }

    /// Append `matches`, run `f`, then truncate back to the pre-append
    /// length — the append-and-strip pattern §4.5 requires around each
    /// neighbour emission so the next neighbour starts from the same base.
    pub fn with_extra_matches<R>(&mut self, extra: &[Match], f: impl FnOnce(&RouteMod) -> R) -> R {
        let base_len = self.matches.len();
        self.matches.extend_from_slice(extra);
        let result = f(self);
        self.matches.truncate(base_len);
        result
    }
}

/// Inbound message on the client channel (RFCLIENT_RFSERVER) or the proxy
/// channel (RFSERVER_RFPROXY). §4.6 dispatches on this enum's variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    PortRegister {
        vm_id: VmId,
        vm_port: VmPort,
        eth_addr: EthAddr,
    },
    RouteMod(RouteMod),
    DatapathPortRegister {
        ct_id: CtId,
        dp_id: DpId,
        dp_port: DpPort,
    },
    DatapathDown {
        ct_id: CtId,
        dp_id: DpId,
    },
    VirtualPlaneMap {
        vm_id: VmId,
        vm_port: VmPort,
        vs_id: VsId,
        vs_port: VsPort,
    },
}

/// Outbound PortConfig message sent on the client channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortConfig {
    Reset { vm_id: VmId, vm_port: VmPort },
    MapSuccess {
        vm_id: VmId,
        vm_port: VmPort,
        vs_id: VsId,
        vs_port: VsPort,
    },
}

/// Outbound DataPlaneMap message sent on the proxy channel (§B.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPlaneMap {
    pub ct_id: CtId,
    pub dp_id: DpId,
    pub dp_port: DpPort,
    pub vs_id: VsId,
    pub vs_port: VsPort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyOutbound {
    RouteMod(RouteMod),
    DataPlaneMap(DataPlaneMap),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_port_round_trips_through_set_output() {
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.actions.push(Action::Output(3));
        assert_eq!(rm.output_port(), Some(3));
        rm.set_output(9);
        assert_eq!(rm.output_port(), Some(9));
    }

    #[test]
    fn replace_option_keeps_single_ct_id() {
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.replace_option(RmOption::CtId(0));
        rm.replace_option(RmOption::CtId(1));
        assert_eq!(rm.ct_id_option_count(), 1);
        assert_eq!(rm.ct_id_option(), Some(1));
    }

    #[test]
    fn extra_matches_are_stripped_after_use() {
        let mut rm = RouteMod::new(ModKind::Add, 1);
        rm.matches.push(Match::InPort(1));
        rm.with_extra_matches(&[Match::Ethernet(EthAddr([1; 6]))], |r| {
            assert_eq!(r.matches.len(), 2);
        });
        assert_eq!(rm.matches.len(), 1);
    }

    #[test]
    fn clear_output_removes_action_for_delete() {
        let mut rm = RouteMod::new(ModKind::Delete, 1);
        rm.actions.push(Action::Output(3));
        rm.clear_output();
        assert_eq!(rm.output_port(), None);
    }
}
