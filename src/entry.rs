// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binding and ISL entry types and their state machines.
//!
//! Mirrors `rftable.py`'s `RFEntry`/`RFISLEntry` status constants and
//! transition methods, translated into a typed Rust state machine instead of
//! ad hoc integer flags. Field optionality follows the status table in §3:
//! a binding entry's `ct_id`/`dp_id`/`dp_port` are genuinely absent (not
//! zero-valued) until the DP side registers.

use crate::ids::{CtId, DpId, DpPort, EthAddr, VmId, VmPort, VsId, VsPort};
use std::fmt;

/// Status of a VM-port <-> DP-port <-> VS-port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingStatus {
    IdleVm,
    IdleDp,
    Associated,
    Active,
}

impl fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BindingStatus::IdleVm => "IDLE_VM_PORT",
            BindingStatus::IdleDp => "IDLE_DP_PORT",
            BindingStatus::Associated => "ASSOCIATED",
            BindingStatus::Active => "ACTIVE",
        };
        f.write_str(s)
    }
}

/// A single row of the binding table. Field set mirrors spec §3 exactly:
/// `ct_id`/`dp_id`/`dp_port` are absent until a DP side is known, `vm_id`/
/// `vm_port` absent until a VM side is known, `vs_id`/`vs_port` absent until
/// mapped. The opaque storage id is assigned by `BindingTable` on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub id: u64,
    pub vm_id: Option<VmId>,
    pub vm_port: Option<VmPort>,
    pub ct_id: Option<CtId>,
    pub dp_id: Option<DpId>,
    pub dp_port: Option<DpPort>,
    pub vs_id: Option<VsId>,
    pub vs_port: Option<VsPort>,
    pub eth_addr: Option<EthAddr>,
}

impl BindingEntry {
    pub fn new_idle_vm(id: u64, vm_id: VmId, vm_port: VmPort, eth_addr: EthAddr) -> Self {
        Self {
            id,
            vm_id: Some(vm_id),
            vm_port: Some(vm_port),
            ct_id: None,
            dp_id: None,
            dp_port: None,
            vs_id: None,
            vs_port: None,
            eth_addr: Some(eth_addr),
        }
    }

    pub fn new_idle_dp(id: u64, ct_id: CtId, dp_id: DpId, dp_port: DpPort) -> Self {
        Self {
            id,
            vm_id: None,
            vm_port: None,
            ct_id: Some(ct_id),
            dp_id: Some(dp_id),
            dp_port: Some(dp_port),
            vs_id: None,
            vs_port: None,
            eth_addr: None,
        }
    }

    /// Current state, derived from which fields are populated — mirrors
    /// `rftable.py`'s `get_status`, which recomputes rather than caching.
    pub fn status(&self) -> BindingStatus {
        let has_vm = self.vm_id.is_some() && self.vm_port.is_some();
        let has_dp = self.ct_id.is_some() && self.dp_id.is_some() && self.dp_port.is_some();
        let has_vs = self.vs_id.is_some() && self.vs_port.is_some();
        match (has_vm, has_dp, has_vs) {
            (true, true, true) => BindingStatus::Active,
            (true, true, false) => BindingStatus::Associated,
            (true, false, _) => BindingStatus::IdleVm,
            (false, true, _) => BindingStatus::IdleDp,
            (false, false, _) => BindingStatus::IdleVm,
        }
    }

    pub fn is_idle_vm(&self) -> bool {
        matches!(self.status(), BindingStatus::IdleVm)
    }

    pub fn is_idle_dp(&self) -> bool {
        matches!(self.status(), BindingStatus::IdleDp)
    }

    pub fn is_associated(&self) -> bool {
        matches!(self.status(), BindingStatus::Associated)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status(), BindingStatus::Active)
    }

    /// Fill in the DP side of an `IdleVm` row, producing `Associated`.
    pub fn associate_dp(&mut self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) {
        self.ct_id = Some(ct_id);
        self.dp_id = Some(dp_id);
        self.dp_port = Some(dp_port);
    }

    /// Fill in the VM side of an `IdleDp` row, producing `Associated`.
    pub fn associate_vm(&mut self, vm_id: VmId, vm_port: VmPort, eth_addr: EthAddr) {
        self.vm_id = Some(vm_id);
        self.vm_port = Some(vm_port);
        self.eth_addr = Some(eth_addr);
    }

    pub fn activate(&mut self, vs_id: VsId, vs_port: VsPort) {
        self.vs_id = Some(vs_id);
        self.vs_port = Some(vs_port);
    }

    /// Reset to `IdleVm`, clearing the DP and VS side — mirrors
    /// `set_dp_down`'s per-entry effect in `rfserver.py` (§4.3.3).
    pub fn make_idle_vm(&mut self) {
        self.ct_id = None;
        self.dp_id = None;
        self.dp_port = None;
        self.vs_id = None;
        self.vs_port = None;
    }
}

impl fmt::Display for BindingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BindingEntry(id={} status={} vm={:?}/{:?} ct={:?} dp={:?}/{:?} vs={:?}/{:?} eth={:?})",
            self.id,
            self.status(),
            self.vm_id,
            self.vm_port,
            self.ct_id,
            self.dp_id,
            self.dp_port,
            self.vs_id,
            self.vs_port,
            self.eth_addr
        )
    }
}

/// Status of an inter-switch-link pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IslStatus {
    IdleDp,
    IdleRemote,
    Active,
}

impl fmt::Display for IslStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IslStatus::IdleDp => "IDLE_DP_PORT",
            IslStatus::IdleRemote => "IDLE_REMOTE",
            IslStatus::Active => "ACTIVE",
        };
        f.write_str(s)
    }
}

/// A single row of the ISL table. Field set mirrors spec §3: `vm_id`,
/// `ct_id`/`dp_id`/`dp_port`/`eth_addr` describe the local end; `rem_*`
/// describe the remote end. Both sides are `Option` because `set_dp_down`
/// can clear either one independently (§4.3.3): a local datapath going down
/// clears the local side leaving `rem_*` intact (IDLE_REMOTE), a remote
/// datapath going down clears `rem_*` leaving the local side intact
/// (IDLE_DP). For every ACTIVE ISL there are two `IslEntry` rows, one per
/// direction (§3 invariant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslEntry {
    pub id: u64,
    pub vm_id: VmId,
    pub ct_id: Option<CtId>,
    pub dp_id: Option<DpId>,
    pub dp_port: Option<DpPort>,
    pub eth_addr: Option<EthAddr>,
    pub rem_ct: Option<CtId>,
    pub rem_id: Option<DpId>,
    pub rem_port: Option<DpPort>,
    pub rem_eth_addr: Option<EthAddr>,
}

impl IslEntry {
    pub fn new_idle_dp(id: u64, vm_id: VmId, ct_id: CtId, dp_id: DpId, dp_port: DpPort, eth_addr: EthAddr) -> Self {
        Self {
            id,
            vm_id,
            ct_id: Some(ct_id),
            dp_id: Some(dp_id),
            dp_port: Some(dp_port),
            eth_addr: Some(eth_addr),
            rem_ct: None,
            rem_id: None,
            rem_port: None,
            rem_eth_addr: None,
        }
    }

    /// Derived from which side's fields are populated: both sides present is
    /// ACTIVE, local-only is IDLE_DP (waiting on a remote pairing),
    /// remote-only is IDLE_REMOTE (waiting on the local side to come back).
    pub fn status(&self) -> IslStatus {
        let has_local = self.dp_id.is_some() && self.dp_port.is_some();
        let has_remote = self.rem_id.is_some() && self.rem_port.is_some();
        match (has_local, has_remote) {
            (true, true) => IslStatus::Active,
            (false, true) => IslStatus::IdleRemote,
            _ => IslStatus::IdleDp,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status(), IslStatus::Active)
    }

    pub fn pair_remote(&mut self, rem_ct: CtId, rem_id: DpId, rem_port: DpPort, rem_eth_addr: EthAddr) {
        self.rem_ct = Some(rem_ct);
        self.rem_id = Some(rem_id);
        self.rem_port = Some(rem_port);
        self.rem_eth_addr = Some(rem_eth_addr);
    }

    /// Clear the local side only, e.g. when this entry's own datapath goes
    /// down — produces IDLE_REMOTE, keeping the paired remote side intact.
    pub fn clear_local(&mut self) {
        self.ct_id = None;
        self.dp_id = None;
        self.dp_port = None;
        self.eth_addr = None;
    }

    /// Clear the remote side only, e.g. when the paired datapath goes down —
    /// produces IDLE_DP, keeping this entry's own local side intact.
    pub fn clear_remote(&mut self) {
        self.rem_ct = None;
        self.rem_id = None;
        self.rem_port = None;
        self.rem_eth_addr = None;
    }
}

impl fmt::Display for IslEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IslEntry(id={} ct={:?} dp={:?}/{:?} status={} rem={:?}/{:?}/{:?})",
            self.id,
            self.ct_id,
            self.dp_id,
            self.dp_port,
            self.status(),
            self.rem_ct,
            self.rem_id,
            self.rem_port
        )
    }
}

/// A declared ISL pairing from the static ISL configuration file. Mirrors
/// `RFISLConfEntry`: two full endpoint descriptions plus the shared
/// `vm_id` the original link is associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslConfigEntry {
    pub vm_id: VmId,
    pub ct_id: CtId,
    pub dp_id: DpId,
    pub dp_port: DpPort,
    pub eth_addr: EthAddr,
    pub rem_ct: CtId,
    pub rem_id: DpId,
    pub rem_port: DpPort,
    pub rem_eth_addr: EthAddr,
}

impl IslConfigEntry {
    /// True if `(ct_id, dp_id, dp_port)` matches this config's local side.
    pub fn matches_local(&self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) -> bool {
        self.ct_id == ct_id && self.dp_id == dp_id && self.dp_port == dp_port
    }

    /// True if `(ct_id, dp_id, dp_port)` matches this config's remote side.
    pub fn matches_remote(&self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) -> bool {
        self.rem_ct == ct_id && self.rem_id == dp_id && self.rem_port == dp_port
    }
}

/// The static mapping of one `(vm_id, vm_port)` to one `(ct_id, dp_id,
/// dp_port)`, produced by expanding the mapping config (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingConfigEntry {
    pub vm_id: VmId,
    pub vm_port: VmPort,
    pub ct_id: CtId,
    pub dp_id: DpId,
    pub dp_port: DpPort,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth() -> EthAddr {
        EthAddr([0, 1, 2, 3, 4, 5])
    }

    #[test]
    fn binding_progresses_vm_then_dp_then_vs() {
        let mut e = BindingEntry::new_idle_vm(1, VmId::new(1), VmPort::new(1), eth());
        assert!(e.is_idle_vm());
        e.associate_dp(CtId::new(0), DpId::new(1), DpPort::new(1));
        assert!(e.is_associated());
        e.activate(VsId::new(1), VsPort::new(1));
        assert!(e.is_active());
    }

    #[test]
    fn binding_progresses_dp_then_vm() {
        let mut e = BindingEntry::new_idle_dp(1, CtId::new(0), DpId::new(1), DpPort::new(1));
        assert!(e.is_idle_dp());
        e.associate_vm(VmId::new(1), VmPort::new(1), eth());
        assert!(e.is_associated());
    }

    #[test]
    fn dp_down_resets_to_idle_vm_keeping_vm_side() {
        let mut e = BindingEntry::new_idle_vm(1, VmId::new(1), VmPort::new(1), eth());
        e.associate_dp(CtId::new(0), DpId::new(1), DpPort::new(1));
        e.activate(VsId::new(1), VsPort::new(1));
        e.make_idle_vm();
        assert!(e.is_idle_vm());
        assert_eq!(e.vm_id, Some(VmId::new(1)));
        assert_eq!(e.ct_id, None);
    }

    #[test]
    fn isl_progresses_idle_to_active() {
        let mut isl = IslEntry::new_idle_dp(1, VmId::new(1), CtId::new(0), DpId::new(1), DpPort::new(1), eth());
        assert_eq!(isl.status(), IslStatus::IdleDp);
        isl.pair_remote(CtId::new(1), DpId::new(2), DpPort::new(2), EthAddr([9; 6]));
        assert!(isl.is_active());
    }

    #[test]
    fn isl_clear_local_yields_idle_remote_keeping_remote_side() {
        let mut isl = IslEntry::new_idle_dp(1, VmId::new(1), CtId::new(0), DpId::new(1), DpPort::new(1), eth());
        isl.pair_remote(CtId::new(1), DpId::new(2), DpPort::new(2), EthAddr([9; 6]));
        isl.clear_local();
        assert_eq!(isl.status(), IslStatus::IdleRemote);
        assert_eq!(isl.ct_id, None);
        assert_eq!(isl.rem_ct, Some(CtId::new(1)));
    }

    #[test]
    fn isl_clear_remote_yields_idle_dp_keeping_local_side() {
        let mut isl = IslEntry::new_idle_dp(1, VmId::new(1), CtId::new(0), DpId::new(1), DpPort::new(1), eth());
        isl.pair_remote(CtId::new(1), DpId::new(2), DpPort::new(2), EthAddr([9; 6]));
        isl.clear_remote();
        assert_eq!(isl.status(), IslStatus::IdleDp);
        assert_eq!(isl.rem_ct, None);
        assert_eq!(isl.ct_id, Some(CtId::new(0)));
    }
}
