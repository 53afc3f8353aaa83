// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `RfServer`: the single struct that owns both tables and the read-only
//! configuration, per Design Notes ("treat tables as members of a single
//! server struct; no process-wide singletons"). Its methods are split across
//! `binding.rs`, `isl.rs`, `routemod.rs`, and `dispatch.rs` — each
//! contributing an `impl RfServer` block, the same way `hdds-router` spreads
//! `Router`'s behaviour across `router.rs`/`route.rs`/`transform.rs`.

use crate::entry::{BindingConfigEntry, IslConfigEntry};
use crate::ids::DpId;
use crate::rule::RuleEntry;
use crate::store::{BindingTable, IslTable};
use std::collections::HashSet;

/// The reserved datapath id that identifies the virtual switch (RFVS) as
/// opposed to a physical datapath. §9 Design Notes calls for this predicate
/// to live in exactly one place; `DpId::MAX` is the magic-constant choice
/// made here (see DESIGN.md).
pub const RFVS_DP_ID: DpId = DpId::new(u64::MAX);

/// True if `dp_id` identifies the virtual switch rather than a physical
/// datapath (§4.3.5, glossary "RFVS").
pub fn is_rfvs(dp_id: DpId) -> bool {
    dp_id == RFVS_DP_ID
}

/// The central state engine: binding table, ISL table, the read-only
/// configuration consulted (never mutated) by the engines, and the compiled
/// rule list. Owns no transport — callers pass a `&mut impl Transport` into
/// each handler, keeping the engine itself free of any socket dependency.
pub struct RfServer {
    pub binding: BindingTable,
    pub isl: IslTable,
    pub binding_config: Vec<BindingConfigEntry>,
    pub isl_config: Vec<IslConfigEntry>,
    pub rules: Vec<RuleEntry>,
    /// Datapaths already sent their initial rule set; `config_dp` is a
    /// no-op past the first call for a given `(ct_id, dp_id)` pair (§4.3.2
    /// "configure the datapath if not previously configured").
    pub(crate) configured_dps: HashSet<(crate::ids::CtId, DpId)>,
}

impl RfServer {
    pub fn new(
        binding_config: Vec<BindingConfigEntry>,
        isl_config: Vec<IslConfigEntry>,
        rules: Vec<RuleEntry>,
    ) -> Self {
        Self {
            binding: BindingTable::new(),
            isl: IslTable::new(),
            binding_config,
            isl_config,
            rules,
            configured_dps: HashSet::new(),
        }
    }

    pub fn binding_config_for(
        &self,
        vm_id: crate::ids::VmId,
        vm_port: crate::ids::VmPort,
    ) -> Option<&BindingConfigEntry> {
        self.binding_config
            .iter()
            .find(|c| c.vm_id == vm_id && c.vm_port == vm_port)
    }

    pub fn binding_config_for_dp(
        &self,
        ct_id: crate::ids::CtId,
        dp_id: DpId,
        dp_port: crate::ids::DpPort,
    ) -> Option<&BindingConfigEntry> {
        self.binding_config
            .iter()
            .find(|c| c.ct_id == ct_id && c.dp_id == dp_id && c.dp_port == dp_port)
    }

    pub fn isl_configs_matching(
        &self,
        ct_id: crate::ids::CtId,
        dp_id: DpId,
        dp_port: crate::ids::DpPort,
    ) -> Vec<&IslConfigEntry> {
        self.isl_config
            .iter()
            .filter(|c| c.matches_local(ct_id, dp_id, dp_port) || c.matches_remote(ct_id, dp_id, dp_port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfvs_predicate_recognizes_only_the_reserved_id() {
        assert!(is_rfvs(RFVS_DP_ID));
        assert!(!is_rfvs(DpId::new(0xA)));
    }
}
