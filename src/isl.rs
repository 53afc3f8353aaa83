// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ISL engine: `register_islconf` (§4.4). Grounded on `rfserver.py`'s
//! `_register_islconf`, translated from its positional dict lookups
//! (`get_entry_by_addr`/`get_entry_by_remote`) into `IslTable::find_by_local`
//! lookups, since our table is keyed uniquely by local address and a lookup
//! by remote address is just "find the entry whose local side *is* that
//! address" in reverse.

use crate::entry::{IslConfigEntry, IslEntry, IslStatus};
use crate::ids::{CtId, DpId, DpPort};
use crate::server::RfServer;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IslError {
    /// §9 Open Question (b): a pre-existing reverse ISL entry was found but
    /// its MAC does not match what this registration expects. The original
    /// leaves this case unspecified; we refuse to guess and surface it.
    #[error(
        "ISL reverse entry for ct={ct_id} dp={dp_id}/{dp_port} already exists with a mismatched eth_addr"
    )]
    MismatchedReverseEntry { ct_id: CtId, dp_id: DpId, dp_port: DpPort },
}

impl RfServer {
    /// §4.4. Pairs an incoming DP-port registration with its configured ISL
    /// counterpart. A no-op if no ISL config matches this triple at all (the
    /// caller is expected to have already checked that via
    /// `isl_configs_matching`).
    pub fn register_islconf(&mut self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) {
        let configs: Vec<IslConfigEntry> = self
            .isl_configs_matching(ct_id, dp_id, dp_port)
            .into_iter()
            .cloned()
            .collect();

        for conf in &configs {
            if let Err(e) = self.register_one_islconf(conf, ct_id, dp_id, dp_port) {
                tracing::error!(error = %e, "ISL registration rejected");
            }
        }
    }

    fn register_one_islconf(
        &mut self,
        conf: &IslConfigEntry,
        ct_id: CtId,
        dp_id: DpId,
        dp_port: DpPort,
    ) -> Result<(), IslError> {
        // Which side of the configured link did this registration arrive
        // on? The *other* side's address is what we look an existing entry
        // up by, and this registration's own MAC is that side's field.
        let (other_ct, other_dp, other_port, own_eth) = if conf.matches_remote(ct_id, dp_id, dp_port) {
            (conf.ct_id, conf.dp_id, conf.dp_port, conf.rem_eth_addr)
        } else {
            (conf.rem_ct, conf.rem_id, conf.rem_port, conf.eth_addr)
        };

        let Some(handle) = self.isl.find_by_local(other_ct, other_dp, other_port) else {
            self.isl.insert(IslEntry::new_idle_dp(0, conf.vm_id, ct_id, dp_id, dp_port, own_eth));
            info!(%ct_id, %dp_id, %dp_port, %own_eth, "registering ISL port as idle");
            return Ok(());
        };

        if !matches!(self.isl.get(handle).status(), IslStatus::IdleDp) {
            // Already associated (or further along); nothing to do — mirrors
            // the original only acting on an `IDLE_DP_PORT` match.
            return Ok(());
        }

        self.isl.get_mut(handle).pair_remote(ct_id, dp_id, dp_port, own_eth);
        let other = self.isl.get(handle).clone();
        let other_ct = other.ct_id.expect("paired entry still carries its local identity");
        let other_dp = other.dp_id.expect("paired entry still carries its local identity");
        let other_port = other.dp_port.expect("paired entry still carries its local identity");
        let other_eth = other.eth_addr.expect("paired entry still carries its local identity");

        match self.isl.find_by_local(ct_id, dp_id, dp_port) {
            None => {
                let reverse = IslEntry {
                    id: 0,
                    vm_id: other.vm_id,
                    ct_id: Some(ct_id),
                    dp_id: Some(dp_id),
                    dp_port: Some(dp_port),
                    eth_addr: Some(own_eth),
                    rem_ct: Some(other_ct),
                    rem_id: Some(other_dp),
                    rem_port: Some(other_port),
                    rem_eth_addr: Some(other_eth),
                };
                self.isl.insert(reverse);
            }
            Some(reverse_handle) => {
                let reverse_entry = self.isl.get(reverse_handle);
                if reverse_entry.eth_addr != Some(own_eth) {
                    return Err(IslError::MismatchedReverseEntry { ct_id, dp_id, dp_port });
                }
                self.isl.get_mut(reverse_handle).pair_remote(other_ct, other_dp, other_port, other_eth);
            }
        }

        info!(
            %ct_id, %dp_id, %dp_port,
            rem_ct = %other_ct, rem_id = %other_dp, rem_port = %other_port,
            "ISL pair active"
        );
        Ok(())
    }
}
