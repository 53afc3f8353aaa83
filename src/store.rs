// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory binding and ISL tables.
//!
//! Layout follows `hdds-discovery-server`'s `ParticipantRegistry`: a primary
//! slab of records plus `HashMap` indices for each lookup key a caller needs,
//! kept in sync on every insert/update. Per Design Notes, records carry a
//! typed, storage-assigned `id` rather than being packed into untyped dicts;
//! the in-memory slab plays the role `hdds-persistence`'s `PersistenceStore`
//! trait plays for its sqlite/rocksdb backends, but there is only one
//! backend here (process-lifetime, in-memory), so no trait indirection is
//! introduced for a single implementation.

use crate::entry::{BindingEntry, IslEntry};
use crate::ids::{CtId, DpId, DpPort, VmId, VmPort};
use std::collections::HashMap;

/// Opaque handle into the binding table's backing slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle(usize);

/// Stores every `BindingEntry` for every controller, indexed by VM side
/// `(vm_id, vm_port)` and by DP side `(ct_id, dp_id, dp_port)` so either a
/// VM-port or a DP-port registration can find (or fail to find) its
/// counterpart in O(1). §3 invariant (i): both indices are keyed uniquely.
#[derive(Debug, Default)]
pub struct BindingTable {
    slots: Vec<Option<BindingEntry>>,
    next_id: u64,
    by_vm: HashMap<(VmId, VmPort), BindingHandle>,
    by_dp: HashMap<(CtId, DpId, DpPort), BindingHandle>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn index(&mut self, handle: BindingHandle) {
        let entry = self.slots[handle.0].as_ref().expect("index of empty slot");
        if let (Some(vm_id), Some(vm_port)) = (entry.vm_id, entry.vm_port) {
            self.by_vm.insert((vm_id, vm_port), handle);
        }
        if let (Some(ct_id), Some(dp_id), Some(dp_port)) = (entry.ct_id, entry.dp_id, entry.dp_port) {
            self.by_dp.insert((ct_id, dp_id, dp_port), handle);
        }
    }

    fn insert(&mut self, entry: BindingEntry) -> BindingHandle {
        self.slots.push(Some(entry));
        let handle = BindingHandle(self.slots.len() - 1);
        self.index(handle);
        handle
    }

    pub fn get(&self, handle: BindingHandle) -> &BindingEntry {
        self.slots[handle.0].as_ref().expect("dangling binding handle")
    }

    pub fn get_mut(&mut self, handle: BindingHandle) -> &mut BindingEntry {
        self.slots[handle.0].as_mut().expect("dangling binding handle")
    }

    pub fn find_by_vm(&self, vm_id: VmId, vm_port: VmPort) -> Option<BindingHandle> {
        self.by_vm.get(&(vm_id, vm_port)).copied()
    }

    pub fn find_by_dp(&self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) -> Option<BindingHandle> {
        self.by_dp.get(&(ct_id, dp_id, dp_port)).copied()
    }

    /// Register (or idempotently refresh) the VM side of a binding.
    /// §8 Law (Idempotence): re-delivery updates `eth_addr` in place rather
    /// than creating a duplicate row.
    pub fn register_vm(&mut self, vm_id: VmId, vm_port: VmPort, eth_addr: crate::ids::EthAddr) -> BindingHandle {
        if let Some(handle) = self.find_by_vm(vm_id, vm_port) {
            self.get_mut(handle).eth_addr = Some(eth_addr);
            return handle;
        }
        let id = self.alloc_id();
        self.insert(BindingEntry::new_idle_vm(id, vm_id, vm_port, eth_addr))
    }

    pub fn register_dp(&mut self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) -> BindingHandle {
        if let Some(handle) = self.find_by_dp(ct_id, dp_id, dp_port) {
            return handle;
        }
        let id = self.alloc_id();
        self.insert(BindingEntry::new_idle_dp(id, ct_id, dp_id, dp_port))
    }

    /// Re-index `handle` after its VM-side fields change (association). The
    /// DP-side key never changes once a row exists, so only the VM index
    /// needs refreshing here.
    pub fn reindex_vm(&mut self, handle: BindingHandle) {
        let entry = self.get(handle).clone();
        if let (Some(vm_id), Some(vm_port)) = (entry.vm_id, entry.vm_port) {
            self.by_vm.insert((vm_id, vm_port), handle);
        }
    }

    /// Re-index `handle` after its DP-side fields change (association).
    pub fn reindex_dp(&mut self, handle: BindingHandle) {
        let entry = self.get(handle).clone();
        if let (Some(ct_id), Some(dp_id), Some(dp_port)) = (entry.ct_id, entry.dp_id, entry.dp_port) {
            self.by_dp.insert((ct_id, dp_id, dp_port), handle);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BindingHandle, &BindingEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (BindingHandle(i), e)))
    }

    /// All binding entries sharing `(ct_id, dp_id)` — the neighbour set used
    /// by RouteMod local fan-out (§4.5).
    pub fn for_dp(&self, ct_id: CtId, dp_id: DpId) -> impl Iterator<Item = &BindingEntry> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(move |e| e.ct_id == Some(ct_id) && e.dp_id == Some(dp_id))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opaque handle into the ISL table's backing slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IslHandle(usize);

/// Stores every `IslEntry`, indexed by its local `(ct_id, dp_id, dp_port)`
/// key — the same key used both to register the local DP side and to look
/// an entry up by "the other side's address tuple" during pairing (§4.4).
#[derive(Debug, Default)]
pub struct IslTable {
    slots: Vec<Option<IslEntry>>,
    next_id: u64,
    by_local: HashMap<(CtId, DpId, DpPort), IslHandle>,
}

impl IslTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn insert(&mut self, mut entry: IslEntry) -> IslHandle {
        entry.id = self.alloc_id();
        let key = (
            entry.ct_id.expect("new isl entries always carry a local identity"),
            entry.dp_id.expect("new isl entries always carry a local identity"),
            entry.dp_port.expect("new isl entries always carry a local identity"),
        );
        self.slots.push(Some(entry));
        let handle = IslHandle(self.slots.len() - 1);
        self.by_local.insert(key, handle);
        handle
    }

    pub fn get(&self, handle: IslHandle) -> &IslEntry {
        self.slots[handle.0].as_ref().expect("dangling isl handle")
    }

    pub fn get_mut(&mut self, handle: IslHandle) -> &mut IslEntry {
        self.slots[handle.0].as_mut().expect("dangling isl handle")
    }

    pub fn find_by_local(&self, ct_id: CtId, dp_id: DpId, dp_port: DpPort) -> Option<IslHandle> {
        self.by_local.get(&(ct_id, dp_id, dp_port)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IslHandle, &IslEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (IslHandle(i), e)))
    }

    /// All ACTIVE ISL entries whose local side is `(ct_id, dp_id)` — the
    /// ISL neighbour set used by RouteMod local fan-out (§4.5), and the ISL
    /// entries whose remote side is `(ct_id, dp_id)`, used by remote fan-out.
    pub fn active_for_local(&self, ct_id: CtId, dp_id: DpId) -> impl Iterator<Item = &IslEntry> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(move |e| e.is_active() && e.ct_id == Some(ct_id) && e.dp_id == Some(dp_id))
    }

    pub fn active_for_remote(&self, ct_id: CtId, dp_id: DpId) -> impl Iterator<Item = &IslEntry> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(move |e| e.is_active() && e.rem_ct == Some(ct_id) && e.rem_id == Some(dp_id))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
