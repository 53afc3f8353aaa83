// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RouteFlow-style virtual-router controller.
//!
//! Keeps physical datapaths and VM routing engines in sync: maintains the
//! bindings between VM ports, DP ports, and virtual-switch ports; rewrites
//! route modifications emitted by VMs so they apply to the datapaths they
//! represent, including fan-out across inter-switch links; and installs a
//! static default flow table on every datapath that joins a controller.
//!
//! # Quick Start
//!
//! ```bash
//! rfserver mapping.json -i islconf.json -d default-rules.json -s config.schema
//! ```
//!
//! The concrete IPC transport, the JSON schema validator's wire format, and
//! the RouteMod serialization library are treated as external collaborators;
//! this crate specifies and implements their *contracts* ([`ipc::Transport`],
//! [`config::validate_against_schema`], [`message::RouteMod`]) rather than a
//! specific wire encoding.

pub mod binding;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod ids;
pub mod ipc;
pub mod isl;
pub mod message;
pub mod routemod;
pub mod rule;
pub mod server;
pub mod store;

pub use entry::{BindingConfigEntry, BindingEntry, BindingStatus, IslConfigEntry, IslEntry, IslStatus};
pub use ids::{CtId, DpId, DpPort, EthAddr, VmId, VmPort, VsId, VsPort};
pub use ipc::{SendError, Transport};
pub use message::{Action, InboundMessage, Match, ModKind, PortConfig, Priority, RmOption, RouteMod};
pub use rule::{compile_rules, RuleEntry, RuleError};
pub use server::RfServer;
