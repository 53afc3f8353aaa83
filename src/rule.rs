// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule compiler: turns a declarative JSON rule document into an ordered
//! list of `RuleEntry` RouteMod templates (§4.2). Grounded on `rfrule.py`'s
//! `parse_rule_cfg`/`parse_l2`/`parse_l3`/`parse_l4`, with the cross-product
//! expansion translated into iterator chains over owned `Vec<RouteMod>`
//! instead of in-place list mutation.

use crate::ids::EthAddr;
use crate::message::{Action, Match, ModKind, Priority, RmOption, RouteMod};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("default-rules document missing top-level `default-rules` key")]
    MissingDefaultRules,
    #[error("invalid MAC address in rule {rule}: {source}")]
    InvalidMac {
        rule: String,
        #[source]
        source: crate::ids::EthAddrParseError,
    },
    #[error("invalid network address in rule {rule}: {0}")]
    InvalidNwAddr { rule: String, value: String },
}

/// The four priority buckets a rule document groups rules into, in the
/// fixed processing order §B.4 requires for deterministic output.
const PRIORITY_ORDER: [(&str, Priority); 4] = [
    ("lowest", Priority::Lowest),
    ("low", Priority::Low),
    ("high", Priority::High),
    ("highest", Priority::Highest),
];

/// Raw deserialization shape of one rule, matching the JSON fields in §4.2.
#[derive(Debug, Deserialize)]
struct RawRule {
    name: String,
    #[serde(rename = "vs-only", default)]
    vs_only: bool,
    #[serde(default)]
    destination: Option<String>,
    #[serde(rename = "match", default)]
    match_block: Option<RawMatch>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMatch {
    #[serde(rename = "dl-addr")]
    dl_addr: Option<String>,
    #[serde(rename = "dl-type")]
    dl_type: Option<Vec<String>>,
    #[serde(rename = "nw-addr")]
    nw_addr: Option<String>,
    #[serde(rename = "nw-proto")]
    nw_proto: Option<u8>,
    #[serde(rename = "tp-port")]
    tp_port: Option<u16>,
}

/// A compiled rule: its declared name/priority/scope plus the RouteMod
/// template(s) it expanded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub name: String,
    pub priority: Priority,
    pub vs_only: bool,
    pub routemod: RouteMod,
}

/// Parse and expand a full `{"default-rules": {...}}` document into the flat
/// list of `RuleEntry` the engine sends out during `config_dp` (§4.3.5).
/// Unexpected top-level keys are skipped (§7); unknown match fields are
/// ignored silently since the match block is best-effort (§7).
pub fn compile_rules(doc: &serde_json::Value) -> Result<Vec<RuleEntry>, RuleError> {
    let rules_by_priority = doc
        .get("default-rules")
        .and_then(|v| v.as_object())
        .ok_or(RuleError::MissingDefaultRules)?;

    let mut out = Vec::new();
    for (key, priority) in PRIORITY_ORDER {
        let Some(list) = rules_by_priority.get(key).and_then(|v| v.as_array()) else {
            continue;
        };
        for raw in list {
            let raw: RawRule = serde_json::from_value(raw.clone()).map_err(|e| RuleError::InvalidNwAddr {
                rule: key.to_string(),
                value: e.to_string(),
            })?;
            out.extend(compile_one(raw, priority)?);
        }
    }
    Ok(out)
}

fn compile_one(raw: RawRule, priority: Priority) -> Result<Vec<RuleEntry>, RuleError> {
    let mut base = RouteMod::new(ModKind::Add, 0);
    base.options.push(RmOption::Priority(priority));
    if raw.destination.as_deref() == Some("controller") {
        base.actions.push(Action::Controller);
    }

    let mut templates = vec![base];

    if let Some(m) = &raw.match_block {
        if let Some(mac) = &m.dl_addr {
            let addr = EthAddr::parse(mac).map_err(|source| RuleError::InvalidMac {
                rule: raw.name.clone(),
                source,
            })?;
            for t in &mut templates {
                t.matches.push(Match::Ethernet(addr));
            }
        }

        if let Some(ethertypes) = &m.dl_type {
            let mut expanded = Vec::with_capacity(templates.len() * ethertypes.len());
            for ethertype in ethertypes {
                let value = parse_hex_u16(ethertype);
                for t in &templates {
                    let mut clone = t.clone();
                    clone.matches.push(Match::Ethertype(value));
                    expanded.push(clone);
                }
            }
            templates = expanded;
        }

        if let Some(nw_addr) = &m.nw_addr {
            let is_v6 = nw_addr.contains(':');
            for t in &mut templates {
                if is_v6 {
                    t.matches.push(Match::Ipv6 {
                        addr: parse_ipv6(nw_addr).ok_or_else(|| RuleError::InvalidNwAddr {
                            rule: raw.name.clone(),
                            value: nw_addr.clone(),
                        })?,
                        mask: [0xff; 16],
                    });
                } else {
                    t.matches.push(Match::Ipv4 {
                        addr: parse_ipv4(nw_addr).ok_or_else(|| RuleError::InvalidNwAddr {
                            rule: raw.name.clone(),
                            value: nw_addr.clone(),
                        })?,
                        mask: [255, 255, 255, 255],
                    });
                }
            }
        }

        if let Some(proto) = m.nw_proto {
            for t in &mut templates {
                t.matches.push(Match::NwProto(proto));
            }
        }

        if let Some(port) = m.tp_port {
            let mut expanded = Vec::with_capacity(templates.len() * 2);
            for t in &templates {
                let mut src = t.clone();
                src.matches.push(Match::TpSrc(port));
                expanded.push(src);

                let mut dst = t.clone();
                dst.matches.push(Match::TpDst(port));
                expanded.push(dst);
            }
            templates = expanded;
        }
    }

    Ok(templates
        .into_iter()
        .map(|routemod| RuleEntry {
            name: raw.name.clone(),
            priority,
            vs_only: raw.vs_only,
            routemod,
        })
        .collect())
}

fn parse_hex_u16(s: &str) -> u16 {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(trimmed, 16).unwrap_or(0)
}

fn parse_ipv4(s: &str) -> Option<[u8; 4]> {
    let mut out = [0u8; 4];
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    for (i, p) in parts.iter().enumerate() {
        out[i] = p.parse().ok()?;
    }
    Some(out)
}

fn parse_ipv6(s: &str) -> Option<[u8; 16]> {
    s.parse::<std::net::Ipv6Addr>().ok().map(|a| a.octets())
}
