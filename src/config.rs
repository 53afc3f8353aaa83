// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration ingestion: loads the mapping config, the ISL config, and
//! the default-rules document from disk, validates each against its JSON
//! schema, and expands the mapping config into per-port `BindingConfigEntry`
//! and `IslConfigEntry` records (§4, §6).
//!
//! Structure mirrors `hdds-router/src/config.rs`'s `RouterConfig` load path
//! (`ConfigError` variants, `#[serde(default = ...)]` field defaults), swapped
//! from TOML to the JSON format the original `rfserver.py`/`config.schema`
//! configs actually use.

use crate::entry::{BindingConfigEntry, IslConfigEntry};
use crate::ids::{CtId, DpId, DpPort, EthAddr, VmId, VmPort};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config file {path} failed schema validation: {detail}")]
    SchemaViolation { path: String, detail: String },
    #[error("invalid MAC address in {path}: {source}")]
    Mac {
        path: String,
        #[source]
        source: crate::ids::EthAddrParseError,
    },
    #[error("malformed hex integer {value} in {path}")]
    BadHex { path: String, value: String },
}

fn read_json(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Validate `doc` against the JSON schema loaded from `schema_path`. This is
/// the contract point for the (excluded) schema-validator collaborator;
/// `jsonschema` implements it the same way `rfserver.py` calls
/// `jsonschema.validate(cfg, self.schema)` before ingesting a config file.
pub fn validate_against_schema(doc: &serde_json::Value, schema_path: &Path) -> Result<(), ConfigError> {
    let schema = read_json(schema_path)?;
    let compiled = jsonschema::validator_for(&schema).map_err(|e| ConfigError::SchemaViolation {
        path: schema_path.display().to_string(),
        detail: e.to_string(),
    })?;
    if let Err(e) = compiled.validate(doc) {
        return Err(ConfigError::SchemaViolation {
            path: schema_path.display().to_string(),
            detail: e.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawMappingConfig {
    #[serde(rename = "port-groups")]
    port_groups: Vec<RawPortGroup>,
    #[serde(rename = "virtual-machines")]
    virtual_machines: Vec<RawVirtualMachine>,
}

#[derive(Debug, Deserialize)]
struct RawPortGroup {
    name: String,
    #[serde(rename = "dp-id")]
    dp_id: String,
    #[serde(rename = "port-offset")]
    port_offset: u16,
    #[serde(rename = "num-ports")]
    num_ports: u16,
    #[serde(default)]
    controller: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawVirtualMachine {
    #[serde(rename = "vm-id")]
    vm_id: String,
    mappings: Vec<RawMapping>,
}

#[derive(Debug, Deserialize)]
struct RawMapping {
    #[serde(rename = "port-group")]
    port_group: String,
    #[serde(rename = "port-offset")]
    port_offset: u16,
    #[serde(rename = "num-ports")]
    num_ports: u16,
}

/// Parse a hex string (with or without `0x` prefix) into a `u64`.
fn parse_hex_u64(path: &str, s: &str) -> Result<u64, ConfigError> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16).map_err(|_| ConfigError::BadHex {
        path: path.to_string(),
        value: s.to_string(),
    })
}

/// Load and expand the mapping config at `path` into the flat list of
/// `BindingConfigEntry` records the binding engine consults (§6). Each
/// mapping expands to `num-ports` per-port entries per the port-group's
/// offset arithmetic.
pub fn load_mapping_config(path: &Path, schema_path: &Path) -> Result<Vec<BindingConfigEntry>, ConfigError> {
    let doc = read_json(path)?;
    validate_against_schema(&doc, schema_path)?;
    let raw: RawMappingConfig = serde_json::from_value(doc).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let path_str = path.display().to_string();
    let mut entries = Vec::new();
    for vm in &raw.virtual_machines {
        let vm_id = VmId::new(parse_hex_u64(&path_str, &vm.vm_id)?);
        for mapping in &vm.mappings {
            let Some(group) = raw.port_groups.iter().find(|g| g.name == mapping.port_group) else {
                continue;
            };
            if mapping.num_ports != group.num_ports {
                // A mapping whose port count disagrees with its port-group's
                // is skipped outright, not truncated to the smaller count.
                continue;
            }
            let dp_id = DpId::new(parse_hex_u64(&path_str, &group.dp_id)?);
            // §9 Open Question (a): missing `controller` falls back to 0,
            // preserved verbatim rather than treated as an ingestion error.
            let ct_id = CtId::new(group.controller.unwrap_or(0));
            for i in 0..mapping.num_ports {
                entries.push(BindingConfigEntry {
                    vm_id,
                    vm_port: VmPort::new(mapping.port_offset + i),
                    ct_id,
                    dp_id,
                    dp_port: DpPort::new(group.port_offset + i),
                });
            }
        }
    }
    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct RawIslConfigDoc {
    #[serde(rename = "inter-switch-links")]
    links: Vec<RawIslLink>,
}

#[derive(Debug, Deserialize)]
struct RawIslLink {
    datapaths: [String; 2],
    ports: [u16; 2],
    #[serde(rename = "dl-addrs")]
    dl_addrs: [String; 2],
    #[serde(default)]
    controllers: Option<[u32; 2]>,
    #[serde(rename = "vm-id")]
    vm_id: String,
}

/// Load the ISL config at `path`, producing one `IslConfigEntry` per
/// declared link. §7: a missing ISL config file is a warning, not fatal —
/// callers treat an `Io` error from this function that way and fall back to
/// an empty list; a present-but-invalid file is still fatal via the
/// `Json`/`SchemaViolation`/`Mac` variants.
pub fn load_isl_config(path: &Path, schema_path: &Path) -> Result<Vec<IslConfigEntry>, ConfigError> {
    let doc = read_json(path)?;
    validate_against_schema(&doc, schema_path)?;
    let raw: RawIslConfigDoc = serde_json::from_value(doc).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let path_str = path.display().to_string();
    let mut entries = Vec::new();
    for link in &raw.links {
        let dp_id = DpId::new(parse_hex_u64(&path_str, &link.datapaths[0])?);
        let rem_id = DpId::new(parse_hex_u64(&path_str, &link.datapaths[1])?);
        let eth_addr = EthAddr::parse(&link.dl_addrs[0]).map_err(|source| ConfigError::Mac {
            path: path_str.clone(),
            source,
        })?;
        let rem_eth_addr = EthAddr::parse(&link.dl_addrs[1]).map_err(|source| ConfigError::Mac {
            path: path_str.clone(),
            source,
        })?;
        let vm_id = VmId::new(parse_hex_u64(&path_str, &link.vm_id)?);

        // §9 Open Question (a): the original reads `controllers[0]` for
        // *both* sides of the link, rather than `[0]` and `[1]`. Preserved
        // verbatim here rather than fixed; see DESIGN.md.
        let ct_slot = link.controllers.unwrap_or([0, 0])[0];
        let ct_id = CtId::new(ct_slot);
        let rem_ct = CtId::new(ct_slot);

        entries.push(IslConfigEntry {
            vm_id,
            ct_id,
            dp_id,
            dp_port: DpPort::new(link.ports[0]),
            eth_addr,
            rem_ct,
            rem_id,
            rem_port: DpPort::new(link.ports[1]),
            rem_eth_addr,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_json(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn permissive_schema() -> NamedTempFile {
        write_json(r#"{"type": "object"}"#)
    }

    #[test]
    fn mapping_config_expands_per_port_entries() {
        let mapping = write_json(
            r#"{
                "port-groups": [
                    {"name": "edge", "dp-id": "0xA", "port-offset": 3, "num-ports": 2, "controller": 0}
                ],
                "virtual-machines": [
                    {"vm-id": "0x1", "mappings": [{"port-group": "edge", "port-offset": 0, "num-ports": 2}]}
                ]
            }"#,
        );
        let schema = permissive_schema();
        let entries = load_mapping_config(mapping.path(), schema.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].vm_port, VmPort::new(0));
        assert_eq!(entries[0].dp_port, DpPort::new(3));
        assert_eq!(entries[1].vm_port, VmPort::new(1));
        assert_eq!(entries[1].dp_port, DpPort::new(4));
    }

    #[test]
    fn mapping_config_skips_mapping_with_mismatched_num_ports() {
        let mapping = write_json(
            r#"{
                "port-groups": [
                    {"name": "edge", "dp-id": "0xA", "port-offset": 3, "num-ports": 2, "controller": 0}
                ],
                "virtual-machines": [
                    {"vm-id": "0x1", "mappings": [{"port-group": "edge", "port-offset": 0, "num-ports": 1}]}
                ]
            }"#,
        );
        let schema = permissive_schema();
        let entries = load_mapping_config(mapping.path(), schema.path()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn mapping_config_defaults_controller_to_zero() {
        let mapping = write_json(
            r#"{
                "port-groups": [
                    {"name": "edge", "dp-id": "0xA", "port-offset": 0, "num-ports": 1}
                ],
                "virtual-machines": [
                    {"vm-id": "0x1", "mappings": [{"port-group": "edge", "port-offset": 0, "num-ports": 1}]}
                ]
            }"#,
        );
        let schema = permissive_schema();
        let entries = load_mapping_config(mapping.path(), schema.path()).unwrap();
        assert_eq!(entries[0].ct_id, CtId::new(0));
    }

    #[test]
    fn isl_config_reads_controllers_zero_for_both_sides() {
        let isl = write_json(
            r#"{
                "inter-switch-links": [
                    {
                        "datapaths": ["0xA", "0xB"],
                        "ports": [10, 20],
                        "dl-addrs": ["aa:aa:aa:aa:aa:aa", "bb:bb:bb:bb:bb:bb"],
                        "controllers": [0, 1],
                        "vm-id": "0x1"
                    }
                ]
            }"#,
        );
        let schema = permissive_schema();
        let entries = load_isl_config(isl.path(), schema.path()).unwrap();
        // Preserves the original's controllers[0]/controllers[0] read —
        // rem_ct equals ct_id even though the document says 1 for the
        // remote side. See DESIGN.md Open Question (a).
        assert_eq!(entries[0].ct_id, CtId::new(0));
        assert_eq!(entries[0].rem_ct, CtId::new(0));
    }

    #[test]
    fn schema_violation_is_an_error() {
        let mapping = write_json(r#"{"port-groups": [], "virtual-machines": []}"#);
        let schema = write_json(r#"{"type": "object", "required": ["nonexistent-key"]}"#);
        assert!(matches!(
            load_mapping_config(mapping.path(), schema.path()),
            Err(ConfigError::SchemaViolation { .. })
        ));
    }
}
