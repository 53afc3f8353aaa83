// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Opaque identifier types for the binding/ISL domain.
//!
//! All identifiers are fixed-width integers per the wire format; we wrap
//! them in newtypes so a `dp_id` can never be passed where a `vm_id` is
//! expected, matching the strong-typed-API convention the rest of the
//! pack leans on.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident, $inner:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            pub const fn new(v: $inner) -> Self {
                Self(v)
            }

            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:x}", self.0)
            }
        }
    };
}

id_newtype!(VmId, u64);
id_newtype!(DpId, u64);
id_newtype!(VsId, u64);
id_newtype!(VmPort, u16);
id_newtype!(DpPort, u16);
id_newtype!(VsPort, u16);
id_newtype!(CtId, u32);

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EthAddr(pub [u8; 6]);

impl EthAddr {
    pub const ZERO: EthAddr = EthAddr([0; 6]);

    /// Parse a colon-separated MAC address string (e.g. `aa:bb:cc:dd:ee:ff`).
    pub fn parse(s: &str) -> Result<Self, EthAddrParseError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(EthAddrParseError(s.to_string()));
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            let octet: [u8; 1] = hex::decode(part)
                .ok()
                .and_then(|v| v.try_into().ok())
                .ok_or_else(|| EthAddrParseError(s.to_string()))?;
            bytes[i] = octet[0];
        }
        Ok(EthAddr(bytes))
    }
}

impl fmt::Display for EthAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octets: Vec<String> = self.0.iter().map(|b| hex::encode([*b])).collect();
        write!(f, "{}", octets.join(":"))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid MAC address: {0}")]
pub struct EthAddrParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_mac() {
        let mac = EthAddr::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn rejects_malformed_mac() {
        assert!(EthAddr::parse("not-a-mac").is_err());
        assert!(EthAddr::parse("aa:bb:cc").is_err());
    }

    #[test]
    fn id_newtypes_render_hex() {
        assert_eq!(DpId::new(0xA).to_string(), "0xa");
        assert_eq!(VmId::new(1).to_string(), "0x1");
    }
}
