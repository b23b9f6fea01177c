//! IPv4 CIDR parsing and subnet carving.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{TemplateError, TemplateResult};

/// An IPv4 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix: u8) -> TemplateResult<Self> {
        if prefix > 32 {
            return Err(TemplateError::validation(
                "cidr",
                format!("prefix length {} is larger than 32", prefix),
            ));
        }
        Ok(Self {
            address: Self::mask(address, prefix),
            prefix,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Carve `count` consecutive subnets of length `new_prefix`.
    pub fn subnets(&self, new_prefix: u8, count: usize) -> TemplateResult<Vec<Ipv4Cidr>> {
        if new_prefix < self.prefix || new_prefix > 32 {
            return Err(TemplateError::validation(
                "cidr",
                format!("cannot split /{} into /{} subnets", self.prefix, new_prefix),
            ));
        }

        let available = 1u64 << (new_prefix - self.prefix);
        if count as u64 > available {
            return Err(TemplateError::validation(
                "cidr",
                format!(
                    "{} has room for {} /{} subnets, {} requested",
                    self, available, new_prefix, count
                ),
            ));
        }

        let base = u32::from(self.address) as u64;
        let step = 1u64 << (32 - new_prefix);
        (0..count as u64)
            .map(|i| Ipv4Cidr::new(Ipv4Addr::from((base + i * step) as u32), new_prefix))
            .collect()
    }

    fn mask(address: Ipv4Addr, prefix: u8) -> Ipv4Addr {
        if prefix == 0 {
            return Ipv4Addr::UNSPECIFIED;
        }
        let bits = u32::from(address) & (u32::MAX << (32 - prefix));
        Ipv4Addr::from(bits)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TemplateError::validation("cidr", "CIDR must not be empty"));
        }

        let (address, prefix) = s.split_once('/').ok_or_else(|| {
            TemplateError::validation("cidr", format!("'{}' is missing a prefix length", s))
        })?;

        let address: Ipv4Addr = address.parse().map_err(|_| {
            TemplateError::validation("cidr", format!("'{}' is not an IPv4 address", address))
        })?;
        let prefix: u8 = prefix.parse().map_err(|_| {
            TemplateError::validation("cidr", format!("'{}' is not a prefix length", prefix))
        })?;

        Ipv4Cidr::new(address, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}
