//! Network segment matching.

use std::net::IpAddr;

use anyhow::{Context, bail};

/// Address block parsed from `addr/prefix` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    /// Parse `addr/prefix`. A bare address is a host block.
    ///
    /// # Errors
    ///
    /// Fails on a malformed address or a prefix longer than the address.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let network: IpAddr = addr
            .trim()
            .parse()
            .with_context(|| format!("invalid address in '{s}'"))?;
        let max = max_prefix(network);
        let prefix = match prefix {
            Some(p) => p
                .trim()
                .parse::<u8>()
                .with_context(|| format!("invalid prefix length in '{s}'"))?,
            None => max,
        };
        if prefix > max {
            bail!("prefix length {prefix} exceeds {max} in '{s}'");
        }
        Ok(Self { network, prefix })
    }

    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn max_prefix(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_u32(prefix: u8) -> u32 {
    u32::MAX
        .checked_shl(32 - u32::from(prefix))
        .unwrap_or(0)
}

fn mask_u128(prefix: u8) -> u128 {
    u128::MAX
        .checked_shl(128 - u32::from(prefix))
        .unwrap_or(0)
}
