// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("CIDR {cidr} has host bits set (network address is {network})")]
    HostBitsSet { cidr: String, network: String },
}

/// IPv4 CIDR block value object
///
/// Represents a contiguous range of addresses in `address/prefix` form.
/// Invariants:
/// - Valid IPv4 address and prefix length 0-32
/// - Canonical: the address is the network address (no host bits set)
///
/// # Examples
///
/// ```rust
/// use vpc_topology::domain::CidrBlock;
///
/// let vpc = CidrBlock::new("10.0.0.0/16").unwrap();
/// let subnet = CidrBlock::new("10.0.1.0/24").unwrap();
/// assert!(vpc.contains(&subnet));
/// assert!(CidrBlock::new("10.0.1.7/24").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock(Ipv4Net);

impl CidrBlock {
    /// Parse a CIDR block
    ///
    /// # Invariants
    /// - `a.b.c.d/n` with n in 0-32
    /// - Host bits must be zero
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref().trim();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from separate address and prefix
    pub fn from_parts(address: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        let net = Ipv4Net::new(address, prefix_length)
            .map_err(|_| NetworkError::InvalidPrefixLength(prefix_length))?;

        // Invariant: canonical network address
        if net.trunc() != net {
            return Err(NetworkError::HostBitsSet {
                cidr: net.to_string(),
                network: net.trunc().to_string(),
            });
        }

        Ok(Self(net))
    }

    /// A single-address block (`/32`)
    pub fn host(address: Ipv4Addr) -> Self {
        Self(Ipv4Net::from(address))
    }

    /// The default route block `0.0.0.0/0`
    pub fn any() -> Self {
        Self(Ipv4Net::default())
    }

    /// Network (first) address
    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Broadcast (last) address
    pub fn broadcast(&self) -> Ipv4Addr {
        self.0.broadcast()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Number of addresses covered by the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len()))
    }

    /// Whether `other` lies entirely within this block (equal blocks included)
    pub fn contains(&self, other: &CidrBlock) -> bool {
        self.0.contains(&other.0)
    }

    pub fn contains_addr(&self, address: Ipv4Addr) -> bool {
        self.0.contains(&address)
    }

    /// Whether the two blocks share at least one address
    ///
    /// CIDR blocks are either nested or disjoint, so overlap reduces to
    /// containment in one direction or the other.
    pub fn overlaps(&self, other: &CidrBlock) -> bool {
        self.contains(other) || other.contains(self)
    }

    pub fn as_ipnet(&self) -> Ipv4Net {
        self.0
    }
}

impl Ord for CidrBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        u32::from(self.network())
            .cmp(&u32::from(other.network()))
            .then(self.prefix_len().cmp(&other.prefix_len()))
    }
}

impl PartialOrd for CidrBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CidrBlock {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CidrBlock> for String {
    fn from(cidr: CidrBlock) -> Self {
        cidr.to_string()
    }
}

impl From<Ipv4Net> for CidrBlock {
    fn from(net: Ipv4Net) -> Self {
        Self(net.trunc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_block() {
        let cidr = CidrBlock::new("10.0.0.0/16").unwrap();
        assert_eq!(cidr.network().to_string(), "10.0.0.0");
        assert_eq!(cidr.broadcast().to_string(), "10.0.255.255");
        assert_eq!(cidr.prefix_len(), 16);
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(CidrBlock::new("10.0.0.0").is_err());
        assert!(CidrBlock::new("999.0.0.0/8").is_err());
        assert!(CidrBlock::new("10.0.0.0/33").is_err());
        assert!(CidrBlock::new("10.0.0.0/abc").is_err());
    }

    #[test]
    fn test_host_bits_rejected() {
        let err = CidrBlock::new("10.0.0.5/24").unwrap_err();
        assert_eq!(
            err,
            NetworkError::HostBitsSet {
                cidr: "10.0.0.5/24".to_string(),
                network: "10.0.0.0/24".to_string(),
            }
        );
    }

    #[test]
    fn test_containment_and_overlap() {
        let vpc = CidrBlock::new("10.0.0.0/16").unwrap();
        let a = CidrBlock::new("10.0.0.0/24").unwrap();
        let c = CidrBlock::new("10.0.0.128/25").unwrap();
        let b = CidrBlock::new("10.0.10.0/24").unwrap();

        assert!(vpc.contains(&a));
        assert!(!a.contains(&vpc));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
        assert!(!a.overlaps(&b));
        assert!(a.contains(&a));
    }

    #[test]
    fn test_any_and_host() {
        let any = CidrBlock::any();
        assert_eq!(any.to_string(), "0.0.0.0/0");

        let host = CidrBlock::host("10.0.0.5".parse().unwrap());
        assert_eq!(host.prefix_len(), 32);
        assert!(any.contains(&host));
        assert!(CidrBlock::new("10.0.0.0/8").unwrap().contains(&host));
    }

    #[test]
    fn test_serde_as_string() {
        let cidr = CidrBlock::new("172.16.0.0/24").unwrap();
        let json = serde_json::to_string(&cidr).unwrap();
        assert_eq!(json, "\"172.16.0.0/24\"");

        let back: CidrBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cidr);

        assert!(serde_json::from_str::<CidrBlock>("\"172.16.0.1/24\"").is_err());
    }

    #[test]
    fn test_ordering() {
        let mut blocks = vec![
            CidrBlock::new("10.0.1.0/24").unwrap(),
            CidrBlock::new("10.0.0.0/24").unwrap(),
            CidrBlock::new("10.0.0.0/16").unwrap(),
        ];
        blocks.sort();
        assert_eq!(blocks[0].to_string(), "10.0.0.0/16");
        assert_eq!(blocks[1].to_string(), "10.0.0.0/24");
        assert_eq!(blocks[2].to_string(), "10.0.1.0/24");
    }
}
