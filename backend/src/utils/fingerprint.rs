//! Compact client fingerprints derived from the request origin address.
//!
//! A fingerprint is the IPv4 address packed big-endian into a `u32`, so the
//! mapping is lossless in both directions. IPv6 origins only fingerprint when
//! they are IPv4-mapped (`::ffff:a.b.c.d`); anything else is rejected rather
//! than truncated.

use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("client address unavailable")]
    Unavailable,
    #[error("malformed client address: {0}")]
    Malformed(String),
    #[error("client address {0} cannot be fingerprinted (IPv4 only)")]
    Unsupported(IpAddr),
}

pub fn encode(ip: &str) -> Result<u32, FingerprintError> {
    let addr: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| FingerprintError::Malformed(ip.to_string()))?;
    encode_addr(addr)
}

pub fn encode_addr(addr: IpAddr) -> Result<u32, FingerprintError> {
    match addr {
        IpAddr::V4(v4) => Ok(u32::from(v4)),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(u32::from)
            .ok_or(FingerprintError::Unsupported(addr)),
    }
}

pub fn decode(fingerprint: u32) -> String {
    Ipv4Addr::from(fingerprint).to_string()
}
