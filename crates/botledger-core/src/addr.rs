//! Canonical IP address handling.
//!
//! Every address entering the ledger goes through [`parse_ip`] so that
//! equivalent spellings (`::FFFF:10.0.0.5`, `::ffff:a00:5`, `10.0.0.5`)
//! collapse onto a single record key.

use std::net::IpAddr;

use crate::error::{Error, Result};

/// Parse an address literal, normalising IPv4-mapped IPv6 to IPv4.
///
/// Surrounding whitespace is ignored. Anything else that is not a bare
/// IPv4 or IPv6 literal (ports, CIDR suffixes, hostnames) is rejected.
pub fn parse_ip(input: &str) -> Result<IpAddr> {
    let trimmed = input.trim();
    let addr: IpAddr = trimmed
        .parse()
        .map_err(|_| Error::InvalidAddress(input.to_string()))?;

    Ok(match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 @ IpAddr::V4(_) => v4,
    })
}

/// Parse and render an address in its canonical textual form.
pub fn canonical_ip(input: &str) -> Result<String> {
    parse_ip(input).map(|ip| ip.to_string())
}
