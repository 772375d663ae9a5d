//! Value normalization rules
//!
//! Every raw value is reduced to a canonical form before deduplication so
//! that `Example.COM`, `example.com.` and `example.com` fold into one
//! entity. Unparseable IPs normalize to the empty string, which the
//! correlation engine treats as "drop this entity".

use std::net::{IpAddr, Ipv4Addr};

use crate::EntityKind;

/// Compute the canonical form of a raw value for the given kind.
///
/// Returns an empty string when the value cannot be canonicalized; callers
/// drop such entities.
pub fn canonical_value(kind: EntityKind, raw: &str) -> String {
    let trimmed = raw.trim();
    match kind {
        EntityKind::Domain => trimmed.trim_end_matches('.').to_lowercase(),
        EntityKind::Ip => canonical_ip(trimmed).unwrap_or_default(),
        EntityKind::Email => trimmed.to_lowercase(),
        EntityKind::Person | EntityKind::Organization => {
            collapse_whitespace(trimmed).to_lowercase()
        }
        EntityKind::Other => trimmed.to_string(),
    }
}

/// Canonicalize an IP address string.
///
/// `std::net` parsing already compresses IPv6 and lowercases hex; dotted
/// quads with leading zeros are rejected by the std parser (octal
/// ambiguity), so those are re-assembled octet by octet.
pub fn canonical_ip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();

    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() != 4 {
        return None;
    }

    let mut octets = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || part.len() > 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: u32 = part.parse().ok()?;
        if value > 255 {
            return None;
        }
        octets[i] = value as u8;
    }

    Some(Ipv4Addr::from(octets).to_string())
}

/// Extract the domain part of a canonical email address.
pub fn email_domain(email: &str) -> Option<&str> {
    let (local, domain) = email.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain)
}

/// True when `child` is a strict subdomain of `parent`.
pub fn is_subdomain_of(child: &str, parent: &str) -> bool {
    child.len() > parent.len() + 1 && child.ends_with(parent) && {
        let boundary = child.len() - parent.len() - 1;
        child.as_bytes()[boundary] == b'.'
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
