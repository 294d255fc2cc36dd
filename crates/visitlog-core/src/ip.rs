//! Client IP resolution and salted one-way hashing

use crate::config::Salt;
use ring::digest::{Context, SHA256};
use std::net::SocketAddr;

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Resolve the client IP for a request.
///
/// Forwarded-for values win over the socket address: the first non-empty
/// comma-separated entry across all values is used. An IPv4-mapped IPv6
/// prefix is stripped. Returns an empty string when nothing is available.
pub fn normalize_client_ip<'a, I>(forwarded_for: I, socket: Option<&SocketAddr>) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let forwarded = forwarded_for
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .find(|entry| !entry.is_empty());

    let candidate = match forwarded {
        Some(entry) => entry.to_string(),
        None => socket.map(|addr| addr.ip().to_string()).unwrap_or_default(),
    };

    strip_ipv4_mapped(&candidate).to_string()
}

fn strip_ipv4_mapped(ip: &str) -> &str {
    match ip.get(..IPV4_MAPPED_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) => {
            &ip[IPV4_MAPPED_PREFIX.len()..]
        }
        _ => ip,
    }
}

/// Salted SHA-256 of client IPs.
///
/// Deterministic for a given salt so requests from one client correlate
/// without the raw address ever being stored.
#[derive(Clone)]
pub struct IpHasher {
    salt: Salt,
}

impl IpHasher {
    pub fn new(salt: Salt) -> Self {
        Self { salt }
    }

    /// Hex digest of `sha256(ip || salt)`, or `None` for an empty IP
    pub fn hash(&self, ip: &str) -> Option<String> {
        if ip.is_empty() {
            return None;
        }

        let mut context = Context::new(&SHA256);
        context.update(ip.as_bytes());
        context.update(self.salt.as_bytes());
        Some(hex::encode(context.finish().as_ref()))
    }
}

impl std::fmt::Debug for IpHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpHasher").field("salt", &self.salt).finish()
    }
}
