use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, info, trace, warn};
use regex::Regex;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(parse_forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

/// Whether a courier webhook from `peer_ip` may proceed. Without a whitelist every peer is allowed; with one, the
/// peer must be on it, and a request whose address cannot be determined is refused.
pub fn is_whitelisted(peer_ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer_ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            info!("📬️ Courier webhook from {ip}");
            whitelist.contains(&ip)
        },
        (None, Some(_)) => {
            warn!("📬️ No IP address found in courier webhook request, denying access.");
            false
        },
    }
}

/// Extracts the `for=` address from a `Forwarded` header value.
pub fn parse_forwarded_for(header: &str) -> Option<IpAddr> {
    let re = match Regex::new(r#"(?i)for="?\[?(?P<ip>[^;,"\]]+)"#) {
        Ok(re) => re,
        Err(e) => {
            warn!("Could not compile the Forwarded header pattern. {e}");
            return None;
        },
    };
    re.captures(header).and_then(|caps| caps.name("ip")).and_then(|m| IpAddr::from_str(m.as_str().trim()).ok())
}
