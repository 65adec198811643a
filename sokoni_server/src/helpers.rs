use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use log::*;
use regex::Regex;

/// Tries to determine the remote IP address of the peer making the request.
///
/// Headers are only consulted when the corresponding flag is set, since they are trivially spoofed unless a
/// trusted reverse proxy strips and rewrites them. The order of precedence is `X-Forwarded-For`, then
/// `Forwarded`, then the peer address of the connection itself.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    if use_x_forwarded_for {
        if let Some(ip) = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip_str)
        {
            trace!("💻️ Using X-Forwarded-For header to determine remote IP: {ip}");
            return Some(ip);
        }
    }
    if use_forwarded {
        let re = Regex::new(r#"for=(?P<ip>[^;,\s]+)"#).unwrap();
        if let Some(ip) = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| re.captures(v))
            .and_then(|caps| caps.name("ip"))
            .and_then(|m| parse_ip_str(m.as_str()))
        {
            trace!("💻️ Using Forwarded header to determine remote IP: {ip}");
            return Some(ip);
        }
    }
    let peer = req.connection_info().peer_addr().and_then(parse_ip_str);
    debug!("💻️ Using connection peer address as remote IP: {peer:?}");
    peer
}

/// Parses an IP address from a header value fragment. Accepts a bare address, an `ip:port` pair, and the
/// quoted bracketed forms the `Forwarded` header uses for IPv6. For comma-separated lists, the first (i.e.
/// the client-most) entry wins.
pub fn parse_ip_str(value: &str) -> Option<IpAddr> {
    let first = value.split(',').next()?.trim().trim_matches('"');
    if let Ok(ip) = first.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = first.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    // "[2001:db8::1]" without a port
    first.strip_prefix('[').and_then(|s| s.strip_suffix(']')).and_then(|s| s.parse::<IpAddr>().ok())
}
