//! `host:port` splitting for scrape target addresses.

/// Split an address of the form `host:port` or `[host]:port`.
///
/// Returns `None` when there is no port separator, when an unbracketed host
/// contains further colons, or when brackets are unbalanced. The port is not
/// validated and may be empty.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let close = rest.find(']')?;
        let host = &rest[..close];
        let port = rest[close + 1..].strip_prefix(':')?;
        if host.contains('[') || port.contains(['[', ']', ':']) {
            return None;
        }
        return Some((host, port));
    }

    let colon = addr.rfind(':')?;
    let (host, port) = (&addr[..colon], &addr[colon + 1..]);
    if host.contains([':', '[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some((host, port))
}
