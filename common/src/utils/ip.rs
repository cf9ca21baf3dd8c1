use std::net::Ipv4Addr;

/// `in-addr.arpa` owner name used to look up the reverse name of `addr`.
pub fn reverse_address_to_ptr(addr: &Ipv4Addr) -> String {
    let [a, b, c, d] = addr.octets();
    format!("{d}.{c}.{b}.{a}.in-addr.arpa")
}

/// Removes the root label dot a DNS answer carries (`host.example.` -> `host.example`).
pub fn trim_root_label(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
