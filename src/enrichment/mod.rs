pub mod geo;
pub mod names;

/// Label shown for a display row.
///
/// The alias when one is known, else the raw address; prefixed with the
/// bracketed country code when the representative's origin is known.
/// Examples: "[US] dns.google", "nas.lan", "[DE] 88.198.1.4"
pub fn peer_label(alias: Option<&str>, address: &str, country: Option<&str>) -> String {
    let name = alias.unwrap_or(address);
    match country {
        Some(code) if !code.is_empty() => format!("[{code}] {name}"),
        _ => name.to_string(),
    }
}
