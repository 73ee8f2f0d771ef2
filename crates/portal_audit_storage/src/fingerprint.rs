//! Fingerprints of network identifiers.
//!
//! IP and MAC addresses are hashed in a canonical spelling so that the same
//! device groups together however the gateway wrote it.

use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Returns the lowercase hex SHA-256 digest of `value`.
///
/// Returns `None` for the empty string.
#[must_use]
pub fn fingerprint(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    Some(format!("{:x}", Sha256::digest(value.as_bytes())))
}

/// Canonical text of an IP address; unparseable input is lowercased as-is.
#[must_use]
pub fn canonical_ip(ip: &str) -> String {
    let ip = ip.trim();
    ip.parse::<IpAddr>()
        .map_or_else(|_| ip.to_ascii_lowercase(), |addr| addr.to_string())
}

/// Lowercase colon-separated form of a MAC address.
#[must_use]
pub fn canonical_mac(mac: &str) -> String {
    mac.trim().to_ascii_lowercase().replace('-', ":")
}

/// Fingerprint of the canonical form of `ip`.
#[must_use]
pub fn ip_fingerprint(ip: &str) -> Option<String> {
    fingerprint(&canonical_ip(ip))
}

/// Fingerprint of the canonical form of `mac`.
#[must_use]
pub fn mac_fingerprint(mac: &str) -> Option<String> {
    fingerprint(&canonical_mac(mac))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint("abc").as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(fingerprint(""), None);
        assert_eq!(fingerprint("10.0.0.1"), fingerprint("10.0.0.1"));
        assert_ne!(fingerprint("10.0.0.1"), fingerprint("10.0.0.2"));
    }

    #[test]
    fn canonical_forms() {
        assert_eq!(canonical_ip("2001:DB8:0:0::1"), "2001:db8::1");
        assert_eq!(canonical_ip(" 10.0.0.1 "), "10.0.0.1");
        assert_eq!(canonical_ip("Gateway"), "gateway");
        assert_eq!(canonical_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn spelling_does_not_change_fingerprint() {
        assert_eq!(
            mac_fingerprint("AA:BB:CC:DD:EE:FF"),
            mac_fingerprint("aa-bb-cc-dd-ee-ff")
        );
        assert_eq!(ip_fingerprint("2001:DB8::1"), ip_fingerprint("2001:db8:0::1"));
        assert_eq!(ip_fingerprint(""), None);
    }

    proptest! {
        #[test]
        fn fingerprint_hex_shape(text in ".+") {
            let fp = fingerprint(&text).unwrap();
            prop_assert_eq!(fp.len(), 64);
            prop_assert!(fp.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }
    }
}
