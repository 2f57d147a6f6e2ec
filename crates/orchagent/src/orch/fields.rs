//! Field parsing shared by the DASH tables.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use sonic_orch_common::KeyOpFieldsValues;
use sonic_sai::AddrFamily;

/// Returns a mandatory field or a message naming it.
pub fn required_field<'a>(entry: &'a KeyOpFieldsValues, field: &str) -> Result<&'a str, String> {
    entry
        .get_field(field)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing field {}", field))
}

/// Parses an optional field, `None` when absent or empty.
pub fn optional_field<T: FromStr>(
    entry: &KeyOpFieldsValues,
    field: &str,
) -> Result<Option<T>, String> {
    match entry.get_field(field).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid {}: {}", field, value)),
        None => Ok(None),
    }
}

pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "enabled" | "up" => Ok(true),
        "false" | "0" | "disabled" | "down" => Ok(false),
        _ => Err(format!("invalid boolean: {}", value)),
    }
}

/// Parses `aa:bb:cc:dd:ee:ff` (or `-` separated).
pub fn parse_mac(value: &str) -> Result<[u8; 6], String> {
    let mut mac = [0u8; 6];
    let mut parts = value.split(|c| c == ':' || c == '-');
    for byte in mac.iter_mut() {
        let part = parts
            .next()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| format!("invalid MAC address: {}", value))?;
        *byte = u8::from_str_radix(part, 16)
            .map_err(|_| format!("invalid MAC address: {}", value))?;
    }
    if parts.next().is_some() {
        return Err(format!("invalid MAC address: {}", value));
    }
    Ok(mac)
}

/// An IP prefix with the host bits left as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub len: u8,
}

impl IpPrefix {
    pub fn family(&self) -> AddrFamily {
        AddrFamily::of(&self.addr)
    }
}

impl FromStr for IpPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (s, None),
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid prefix: {}", s))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let len = match len {
            Some(len) => len
                .parse::<u8>()
                .ok()
                .filter(|l| *l <= max)
                .ok_or_else(|| format!("invalid prefix length: {}", s))?,
            None => max,
        };
        Ok(Self { addr, len })
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_prefix() {
        let p: IpPrefix = "10.1.0.0/16".parse().unwrap();
        assert_eq!(p.len, 16);
        assert_eq!(p.family(), AddrFamily::Ipv4);

        let p: IpPrefix = "2001:db8::/64".parse().unwrap();
        assert_eq!(p.family(), AddrFamily::Ipv6);
        assert_eq!(p.to_string(), "2001:db8::/64");

        let host: IpPrefix = "1.1.1.1".parse().unwrap();
        assert_eq!(host.len, 32);

        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("vnet/24".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(
            parse_mac("00:11:22:aa:bb:cc").unwrap(),
            [0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]
        );
        assert!(parse_mac("00:11:22:aa:bb").is_err());
        assert!(parse_mac("00:11:22:aa:bb:cc:dd").is_err());
        assert!(parse_mac("zz:11:22:aa:bb:cc").is_err());
    }

    #[test]
    fn test_fields() {
        let entry = KeyOpFieldsValues::set(
            "Vnet1",
            vec![
                ("vni".to_string(), "100".to_string()),
                ("guid".to_string(), String::new()),
            ],
        );
        assert_eq!(required_field(&entry, "vni"), Ok("100"));
        assert!(required_field(&entry, "guid").is_err());
        assert_eq!(optional_field::<u32>(&entry, "vni"), Ok(Some(100)));
        assert_eq!(optional_field::<u32>(&entry, "guid"), Ok(None));
        assert!(parse_bool("maybe").is_err());
    }
}
