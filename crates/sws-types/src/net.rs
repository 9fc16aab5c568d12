//! Network value types stored in attributes.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SwitchError;

/// 48-bit MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut out {
            let part = parts
                .next()
                .ok_or_else(|| SwitchError::invalid(format!("short MAC address {s:?}")))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|e| SwitchError::invalid(format!("bad MAC address {s:?}: {e}")))?;
        }
        if parts.next().is_some() {
            return Err(SwitchError::invalid(format!("long MAC address {s:?}")));
        }
        Ok(Self(out))
    }
}

/// IP prefix: an address plus prefix length.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub len: u8,
}

impl IpPrefix {
    /// Build a prefix, rejecting lengths longer than the address family allows.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, SwitchError> {
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if len > max {
            return Err(SwitchError::invalid(format!(
                "prefix length {len} exceeds {max}"
            )));
        }
        Ok(Self { addr, len })
    }
}

impl Default for IpPrefix {
    fn default() -> Self {
        Self {
            addr: IpAddr::from([0, 0, 0, 0]),
            len: 0,
        }
    }
}

impl fmt::Debug for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IpPrefix({self})")
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for IpPrefix {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| SwitchError::invalid(format!("prefix {s:?} missing '/'")))?;
        let addr = addr
            .parse::<IpAddr>()
            .map_err(|e| SwitchError::invalid(format!("bad prefix address {addr:?}: {e}")))?;
        let len = len
            .parse::<u8>()
            .map_err(|e| SwitchError::invalid(format!("bad prefix length {len:?}: {e}")))?;
        Self::new(addr, len)
    }
}

/// Inclusive numeric range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: u32,
    pub max: u32,
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl FromStr for ValueRange {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| SwitchError::invalid(format!("range {s:?} missing '-'")))?;
        let parse = |v: &str| {
            v.parse::<u32>()
                .map_err(|e| SwitchError::invalid(format!("bad range bound {v:?}: {e}")))
        };
        Ok(Self {
            min: parse(min)?,
            max: parse(max)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display_and_parse() {
        let mac = MacAddr([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]);
        assert_eq!(mac.to_string(), "00:1b:21:aa:bb:cc");
        assert_eq!("00:1b:21:aa:bb:cc".parse::<MacAddr>().unwrap(), mac);
        assert!("00:1b:21".parse::<MacAddr>().is_err());
        assert!("00:1b:21:aa:bb:cc:dd".parse::<MacAddr>().is_err());
    }

    #[test]
    fn prefix_display_and_parse() {
        let p: IpPrefix = "10.0.0.0/8".parse().unwrap();
        assert_eq!(p.len, 8);
        assert_eq!(p.to_string(), "10.0.0.0/8");
        let v6: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert!(v6.addr.is_ipv6());
    }

    #[test]
    fn prefix_rejects_overlong_length() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("::/129".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn range_display_and_parse() {
        let r: ValueRange = "100-200".parse().unwrap();
        assert_eq!(r, ValueRange { min: 100, max: 200 });
        assert_eq!(r.to_string(), "100-200");
        assert!("100".parse::<ValueRange>().is_err());
    }
}
