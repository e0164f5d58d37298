use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bencoder::bencode::Bencode;

/// One candidate peer endpoint handed to the swarm.
///
/// Identity is the `(ip, port)` pair; the same endpoint reported by two
/// trackers is the same peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BtPeer {
    pub ip: Ipv4Addr,
    pub port: u16,
}

/// Posible `BtPeer` errors
#[derive(Debug, PartialEq, Eq)]
pub enum BtPeerError {
    NotADict,
    InvalidIp,
    InvalidPort,
}

impl BtPeer {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Builds a `BtPeer` from one 6-byte entry of a compact peer list:
    /// four IP octets followed by a big-endian port.
    pub fn from_compact(chunk: &[u8; 6]) -> Self {
        Self {
            ip: Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]),
            port: u16::from_be_bytes([chunk[4], chunk[5]]),
        }
    }

    /// Builds a `BtPeer` from a bencoded peer dictionary of a non-compact
    /// tracker response.
    ///
    /// It returns a `BtPeerError` if:
    /// - The bencoded peer is not a dict.
    /// - The peer IP is missing or not a dotted IPv4 address.
    /// - The peer port is missing or out of range.
    pub fn from_bencode(bencode: &Bencode) -> Result<BtPeer, BtPeerError> {
        if bencode.as_dict().is_none() {
            return Err(BtPeerError::NotADict);
        }

        let ip = bencode
            .lookup(b"ip")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Ipv4Addr>().ok())
            .ok_or(BtPeerError::InvalidIp)?;

        let port = match bencode.lookup(b"port").and_then(|v| v.as_int()) {
            Some(n) if (1..=u16::MAX as i64).contains(&n) => n as u16,
            _ => return Err(BtPeerError::InvalidPort),
        };

        Ok(BtPeer { ip, port })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }

    /// The `ip:port` string used as this peer's identity in piece
    /// assignment bookkeeping.
    pub fn endpoint(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BtPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_from_compact() {
        let peer = BtPeer::from_compact(&[127, 0, 0, 1, 0x1a, 0xe1]);

        assert_eq!(peer.ip, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(peer.port, 6881);
    }

    #[test]
    fn test_from_bencode() {
        let mut dict = BTreeMap::new();
        dict.insert(b"ip".to_vec(), Bencode::Bytes(b"10.0.0.2".to_vec()));
        dict.insert(b"port".to_vec(), Bencode::Int(6868));
        dict.insert(b"peer id".to_vec(), Bencode::Bytes(b"irrelevant".to_vec()));

        let peer = BtPeer::from_bencode(&Bencode::Dict(dict)).unwrap();

        assert_eq!(peer.ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(peer.port, 6868);
    }

    #[test]
    fn test_from_bencode_rejects_hostname() {
        let mut dict = BTreeMap::new();
        dict.insert(b"ip".to_vec(), Bencode::Bytes(b"seed.example.org".to_vec()));
        dict.insert(b"port".to_vec(), Bencode::Int(6868));

        assert_eq!(
            BtPeer::from_bencode(&Bencode::Dict(dict)).unwrap_err(),
            BtPeerError::InvalidIp
        );
    }

    #[test]
    fn test_from_bencode_rejects_bad_port() {
        let mut dict = BTreeMap::new();
        dict.insert(b"ip".to_vec(), Bencode::Bytes(b"10.0.0.2".to_vec()));
        dict.insert(b"port".to_vec(), Bencode::Int(70000));

        assert_eq!(
            BtPeer::from_bencode(&Bencode::Dict(dict)).unwrap_err(),
            BtPeerError::InvalidPort
        );
    }

    #[test]
    fn test_endpoint() {
        let peer = BtPeer::new(Ipv4Addr::new(192, 168, 1, 4), 51413);
        assert_eq!(peer.endpoint(), "192.168.1.4:51413");
    }
}
