use bencoder::bencode::{Bencode, BencodeError};

use crate::peer::bt_peer::BtPeer;

/// `TrackerResponse` struct containing a tracker announce response.
///
/// To create a new `TrackerResponse` use the method builder `from()`.
#[derive(Debug)]
pub struct TrackerResponse {
    pub interval: i64,
    pub complete: i64,
    pub incomplete: i64,
    pub peers: Vec<BtPeer>,
}

/// Posible `TrackerResponse` errors.
#[derive(Debug)]
pub enum FromTrackerResponseError {
    DecodeResponseError(BencodeError),
    NotADict,
    InvalidPeers,
    FailureReason(String),
}

impl TrackerResponse {
    /// Builds a new `TrackerResponse` decoding a bencoded tracker response
    /// body.
    ///
    /// Peers come either as a compact 6-byte-per-peer string or as a list
    /// of dictionaries; malformed entries of a dictionary list are skipped
    /// rather than failing the whole response.
    ///
    /// It returns a `FromTrackerResponseError` if:
    /// - The body is not bencoded or not a dict.
    /// - The tracker reported a failure reason.
    /// - The peers field has an unknown shape.
    pub fn from(response: Vec<u8>) -> Result<TrackerResponse, FromTrackerResponseError> {
        let decoded = Bencode::decode(&response)
            .map_err(FromTrackerResponseError::DecodeResponseError)?;
        if decoded.as_dict().is_none() {
            return Err(FromTrackerResponseError::NotADict);
        }

        if let Some(reason) = decoded.lookup(b"failure reason") {
            let reason = reason.as_str().unwrap_or("unreadable reason").to_string();
            return Err(FromTrackerResponseError::FailureReason(reason));
        }

        let interval = decoded.lookup(b"interval").and_then(|v| v.as_int()).unwrap_or(0);
        let complete = decoded.lookup(b"complete").and_then(|v| v.as_int()).unwrap_or(0);
        let incomplete = decoded
            .lookup(b"incomplete")
            .and_then(|v| v.as_int())
            .unwrap_or(0);

        let peers = match decoded.lookup(b"peers") {
            Some(Bencode::Bytes(compact)) => Self::create_peers_from_compact(compact),
            Some(Bencode::List(list)) => Self::create_peers_from_dicts(list),
            _ => return Err(FromTrackerResponseError::InvalidPeers),
        };

        Ok(TrackerResponse {
            interval,
            complete,
            incomplete,
            peers,
        })
    }

    fn create_peers_from_compact(compact: &[u8]) -> Vec<BtPeer> {
        compact
            .chunks_exact(6)
            .map(|chunk| {
                let mut entry = [0u8; 6];
                entry.copy_from_slice(chunk);
                BtPeer::from_compact(&entry)
            })
            .collect()
    }

    fn create_peers_from_dicts(list: &[Bencode]) -> Vec<BtPeer> {
        list.iter()
            .filter_map(|entry| BtPeer::from_bencode(entry).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::net::Ipv4Addr;

    #[test]
    fn test_from_compact_response() {
        let mut peers = vec![];
        peers.extend([10, 0, 0, 1, 0x1a, 0xe1]);
        peers.extend([10, 0, 0, 2, 0x1a, 0xe2]);

        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::Int(900));
        dict.insert(b"complete".to_vec(), Bencode::Int(4));
        dict.insert(b"incomplete".to_vec(), Bencode::Int(2));
        dict.insert(b"peers".to_vec(), Bencode::Bytes(peers));

        let response = TrackerResponse::from(Bencode::Dict(dict).encode()).unwrap();

        assert_eq!(response.interval, 900);
        assert_eq!(response.complete, 4);
        assert_eq!(response.incomplete, 2);
        assert_eq!(
            response.peers,
            vec![
                BtPeer::new(Ipv4Addr::new(10, 0, 0, 1), 6881),
                BtPeer::new(Ipv4Addr::new(10, 0, 0, 2), 6882),
            ]
        );
    }

    #[test]
    fn test_from_compact_response_ignores_trailing_partial_entry() {
        let mut dict = BTreeMap::new();
        dict.insert(
            b"peers".to_vec(),
            Bencode::Bytes(vec![10, 0, 0, 1, 0x1a, 0xe1, 10, 0]),
        );

        let response = TrackerResponse::from(Bencode::Dict(dict).encode()).unwrap();

        assert_eq!(response.peers.len(), 1);
    }

    #[test]
    fn test_from_dict_list_response_skips_bad_entries() {
        let good = peer_dict("10.0.0.1", 6881);
        let bad = peer_dict("not-an-ip", 6881);

        let mut dict = BTreeMap::new();
        dict.insert(
            b"peers".to_vec(),
            Bencode::List(vec![Bencode::Dict(good), Bencode::Dict(bad)]),
        );

        let response = TrackerResponse::from(Bencode::Dict(dict).encode()).unwrap();

        assert_eq!(
            response.peers,
            vec![BtPeer::new(Ipv4Addr::new(10, 0, 0, 1), 6881)]
        );
    }

    #[test]
    fn test_from_response_with_failure_reason() {
        let mut dict = BTreeMap::new();
        dict.insert(
            b"failure reason".to_vec(),
            Bencode::Bytes(b"unregistered torrent".to_vec()),
        );

        let err = TrackerResponse::from(Bencode::Dict(dict).encode()).unwrap_err();

        assert!(matches!(err, FromTrackerResponseError::FailureReason(reason) if reason == "unregistered torrent"));
    }

    #[test]
    fn test_from_response_missing_peers() {
        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::Int(900));

        assert!(matches!(
            TrackerResponse::from(Bencode::Dict(dict).encode()),
            Err(FromTrackerResponseError::InvalidPeers)
        ));
    }

    #[test]
    fn test_from_response_not_bencode() {
        assert!(matches!(
            TrackerResponse::from(b"<html>tracker</html>".to_vec()),
            Err(FromTrackerResponseError::DecodeResponseError(_))
        ));
    }

    fn peer_dict(ip: &str, port: i64) -> BTreeMap<Vec<u8>, Bencode> {
        let mut dict = BTreeMap::new();
        dict.insert(b"ip".to_vec(), Bencode::Bytes(ip.as_bytes().to_vec()));
        dict.insert(b"port".to_vec(), Bencode::Int(port));
        dict
    }
}
