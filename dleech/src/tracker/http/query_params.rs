/// `QueryParams` struct containing the announce query parameters.
///
/// To create a new `QueryParams` use the method builder `new()`.
///
/// To build the query string use the method `build()`.
#[derive(Debug)]
pub struct QueryParams {
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    client_port: u16,
    left: u64,
}

impl QueryParams {
    /// Creates a new `QueryParams` from the binary info hash and peer id,
    /// the port we announce, and how many bytes are left to download.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], client_port: u16, left: u64) -> QueryParams {
        QueryParams {
            info_hash,
            peer_id,
            client_port,
            left,
        }
    }

    /// Builds the query string. The binary fields are percent-encoded
    /// byte by byte.
    pub fn build(&self) -> String {
        format!(
            "?info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1&event=started",
            percent_encode(&self.info_hash),
            percent_encode(&self.peer_id),
            self.client_port,
            self.left
        )
    }
}

/// Percent-encodes every byte as `%XX`; trackers accept over-encoding and
/// it keeps arbitrary hash bytes URL-safe.
fn percent_encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        encoded.push('%');
        encoded.push_str(&format!("{:02x}", byte));
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode_info_hash() {
        let info_hash: [u8; 20] = [
            0x2c, 0x6b, 0x68, 0x58, 0xd6, 0x1d, 0xa9, 0x54, 0x3d, 0x42, 0x31, 0xa7, 0x1d, 0xb4,
            0xb1, 0xc9, 0x26, 0x4b, 0x06, 0x85,
        ];

        assert_eq!(
            percent_encode(&info_hash),
            "%2c%6b%68%58%d6%1d%a9%54%3d%42%31%a7%1d%b4%b1%c9%26%4b%06%85"
        );
    }

    #[test]
    fn test_percent_encode_empty() {
        assert_eq!(percent_encode(&[]), "");
    }

    #[test]
    fn test_query_params_build() {
        let query = QueryParams::new([0xab; 20], *b"-DL0001-abcdefghijkl", 6881, 81920).build();

        assert!(query.starts_with("?info_hash=%ab%ab"));
        assert!(query.contains("&peer_id=%2d%44%4c%30%30%30%31%2d"));
        assert!(query.contains("&port=6881"));
        assert!(query.contains("&uploaded=0"));
        assert!(query.contains("&downloaded=0"));
        assert!(query.contains("&left=81920"));
        assert!(query.contains("&compact=1"));
        assert!(query.ends_with("&event=started"));
    }
}
