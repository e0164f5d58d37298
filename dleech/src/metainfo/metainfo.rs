use sha1::{Digest, Sha1};

use bencoder::bencode::Bencode;

use super::info::{FileRecord, FromInfoError, Info};

/// Parsed metainfo of a torrent: the info dictionary plus the announce URLs
/// and the 20-byte SHA-1 of the canonically encoded info dictionary.
///
/// Immutable once built; the swarm shares it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Metainfo {
    pub announce_list: Vec<Vec<String>>,
    pub info: Info,
    pub info_hash: [u8; 20],
}

#[derive(Debug, PartialEq, Eq)]
pub enum FromMetainfoError {
    NotADict,
    MissingAnnounce,
    MissingInfo,
    FromInfoError(FromInfoError),
}

impl Metainfo {
    /// Builds a `Metainfo` from a decoded torrent file.
    ///
    /// The info hash is computed over the re-encoding of the raw decoded
    /// info value, so keys this client does not model still count.
    pub fn from(bencode: &Bencode) -> Result<Metainfo, FromMetainfoError> {
        if bencode.as_dict().is_none() {
            return Err(FromMetainfoError::NotADict);
        }

        let info_value = bencode.lookup(b"info").ok_or(FromMetainfoError::MissingInfo)?;
        let info = Info::from(info_value).map_err(FromMetainfoError::FromInfoError)?;
        let info_hash: [u8; 20] = Sha1::digest(info_value.encode()).into();

        let announce_list = Self::create_announce_list(bencode)?;

        Ok(Metainfo {
            announce_list,
            info,
            info_hash,
        })
    }

    /// The tiered announce list, falling back to the single `announce` URL.
    fn create_announce_list(bencode: &Bencode) -> Result<Vec<Vec<String>>, FromMetainfoError> {
        if let Some(tiers) = bencode.lookup(b"announce-list").and_then(|v| v.as_list()) {
            let mut announce_list = Vec::new();
            for tier in tiers {
                let urls: Vec<String> = tier
                    .as_list()
                    .unwrap_or(&[])
                    .iter()
                    .filter_map(|url| url.as_str().map(str::to_string))
                    .collect();
                if !urls.is_empty() {
                    announce_list.push(urls);
                }
            }
            if !announce_list.is_empty() {
                return Ok(announce_list);
            }
        }

        match bencode.lookup(b"announce").and_then(|v| v.as_str()) {
            Some(url) => Ok(vec![vec![url.to_string()]]),
            None => Err(FromMetainfoError::MissingAnnounce),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn piece_length(&self) -> u64 {
        self.info.piece_length
    }

    pub fn total_length(&self) -> u64 {
        self.info.total_length
    }

    pub fn total_pieces(&self) -> u32 {
        self.info.piece_hashes.len() as u32
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.info.files
    }

    /// The actual byte size of piece `index`; only the last piece may be
    /// shorter than `piece_length`.
    pub fn piece_size(&self, index: u32) -> u64 {
        if index + 1 == self.total_pieces() {
            self.total_length() - index as u64 * self.piece_length()
        } else {
            self.piece_length()
        }
    }

    pub fn piece_hash(&self, index: u32) -> &[u8; 20] {
        &self.info.piece_hashes[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_from_metainfo_full() {
        let info_value = single_file_info("example", 40, 16, &[7u8; 60]);
        let expected_hash: [u8; 20] = Sha1::digest(info_value.encode()).into();

        let mut dict = BTreeMap::new();
        dict.insert(
            b"announce".to_vec(),
            Bencode::Bytes(b"http://example.com/announce".to_vec()),
        );
        dict.insert(b"info".to_vec(), info_value);

        let metainfo = Metainfo::from(&Bencode::Dict(dict)).unwrap();

        assert_eq!(
            metainfo.announce_list,
            vec![vec!["http://example.com/announce".to_string()]]
        );
        assert_eq!(metainfo.name(), "example");
        assert_eq!(metainfo.info_hash, expected_hash);
        assert_eq!(metainfo.total_pieces(), 3);
        assert_eq!(metainfo.total_length(), 40);
    }

    #[test]
    fn test_info_hash_covers_unmodeled_keys() {
        let plain = single_file_info("example", 40, 16, &[7u8; 60]);
        let mut extended = plain.as_dict().unwrap().clone();
        extended.insert(b"private".to_vec(), Bencode::Int(1));
        let extended = Bencode::Dict(extended);

        let plain_hash: [u8; 20] = Sha1::digest(plain.encode()).into();
        let extended_hash: [u8; 20] = Sha1::digest(extended.encode()).into();
        assert_ne!(plain_hash, extended_hash);

        let metainfo = Metainfo::from(&wrap("http://t/announce", extended)).unwrap();
        assert_eq!(metainfo.info_hash, extended_hash);
    }

    #[test]
    fn test_announce_list_tiers_preferred_over_announce() {
        let tiers = Bencode::List(vec![
            Bencode::List(vec![Bencode::Bytes(b"udp://a:1/announce".to_vec())]),
            Bencode::List(vec![Bencode::Bytes(b"http://b/announce".to_vec())]),
        ]);

        let mut dict = BTreeMap::new();
        dict.insert(
            b"announce".to_vec(),
            Bencode::Bytes(b"http://fallback/announce".to_vec()),
        );
        dict.insert(b"announce-list".to_vec(), tiers);
        dict.insert(b"info".to_vec(), single_file_info("example", 40, 16, &[7u8; 60]));

        let metainfo = Metainfo::from(&Bencode::Dict(dict)).unwrap();

        assert_eq!(
            metainfo.announce_list,
            vec![
                vec!["udp://a:1/announce".to_string()],
                vec!["http://b/announce".to_string()],
            ]
        );
    }

    #[test]
    fn test_from_metainfo_missing_announce() {
        let mut dict = BTreeMap::new();
        dict.insert(b"info".to_vec(), single_file_info("example", 40, 16, &[7u8; 60]));

        assert_eq!(
            Metainfo::from(&Bencode::Dict(dict)).unwrap_err(),
            FromMetainfoError::MissingAnnounce
        );
    }

    #[test]
    fn test_from_metainfo_missing_info() {
        let mut dict = BTreeMap::new();
        dict.insert(
            b"announce".to_vec(),
            Bencode::Bytes(b"http://example.com/announce".to_vec()),
        );

        assert_eq!(
            Metainfo::from(&Bencode::Dict(dict)).unwrap_err(),
            FromMetainfoError::MissingInfo
        );
    }

    #[test]
    fn test_piece_size_of_last_piece() {
        let metainfo =
            Metainfo::from(&wrap("http://t/announce", single_file_info("example", 40, 16, &[7u8; 60])))
                .unwrap();

        assert_eq!(metainfo.piece_size(0), 16);
        assert_eq!(metainfo.piece_size(1), 16);
        assert_eq!(metainfo.piece_size(2), 8);
    }

    // Auxiliary functions

    fn single_file_info(name: &str, length: i64, piece_length: i64, pieces: &[u8]) -> Bencode {
        let mut dict = BTreeMap::new();
        dict.insert(b"name".to_vec(), Bencode::Bytes(name.as_bytes().to_vec()));
        dict.insert(b"length".to_vec(), Bencode::Int(length));
        dict.insert(b"piece length".to_vec(), Bencode::Int(piece_length));
        dict.insert(b"pieces".to_vec(), Bencode::Bytes(pieces.to_vec()));
        Bencode::Dict(dict)
    }

    fn wrap(announce: &str, info: Bencode) -> Bencode {
        let mut dict = BTreeMap::new();
        dict.insert(
            b"announce".to_vec(),
            Bencode::Bytes(announce.as_bytes().to_vec()),
        );
        dict.insert(b"info".to_vec(), info);
        Bencode::Dict(dict)
    }
}
