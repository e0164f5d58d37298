use bencoder::bencode::Bencode;

/// One file of the torrent payload.
///
/// `offset` is the byte offset of the file's first byte within the
/// concatenated payload; single-file torrents have one record at offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: Vec<String>,
    pub length: u64,
    pub offset: u64,
}

/// The info dictionary of a torrent, with both single-file and multi-file
/// layouts normalized into a `FileRecord` sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub piece_length: u64,
    pub piece_hashes: Vec<[u8; 20]>,
    pub total_length: u64,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FromInfoError {
    NotADict,
    MissingName,
    MissingPieceLength,
    MissingPieces,
    MissingLength,
    InvalidPieces,
    InvalidFiles,
    InvalidPath,
    PieceCountMismatch,
    EmptyPayload,
}

impl Info {
    /// Builds an `Info` from a decoded info dictionary.
    ///
    /// Validates the piece geometry: the hash blob splits into whole 20-byte
    /// digests and their count matches `ceil(total_length / piece_length)`,
    /// which also pins the last piece's size into `(0, piece_length]`.
    pub fn from(bencode: &Bencode) -> Result<Info, FromInfoError> {
        if bencode.as_dict().is_none() {
            return Err(FromInfoError::NotADict);
        }

        let name = bencode
            .lookup(b"name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(FromInfoError::MissingName)?;

        let piece_length = match bencode.lookup(b"piece length").and_then(|v| v.as_int()) {
            Some(n) if n > 0 => n as u64,
            _ => return Err(FromInfoError::MissingPieceLength),
        };

        let pieces = bencode
            .lookup(b"pieces")
            .and_then(|v| v.as_bytes())
            .ok_or(FromInfoError::MissingPieces)?;
        if pieces.is_empty() || pieces.len() % 20 != 0 {
            return Err(FromInfoError::InvalidPieces);
        }
        let piece_hashes: Vec<[u8; 20]> = pieces
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let files = match bencode.lookup(b"files") {
            Some(list) => Self::create_files(list)?,
            None => Self::create_single_file(bencode, &name)?,
        };

        let total_length = files.iter().map(|f| f.length).sum();
        if total_length == 0 {
            return Err(FromInfoError::EmptyPayload);
        }

        let expected_pieces = (total_length + piece_length - 1) / piece_length;
        if expected_pieces != piece_hashes.len() as u64 {
            return Err(FromInfoError::PieceCountMismatch);
        }

        Ok(Info {
            name,
            piece_length,
            piece_hashes,
            total_length,
            files,
        })
    }

    fn create_single_file(bencode: &Bencode, name: &str) -> Result<Vec<FileRecord>, FromInfoError> {
        let length = match bencode.lookup(b"length").and_then(|v| v.as_int()) {
            Some(n) if n >= 0 => n as u64,
            _ => return Err(FromInfoError::MissingLength),
        };
        Ok(vec![FileRecord {
            path: vec![name.to_string()],
            length,
            offset: 0,
        }])
    }

    fn create_files(bencode: &Bencode) -> Result<Vec<FileRecord>, FromInfoError> {
        let list = bencode.as_list().ok_or(FromInfoError::InvalidFiles)?;

        let mut files = Vec::with_capacity(list.len());
        let mut offset = 0u64;
        for entry in list {
            let length = match entry.lookup(b"length").and_then(|v| v.as_int()) {
                Some(n) if n >= 0 => n as u64,
                _ => return Err(FromInfoError::InvalidFiles),
            };
            let path = Self::create_path(entry)?;
            files.push(FileRecord {
                path,
                length,
                offset,
            });
            offset += length;
        }
        if files.is_empty() {
            return Err(FromInfoError::InvalidFiles);
        }
        Ok(files)
    }

    fn create_path(entry: &Bencode) -> Result<Vec<String>, FromInfoError> {
        let segments = entry
            .lookup(b"path")
            .and_then(|v| v.as_list())
            .ok_or(FromInfoError::InvalidFiles)?;

        let mut path = Vec::with_capacity(segments.len());
        for segment in segments {
            let segment = segment.as_str().ok_or(FromInfoError::InvalidPath)?;
            // Torrents name files, they do not get to walk out of the download directory.
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('/')
                || segment.contains('\\')
            {
                return Err(FromInfoError::InvalidPath);
            }
            path.push(segment.to_string());
        }
        if path.is_empty() {
            return Err(FromInfoError::InvalidPath);
        }
        Ok(path)
    }
}
