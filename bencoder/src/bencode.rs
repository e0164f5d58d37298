use std::collections::BTreeMap;

/// A decoded bencode value.
///
/// Dictionaries are kept as `BTreeMap` so re-encoding a decoded value is
/// canonical (keys in ascending byte order), which is what torrent info
/// hashes are computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bencode {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Bencode>),
    Dict(BTreeMap<Vec<u8>, Bencode>),
}

/// Posible bencode decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeError {
    UnexpectedEnd,
    UnexpectedByte(u8),
    InvalidInt,
    InvalidLength,
    InvalidDictKey,
}

impl Bencode {
    /// Decodes a single bencode value from the start of `data`.
    ///
    /// Trailing bytes after the first complete value are tolerated; tracker
    /// responses occasionally carry them.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bencoder::bencode::Bencode;
    ///
    /// let bencode = Bencode::decode(b"5:hello").unwrap();
    /// assert_eq!(bencode, Bencode::Bytes(b"hello".to_vec()));
    ///
    /// let bencode = Bencode::decode(b"i-42e").unwrap();
    /// assert_eq!(bencode, Bencode::Int(-42));
    /// ```
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        Decoder { data, pos: 0 }.parse_value()
    }

    /// Encodes the value back into its canonical byte form.
    ///
    /// ```rust
    /// use bencoder::bencode::Bencode;
    ///
    /// let value = Bencode::List(vec![Bencode::Int(1), Bencode::Bytes(b"ab".to_vec())]);
    /// assert_eq!(value.encode(), b"li1e2:abe");
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Bencode::Int(n) => {
                out.push(b'i');
                out.extend(n.to_string().into_bytes());
                out.push(b'e');
            }
            Bencode::Bytes(s) => {
                out.extend(s.len().to_string().into_bytes());
                out.push(b':');
                out.extend_from_slice(s);
            }
            Bencode::List(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Bencode::Dict(entries) => {
                out.push(b'd');
                for (key, value) in entries {
                    out.extend(key.len().to_string().into_bytes());
                    out.push(b':');
                    out.extend_from_slice(key);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Bencode::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Bencode::Bytes(s) => Some(s),
            _ => None,
        }
    }

    /// The value as UTF-8 text, if it is a valid UTF-8 byte string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bencode::Bytes(s) => std::str::from_utf8(s).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Bencode]> {
        match self {
            Bencode::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Bencode>> {
        match self {
            Bencode::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks a key up in a dictionary value. Returns `None` for non-dicts.
    pub fn lookup(&self, key: &[u8]) -> Option<&Bencode> {
        self.as_dict().and_then(|d| d.get(key))
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEnd)
    }

    fn parse_value(&mut self) -> Result<Bencode, BencodeError> {
        match self.peek()? {
            b'i' => self.parse_int(),
            b'l' => self.parse_list(),
            b'd' => self.parse_dict(),
            b'0'..=b'9' => self.parse_bytes(),
            other => Err(BencodeError::UnexpectedByte(other)),
        }
    }

    fn parse_int(&mut self) -> Result<Bencode, BencodeError> {
        self.pos += 1;
        let end = self.find(b'e')?;
        let text =
            std::str::from_utf8(&self.data[self.pos..end]).map_err(|_| BencodeError::InvalidInt)?;
        let number = text.parse::<i64>().map_err(|_| BencodeError::InvalidInt)?;
        self.pos = end + 1;
        Ok(Bencode::Int(number))
    }

    fn parse_bytes(&mut self) -> Result<Bencode, BencodeError> {
        let colon = self.find(b':')?;
        let text = std::str::from_utf8(&self.data[self.pos..colon])
            .map_err(|_| BencodeError::InvalidLength)?;
        let length = text
            .parse::<usize>()
            .map_err(|_| BencodeError::InvalidLength)?;
        let start = colon + 1;
        let end = start
            .checked_add(length)
            .ok_or(BencodeError::InvalidLength)?;
        if end > self.data.len() {
            return Err(BencodeError::UnexpectedEnd);
        }
        self.pos = end;
        Ok(Bencode::Bytes(self.data[start..end].to_vec()))
    }

    fn parse_list(&mut self) -> Result<Bencode, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.parse_value()?);
        }
        self.pos += 1;
        Ok(Bencode::List(items))
    }

    fn parse_dict(&mut self) -> Result<Bencode, BencodeError> {
        self.pos += 1;
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key = match self.parse_value()? {
                Bencode::Bytes(key) => key,
                _ => return Err(BencodeError::InvalidDictKey),
            };
            let value = self.parse_value()?;
            entries.insert(key, value);
        }
        self.pos += 1;
        Ok(Bencode::Dict(entries))
    }

    /// Index of the next `byte` at or after the cursor.
    fn find(&self, byte: u8) -> Result<usize, BencodeError> {
        self.data[self.pos..]
            .iter()
            .position(|b| *b == byte)
            .map(|offset| self.pos + offset)
            .ok_or(BencodeError::UnexpectedEnd)
    }
}
