use std::{
    fs::File,
    io::{BufReader, Error, Read},
    path::Path,
};

use bencoder::bencode::{Bencode, BencodeError};

use super::metainfo::{FromMetainfoError, Metainfo};

#[derive(Debug)]
pub enum ParseError {
    IoError(Error),
    BencodeError(BencodeError),
    FromMetainfoError(FromMetainfoError),
}

pub struct MetainfoParser;

impl MetainfoParser {
    /// Given a path to a torrent file, it parses the file and returns a Metainfo struct.
    ///
    /// # Errors
    ///
    /// * `ParseError::IoError` - An error occurred while reading the file
    /// * `ParseError::BencodeError` - An error occurred while parsing the bencode
    /// * `ParseError::FromMetainfoError` - An error occurred while creating the Metainfo struct
    pub fn parse(filepath: &Path) -> Result<Metainfo, ParseError> {
        let buffer = Self::read_file(filepath).map_err(ParseError::IoError)?;

        let bencode = Bencode::decode(&buffer).map_err(ParseError::BencodeError)?;

        Metainfo::from(&bencode).map_err(ParseError::FromMetainfoError)
    }

    fn read_file(filepath: &Path) -> Result<Vec<u8>, Error> {
        let file = File::open(filepath)?;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();

        reader.read_to_end(&mut buffer)?;

        Ok(buffer)
    }
}
