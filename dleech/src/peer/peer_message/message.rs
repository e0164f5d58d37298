use std::io::{self, Read, Write};

/// Upper bound on a regular message body; anything larger than a block
/// message with generous slack is treated as a decode error.
const MAX_MESSAGE_LENGTH: u32 = 16384 * 10;

// IDs of the messages defined in the protocol. Unrecognized ids are carried
// as `Unknown` so the reader can consume and ignore them.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum MessageId {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have,
    Bitfield,
    Request,
    Piece,
    Cancel,
    Unknown(u8),
}

impl MessageId {
    fn from_byte(byte: u8) -> MessageId {
        match byte {
            0 => MessageId::Choke,
            1 => MessageId::Unchoke,
            2 => MessageId::Interested,
            3 => MessageId::NotInterested,
            4 => MessageId::Have,
            5 => MessageId::Bitfield,
            6 => MessageId::Request,
            7 => MessageId::Piece,
            8 => MessageId::Cancel,
            other => MessageId::Unknown(other),
        }
    }

    /// The wire byte of this id; `None` for keep-alive, which has none.
    fn to_byte(&self) -> Option<u8> {
        match self {
            MessageId::KeepAlive => None,
            MessageId::Choke => Some(0),
            MessageId::Unchoke => Some(1),
            MessageId::Interested => Some(2),
            MessageId::NotInterested => Some(3),
            MessageId::Have => Some(4),
            MessageId::Bitfield => Some(5),
            MessageId::Request => Some(6),
            MessageId::Piece => Some(7),
            MessageId::Cancel => Some(8),
            MessageId::Unknown(byte) => Some(*byte),
        }
    }
}

/// A regular peer message: a 4-byte big-endian length prefix framing an id
/// byte and its payload. A zero length prefix is a keep-alive.
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub enum MessageError {
    Io(io::Error),
    LengthTooLong(u32),
    PayloadTooShort(MessageId),
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn keep_alive() -> Self {
        Self::new(MessageId::KeepAlive, vec![])
    }

    /// Converts a `Message` to its framed byte form. A keep-alive encodes to
    /// exactly four zero bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        let id = match self.id.to_byte() {
            Some(id) => id,
            None => return vec![0; 4],
        };

        let len = self.payload.len() + 1;
        let mut bytes = Vec::with_capacity(4 + len);
        bytes.extend_from_slice(&(len as u32).to_be_bytes());
        bytes.push(id);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Reads exactly one framed message from the stream.
    ///
    /// Consumes the full announced length before returning, so the next
    /// read starts at a message boundary even for unknown ids.
    pub fn read_from(stream: &mut dyn Read) -> Result<Message, MessageError> {
        let mut length = [0u8; 4];
        stream.read_exact(&mut length).map_err(MessageError::Io)?;
        let len = u32::from_be_bytes(length);

        if len == 0 {
            return Ok(Message::keep_alive());
        }
        if len > MAX_MESSAGE_LENGTH {
            return Err(MessageError::LengthTooLong(len));
        }

        let mut body = vec![0; len as usize];
        stream.read_exact(&mut body).map_err(MessageError::Io)?;

        Ok(Message {
            id: MessageId::from_byte(body[0]),
            payload: body[1..].to_vec(),
        })
    }

    /// Writes the framed message to the stream.
    pub fn write_to(&self, stream: &mut dyn Write) -> Result<(), MessageError> {
        stream.write_all(&self.as_bytes()).map_err(MessageError::Io)
    }

    /// The piece index of a `have` payload.
    pub fn have_index(&self) -> Result<u32, MessageError> {
        if self.payload.len() < 4 {
            return Err(MessageError::PayloadTooShort(self.id.clone()));
        }
        Ok(u32::from_be_bytes([
            self.payload[0],
            self.payload[1],
            self.payload[2],
            self.payload[3],
        ]))
    }
}
