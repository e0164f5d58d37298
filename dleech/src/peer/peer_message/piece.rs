use super::message::{Message, MessageError, MessageId};

/// The decoded payload of a `piece` message: one block of data at `begin`
/// bytes into piece `index`.
#[derive(Debug, PartialEq, Eq)]
pub struct PieceBlock {
    pub index: u32,
    pub begin: u32,
    pub block: Vec<u8>,
}

impl PieceBlock {
    /// Splits a `piece` message payload into its fields.
    pub fn from_message(message: &Message) -> Result<PieceBlock, MessageError> {
        if message.payload.len() < 8 {
            return Err(MessageError::PayloadTooShort(MessageId::Piece));
        }

        let mut index = [0u8; 4];
        let mut begin = [0u8; 4];
        index.copy_from_slice(&message.payload[0..4]);
        begin.copy_from_slice(&message.payload[4..8]);

        Ok(PieceBlock {
            index: u32::from_be_bytes(index),
            begin: u32::from_be_bytes(begin),
            block: message.payload[8..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message() {
        let mut payload = vec![];
        payload.extend(3u32.to_be_bytes());
        payload.extend(16384u32.to_be_bytes());
        payload.extend([0xca, 0xfe, 0xba, 0xbe]);

        let block =
            PieceBlock::from_message(&Message::new(MessageId::Piece, payload)).unwrap();

        assert_eq!(block.index, 3);
        assert_eq!(block.begin, 16384);
        assert_eq!(block.block, vec![0xca, 0xfe, 0xba, 0xbe]);
    }

    #[test]
    fn test_from_message_empty_block() {
        let mut payload = vec![];
        payload.extend(0u32.to_be_bytes());
        payload.extend(0u32.to_be_bytes());

        let block =
            PieceBlock::from_message(&Message::new(MessageId::Piece, payload)).unwrap();

        assert!(block.block.is_empty());
    }

    #[test]
    fn test_from_message_short_payload() {
        let message = Message::new(MessageId::Piece, vec![0; 7]);

        assert!(PieceBlock::from_message(&message).is_err());
    }
}
