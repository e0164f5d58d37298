mod bitfield;
mod message;
mod piece;
mod request;

pub use bitfield::Bitfield;
pub use message::{Message, MessageError, MessageId};
pub use piece::PieceBlock;
pub use request::Request;
