pub mod info;
pub mod metainfo;
pub mod parser;
