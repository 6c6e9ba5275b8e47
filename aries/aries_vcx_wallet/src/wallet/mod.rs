pub mod base_wallet;
pub mod structs_io;
pub mod utils;
