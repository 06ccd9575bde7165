pub mod common;
pub mod dump;
mod hash;
mod list;
mod rdb;
mod set;
mod sorted_set;
mod stream;

pub use dump::decode_dump;
pub use rdb::{decode, RdbParser};
