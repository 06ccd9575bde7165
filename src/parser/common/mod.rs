pub mod utils;
pub mod zipmap;
pub mod ziplist;

pub use ziplist::{read_ziplist_entry_string, read_ziplist_metadata};
pub use zipmap::{count_zipmap_items, read_zipmap_item};
