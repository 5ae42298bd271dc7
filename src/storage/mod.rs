//! The paged storage engine: row and node codecs, pager, B+Tree, cursor,
//! table façade, and the schema bootstrap.

pub mod btree;
pub mod column;
pub mod cursor;
pub mod encoding;
pub mod node;
pub mod pager;
pub mod row;
pub mod schema;
pub mod table;
