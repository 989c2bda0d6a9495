//! MySQL implementation of the relational source boundary.

pub mod client;
pub mod stream;

pub use stream::MysqlSource;
