pub mod migrate;
pub mod tree;
pub mod user;
