pub mod include;
pub mod ptn_table;
pub mod models;
pub mod checksum;
pub mod unpack;
pub mod pack;
pub mod info;
