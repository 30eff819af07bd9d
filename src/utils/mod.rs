pub mod ip;
pub mod precision;
