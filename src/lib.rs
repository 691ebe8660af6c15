pub mod config;
pub mod currency;
pub mod performance;
pub mod pp;
pub mod trades;
