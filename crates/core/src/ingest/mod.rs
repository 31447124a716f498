pub mod fmp;
pub mod provider;
pub mod twelve_data;
pub mod types;
