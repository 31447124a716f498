pub mod anchor;
pub mod quote;
