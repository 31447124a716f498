pub mod gist;
pub mod ledger;
