mod account;
mod credit_pack;
mod ledger;

pub use account::*;
pub use credit_pack::*;
pub use ledger::*;
