mod category;
mod ledger;
mod money;
mod passbook;
mod ratio;
mod transaction;

pub use category::*;
pub use ledger::*;
pub use money::*;
pub use passbook::*;
pub use ratio::*;
pub use transaction::*;
