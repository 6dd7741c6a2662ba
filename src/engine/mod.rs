// Transfer engine - the only code that moves account balances.

mod transfer;

pub use transfer::*;
