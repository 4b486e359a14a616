pub mod adapters;
pub mod daemon;
pub mod notify;
pub mod prelude;

pub use tidewatch_core as core;
pub use tidewatch_evm as evm;
pub use tidewatch_redb as redb;
