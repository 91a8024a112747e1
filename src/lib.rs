pub mod application;
pub mod cli;
pub mod domain;
pub mod io;
pub mod storage;

pub use application::{AppError, LedgerConfig, LedgerService};
pub use domain::*;
pub use storage::{MemoryStore, Repository, SqliteStore, Store};
