//! Common utilities and shared types for subscribe-rs.
//!
//! This crate provides foundational components used across all subscribe-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Clock**: Injectable time source via [`Clock`]
//!
//! # Example
//!
//! ```no_run
//! use subscribe_common::{AppResult, Clock, Config, IdGenerator, SystemClock};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let clock = SystemClock;
//!     let id = IdGenerator::new().generate_at(clock.now());
//!     println!("Generated ID: {id} for {}", config.database.url);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
