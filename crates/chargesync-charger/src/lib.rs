//! Charges and refunds through the external accounting tool
//!
//! [`GoldCharger`] implements [`Charger`](chargesync_core::Charger) by
//! running the tool's charge and refund programs synchronously, with their
//! output appended to a log file. [`ChargerEnv`] prepares the environment
//! those programs expect; [`drop_privileges`] switches to the configured
//! unprivileged account before anything is charged.

mod command;
pub mod env;
pub mod error;
pub mod gold;
#[cfg(unix)]
pub mod privileges;

pub use command::run_logged;
pub use env::ChargerEnv;
pub use error::{ChargerError, Result};
pub use gold::{GoldCharger, charge_args, refund_args};
#[cfg(unix)]
pub use privileges::drop_privileges;
