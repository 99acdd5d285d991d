//! Install single-executable releases from GitHub and keep track of them
//!
//! - [`install`] - The download, extract and install pipeline plus the
//!   [`Installer`](install::Installer) that drives it
//! - [`store`] - The JSON record of installed binaries
//! - [`config`] - Paths, platform tokens and API settings

pub mod config;
pub mod error;
pub mod install;
pub mod store;

pub use error::{Error, Result};
