// SPDX-License-Identifier: GPL-3.0-or-later

//! Error taxonomy for the logger.
//!
//! The dominant invariant across this crate is "do no harm to the host
//! build": callers in `cc-logger-preload` handle every variant here by
//! logging and falling back to plain delegation, except
//! [`LoggerError::SymbolResolution`], which is the one case that is
//! supposed to surface to the caller.

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("required configuration is missing: {0}")]
    Configuration(&'static str),

    #[error("could not acquire resource: {0}")]
    ResourceAcquisition(String),

    #[error("dynamic linker could not resolve symbol: {0}")]
    SymbolResolution(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
