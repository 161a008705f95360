//! # P1 Byte Sources
//!
//! This module provides the transports a P1 telegram stream can arrive
//! over: the meter's serial port, or a TCP socket (e.g. a serial-to-network
//! bridge). Both expose the same byte-oriented read contract through the
//! [`P1Source`] trait; everything above it is transport-agnostic.

pub mod serial;
pub mod tcp;

pub use serial::SerialSource;
pub use tcp::TcpSource;

use async_trait::async_trait;
use tokio_serial::{DataBits, Parity, StopBits};

use crate::error::P1Error;

/// The DSMR protocol revision, which determines the serial line parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsmrVersion {
    /// DSMR 2.2: 9600 baud, 7 data bits, even parity
    V22,
    /// DSMR 4.0 and newer: 115200 baud, 8 data bits, no parity
    V40,
}

/// Serial port parameters for a DSMR revision.
#[derive(Debug, Clone, Copy)]
pub struct SerialProfile {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl DsmrVersion {
    pub fn profile(self) -> SerialProfile {
        match self {
            DsmrVersion::V22 => SerialProfile {
                baud_rate: 9600,
                data_bits: DataBits::Seven,
                parity: Parity::Even,
                stop_bits: StopBits::One,
            },
            DsmrVersion::V40 => SerialProfile {
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                parity: Parity::None,
                stop_bits: StopBits::One,
            },
        }
    }
}

/// A byte-oriented telegram source.
///
/// `read` returns fewer than `size` bytes only when the transport timed out
/// or closed; the ingestion driver treats a short read as fatal, since it
/// indicates a dead link or wrong line parameters rather than transient
/// loss.
#[async_trait]
pub trait P1Source: Send {
    async fn read(&mut self, size: usize) -> Result<Vec<u8>, P1Error>;
}
