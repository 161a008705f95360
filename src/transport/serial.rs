//! # Serial P1 Source
//!
//! This module provides the implementation for reading the P1 byte stream
//! directly from the meter's serial port, using the line parameters of the
//! configured DSMR revision.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use tokio::io::AsyncReadExt;
use tokio::time::{timeout_at, Instant};
use tokio_serial::SerialPortBuilderExt;

use crate::constants::SOURCE_READ_TIMEOUT_SECS;
use crate::error::P1Error;
use crate::transport::{DsmrVersion, P1Source};

/// A P1 byte source backed by a serial port.
pub struct SerialSource {
    port: tokio_serial::SerialStream,
    timeout: Duration,
}

impl SerialSource {
    /// Opens the serial port with the line parameters of `version`.
    ///
    /// The read timeout mainly guards against wrong speed settings: a P1
    /// port pushes a telegram every few seconds, so prolonged silence means
    /// the parameters are wrong.
    pub async fn open(device: &str, version: DsmrVersion) -> Result<SerialSource, P1Error> {
        let profile = version.profile();
        let port = tokio_serial::new(device, profile.baud_rate)
            .data_bits(profile.data_bits)
            .parity(profile.parity)
            .stop_bits(profile.stop_bits)
            .open_native_async()
            .map_err(|e| P1Error::SerialPortError(e.to_string()))?;

        Ok(SerialSource {
            port,
            timeout: Duration::from_secs(SOURCE_READ_TIMEOUT_SECS),
        })
    }
}

#[async_trait]
impl P1Source for SerialSource {
    async fn read(&mut self, size: usize) -> Result<Vec<u8>, P1Error> {
        let deadline = Instant::now() + self.timeout;
        let mut data = Vec::with_capacity(size);

        while data.len() < size {
            let mut chunk = vec![0u8; size - data.len()];
            match timeout_at(deadline, self.port.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    warn!("EOF from serial port");
                    break;
                }
                Ok(Ok(n)) => data.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(P1Error::SerialPortError(e.to_string())),
                Err(_) => {
                    warn!("Timeout reading {size} bytes from serial port");
                    break;
                }
            }
        }

        Ok(data)
    }
}
