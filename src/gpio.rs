use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::config::{DeviceId, Direction, LineConfig};
use crate::error::DeviceError;

pub trait GpioBackend: Send + Sync {
    fn claim(&self, line: &LineConfig) -> Result<(), DeviceError>;
    // Output lines start driven low
    fn set_direction(&self, pin: u32, direction: Direction) -> Result<(), DeviceError>;
    fn get_value(&self, pin: u32) -> Result<u8, DeviceError>;
    fn set_value(&self, pin: u32, value: u8) -> Result<(), DeviceError>;
    fn release(&self, pin: u32);
}

// Decimal ASCII, no leading zeros, no sign, no trailing NUL.
fn encode_value(value: u8, max: usize) -> Result<Vec<u8>, DeviceError> {
    let encoded = value.to_string().into_bytes();
    if encoded.len() > max {
        return Err(DeviceError::TransferFailed(format!(
            "encoded value {value} exceeds {max} byte transfer limit"
        )));
    }
    Ok(encoded)
}

// sscanf("%d")-style scan: leading whitespace and an optional sign are
// accepted, anything unparseable yields 0.
fn parse_value(data: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(data);
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

#[derive(Debug)]
pub struct GpioLineDevice<B: GpioBackend> {
    backend: Arc<B>,
    config: LineConfig,
    acquired: RwLock<bool>,
}

impl<B: GpioBackend> GpioLineDevice<B> {
    pub fn claim(backend: Arc<B>, config: LineConfig) -> Result<Self, DeviceError> {
        backend.claim(&config)?;

        if let Err(e) = backend.set_direction(config.pin, config.direction) {
            backend.release(config.pin);
            return Err(e);
        }

        debug!(
            "claimed pin {} as {} ({})",
            config.pin, config.label, config.direction
        );

        Ok(Self {
            backend,
            config,
            acquired: RwLock::new(true),
        })
    }

    pub fn pin(&self) -> u32 {
        self.config.pin
    }

    pub fn label(&self) -> &str {
        self.config.label
    }

    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    pub fn identity(&self) -> DeviceId {
        self.config.identity
    }

    pub fn read_value(&self, offset: u64, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let acquired = self.acquired.read();
        if !*acquired {
            return Err(DeviceError::NotClaimed(self.config.label.into()));
        }

        let value = self.backend.get_value(self.config.pin)?;
        let encoded = match encode_value(value, self.config.transfer_limit) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("read transfer failed on {}: {e}", self.config.label);
                return Err(e);
            }
        };

        if offset >= encoded.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let count = buf.len().min(encoded.len() - start);
        buf[..count].copy_from_slice(&encoded[start..start + count]);

        Ok(count)
    }

    pub fn write_value(&self, data: &[u8]) -> Result<usize, DeviceError> {
        let acquired = self.acquired.read();
        if !*acquired {
            return Err(DeviceError::NotClaimed(self.config.label.into()));
        }

        if self.config.direction != Direction::Output {
            return Err(DeviceError::NotWritable(self.config.label.into()));
        }

        if data.len() > self.config.transfer_limit {
            let e = DeviceError::TransferFailed(format!(
                "write of {} bytes exceeds {} byte transfer limit",
                data.len(),
                self.config.transfer_limit
            ));
            warn!("write transfer failed on {}: {e}", self.config.label);
            return Err(e);
        }

        let level = if parse_value(data) != 0 { 1 } else { 0 };
        self.backend.set_value(self.config.pin, level)?;

        // the full input counts as consumed, even though only a numeric
        // prefix was meaningful
        Ok(data.len())
    }

    pub fn release(&self) {
        let mut acquired = self.acquired.write();
        if !*acquired {
            return;
        }
        *acquired = false;

        self.backend.release(self.config.pin);
        debug!("released pin {} ({})", self.config.pin, self.config.label);
    }
}
