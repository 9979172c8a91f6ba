use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::config::{Direction, LineConfig};
use crate::error::DeviceError;
use crate::gpio::GpioBackend;

#[derive(Debug, Default)]
pub struct MockGpioBackend {
    pins: RwLock<HashMap<u32, Mutex<MockPinState>>>, // keyed by pin number
    fail_direction: Mutex<Vec<u32>>,
}

#[derive(Debug, Default)]
struct MockPinState {
    claimed_by: Option<String>,
    direction: Option<Direction>,
    value: u8, // line level persists across claim/release
}

impl MockGpioBackend {
    // Drive the line externally, as wired hardware would.
    pub fn drive(&self, pin: u32, value: u8) {
        if let Ok(mut pins) = self.pins.write() {
            let entry = pins.entry(pin).or_default();
            if let Ok(mut state) = entry.lock() {
                state.value = if value != 0 { 1 } else { 0 };
            }
        }
    }

    pub fn level(&self, pin: u32) -> u8 {
        self.pins
            .read()
            .ok()
            .and_then(|pins| {
                pins.get(&pin)
                    .and_then(|entry| entry.lock().ok().map(|state| state.value))
            })
            .unwrap_or(0)
    }

    pub fn is_claimed(&self, pin: u32) -> bool {
        self.pins
            .read()
            .ok()
            .and_then(|pins| {
                pins.get(&pin)
                    .and_then(|entry| entry.lock().ok().map(|state| state.claimed_by.is_some()))
            })
            .unwrap_or(false)
    }

    // Make the next set_direction on this pin fail.
    pub fn fail_next_direction_set(&self, pin: u32) {
        if let Ok(mut failures) = self.fail_direction.lock() {
            failures.push(pin);
        }
    }
}

impl GpioBackend for MockGpioBackend {
    fn claim(&self, line: &LineConfig) -> Result<(), DeviceError> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;

        let entry = pins.entry(line.pin).or_default();
        let mut state = entry
            .lock()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;

        if let Some(owner) = &state.claimed_by {
            return Err(DeviceError::PinUnavailable(format!(
                "pin {} already claimed by {owner}",
                line.pin
            )));
        }
        state.claimed_by = Some(line.label.to_string());

        Ok(())
    }

    fn set_direction(&self, pin: u32, direction: Direction) -> Result<(), DeviceError> {
        {
            let mut failures = self
                .fail_direction
                .lock()
                .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;
            if let Some(index) = failures.iter().position(|p| *p == pin) {
                failures.swap_remove(index);
                return Err(DeviceError::DirectionSetFailed(format!(
                    "injected fault on pin {pin}"
                )));
            }
        }

        let pins = self
            .pins
            .read()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = pins
            .get(&pin)
            .ok_or_else(|| DeviceError::NotClaimed(format!("pin {pin}")))?;
        let mut state = entry
            .lock()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;

        if state.claimed_by.is_none() {
            return Err(DeviceError::NotClaimed(format!("pin {pin}")));
        }

        state.direction = Some(direction);
        if direction == Direction::Output {
            state.value = 0;
        }

        Ok(())
    }

    fn get_value(&self, pin: u32) -> Result<u8, DeviceError> {
        let pins = self
            .pins
            .read()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = pins
            .get(&pin)
            .ok_or_else(|| DeviceError::NotClaimed(format!("pin {pin}")))?;
        let state = entry
            .lock()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;

        if state.claimed_by.is_none() {
            return Err(DeviceError::NotClaimed(format!("pin {pin}")));
        }

        Ok(state.value)
    }

    fn set_value(&self, pin: u32, value: u8) -> Result<(), DeviceError> {
        let pins = self
            .pins
            .read()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = pins
            .get(&pin)
            .ok_or_else(|| DeviceError::NotClaimed(format!("pin {pin}")))?;
        let mut state = entry
            .lock()
            .map_err(|e| DeviceError::Gpio(format!("lock poisoned: {e}")))?;

        if state.claimed_by.is_none() {
            return Err(DeviceError::NotClaimed(format!("pin {pin}")));
        }
        if state.direction != Some(Direction::Output) {
            return Err(DeviceError::Gpio(format!(
                "pin {pin} is not configured for output"
            )));
        }

        state.value = if value != 0 { 1 } else { 0 };

        Ok(())
    }

    fn release(&self, pin: u32) {
        if let Ok(pins) = self.pins.read() {
            if let Some(entry) = pins.get(&pin) {
                if let Ok(mut state) = entry.lock() {
                    state.claimed_by = None;
                    state.direction = None;
                }
            }
        }
    }
}
