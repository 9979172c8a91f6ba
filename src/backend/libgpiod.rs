use std::path::PathBuf;

use log::warn;

use libgpiod::{chip::Chip, line, request};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::{Direction, LineConfig};
use crate::error::DeviceError;
use crate::gpio::GpioBackend;

pub struct LibgpiodBackend {
    pins: RwLock<FxHashMap<u32, LineHandle>>, // keyed by pin number
}

struct LineHandle {
    line: u32,
    direction: Option<Direction>,
    request: request::Request,
}

impl LibgpiodBackend {
    pub fn new() -> Result<Self, DeviceError> {
        Ok(Self {
            pins: RwLock::new(FxHashMap::default()),
        })
    }

    fn open_chip(path: &str) -> Result<Chip, DeviceError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| DeviceError::PinUnavailable(format!("open chip {path}: {e}")))
    }

    fn request_line(chip: &Chip, line: &LineConfig) -> Result<request::Request, DeviceError> {
        let mut req_cfg = request::Config::new()
            .map_err(|e| DeviceError::PinUnavailable(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(line.label)
            .map_err(|e| DeviceError::PinUnavailable(format!("request consumer: {e}")))?;

        // direction is left as-is here; set_direction reconfigures it
        let settings = line::Settings::new()
            .map_err(|e| DeviceError::PinUnavailable(format!("line settings: {e}")))?;
        let line_cfg = Self::make_line_config(line.pin, settings)
            .map_err(|e| DeviceError::PinUnavailable(e.to_string()))?;

        chip.request_lines(Some(&req_cfg), &line_cfg)
            .map_err(|e| DeviceError::PinUnavailable(format!("request lines: {e}")))
    }

    fn make_line_settings(direction: Direction) -> Result<line::Settings, DeviceError> {
        let mut settings = line::Settings::new()
            .map_err(|e| DeviceError::DirectionSetFailed(format!("line settings: {e}")))?;

        match direction {
            Direction::Input => {
                settings
                    .set_direction(line::Direction::Input)
                    .map_err(|e| DeviceError::DirectionSetFailed(format!("set direction: {e}")))?;
            }
            Direction::Output => {
                settings
                    .set_direction(line::Direction::Output)
                    .map_err(|e| DeviceError::DirectionSetFailed(format!("set direction: {e}")))?;
            }
        }

        Ok(settings)
    }

    fn make_line_config(
        offset: u32,
        settings: line::Settings,
    ) -> Result<line::Config, DeviceError> {
        let mut cfg =
            line::Config::new().map_err(|e| DeviceError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| DeviceError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }
}

impl GpioBackend for LibgpiodBackend {
    fn claim(&self, line: &LineConfig) -> Result<(), DeviceError> {
        let mut pins = self.pins.write();

        if pins.contains_key(&line.pin) {
            return Err(DeviceError::PinUnavailable(format!(
                "pin {} already claimed",
                line.pin
            )));
        }

        let chip = Self::open_chip(line.chip)?;
        let request = Self::request_line(&chip, line)?;

        pins.insert(
            line.pin,
            LineHandle {
                line: line.pin,
                direction: None,
                request,
            },
        );

        Ok(())
    }

    fn set_direction(&self, pin: u32, direction: Direction) -> Result<(), DeviceError> {
        let mut pins = self.pins.write();
        let handle = pins
            .get_mut(&pin)
            .ok_or_else(|| DeviceError::NotClaimed(format!("pin {pin}")))?;

        let settings = Self::make_line_settings(direction)?;
        let line_cfg = Self::make_line_config(handle.line, settings)
            .map_err(|e| DeviceError::DirectionSetFailed(e.to_string()))?;

        handle
            .request
            .reconfigure_lines(&line_cfg)
            .map_err(|e| DeviceError::DirectionSetFailed(format!("reconfigure lines: {e}")))?;

        if direction == Direction::Output {
            // output lines start driven low
            handle
                .request
                .set_value(handle.line, line::Value::InActive)
                .map_err(|e| DeviceError::DirectionSetFailed(format!("set initial value: {e}")))?;
        }

        handle.direction = Some(direction);

        Ok(())
    }

    fn get_value(&self, pin: u32) -> Result<u8, DeviceError> {
        let pins = self.pins.read();
        let handle = pins
            .get(&pin)
            .ok_or_else(|| DeviceError::NotClaimed(format!("pin {pin}")))?;

        let value = handle
            .request
            .value(handle.line)
            .map_err(|e| DeviceError::Gpio(format!("get value: {e}")))?;

        Ok(match value {
            line::Value::InActive => 0,
            line::Value::Active => 1,
        })
    }

    fn set_value(&self, pin: u32, value: u8) -> Result<(), DeviceError> {
        let pins = self.pins.read();
        let handle = pins
            .get(&pin)
            .ok_or_else(|| DeviceError::NotClaimed(format!("pin {pin}")))?;

        if handle.direction != Some(Direction::Output) {
            return Err(DeviceError::Gpio(format!(
                "pin {pin} is not configured for output"
            )));
        }

        handle
            .request
            .set_value(
                handle.line,
                match value {
                    0 => line::Value::InActive,
                    _ => line::Value::Active,
                },
            )
            .map_err(|e| DeviceError::Gpio(format!("set value: {e}")))?;

        Ok(())
    }

    fn release(&self, pin: u32) {
        // dropping the request releases the line
        if self.pins.write().remove(&pin).is_none() {
            warn!("release of unclaimed pin {pin}");
        }
    }
}
