use log::{info, warn};
use std::process;
use std::sync::Arc;

use linedev::{NodeRegistry, bring_up, builtin_lines, tear_down};

#[cfg(feature = "hardware-gpio")]
use linedev::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use linedev::MockGpioBackend;

fn main() {
    env_logger::init();

    let backend = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(
                LibgpiodBackend::new()
                    .unwrap_or_else(|e| panic!("Failed to init libgpiod backend: {e}")),
            )
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            Arc::new(MockGpioBackend::default())
        }
    };

    let registry = NodeRegistry::new();

    let mut devices = Vec::new();
    for line in builtin_lines() {
        let label = line.label;
        match bring_up(&registry, backend.clone(), line) {
            Ok(device) => devices.push(device),
            Err(e) => {
                warn!("failed to bring up {label}: {e}");
                for device in devices.iter().rev() {
                    tear_down(&registry, device);
                }
                process::exit(1);
            }
        }
    }

    for device in &devices {
        let mut handle = match registry.open(device.identity()) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("failed to open {}: {e}", device.label());
                continue;
            }
        };

        let mut buf = [0u8; 16];
        match handle.read(&mut buf) {
            Ok(count) => info!(
                "{} ({}) reads {}",
                device.label(),
                device.identity(),
                String::from_utf8_lossy(&buf[..count])
            ),
            Err(e) => warn!("failed to read {}: {e}", device.label()),
        }
    }

    for device in devices.iter().rev() {
        tear_down(&registry, device);
    }
}
