use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::{DeviceId, LineConfig};
use crate::error::DeviceError;
use crate::gpio::{GpioBackend, GpioLineDevice};

// Operations table a published node dispatches through.
pub trait NodeOps: Send + Sync {
    fn open(&self);
    fn close(&self);
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, DeviceError>;
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize, DeviceError>;
}

impl<B: GpioBackend> NodeOps for GpioLineDevice<B> {
    fn open(&self) {
        debug!("opening device {} ({})", self.identity(), self.label());
    }

    fn close(&self) {
        debug!("closing device {} ({})", self.identity(), self.label());
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.read_value(offset, buf)
    }

    fn write_at(&self, _offset: u64, data: &[u8]) -> Result<usize, DeviceError> {
        self.write_value(data)
    }
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<FxHashMap<DeviceId, Arc<dyn NodeOps>>>, // keyed by (major, minor)
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, id: DeviceId, ops: Arc<dyn NodeOps>) -> Result<(), DeviceError> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&id) {
            return Err(DeviceError::NodePublishFailed(format!(
                "device {id} already registered"
            )));
        }
        nodes.insert(id, ops);
        Ok(())
    }

    pub fn unpublish(&self, id: DeviceId) {
        if self.nodes.write().remove(&id).is_none() {
            warn!("unpublish of unregistered device {id}");
        }
    }

    pub fn open(&self, id: DeviceId) -> Result<NodeHandle, DeviceError> {
        let ops = self
            .nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| DeviceError::NoSuchNode(id.to_string()))?;
        ops.open();

        Ok(NodeHandle { ops, offset: 0 })
    }
}

// One open session against a published node; owns the stream offset.
pub struct NodeHandle {
    ops: Arc<dyn NodeOps>,
    offset: u64,
}

impl NodeHandle {
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let count = self.ops.read_at(self.offset, buf)?;
        self.offset += count as u64;
        Ok(count)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, DeviceError> {
        let count = self.ops.write_at(self.offset, data)?;
        self.offset += count as u64;
        Ok(count)
    }

    pub fn rewind(&mut self) {
        self.offset = 0;
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.ops.close();
    }
}

pub fn bring_up<B: GpioBackend + 'static>(
    registry: &NodeRegistry,
    backend: Arc<B>,
    config: LineConfig,
) -> Result<Arc<GpioLineDevice<B>>, DeviceError> {
    let device = Arc::new(GpioLineDevice::claim(backend, config)?);

    // pin goes back if the node can't be published
    if let Err(e) = registry.publish(device.identity(), device.clone()) {
        device.release();
        return Err(e);
    }

    info!("device {} published as {}", device.label(), device.identity());
    Ok(device)
}

// Node first, then pin. Never fails; idempotent.
pub fn tear_down<B: GpioBackend>(registry: &NodeRegistry, device: &GpioLineDevice<B>) {
    registry.unpublish(device.identity());
    device.release();
    info!("device {} removed", device.label());
}
