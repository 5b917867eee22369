// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The render session: one device, one upload queue, one configuration.

Everything that used to be engine-wide state hangs off a [`Session`].  Textures
keep an `Arc<Session>` so the device and queue outlive them; the session is
torn down when the last texture and cache holding it go away.

```
use std::sync::Arc;
use texture_manager::imp::SoftwareDevice;
use texture_manager::session::{DrainOrder, Session, SessionConfig};

let config = SessionConfig::default().with_drain_order(DrainOrder::Fifo);
let session = Session::new(Arc::new(SoftwareDevice::new()), config);
assert_eq!(session.config().drain_order(), DrainOrder::Fifo);
assert!(session.upload_queue().is_empty());
```
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::imp::Device;
use crate::upload_queue::UploadQueue;

/// Which pending request [`UploadQueue::drain_one`] picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrainOrder {
    /// Most recently enqueued first.
    #[default]
    Lifo,
    /// Oldest first.
    Fifo,
}

/// What identifies a generated text texture in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextKeyPolicy {
    /// Text, font and color.
    #[default]
    FontAndColor,
    /// Text alone.  The same string in two fonts or colors shares one texture.
    TextOnly,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionConfig {
    drain_order: DrainOrder,
    text_key: TextKeyPolicy,
    placeholder_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            drain_order: DrainOrder::Lifo,
            text_key: TextKeyPolicy::FontAndColor,
            placeholder_size: 8,
        }
    }
}

impl SessionConfig {
    pub fn with_drain_order(mut self, drain_order: DrainOrder) -> Self {
        self.drain_order = drain_order;
        self
    }

    pub fn with_text_key(mut self, text_key: TextKeyPolicy) -> Self {
        self.text_key = text_key;
        self
    }

    pub fn drain_order(&self) -> DrainOrder {
        self.drain_order
    }

    pub fn text_key(&self) -> TextKeyPolicy {
        self.text_key
    }

    /// Edge length of the checkerboard substituted for missing images.
    pub fn placeholder_size(&self) -> u32 {
        self.placeholder_size
    }
}

/// Shared context for every texture created against one device.
#[derive(Debug)]
pub struct Session {
    device: Arc<dyn Device>,
    queue: UploadQueue,
    config: SessionConfig,
    next_serial: AtomicU64,
}

impl Session {
    pub fn new<D: Device + 'static>(device: Arc<D>, config: SessionConfig) -> Arc<Session> {
        logwise::info_sync!(
            "texture session starting with {order} draining",
            order = logwise::privacy::LogIt(&config.drain_order)
        );
        Arc::new(Session {
            device,
            queue: UploadQueue::new(config.drain_order),
            config,
            next_serial: AtomicU64::new(0),
        })
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn upload_queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Identity for a new texture instance, unique within this session.
    pub(crate) fn next_serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }
}
