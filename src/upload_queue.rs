// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Deferred uploads.

Producer threads hand textures to the [`UploadQueue`]; the thread that owns
the device drains it one request per frame with [`UploadQueue::drain_one`].
Requests hold the target weakly, so a queued texture can still be dropped.
Its `Drop` purges its own requests through [`UploadQueue::remove_all_for`].

Enqueueing the same texture twice is allowed.  Both requests run and the one
drained last wins.
*/

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::options::TextureOptions;
use crate::session::DrainOrder;
use crate::software::Surface;
use crate::texture::GpuTexture;

/// What a request uploads.
#[derive(Debug)]
pub enum UploadPayload {
    /// Upload the texture's own CPU buffer with these options.
    Options(TextureOptions),
    /// Upload a raw surface.  Released once the request is performed or dropped.
    Surface(Surface),
}

/// One pending upload.
#[derive(Debug)]
pub struct UploadRequest {
    target: Weak<GpuTexture>,
    serial: u64,
    payload: UploadPayload,
}

impl UploadRequest {
    pub fn new(target: &Arc<GpuTexture>, payload: UploadPayload) -> Self {
        UploadRequest {
            target: Arc::downgrade(target),
            serial: target.serial(),
            payload,
        }
    }

    /// The target, if it is still alive.
    pub fn target(&self) -> Option<Arc<GpuTexture>> {
        self.target.upgrade()
    }

    pub fn payload(&self) -> &UploadPayload {
        &self.payload
    }
}

/// Pending upload requests behind one mutex.
#[derive(Debug)]
pub struct UploadQueue {
    pending: Mutex<VecDeque<UploadRequest>>,
    order: DrainOrder,
}

impl UploadQueue {
    pub fn new(order: DrainOrder) -> Self {
        UploadQueue {
            pending: Mutex::new(VecDeque::new()),
            order,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<UploadRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn order(&self) -> DrainOrder {
        self.order
    }

    /// Appends a request.  Callable from any thread.
    pub fn enqueue(&self, request: UploadRequest) {
        logwise::trace_sync!(
            "enqueue upload for texture {serial}",
            serial = request.serial
        );
        self.lock().push_back(request);
    }

    /// Performs at most one pending request.  Returns whether one was taken.
    ///
    /// Must only be called from the thread that owns the device, and never
    /// concurrently with itself.  Non-blocking when the queue is empty.
    pub fn drain_one(&self) -> bool {
        let mut pending = self.lock();
        let request = match self.order {
            DrainOrder::Lifo => pending.pop_back(),
            DrainOrder::Fifo => pending.pop_front(),
        };
        let Some(request) = request else {
            return false;
        };
        let UploadRequest {
            target,
            serial,
            payload,
        } = request;
        let target = target.upgrade();
        match &target {
            Some(texture) => texture.perform(payload),
            None => {
                logwise::warn_sync!(
                    "dropping upload for texture {serial}, already destroyed",
                    serial = serial
                );
            }
        }
        //the upgraded handle may be the last one; its Drop takes this lock
        drop(pending);
        drop(target);
        true
    }

    /// Removes every request targeting the texture with `serial`.
    ///
    /// Returns how many were removed.  Safe when nothing matches.
    pub fn remove_all_for(&self, serial: u64) -> usize {
        let removed: Vec<UploadRequest> = {
            let mut pending = self.lock();
            let (removed, kept): (VecDeque<_>, VecDeque<_>) =
                pending.drain(..).partition(|r| r.serial == serial);
            *pending = kept;
            removed.into()
        };
        removed.len()
    }

    /// Drops every pending request, releasing any surface payloads.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.lock());
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
