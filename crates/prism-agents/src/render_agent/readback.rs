// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Non-blocking pixel read-back.
//!
//! A read-back copies pixels into a pixel-pack buffer and fences the copy.
//! The caller gets a [`PixelReadback`] future right away; it resolves once
//! [`ReadbackQueue::poll`] sees the fence signaled, which the renderer does at
//! the end of every frame and whenever the host's timer asks it to.

use parking_lot::Mutex;
use prism_core::math::Rect;
use prism_core::renderer::api::{
    BufferId, BufferTarget, BufferUsage, FenceId, FenceStatus, TextureFormat,
};
use prism_core::renderer::{GpuDriver, RenderError, ResourceError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use thiserror::Error;

/// The ways a read-back can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadbackError {
    /// The rectangle does not fit in the target.
    #[error("Read-back rectangle {rect:?} does not fit in the {width}x{height} target")]
    OutOfBounds {
        /// The requested rectangle.
        rect: Rect,
        /// Width of the target.
        width: u32,
        /// Height of the target.
        height: u32,
    },
    /// The render target has no color attachment to read from.
    #[error("The render target has no color attachment")]
    NoColorAttachment,
    /// The context was lost before the copy completed.
    #[error("The graphics context was lost before the read-back completed")]
    ContextLost,
    /// The renderer was dropped before the copy completed.
    #[error("The renderer was dropped before the read-back completed")]
    Cancelled,
    /// The copy could not be set up or fetched.
    #[error("Read-back failed: {0}")]
    Resource(#[from] ResourceError),
    /// The target could not be resolved.
    #[error("Read-back target unavailable: {0}")]
    Render(#[from] RenderError),
}

#[derive(Debug, Default)]
struct Slot {
    result: Option<Result<Vec<u8>, ReadbackError>>,
    waker: Option<Waker>,
}

fn complete(slot: &Mutex<Slot>, result: Result<Vec<u8>, ReadbackError>) {
    let waker = {
        let mut slot = slot.lock();
        slot.result = Some(result);
        slot.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}

/// A pending read-back. Resolves to tightly packed pixel rows, bottom row
/// first.
#[derive(Debug)]
#[must_use = "a read-back does nothing unless awaited or checked"]
pub struct PixelReadback {
    slot: Arc<Mutex<Slot>>,
}

impl PixelReadback {
    /// Returns `true` once the result is available.
    pub fn is_ready(&self) -> bool {
        self.slot.lock().result.is_some()
    }

    /// Takes the result without blocking, if available.
    pub fn try_take(&mut self) -> Option<Result<Vec<u8>, ReadbackError>> {
        self.slot.lock().result.take()
    }
}

impl Future for PixelReadback {
    type Output = Result<Vec<u8>, ReadbackError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        match slot.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[derive(Debug)]
struct PendingReadback {
    buffer: BufferId,
    fence: FenceId,
    len: usize,
    slot: Arc<Mutex<Slot>>,
}

/// Read-backs waiting for their fence.
#[derive(Debug, Default)]
pub struct ReadbackQueue {
    pending: Vec<PendingReadback>,
}

impl ReadbackQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `rect` of the bound framebuffer into a new pixel-pack buffer
    /// and fences the copy.
    ///
    /// ## Errors
    /// * `ResourceError` - If the buffer or fence cannot be created.
    pub fn submit<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        rect: Rect,
        format: TextureFormat,
    ) -> Result<PixelReadback, ResourceError> {
        let len = rect.area() * format.bytes_per_texel() as usize;
        let buffer = driver.create_buffer()?;
        driver.bind_buffer(BufferTarget::PixelPack, Some(buffer));
        driver.buffer_storage(BufferTarget::PixelPack, len, BufferUsage::StreamRead);
        driver.read_pixels_to_pack_buffer(rect, format);
        driver.bind_buffer(BufferTarget::PixelPack, None);
        let fence = match driver.fence_sync() {
            Ok(fence) => fence,
            Err(err) => {
                driver.delete_buffer(buffer);
                return Err(err);
            }
        };
        log::debug!("Queued read-back of {rect:?} ({len} bytes)");
        let slot = Arc::new(Mutex::new(Slot::default()));
        self.pending.push(PendingReadback {
            buffer,
            fence,
            len,
            slot: slot.clone(),
        });
        Ok(PixelReadback { slot })
    }

    /// Resolves every read-back whose fence signaled. Returns how many were
    /// resolved.
    pub fn poll<D: GpuDriver + ?Sized>(&mut self, driver: &mut D) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let mut resolved = 0;
        let mut waiting = Vec::with_capacity(self.pending.len());
        for readback in self.pending.drain(..) {
            if driver.fence_status(readback.fence) == FenceStatus::Pending {
                waiting.push(readback);
                continue;
            }
            let mut pixels = vec![0u8; readback.len];
            driver.bind_buffer(BufferTarget::PixelPack, Some(readback.buffer));
            let fetched = driver.get_buffer_sub_data(BufferTarget::PixelPack, 0, &mut pixels);
            driver.bind_buffer(BufferTarget::PixelPack, None);
            driver.delete_buffer(readback.buffer);
            driver.delete_fence(readback.fence);
            let result = match fetched {
                Ok(()) => Ok(pixels),
                Err(ResourceError::ContextLost) => Err(ReadbackError::ContextLost),
                Err(err) => Err(ReadbackError::Resource(err)),
            };
            complete(&readback.slot, result);
            resolved += 1;
        }
        self.pending = waiting;
        if resolved > 0 {
            log::debug!("Resolved {resolved} read-back(s)");
        }
        resolved
    }

    /// Fails every pending read-back without touching the driver. Used when
    /// the context is lost and the buffers are already gone.
    pub fn fail_all(&mut self, error: ReadbackError) {
        for readback in self.pending.drain(..) {
            complete(&readback.slot, Err(error.clone()));
        }
    }

    /// Number of read-backs waiting for their fence.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for ReadbackQueue {
    fn drop(&mut self) {
        self.fail_all(ReadbackError::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::LinearRgba;
    use prism_infra::HeadlessDriver;

    fn rect() -> Rect {
        Rect::new(0, 0, 2, 1)
    }

    #[test]
    fn test_readback_resolves_after_fence() {
        let mut driver = HeadlessDriver::default();
        driver.set_default_framebuffer_color(LinearRgba::new(1.0, 0.0, 0.0, 1.0));
        let mut queue = ReadbackQueue::new();
        let mut readback = queue.submit(&mut driver, rect(), TextureFormat::Rgba8).unwrap();

        assert_eq!(queue.poll(&mut driver), 0);
        assert!(!readback.is_ready());
        assert_eq!(queue.poll(&mut driver), 1);
        assert_eq!(
            readback.try_take(),
            Some(Ok(vec![255, 0, 0, 255, 255, 0, 0, 255]))
        );
        assert!(queue.is_empty());
        assert_eq!(driver.live_buffers(), 0);
    }

    #[test]
    fn test_fail_all_reports_context_loss() {
        let mut driver = HeadlessDriver::default();
        let mut queue = ReadbackQueue::new();
        let mut readback = queue.submit(&mut driver, rect(), TextureFormat::Rgba8).unwrap();
        queue.fail_all(ReadbackError::ContextLost);
        assert_eq!(readback.try_take(), Some(Err(ReadbackError::ContextLost)));
    }

    #[test]
    fn test_dropping_the_queue_cancels() {
        let mut driver = HeadlessDriver::default();
        let mut queue = ReadbackQueue::new();
        let readback = queue.submit(&mut driver, rect(), TextureFormat::Rgba8).unwrap();
        drop(queue);
        assert_eq!(
            pollster::block_on(readback),
            Err(ReadbackError::Cancelled)
        );
    }
}
