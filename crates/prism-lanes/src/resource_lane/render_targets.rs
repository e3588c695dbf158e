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

use crate::render_lane::{ShadowKind, StateCache};
use prism_core::asset::RenderTarget;
use prism_core::memory::{Arena, Handle};
use prism_core::renderer::api::{
    GpuRenderTarget, MinFilter, RenderTargetDescriptor, SamplerDescriptor, TextureId, TextureTarget,
};
use prism_core::renderer::{GpuDriver, ResourceError};
use std::collections::HashMap;

/// Offscreen targets owned by the renderer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalTarget {
    /// Shadow map of the caster in `slot` of its kind.
    Shadow(ShadowKind, u32),
    /// Opaque scene copy sampled by transmissive materials.
    Transmission,
}

#[derive(Debug)]
struct ResidentTarget {
    gpu: GpuRenderTarget,
    version: u64,
    descriptor: RenderTargetDescriptor,
}

/// Framebuffers of one context.
#[derive(Debug, Default)]
pub struct RenderTargetTable {
    app: HashMap<Handle<RenderTarget>, ResidentTarget>,
    internal: HashMap<InternalTarget, ResidentTarget>,
}

fn delete<D: GpuDriver + ?Sized>(driver: &mut D, state: &mut StateCache, gpu: &GpuRenderTarget) {
    log::debug!("Deleting render target {:?}", gpu.framebuffer);
    driver.delete_render_target(gpu);
    for texture in gpu.color.iter().chain(gpu.depth.iter()) {
        state.forget_texture(*texture);
    }
}

fn create<D: GpuDriver + ?Sized>(
    driver: &mut D,
    state: &mut StateCache,
    descriptor: &RenderTargetDescriptor,
    sampler: &SamplerDescriptor,
) -> Result<GpuRenderTarget, ResourceError> {
    let gpu = driver.create_render_target(descriptor)?;
    for texture in gpu.color.iter().chain(gpu.depth.iter()) {
        state.bind_texture_for_upload(driver, TextureTarget::Texture2D, *texture);
        driver.tex_parameters(TextureTarget::Texture2D, sampler);
    }
    log::debug!(
        "Created render target {:?} ({}x{})",
        gpu.framebuffer,
        descriptor.width,
        descriptor.height
    );
    Ok(gpu)
}

impl RenderTargetTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The framebuffer of an application target, recreated when its version
    /// moved on.
    pub fn update<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        targets: &Arena<RenderTarget>,
        handle: Handle<RenderTarget>,
    ) -> Result<&GpuRenderTarget, ResourceError> {
        let target = targets
            .get(handle)
            .ok_or(ResourceError::InvalidHandle {
                kind: "render target",
            })?;
        let stale = self
            .app
            .get(&handle)
            .map_or(true, |resident| resident.version != target.version);
        if stale {
            if let Some(old) = self.app.remove(&handle) {
                delete(driver, state, &old.gpu);
            }
            let gpu = create(driver, state, &target.descriptor, &target.sampler)?;
            self.app.insert(
                handle,
                ResidentTarget {
                    gpu,
                    version: target.version,
                    descriptor: target.descriptor.clone(),
                },
            );
        }
        self.app
            .get(&handle)
            .map(|resident| &resident.gpu)
            .ok_or(ResourceError::InvalidHandle {
                kind: "render target",
            })
    }

    /// An internal target matching `descriptor`, recreated when the
    /// descriptor changes.
    pub fn internal<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        slot: InternalTarget,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<&GpuRenderTarget, ResourceError> {
        let stale = self
            .internal
            .get(&slot)
            .map_or(true, |resident| resident.descriptor != *descriptor);
        if stale {
            if let Some(old) = self.internal.remove(&slot) {
                delete(driver, state, &old.gpu);
            }
            let sampler = SamplerDescriptor {
                min_filter: if descriptor.mipmaps {
                    MinFilter::LinearMipmapLinear
                } else {
                    MinFilter::Linear
                },
                ..Default::default()
            };
            let gpu = create(driver, state, descriptor, &sampler)?;
            self.internal.insert(
                slot,
                ResidentTarget {
                    gpu,
                    version: 0,
                    descriptor: descriptor.clone(),
                },
            );
        }
        self.internal
            .get(&slot)
            .map(|resident| &resident.gpu)
            .ok_or(ResourceError::InvalidHandle {
                kind: "render target",
            })
    }

    /// The resident framebuffer of an application target.
    pub fn get(&self, handle: Handle<RenderTarget>) -> Option<&GpuRenderTarget> {
        self.app.get(&handle).map(|resident| &resident.gpu)
    }

    /// The resident framebuffer of an internal target.
    pub fn get_internal(&self, slot: InternalTarget) -> Option<&GpuRenderTarget> {
        self.internal.get(&slot).map(|resident| &resident.gpu)
    }

    /// First color attachment of an application target, for sampling.
    pub fn color_texture(&self, handle: Handle<RenderTarget>) -> Option<TextureId> {
        self.get(handle).and_then(|gpu| gpu.color.first().copied())
    }

    /// Regenerates the mip chain of the first color attachment.
    pub fn generate_mipmaps<D: GpuDriver + ?Sized>(
        driver: &mut D,
        state: &mut StateCache,
        gpu: &GpuRenderTarget,
    ) {
        if let Some(color) = gpu.color.first() {
            state.bind_texture_for_upload(driver, TextureTarget::Texture2D, *color);
            driver.generate_mipmap(TextureTarget::Texture2D);
        }
    }

    /// Deletes the framebuffer of a disposed application target.
    pub fn remove<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: Handle<RenderTarget>,
    ) {
        if let Some(resident) = self.app.remove(&handle) {
            delete(driver, state, &resident.gpu);
        }
    }

    /// Deletes internal shadow targets whose slot is no longer in use.
    pub fn retain_internal<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        mut keep: impl FnMut(InternalTarget) -> bool,
    ) {
        let dropped: Vec<InternalTarget> = self
            .internal
            .keys()
            .copied()
            .filter(|slot| !keep(*slot))
            .collect();
        for slot in dropped {
            if let Some(resident) = self.internal.remove(&slot) {
                delete(driver, state, &resident.gpu);
            }
        }
    }

    /// Number of resident framebuffers.
    pub fn len(&self) -> usize {
        self.app.len() + self.internal.len()
    }

    /// Returns `true` if no framebuffer is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every framebuffer without deleting, after a context loss.
    pub fn invalidate(&mut self) {
        self.app.clear();
        self.internal.clear();
    }
}
