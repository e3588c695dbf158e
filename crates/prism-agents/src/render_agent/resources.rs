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


use prism_core::asset::{
    Geometry, ImageData, Material, RenderResource, RenderTarget, ResourceStore, Texture,
};
use prism_core::memory::Handle;
use prism_core::renderer::GpuDriver;
use prism_lanes::GpuContext;

/// A logical resource whose GPU counterpart the renderer can release.
pub trait ManagedResource: RenderResource {
    /// Releases the GPU objects created for `handle`. The logical resource
    /// may already be gone from the store.
    fn release_gpu<D: GpuDriver>(ctx: &mut GpuContext<D>, handle: Handle<Self>);
}

impl ManagedResource for ImageData {
    // Images are uploaded through the textures that share them.
    fn release_gpu<D: GpuDriver>(_ctx: &mut GpuContext<D>, _handle: Handle<Self>) {}
}

impl ManagedResource for Texture {
    fn release_gpu<D: GpuDriver>(ctx: &mut GpuContext<D>, handle: Handle<Self>) {
        let GpuContext {
            driver,
            state,
            textures,
            ..
        } = ctx;
        textures.remove(driver, state, handle);
    }
}

impl ManagedResource for Geometry {
    fn release_gpu<D: GpuDriver>(ctx: &mut GpuContext<D>, handle: Handle<Self>) {
        let GpuContext {
            driver,
            state,
            buffers,
            ..
        } = ctx;
        buffers.remove(driver, state, handle);
    }
}

impl ManagedResource for Material {
    fn release_gpu<D: GpuDriver>(ctx: &mut GpuContext<D>, handle: Handle<Self>) {
        let GpuContext {
            driver,
            state,
            programs,
            ..
        } = ctx;
        programs.release_material(driver, state, handle);
    }
}

impl ManagedResource for RenderTarget {
    fn release_gpu<D: GpuDriver>(ctx: &mut GpuContext<D>, handle: Handle<Self>) {
        let GpuContext {
            driver,
            state,
            targets,
            ..
        } = ctx;
        targets.remove(driver, state, handle);
    }
}

/// Counts of registered logical resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    /// Images.
    pub images: usize,
    /// Textures.
    pub textures: usize,
    /// Geometries.
    pub geometries: usize,
    /// Materials.
    pub materials: usize,
    /// Render targets.
    pub render_targets: usize,
}

impl ResourceCounts {
    /// Counts the resources of `store`.
    pub fn of(store: &ResourceStore) -> Self {
        Self {
            images: store.images.len(),
            textures: store.textures.len(),
            geometries: store.geometries.len(),
            materials: store.materials.len(),
            render_targets: store.render_targets.len(),
        }
    }
}
