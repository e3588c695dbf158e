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

//! Everything one graphics context owns.

use crate::render_lane::{LightSetup, ProgramCache, ProgramCacheSettings, StateCache};
use crate::resource_lane::{BufferTable, RenderTargetTable, TextureTable, WarnOnce};
use prism_core::renderer::{GpuDriver, RenderInfo};

/// The driver plus every cache and table bound to its context.
///
/// One value exists per renderer instance; nothing is shared between
/// instances, so two renderers never observe each other's caches.
#[derive(Debug)]
pub struct GpuContext<D: GpuDriver> {
    /// The backend.
    pub driver: D,
    /// Pipeline state mirror.
    pub state: StateCache,
    /// Compiled programs.
    pub programs: ProgramCache,
    /// GPU textures.
    pub textures: TextureTable,
    /// Vertex and index buffers.
    pub buffers: BufferTable,
    /// Framebuffers.
    pub targets: RenderTargetTable,
    /// Light uniforms and shadow casters.
    pub lights: LightSetup,
    /// Deduplicated fallback warnings.
    pub warnings: WarnOnce,
    /// Statistics.
    pub info: RenderInfo,
    /// Frames started so far.
    pub frame: u64,
}

impl<D: GpuDriver> GpuContext<D> {
    /// Wraps `driver` with empty caches.
    pub fn new(driver: D, settings: ProgramCacheSettings) -> Self {
        Self {
            driver,
            state: StateCache::new(),
            programs: ProgramCache::new(settings),
            textures: TextureTable::new(),
            buffers: BufferTable::new(),
            targets: RenderTargetTable::new(),
            lights: LightSetup::new(),
            warnings: WarnOnce::new(),
            info: RenderInfo::default(),
            frame: 0,
        }
    }

    /// Drops every cached object. Called when the context is lost: the
    /// driver objects are already gone and must not be deleted.
    pub fn invalidate(&mut self) {
        log::info!("Invalidating GPU caches");
        self.state.invalidate();
        self.programs.invalidate();
        self.textures.invalidate();
        self.buffers.invalidate();
        self.targets.invalidate();
        self.lights.invalidate();
        self.refresh_info();
    }

    /// Copies resident object counts into [`RenderInfo`].
    pub fn refresh_info(&mut self) {
        self.info.programs = self.programs.len();
        self.info.textures = self.textures.len();
        self.info.geometries = self.buffers.geometries();
        self.info.driver_calls = self.driver.issued_calls();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_infra::HeadlessDriver;

    #[test]
    fn test_new_context_is_empty() {
        let mut ctx = GpuContext::new(HeadlessDriver::default(), ProgramCacheSettings::default());
        ctx.refresh_info();
        assert_eq!(ctx.info.programs, 0);
        assert_eq!(ctx.info.textures, 0);
        assert_eq!(ctx.info.geometries, 0);
    }
}
