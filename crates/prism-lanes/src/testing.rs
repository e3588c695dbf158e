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

//! A headless frame fixture shared by the lane tests.

use crate::context::GpuContext;
use crate::render_lane::{
    FrameInputs, FrameOutputs, ProgramCacheSettings, ProgramContext, RenderLane, RenderList,
};
use prism_core::asset::{Geometry, Material, ResourceStore};
use prism_core::config::RendererConfig;
use prism_core::math::{Mat4, Rect, Vec3};
use prism_core::memory::Handle;
use prism_core::renderer::RenderError;
use prism_core::scene::{Camera, DrawableItem, Scene};
use prism_infra::HeadlessDriver;

const OUTPUT: Rect = Rect {
    x: 0,
    y: 0,
    width: 64,
    height: 48,
};

pub(crate) struct Frame {
    pub driver: HeadlessDriver,
    pub ctx: GpuContext<HeadlessDriver>,
    pub store: ResourceStore,
    pub scene: Scene,
    pub camera: Camera,
    pub config: RendererConfig,
}

impl Frame {
    pub fn new() -> Self {
        Self::with_driver(HeadlessDriver::default(), ProgramCacheSettings::default())
    }

    pub fn with_driver(driver: HeadlessDriver, settings: ProgramCacheSettings) -> Self {
        let ctx = GpuContext::new(driver.clone(), settings);
        Self {
            driver,
            ctx,
            store: ResourceStore::new(),
            scene: Scene::default(),
            camera: Camera::default(),
            config: RendererConfig::default(),
        }
    }

    pub fn triangle(&mut self) -> Handle<Geometry> {
        self.store.insert(Geometry::from_positions(vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0,
        ]))
    }

    /// Adds a triangle drawn with `material` at depth `z` and returns its
    /// index in the scene.
    pub fn add(&mut self, material: Handle<Material>, z: f32) -> usize {
        let geometry = self.triangle();
        let id = self.scene.items.len() as u64;
        self.scene.items.push(DrawableItem::new(
            id,
            geometry,
            material,
            Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
        ));
        self.scene.items.len() - 1
    }

    pub fn render(
        &mut self,
        lane: &mut dyn RenderLane<HeadlessDriver>,
        outputs: &mut FrameOutputs,
    ) -> Result<(), RenderError> {
        self.ctx.lights.update(&self.scene.lights);
        let mut list = RenderList::new();
        list.build(&self.scene, &self.camera, &self.store, self.config.sort_objects);
        let program_context = ProgramContext::for_frame(
            &self.config,
            self.ctx.lights.version(),
            self.ctx.lights.counts(),
            &self.scene,
        );
        let inputs = FrameInputs {
            scene: &self.scene,
            camera: &self.camera,
            list: &list,
            config: &self.config,
            program_context,
            framebuffer: None,
            output: OUTPUT,
        };
        lane.render(&mut self.ctx, &mut self.store, &inputs, outputs)
    }
}
