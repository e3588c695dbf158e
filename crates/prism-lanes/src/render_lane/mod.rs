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

//! Rendering lane - hot path for graphics operations

use crate::context::GpuContext;
use prism_core::asset::ResourceStore;
use prism_core::config::RendererConfig;
use prism_core::math::Rect;
use prism_core::renderer::api::FramebufferId;
use prism_core::renderer::{GpuDriver, RenderError};
use prism_core::scene::{Camera, Scene};

mod draw;
mod forward_lane;
mod lights;
pub mod program;
mod render_list;
pub mod shaders;
mod shadow_pass_lane;
mod state;
mod transmission_lane;
mod uniforms;

pub use draw::*;
pub use forward_lane::*;
pub use lights::*;
pub use program::{
    OutputKind, ProgramCache, ProgramCacheSettings, ProgramContext, ProgramEntry, ProgramFeatures,
    ProgramHandle, ProgramKey, ProgramParameters, ProgramRequest, ProgramState, ProgramVariant,
    ShaderTemplate,
};
pub use render_list::*;
pub use shadow_pass_lane::*;
pub use state::*;
pub use transmission_lane::*;
pub use uniforms::*;

/// Everything a lane reads while rendering one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// The frame's scene.
    pub scene: &'a Scene,
    /// The main camera.
    pub camera: &'a Camera,
    /// Buckets built for `camera`.
    pub list: &'a RenderList,
    /// Renderer settings.
    pub config: &'a RendererConfig,
    /// Program inputs shared by every draw of the frame.
    pub program_context: ProgramContext,
    /// Output framebuffer (`None` is the default framebuffer).
    pub framebuffer: Option<FramebufferId>,
    /// Full size of the output.
    pub output: Rect,
}

/// What earlier lanes of a frame hand to later ones.
#[derive(Debug, Clone, Default)]
pub struct FrameOutputs {
    /// Shadow maps rendered this frame (or kept from an earlier one).
    pub shadow_maps: Vec<ShadowMapBinding>,
    /// Opaque background copy for transmissive materials.
    pub transmission: Option<TransmissionSource>,
}

/// A trait defining the behavior of a rendering lane.
///
/// A frame runs its lanes in sequence. Each lane encodes one pass of the
/// frame through the caches of the [`GpuContext`] and may publish results
/// in [`FrameOutputs`] for the lanes after it.
pub trait RenderLane<D: GpuDriver>: Send + Sync {
    /// Returns a human-readable identifier for this rendering strategy.
    fn strategy_name(&self) -> &'static str;

    /// Estimates the number of draw calls this lane would issue for a frame.
    ///
    /// Zero means the lane has nothing to do and may be skipped.
    fn estimate_cost(&self, inputs: &FrameInputs<'_>) -> f32;

    /// Renders the lane's pass.
    ///
    /// # Arguments
    ///
    /// * `ctx`: The driver and its caches.
    /// * `store`: Logical resources referenced by the scene.
    /// * `inputs`: The frame being rendered.
    /// * `outputs`: Results of earlier lanes, extended by this one.
    fn render(
        &mut self,
        ctx: &mut GpuContext<D>,
        store: &mut ResourceStore,
        inputs: &FrameInputs<'_>,
        outputs: &mut FrameOutputs,
    ) -> Result<(), RenderError>;
}
