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

//! Transmission pre-pass - renders the opaque background sampled by
//! transmissive materials.

use super::forward_lane::draw_bucket;
use super::{
    submit, FixedState, FrameInputs, FrameOutputs, OutputKind, PassInputs, ProgramVariant,
    RenderLane, TransmissionSource,
};
use crate::context::GpuContext;
use crate::resource_lane::{InternalTarget, RenderTargetTable};
use prism_core::asset::ResourceStore;
use prism_core::math::{Rect, Vec2};
use prism_core::renderer::api::{ClearFlags, RenderTargetDescriptor, Side, TextureFormat};
use prism_core::renderer::{GpuDriver, RenderError};

/// Size of the transmission target for an output of `viewport`.
pub fn transmission_extent(viewport: Rect, scale: f32) -> (u32, u32) {
    let scaled = |v: i32| ((v.max(1) as f32 * scale).round() as u32).max(1);
    (scaled(viewport.width), scaled(viewport.height))
}

/// Renders the opaque bucket, then the back faces of double-sided
/// transmissive items, into a mipmapped offscreen target.
#[derive(Debug, Default)]
pub struct TransmissionLane;

impl TransmissionLane {
    /// Creates a new `TransmissionLane`.
    pub fn new() -> Self {
        Self
    }
}

impl<D: GpuDriver> RenderLane<D> for TransmissionLane {
    fn strategy_name(&self) -> &'static str {
        "TransmissionPrePass"
    }

    fn estimate_cost(&self, inputs: &FrameInputs<'_>) -> f32 {
        let list = inputs.list;
        if list.transmissive().is_empty() {
            return 0.0;
        }
        (list.opaque().len() + list.transmissive().len()) as f32
    }

    fn render(
        &mut self,
        ctx: &mut GpuContext<D>,
        store: &mut ResourceStore,
        inputs: &FrameInputs<'_>,
        outputs: &mut FrameOutputs,
    ) -> Result<(), RenderError> {
        outputs.transmission = None;
        let list = inputs.list;
        if list.transmissive().is_empty() {
            return Ok(());
        }

        let viewport = inputs.camera.viewport.unwrap_or(inputs.output);
        let scale = inputs.config.transmission_resolution_scale.clamp(f32::EPSILON, 1.0);
        let (width, height) = transmission_extent(viewport, scale);
        let descriptor = RenderTargetDescriptor {
            color_formats: vec![TextureFormat::Rgba16Float],
            mipmaps: true,
            ..RenderTargetDescriptor::color_depth(width, height)
        };

        let GpuContext {
            driver,
            state,
            targets,
            ..
        } = ctx;
        let gpu = targets.internal(driver, state, InternalTarget::Transmission, &descriptor)?;
        let texture = gpu
            .color
            .first()
            .copied()
            .ok_or(RenderError::InvalidHandle { kind: "transmission target" })?;
        state.bind_framebuffer(driver, Some(gpu.framebuffer));
        state.set_viewport(driver, Rect::from_size(width, height));
        state.set_clear_color(driver, inputs.scene.background.unwrap_or(inputs.config.clear_color));
        state.set_clear_depth(driver, 1.0);
        state.clear(driver, ClearFlags::COLOR | ClearFlags::DEPTH);

        let pass = PassInputs {
            scene: inputs.scene,
            camera: inputs.camera,
            program_context: inputs.program_context.with_output(OutputKind::Intermediate),
            variant: ProgramVariant::Forward,
            shadow_maps: &outputs.shadow_maps,
            transmission: None,
            distance: None,
            exposure: inputs.config.tone_mapping_exposure,
        };
        draw_bucket(ctx, store, &pass, list.opaque())?;
        for item in list.transmissive() {
            let double_sided = store
                .materials
                .get(item.material)
                .map_or(false, |material| material.side == Side::Double);
            if double_sided {
                submit(ctx, store, &pass, item, FixedState::Material(Side::Back))?;
            }
        }

        let GpuContext {
            driver,
            state,
            targets,
            ..
        } = ctx;
        if let Some(gpu) = targets.get_internal(InternalTarget::Transmission) {
            RenderTargetTable::generate_mipmaps(driver, state, gpu);
        }
        outputs.transmission = Some(TransmissionSource {
            texture,
            size: Vec2::new(width as f32, height as f32),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Frame;
    use prism_core::asset::Material;
    use prism_core::math::LinearRgba;
    use prism_core::renderer::api::FrontFace;

    fn glass(side: Side) -> Material {
        let mut material = Material::physical(LinearRgba::WHITE);
        material.transmission = 1.0;
        material.side = side;
        material
    }

    #[test]
    fn test_transmission_extent_scales_and_rounds() {
        assert_eq!(transmission_extent(Rect::from_size(64, 48), 0.5), (32, 24));
        assert_eq!(transmission_extent(Rect::from_size(3, 3), 0.5), (2, 2));
        assert_eq!(transmission_extent(Rect::from_size(1, 1), 0.01), (1, 1));
    }

    #[test]
    fn test_skipped_without_transmissive_items() {
        let mut frame = Frame::new();
        let solid = frame.store.insert(Material::basic(LinearRgba::WHITE));
        frame.add(solid, 0.0);
        let mut outputs = FrameOutputs::default();
        frame.render(&mut TransmissionLane::new(), &mut outputs).unwrap();
        assert!(outputs.transmission.is_none());
        assert_eq!(frame.driver.count("create_render_target"), 0);
        assert!(frame.driver.draws().is_empty());
    }

    #[test]
    fn test_opaque_background_is_rendered_at_scaled_size() {
        let mut frame = Frame::new();
        frame.config.transmission_resolution_scale = 0.5;
        let solid = frame.store.insert(Material::basic(LinearRgba::WHITE));
        let glass = frame.store.insert(glass(Side::Front));
        frame.add(solid, 0.0);
        frame.add(glass, 0.0);

        let mut outputs = FrameOutputs::default();
        frame.render(&mut TransmissionLane::new(), &mut outputs).unwrap();

        let source = outputs.transmission.unwrap();
        assert_eq!(source.size, Vec2::new(32.0, 24.0));
        let draws = frame.driver.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].viewport, Rect::from_size(32, 24));
        assert!(draws[0].framebuffer.is_some());
        assert_eq!(frame.driver.count("generate_mipmap"), 1);
        assert!(frame.driver.texture_has_mipmaps(source.texture));
    }

    #[test]
    fn test_double_sided_transmissive_adds_back_faces() {
        let mut frame = Frame::new();
        let solid = frame.store.insert(Material::basic(LinearRgba::WHITE));
        let glass = frame.store.insert(glass(Side::Double));
        frame.add(solid, 0.0);
        frame.add(glass, 0.0);

        frame.render(&mut TransmissionLane::new(), &mut FrameOutputs::default()).unwrap();
        let draws = frame.driver.draws();
        assert_eq!(draws.len(), 2);
        assert!(draws[1].culling);
        assert_eq!(draws[1].front_face, FrontFace::Cw);
    }
}
