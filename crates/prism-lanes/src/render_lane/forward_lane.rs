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

//! Main pass lane - draws the three buckets into the output.

use super::{
    submit, DrawOutcome, FixedState, FrameInputs, FrameOutputs, PassInputs, ProgramVariant,
    RenderItem, RenderLane,
};
use crate::context::GpuContext;
use prism_core::asset::{Material, ResourceStore};
use prism_core::config::AutoClear;
use prism_core::renderer::api::{ClearFlags, Side};
use prism_core::renderer::{GpuDriver, RenderError};

/// The sides drawn for `material`, in order.
///
/// Transparent double-sided materials draw their back faces first so that
/// blending composes the far side behind the near one.
pub fn draw_sides(material: &Material) -> &'static [Side] {
    match material.side {
        Side::Double if material.transparent && !material.force_single_pass => {
            &[Side::Back, Side::Front]
        }
        Side::Double => &[Side::Double],
        Side::Back => &[Side::Back],
        Side::Front => &[Side::Front],
    }
}

/// Buffers cleared at the start of a frame.
pub fn clear_flags(auto_clear: &AutoClear) -> ClearFlags {
    let mut flags = ClearFlags::empty();
    flags.set(ClearFlags::COLOR, auto_clear.color);
    flags.set(ClearFlags::DEPTH, auto_clear.depth);
    flags.set(ClearFlags::STENCIL, auto_clear.stencil);
    flags
}

/// Draws `items` with their material state, returning how many draw calls
/// were issued.
pub fn draw_bucket<D: GpuDriver>(
    ctx: &mut GpuContext<D>,
    store: &mut ResourceStore,
    pass: &PassInputs<'_>,
    items: &[RenderItem],
) -> Result<u32, RenderError> {
    let mut drawn = 0;
    for item in items {
        let sides = match store.materials.get(item.material) {
            Some(material) => draw_sides(material),
            None => return Err(RenderError::InvalidHandle { kind: "material" }),
        };
        for side in sides {
            if submit(ctx, store, pass, item, FixedState::Material(*side))? == DrawOutcome::Drawn {
                drawn += 1;
            }
        }
    }
    Ok(drawn)
}

/// Forward rendering of the opaque, transmissive and transparent buckets.
#[derive(Debug, Default)]
pub struct ForwardLane;

impl ForwardLane {
    /// Creates a new `ForwardLane`.
    pub fn new() -> Self {
        Self
    }
}

impl<D: GpuDriver> RenderLane<D> for ForwardLane {
    fn strategy_name(&self) -> &'static str {
        "Forward"
    }

    fn estimate_cost(&self, inputs: &FrameInputs<'_>) -> f32 {
        inputs.list.len() as f32
    }

    fn render(
        &mut self,
        ctx: &mut GpuContext<D>,
        store: &mut ResourceStore,
        inputs: &FrameInputs<'_>,
        outputs: &mut FrameOutputs,
    ) -> Result<(), RenderError> {
        let GpuContext { driver, state, .. } = ctx;
        state.bind_framebuffer(driver, inputs.framebuffer);
        state.set_viewport(driver, inputs.camera.viewport.unwrap_or(inputs.output));

        let flags = clear_flags(&inputs.config.auto_clear);
        if !flags.is_empty() {
            let color = inputs.scene.background.unwrap_or(inputs.config.clear_color);
            state.set_clear_color(driver, color);
            state.set_clear_depth(driver, 1.0);
            state.set_clear_stencil(driver, 0);
            state.clear(driver, flags);
        }

        let pass = PassInputs {
            scene: inputs.scene,
            camera: inputs.camera,
            program_context: inputs.program_context,
            variant: ProgramVariant::Forward,
            shadow_maps: &outputs.shadow_maps,
            transmission: outputs.transmission,
            distance: None,
            exposure: inputs.config.tone_mapping_exposure,
        };
        let list = inputs.list;
        let mut drawn = draw_bucket(ctx, store, &pass, list.opaque())?;
        drawn += draw_bucket(ctx, store, &pass, list.transmissive())?;
        drawn += draw_bucket(ctx, store, &pass, list.transparent())?;
        log::trace!("Forward pass issued {drawn} draw calls");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Frame;
    use prism_core::asset::Material;
    use prism_core::math::LinearRgba;
    use prism_core::renderer::api::{CullMode, FrontFace};

    fn transparent(side: Side) -> Material {
        let mut material = Material::basic(LinearRgba::WHITE);
        material.transparent = true;
        material.opacity = 0.5;
        material.side = side;
        material
    }

    #[test]
    fn test_draw_sides() {
        assert_eq!(draw_sides(&transparent(Side::Double)), &[Side::Back, Side::Front]);
        let mut single = transparent(Side::Double);
        single.force_single_pass = true;
        assert_eq!(draw_sides(&single), &[Side::Double]);
        let opaque = Material {
            side: Side::Double,
            ..Material::basic(LinearRgba::WHITE)
        };
        assert_eq!(draw_sides(&opaque), &[Side::Double]);
        assert_eq!(draw_sides(&transparent(Side::Back)), &[Side::Back]);
    }

    #[test]
    fn test_clear_flags_follow_auto_clear() {
        let flags = clear_flags(&AutoClear {
            color: true,
            depth: false,
            stencil: true,
        });
        assert_eq!(flags, ClearFlags::COLOR | ClearFlags::STENCIL);
    }

    #[test]
    fn test_buckets_are_drawn_in_order() {
        let mut frame = Frame::new();
        let glass = frame.store.insert(transparent(Side::Front));
        let solid = frame.store.insert(Material::basic(LinearRgba::BLACK));
        frame.add(glass, 0.0);
        frame.add(solid, 0.0);

        frame.render(&mut ForwardLane::new(), &mut FrameOutputs::default()).unwrap();
        let draws = frame.driver.draws();
        assert_eq!(draws.len(), 2);
        assert!(!draws[0].blending);
        assert!(draws[1].blending);
        assert_eq!(frame.ctx.info.draw_calls, 2);
        assert_eq!(frame.ctx.info.triangles, 2);
    }

    #[test]
    fn test_double_sided_transparent_draws_back_then_front() {
        let mut frame = Frame::new();
        let glass = frame.store.insert(transparent(Side::Double));
        frame.add(glass, 0.0);

        frame.render(&mut ForwardLane::new(), &mut FrameOutputs::default()).unwrap();
        let draws = frame.driver.draws();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.culling && d.cull_mode == CullMode::Back));
        assert_eq!(draws[0].front_face, FrontFace::Cw);
        assert_eq!(draws[1].front_face, FrontFace::Ccw);
    }

    #[test]
    fn test_mirrored_transform_flips_winding() {
        let mut frame = Frame::new();
        let solid = frame.store.insert(Material::basic(LinearRgba::WHITE));
        let index = frame.add(solid, 0.0);
        frame.scene.items[index].world =
            prism_core::math::Mat4::from_scale(prism_core::math::Vec3::new(-1.0, 1.0, 1.0));

        frame.render(&mut ForwardLane::new(), &mut FrameOutputs::default()).unwrap();
        assert_eq!(frame.driver.draws()[0].front_face, FrontFace::Cw);
    }

    #[test]
    fn test_clear_uses_background() {
        let mut frame = Frame::new();
        frame.scene.background = Some(LinearRgba::new(0.2, 0.3, 0.4, 1.0));
        frame.render(&mut ForwardLane::new(), &mut FrameOutputs::default()).unwrap();
        assert_eq!(frame.driver.count("clear"), 1);
        assert_eq!(frame.driver.count("clear_color"), 1);

        frame.driver.reset_log();
        frame.config.auto_clear = AutoClear {
            color: false,
            depth: false,
            stencil: false,
        };
        frame.render(&mut ForwardLane::new(), &mut FrameOutputs::default()).unwrap();
        assert_eq!(frame.driver.count("clear"), 0);
    }

    #[test]
    fn test_second_frame_skips_redundant_state() {
        let mut frame = Frame::new();
        let solid = frame.store.insert(Material::basic(LinearRgba::WHITE));
        frame.add(solid, 0.0);
        frame.config.auto_clear = AutoClear {
            color: false,
            depth: false,
            stencil: false,
        };
        let mut lane = ForwardLane::new();
        frame.render(&mut lane, &mut FrameOutputs::default()).unwrap();
        frame.driver.reset_log();
        frame.render(&mut lane, &mut FrameOutputs::default()).unwrap();

        assert_eq!(frame.driver.count("draw_arrays"), 1);
        assert_eq!(frame.driver.count("use_program"), 0);
        assert_eq!(frame.driver.count("uniform_f32"), 0);
        assert_eq!(frame.driver.count("enable"), 0);
        assert_eq!(frame.driver.count("buffer_data"), 0);
        assert_eq!(frame.driver.count("create_program"), 0);
    }
}
