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

//! Shadow pass lane implementation - handles depth rendering for shadows.

use super::{
    submit, DistanceReference, FixedState, FrameInputs, FrameOutputs, OutputKind, PassInputs,
    ProgramVariant, RenderLane, RenderList, ShadowCaster, ShadowKind, ShadowMapBinding,
};
use crate::context::GpuContext;
use crate::resource_lane::InternalTarget;
use prism_core::asset::{Material, ResourceStore};
use prism_core::math::{Mat4, Rect};
use prism_core::renderer::api::{ClearFlags, RenderTargetDescriptor};
use prism_core::renderer::{GpuDriver, RenderError};
use prism_core::scene::Camera;

/// Cells of the 4x2 point light atlas, one per cube face.
const POINT_FACE_CELLS: [(i32, i32); 6] = [(2, 1), (0, 1), (3, 1), (1, 1), (3, 0), (1, 0)];

/// Returns `true` if an item drawn with `material` is rendered into shadow
/// maps. Blended materials only cast shadows when they opt in.
pub fn casts_shadow_with(material: &Material) -> bool {
    !material.transparent || material.transparent_shadow || material.is_transmissive()
}

/// Size of the map of `kind` for a face edge of `map_size` texels.
pub fn shadow_map_extent(kind: ShadowKind, map_size: u32) -> (u32, u32) {
    let size = map_size.max(1);
    match kind {
        ShadowKind::Point => (size * 4, size * 2),
        ShadowKind::Directional | ShadowKind::Spot => (size, size),
    }
}

/// A rendering lane dedicated to producing shadow maps.
///
/// Every shadow-casting light renders the shadow-eligible items into its own
/// renderer-internal depth target. With `auto_update` off, maps are kept until
/// the light setup changes.
#[derive(Debug, Default)]
pub struct ShadowPassLane {
    rendered_version: Option<u64>,
    maps: Vec<ShadowMapBinding>,
}

impl ShadowPassLane {
    /// Creates a new `ShadowPassLane`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps produced by the last render.
    pub fn maps(&self) -> &[ShadowMapBinding] {
        &self.maps
    }

    fn release<D: GpuDriver>(&mut self, ctx: &mut GpuContext<D>) {
        if !self.maps.is_empty() {
            let GpuContext {
                driver,
                state,
                targets,
                ..
            } = ctx;
            targets.retain_internal(driver, state, |slot| {
                !matches!(slot, InternalTarget::Shadow(..))
            });
            self.maps.clear();
        }
        self.rendered_version = None;
    }

    fn render_caster<D: GpuDriver>(
        &mut self,
        ctx: &mut GpuContext<D>,
        store: &mut ResourceStore,
        inputs: &FrameInputs<'_>,
        caster: ShadowCaster,
    ) -> Result<(), RenderError> {
        let Some(light) = inputs.scene.lights.lights.get(caster.light) else {
            return Ok(());
        };
        let Some(shadow) = light.shadow.as_ref() else {
            return Ok(());
        };
        let (width, height) = shadow_map_extent(caster.kind, shadow.map_size);
        let descriptor = RenderTargetDescriptor::depth_only(width, height);
        let slot = InternalTarget::Shadow(caster.kind, caster.slot as u32);

        let GpuContext {
            driver,
            state,
            targets,
            ..
        } = ctx;
        let gpu = targets.internal(driver, state, slot, &descriptor)?;
        let texture = gpu
            .depth
            .ok_or(RenderError::InvalidHandle { kind: "shadow map" })?;
        state.bind_framebuffer(driver, Some(gpu.framebuffer));
        state.set_viewport(driver, Rect::from_size(width, height));
        state.set_clear_depth(driver, 1.0);
        state.clear(driver, ClearFlags::DEPTH);

        let (variant, distance, faces) = match caster.kind {
            ShadowKind::Point => (
                ProgramVariant::Distance,
                Some(DistanceReference {
                    position: light.position,
                    near: shadow.camera_near,
                    far: shadow.camera_far,
                }),
                POINT_FACE_CELLS.len(),
            ),
            ShadowKind::Directional | ShadowKind::Spot => (ProgramVariant::Depth, None, 1),
        };
        let cell = shadow.map_size.max(1) as i32;
        for face in 0..faces {
            if caster.kind == ShadowKind::Point {
                let (x, y) = POINT_FACE_CELLS[face];
                ctx.state
                    .set_viewport(&mut ctx.driver, Rect::new(x * cell, y * cell, cell, cell));
            }
            let camera = Camera {
                view: Mat4::IDENTITY,
                projection: shadow.matrices.get(face).copied().unwrap_or(Mat4::IDENTITY),
                position: light.position,
                viewport: None,
            };
            let pass = PassInputs {
                scene: inputs.scene,
                camera: &camera,
                program_context: inputs.program_context.with_output(OutputKind::Intermediate),
                variant,
                shadow_maps: &[],
                transmission: None,
                distance,
                exposure: 1.0,
            };
            for item in inputs.list.iter() {
                if !RenderList::drawable(inputs.scene, item).cast_shadow {
                    continue;
                }
                let side = match store.materials.get(item.material) {
                    Some(material) if casts_shadow_with(material) => material.resolved_shadow_side(),
                    Some(_) => continue,
                    None => return Err(RenderError::InvalidHandle { kind: "material" }),
                };
                submit(ctx, store, &pass, item, FixedState::Depth(side))?;
            }
        }
        self.maps.push(ShadowMapBinding {
            kind: caster.kind,
            slot: caster.slot,
            texture,
        });
        Ok(())
    }
}

impl<D: GpuDriver> RenderLane<D> for ShadowPassLane {
    fn strategy_name(&self) -> &'static str {
        "ShadowPass"
    }

    fn estimate_cost(&self, inputs: &FrameInputs<'_>) -> f32 {
        if !inputs.config.shadow_map.enabled {
            return 0.0;
        }
        let casters = inputs.scene.lights.lights.iter().filter(|l| l.casts_shadow()).count();
        let items = inputs
            .list
            .iter()
            .filter(|item| RenderList::drawable(inputs.scene, item).cast_shadow)
            .count();
        (casters * items) as f32
    }

    fn render(
        &mut self,
        ctx: &mut GpuContext<D>,
        store: &mut ResourceStore,
        inputs: &FrameInputs<'_>,
        outputs: &mut FrameOutputs,
    ) -> Result<(), RenderError> {
        let settings = &inputs.config.shadow_map;
        let casters = ctx.lights.shadow_casters().to_vec();
        if !settings.enabled || casters.is_empty() {
            self.release(ctx);
            outputs.shadow_maps.clear();
            return Ok(());
        }

        let version = ctx.lights.version();
        let resident = self.maps.iter().all(|map| {
            ctx.targets
                .get_internal(InternalTarget::Shadow(map.kind, map.slot as u32))
                .is_some()
        });
        if !settings.auto_update && self.rendered_version == Some(version) && resident {
            outputs.shadow_maps = self.maps.clone();
            return Ok(());
        }

        self.maps.clear();
        for caster in &casters {
            self.render_caster(ctx, store, inputs, *caster)?;
        }
        let live: Vec<InternalTarget> = self
            .maps
            .iter()
            .map(|map| InternalTarget::Shadow(map.kind, map.slot as u32))
            .collect();
        let GpuContext {
            driver,
            state,
            targets,
            ..
        } = ctx;
        targets.retain_internal(driver, state, |slot| {
            !matches!(slot, InternalTarget::Shadow(..)) || live.contains(&slot)
        });
        log::debug!("Rendered {} shadow maps", self.maps.len());

        self.rendered_version = Some(version);
        outputs.shadow_maps = self.maps.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Frame;
    use prism_core::math::{LinearRgba, Vec3};
    use prism_core::renderer::light::{
        DirectionalLight, LightDescriptor, LightType, PointLight, ShadowDescriptor,
    };

    fn shadowed_frame(light: LightType) -> Frame {
        let mut frame = Frame::new();
        frame.config.shadow_map.enabled = true;
        let material = frame.store.insert(Material::standard(LinearRgba::WHITE));
        let index = frame.add(material, 0.0);
        frame.scene.items[index].cast_shadow = true;
        let matrices = match light {
            LightType::Point(_) => vec![Mat4::IDENTITY; 6],
            _ => vec![Mat4::IDENTITY],
        };
        frame.scene.lights.version = 1;
        frame.scene.lights.lights.push(LightDescriptor {
            light,
            position: Vec3::new(0.0, 4.0, 0.0),
            shadow: Some(ShadowDescriptor {
                map_size: 256,
                matrices,
                ..Default::default()
            }),
        });
        frame
    }

    #[test]
    fn test_shadow_map_extent() {
        assert_eq!(shadow_map_extent(ShadowKind::Point, 512), (2048, 1024));
        assert_eq!(shadow_map_extent(ShadowKind::Spot, 512), (512, 512));
        assert_eq!(shadow_map_extent(ShadowKind::Directional, 0), (1, 1));
    }

    #[test]
    fn test_transparent_items_need_opt_in() {
        let mut material = Material::basic(LinearRgba::WHITE);
        assert!(casts_shadow_with(&material));
        material.transparent = true;
        assert!(!casts_shadow_with(&material));
        material.transparent_shadow = true;
        assert!(casts_shadow_with(&material));
    }

    #[test]
    fn test_directional_caster_renders_one_map() {
        let mut frame = shadowed_frame(LightType::Directional(DirectionalLight::default()));
        let mut outputs = FrameOutputs::default();
        frame.render(&mut ShadowPassLane::new(), &mut outputs).unwrap();

        assert_eq!(outputs.shadow_maps.len(), 1);
        assert_eq!(outputs.shadow_maps[0].kind, ShadowKind::Directional);
        let draws = frame.driver.draws();
        assert_eq!(draws.len(), 1);
        assert!(draws[0].framebuffer.is_some());
        assert_eq!(draws[0].viewport, Rect::from_size(256, 256));
        assert!(!draws[0].blending);
        // Front-sided materials render their back faces into shadow maps.
        assert_eq!(draws[0].front_face, prism_core::renderer::api::FrontFace::Cw);
    }

    #[test]
    fn test_point_caster_renders_six_faces_into_atlas() {
        let mut frame = shadowed_frame(LightType::Point(PointLight::default()));
        let mut outputs = FrameOutputs::default();
        frame.render(&mut ShadowPassLane::new(), &mut outputs).unwrap();

        let draws = frame.driver.draws();
        assert_eq!(draws.len(), 6);
        assert_eq!(draws[0].viewport, Rect::new(512, 256, 256, 256));
        assert_eq!(draws[5].viewport, Rect::new(256, 0, 256, 256));
        assert!(draws[0].floats("referencePosition").is_some());
        assert_eq!(outputs.shadow_maps[0].kind, ShadowKind::Point);
    }

    #[test]
    fn test_non_casters_are_skipped() {
        let mut frame = shadowed_frame(LightType::Directional(DirectionalLight::default()));
        frame.scene.items[0].cast_shadow = false;
        let mut outputs = FrameOutputs::default();
        frame.render(&mut ShadowPassLane::new(), &mut outputs).unwrap();
        assert!(frame.driver.draws().is_empty());
        assert_eq!(outputs.shadow_maps.len(), 1);
    }

    #[test]
    fn test_disabled_shadows_render_nothing() {
        let mut frame = shadowed_frame(LightType::Directional(DirectionalLight::default()));
        frame.config.shadow_map.enabled = false;
        let mut outputs = FrameOutputs::default();
        frame.render(&mut ShadowPassLane::new(), &mut outputs).unwrap();
        assert!(outputs.shadow_maps.is_empty());
        assert_eq!(frame.driver.count("create_render_target"), 0);
    }

    #[test]
    fn test_manual_update_reuses_maps() {
        let mut frame = shadowed_frame(LightType::Directional(DirectionalLight::default()));
        frame.config.shadow_map.auto_update = false;
        let mut lane = ShadowPassLane::new();
        frame.render(&mut lane, &mut FrameOutputs::default()).unwrap();
        frame.driver.reset_log();

        let mut outputs = FrameOutputs::default();
        frame.render(&mut lane, &mut outputs).unwrap();
        assert_eq!(outputs.shadow_maps.len(), 1);
        assert!(frame.driver.draws().is_empty());

        frame.scene.lights.version += 1;
        frame.render(&mut lane, &mut outputs).unwrap();
        assert_eq!(frame.driver.draws().len(), 1);
    }

    #[test]
    fn test_removed_caster_releases_its_map() {
        let mut frame = shadowed_frame(LightType::Directional(DirectionalLight::default()));
        let mut lane = ShadowPassLane::new();
        frame.render(&mut lane, &mut FrameOutputs::default()).unwrap();
        assert_eq!(frame.ctx.targets.len(), 1);

        frame.scene.lights.lights.clear();
        frame.scene.lights.version += 1;
        frame.render(&mut lane, &mut FrameOutputs::default()).unwrap();
        assert_eq!(frame.ctx.targets.len(), 0);
        assert_eq!(frame.driver.count("delete_render_target"), 1);
    }
}
