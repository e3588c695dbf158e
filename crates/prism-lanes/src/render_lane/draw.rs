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

//! Per-draw submission shared by every pass.
//!
//! A draw resolves its program, applies fixed-function state, pushes the
//! uniforms that changed, binds textures and attributes, then issues the
//! draw call. Every step goes through the caches of the [`GpuContext`].

use super::lights::ShadowKind;
use super::program::{ProgramFeatures, ProgramRequest, ProgramVariant, ShaderTemplate};
use super::render_list::{RenderItem, RenderList};
use super::state::BlendParams;
use super::uniforms::ProgramUniforms;
use super::ProgramContext;
use crate::context::GpuContext;
use crate::resource_lane::{
    morph_attribute_name, BoundTexture, RenderTargetTable, TextureTable, WarnOnce,
};
use prism_core::asset::{ImageData, Material, RenderTarget, ResourceStore, Texture};
use prism_core::math::{Mat3, Vec2, Vec3};
use prism_core::memory::Arena;
use prism_core::renderer::api::*;
use prism_core::renderer::{
    FloatLayout, GpuDriver, RenderError, ResourceError, SamplerBinding, UniformValue,
};
use prism_core::scene::{Camera, Scene};

/// Maximum morph targets read by the built-in vertex stage.
pub const MAX_MORPH_ATTRIBUTES: usize = 4;

/// A rendered shadow map, sampled by the main pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapBinding {
    /// Light type.
    pub kind: ShadowKind,
    /// Slot in the shadow arrays of that type.
    pub slot: usize,
    /// Depth texture.
    pub texture: TextureId,
}

/// The opaque background copy sampled by transmissive materials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionSource {
    /// Color texture with mipmaps.
    pub texture: TextureId,
    /// Size in pixels.
    pub size: Vec2,
}

/// Reference point of light-distance rendering for point light shadows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReference {
    /// Light position.
    pub position: Vec3,
    /// Shadow camera near plane.
    pub near: f32,
    /// Shadow camera far plane.
    pub far: f32,
}

/// The inputs shared by every draw of one pass.
#[derive(Debug, Clone, Copy)]
pub struct PassInputs<'a> {
    /// The frame's scene.
    pub scene: &'a Scene,
    /// The view of this pass.
    pub camera: &'a Camera,
    /// Frame-level program inputs, with the pass output kind set.
    pub program_context: ProgramContext,
    /// Which program variant draws resolve.
    pub variant: ProgramVariant,
    /// Shadow maps available for sampling.
    pub shadow_maps: &'a [ShadowMapBinding],
    /// Transmission background, once rendered.
    pub transmission: Option<TransmissionSource>,
    /// Point light reference for [`ProgramVariant::Distance`].
    pub distance: Option<DistanceReference>,
    /// Tone mapping exposure.
    pub exposure: f32,
}

/// How fixed-function state is derived for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedState {
    /// From the material, drawing `side`.
    Material(Side),
    /// Opaque depth rendering of `side`, for shadow maps.
    Depth(Side),
}

/// What happened to one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// A draw call was issued.
    Drawn,
    /// The program is pending or failed.
    Skipped,
    /// The resolved range is empty.
    Empty,
}

/// Hands out texture units for one draw.
struct SamplerUnits<'a> {
    table: &'a mut TextureTable,
    images: &'a Arena<ImageData>,
    textures: &'a mut Arena<Texture>,
    targets: &'a mut RenderTargetTable,
    target_arena: &'a Arena<RenderTarget>,
    warnings: &'a mut WarnOnce,
    next: u32,
    max: u32,
}

impl SamplerUnits<'_> {
    fn resolve<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut super::StateCache,
        binding: Option<SamplerBinding>,
        fallback_target: TextureTarget,
    ) -> Result<BoundTexture, ResourceError> {
        let resolved = match binding {
            Some(SamplerBinding::Texture(handle)) => self
                .table
                .update(driver, state, self.images, self.textures, handle, self.warnings),
            Some(SamplerBinding::RenderTarget(handle)) => self
                .targets
                .update(driver, state, self.target_arena, handle)
                .and_then(|gpu| {
                    gpu.color
                        .first()
                        .map(|id| BoundTexture {
                            target: TextureTarget::Texture2D,
                            id: *id,
                        })
                        .ok_or(ResourceError::InvalidHandle {
                            kind: "render target",
                        })
                }),
            Some(SamplerBinding::Gpu { target, texture }) => Ok(BoundTexture { target, id: texture }),
            None => return self.table.fallback(driver, state, fallback_target),
        };
        match resolved {
            Ok(bound) => Ok(bound),
            Err(ResourceError::ContextLost) => Err(ResourceError::ContextLost),
            Err(err) => {
                self.warnings
                    .warn(format!("Sampling a fallback texture: {err}"));
                self.table.fallback(driver, state, fallback_target)
            }
        }
    }

    /// Binds each source to its own unit and points `name` at them.
    fn bind<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut super::StateCache,
        uniforms: &mut ProgramUniforms,
        name: &str,
        sources: &[Option<SamplerBinding>],
        fallback_target: TextureTarget,
    ) -> Result<(), ResourceError> {
        if sources.is_empty() || !uniforms.is_active(driver, name) {
            return Ok(());
        }
        let mut units = Vec::with_capacity(sources.len());
        for source in sources {
            if self.next >= self.max {
                self.warnings.warn(format!(
                    "Texture units exhausted ({} available); '{name}' is not bound",
                    self.max
                ));
                return Ok(());
            }
            let bound = self.resolve(driver, state, *source, fallback_target)?;
            state.bind_texture(driver, self.next, bound.target, Some(bound.id));
            units.push(self.next as i32);
            self.next += 1;
        }
        uniforms.set_i32(driver, name, &units);
        Ok(())
    }
}

fn upload_material_uniforms<D: GpuDriver + ?Sized>(
    driver: &mut D,
    u: &mut ProgramUniforms,
    material: &Material,
    pass: &PassInputs<'_>,
    features: ProgramFeatures,
    clipping_planes: u32,
) {
    use FloatLayout::{Scalar, Vec3 as V3, Vec4 as V4};
    u.set_f32(driver, "diffuse", V3, &material.color.rgb_vec().to_array());
    u.set_f32(driver, "opacity", Scalar, &[material.opacity]);
    u.set_f32(driver, "emissive", V3, &material.emissive.rgb_vec().to_array());
    u.set_f32(driver, "roughness", Scalar, &[material.roughness]);
    u.set_f32(driver, "metalness", Scalar, &[material.metalness]);
    u.set_f32(driver, "shininess", Scalar, &[material.shininess]);
    if features.contains(ProgramFeatures::ALPHA_TEST) {
        u.set_f32(driver, "alphaTest", Scalar, &[material.alpha_test]);
    }
    if features.contains(ProgramFeatures::ENV_MAP) {
        u.set_f32(driver, "envMapIntensity", Scalar, &[material.env_map_intensity]);
    }
    if features.contains(ProgramFeatures::TRANSMISSION) {
        u.set_f32(driver, "transmission", Scalar, &[material.transmission]);
        u.set_f32(driver, "thickness", Scalar, &[material.thickness]);
        u.set_f32(driver, "ior", Scalar, &[material.ior]);
        let size = pass.transmission.map_or(Vec2::ONE, |t| t.size);
        u.set_f32(driver, "transmissionSamplerSize", FloatLayout::Vec2, &size.to_array());
    }
    if features.contains(ProgramFeatures::FOG) {
        if let Some(fog) = &pass.scene.fog {
            u.set_f32(driver, "fogColor", V3, &fog.color.rgb_vec().to_array());
            u.set_f32(driver, "fogNear", Scalar, &[fog.near]);
            u.set_f32(driver, "fogFar", Scalar, &[fog.far]);
            u.set_f32(driver, "fogDensity", Scalar, &[fog.density]);
        }
    }
    u.set_f32(driver, "toneMappingExposure", Scalar, &[pass.exposure]);

    if clipping_planes > 0 {
        // Planes are compared against view-space positions.
        let to_view = pass.camera.view.inverse().transpose();
        let planes: Vec<f32> = material
            .clipping_planes
            .iter()
            .take(clipping_planes as usize)
            .flat_map(|plane| (to_view * *plane).to_array())
            .collect();
        u.set_f32(driver, "clippingPlanes", V4, &planes);
    }
    if let Some(distance) = pass.distance {
        u.set_f32(driver, "referencePosition", V3, &distance.position.to_array());
        u.set_f32(driver, "nearDistance", Scalar, &[distance.near]);
        u.set_f32(driver, "farDistance", Scalar, &[distance.far]);
    }
}

fn apply_depth_state<D: GpuDriver + ?Sized>(
    driver: &mut D,
    state: &mut super::StateCache,
    side: Side,
    mirrored: bool,
) {
    state.set_blending(driver, &BlendParams::preset(Blending::None, false));
    state.set_depth_test(driver, true);
    state.set_depth_func(driver, CompareFunction::LessEqual);
    state.set_depth_write(driver, true);
    state.set_color_mask(driver, ColorMask::ALL);
    state.set_capability(driver, Capability::StencilTest, false);
    state.set_polygon_offset(driver, false, 0.0, 0.0);
    if side == Side::Double {
        state.set_cull_mode(driver, CullMode::None);
    } else {
        state.set_cull_mode(driver, CullMode::Back);
    }
    let flip = (side == Side::Back) != mirrored;
    state.set_front_face(driver, if flip { FrontFace::Cw } else { FrontFace::Ccw });
}

/// Draws `item` once with `fixed` state.
///
/// A program that is still compiling or failed to compile skips the draw
/// and counts it in [`RenderInfo::skipped_draws`](prism_core::renderer::RenderInfo).
pub fn submit<D: GpuDriver>(
    ctx: &mut GpuContext<D>,
    store: &mut ResourceStore,
    pass: &PassInputs<'_>,
    item: &RenderItem,
    fixed: FixedState,
) -> Result<DrawOutcome, RenderError> {
    let drawable = RenderList::drawable(pass.scene, item);
    let ResourceStore {
        images,
        textures,
        geometries,
        materials,
        render_targets,
        ..
    } = store;
    let material = materials
        .get(item.material)
        .ok_or(RenderError::InvalidHandle { kind: "material" })?;
    let geometry = geometries
        .get_mut(item.geometry)
        .ok_or(RenderError::InvalidHandle { kind: "geometry" })?;
    let GpuContext {
        driver,
        state,
        programs,
        textures: texture_table,
        buffers,
        targets,
        lights,
        warnings,
        info,
        frame,
    } = ctx;

    buffers.update(driver, state, item.geometry, geometry)?;

    let request = ProgramRequest {
        handle: item.material,
        material,
        object: drawable.features,
        receive_shadow: drawable.receive_shadow,
        variant: pass.variant,
    };
    let program = programs.resolve(driver, state, &request, &pass.program_context, *frame)?;
    let entry = programs
        .get_mut(program)
        .ok_or(RenderError::InvalidHandle { kind: "program" })?;
    if !entry.is_ready() {
        log::trace!("Skipping draw of object {}: program '{}' not ready", drawable.id, entry.label());
        info.skipped_draws += 1;
        return Ok(DrawOutcome::Skipped);
    }
    let parameters = &entry.key().parameters;
    let template = parameters.template;
    let features = parameters.features;
    let clipping_planes = parameters.clipping_planes;
    let morph_targets = parameters.morph_targets as usize;
    let env_target = match parameters.env_map_mode {
        EnvMapMode::CubeReflection | EnvMapMode::CubeRefraction => TextureTarget::CubeMap,
        _ => TextureTarget::Texture2D,
    };

    let mirrored = drawable.world.determinant() < 0.0;
    match fixed {
        FixedState::Material(side) => state.set_material_state(driver, material, side, mirrored),
        FixedState::Depth(side) => apply_depth_state(driver, state, side, mirrored),
    }
    state.use_program(driver, Some(entry.program()));

    let u = entry.uniforms_mut();
    let camera = pass.camera;
    u.set_f32(driver, "projectionMatrix", FloatLayout::Mat4, &camera.projection.to_cols_array());
    u.set_f32(driver, "viewMatrix", FloatLayout::Mat4, &camera.view.to_cols_array());
    u.set_f32(driver, "cameraPosition", FloatLayout::Vec3, &camera.position.to_array());
    u.set_f32(driver, "modelMatrix", FloatLayout::Mat4, &drawable.world.to_cols_array());
    if u.is_active(driver, "normalMatrix") {
        let normal = Mat3::from_mat4(drawable.world).inverse().transpose();
        u.set_f32(driver, "normalMatrix", FloatLayout::Mat3, &normal.to_cols_array());
    }
    if matches!(template, ShaderTemplate::Lit(_)) {
        lights.upload(driver, u);
    }
    upload_material_uniforms(driver, u, material, pass, features, clipping_planes);

    if features.contains(ProgramFeatures::SKINNING) && !drawable.bone_matrices.is_empty() {
        let bones: Vec<f32> = drawable
            .bone_matrices
            .iter()
            .flat_map(|m| m.to_cols_array())
            .collect();
        u.set_f32(driver, "boneMatrices", FloatLayout::Mat4, &bones);
    }
    if morph_targets > 0 {
        let n = morph_targets.min(drawable.morph_influences.len());
        if n > 0 {
            u.set_f32(
                driver,
                "morphTargetInfluences",
                FloatLayout::Scalar,
                &drawable.morph_influences[..n],
            );
        }
    }

    let mut units = SamplerUnits {
        table: texture_table,
        images,
        textures,
        targets,
        target_arena: render_targets,
        warnings,
        next: 0,
        max: driver.capabilities().max_texture_units,
    };
    let maps = &material.maps;
    let map_samplers = [
        ("map", maps.map),
        ("alphaMap", maps.alpha_map),
        ("normalMap", maps.normal_map),
        ("emissiveMap", maps.emissive_map),
        ("roughnessMap", maps.roughness_map),
        ("metalnessMap", maps.metalness_map),
        ("aoMap", maps.ao_map),
    ];
    for (name, texture) in map_samplers {
        if let Some(texture) = texture {
            let source = [Some(SamplerBinding::Texture(texture))];
            units.bind(driver, state, u, name, &source, TextureTarget::Texture2D)?;
        }
    }
    if features.contains(ProgramFeatures::ENV_MAP) {
        let env = maps.env_map.or(pass.scene.environment);
        let source = [env.map(SamplerBinding::Texture)];
        units.bind(driver, state, u, "envMap", &source, env_target)?;
    }
    if features.contains(ProgramFeatures::TRANSMISSION) {
        let source = [pass.transmission.map(|t| SamplerBinding::Gpu {
            target: TextureTarget::Texture2D,
            texture: t.texture,
        })];
        units.bind(driver, state, u, "transmissionSamplerMap", &source, TextureTarget::Texture2D)?;
    }
    if features.contains(ProgramFeatures::RECEIVE_SHADOW) {
        for (kind, name) in [
            (ShadowKind::Directional, "directionalShadowMap"),
            (ShadowKind::Spot, "spotShadowMap"),
            (ShadowKind::Point, "pointShadowMap"),
        ] {
            let mut maps: Vec<&ShadowMapBinding> =
                pass.shadow_maps.iter().filter(|m| m.kind == kind).collect();
            maps.sort_by_key(|m| m.slot);
            let sources: Vec<Option<SamplerBinding>> = maps
                .iter()
                .map(|m| {
                    Some(SamplerBinding::Gpu {
                        target: TextureTarget::Texture2D,
                        texture: m.texture,
                    })
                })
                .collect();
            units.bind(driver, state, u, name, &sources, TextureTarget::Texture2D)?;
        }
    }
    for (name, value) in &material.uniforms {
        match value {
            UniformValue::Texture(binding) => {
                units.bind(driver, state, u, name, &[Some(*binding)], TextureTarget::Texture2D)?;
            }
            UniformValue::Array(values)
                if values.first().is_some_and(|v| matches!(v, UniformValue::Texture(_))) =>
            {
                // Non-sampler elements sample the fallback texture.
                let sources: Vec<Option<SamplerBinding>> = values
                    .iter()
                    .map(|v| match v {
                        UniformValue::Texture(binding) => Some(*binding),
                        _ => None,
                    })
                    .collect();
                units.bind(driver, state, u, name, &sources, TextureTarget::Texture2D)?;
            }
            other => {
                u.set_value(driver, name, other);
            }
        }
    }

    state.begin_attributes();
    let morph_names: Vec<String> = (0..morph_targets
        .min(MAX_MORPH_ATTRIBUTES)
        .min(geometry.morph_positions.len()))
        .map(morph_attribute_name)
        .collect();
    let attributes = geometry
        .attributes
        .iter()
        .map(|(name, attribute)| (name.as_str(), attribute))
        .chain(
            morph_names
                .iter()
                .map(String::as_str)
                .zip(geometry.morph_positions.iter()),
        );
    for (name, attribute) in attributes {
        let Some(location) = entry.attribute_location(driver, name) else {
            continue;
        };
        let Some(buffer) = buffers.attribute(item.geometry, name) else {
            continue;
        };
        if attribute.item_size == 16 {
            for column in 0..4u32 {
                let binding = VertexAttributeBinding {
                    buffer,
                    components: 4,
                    normalized: attribute.normalized,
                    stride: 64,
                    offset: column * 16,
                    divisor: attribute.divisor,
                };
                state.vertex_attribute(driver, AttributeLocation(location.0 + column), &binding);
            }
        } else {
            let binding = VertexAttributeBinding {
                buffer,
                components: attribute.item_size,
                normalized: attribute.normalized,
                stride: 0,
                offset: 0,
                divisor: attribute.divisor,
            };
            state.vertex_attribute(driver, location, &binding);
        }
    }
    state.disable_unused_attributes(driver);

    let (start, count) = geometry.resolve_range(drawable.group);
    if count == 0 {
        return Ok(DrawOutcome::Empty);
    }
    let instances = drawable.instance_count.max(1);
    let topology = geometry.topology;
    match buffers.index(item.geometry) {
        Some(index) => driver.draw_elements(topology, index, start, count, instances),
        None => driver.draw_arrays(topology, start, count, instances),
    }
    info.draw_calls += 1;
    let primitives = topology.primitive_count(count) * instances;
    match topology {
        PrimitiveTopology::Points => info.points += primitives,
        t if t.is_line() => info.lines += primitives,
        _ => info.triangles += primitives,
    }
    Ok(DrawOutcome::Drawn)
}
