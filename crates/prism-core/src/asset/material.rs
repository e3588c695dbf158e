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

//! The material descriptor: a parameter bag read by the program cache, the
//! state cache and the uniform upload path.

use super::Texture;
use crate::math::{LinearRgba, Vec4};
use crate::memory::Handle;
use crate::renderer::api::{
    Blending, BlendEquation, BlendFactor, CompareFunction, EnvMapMode, Side, StencilOperation,
};
use crate::renderer::uniform::UniformValue;
use std::collections::BTreeMap;

/// The shading model of a material, selecting the built-in shader template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Unlit color.
    Basic,
    /// Diffuse-only lighting.
    Lambert,
    /// Blinn-Phong lighting.
    Phong,
    /// Metallic-roughness PBR.
    #[default]
    Standard,
    /// PBR with transmission and clearcoat-style extensions.
    Physical,
    /// Writes depth only.
    Depth,
    /// Application-provided shader sources.
    Custom,
}

impl MaterialKind {
    /// Returns `true` if the shading model reacts to scene lights.
    pub fn is_lit(self) -> bool {
        matches!(
            self,
            MaterialKind::Lambert
                | MaterialKind::Phong
                | MaterialKind::Standard
                | MaterialKind::Physical
        )
    }
}

/// Texture slots of a material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MaterialMaps {
    /// Base color.
    pub map: Option<Handle<Texture>>,
    /// Opacity (green channel).
    pub alpha_map: Option<Handle<Texture>>,
    /// Tangent-space normals.
    pub normal_map: Option<Handle<Texture>>,
    /// Emissive color.
    pub emissive_map: Option<Handle<Texture>>,
    /// Roughness (green channel).
    pub roughness_map: Option<Handle<Texture>>,
    /// Metalness (blue channel).
    pub metalness_map: Option<Handle<Texture>>,
    /// Ambient occlusion (red channel).
    pub ao_map: Option<Handle<Texture>>,
    /// Environment map. Overrides the scene environment.
    pub env_map: Option<Handle<Texture>>,
}

/// Full shader sources of a custom material.
///
/// The renderer prepends its generated prelude (precision, `#define`s and
/// built-in uniforms) to both stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomShader {
    /// Vertex stage body.
    pub vertex: String,
    /// Fragment stage body.
    pub fragment: String,
}

/// A semantic description of how a surface is shaded.
///
/// Any change that should reach the GPU must bump `version` (see
/// [`crate::asset::RenderResource::bump_version`]): uniforms are re-evaluated
/// and the program binding is re-resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// A label for diagnostics.
    pub name: String,
    /// The shading model.
    pub kind: MaterialKind,

    // --- Surface ---
    /// Base color.
    pub color: LinearRgba,
    /// Opacity, used when `transparent` is set.
    pub opacity: f32,
    /// Emitted color.
    pub emissive: LinearRgba,
    /// PBR roughness.
    pub roughness: f32,
    /// PBR metalness.
    pub metalness: f32,
    /// Phong specular exponent.
    pub shininess: f32,
    /// Amount of light transmitted through the surface.
    pub transmission: f32,
    /// Thickness of the transmissive volume.
    pub thickness: f32,
    /// Index of refraction.
    pub ior: f32,
    /// Texture slots.
    pub maps: MaterialMaps,
    /// Environment map contribution.
    pub env_map_intensity: f32,
    /// How the environment map is sampled.
    pub env_map_mode: EnvMapMode,
    /// Multiply by the `color` vertex attribute.
    pub vertex_colors: bool,
    /// Use face normals.
    pub flat_shading: bool,
    /// Affected by scene fog.
    pub fog: bool,
    /// Lit kinds receive scene lights only when set.
    pub lights: bool,
    /// Tone mapping is applied to this material's output.
    pub tone_mapped: bool,
    /// Render as lines.
    pub wireframe: bool,

    // --- Blending and transparency ---
    /// Rendered in the transparent bucket, back to front.
    pub transparent: bool,
    /// Blending preset.
    pub blending: Blending,
    /// RGB blend equation for [`Blending::Custom`].
    pub blend_equation: BlendEquation,
    /// RGB source factor for [`Blending::Custom`].
    pub blend_src: BlendFactor,
    /// RGB destination factor for [`Blending::Custom`].
    pub blend_dst: BlendFactor,
    /// Alpha blend equation; falls back to `blend_equation`.
    pub blend_equation_alpha: Option<BlendEquation>,
    /// Alpha source factor; falls back to `blend_src`.
    pub blend_src_alpha: Option<BlendFactor>,
    /// Alpha destination factor; falls back to `blend_dst`.
    pub blend_dst_alpha: Option<BlendFactor>,
    /// Constant blend color.
    pub blend_color: LinearRgba,
    /// Constant blend alpha.
    pub blend_alpha: f32,
    /// Colors are premultiplied by alpha.
    pub premultiplied_alpha: bool,
    /// Fragments with alpha below this value are discarded.
    pub alpha_test: f32,
    /// Enable alpha-to-coverage when multisampling.
    pub alpha_to_coverage: bool,

    // --- Rasterization ---
    /// Rendered faces.
    pub side: Side,
    /// Faces rendered into shadow maps; defaults to the opposite of `side`.
    pub shadow_side: Option<Side>,
    /// Draw double-sided transparent objects in a single pass.
    pub force_single_pass: bool,
    /// Depth testing.
    pub depth_test: bool,
    /// Depth writes.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_func: CompareFunction,
    /// Color writes.
    pub color_write: bool,
    /// Enable polygon offset.
    pub polygon_offset: bool,
    /// Polygon offset factor.
    pub polygon_offset_factor: f32,
    /// Polygon offset units.
    pub polygon_offset_units: f32,

    // --- Stencil ---
    /// Enable stencil testing and writes.
    pub stencil_write: bool,
    /// Stencil comparison.
    pub stencil_func: CompareFunction,
    /// Stencil reference value.
    pub stencil_ref: i32,
    /// Stencil read mask.
    pub stencil_func_mask: u32,
    /// Stencil write mask.
    pub stencil_write_mask: u32,
    /// Operation on stencil failure.
    pub stencil_fail: StencilOperation,
    /// Operation on depth failure.
    pub stencil_zfail: StencilOperation,
    /// Operation when both tests pass.
    pub stencil_zpass: StencilOperation,

    // --- Shadows and clipping ---
    /// Transparent objects with this flag still cast shadows.
    pub transparent_shadow: bool,
    /// Local clipping planes (xyz normal, w constant) in world space.
    pub clipping_planes: Vec<Vec4>,
    /// Clip only where every plane clips.
    pub clip_intersection: bool,
    /// Apply clipping planes in the shadow pass too.
    pub clip_shadows: bool,

    // --- Custom programs ---
    /// Extra `#define`s injected into the program.
    pub defines: BTreeMap<String, String>,
    /// Extra uniforms uploaded with the material.
    pub uniforms: BTreeMap<String, UniformValue>,
    /// Full sources, for [`MaterialKind::Custom`].
    pub shader: Option<CustomShader>,
    /// An application key distinguishing programs the renderer cannot tell
    /// apart from the parameters alone.
    pub custom_program_cache_key: Option<String>,

    /// Invisible materials are skipped by the render list builder.
    pub visible: bool,
    /// Incremented whenever the material changes.
    pub version: u64,
}

impl Default for Material {
    fn default() -> Self {
        Self::new(MaterialKind::Standard)
    }
}

impl Material {
    /// Creates a material of `kind` with neutral defaults.
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            name: String::new(),
            kind,
            color: LinearRgba::WHITE,
            opacity: 1.0,
            emissive: LinearRgba::BLACK,
            roughness: 1.0,
            metalness: 0.0,
            shininess: 30.0,
            transmission: 0.0,
            thickness: 0.0,
            ior: 1.5,
            maps: MaterialMaps::default(),
            env_map_intensity: 1.0,
            env_map_mode: EnvMapMode::None,
            vertex_colors: false,
            flat_shading: false,
            fog: true,
            lights: true,
            tone_mapped: true,
            wireframe: false,
            transparent: false,
            blending: Blending::Normal,
            blend_equation: BlendEquation::Add,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::OneMinusSrcAlpha,
            blend_equation_alpha: None,
            blend_src_alpha: None,
            blend_dst_alpha: None,
            blend_color: LinearRgba::BLACK,
            blend_alpha: 0.0,
            premultiplied_alpha: false,
            alpha_test: 0.0,
            alpha_to_coverage: false,
            side: Side::Front,
            shadow_side: None,
            force_single_pass: false,
            depth_test: true,
            depth_write: true,
            depth_func: CompareFunction::LessEqual,
            color_write: true,
            polygon_offset: false,
            polygon_offset_factor: 0.0,
            polygon_offset_units: 0.0,
            stencil_write: false,
            stencil_func: CompareFunction::Always,
            stencil_ref: 0,
            stencil_func_mask: 0xff,
            stencil_write_mask: 0xff,
            stencil_fail: StencilOperation::Keep,
            stencil_zfail: StencilOperation::Keep,
            stencil_zpass: StencilOperation::Keep,
            transparent_shadow: false,
            clipping_planes: Vec::new(),
            clip_intersection: false,
            clip_shadows: false,
            defines: BTreeMap::new(),
            uniforms: BTreeMap::new(),
            shader: None,
            custom_program_cache_key: None,
            visible: true,
            version: 0,
        }
    }

    /// An unlit material of the given color.
    pub fn basic(color: LinearRgba) -> Self {
        Self {
            color,
            ..Self::new(MaterialKind::Basic)
        }
    }

    /// A metallic-roughness material of the given color.
    pub fn standard(color: LinearRgba) -> Self {
        Self {
            color,
            ..Self::new(MaterialKind::Standard)
        }
    }

    /// A physically based material with transmission, clearcoat and sheen.
    pub fn physical(color: LinearRgba) -> Self {
        Self {
            color,
            ..Self::new(MaterialKind::Physical)
        }
    }

    /// A custom material with full shader sources.
    pub fn custom(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            shader: Some(CustomShader {
                vertex: vertex.into(),
                fragment: fragment.into(),
            }),
            ..Self::new(MaterialKind::Custom)
        }
    }

    /// Returns `true` if scene lights affect this material.
    pub fn receives_lights(&self) -> bool {
        self.lights && self.kind.is_lit()
    }

    /// Returns `true` if the material needs a transmission background.
    ///
    /// Only lit physical materials sample it.
    pub fn is_transmissive(&self) -> bool {
        self.kind == MaterialKind::Physical && self.lights && self.transmission > 0.0
    }

    /// The side rendered into shadow maps.
    pub fn resolved_shadow_side(&self) -> Side {
        self.shadow_side.unwrap_or(match self.side {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
            Side::Double => Side::Double,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shadow_side_is_opposite() {
        let mut m = Material::default();
        assert_eq!(m.resolved_shadow_side(), Side::Back);
        m.side = Side::Double;
        assert_eq!(m.resolved_shadow_side(), Side::Double);
        m.shadow_side = Some(Side::Front);
        assert_eq!(m.resolved_shadow_side(), Side::Front);
    }

    #[test]
    fn test_only_lit_physical_materials_are_transmissive() {
        let mut physical = Material::physical(LinearRgba::WHITE);
        assert!(!physical.is_transmissive());
        physical.transmission = 0.5;
        assert!(physical.is_transmissive());
        physical.lights = false;
        assert!(!physical.is_transmissive());

        let mut standard = Material::standard(LinearRgba::WHITE);
        standard.transmission = 0.5;
        assert!(!standard.is_transmissive());
    }

    #[test]
    fn test_lit_kinds() {
        assert!(MaterialKind::Standard.is_lit());
        assert!(!MaterialKind::Basic.is_lit());
        assert!(!MaterialKind::Custom.is_lit());
    }
}
