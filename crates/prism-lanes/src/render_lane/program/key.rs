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

//! Program cache keys.
//!
//! A [`ProgramKey`] is a plain hashable value: the interned stage ids plus
//! every parameter that changes the generated shader source. Two draws with
//! equal keys always share a program.

use super::stage::StageId;
use bitflags::bitflags;
use prism_core::asset::{Material, MaterialKind};
use prism_core::config::RendererConfig;
use prism_core::renderer::api::*;
use prism_core::renderer::LightCounts;
use prism_core::scene::{ObjectFeatures, Scene};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

bitflags! {
    /// Boolean shader features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProgramFeatures: u32 {
        const MAP = 1 << 0;
        const ALPHA_MAP = 1 << 1;
        const NORMAL_MAP = 1 << 2;
        const EMISSIVE_MAP = 1 << 3;
        const ROUGHNESS_MAP = 1 << 4;
        const METALNESS_MAP = 1 << 5;
        const AO_MAP = 1 << 6;
        const ENV_MAP = 1 << 7;
        const VERTEX_COLORS = 1 << 8;
        const FLAT_SHADING = 1 << 9;
        const FOG = 1 << 10;
        const FOG_EXP2 = 1 << 11;
        const ALPHA_TEST = 1 << 12;
        const TRANSMISSION = 1 << 13;
        const PREMULTIPLIED_ALPHA = 1 << 14;
        const DOUBLE_SIDED = 1 << 15;
        const FLIP_SIDED = 1 << 16;
        const SHADOW_MAP = 1 << 17;
        const RECEIVE_SHADOW = 1 << 18;
        const SKINNING = 1 << 19;
        const MORPH_TARGETS = 1 << 20;
        const INSTANCING = 1 << 21;
        const INSTANCING_COLOR = 1 << 22;
        const ALPHA_TO_COVERAGE = 1 << 23;
        const DISTANCE = 1 << 24;
    }
}

/// The lighting model of a lit template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightingModel {
    /// Diffuse only.
    Lambert,
    /// Diffuse plus Blinn-Phong specular.
    Phong,
    /// Metallic-roughness.
    Standard,
    /// Metallic-roughness with transmission.
    Physical,
}

/// Which shader body a program is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderTemplate {
    /// Flat color and texture.
    Unlit,
    /// Scene lights and shadows.
    Lit(LightingModel),
    /// Depth only, for shadow maps and depth materials.
    Depth,
    /// Material supplied sources.
    Custom,
}

/// Which pass a program is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramVariant {
    /// The material's own shading.
    Forward,
    /// Depth only into a directional or spot shadow map.
    Depth,
    /// Light distance into a point light shadow map.
    Distance,
}

/// Where the pass renders, which decides tone mapping and output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputKind {
    /// The default framebuffer or an application target.
    #[default]
    Final,
    /// A renderer-internal linear target (transmission background).
    Intermediate,
}

/// The frame-level inputs of program derivation.
///
/// Everything here can change a program without the material changing, so
/// the whole value is hashed into the signature that guards the per-material
/// fast path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProgramContext {
    /// Renderer-side light state version.
    pub light_version: u64,
    /// Light counts by type.
    pub lights: LightCounts,
    /// Shadow maps are rendered this frame.
    pub shadows_enabled: bool,
    /// Shadow filtering.
    pub shadow_type: ShadowMapType,
    /// Scene fog.
    pub fog: FogKind,
    /// The scene has an environment map.
    pub environment: bool,
    /// Renderer tone mapping.
    pub tone_mapping: ToneMapping,
    /// Renderer output color space.
    pub output_color_space: ColorSpace,
    /// Float precision.
    pub precision: Precision,
    /// Per-material clipping planes are honored.
    pub clipping_enabled: bool,
    /// Where the current pass renders.
    pub output: OutputKind,
}

impl ProgramContext {
    /// The context of a frame rendering `scene` to its final output.
    pub fn for_frame(
        config: &RendererConfig,
        light_version: u64,
        lights: LightCounts,
        scene: &Scene,
    ) -> Self {
        Self {
            light_version,
            lights,
            shadows_enabled: config.shadow_map.enabled,
            shadow_type: config.shadow_map.kind,
            fog: scene.fog.map_or(FogKind::None, |fog| fog.kind),
            environment: scene.environment.is_some(),
            tone_mapping: config.tone_mapping,
            output_color_space: config.output_color_space,
            precision: config.precision,
            clipping_enabled: config.local_clipping_enabled,
            output: OutputKind::Final,
        }
    }

    /// The same context for a pass rendering to `output`.
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    /// A hash of the full context.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Every parameter that shapes a program's source, apart from the stage
/// sources themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramParameters {
    /// The shader body.
    pub template: ShaderTemplate,
    /// Float precision.
    pub precision: Precision,
    /// Boolean features.
    pub features: ProgramFeatures,
    /// Light counts; zero for unlit templates.
    pub lights: LightCounts,
    /// Shadow filtering, meaningful with [`ProgramFeatures::SHADOW_MAP`].
    pub shadow_type: ShadowMapType,
    /// Environment sampling.
    pub env_map_mode: EnvMapMode,
    /// Tone mapping applied at output.
    pub tone_mapping: ToneMapping,
    /// Output encoding.
    pub output_color_space: ColorSpace,
    /// Number of clipping planes.
    pub clipping_planes: u32,
    /// Number of planes combined by intersection.
    pub clip_intersection: u32,
    /// Skinning bone count.
    pub bone_count: u32,
    /// Morph target count.
    pub morph_targets: u32,
    /// Material defines, sorted by name.
    pub defines: Vec<(String, String)>,
}

impl ProgramParameters {
    /// Derives the parameters of `material` drawn with per-object `features`
    /// in `variant` under `context`.
    pub fn derive(
        material: &Material,
        object: &ObjectFeatures,
        variant: ProgramVariant,
        context: &ProgramContext,
    ) -> Self {
        let template = match variant {
            ProgramVariant::Depth | ProgramVariant::Distance => ShaderTemplate::Depth,
            ProgramVariant::Forward => template_for(material),
        };
        let forward = variant == ProgramVariant::Forward;
        let mut features = ProgramFeatures::empty();

        let maps = &material.maps;
        let alpha_tested = material.alpha_test > 0.0;
        features.set(ProgramFeatures::MAP, maps.map.is_some() && (forward || alpha_tested));
        features.set(ProgramFeatures::ALPHA_MAP, maps.alpha_map.is_some());
        features.set(ProgramFeatures::ALPHA_TEST, alpha_tested);
        features.set(ProgramFeatures::SKINNING, object.skinning);
        features.set(ProgramFeatures::MORPH_TARGETS, object.morph_targets > 0);
        features.set(ProgramFeatures::INSTANCING, object.instancing);
        features.set(ProgramFeatures::DISTANCE, variant == ProgramVariant::Distance);

        let lit = matches!(template, ShaderTemplate::Lit(_));
        let mut lights = LightCounts::default();
        let mut env_map_mode = EnvMapMode::None;
        let mut tone_mapping = ToneMapping::None;
        let mut output_color_space = ColorSpace::LinearSrgb;

        if forward {
            features.set(ProgramFeatures::NORMAL_MAP, lit && maps.normal_map.is_some());
            features.set(ProgramFeatures::EMISSIVE_MAP, lit && maps.emissive_map.is_some());
            features.set(ProgramFeatures::ROUGHNESS_MAP, lit && maps.roughness_map.is_some());
            features.set(ProgramFeatures::METALNESS_MAP, lit && maps.metalness_map.is_some());
            features.set(ProgramFeatures::AO_MAP, maps.ao_map.is_some());
            features.set(ProgramFeatures::VERTEX_COLORS, material.vertex_colors);
            features.set(ProgramFeatures::FLAT_SHADING, lit && material.flat_shading);
            features.set(ProgramFeatures::INSTANCING_COLOR, object.instancing_color);
            features.set(ProgramFeatures::PREMULTIPLIED_ALPHA, material.premultiplied_alpha);
            features.set(ProgramFeatures::ALPHA_TO_COVERAGE, material.alpha_to_coverage);
            features.set(ProgramFeatures::DOUBLE_SIDED, material.side == Side::Double);
            features.set(ProgramFeatures::FLIP_SIDED, material.side == Side::Back);
            features.set(
                ProgramFeatures::TRANSMISSION,
                template == ShaderTemplate::Lit(LightingModel::Physical) && material.is_transmissive(),
            );

            let fog = material.fog && context.fog != FogKind::None;
            features.set(ProgramFeatures::FOG, fog);
            features.set(ProgramFeatures::FOG_EXP2, fog && context.fog == FogKind::Exp2);

            let has_env = maps.env_map.is_some() || (lit && context.environment);
            if has_env && template != ShaderTemplate::Depth {
                features.insert(ProgramFeatures::ENV_MAP);
                env_map_mode = match material.env_map_mode {
                    EnvMapMode::None => EnvMapMode::CubeReflection,
                    mode => mode,
                };
            }

            if lit {
                lights = context.lights;
                if context.shadows_enabled {
                    features.insert(ProgramFeatures::SHADOW_MAP);
                } else {
                    lights.directional_shadow = 0;
                    lights.point_shadow = 0;
                    lights.spot_shadow = 0;
                }
            }

            if context.output == OutputKind::Final {
                if material.tone_mapped {
                    tone_mapping = context.tone_mapping;
                }
                output_color_space = context.output_color_space;
            }
        }

        let clipping = context.clipping_enabled && (forward || material.clip_shadows);
        let clipping_planes = if clipping {
            material.clipping_planes.len() as u32
        } else {
            0
        };
        let clip_intersection = if material.clip_intersection {
            clipping_planes
        } else {
            0
        };

        Self {
            template,
            precision: context.precision,
            features,
            lights,
            shadow_type: if features.contains(ProgramFeatures::SHADOW_MAP) {
                context.shadow_type
            } else {
                ShadowMapType::default()
            },
            env_map_mode,
            tone_mapping,
            output_color_space,
            clipping_planes,
            clip_intersection,
            bone_count: if object.skinning { object.bone_count } else { 0 },
            morph_targets: object.morph_targets,
            defines: material
                .defines
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Marks receive-shadow for lit programs with shadow maps.
    pub fn with_receive_shadow(mut self, receive: bool) -> Self {
        if self.features.contains(ProgramFeatures::SHADOW_MAP) {
            self.features.set(ProgramFeatures::RECEIVE_SHADOW, receive);
        }
        self
    }
}

fn template_for(material: &Material) -> ShaderTemplate {
    match material.kind {
        MaterialKind::Custom => ShaderTemplate::Custom,
        MaterialKind::Depth => ShaderTemplate::Depth,
        _ if !material.receives_lights() => ShaderTemplate::Unlit,
        MaterialKind::Lambert => ShaderTemplate::Lit(LightingModel::Lambert),
        MaterialKind::Phong => ShaderTemplate::Lit(LightingModel::Phong),
        MaterialKind::Physical => ShaderTemplate::Lit(LightingModel::Physical),
        _ => ShaderTemplate::Lit(LightingModel::Standard),
    }
}

/// The identity of a compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Interned vertex stage source.
    pub vertex: StageId,
    /// Interned fragment stage source.
    pub fragment: StageId,
    /// Source-shaping parameters.
    pub parameters: ProgramParameters,
    /// Material supplied discriminator for custom programs.
    pub custom_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::Bucket;
    use prism_core::math::{LinearRgba, Vec4};

    fn lit_context() -> ProgramContext {
        ProgramContext {
            lights: LightCounts {
                directional: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_materials_derive_equal_parameters() {
        let a = Material::standard(LinearRgba::rgb(1.0, 0.0, 0.0));
        let b = Material::standard(LinearRgba::rgb(0.0, 0.0, 1.0));
        let ctx = lit_context();
        let object = ObjectFeatures::default();
        assert_eq!(
            ProgramParameters::derive(&a, &object, ProgramVariant::Forward, &ctx),
            ProgramParameters::derive(&b, &object, ProgramVariant::Forward, &ctx),
        );
    }

    #[test]
    fn test_light_count_changes_parameters() {
        let material = Material::standard(LinearRgba::WHITE);
        let object = ObjectFeatures::default();
        let mut ctx = lit_context();
        let before = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        ctx.lights.point = 2;
        let after = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        assert_ne!(before, after);
    }

    #[test]
    fn test_unlit_ignores_lights() {
        let material = Material::basic(LinearRgba::WHITE);
        let object = ObjectFeatures::default();
        let mut ctx = lit_context();
        let before = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        ctx.lights.point = 3;
        let after = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        assert_eq!(before, after);
        assert_eq!(before.template, ShaderTemplate::Unlit);
    }

    #[test]
    fn test_skinning_is_per_object() {
        let material = Material::standard(LinearRgba::WHITE);
        let ctx = lit_context();
        let plain = ObjectFeatures::default();
        let skinned = ObjectFeatures {
            skinning: true,
            bone_count: 4,
            ..Default::default()
        };
        let a = ProgramParameters::derive(&material, &plain, ProgramVariant::Forward, &ctx);
        let b = ProgramParameters::derive(&material, &skinned, ProgramVariant::Forward, &ctx);
        assert_ne!(a, b);
        assert!(b.features.contains(ProgramFeatures::SKINNING));
        assert_eq!(b.bone_count, 4);
    }

    #[test]
    fn test_depth_variant_drops_shading_features() {
        let mut material = Material::standard(LinearRgba::WHITE);
        material.vertex_colors = true;
        material.fog = true;
        let mut ctx = lit_context();
        ctx.fog = FogKind::Linear;
        let params = ProgramParameters::derive(
            &material,
            &ObjectFeatures::default(),
            ProgramVariant::Depth,
            &ctx,
        );
        assert_eq!(params.template, ShaderTemplate::Depth);
        assert!(params.features.is_empty());
        assert_eq!(params.lights, LightCounts::default());
    }

    #[test]
    fn test_intermediate_output_is_linear_without_tone_mapping() {
        let material = Material::standard(LinearRgba::WHITE);
        let mut ctx = lit_context();
        ctx.tone_mapping = ToneMapping::AcesFilmic;
        ctx.output_color_space = ColorSpace::Srgb;
        let object = ObjectFeatures::default();
        let final_pass = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        ctx.output = OutputKind::Intermediate;
        let prepass = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        assert_eq!(final_pass.tone_mapping, ToneMapping::AcesFilmic);
        assert_eq!(prepass.tone_mapping, ToneMapping::None);
        assert_eq!(prepass.output_color_space, ColorSpace::LinearSrgb);
    }

    #[test]
    fn test_transmissive_bucket_and_transmission_feature_agree() {
        let ctx = lit_context();
        let object = ObjectFeatures::default();
        let mut physical = Material::physical(LinearRgba::WHITE);
        physical.transmission = 1.0;
        let mut standard = Material::standard(LinearRgba::WHITE);
        standard.transmission = 1.0;
        for material in [physical, standard] {
            let params = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
            assert_eq!(
                Bucket::of(&material) == Bucket::Transmissive,
                params.features.contains(ProgramFeatures::TRANSMISSION),
                "{:?}",
                material.kind
            );
        }
    }

    #[test]
    fn test_clipping_planes_counted_when_enabled() {
        let mut material = Material::basic(LinearRgba::WHITE);
        material.clipping_planes = vec![Vec4::X, Vec4::Y];
        let object = ObjectFeatures::default();
        let mut ctx = ProgramContext::default();
        let off = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        ctx.clipping_enabled = true;
        let on = ProgramParameters::derive(&material, &object, ProgramVariant::Forward, &ctx);
        assert_eq!(off.clipping_planes, 0);
        assert_eq!(on.clipping_planes, 2);
    }

    #[test]
    fn test_context_signature_tracks_fog() {
        let mut ctx = ProgramContext::default();
        let before = ctx.signature();
        ctx.fog = FogKind::Exp2;
        assert_ne!(before, ctx.signature());
    }
}
