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

//! Shader source assembly.

use super::key::{LightingModel, ProgramFeatures, ProgramParameters, ShaderTemplate};
use crate::render_lane::shaders;
use prism_core::asset::Material;
use prism_core::renderer::api::*;
use prism_core::renderer::ShaderError;
use std::borrow::Cow;
use std::fmt::Write;

/// The raw stage bodies of a program, before the prelude.
#[derive(Debug, Clone)]
pub struct StageBodies<'a> {
    /// Vertex body.
    pub vertex: Cow<'a, str>,
    /// Fragment body.
    pub fragment: Cow<'a, str>,
}

/// Selects the stage bodies for `template`. Custom templates take the
/// material's own sources.
pub fn stage_bodies<'a>(
    template: ShaderTemplate,
    material: &'a Material,
) -> Result<StageBodies<'a>, ShaderError> {
    let fragment = match template {
        ShaderTemplate::Custom => {
            let shader = material.shader.as_ref().ok_or_else(|| ShaderError::MissingSource {
                material: material.name.clone(),
            })?;
            if shader.vertex.trim().is_empty() || shader.fragment.trim().is_empty() {
                return Err(ShaderError::MissingSource {
                    material: material.name.clone(),
                });
            }
            return Ok(StageBodies {
                vertex: Cow::Borrowed(&shader.vertex),
                fragment: Cow::Borrowed(&shader.fragment),
            });
        }
        ShaderTemplate::Unlit => shaders::UNLIT_FRAG,
        ShaderTemplate::Lit(_) => shaders::LIT_FRAG,
        ShaderTemplate::Depth => shaders::DEPTH_FRAG,
    };
    Ok(StageBodies {
        vertex: Cow::Borrowed(shaders::MESH_VERT),
        fragment: Cow::Owned(format!("{}\n{}", shaders::COMMON_FRAG, fragment)),
    })
}

fn define(out: &mut String, name: &str) {
    let _ = writeln!(out, "#define {name}");
}

fn define_value(out: &mut String, name: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "#define {name} {value}");
}

fn define_count(out: &mut String, count_name: &str, use_name: &str, count: u32) {
    define_value(out, count_name, count);
    if count > 0 {
        define(out, use_name);
    }
}

/// Generates the `#version`, precision and `#define` lines for one stage.
pub fn prelude(params: &ProgramParameters, stage: ShaderStage) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("#version 300 es\n");
    let precision = params.precision.as_glsl();
    let _ = writeln!(out, "precision {precision} float;");
    let _ = writeln!(out, "precision {precision} int;");
    if stage == ShaderStage::Fragment {
        let _ = writeln!(out, "precision {precision} sampler2DArray;");
    }

    match params.template {
        ShaderTemplate::Unlit => define(&mut out, "SHADER_UNLIT"),
        ShaderTemplate::Depth => define(&mut out, "SHADER_DEPTH"),
        ShaderTemplate::Custom => define(&mut out, "SHADER_CUSTOM"),
        ShaderTemplate::Lit(model) => {
            define(&mut out, "SHADER_LIT");
            define(
                &mut out,
                match model {
                    LightingModel::Lambert => "LIGHTING_LAMBERT",
                    LightingModel::Phong => "LIGHTING_PHONG",
                    LightingModel::Standard => "LIGHTING_STANDARD",
                    LightingModel::Physical => "LIGHTING_PHYSICAL",
                },
            );
        }
    }

    const FEATURE_DEFINES: &[(ProgramFeatures, &str)] = &[
        (ProgramFeatures::MAP, "USE_MAP"),
        (ProgramFeatures::ALPHA_MAP, "USE_ALPHAMAP"),
        (ProgramFeatures::NORMAL_MAP, "USE_NORMALMAP"),
        (ProgramFeatures::EMISSIVE_MAP, "USE_EMISSIVEMAP"),
        (ProgramFeatures::ROUGHNESS_MAP, "USE_ROUGHNESSMAP"),
        (ProgramFeatures::METALNESS_MAP, "USE_METALNESSMAP"),
        (ProgramFeatures::AO_MAP, "USE_AOMAP"),
        (ProgramFeatures::ENV_MAP, "USE_ENVMAP"),
        (ProgramFeatures::VERTEX_COLORS, "USE_COLOR"),
        (ProgramFeatures::FLAT_SHADING, "FLAT_SHADED"),
        (ProgramFeatures::FOG, "USE_FOG"),
        (ProgramFeatures::FOG_EXP2, "FOG_EXP2"),
        (ProgramFeatures::ALPHA_TEST, "USE_ALPHATEST"),
        (ProgramFeatures::TRANSMISSION, "USE_TRANSMISSION"),
        (ProgramFeatures::PREMULTIPLIED_ALPHA, "PREMULTIPLIED_ALPHA"),
        (ProgramFeatures::DOUBLE_SIDED, "DOUBLE_SIDED"),
        (ProgramFeatures::FLIP_SIDED, "FLIP_SIDED"),
        (ProgramFeatures::SHADOW_MAP, "USE_SHADOWMAP"),
        (ProgramFeatures::RECEIVE_SHADOW, "RECEIVE_SHADOW"),
        (ProgramFeatures::SKINNING, "USE_SKINNING"),
        (ProgramFeatures::MORPH_TARGETS, "USE_MORPHTARGETS"),
        (ProgramFeatures::INSTANCING, "USE_INSTANCING"),
        (ProgramFeatures::INSTANCING_COLOR, "USE_INSTANCING_COLOR"),
        (ProgramFeatures::ALPHA_TO_COVERAGE, "ALPHA_TO_COVERAGE"),
        (ProgramFeatures::DISTANCE, "USE_DISTANCE"),
    ];
    for (flag, name) in FEATURE_DEFINES {
        if params.features.contains(*flag) {
            define(&mut out, name);
        }
    }

    let lights = &params.lights;
    define_count(&mut out, "NUM_DIR_LIGHTS", "USE_DIR_LIGHTS", lights.directional);
    define_count(&mut out, "NUM_POINT_LIGHTS", "USE_POINT_LIGHTS", lights.point);
    define_count(&mut out, "NUM_SPOT_LIGHTS", "USE_SPOT_LIGHTS", lights.spot);
    define_count(&mut out, "NUM_HEMI_LIGHTS", "USE_HEMI_LIGHTS", lights.hemisphere);
    define_count(
        &mut out,
        "NUM_DIR_LIGHT_SHADOWS",
        "USE_DIR_LIGHT_SHADOWS",
        lights.directional_shadow,
    );
    define_count(
        &mut out,
        "NUM_POINT_LIGHT_SHADOWS",
        "USE_POINT_LIGHT_SHADOWS",
        lights.point_shadow,
    );
    define_count(
        &mut out,
        "NUM_SPOT_LIGHT_SHADOWS",
        "USE_SPOT_LIGHT_SHADOWS",
        lights.spot_shadow,
    );

    if params.features.contains(ProgramFeatures::SHADOW_MAP) {
        define(
            &mut out,
            match params.shadow_type {
                ShadowMapType::Basic => "SHADOWMAP_TYPE_BASIC",
                ShadowMapType::Pcf => "SHADOWMAP_TYPE_PCF",
                ShadowMapType::PcfSoft => "SHADOWMAP_TYPE_PCF_SOFT",
                ShadowMapType::Vsm => "SHADOWMAP_TYPE_VSM",
            },
        );
    }

    match params.env_map_mode {
        EnvMapMode::None => {}
        EnvMapMode::CubeReflection | EnvMapMode::CubeRefraction => {
            define(&mut out, "ENVMAP_TYPE_CUBE")
        }
        EnvMapMode::EquirectReflection | EnvMapMode::EquirectRefraction => {
            define(&mut out, "ENVMAP_TYPE_EQUIREC")
        }
    }

    if params.clipping_planes > 0 {
        define(&mut out, "USE_CLIPPING_PLANES");
        define_value(&mut out, "NUM_CLIPPING_PLANES", params.clipping_planes);
        define_value(
            &mut out,
            "UNION_CLIPPING_PLANES",
            params.clipping_planes - params.clip_intersection,
        );
    }

    if params.bone_count > 0 {
        define_value(&mut out, "MAX_BONES", params.bone_count);
    }
    if params.morph_targets > 0 {
        define_value(&mut out, "MORPHTARGETS_COUNT", params.morph_targets.min(4));
    }

    let tone_mapping = match params.tone_mapping {
        ToneMapping::None => None,
        ToneMapping::Linear => Some("TONE_MAPPING_LINEAR"),
        ToneMapping::Reinhard => Some("TONE_MAPPING_REINHARD"),
        ToneMapping::Cineon => Some("TONE_MAPPING_CINEON"),
        ToneMapping::AcesFilmic => Some("TONE_MAPPING_ACES_FILMIC"),
        ToneMapping::AgX => Some("TONE_MAPPING_AGX"),
        ToneMapping::Neutral => Some("TONE_MAPPING_NEUTRAL"),
    };
    if let Some(name) = tone_mapping {
        define(&mut out, "TONE_MAPPING");
        define(&mut out, name);
    }
    if params.output_color_space == ColorSpace::Srgb {
        define(&mut out, "OUTPUT_SRGB");
    }

    for (name, value) in &params.defines {
        if value.is_empty() {
            define(&mut out, name);
        } else {
            define_value(&mut out, name, value);
        }
    }
    out
}

/// The complete source of one stage.
pub fn assemble(params: &ProgramParameters, stage: ShaderStage, body: &str) -> String {
    let body = strip_version(body);
    let mut source = prelude(params, stage);
    source.reserve(body.len() + 1);
    source.push_str(body);
    if !source.ends_with('\n') {
        source.push('\n');
    }
    source
}

fn strip_version(body: &str) -> &str {
    let trimmed = body.trim_start();
    match trimmed.strip_prefix("#version") {
        Some(rest) => rest.find('\n').map_or("", |i| &rest[i + 1..]),
        None => body,
    }
}

/// A short human readable label for logs and diagnostics.
pub fn program_label(params: &ProgramParameters, material: &Material) -> String {
    let base = match params.template {
        ShaderTemplate::Unlit => "unlit",
        ShaderTemplate::Lit(LightingModel::Lambert) => "lambert",
        ShaderTemplate::Lit(LightingModel::Phong) => "phong",
        ShaderTemplate::Lit(LightingModel::Standard) => "standard",
        ShaderTemplate::Lit(LightingModel::Physical) => "physical",
        ShaderTemplate::Depth => "depth",
        ShaderTemplate::Custom => "custom",
    };
    if material.name.is_empty() {
        base.to_string()
    } else {
        format!("{base}:{}", material.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::program::{ProgramContext, ProgramVariant};
    use prism_core::math::LinearRgba;
    use prism_core::renderer::LightCounts;
    use prism_core::scene::ObjectFeatures;

    fn params(material: &Material, ctx: &ProgramContext) -> ProgramParameters {
        ProgramParameters::derive(material, &ObjectFeatures::default(), ProgramVariant::Forward, ctx)
    }

    #[test]
    fn test_prelude_counts_lights() {
        let ctx = ProgramContext {
            lights: LightCounts {
                point: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let p = params(&Material::standard(LinearRgba::WHITE), &ctx);
        let text = prelude(&p, ShaderStage::Fragment);
        assert!(text.starts_with("#version 300 es\n"));
        assert!(text.contains("#define NUM_POINT_LIGHTS 2\n"));
        assert!(text.contains("#define USE_POINT_LIGHTS\n"));
        assert!(text.contains("#define NUM_DIR_LIGHTS 0\n"));
        assert!(!text.contains("#define USE_DIR_LIGHTS\n"));
        assert!(text.contains("#define LIGHTING_STANDARD\n"));
    }

    #[test]
    fn test_material_defines_are_appended() {
        let mut material = Material::basic(LinearRgba::WHITE);
        material.defines.insert("USE_SPARKLE".into(), String::new());
        material.defines.insert("SPARKLE_COUNT".into(), "3".into());
        let text = prelude(&params(&material, &ProgramContext::default()), ShaderStage::Vertex);
        assert!(text.contains("#define USE_SPARKLE\n"));
        assert!(text.contains("#define SPARKLE_COUNT 3\n"));
    }

    #[test]
    fn test_custom_without_source_is_rejected() {
        let material = Material::new(prism_core::asset::MaterialKind::Custom);
        let err = stage_bodies(ShaderTemplate::Custom, &material).unwrap_err();
        assert!(matches!(err, ShaderError::MissingSource { .. }));
    }

    #[test]
    fn test_custom_version_line_is_replaced() {
        let material = Material::custom("#version 300 es\nvoid main() {}", "void main() {}");
        let p = params(&material, &ProgramContext::default());
        let bodies = stage_bodies(p.template, &material).unwrap();
        let vertex = assemble(&p, ShaderStage::Vertex, &bodies.vertex);
        assert_eq!(vertex.matches("#version").count(), 1);
        assert!(vertex.contains("#define SHADER_CUSTOM\n"));
        assert!(vertex.ends_with("void main() {}\n"));
    }

    #[test]
    fn test_builtin_fragment_includes_helpers() {
        let material = Material::basic(LinearRgba::WHITE);
        let bodies = stage_bodies(ShaderTemplate::Unlit, &material).unwrap();
        assert!(bodies.fragment.contains("vec4 encodeOutput"));
        assert!(bodies.fragment.contains("uniform vec3 diffuse;"));
    }
}
