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

//! Enumerations for pipeline state and output configuration.

use serde::{Deserialize, Serialize};

/// A server-side capability toggled with enable/disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Color blending.
    Blend,
    /// Face culling.
    CullFace,
    /// Depth testing.
    DepthTest,
    /// Stencil testing.
    StencilTest,
    /// Scissor testing.
    ScissorTest,
    /// Polygon offset for filled polygons.
    PolygonOffsetFill,
    /// Alpha-to-coverage multisampling.
    SampleAlphaToCoverage,
    /// Color dithering.
    Dither,
    /// Discard all primitives before rasterization.
    RasterizerDiscard,
}

impl Capability {
    /// Every capability, in a fixed order.
    pub const ALL: [Capability; 9] = [
        Capability::Blend,
        Capability::CullFace,
        Capability::DepthTest,
        Capability::StencilTest,
        Capability::ScissorTest,
        Capability::PolygonOffsetFill,
        Capability::SampleAlphaToCoverage,
        Capability::Dither,
        Capability::RasterizerDiscard,
    ];

    /// The value a freshly created context reports for this capability.
    pub fn default_enabled(self) -> bool {
        matches!(self, Capability::Dither)
    }
}

/// The blending preset of a material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blending {
    /// No blending at all.
    None,
    /// Standard alpha blending.
    #[default]
    Normal,
    /// Source is added to the destination.
    Additive,
    /// Source is subtracted from the destination.
    Subtractive,
    /// Source is multiplied with the destination.
    Multiply,
    /// Equation and factors are taken from the material.
    Custom,
}

/// The operation combining source and destination terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendEquation {
    /// `src + dst`.
    #[default]
    Add,
    /// `src - dst`.
    Subtract,
    /// `dst - src`.
    ReverseSubtract,
    /// `min(src, dst)`.
    Min,
    /// `max(src, dst)`.
    Max,
}

/// A multiplier applied to a blend term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

/// A comparison function for depth and stencil testing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareFunction {
    /// The test never passes.
    Never,
    /// Passes if the new value is less than the existing value.
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is less than or equal to the existing value.
    #[default]
    LessEqual,
    /// Passes if the new value is greater than the existing value.
    Greater,
    /// Passes if the values are not equal.
    NotEqual,
    /// Passes if the new value is greater than or equal to the existing value.
    GreaterEqual,
    /// The test always passes.
    Always,
}

/// An operation to perform on the stencil buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

/// Which faces of a material are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Only front faces.
    #[default]
    Front,
    /// Only back faces.
    Back,
    /// Both faces.
    Double,
}

/// Which faces the rasterizer discards when culling is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Culling disabled.
    None,
    /// Cull back faces.
    #[default]
    Back,
    /// Cull front faces.
    Front,
    /// Cull both faces.
    FrontAndBack,
}

/// The winding order that defines a front face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise.
    #[default]
    Ccw,
    /// Clockwise.
    Cw,
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveTopology {
    /// Returns `true` for the line topologies.
    pub fn is_line(self) -> bool {
        matches!(
            self,
            PrimitiveTopology::Lines | PrimitiveTopology::LineStrip | PrimitiveTopology::LineLoop
        )
    }

    /// Number of primitives produced from `count` vertices.
    pub fn primitive_count(self, count: u32) -> u32 {
        match self {
            PrimitiveTopology::Points => count,
            PrimitiveTopology::Lines => count / 2,
            PrimitiveTopology::LineStrip => count.saturating_sub(1),
            PrimitiveTopology::LineLoop => count,
            PrimitiveTopology::Triangles => count / 3,
            PrimitiveTopology::TriangleStrip | PrimitiveTopology::TriangleFan => {
                count.saturating_sub(2)
            }
        }
    }
}

/// The integer type of index buffer elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn byte_size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// The tone mapping operator applied to the final color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ToneMapping {
    #[default]
    None,
    Linear,
    Reinhard,
    Cineon,
    AcesFilmic,
    AgX,
    Neutral,
}

/// The color space of a render output or a texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    /// Raw data, no color management.
    NoColorSpace,
    /// Linear sRGB primaries.
    LinearSrgb,
    /// sRGB transfer function.
    #[default]
    Srgb,
}

/// The default floating-point precision declared in shaders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// `lowp`.
    Low,
    /// `mediump`.
    Medium,
    /// `highp`.
    #[default]
    High,
}

impl Precision {
    /// The GLSL qualifier for this precision.
    pub fn as_glsl(self) -> &'static str {
        match self {
            Precision::Low => "lowp",
            Precision::Medium => "mediump",
            Precision::High => "highp",
        }
    }
}

/// The shadow filtering technique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowMapType {
    /// Single unfiltered sample.
    Basic,
    /// Percentage-closer filtering.
    #[default]
    Pcf,
    /// Softened percentage-closer filtering.
    PcfSoft,
    /// Variance shadow maps.
    Vsm,
}

/// How an environment map is sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EnvMapMode {
    /// No environment map.
    #[default]
    None,
    /// Cube map reflection.
    CubeReflection,
    /// Cube map refraction.
    CubeRefraction,
    /// Equirectangular reflection.
    EquirectReflection,
    /// Equirectangular refraction.
    EquirectRefraction,
}

/// The scene fog model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FogKind {
    /// No fog.
    #[default]
    None,
    /// Linear fog between a near and far distance.
    Linear,
    /// Exponential squared fog.
    Exp2,
}
