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

//! GPU object identifiers and the descriptors used to create them.

use super::enums::{CompareFunction, IndexFormat};

/// An opaque handle to a linked GPU program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// An opaque handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// An opaque handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

/// An opaque handle to a fence sync object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceId(pub u32);

/// The location of a uniform inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

/// The location of a vertex attribute inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeLocation(pub u32);

/// Where a buffer is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data.
    ElementArray,
    /// Destination of pixel read-back.
    PixelPack,
}

/// A hint about how a buffer's content is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times.
    StaticDraw,
    /// Updated repeatedly, drawn many times.
    DynamicDraw,
    /// Written by the GPU, read back by the application.
    StreamRead,
}

/// The kind of a texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// A 2D texture.
    Texture2D,
    /// A cube map.
    CubeMap,
    /// An array of 2D layers.
    Texture2DArray,
    /// A 3D texture.
    Texture3D,
}

/// The internal storage format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgba8,
    Rgba8Srgb,
    R16Float,
    Rgba16Float,
    R32Float,
    Rgba32Float,
    Depth16,
    Depth24,
    Depth32Float,
    Depth24Stencil8,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 | TextureFormat::R16Float | TextureFormat::Depth16 => 2,
            TextureFormat::Rgba8
            | TextureFormat::Rgba8Srgb
            | TextureFormat::R32Float
            | TextureFormat::Depth24
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24Stencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Returns `true` for 32-bit float color formats.
    pub fn is_float32(self) -> bool {
        matches!(self, TextureFormat::R32Float | TextureFormat::Rgba32Float)
    }

    /// Returns `true` for 16-bit float color formats.
    pub fn is_float16(self) -> bool {
        matches!(self, TextureFormat::R16Float | TextureFormat::Rgba16Float)
    }

    /// Returns `true` for depth (and depth-stencil) formats.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16
                | TextureFormat::Depth24
                | TextureFormat::Depth32Float
                | TextureFormat::Depth24Stencil8
        )
    }

    /// Returns `true` if the format carries a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8)
    }
}

/// Magnification filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MagFilter {
    Nearest,
    #[default]
    Linear,
}

/// Minification filter, including the mip selection mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    #[default]
    LinearMipmapLinear,
}

impl MinFilter {
    /// Returns `true` if sampling reads mip levels.
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }

    /// Returns `true` if any linear interpolation is involved.
    pub fn is_linear(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::NearestMipmapNearest)
    }
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Sampling parameters attached to a texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDescriptor {
    /// Magnification filter.
    pub mag_filter: MagFilter,
    /// Minification filter.
    pub min_filter: MinFilter,
    /// Wrapping along S.
    pub wrap_s: AddressMode,
    /// Wrapping along T.
    pub wrap_t: AddressMode,
    /// Wrapping along R.
    pub wrap_r: AddressMode,
    /// Anisotropy level (1 disables anisotropic filtering).
    pub anisotropy: u8,
    /// Depth comparison for shadow samplers.
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            mag_filter: MagFilter::Linear,
            min_filter: MinFilter::LinearMipmapLinear,
            wrap_s: AddressMode::ClampToEdge,
            wrap_t: AddressMode::ClampToEdge,
            wrap_r: AddressMode::ClampToEdge,
            anisotropy: 1,
            compare: None,
        }
    }
}

/// Storage allocation parameters for a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Texture kind.
    pub target: TextureTarget,
    /// Storage format.
    pub format: TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth or layer count.
    pub depth: u32,
    /// Number of mip levels to allocate.
    pub mip_levels: u32,
}

impl TextureDescriptor {
    /// Byte size of the base level.
    pub fn base_level_size(&self) -> usize {
        let faces = if self.target == TextureTarget::CubeMap {
            6
        } else {
            1
        };
        self.width as usize
            * self.height as usize
            * self.depth.max(1) as usize
            * faces
            * self.format.bytes_per_texel() as usize
    }
}

/// A region of a texture level to (re)upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    /// Mip level.
    pub level: u32,
    /// Left texel.
    pub x: u32,
    /// Top texel.
    pub y: u32,
    /// Layer, or cube face index.
    pub layer: u32,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

/// Attachments of an offscreen render target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// MSAA sample count (0 or 1 disables multisampling).
    pub samples: u32,
    /// Color attachment formats.
    pub color_formats: Vec<TextureFormat>,
    /// Depth (or depth-stencil) attachment format.
    pub depth_format: Option<TextureFormat>,
    /// Number of array layers.
    pub layers: u32,
    /// Whether the target is rendered with multiview.
    pub multiview: bool,
    /// Whether the color attachments receive a mip chain.
    pub mipmaps: bool,
}

impl RenderTargetDescriptor {
    /// A single RGBA8 color attachment with a 24-bit depth buffer.
    pub fn color_depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: 0,
            color_formats: vec![TextureFormat::Rgba8],
            depth_format: Some(TextureFormat::Depth24),
            layers: 1,
            multiview: false,
            mipmaps: false,
        }
    }

    /// A depth-only target, as used for shadow maps.
    pub fn depth_only(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: 0,
            color_formats: Vec::new(),
            depth_format: Some(TextureFormat::Depth24),
            layers: 1,
            multiview: false,
            mipmaps: false,
        }
    }
}

/// The GPU objects backing a render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuRenderTarget {
    /// The framebuffer object.
    pub framebuffer: FramebufferId,
    /// One texture per color attachment.
    pub color: Vec<TextureId>,
    /// The depth attachment texture, if any.
    pub depth: Option<TextureId>,
}

/// How a vertex attribute reads from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeBinding {
    /// Source buffer.
    pub buffer: BufferId,
    /// Number of components per vertex (1 to 4).
    pub components: u8,
    /// Whether integer data is normalized.
    pub normalized: bool,
    /// Byte stride between vertices.
    pub stride: u32,
    /// Byte offset of the first component.
    pub offset: u32,
    /// Instancing divisor (0 = per vertex).
    pub divisor: u32,
}

/// The index buffer bound for indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBinding {
    /// Source buffer.
    pub buffer: BufferId,
    /// Element type.
    pub format: IndexFormat,
}

/// Pixel unpacking options applied to subsequent texture uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnpackOptions {
    /// Flip rows vertically during upload.
    pub flip_y: bool,
    /// Multiply color by alpha during upload.
    pub premultiply_alpha: bool,
    /// Row alignment in bytes (1, 2, 4 or 8).
    pub alignment: u32,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            flip_y: false,
            premultiply_alpha: false,
            alignment: 4,
        }
    }
}

/// The state of a fence sync object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceStatus {
    /// The GPU has not reached the fence yet.
    Pending,
    /// All commands before the fence have completed.
    Signaled,
}
