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

use prism_core::math::{LinearRgba, Rect};
use prism_core::renderer::api::*;
use prism_core::renderer::FloatLayout;
use std::collections::BTreeMap;

/// A value last uploaded to a uniform location.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    /// Float data and its layout.
    Float(FloatLayout, Vec<f32>),
    /// Integer data.
    Int(Vec<i32>),
}

impl UniformData {
    /// The float payload, if any.
    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            UniformData::Float(_, v) => Some(v),
            UniformData::Int(_) => None,
        }
    }

    /// The integer payload, if any.
    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            UniformData::Int(v) => Some(v),
            UniformData::Float(..) => None,
        }
    }
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DriverCall {
    Enable(Capability),
    Disable(Capability),
    BlendEquationSeparate(BlendEquation, BlendEquation),
    BlendFuncSeparate(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    BlendColor(LinearRgba),
    DepthFunc(CompareFunction),
    DepthMask(bool),
    ColorMask(ColorMask),
    StencilFunc(StencilFunc),
    StencilMask(u32),
    StencilOp(StencilOps),
    CullFace(CullMode),
    FrontFace(FrontFace),
    PolygonOffset(f32, f32),
    LineWidth(f32),
    Viewport(Rect),
    Scissor(Rect),
    ClearColor(LinearRgba),
    ClearDepth(f32),
    ClearStencil(i32),
    Clear(ClearFlags),
    CreateProgram(ProgramId),
    ProgramStatus(ProgramId),
    UniformLocation(ProgramId, String),
    AttributeLocation(ProgramId, String),
    UseProgram(Option<ProgramId>),
    DeleteProgram(ProgramId),
    UniformF32(UniformLocation, Vec<f32>),
    UniformI32(UniformLocation, Vec<i32>),
    CreateBuffer(BufferId),
    BindBuffer(BufferTarget, Option<BufferId>),
    BufferData(BufferTarget, usize),
    BufferStorage(BufferTarget, usize),
    BufferSubData(BufferTarget, usize, usize),
    GetBufferSubData(BufferTarget, usize, usize),
    DeleteBuffer(BufferId),
    VertexAttribute(AttributeLocation, VertexAttributeBinding),
    VertexAttributeArray(AttributeLocation, bool),
    CreateTexture(TextureId),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureId>),
    UnpackOptions(UnpackOptions),
    TexImage(Option<TextureId>, u32),
    TexSubImage(Option<TextureId>, TextureRegion),
    TexParameters(Option<TextureId>, SamplerDescriptor),
    GenerateMipmap(Option<TextureId>),
    DeleteTexture(TextureId),
    CreateRenderTarget(FramebufferId),
    BindFramebuffer(Option<FramebufferId>),
    DeleteRenderTarget(FramebufferId),
    ReadPixels(Rect),
    DrawArrays(PrimitiveTopology, u32, u32, u32),
    DrawElements(PrimitiveTopology, u32, u32, u32),
    FenceSync(FenceId),
    FenceStatus(FenceId),
    DeleteFence(FenceId),
}

impl DriverCall {
    /// The snake-case name of the driver method that produced this call.
    pub fn name(&self) -> &'static str {
        match self {
            DriverCall::Enable(_) => "enable",
            DriverCall::Disable(_) => "disable",
            DriverCall::BlendEquationSeparate(..) => "blend_equation_separate",
            DriverCall::BlendFuncSeparate(..) => "blend_func_separate",
            DriverCall::BlendColor(_) => "blend_color",
            DriverCall::DepthFunc(_) => "depth_func",
            DriverCall::DepthMask(_) => "depth_mask",
            DriverCall::ColorMask(_) => "color_mask",
            DriverCall::StencilFunc(_) => "stencil_func",
            DriverCall::StencilMask(_) => "stencil_mask",
            DriverCall::StencilOp(_) => "stencil_op",
            DriverCall::CullFace(_) => "cull_face",
            DriverCall::FrontFace(_) => "front_face",
            DriverCall::PolygonOffset(..) => "polygon_offset",
            DriverCall::LineWidth(_) => "line_width",
            DriverCall::Viewport(_) => "viewport",
            DriverCall::Scissor(_) => "scissor",
            DriverCall::ClearColor(_) => "clear_color",
            DriverCall::ClearDepth(_) => "clear_depth",
            DriverCall::ClearStencil(_) => "clear_stencil",
            DriverCall::Clear(_) => "clear",
            DriverCall::CreateProgram(_) => "create_program",
            DriverCall::ProgramStatus(_) => "program_status",
            DriverCall::UniformLocation(..) => "uniform_location",
            DriverCall::AttributeLocation(..) => "attribute_location",
            DriverCall::UseProgram(_) => "use_program",
            DriverCall::DeleteProgram(_) => "delete_program",
            DriverCall::UniformF32(..) => "uniform_f32",
            DriverCall::UniformI32(..) => "uniform_i32",
            DriverCall::CreateBuffer(_) => "create_buffer",
            DriverCall::BindBuffer(..) => "bind_buffer",
            DriverCall::BufferData(..) => "buffer_data",
            DriverCall::BufferStorage(..) => "buffer_storage",
            DriverCall::BufferSubData(..) => "buffer_sub_data",
            DriverCall::GetBufferSubData(..) => "get_buffer_sub_data",
            DriverCall::DeleteBuffer(_) => "delete_buffer",
            DriverCall::VertexAttribute(..) => "vertex_attribute",
            DriverCall::VertexAttributeArray(..) => "set_vertex_attribute_array",
            DriverCall::CreateTexture(_) => "create_texture",
            DriverCall::ActiveTexture(_) => "active_texture",
            DriverCall::BindTexture(..) => "bind_texture",
            DriverCall::UnpackOptions(_) => "unpack_options",
            DriverCall::TexImage(..) => "tex_image",
            DriverCall::TexSubImage(..) => "tex_sub_image",
            DriverCall::TexParameters(..) => "tex_parameters",
            DriverCall::GenerateMipmap(_) => "generate_mipmap",
            DriverCall::DeleteTexture(_) => "delete_texture",
            DriverCall::CreateRenderTarget(_) => "create_render_target",
            DriverCall::BindFramebuffer(_) => "bind_framebuffer",
            DriverCall::DeleteRenderTarget(_) => "delete_render_target",
            DriverCall::ReadPixels(_) => "read_pixels_to_pack_buffer",
            DriverCall::DrawArrays(..) => "draw_arrays",
            DriverCall::DrawElements(..) => "draw_elements",
            DriverCall::FenceSync(_) => "fence_sync",
            DriverCall::FenceStatus(_) => "fence_status",
            DriverCall::DeleteFence(_) => "delete_fence",
        }
    }
}

/// A snapshot of the context taken at every draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// The current program.
    pub program: Option<ProgramId>,
    /// The bound framebuffer (`None` = default).
    pub framebuffer: Option<FramebufferId>,
    /// The viewport in effect.
    pub viewport: Rect,
    /// Whether face culling was enabled.
    pub culling: bool,
    /// The culled faces.
    pub cull_mode: CullMode,
    /// The front-face winding.
    pub front_face: FrontFace,
    /// Whether blending was enabled.
    pub blending: bool,
    /// Whether depth writes were enabled.
    pub depth_write: bool,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Vertex (or index) count.
    pub count: u32,
    /// Instance count.
    pub instances: u32,
    /// Uniform values of the current program, by name.
    pub uniforms: BTreeMap<String, UniformData>,
}

impl DrawRecord {
    /// Float data of a uniform at draw time.
    pub fn floats(&self, name: &str) -> Option<&[f32]> {
        self.uniforms.get(name).and_then(UniformData::as_floats)
    }

    /// Integer data of a uniform at draw time.
    pub fn ints(&self, name: &str) -> Option<&[i32]> {
        self.uniforms.get(name).and_then(UniformData::as_ints)
    }
}
