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

use crate::math::{LinearRgba, Rect};
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::uniform::FloatLayout;

/// Limits and optional features reported by a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverCapabilities {
    /// Number of combined texture image units.
    pub max_texture_units: u32,
    /// Number of vertex attribute slots.
    pub max_vertex_attributes: u32,
    /// Largest texture dimension.
    pub max_texture_size: u32,
    /// Largest supported anisotropy level (1 when unsupported).
    pub max_anisotropy: u8,
    /// Largest MSAA sample count.
    pub max_samples: u32,
    /// Whether 32-bit float textures can be linearly filtered.
    pub float_texture_linear: bool,
    /// Whether 16-bit float textures can be linearly filtered.
    pub half_float_texture_linear: bool,
    /// Whether non-power-of-two textures can have mipmaps.
    pub npot_mipmaps: bool,
    /// Whether programs can be compiled without blocking.
    pub parallel_shader_compile: bool,
}

impl Default for DriverCapabilities {
    fn default() -> Self {
        Self {
            max_texture_units: 16,
            max_vertex_attributes: 16,
            max_texture_size: 4096,
            max_anisotropy: 1,
            max_samples: 4,
            float_texture_linear: false,
            half_float_texture_linear: true,
            npot_mipmaps: true,
            parallel_shader_compile: false,
        }
    }
}

/// A GL-style, immediate-mode graphics context.
///
/// The driver mirrors the classic bind-to-edit model: uploads and parameter
/// changes act on whatever object is bound to the given target. Every call
/// reaches the underlying API; deduplication of redundant calls happens one
/// layer above, in the state cache of `prism-lanes`.
///
/// A driver is owned by exactly one renderer and used from one thread, so
/// all methods take `&mut self` and no `Send`/`Sync` bound is required.
pub trait GpuDriver {
    /// Returns the limits and optional features of the context.
    fn capabilities(&self) -> &DriverCapabilities;

    /// Returns `true` once the context has been lost and not yet restored.
    fn is_context_lost(&self) -> bool;

    /// Total number of API calls issued since creation, when tracked.
    fn issued_calls(&self) -> u64 {
        0
    }

    // --- Fixed-function state ---

    /// Enables a capability.
    fn enable(&mut self, capability: Capability);
    /// Disables a capability.
    fn disable(&mut self, capability: Capability);
    /// Sets the RGB and alpha blend equations.
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    /// Sets the RGB and alpha blend factors.
    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    /// Sets the constant blend color.
    fn blend_color(&mut self, color: LinearRgba);
    /// Sets the depth comparison function.
    fn depth_func(&mut self, func: CompareFunction);
    /// Enables or disables depth writes.
    fn depth_mask(&mut self, write: bool);
    /// Sets the color write mask.
    fn color_mask(&mut self, mask: ColorMask);
    /// Sets the stencil test function.
    fn stencil_func(&mut self, func: StencilFunc);
    /// Sets the stencil write mask.
    fn stencil_mask(&mut self, mask: u32);
    /// Sets the stencil operations.
    fn stencil_op(&mut self, ops: StencilOps);
    /// Selects the culled faces. Never called with [`CullMode::None`].
    fn cull_face(&mut self, mode: CullMode);
    /// Sets the front-face winding.
    fn front_face(&mut self, face: FrontFace);
    /// Sets the polygon depth offset.
    fn polygon_offset(&mut self, factor: f32, units: f32);
    /// Sets the rasterized line width.
    fn line_width(&mut self, width: f32);
    /// Sets the viewport rectangle.
    fn viewport(&mut self, rect: Rect);
    /// Sets the scissor rectangle.
    fn scissor(&mut self, rect: Rect);
    /// Sets the color used by color clears.
    fn clear_color(&mut self, color: LinearRgba);
    /// Sets the value used by depth clears.
    fn clear_depth(&mut self, depth: f32);
    /// Sets the value used by stencil clears.
    fn clear_stencil(&mut self, stencil: i32);
    /// Clears the selected buffers of the bound framebuffer.
    fn clear(&mut self, flags: ClearFlags);

    // --- Programs ---

    /// Compiles and links a program.
    /// ## Arguments
    /// * `source` - The full vertex and fragment sources.
    /// ## Returns
    /// The program id. Compile and link errors are not reported here: query
    /// [`GpuDriver::program_status`], which may also report `Pending` when
    /// compilation runs in parallel.
    /// ## Errors
    /// * `ResourceError` - If the program object cannot be created at all.
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ResourceError>;

    /// Polls the compile/link state of a program without blocking.
    fn program_status(&mut self, program: ProgramId) -> ProgramStatus;

    /// Looks up an active uniform. Returns `None` when the uniform was
    /// optimized out or does not exist.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Looks up an active vertex attribute.
    fn attribute_location(&mut self, program: ProgramId, name: &str) -> Option<AttributeLocation>;

    /// Makes `program` current, or unbinds with `None`.
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Deletes a program.
    fn delete_program(&mut self, program: ProgramId);

    /// Uploads float uniform data to the current program.
    /// ## Arguments
    /// * `location` - A location obtained from the current program.
    /// * `layout` - How `data` is split into elements.
    /// * `data` - One or more elements, flattened.
    fn uniform_f32(&mut self, location: UniformLocation, layout: FloatLayout, data: &[f32]);

    /// Uploads integer (or sampler unit) uniform data to the current program.
    fn uniform_i32(&mut self, location: UniformLocation, data: &[i32]);

    // --- Buffers ---

    /// Creates a buffer object.
    fn create_buffer(&mut self) -> Result<BufferId, ResourceError>;
    /// Binds a buffer to a target, or unbinds with `None`.
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    /// Allocates and fills the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    /// Allocates uninitialized storage for the buffer bound to `target`.
    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage);
    /// Overwrites part of the buffer bound to `target`.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    /// Copies part of the buffer bound to `target` into `out`.
    /// ## Errors
    /// * `ResourceError` - If the range is out of bounds or the context is lost.
    fn get_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> Result<(), ResourceError>;
    /// Deletes a buffer.
    fn delete_buffer(&mut self, buffer: BufferId);

    // --- Vertex input ---

    /// Points an attribute slot at a buffer.
    fn vertex_attribute(&mut self, location: AttributeLocation, binding: &VertexAttributeBinding);
    /// Enables or disables the array for an attribute slot.
    fn set_vertex_attribute_array(&mut self, location: AttributeLocation, enabled: bool);

    // --- Textures ---

    /// Creates a texture object.
    fn create_texture(&mut self) -> Result<TextureId, ResourceError>;
    /// Selects the texture unit that subsequent binds affect.
    fn active_texture(&mut self, unit: u32);
    /// Binds a texture to the active unit.
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>);
    /// Sets pixel unpacking options for subsequent uploads.
    fn unpack_options(&mut self, options: UnpackOptions);
    /// Allocates one level of the bound texture and optionally fills it.
    /// ## Errors
    /// * `ResourceError` - If `data` does not match the level size.
    fn tex_image(
        &mut self,
        target: TextureTarget,
        descriptor: &TextureDescriptor,
        level: u32,
        data: Option<&[u8]>,
    ) -> Result<(), ResourceError>;
    /// Overwrites a region of the bound texture.
    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        format: TextureFormat,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError>;
    /// Applies sampling parameters to the bound texture.
    fn tex_parameters(&mut self, target: TextureTarget, sampler: &SamplerDescriptor);
    /// Generates the mip chain of the bound texture.
    fn generate_mipmap(&mut self, target: TextureTarget);
    /// Deletes a texture.
    fn delete_texture(&mut self, texture: TextureId);

    // --- Render targets ---

    /// Creates a framebuffer with its attachments.
    /// ## Errors
    /// * `ResourceError` - If the attachment combination is incomplete.
    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<GpuRenderTarget, ResourceError>;
    /// Binds a framebuffer, or the default framebuffer with `None`.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    /// Deletes a framebuffer and its attachment textures.
    fn delete_render_target(&mut self, target: &GpuRenderTarget);
    /// Reads a rectangle of the bound framebuffer into the bound pixel-pack buffer.
    fn read_pixels_to_pack_buffer(&mut self, rect: Rect, format: TextureFormat);

    // --- Draws ---

    /// Draws non-indexed primitives.
    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32, instances: u32);
    /// Draws indexed primitives. `first` is counted in indices.
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        index: IndexBinding,
        first: u32,
        count: u32,
        instances: u32,
    );

    // --- Synchronization ---

    /// Inserts a fence after all commands issued so far.
    fn fence_sync(&mut self) -> Result<FenceId, ResourceError>;
    /// Polls a fence without blocking.
    fn fence_status(&mut self, fence: FenceId) -> FenceStatus;
    /// Deletes a fence.
    fn delete_fence(&mut self, fence: FenceId);
}
