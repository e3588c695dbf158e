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

use super::conversions::{texture_format_triple, IntoGl};
use glow::HasContext;
use prism_core::math::{LinearRgba, Rect};
use prism_core::renderer::api::*;
use prism_core::renderer::{DriverCapabilities, FloatLayout, GpuDriver, ResourceError};
use std::collections::HashMap;

const ANISOTROPY_EXTENSION: &str = "GL_EXT_texture_filter_anisotropic";
const PARALLEL_COMPILE_EXTENSION: &str = "GL_KHR_parallel_shader_compile";
const FLOAT_LINEAR_EXTENSION: &str = "GL_OES_texture_float_linear";

struct GlProgram {
    program: glow::Program,
    shaders: Option<(glow::Shader, glow::Shader)>,
}

/// A [`GpuDriver`] that forwards every call to an OpenGL context through
/// `glow`.
///
/// Native objects are hidden behind the renderer's integer ids. The driver
/// owns a single vertex array object that stays bound for its lifetime.
pub struct GlowDriver {
    gl: glow::Context,
    capabilities: DriverCapabilities,
    vertex_array: Option<glow::VertexArray>,
    next_id: u32,
    programs: HashMap<ProgramId, GlProgram>,
    uniform_locations: Vec<glow::UniformLocation>,
    buffers: HashMap<BufferId, glow::Buffer>,
    textures: HashMap<TextureId, glow::Texture>,
    framebuffers: HashMap<FramebufferId, glow::Framebuffer>,
    fences: HashMap<FenceId, glow::Fence>,
    unpack: UnpackOptions,
    context_lost: bool,
    calls: u64,
}

impl GlowDriver {
    /// Wraps a current GL context and queries its limits.
    pub fn new(gl: glow::Context) -> Result<Self, ResourceError> {
        let capabilities = unsafe { query_capabilities(&gl) };
        log::info!(
            "GL driver ready: {} texture units, max texture size {}, parallel compile {}",
            capabilities.max_texture_units,
            capabilities.max_texture_size,
            capabilities.parallel_shader_compile
        );
        let mut driver = Self {
            gl,
            capabilities,
            vertex_array: None,
            next_id: 1,
            programs: HashMap::new(),
            uniform_locations: Vec::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            fences: HashMap::new(),
            unpack: UnpackOptions::default(),
            context_lost: false,
            calls: 0,
        };
        driver.create_vertex_array()?;
        Ok(driver)
    }

    /// Records a context loss or restoration reported by the windowing layer.
    ///
    /// On restoration every native object is forgotten; the renderer
    /// recreates what it needs on the next frame.
    pub fn set_context_lost(&mut self, lost: bool) {
        if self.context_lost == lost {
            return;
        }
        self.context_lost = lost;
        if !lost {
            self.programs.clear();
            self.uniform_locations.clear();
            self.buffers.clear();
            self.textures.clear();
            self.framebuffers.clear();
            self.fences.clear();
            if let Err(e) = self.create_vertex_array() {
                log::error!("Failed to recreate the vertex array after restore: {e}");
            }
        }
    }

    /// The wrapped context.
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn create_vertex_array(&mut self) -> Result<(), ResourceError> {
        let vao = unsafe { self.gl.create_vertex_array() }.map_err(ResourceError::BackendError)?;
        unsafe { self.gl.bind_vertex_array(Some(vao)) };
        self.vertex_array = Some(vao);
        Ok(())
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn count(&mut self) {
        self.calls += 1;
    }

    fn program(&self, id: ProgramId) -> Option<glow::Program> {
        self.programs.get(&id).map(|p| p.program)
    }

    fn location(&self, location: UniformLocation) -> Option<&glow::UniformLocation> {
        self.uniform_locations.get(location.0 as usize)
    }

    fn upload_level(
        &mut self,
        target: u32,
        descriptor: &TextureDescriptor,
        level: u32,
        data: Option<&[u8]>,
    ) {
        let (internal, format, ty) = texture_format_triple(descriptor.format);
        let width = (descriptor.width >> level).max(1) as i32;
        let height = (descriptor.height >> level).max(1) as i32;
        let flipped = data.map(|d| self.apply_unpack(d, descriptor.format, width, height));
        let pixels = flipped.as_deref().or(data);
        unsafe {
            match descriptor.target {
                TextureTarget::Texture2D | TextureTarget::CubeMap => self.gl.tex_image_2d(
                    target,
                    level as i32,
                    internal,
                    width,
                    height,
                    0,
                    format,
                    ty,
                    glow::PixelUnpackData::Slice(pixels),
                ),
                TextureTarget::Texture2DArray | TextureTarget::Texture3D => self.gl.tex_image_3d(
                    target,
                    level as i32,
                    internal,
                    width,
                    height,
                    descriptor.depth.max(1) as i32,
                    0,
                    format,
                    ty,
                    glow::PixelUnpackData::Slice(pixels),
                ),
            }
        }
    }

    /// Applies the vertical flip and alpha premultiplication that desktop GL
    /// does not perform at unpack time.
    fn apply_unpack(&self, data: &[u8], format: TextureFormat, width: i32, height: i32) -> Vec<u8> {
        let row = width as usize * format.bytes_per_texel() as usize;
        let mut out = data.to_vec();
        if self.unpack.flip_y && row > 0 {
            let rows = height as usize;
            for (dst, src) in out.chunks_exact_mut(row).zip(data.chunks_exact(row).take(rows).rev()) {
                dst.copy_from_slice(src);
            }
        }
        if self.unpack.premultiply_alpha
            && matches!(format, TextureFormat::Rgba8 | TextureFormat::Rgba8Srgb)
        {
            for px in out.chunks_exact_mut(4) {
                let a = px[3] as u32;
                for c in &mut px[..3] {
                    *c = ((*c as u32 * a + 127) / 255) as u8;
                }
            }
        }
        out
    }
}

unsafe fn query_capabilities(gl: &glow::Context) -> DriverCapabilities {
    let extensions = gl.supported_extensions();
    let is_embedded = gl.version().is_embedded;
    let max_anisotropy = if extensions.contains(ANISOTROPY_EXTENSION) {
        gl.get_parameter_f32(glow::MAX_TEXTURE_MAX_ANISOTROPY_EXT) as u8
    } else {
        1
    };
    DriverCapabilities {
        max_texture_units: gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS).max(1) as u32,
        max_vertex_attributes: gl.get_parameter_i32(glow::MAX_VERTEX_ATTRIBS).max(1) as u32,
        max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE).max(1) as u32,
        max_anisotropy: max_anisotropy.max(1),
        max_samples: gl.get_parameter_i32(glow::MAX_SAMPLES).max(0) as u32,
        float_texture_linear: !is_embedded || extensions.contains(FLOAT_LINEAR_EXTENSION),
        half_float_texture_linear: true,
        npot_mipmaps: true,
        parallel_shader_compile: extensions.contains(PARALLEL_COMPILE_EXTENSION),
    }
}

fn color_attachment(index: usize) -> u32 {
    glow::COLOR_ATTACHMENT0 + index as u32
}

impl GpuDriver for GlowDriver {
    fn capabilities(&self) -> &DriverCapabilities {
        &self.capabilities
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn issued_calls(&self) -> u64 {
        self.calls
    }

    fn enable(&mut self, capability: Capability) {
        self.count();
        unsafe { self.gl.enable(capability.into_gl()) }
    }

    fn disable(&mut self, capability: Capability) {
        self.count();
        unsafe { self.gl.disable(capability.into_gl()) }
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.count();
        unsafe { self.gl.blend_equation_separate(rgb.into_gl(), alpha.into_gl()) }
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.count();
        unsafe {
            self.gl.blend_func_separate(
                src_rgb.into_gl(),
                dst_rgb.into_gl(),
                src_alpha.into_gl(),
                dst_alpha.into_gl(),
            )
        }
    }

    fn blend_color(&mut self, color: LinearRgba) {
        self.count();
        unsafe { self.gl.blend_color(color.r, color.g, color.b, color.a) }
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.count();
        unsafe { self.gl.depth_func(func.into_gl()) }
    }

    fn depth_mask(&mut self, write: bool) {
        self.count();
        unsafe { self.gl.depth_mask(write) }
    }

    fn color_mask(&mut self, mask: ColorMask) {
        self.count();
        unsafe { self.gl.color_mask(mask.r, mask.g, mask.b, mask.a) }
    }

    fn stencil_func(&mut self, func: StencilFunc) {
        self.count();
        unsafe {
            self.gl
                .stencil_func(func.func.into_gl(), func.reference, func.mask)
        }
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.count();
        unsafe { self.gl.stencil_mask(mask) }
    }

    fn stencil_op(&mut self, ops: StencilOps) {
        self.count();
        unsafe {
            self.gl
                .stencil_op(ops.fail.into_gl(), ops.depth_fail.into_gl(), ops.pass.into_gl())
        }
    }

    fn cull_face(&mut self, mode: CullMode) {
        self.count();
        unsafe { self.gl.cull_face(mode.into_gl()) }
    }

    fn front_face(&mut self, face: FrontFace) {
        self.count();
        unsafe { self.gl.front_face(face.into_gl()) }
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.count();
        unsafe { self.gl.polygon_offset(factor, units) }
    }

    fn line_width(&mut self, width: f32) {
        self.count();
        unsafe { self.gl.line_width(width) }
    }

    fn viewport(&mut self, rect: Rect) {
        self.count();
        unsafe { self.gl.viewport(rect.x, rect.y, rect.width, rect.height) }
    }

    fn scissor(&mut self, rect: Rect) {
        self.count();
        unsafe { self.gl.scissor(rect.x, rect.y, rect.width, rect.height) }
    }

    fn clear_color(&mut self, color: LinearRgba) {
        self.count();
        unsafe { self.gl.clear_color(color.r, color.g, color.b, color.a) }
    }

    fn clear_depth(&mut self, depth: f32) {
        self.count();
        unsafe { self.gl.clear_depth_f32(depth) }
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.count();
        unsafe { self.gl.clear_stencil(stencil) }
    }

    fn clear(&mut self, flags: ClearFlags) {
        let mut mask = 0;
        if flags.contains(ClearFlags::COLOR) {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::DEPTH) {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::STENCIL) {
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        self.count();
        unsafe { self.gl.clear(mask) }
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        let gl = &self.gl;
        let (program, vertex, fragment) = unsafe {
            let program = gl.create_program().map_err(ResourceError::BackendError)?;
            let vertex = gl
                .create_shader(glow::VERTEX_SHADER)
                .map_err(ResourceError::BackendError)?;
            let fragment = gl
                .create_shader(glow::FRAGMENT_SHADER)
                .map_err(ResourceError::BackendError)?;
            gl.shader_source(vertex, &source.vertex);
            gl.compile_shader(vertex);
            gl.shader_source(fragment, &source.fragment);
            gl.compile_shader(fragment);
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);
            (program, vertex, fragment)
        };
        let id = ProgramId(self.allocate_id());
        self.programs.insert(
            id,
            GlProgram {
                program,
                shaders: Some((vertex, fragment)),
            },
        );
        log::trace!("Created GL program '{}' as {:?}", source.label, id);
        Ok(id)
    }

    fn program_status(&mut self, program: ProgramId) -> ProgramStatus {
        let parallel = self.capabilities.parallel_shader_compile;
        let gl = &self.gl;
        let Some(entry) = self.programs.get_mut(&program) else {
            return ProgramStatus::Failed {
                stage: None,
                log: "unknown program".to_string(),
            };
        };
        let Some((vertex, fragment)) = entry.shaders else {
            return ProgramStatus::Ready;
        };
        unsafe {
            if parallel && !gl.get_program_completion_status(entry.program) {
                return ProgramStatus::Pending;
            }
            let status = if !gl.get_shader_compile_status(vertex) {
                ProgramStatus::Failed {
                    stage: Some(ShaderStage::Vertex),
                    log: gl.get_shader_info_log(vertex),
                }
            } else if !gl.get_shader_compile_status(fragment) {
                ProgramStatus::Failed {
                    stage: Some(ShaderStage::Fragment),
                    log: gl.get_shader_info_log(fragment),
                }
            } else if !gl.get_program_link_status(entry.program) {
                ProgramStatus::Failed {
                    stage: None,
                    log: gl.get_program_info_log(entry.program),
                }
            } else {
                ProgramStatus::Ready
            };
            if status == ProgramStatus::Ready {
                gl.detach_shader(entry.program, vertex);
                gl.detach_shader(entry.program, fragment);
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                entry.shaders = None;
            }
            status
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let native = self.program(program)?;
        let location = unsafe { self.gl.get_uniform_location(native, name) }?;
        let id = UniformLocation(self.uniform_locations.len() as u32);
        self.uniform_locations.push(location);
        Some(id)
    }

    fn attribute_location(&mut self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        let native = self.program(program)?;
        unsafe { self.gl.get_attrib_location(native, name) }.map(AttributeLocation)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.count();
        let native = program.and_then(|p| self.program(p));
        unsafe { self.gl.use_program(native) }
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(entry) = self.programs.remove(&program) {
            self.count();
            unsafe {
                if let Some((vertex, fragment)) = entry.shaders {
                    self.gl.delete_shader(vertex);
                    self.gl.delete_shader(fragment);
                }
                self.gl.delete_program(entry.program);
            }
        }
    }

    fn uniform_f32(&mut self, location: UniformLocation, layout: FloatLayout, data: &[f32]) {
        self.count();
        let gl = &self.gl;
        let Some(loc) = self.uniform_locations.get(location.0 as usize) else {
            return;
        };
        let loc = Some(loc);
        unsafe {
            match layout {
                FloatLayout::Scalar => gl.uniform_1_f32_slice(loc, data),
                FloatLayout::Vec2 => gl.uniform_2_f32_slice(loc, data),
                FloatLayout::Vec3 => gl.uniform_3_f32_slice(loc, data),
                FloatLayout::Vec4 => gl.uniform_4_f32_slice(loc, data),
                FloatLayout::Mat3 => gl.uniform_matrix_3_f32_slice(loc, false, data),
                FloatLayout::Mat4 => gl.uniform_matrix_4_f32_slice(loc, false, data),
            }
        }
    }

    fn uniform_i32(&mut self, location: UniformLocation, data: &[i32]) {
        self.count();
        if let Some(loc) = self.location(location) {
            unsafe { self.gl.uniform_1_i32_slice(Some(loc), data) }
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        let buffer = unsafe { self.gl.create_buffer() }.map_err(ResourceError::BackendError)?;
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.count();
        let native = buffer.and_then(|b| self.buffers.get(&b).copied());
        unsafe { self.gl.bind_buffer(target.into_gl(), native) }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.count();
        unsafe {
            self.gl
                .buffer_data_u8_slice(target.into_gl(), data, usage.into_gl())
        }
    }

    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage) {
        self.count();
        unsafe {
            self.gl
                .buffer_data_size(target.into_gl(), size as i32, usage.into_gl())
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.count();
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(target.into_gl(), offset as i32, data)
        }
    }

    fn get_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> Result<(), ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        unsafe {
            self.gl
                .get_buffer_sub_data(target.into_gl(), offset as i32, out)
        };
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(native) = self.buffers.remove(&buffer) {
            self.count();
            unsafe { self.gl.delete_buffer(native) }
        }
    }

    fn vertex_attribute(&mut self, location: AttributeLocation, binding: &VertexAttributeBinding) {
        self.count();
        let native = self.buffers.get(&binding.buffer).copied();
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, native);
            self.gl.vertex_attrib_pointer_f32(
                location.0,
                binding.components as i32,
                glow::FLOAT,
                binding.normalized,
                binding.stride as i32,
                binding.offset as i32,
            );
            self.gl.vertex_attrib_divisor(location.0, binding.divisor);
        }
    }

    fn set_vertex_attribute_array(&mut self, location: AttributeLocation, enabled: bool) {
        self.count();
        unsafe {
            if enabled {
                self.gl.enable_vertex_attrib_array(location.0)
            } else {
                self.gl.disable_vertex_attrib_array(location.0)
            }
        }
    }

    fn create_texture(&mut self) -> Result<TextureId, ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        let texture = unsafe { self.gl.create_texture() }.map_err(ResourceError::BackendError)?;
        let id = TextureId(self.allocate_id());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn active_texture(&mut self, unit: u32) {
        self.count();
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        self.count();
        let native = texture.and_then(|t| self.textures.get(&t).copied());
        unsafe { self.gl.bind_texture(target.into_gl(), native) }
    }

    fn unpack_options(&mut self, options: UnpackOptions) {
        self.count();
        self.unpack = options;
        unsafe {
            self.gl
                .pixel_store_i32(glow::UNPACK_ALIGNMENT, options.alignment as i32)
        }
    }

    fn tex_image(
        &mut self,
        target: TextureTarget,
        descriptor: &TextureDescriptor,
        level: u32,
        data: Option<&[u8]>,
    ) -> Result<(), ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        if target == TextureTarget::CubeMap {
            let level_descriptor = TextureDescriptor {
                width: (descriptor.width >> level).max(1),
                height: (descriptor.height >> level).max(1),
                ..*descriptor
            };
            let face_size = level_descriptor.base_level_size() / 6;
            for face in 0..6 {
                let face_data = match data {
                    Some(d) => Some(
                        d.get(face * face_size..(face + 1) * face_size)
                            .ok_or(ResourceError::SizeMismatch {
                                expected: face_size * 6,
                                actual: d.len(),
                            })?,
                    ),
                    None => None,
                };
                let face_target = glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32;
                self.upload_level(face_target, descriptor, level, face_data);
            }
        } else {
            self.upload_level(target.into_gl(), descriptor, level, data);
        }
        Ok(())
    }

    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        format: TextureFormat,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let expected = region.width as usize * region.height as usize * format.bytes_per_texel() as usize;
        if data.len() != expected {
            return Err(ResourceError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        self.count();
        let (_, gl_format, ty) = texture_format_triple(format);
        unsafe {
            match target {
                TextureTarget::Texture2D => self.gl.tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    region.level as i32,
                    region.x as i32,
                    region.y as i32,
                    region.width as i32,
                    region.height as i32,
                    gl_format,
                    ty,
                    glow::PixelUnpackData::Slice(Some(data)),
                ),
                TextureTarget::CubeMap => self.gl.tex_sub_image_2d(
                    glow::TEXTURE_CUBE_MAP_POSITIVE_X + region.layer,
                    region.level as i32,
                    region.x as i32,
                    region.y as i32,
                    region.width as i32,
                    region.height as i32,
                    gl_format,
                    ty,
                    glow::PixelUnpackData::Slice(Some(data)),
                ),
                TextureTarget::Texture2DArray | TextureTarget::Texture3D => {
                    self.gl.tex_sub_image_3d(
                        target.into_gl(),
                        region.level as i32,
                        region.x as i32,
                        region.y as i32,
                        region.layer as i32,
                        region.width as i32,
                        region.height as i32,
                        1,
                        gl_format,
                        ty,
                        glow::PixelUnpackData::Slice(Some(data)),
                    )
                }
            }
        }
        Ok(())
    }

    fn tex_parameters(&mut self, target: TextureTarget, sampler: &SamplerDescriptor) {
        self.count();
        let t = target.into_gl();
        unsafe {
            let gl = &self.gl;
            gl.tex_parameter_i32(t, glow::TEXTURE_MAG_FILTER, sampler.mag_filter.into_gl() as i32);
            gl.tex_parameter_i32(t, glow::TEXTURE_MIN_FILTER, sampler.min_filter.into_gl() as i32);
            gl.tex_parameter_i32(t, glow::TEXTURE_WRAP_S, sampler.wrap_s.into_gl() as i32);
            gl.tex_parameter_i32(t, glow::TEXTURE_WRAP_T, sampler.wrap_t.into_gl() as i32);
            if matches!(target, TextureTarget::Texture3D | TextureTarget::CubeMap) {
                gl.tex_parameter_i32(t, glow::TEXTURE_WRAP_R, sampler.wrap_r.into_gl() as i32);
            }
            match sampler.compare {
                Some(func) => {
                    gl.tex_parameter_i32(
                        t,
                        glow::TEXTURE_COMPARE_MODE,
                        glow::COMPARE_REF_TO_TEXTURE as i32,
                    );
                    gl.tex_parameter_i32(t, glow::TEXTURE_COMPARE_FUNC, func.into_gl() as i32);
                }
                None => gl.tex_parameter_i32(t, glow::TEXTURE_COMPARE_MODE, glow::NONE as i32),
            }
            if self.capabilities.max_anisotropy > 1 && sampler.anisotropy > 1 {
                let anisotropy = sampler.anisotropy.min(self.capabilities.max_anisotropy);
                gl.tex_parameter_f32(t, glow::TEXTURE_MAX_ANISOTROPY_EXT, anisotropy as f32);
            }
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        self.count();
        unsafe { self.gl.generate_mipmap(target.into_gl()) }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(native) = self.textures.remove(&texture) {
            self.count();
            unsafe { self.gl.delete_texture(native) }
        }
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<GpuRenderTarget, ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        let framebuffer =
            unsafe { self.gl.create_framebuffer() }.map_err(ResourceError::BackendError)?;
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer)) };

        let attach = |driver: &mut Self, format: TextureFormat, attachment: u32| {
            let id = driver.create_texture()?;
            let native = driver.textures[&id];
            let level = TextureDescriptor {
                target: TextureTarget::Texture2D,
                format,
                width: descriptor.width,
                height: descriptor.height,
                depth: 1,
                mip_levels: 1,
            };
            unsafe { driver.gl.bind_texture(glow::TEXTURE_2D, Some(native)) };
            driver.upload_level(glow::TEXTURE_2D, &level, 0, None);
            unsafe {
                driver.gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MIN_FILTER,
                    glow::LINEAR as i32,
                );
                driver.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    Some(native),
                    0,
                );
            }
            Ok::<_, ResourceError>(id)
        };

        let mut color = Vec::with_capacity(descriptor.color_formats.len());
        for (i, format) in descriptor.color_formats.iter().enumerate() {
            color.push(attach(self, *format, color_attachment(i))?);
        }
        let depth = match descriptor.depth_format {
            Some(format) => {
                let attachment = if format.has_stencil() {
                    glow::DEPTH_STENCIL_ATTACHMENT
                } else {
                    glow::DEPTH_ATTACHMENT
                };
                Some(attach(self, format, attachment)?)
            }
            None => None,
        };

        let status = unsafe {
            let draw_buffers: Vec<u32> = (0..color.len()).map(color_attachment).collect();
            self.gl.draw_buffers(&draw_buffers);
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            status
        };
        let id = FramebufferId(self.allocate_id());
        self.framebuffers.insert(id, framebuffer);
        let target = GpuRenderTarget {
            framebuffer: id,
            color,
            depth,
        };
        if status != glow::FRAMEBUFFER_COMPLETE {
            self.delete_render_target(&target);
            return Err(ResourceError::BackendError(format!(
                "framebuffer incomplete: status 0x{status:x}"
            )));
        }
        Ok(target)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.count();
        let native = framebuffer.and_then(|f| self.framebuffers.get(&f).copied());
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, native) }
    }

    fn delete_render_target(&mut self, target: &GpuRenderTarget) {
        for texture in target.color.iter().chain(target.depth.iter()) {
            self.delete_texture(*texture);
        }
        if let Some(native) = self.framebuffers.remove(&target.framebuffer) {
            self.count();
            unsafe { self.gl.delete_framebuffer(native) }
        }
    }

    fn read_pixels_to_pack_buffer(&mut self, rect: Rect, format: TextureFormat) {
        self.count();
        let (_, gl_format, ty) = texture_format_triple(format);
        unsafe {
            self.gl.read_pixels(
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                gl_format,
                ty,
                glow::PixelPackData::BufferOffset(0),
            )
        }
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32, instances: u32) {
        self.count();
        unsafe {
            if instances > 1 {
                self.gl.draw_arrays_instanced(
                    topology.into_gl(),
                    first as i32,
                    count as i32,
                    instances as i32,
                )
            } else {
                self.gl
                    .draw_arrays(topology.into_gl(), first as i32, count as i32)
            }
        }
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        index: IndexBinding,
        first: u32,
        count: u32,
        instances: u32,
    ) {
        self.count();
        let native = self.buffers.get(&index.buffer).copied();
        let offset = (first * index.format.byte_size()) as i32;
        unsafe {
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, native);
            if instances > 1 {
                self.gl.draw_elements_instanced(
                    topology.into_gl(),
                    count as i32,
                    index.format.into_gl(),
                    offset,
                    instances as i32,
                )
            } else {
                self.gl.draw_elements(
                    topology.into_gl(),
                    count as i32,
                    index.format.into_gl(),
                    offset,
                )
            }
        }
    }

    fn fence_sync(&mut self) -> Result<FenceId, ResourceError> {
        if self.context_lost {
            return Err(ResourceError::ContextLost);
        }
        self.count();
        let fence = unsafe { self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) }
            .map_err(ResourceError::BackendError)?;
        unsafe { self.gl.flush() };
        let id = FenceId(self.allocate_id());
        self.fences.insert(id, fence);
        Ok(id)
    }

    fn fence_status(&mut self, fence: FenceId) -> FenceStatus {
        let Some(native) = self.fences.get(&fence).copied() else {
            return FenceStatus::Pending;
        };
        self.count();
        match unsafe { self.gl.client_wait_sync(native, 0, 0) } {
            glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED => FenceStatus::Signaled,
            glow::WAIT_FAILED => {
                log::warn!("Fence wait failed for {fence:?}; treating it as signaled");
                FenceStatus::Signaled
            }
            _ => FenceStatus::Pending,
        }
    }

    fn delete_fence(&mut self, fence: FenceId) {
        if let Some(native) = self.fences.remove(&fence) {
            self.count();
            unsafe { self.gl.delete_sync(native) }
        }
    }
}

impl Drop for GlowDriver {
    fn drop(&mut self) {
        if self.context_lost {
            return;
        }
        unsafe {
            for (_, p) in self.programs.drain() {
                self.gl.delete_program(p.program);
            }
            for (_, b) in self.buffers.drain() {
                self.gl.delete_buffer(b);
            }
            for (_, t) in self.textures.drain() {
                self.gl.delete_texture(t);
            }
            for (_, f) in self.framebuffers.drain() {
                self.gl.delete_framebuffer(f);
            }
            for (_, f) in self.fences.drain() {
                self.gl.delete_sync(f);
            }
            if let Some(vao) = self.vertex_array.take() {
                self.gl.delete_vertex_array(vao);
            }
        }
    }
}
