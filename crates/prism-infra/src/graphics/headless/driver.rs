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

use super::call::{DrawRecord, DriverCall, UniformData};
use super::source;
use parking_lot::Mutex;
use prism_core::math::{LinearRgba, Rect};
use prism_core::renderer::api::*;
use prism_core::renderer::{DriverCapabilities, FloatLayout, GpuDriver, ResourceError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Behavior knobs of a [`HeadlessDriver`].
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Reported capabilities.
    pub capabilities: DriverCapabilities,
    /// Number of `program_status` polls that return `Pending` before a
    /// program resolves, when parallel compilation is reported.
    pub compile_latency_polls: u32,
    /// Number of `fence_status` polls that return `Pending` before a fence
    /// signals.
    pub fence_latency_polls: u32,
    /// Keep the full call log. Counters are always maintained.
    pub record_calls: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            capabilities: DriverCapabilities::default(),
            compile_latency_polls: 2,
            fence_latency_polls: 1,
            record_calls: true,
        }
    }
}

#[derive(Debug)]
struct HeadlessProgram {
    label: String,
    status: ProgramStatus,
    polls_left: u32,
    uniforms: HashMap<String, UniformLocation>,
    attributes: HashMap<String, AttributeLocation>,
}

#[derive(Debug, Default)]
struct HeadlessTexture {
    descriptor: Option<TextureDescriptor>,
    sampler: Option<SamplerDescriptor>,
    mip_generated: bool,
}

#[derive(Debug)]
struct HeadlessFramebuffer {
    target: GpuRenderTarget,
    clear_color: LinearRgba,
}

/// The mirror of the pipeline state actually in effect on the context.
#[derive(Debug, Clone)]
struct ContextState {
    enabled: HashSet<Capability>,
    cull_mode: CullMode,
    front_face: FrontFace,
    depth_write: bool,
    viewport: Rect,
    clear_color: LinearRgba,
    program: Option<ProgramId>,
    framebuffer: Option<FramebufferId>,
    active_unit: u32,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            enabled: Capability::ALL
                .into_iter()
                .filter(|c| c.default_enabled())
                .collect(),
            cull_mode: CullMode::Back,
            front_face: FrontFace::Ccw,
            depth_write: true,
            viewport: Rect::default(),
            clear_color: LinearRgba::TRANSPARENT,
            program: None,
            framebuffer: None,
            active_unit: 0,
        }
    }
}

#[derive(Debug)]
struct HeadlessState {
    config: HeadlessConfig,
    calls: Vec<DriverCall>,
    counts: HashMap<&'static str, u64>,
    total_calls: u64,
    next_id: u32,
    context_lost: bool,
    invalid_uses: u64,
    context: ContextState,
    default_clear_color: LinearRgba,

    programs: HashMap<ProgramId, HeadlessProgram>,
    uniform_owner: HashMap<UniformLocation, (ProgramId, String)>,
    uniform_values: HashMap<UniformLocation, UniformData>,
    buffers: HashMap<BufferId, Vec<u8>>,
    bound_buffers: HashMap<BufferTarget, BufferId>,
    textures: HashMap<TextureId, HeadlessTexture>,
    bound_textures: HashMap<(u32, TextureTarget), TextureId>,
    framebuffers: HashMap<FramebufferId, HeadlessFramebuffer>,
    fences: HashMap<FenceId, u32>,
    draws: Vec<DrawRecord>,
}

impl HeadlessState {
    fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            calls: Vec::new(),
            counts: HashMap::new(),
            total_calls: 0,
            next_id: 1,
            context_lost: false,
            invalid_uses: 0,
            context: ContextState::default(),
            default_clear_color: LinearRgba::TRANSPARENT,
            programs: HashMap::new(),
            uniform_owner: HashMap::new(),
            uniform_values: HashMap::new(),
            buffers: HashMap::new(),
            bound_buffers: HashMap::new(),
            textures: HashMap::new(),
            bound_textures: HashMap::new(),
            framebuffers: HashMap::new(),
            fences: HashMap::new(),
            draws: Vec::new(),
        }
    }

    fn record(&mut self, call: DriverCall) {
        log::trace!("headless: {call:?}");
        self.total_calls += 1;
        *self.counts.entry(call.name()).or_insert(0) += 1;
        if self.config.record_calls {
            self.calls.push(call);
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn invalid(&mut self, what: &str) {
        if !self.context_lost {
            log::warn!("headless: use of unknown {what}");
            self.invalid_uses += 1;
        }
    }

    fn bound_texture(&self, target: TextureTarget) -> Option<TextureId> {
        self.bound_textures
            .get(&(self.context.active_unit, target))
            .copied()
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.context.enabled.insert(capability);
        } else {
            self.context.enabled.remove(&capability);
        }
    }

    fn snapshot_draw(&mut self, topology: PrimitiveTopology, count: u32, instances: u32) {
        let mut uniforms = BTreeMap::new();
        if let Some(program) = self.context.program {
            match self.programs.get(&program) {
                Some(p) => {
                    for (name, location) in &p.uniforms {
                        if let Some(value) = self.uniform_values.get(location) {
                            uniforms.insert(name.clone(), value.clone());
                        }
                    }
                }
                None => self.invalid("program at draw"),
            }
        }
        self.draws.push(DrawRecord {
            program: self.context.program,
            framebuffer: self.context.framebuffer,
            viewport: self.context.viewport,
            culling: self.context.enabled.contains(&Capability::CullFace),
            cull_mode: self.context.cull_mode,
            front_face: self.context.front_face,
            blending: self.context.enabled.contains(&Capability::Blend),
            depth_write: self.context.depth_write,
            topology,
            count,
            instances,
            uniforms,
        });
    }
}

/// A recording [`GpuDriver`] that never touches a GPU.
///
/// Cloning the driver yields another handle onto the same recorded state, so a
/// test can hand one clone to the renderer and inspect the other.
#[derive(Debug, Clone)]
pub struct HeadlessDriver {
    state: Arc<Mutex<HeadlessState>>,
    capabilities: DriverCapabilities,
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessDriver {
    /// Creates a driver with the given behavior.
    pub fn new(config: HeadlessConfig) -> Self {
        let capabilities = config.capabilities.clone();
        Self {
            state: Arc::new(Mutex::new(HeadlessState::new(config))),
            capabilities,
        }
    }

    // --- Inspection ---

    /// Number of calls made to the driver method `name` (e.g. `"use_program"`).
    pub fn count(&self, name: &str) -> u64 {
        self.state.lock().counts.get(name).copied().unwrap_or(0)
    }

    /// A copy of the call log.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    /// A copy of the draw snapshots.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.lock().draws.clone()
    }

    /// Clears the call log, counters and draw snapshots. Objects are kept.
    pub fn reset_log(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.counts.clear();
        state.draws.clear();
    }

    /// Number of live programs.
    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Calls that referenced an object unknown to the context while it was
    /// not lost. A correct renderer keeps this at zero.
    pub fn invalid_handle_uses(&self) -> u64 {
        self.state.lock().invalid_uses
    }

    /// The label a program was created with.
    pub fn program_label(&self, program: ProgramId) -> Option<String> {
        self.state
            .lock()
            .programs
            .get(&program)
            .map(|p| p.label.clone())
    }

    /// The content of a buffer.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }

    /// Whether a mip chain was generated for a texture.
    pub fn texture_has_mipmaps(&self, texture: TextureId) -> bool {
        self.state
            .lock()
            .textures
            .get(&texture)
            .is_some_and(|t| t.mip_generated)
    }

    /// The sampling parameters last applied to a texture.
    pub fn texture_sampler(&self, texture: TextureId) -> Option<SamplerDescriptor> {
        self.state
            .lock()
            .textures
            .get(&texture)
            .and_then(|t| t.sampler)
    }

    /// The color that subsequent read-backs of the default framebuffer return.
    pub fn set_default_framebuffer_color(&self, color: LinearRgba) {
        self.state.lock().default_clear_color = color;
    }

    // --- Simulation ---

    /// Simulates losing the context: every GPU object is destroyed.
    pub fn lose_context(&self) {
        let mut state = self.state.lock();
        log::info!("headless: context lost");
        state.context_lost = true;
        state.programs.clear();
        state.uniform_owner.clear();
        state.uniform_values.clear();
        state.buffers.clear();
        state.bound_buffers.clear();
        state.textures.clear();
        state.bound_textures.clear();
        state.framebuffers.clear();
        state.fences.clear();
        state.context = ContextState::default();
    }

    /// Simulates a context restore. The context comes back empty, with
    /// default pipeline state.
    pub fn restore_context(&self) {
        let mut state = self.state.lock();
        log::info!("headless: context restored");
        state.context_lost = false;
        state.context = ContextState::default();
    }
}

impl GpuDriver for HeadlessDriver {
    fn capabilities(&self) -> &DriverCapabilities {
        &self.capabilities
    }

    fn is_context_lost(&self) -> bool {
        self.state.lock().context_lost
    }

    fn issued_calls(&self) -> u64 {
        self.state.lock().total_calls
    }

    fn enable(&mut self, capability: Capability) {
        let mut s = self.state.lock();
        s.record(DriverCall::Enable(capability));
        s.set_capability(capability, true);
    }

    fn disable(&mut self, capability: Capability) {
        let mut s = self.state.lock();
        s.record(DriverCall::Disable(capability));
        s.set_capability(capability, false);
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.state
            .lock()
            .record(DriverCall::BlendEquationSeparate(rgb, alpha));
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.state.lock().record(DriverCall::BlendFuncSeparate(
            src_rgb, dst_rgb, src_alpha, dst_alpha,
        ));
    }

    fn blend_color(&mut self, color: LinearRgba) {
        self.state.lock().record(DriverCall::BlendColor(color));
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.state.lock().record(DriverCall::DepthFunc(func));
    }

    fn depth_mask(&mut self, write: bool) {
        let mut s = self.state.lock();
        s.record(DriverCall::DepthMask(write));
        s.context.depth_write = write;
    }

    fn color_mask(&mut self, mask: ColorMask) {
        self.state.lock().record(DriverCall::ColorMask(mask));
    }

    fn stencil_func(&mut self, func: StencilFunc) {
        self.state.lock().record(DriverCall::StencilFunc(func));
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.state.lock().record(DriverCall::StencilMask(mask));
    }

    fn stencil_op(&mut self, ops: StencilOps) {
        self.state.lock().record(DriverCall::StencilOp(ops));
    }

    fn cull_face(&mut self, mode: CullMode) {
        let mut s = self.state.lock();
        s.record(DriverCall::CullFace(mode));
        s.context.cull_mode = mode;
    }

    fn front_face(&mut self, face: FrontFace) {
        let mut s = self.state.lock();
        s.record(DriverCall::FrontFace(face));
        s.context.front_face = face;
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.state
            .lock()
            .record(DriverCall::PolygonOffset(factor, units));
    }

    fn line_width(&mut self, width: f32) {
        self.state.lock().record(DriverCall::LineWidth(width));
    }

    fn viewport(&mut self, rect: Rect) {
        let mut s = self.state.lock();
        s.record(DriverCall::Viewport(rect));
        s.context.viewport = rect;
    }

    fn scissor(&mut self, rect: Rect) {
        self.state.lock().record(DriverCall::Scissor(rect));
    }

    fn clear_color(&mut self, color: LinearRgba) {
        let mut s = self.state.lock();
        s.record(DriverCall::ClearColor(color));
        s.context.clear_color = color;
    }

    fn clear_depth(&mut self, depth: f32) {
        self.state.lock().record(DriverCall::ClearDepth(depth));
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.state.lock().record(DriverCall::ClearStencil(stencil));
    }

    fn clear(&mut self, flags: ClearFlags) {
        let mut s = self.state.lock();
        s.record(DriverCall::Clear(flags));
        if flags.contains(ClearFlags::COLOR) {
            let color = s.context.clear_color;
            match s.context.framebuffer {
                Some(fb) => match s.framebuffers.get_mut(&fb) {
                    Some(entry) => entry.clear_color = color,
                    None => s.invalid("framebuffer"),
                },
                None => s.default_clear_color = color,
            }
        }
    }

    fn create_program(&mut self, src: &ProgramSource) -> Result<ProgramId, ResourceError> {
        let mut s = self.state.lock();
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let id = ProgramId(s.next_id());
        s.record(DriverCall::CreateProgram(id));

        let failure = [ShaderStage::Vertex, ShaderStage::Fragment]
            .into_iter()
            .find_map(|stage| source::find_error(src.stage(stage)).map(|line| (stage, line)));
        let status = match failure {
            Some((stage, line)) => ProgramStatus::Failed {
                stage: Some(stage),
                log: format!("ERROR: 0:{line}: '#error' : user-defined error"),
            },
            None => ProgramStatus::Ready,
        };

        let mut uniforms = HashMap::new();
        let mut attributes = HashMap::new();
        if status == ProgramStatus::Ready {
            let vertex = source::declarations(&src.vertex, true);
            let fragment = source::declarations(&src.fragment, false);
            for name in vertex.uniforms.into_iter().chain(fragment.uniforms) {
                if !uniforms.contains_key(&name) {
                    let location = UniformLocation(s.next_id());
                    s.uniform_owner.insert(location, (id, name.clone()));
                    uniforms.insert(name, location);
                }
            }
            for (slot, name) in vertex.attributes.into_iter().enumerate() {
                attributes.insert(name, AttributeLocation(slot as u32));
            }
        }

        let polls_left = if s.config.capabilities.parallel_shader_compile {
            s.config.compile_latency_polls
        } else {
            0
        };
        s.programs.insert(
            id,
            HeadlessProgram {
                label: src.label.clone(),
                status,
                polls_left,
                uniforms,
                attributes,
            },
        );
        Ok(id)
    }

    fn program_status(&mut self, program: ProgramId) -> ProgramStatus {
        let mut s = self.state.lock();
        s.record(DriverCall::ProgramStatus(program));
        match s.programs.get_mut(&program) {
            Some(p) if p.polls_left > 0 => {
                p.polls_left -= 1;
                ProgramStatus::Pending
            }
            Some(p) => p.status.clone(),
            None => {
                s.invalid("program");
                ProgramStatus::Failed {
                    stage: None,
                    log: "invalid program".to_string(),
                }
            }
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut s = self.state.lock();
        s.record(DriverCall::UniformLocation(program, name.to_string()));
        match s.programs.get(&program) {
            Some(p) => p.uniforms.get(name).copied(),
            None => {
                s.invalid("program");
                None
            }
        }
    }

    fn attribute_location(&mut self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        let mut s = self.state.lock();
        s.record(DriverCall::AttributeLocation(program, name.to_string()));
        match s.programs.get(&program) {
            Some(p) => p.attributes.get(name).copied(),
            None => {
                s.invalid("program");
                None
            }
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        let mut s = self.state.lock();
        s.record(DriverCall::UseProgram(program));
        if let Some(p) = program {
            if !s.programs.contains_key(&p) {
                s.invalid("program");
            }
        }
        s.context.program = program;
    }

    fn delete_program(&mut self, program: ProgramId) {
        let mut s = self.state.lock();
        s.record(DriverCall::DeleteProgram(program));
        if let Some(p) = s.programs.remove(&program) {
            for location in p.uniforms.values() {
                s.uniform_owner.remove(location);
                s.uniform_values.remove(location);
            }
        } else {
            s.invalid("program");
        }
        if s.context.program == Some(program) {
            s.context.program = None;
        }
    }

    fn uniform_f32(&mut self, location: UniformLocation, layout: FloatLayout, data: &[f32]) {
        let mut s = self.state.lock();
        s.record(DriverCall::UniformF32(location, data.to_vec()));
        let owner = s.uniform_owner.get(&location).map(|(p, _)| *p);
        if owner.is_none() || owner != s.context.program {
            s.invalid("uniform location for the current program");
            return;
        }
        debug_assert_eq!(data.len() % layout.components(), 0);
        s.uniform_values
            .insert(location, UniformData::Float(layout, data.to_vec()));
    }

    fn uniform_i32(&mut self, location: UniformLocation, data: &[i32]) {
        let mut s = self.state.lock();
        s.record(DriverCall::UniformI32(location, data.to_vec()));
        let owner = s.uniform_owner.get(&location).map(|(p, _)| *p);
        if owner.is_none() || owner != s.context.program {
            s.invalid("uniform location for the current program");
            return;
        }
        s.uniform_values
            .insert(location, UniformData::Int(data.to_vec()));
    }

    fn create_buffer(&mut self) -> Result<BufferId, ResourceError> {
        let mut s = self.state.lock();
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let id = BufferId(s.next_id());
        s.record(DriverCall::CreateBuffer(id));
        s.buffers.insert(id, Vec::new());
        Ok(id)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        let mut s = self.state.lock();
        s.record(DriverCall::BindBuffer(target, buffer));
        match buffer {
            Some(b) => {
                if !s.buffers.contains_key(&b) {
                    s.invalid("buffer");
                }
                s.bound_buffers.insert(target, b);
            }
            None => {
                s.bound_buffers.remove(&target);
            }
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], _usage: BufferUsage) {
        let mut s = self.state.lock();
        s.record(DriverCall::BufferData(target, data.len()));
        let bound = s.bound_buffers.get(&target).copied();
        match bound.and_then(|b| s.buffers.get_mut(&b)) {
            Some(storage) => *storage = data.to_vec(),
            None => s.invalid("bound buffer"),
        }
    }

    fn buffer_storage(&mut self, target: BufferTarget, size: usize, _usage: BufferUsage) {
        let mut s = self.state.lock();
        s.record(DriverCall::BufferStorage(target, size));
        let bound = s.bound_buffers.get(&target).copied();
        match bound.and_then(|b| s.buffers.get_mut(&b)) {
            Some(storage) => *storage = vec![0; size],
            None => s.invalid("bound buffer"),
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        let mut s = self.state.lock();
        s.record(DriverCall::BufferSubData(target, offset, data.len()));
        let bound = s.bound_buffers.get(&target).copied();
        match bound.and_then(|b| s.buffers.get_mut(&b)) {
            Some(storage) if offset + data.len() <= storage.len() => {
                storage[offset..offset + data.len()].copy_from_slice(data);
            }
            _ => s.invalid("bound buffer range"),
        }
    }

    fn get_buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        out: &mut [u8],
    ) -> Result<(), ResourceError> {
        let mut s = self.state.lock();
        s.record(DriverCall::GetBufferSubData(target, offset, out.len()));
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let bound = s.bound_buffers.get(&target).copied();
        let storage = bound
            .and_then(|b| s.buffers.get(&b))
            .ok_or(ResourceError::InvalidHandle { kind: "buffer" })?;
        let end = offset + out.len();
        if end > storage.len() {
            return Err(ResourceError::OutOfBounds);
        }
        out.copy_from_slice(&storage[offset..end]);
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        let mut s = self.state.lock();
        s.record(DriverCall::DeleteBuffer(buffer));
        if s.buffers.remove(&buffer).is_none() {
            s.invalid("buffer");
        }
        s.bound_buffers.retain(|_, b| *b != buffer);
    }

    fn vertex_attribute(&mut self, location: AttributeLocation, binding: &VertexAttributeBinding) {
        let mut s = self.state.lock();
        s.record(DriverCall::VertexAttribute(location, *binding));
        if !s.buffers.contains_key(&binding.buffer) {
            s.invalid("attribute buffer");
        }
    }

    fn set_vertex_attribute_array(&mut self, location: AttributeLocation, enabled: bool) {
        self.state
            .lock()
            .record(DriverCall::VertexAttributeArray(location, enabled));
    }

    fn create_texture(&mut self) -> Result<TextureId, ResourceError> {
        let mut s = self.state.lock();
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let id = TextureId(s.next_id());
        s.record(DriverCall::CreateTexture(id));
        s.textures.insert(id, HeadlessTexture::default());
        Ok(id)
    }

    fn active_texture(&mut self, unit: u32) {
        let mut s = self.state.lock();
        s.record(DriverCall::ActiveTexture(unit));
        s.context.active_unit = unit;
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        let mut s = self.state.lock();
        s.record(DriverCall::BindTexture(target, texture));
        let unit = s.context.active_unit;
        match texture {
            Some(t) => {
                if !s.textures.contains_key(&t) {
                    s.invalid("texture");
                }
                s.bound_textures.insert((unit, target), t);
            }
            None => {
                s.bound_textures.remove(&(unit, target));
            }
        }
    }

    fn unpack_options(&mut self, options: UnpackOptions) {
        self.state.lock().record(DriverCall::UnpackOptions(options));
    }

    fn tex_image(
        &mut self,
        target: TextureTarget,
        descriptor: &TextureDescriptor,
        level: u32,
        data: Option<&[u8]>,
    ) -> Result<(), ResourceError> {
        let mut s = self.state.lock();
        let bound = s.bound_texture(target);
        s.record(DriverCall::TexImage(bound, level));
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        if let Some(data) = data {
            let w = (descriptor.width >> level).max(1) as usize;
            let h = (descriptor.height >> level).max(1) as usize;
            let level_desc = TextureDescriptor {
                width: w as u32,
                height: h as u32,
                ..*descriptor
            };
            let expected = level_desc.base_level_size();
            if data.len() != expected {
                return Err(ResourceError::SizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }
        match bound.and_then(|t| s.textures.get_mut(&t)) {
            Some(t) => {
                t.descriptor = Some(*descriptor);
                Ok(())
            }
            None => {
                s.invalid("bound texture");
                Err(ResourceError::InvalidHandle { kind: "texture" })
            }
        }
    }

    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        format: TextureFormat,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut s = self.state.lock();
        let bound = s.bound_texture(target);
        s.record(DriverCall::TexSubImage(bound, *region));
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let expected =
            region.width as usize * region.height as usize * format.bytes_per_texel() as usize;
        if data.len() != expected {
            return Err(ResourceError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let descriptor = bound
            .and_then(|t| s.textures.get(&t))
            .and_then(|t| t.descriptor);
        match descriptor {
            Some(d) if region.x + region.width <= d.width && region.y + region.height <= d.height => {
                Ok(())
            }
            Some(_) => Err(ResourceError::OutOfBounds),
            None => {
                s.invalid("bound texture");
                Err(ResourceError::InvalidHandle { kind: "texture" })
            }
        }
    }

    fn tex_parameters(&mut self, target: TextureTarget, sampler: &SamplerDescriptor) {
        let mut s = self.state.lock();
        let bound = s.bound_texture(target);
        s.record(DriverCall::TexParameters(bound, *sampler));
        match bound.and_then(|t| s.textures.get_mut(&t)) {
            Some(t) => t.sampler = Some(*sampler),
            None => s.invalid("bound texture"),
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        let mut s = self.state.lock();
        let bound = s.bound_texture(target);
        s.record(DriverCall::GenerateMipmap(bound));
        match bound.and_then(|t| s.textures.get_mut(&t)) {
            Some(t) => t.mip_generated = true,
            None => s.invalid("bound texture"),
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let mut s = self.state.lock();
        s.record(DriverCall::DeleteTexture(texture));
        if s.textures.remove(&texture).is_none() {
            s.invalid("texture");
        }
        s.bound_textures.retain(|_, t| *t != texture);
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<GpuRenderTarget, ResourceError> {
        let mut s = self.state.lock();
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(ResourceError::BackendError(
                "framebuffer incomplete: zero-sized attachment".to_string(),
            ));
        }
        let framebuffer = FramebufferId(s.next_id());
        s.record(DriverCall::CreateRenderTarget(framebuffer));
        let attachment = |s: &mut HeadlessState, format: TextureFormat| {
            let id = TextureId(s.next_id());
            s.textures.insert(
                id,
                HeadlessTexture {
                    descriptor: Some(TextureDescriptor {
                        target: TextureTarget::Texture2D,
                        format,
                        width: descriptor.width,
                        height: descriptor.height,
                        depth: descriptor.layers.max(1),
                        mip_levels: 1,
                    }),
                    ..Default::default()
                },
            );
            id
        };
        let color = descriptor
            .color_formats
            .iter()
            .map(|f| attachment(&mut *s, *f))
            .collect();
        let depth = descriptor.depth_format.map(|f| attachment(&mut *s, f));
        let target = GpuRenderTarget {
            framebuffer,
            color,
            depth,
        };
        s.framebuffers.insert(
            framebuffer,
            HeadlessFramebuffer {
                target: target.clone(),
                clear_color: LinearRgba::TRANSPARENT,
            },
        );
        Ok(target)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        let mut s = self.state.lock();
        s.record(DriverCall::BindFramebuffer(framebuffer));
        if let Some(fb) = framebuffer {
            if !s.framebuffers.contains_key(&fb) {
                s.invalid("framebuffer");
            }
        }
        s.context.framebuffer = framebuffer;
    }

    fn delete_render_target(&mut self, target: &GpuRenderTarget) {
        let mut s = self.state.lock();
        s.record(DriverCall::DeleteRenderTarget(target.framebuffer));
        match s.framebuffers.remove(&target.framebuffer) {
            Some(entry) => {
                for texture in entry.target.color.iter().chain(entry.target.depth.iter()) {
                    s.textures.remove(texture);
                }
            }
            None => s.invalid("framebuffer"),
        }
        if s.context.framebuffer == Some(target.framebuffer) {
            s.context.framebuffer = None;
        }
    }

    fn read_pixels_to_pack_buffer(&mut self, rect: Rect, format: TextureFormat) {
        let mut s = self.state.lock();
        s.record(DriverCall::ReadPixels(rect));
        let color = match s.context.framebuffer {
            Some(fb) => s.framebuffers.get(&fb).map(|f| f.clear_color),
            None => Some(s.default_clear_color),
        };
        let Some(color) = color else {
            s.invalid("framebuffer");
            return;
        };
        let texel: Vec<u8> = match format {
            TextureFormat::Rgba8 | TextureFormat::Rgba8Srgb => color
                .to_array()
                .iter()
                .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect(),
            other => vec![0; other.bytes_per_texel() as usize],
        };
        let bytes: Vec<u8> = texel
            .iter()
            .copied()
            .cycle()
            .take(rect.area() * texel.len())
            .collect();
        let bound = s.bound_buffers.get(&BufferTarget::PixelPack).copied();
        match bound.and_then(|b| s.buffers.get_mut(&b)) {
            Some(storage) if storage.len() >= bytes.len() => {
                storage[..bytes.len()].copy_from_slice(&bytes);
            }
            _ => s.invalid("pixel pack buffer"),
        }
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32, instances: u32) {
        let mut s = self.state.lock();
        s.record(DriverCall::DrawArrays(topology, first, count, instances));
        s.snapshot_draw(topology, count, instances);
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        index: IndexBinding,
        first: u32,
        count: u32,
        instances: u32,
    ) {
        let mut s = self.state.lock();
        s.record(DriverCall::DrawElements(topology, first, count, instances));
        if !s.buffers.contains_key(&index.buffer) {
            s.invalid("index buffer");
        }
        s.snapshot_draw(topology, count, instances);
    }

    fn fence_sync(&mut self) -> Result<FenceId, ResourceError> {
        let mut s = self.state.lock();
        if s.context_lost {
            return Err(ResourceError::ContextLost);
        }
        let id = FenceId(s.next_id());
        s.record(DriverCall::FenceSync(id));
        let latency = s.config.fence_latency_polls;
        s.fences.insert(id, latency);
        Ok(id)
    }

    fn fence_status(&mut self, fence: FenceId) -> FenceStatus {
        let mut s = self.state.lock();
        s.record(DriverCall::FenceStatus(fence));
        match s.fences.get_mut(&fence) {
            Some(0) => FenceStatus::Signaled,
            Some(left) => {
                *left -= 1;
                FenceStatus::Pending
            }
            // A fence that vanished with the context never signals.
            None => FenceStatus::Pending,
        }
    }

    fn delete_fence(&mut self, fence: FenceId) {
        let mut s = self.state.lock();
        s.record(DriverCall::DeleteFence(fence));
        s.fences.remove(&fence);
    }
}
