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

//! The pipeline state cache.
//!
//! Every state change the renderer makes goes through [`StateCache`], which
//! mirrors what is currently in effect on the context and only forwards a call
//! to the driver when the requested value differs. A value of `None` in the
//! mirror means "unknown", which forces the next set to be issued.

use prism_core::asset::Material;
use prism_core::math::{LinearRgba, Rect};
use prism_core::renderer::api::*;
use prism_core::renderer::GpuDriver;
use std::collections::HashMap;

/// The full blend configuration requested for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendParams {
    /// The blending preset.
    pub mode: Blending,
    /// Color equation, used by [`Blending::Custom`].
    pub equation: BlendEquation,
    /// Color source factor, used by [`Blending::Custom`].
    pub src: BlendFactor,
    /// Color destination factor, used by [`Blending::Custom`].
    pub dst: BlendFactor,
    /// Alpha equation; defaults to `equation`.
    pub equation_alpha: Option<BlendEquation>,
    /// Alpha source factor; defaults to `src`.
    pub src_alpha: Option<BlendFactor>,
    /// Alpha destination factor; defaults to `dst`.
    pub dst_alpha: Option<BlendFactor>,
    /// Constant blend color.
    pub color: LinearRgba,
    /// Constant blend alpha.
    pub alpha: f32,
    /// Whether the source color is premultiplied by alpha.
    pub premultiplied: bool,
}

impl BlendParams {
    /// A preset with no custom factors.
    pub fn preset(mode: Blending, premultiplied: bool) -> Self {
        Self {
            mode,
            equation: BlendEquation::Add,
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::OneMinusSrcAlpha,
            equation_alpha: None,
            src_alpha: None,
            dst_alpha: None,
            color: LinearRgba::BLACK,
            alpha: 0.0,
            premultiplied,
        }
    }

    /// The blend parameters of `material`. Opaque materials with the normal
    /// preset do not blend at all.
    pub fn from_material(material: &Material) -> Self {
        let mode = if material.blending == Blending::Normal && !material.transparent {
            Blending::None
        } else {
            material.blending
        };
        Self {
            mode,
            equation: material.blend_equation,
            src: material.blend_src,
            dst: material.blend_dst,
            equation_alpha: material.blend_equation_alpha,
            src_alpha: material.blend_src_alpha,
            dst_alpha: material.blend_dst_alpha,
            color: material.blend_color,
            alpha: material.blend_alpha,
            premultiplied: material.premultiplied_alpha,
        }
    }

    fn preset_state(&self) -> BlendState {
        use BlendFactor::*;
        let (src_rgb, dst_rgb, src_alpha, dst_alpha) = match (self.mode, self.premultiplied) {
            (Blending::Normal, true) => (One, OneMinusSrcAlpha, One, OneMinusSrcAlpha),
            (Blending::Normal, false) => (SrcAlpha, OneMinusSrcAlpha, One, OneMinusSrcAlpha),
            (Blending::Additive, true) => (One, One, One, One),
            (Blending::Additive, false) => (SrcAlpha, One, SrcAlpha, One),
            (Blending::Subtractive, true) => (Zero, OneMinusSrcColor, Zero, One),
            (Blending::Subtractive, false) => (Zero, OneMinusSrcColor, Zero, OneMinusSrcColor),
            (Blending::Multiply, true) => (Zero, SrcColor, Zero, SrcAlpha),
            (Blending::Multiply, false) => (Zero, SrcColor, Zero, SrcColor),
            (Blending::None | Blending::Custom, _) => (One, Zero, One, Zero),
        };
        BlendState {
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }

    fn custom_state(&self) -> BlendState {
        BlendState {
            equation_rgb: self.equation,
            equation_alpha: self.equation_alpha.unwrap_or(self.equation),
            src_rgb: self.src,
            dst_rgb: self.dst,
            src_alpha: self.src_alpha.unwrap_or(self.src),
            dst_alpha: self.dst_alpha.unwrap_or(self.dst),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct BlendMirror {
    mode: Option<Blending>,
    premultiplied: Option<bool>,
    equations: Option<(BlendEquation, BlendEquation)>,
    factors: Option<(BlendFactor, BlendFactor, BlendFactor, BlendFactor)>,
    color: Option<LinearRgba>,
}

#[derive(Debug, Default, Clone)]
struct AttributeMirror {
    bindings: HashMap<AttributeLocation, VertexAttributeBinding>,
    enabled: HashMap<AttributeLocation, bool>,
    used_this_draw: Vec<AttributeLocation>,
}

/// Mirror of the pipeline state in effect on one context.
#[derive(Debug, Default)]
pub struct StateCache {
    capabilities: HashMap<Capability, bool>,
    blend: BlendMirror,
    depth_func: Option<CompareFunction>,
    depth_write: Option<bool>,
    color_mask: Option<ColorMask>,
    stencil_func: Option<StencilFunc>,
    stencil_write_mask: Option<u32>,
    stencil_ops: Option<StencilOps>,
    cull_mode: Option<CullMode>,
    front_face: Option<FrontFace>,
    line_width: Option<f32>,
    polygon_offset: Option<PolygonOffset>,
    viewport: Option<Rect>,
    scissor: Option<Rect>,
    clear_color: Option<LinearRgba>,
    clear_depth: Option<f32>,
    clear_stencil: Option<i32>,
    program: Option<Option<ProgramId>>,
    framebuffer: Option<Option<FramebufferId>>,
    active_unit: Option<u32>,
    textures: HashMap<u32, (TextureTarget, Option<TextureId>)>,
    attributes: AttributeMirror,
}

impl StateCache {
    /// Creates a cache in the "everything unknown" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables a capability. Returns `true` if a call was issued.
    pub fn set_capability<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        capability: Capability,
        enabled: bool,
    ) -> bool {
        if self.capabilities.get(&capability) == Some(&enabled) {
            return false;
        }
        if enabled {
            driver.enable(capability);
        } else {
            driver.disable(capability);
        }
        self.capabilities.insert(capability, enabled);
        true
    }

    /// Returns the cached state of a capability, if known.
    pub fn capability(&self, capability: Capability) -> Option<bool> {
        self.capabilities.get(&capability).copied()
    }

    /// Applies a complete blend configuration.
    pub fn set_blending<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, params: &BlendParams) {
        if params.mode == Blending::None {
            self.set_capability(driver, Capability::Blend, false);
            self.blend.mode = Some(Blending::None);
            return;
        }
        self.set_capability(driver, Capability::Blend, true);

        if params.mode != Blending::Custom {
            if self.blend.mode == Some(params.mode)
                && self.blend.premultiplied == Some(params.premultiplied)
            {
                return;
            }
            let state = params.preset_state();
            self.apply_blend_state(driver, &state);
            self.set_blend_color(driver, LinearRgba::TRANSPARENT);
            self.blend.mode = Some(params.mode);
            self.blend.premultiplied = Some(params.premultiplied);
            return;
        }

        let state = params.custom_state();
        self.apply_blend_state(driver, &state);
        let color = LinearRgba {
            a: params.alpha,
            ..params.color
        };
        self.set_blend_color(driver, color);
        self.blend.mode = Some(Blending::Custom);
        self.blend.premultiplied = None;
    }

    fn apply_blend_state<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, state: &BlendState) {
        let equations = (state.equation_rgb, state.equation_alpha);
        if self.blend.equations != Some(equations) {
            driver.blend_equation_separate(equations.0, equations.1);
            self.blend.equations = Some(equations);
        }
        let factors = (state.src_rgb, state.dst_rgb, state.src_alpha, state.dst_alpha);
        if self.blend.factors != Some(factors) {
            driver.blend_func_separate(factors.0, factors.1, factors.2, factors.3);
            self.blend.factors = Some(factors);
        }
    }

    fn set_blend_color<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, color: LinearRgba) {
        if self.blend.color != Some(color) {
            driver.blend_color(color);
            self.blend.color = Some(color);
        }
    }

    /// Configures every piece of fixed-function state a material controls.
    ///
    /// `side` is the side drawn in the current pass, which differs from the
    /// material's own side during two-pass and shadow rendering.
    /// `front_face_cw` is set for objects with a mirroring world transform.
    pub fn set_material_state<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        material: &Material,
        side: Side,
        front_face_cw: bool,
    ) {
        if side == Side::Double {
            self.set_capability(driver, Capability::CullFace, false);
        } else {
            self.set_capability(driver, Capability::CullFace, true);
            self.set_cull_mode(driver, CullMode::Back);
        }
        let flip = (side == Side::Back) != front_face_cw;
        self.set_front_face(driver, if flip { FrontFace::Cw } else { FrontFace::Ccw });

        self.set_blending(driver, &BlendParams::from_material(material));

        self.set_depth_func(driver, material.depth_func);
        self.set_depth_test(driver, material.depth_test);
        self.set_depth_write(driver, material.depth_write);
        self.set_color_mask(driver, ColorMask::splat(material.color_write));

        self.set_capability(driver, Capability::StencilTest, material.stencil_write);
        if material.stencil_write {
            self.set_stencil_write_mask(driver, material.stencil_write_mask);
            self.set_stencil_func(
                driver,
                StencilFunc {
                    func: material.stencil_func,
                    reference: material.stencil_ref,
                    mask: material.stencil_func_mask,
                },
            );
            self.set_stencil_ops(
                driver,
                StencilOps {
                    fail: material.stencil_fail,
                    depth_fail: material.stencil_zfail,
                    pass: material.stencil_zpass,
                },
            );
        }

        self.set_polygon_offset(
            driver,
            material.polygon_offset,
            material.polygon_offset_factor,
            material.polygon_offset_units,
        );

        self.set_capability(
            driver,
            Capability::SampleAlphaToCoverage,
            material.alpha_to_coverage,
        );
    }

    /// Sets which faces are culled when culling is enabled.
    pub fn set_cull_mode<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, mode: CullMode) {
        if mode == CullMode::None {
            self.set_capability(driver, Capability::CullFace, false);
            return;
        }
        self.set_capability(driver, Capability::CullFace, true);
        if self.cull_mode != Some(mode) {
            driver.cull_face(mode);
            self.cull_mode = Some(mode);
        }
    }

    /// Sets the front-face winding.
    pub fn set_front_face<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, face: FrontFace) {
        if self.front_face != Some(face) {
            driver.front_face(face);
            self.front_face = Some(face);
        }
    }

    /// Enables or disables the depth test.
    pub fn set_depth_test<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, enabled: bool) {
        self.set_capability(driver, Capability::DepthTest, enabled);
    }

    /// Sets the depth comparison.
    pub fn set_depth_func<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, func: CompareFunction) {
        if self.depth_func != Some(func) {
            driver.depth_func(func);
            self.depth_func = Some(func);
        }
    }

    /// Enables or disables depth writes.
    pub fn set_depth_write<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, write: bool) {
        if self.depth_write != Some(write) {
            driver.depth_mask(write);
            self.depth_write = Some(write);
        }
    }

    /// Sets the color write mask.
    pub fn set_color_mask<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, mask: ColorMask) {
        if self.color_mask != Some(mask) {
            driver.color_mask(mask);
            self.color_mask = Some(mask);
        }
    }

    /// Sets the stencil comparison.
    pub fn set_stencil_func<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, func: StencilFunc) {
        if self.stencil_func != Some(func) {
            driver.stencil_func(func);
            self.stencil_func = Some(func);
        }
    }

    /// Sets the stencil write mask.
    pub fn set_stencil_write_mask<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, mask: u32) {
        if self.stencil_write_mask != Some(mask) {
            driver.stencil_mask(mask);
            self.stencil_write_mask = Some(mask);
        }
    }

    /// Sets the stencil operations.
    pub fn set_stencil_ops<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, ops: StencilOps) {
        if self.stencil_ops != Some(ops) {
            driver.stencil_op(ops);
            self.stencil_ops = Some(ops);
        }
    }

    /// Enables the polygon offset with the given factor and units, or
    /// disables it.
    pub fn set_polygon_offset<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        enabled: bool,
        factor: f32,
        units: f32,
    ) {
        self.set_capability(driver, Capability::PolygonOffsetFill, enabled);
        if !enabled {
            return;
        }
        let offset = PolygonOffset { factor, units };
        if self.polygon_offset != Some(offset) {
            driver.polygon_offset(factor, units);
            self.polygon_offset = Some(offset);
        }
    }

    /// Sets the rasterized line width.
    pub fn set_line_width<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, width: f32) {
        if self.line_width != Some(width) {
            driver.line_width(width);
            self.line_width = Some(width);
        }
    }

    /// Sets the viewport. Returns `true` if a call was issued.
    pub fn set_viewport<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, rect: Rect) -> bool {
        if self.viewport == Some(rect) {
            return false;
        }
        driver.viewport(rect);
        self.viewport = Some(rect);
        true
    }

    /// Sets the scissor rectangle. Returns `true` if a call was issued.
    pub fn set_scissor<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, rect: Rect) -> bool {
        if self.scissor == Some(rect) {
            return false;
        }
        driver.scissor(rect);
        self.scissor = Some(rect);
        true
    }

    /// Sets the color used by color clears.
    pub fn set_clear_color<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, color: LinearRgba) {
        if self.clear_color != Some(color) {
            driver.clear_color(color);
            self.clear_color = Some(color);
        }
    }

    /// Sets the value used by depth clears.
    pub fn set_clear_depth<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, depth: f32) {
        if self.clear_depth != Some(depth) {
            driver.clear_depth(depth);
            self.clear_depth = Some(depth);
        }
    }

    /// Sets the value used by stencil clears.
    pub fn set_clear_stencil<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, stencil: i32) {
        if self.clear_stencil != Some(stencil) {
            driver.clear_stencil(stencil);
            self.clear_stencil = Some(stencil);
        }
    }

    /// Clears the bound framebuffer. Color and depth clears only affect
    /// writable channels, so the masks are opened first.
    pub fn clear<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, flags: ClearFlags) {
        if flags.is_empty() {
            return;
        }
        if flags.contains(ClearFlags::COLOR) {
            self.set_color_mask(driver, ColorMask::ALL);
        }
        if flags.contains(ClearFlags::DEPTH) {
            self.set_depth_write(driver, true);
        }
        if flags.contains(ClearFlags::STENCIL) {
            self.set_stencil_write_mask(driver, 0xff);
        }
        driver.clear(flags);
    }

    /// Makes `program` current. Returns `true` if a call was issued, in which
    /// case uniforms shared across programs must be re-uploaded.
    pub fn use_program<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        program: Option<ProgramId>,
    ) -> bool {
        if self.program == Some(program) {
            return false;
        }
        driver.use_program(program);
        self.program = Some(program);
        true
    }

    /// The program the cache believes is current.
    pub fn current_program(&self) -> Option<ProgramId> {
        self.program.flatten()
    }

    /// Forgets the current program if it is `program`, e.g. after deletion.
    pub fn forget_program(&mut self, program: ProgramId) {
        if self.program == Some(Some(program)) {
            self.program = None;
        }
    }

    /// Binds a framebuffer (`None` is the default framebuffer). Returns `true`
    /// if a call was issued.
    pub fn bind_framebuffer<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        framebuffer: Option<FramebufferId>,
    ) -> bool {
        if self.framebuffer == Some(framebuffer) {
            return false;
        }
        driver.bind_framebuffer(framebuffer);
        self.framebuffer = Some(framebuffer);
        true
    }

    /// Selects the active texture unit.
    pub fn active_texture<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, unit: u32) {
        if self.active_unit != Some(unit) {
            driver.active_texture(unit);
            self.active_unit = Some(unit);
        }
    }

    /// Binds `texture` to `unit`. Returns `true` if a bind was issued.
    pub fn bind_texture<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        unit: u32,
        target: TextureTarget,
        texture: Option<TextureId>,
    ) -> bool {
        if self.textures.get(&unit) == Some(&(target, texture)) {
            return false;
        }
        self.active_texture(driver, unit);
        driver.bind_texture(target, texture);
        self.textures.insert(unit, (target, texture));
        true
    }

    /// Binds `texture` to the currently active unit, for uploads.
    pub fn bind_texture_for_upload<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        target: TextureTarget,
        texture: TextureId,
    ) {
        let unit = self.active_unit.unwrap_or(0);
        self.bind_texture(driver, unit, target, Some(texture));
    }

    /// Drops every binding of `texture`, e.g. after deletion.
    pub fn forget_texture(&mut self, texture: TextureId) {
        self.textures.retain(|_, (_, bound)| *bound != Some(texture));
    }

    /// Starts collecting the attributes used by the next draw.
    pub fn begin_attributes(&mut self) {
        self.attributes.used_this_draw.clear();
    }

    /// Points `location` at `binding` and enables its array, skipping both
    /// calls when already in effect.
    pub fn vertex_attribute<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        location: AttributeLocation,
        binding: &VertexAttributeBinding,
    ) -> bool {
        self.attributes.used_this_draw.push(location);
        if self.attributes.enabled.get(&location) != Some(&true) {
            driver.set_vertex_attribute_array(location, true);
            self.attributes.enabled.insert(location, true);
        }
        if self.attributes.bindings.get(&location) == Some(binding) {
            return false;
        }
        driver.vertex_attribute(location, binding);
        self.attributes.bindings.insert(location, *binding);
        true
    }

    /// Disables every enabled attribute array not used since
    /// [`begin_attributes`](Self::begin_attributes).
    pub fn disable_unused_attributes<D: GpuDriver + ?Sized>(&mut self, driver: &mut D) {
        let used = std::mem::take(&mut self.attributes.used_this_draw);
        for (location, enabled) in self.attributes.enabled.iter_mut() {
            if *enabled && !used.contains(location) {
                driver.set_vertex_attribute_array(*location, false);
                *enabled = false;
            }
        }
        self.attributes.used_this_draw = used;
    }

    /// Drops attribute bindings that source `buffer`, e.g. after deletion.
    pub fn forget_buffer(&mut self, buffer: BufferId) {
        self.attributes.bindings.retain(|_, b| b.buffer != buffer);
    }

    /// Forgets everything without touching the context. Used while the
    /// context is lost, when no call may be issued.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Forgets everything and reissues the context defaults.
    pub fn reset<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, size: Rect) {
        log::debug!("Resetting pipeline state cache");
        self.invalidate();
        for capability in Capability::ALL {
            self.set_capability(driver, capability, capability.default_enabled());
        }
        self.set_blending(driver, &BlendParams::preset(Blending::None, false));
        self.apply_blend_state(
            driver,
            &BlendState::uniform(BlendEquation::Add, BlendFactor::One, BlendFactor::Zero),
        );
        self.set_blend_color(driver, LinearRgba::TRANSPARENT);
        self.set_depth_func(driver, CompareFunction::Less);
        self.set_depth_write(driver, true);
        self.set_color_mask(driver, ColorMask::ALL);
        self.set_stencil_write_mask(driver, 0xffff_ffff);
        self.set_stencil_func(driver, StencilFunc::default());
        self.set_stencil_ops(
            driver,
            StencilOps {
                fail: StencilOperation::Keep,
                depth_fail: StencilOperation::Keep,
                pass: StencilOperation::Keep,
            },
        );
        self.set_cull_mode(driver, CullMode::Back);
        self.set_capability(driver, Capability::CullFace, false);
        self.set_front_face(driver, FrontFace::Ccw);
        self.polygon_offset = Some(PolygonOffset {
            factor: 0.0,
            units: 0.0,
        });
        driver.polygon_offset(0.0, 0.0);
        self.set_line_width(driver, 1.0);
        self.set_clear_color(driver, LinearRgba::TRANSPARENT);
        self.set_clear_depth(driver, 1.0);
        self.set_clear_stencil(driver, 0);
        self.use_program(driver, None);
        self.bind_framebuffer(driver, None);
        self.active_texture(driver, 0);
        self.set_viewport(driver, size);
        self.set_scissor(driver, size);
    }
}
