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


//! Defines the Renderer, the central orchestrator for the rendering subsystem.

use super::frame::{FramePhase, FrameState};
use super::readback::{PixelReadback, ReadbackError, ReadbackQueue};
use super::resources::{ManagedResource, ResourceCounts};
use prism_core::asset::{RenderResource, ResourceStore};
use prism_core::config::RendererConfig;
use prism_core::math::Rect;
use prism_core::memory::Handle;
use prism_core::renderer::api::{FramebufferId, Side, TextureFormat};
use prism_core::renderer::{GpuDriver, RenderError, RenderInfo, ShaderError};
use prism_core::scene::{Camera, OutputTarget, Scene};
use prism_lanes::{
    casts_shadow_with, Bucket, ForwardLane, FrameInputs, FrameOutputs, GpuContext, OutputKind,
    ProgramCacheSettings, ProgramContext, ProgramRequest, ProgramVariant, RenderLane, RenderList,
    ShadowKind, ShadowPassLane, TransmissionLane,
};
use std::time::{Duration, Instant};

fn cache_settings(config: &RendererConfig) -> ProgramCacheSettings {
    ProgramCacheSettings {
        async_compile: config.async_compile,
        check_errors: config.check_shader_errors,
    }
}

/// Renders scenes through one graphics context.
///
/// The renderer owns every cache of its context (pipeline state, programs,
/// textures, buffers, framebuffers) together with the logical resources the
/// application registered. Two renderers never share any of it.
///
/// A frame runs its lanes in order: shadow maps, the transmission
/// background, then the main pass. Each lane reads the same sorted render
/// list, built once at the start of the frame.
pub struct Renderer<D: GpuDriver> {
    // Caches and tables of the graphics context.
    ctx: GpuContext<D>,
    // Logical resources registered by the application.
    store: ResourceStore,
    config: RendererConfig,
    // Passes, run in order every frame.
    lanes: Vec<Box<dyn RenderLane<D>>>,
    // Rebuilt every frame, kept to reuse its allocations.
    list: RenderList,
    frame: FrameState,
    readbacks: ReadbackQueue,
    // Size of the default framebuffer.
    size: (u32, u32),
    // Set from a context loss until the context is restored.
    context_lost: bool,
    // --- Metrics ---
    // Duration of the last render() call.
    last_frame_time: Duration,
    // Sum of the lanes' cost estimates for the last frame.
    last_frame_cost: f32,
}

impl<D: GpuDriver + 'static> Renderer<D> {
    /// Creates a renderer drawing through `driver`.
    pub fn new(driver: D, config: RendererConfig) -> Self {
        let config = config.sanitized();
        log::info!(
            "Renderer: created (async compile: {}, shadows: {})",
            config.async_compile && driver.capabilities().parallel_shader_compile,
            config.shadow_map.enabled
        );
        let lanes: Vec<Box<dyn RenderLane<D>>> = vec![
            Box::new(ShadowPassLane::new()),
            Box::new(TransmissionLane::new()),
            Box::new(ForwardLane::new()),
        ];
        Self {
            ctx: GpuContext::new(driver, cache_settings(&config)),
            store: ResourceStore::new(),
            config,
            lanes,
            list: RenderList::new(),
            frame: FrameState::new(),
            readbacks: ReadbackQueue::new(),
            size: (1, 1),
            context_lost: false,
            last_frame_time: Duration::ZERO,
            last_frame_cost: 0.0,
        }
    }

    /// Adds a lane run after the existing ones.
    pub fn add_lane(&mut self, lane: Box<dyn RenderLane<D>>) {
        self.lanes.push(lane);
    }

    /// The lanes in the order they run.
    pub fn lanes(&self) -> &[Box<dyn RenderLane<D>>] {
        &self.lanes
    }

    /// Sets the size of the default framebuffer.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.size != (width, height) {
            log::debug!("Renderer: output resized to {width}x{height}");
            self.size = (width, height);
        }
    }

    /// Size of the default framebuffer.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// The settings.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The settings, mutably. Changes apply from the next frame.
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// Statistics of the last frame and resident object counts.
    pub fn info(&self) -> &RenderInfo {
        &self.ctx.info
    }

    /// The caches of the graphics context.
    pub fn context(&self) -> &GpuContext<D> {
        &self.ctx
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.ctx.driver
    }

    /// The phase of the frame in progress.
    pub fn phase(&self) -> FramePhase {
        self.frame.phase()
    }

    /// Duration of the last frame on the CPU.
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }

    /// Sum of the lanes' cost estimates for the last frame.
    pub fn last_frame_cost(&self) -> f32 {
        self.last_frame_cost
    }

    /// Diagnostics of programs that failed to compile or link.
    pub fn program_diagnostics(&self) -> impl Iterator<Item = &ShaderError> {
        self.ctx.programs.diagnostics()
    }

    // --- Resources ---

    /// Stores a logical resource. GPU objects are created on first use.
    pub fn register_resource<R: RenderResource>(&mut self, resource: R) -> Handle<R> {
        let handle = self.store.insert(resource);
        log::debug!("Renderer: registered {} {:?}", R::KIND, handle);
        handle
    }

    /// A registered resource.
    pub fn resource<R: RenderResource>(&self, handle: Handle<R>) -> Option<&R> {
        self.store.get(handle)
    }

    /// Modifies a registered resource and bumps its version, so the GPU side
    /// is refreshed on next use.
    ///
    /// ## Errors
    /// * `RenderError::InvalidHandle` - If the resource was disposed.
    pub fn update_resource<R: RenderResource>(
        &mut self,
        handle: Handle<R>,
        update: impl FnOnce(&mut R),
    ) -> Result<(), RenderError> {
        let resource = self
            .store
            .get_mut(handle)
            .ok_or(RenderError::InvalidHandle { kind: R::KIND })?;
        update(resource);
        resource.bump_version();
        Ok(())
    }

    /// Removes a resource and releases its GPU objects. Programs only used by
    /// a disposed material are evicted.
    ///
    /// ## Errors
    /// * `RenderError::InvalidHandle` - If the resource was already disposed.
    pub fn dispose_resource<R: ManagedResource>(
        &mut self,
        handle: Handle<R>,
    ) -> Result<R, RenderError> {
        let resource = self
            .store
            .remove(handle)
            .ok_or(RenderError::InvalidHandle { kind: R::KIND })?;
        R::release_gpu(&mut self.ctx, handle);
        self.ctx.refresh_info();
        log::debug!("Renderer: disposed {} {:?}", R::KIND, handle);
        Ok(resource)
    }

    /// The registered logical resources.
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Counts of registered logical resources.
    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts::of(&self.store)
    }

    // --- Context loss ---

    /// Returns `true` between a context loss and its restoration.
    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    /// Drops every GPU cache after the context was lost. Pending read-backs
    /// fail. Logical resources are kept and uploaded again once the context
    /// is back.
    pub fn notify_context_lost(&mut self) {
        if self.context_lost {
            return;
        }
        log::info!("Renderer: context lost, dropping GPU caches");
        self.context_lost = true;
        self.ctx.invalidate();
        self.readbacks.fail_all(ReadbackError::ContextLost);
    }

    /// Resumes rendering on a restored context. Caches start empty and the
    /// context defaults are reissued.
    pub fn notify_context_restored(&mut self) {
        if !self.context_lost {
            return;
        }
        if self.ctx.driver.is_context_lost() {
            log::warn!("Renderer: restore notified while the driver still reports a lost context");
            return;
        }
        log::info!("Renderer: context restored");
        self.context_lost = false;
        self.ctx.invalidate();
        let size = Rect::from_size(self.size.0, self.size.1);
        let GpuContext { driver, state, .. } = &mut self.ctx;
        state.reset(driver, size);
    }

    fn check_context(&mut self) -> Result<(), RenderError> {
        if self.ctx.driver.is_context_lost() {
            self.notify_context_lost();
            return Err(RenderError::ContextLost);
        }
        if self.context_lost {
            self.notify_context_restored();
        }
        Ok(())
    }

    // --- Frames ---

    /// Renders `scene` seen by `camera` into `target`.
    ///
    /// Draws whose program is still compiling or failed are skipped; the
    /// rest of the frame is unaffected.
    ///
    /// ## Errors
    /// * `RenderError::NestedFrame` - If a frame is already in progress.
    /// * `RenderError::ContextLost` - If the context is lost. Caches are
    ///   dropped and rebuilt on the first frame after restoration.
    /// * `RenderError::InvalidHandle` - If `target` was disposed.
    pub fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: OutputTarget,
    ) -> Result<(), RenderError> {
        self.frame.begin()?;
        let started = Instant::now();
        let result = self.render_frame(scene, camera, target);
        self.frame.finish();
        self.last_frame_time = started.elapsed();

        match &result {
            Err(RenderError::ContextLost) => self.notify_context_lost(),
            _ => {
                self.poll_readbacks();
            }
        }
        self.ctx.refresh_info();
        log::trace!(
            "Renderer: frame {} done in {:?} ({} draws)",
            self.ctx.frame,
            self.last_frame_time,
            self.ctx.info.draw_calls
        );
        result
    }

    fn begin_frame(&mut self, scene: &Scene, camera: &Camera) -> Result<(), RenderError> {
        self.check_context()?;
        self.ctx.programs.set_settings(cache_settings(&self.config));
        let finished = self.ctx.programs.poll_pending(&mut self.ctx.driver);
        if finished > 0 {
            log::debug!("Renderer: {finished} program(s) finished compiling");
        }
        self.ctx.lights.update(&scene.lights);
        self.list
            .build(scene, camera, &self.store, self.config.sort_objects);
        Ok(())
    }

    fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: OutputTarget,
    ) -> Result<(), RenderError> {
        self.ctx.frame += 1;
        self.ctx.info.reset_frame();
        self.ctx.info.frame = self.ctx.frame;
        self.begin_frame(scene, camera)?;
        let (framebuffer, output) = self.resolve_output(target)?;

        let program_context = ProgramContext::for_frame(
            &self.config,
            self.ctx.lights.version(),
            self.ctx.lights.counts(),
            scene,
        );
        let inputs = FrameInputs {
            scene,
            camera,
            list: &self.list,
            config: &self.config,
            program_context,
            framebuffer,
            output,
        };
        let mut outputs = FrameOutputs::default();
        let mut cost = 0.0;
        for lane in self.lanes.iter_mut() {
            self.frame.advance(FramePhase::for_lane(lane.strategy_name()));
            cost += lane.estimate_cost(&inputs);
            lane.render(&mut self.ctx, &mut self.store, &inputs, &mut outputs)?;
        }
        self.last_frame_cost = cost;
        Ok(())
    }

    /// The framebuffer and full-size rectangle of `target`.
    fn resolve_output(
        &mut self,
        target: OutputTarget,
    ) -> Result<(Option<FramebufferId>, Rect), RenderError> {
        match target {
            OutputTarget::Screen => Ok((None, Rect::from_size(self.size.0, self.size.1))),
            OutputTarget::RenderTarget(handle) => {
                let GpuContext {
                    driver,
                    state,
                    targets,
                    ..
                } = &mut self.ctx;
                let gpu = targets.update(driver, state, &self.store.render_targets, handle)?;
                let framebuffer = gpu.framebuffer;
                let descriptor = &self
                    .store
                    .render_targets
                    .get(handle)
                    .ok_or(RenderError::InvalidHandle {
                        kind: "render target",
                    })?
                    .descriptor;
                Ok((
                    Some(framebuffer),
                    Rect::from_size(descriptor.width, descriptor.height),
                ))
            }
        }
    }

    /// Compiles every program `scene` needs without drawing anything.
    /// Returns how many programs were compiled.
    ///
    /// With asynchronous compilation the programs may still be pending when
    /// this returns; they become ready during later frames.
    ///
    /// ## Errors
    /// * `RenderError::NestedFrame` - If a frame is in progress.
    /// * `RenderError::ContextLost` - If the context is lost.
    pub fn compile(&mut self, scene: &Scene, camera: &Camera) -> Result<u64, RenderError> {
        self.frame.begin()?;
        let result = self.compile_programs(scene, camera);
        self.frame.finish();
        if let Err(RenderError::ContextLost) = result {
            self.notify_context_lost();
        }
        self.ctx.refresh_info();
        result
    }

    fn compile_programs(&mut self, scene: &Scene, camera: &Camera) -> Result<u64, RenderError> {
        self.begin_frame(scene, camera)?;
        let context = ProgramContext::for_frame(
            &self.config,
            self.ctx.lights.version(),
            self.ctx.lights.counts(),
            scene,
        );
        let intermediate = context.with_output(OutputKind::Intermediate);
        let casters = self.ctx.lights.shadow_casters();
        let shadows = self.config.shadow_map.enabled;
        let depth_maps = shadows && casters.iter().any(|c| c.kind != ShadowKind::Point);
        let distance_maps = shadows && casters.iter().any(|c| c.kind == ShadowKind::Point);
        let transmission = !self.list.transmissive().is_empty();

        let GpuContext {
            driver,
            state,
            programs,
            frame,
            ..
        } = &mut self.ctx;
        let before = programs.compilations();
        for item in self.list.iter() {
            let drawable = RenderList::drawable(scene, item);
            let material = self
                .store
                .materials
                .get(item.material)
                .ok_or(RenderError::InvalidHandle { kind: "material" })?;

            let mut variants = vec![(ProgramVariant::Forward, &context)];
            let in_background = match Bucket::of(material) {
                Bucket::Opaque => true,
                Bucket::Transmissive => material.side == Side::Double,
                Bucket::Transparent => false,
            };
            if transmission && in_background {
                variants.push((ProgramVariant::Forward, &intermediate));
            }
            if drawable.cast_shadow && casts_shadow_with(material) {
                if depth_maps {
                    variants.push((ProgramVariant::Depth, &intermediate));
                }
                if distance_maps {
                    variants.push((ProgramVariant::Distance, &intermediate));
                }
            }

            for (variant, program_context) in variants {
                let request = ProgramRequest {
                    handle: item.material,
                    material,
                    object: drawable.features,
                    receive_shadow: drawable.receive_shadow,
                    variant,
                };
                programs.resolve(driver, state, &request, program_context, *frame)?;
            }
        }
        let compiled = programs.compilations() - before;
        log::info!("Renderer: pre-compiled {compiled} program(s)");
        Ok(compiled)
    }

    // --- Read-back ---

    /// Starts copying `rect` of `target` without waiting for the GPU.
    ///
    /// The returned future resolves once [`Renderer::poll_readbacks`] sees
    /// the copy complete. Pixels are RGBA8 for the screen, or the first color
    /// format of a render target.
    ///
    /// ## Errors
    /// * `ReadbackError::OutOfBounds` - If `rect` leaves the target.
    /// * `ReadbackError::ContextLost` - If the context is lost.
    pub fn read_pixels_async(
        &mut self,
        rect: Rect,
        target: OutputTarget,
    ) -> Result<PixelReadback, ReadbackError> {
        if self.context_lost || self.ctx.driver.is_context_lost() {
            return Err(ReadbackError::ContextLost);
        }
        let format = match target {
            OutputTarget::Screen => TextureFormat::Rgba8,
            OutputTarget::RenderTarget(handle) => self
                .store
                .render_targets
                .get(handle)
                .and_then(|t| t.descriptor.color_formats.first().copied())
                .ok_or(ReadbackError::NoColorAttachment)?,
        };
        let (framebuffer, bounds) = self.resolve_output(target)?;
        let right = rect.x.checked_add(rect.width);
        let top = rect.y.checked_add(rect.height);
        let fits = rect.x >= 0
            && rect.y >= 0
            && rect.width > 0
            && rect.height > 0
            && right.is_some_and(|r| r <= bounds.width)
            && top.is_some_and(|t| t <= bounds.height);
        if !fits {
            return Err(ReadbackError::OutOfBounds {
                rect,
                width: bounds.width as u32,
                height: bounds.height as u32,
            });
        }

        let GpuContext { driver, state, .. } = &mut self.ctx;
        state.bind_framebuffer(driver, framebuffer);
        Ok(self.readbacks.submit(driver, rect, format)?)
    }

    /// Resolves the read-backs whose copy completed. Called at the end of
    /// every frame; hosts also call it on a timer of
    /// [`Renderer::readback_poll_interval`] while waiting.
    pub fn poll_readbacks(&mut self) -> usize {
        if self.context_lost {
            return 0;
        }
        self.readbacks.poll(&mut self.ctx.driver)
    }

    /// Number of read-backs still waiting for the GPU.
    pub fn pending_readbacks(&self) -> usize {
        self.readbacks.len()
    }

    /// Interval at which the host should call [`Renderer::poll_readbacks`].
    pub fn readback_poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.readback_poll_interval_ms)
    }
}
