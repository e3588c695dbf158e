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

//! The program cache.
//!
//! Programs are identified by a [`ProgramKey`]: the interned stage sources
//! plus the parameters that shaped them. Materials that derive the same key
//! share one entry. Each material also keeps one binding per object variant,
//! so an unchanged material under an unchanged context skips key derivation
//! entirely.

mod key;
mod source;
mod stage;

pub use self::key::*;
pub use self::source::{assemble, prelude, program_label, stage_bodies, StageBodies};
pub use self::stage::{StageCache, StageId};

use super::state::StateCache;
use super::uniforms::ProgramUniforms;
use prism_core::asset::Material;
use prism_core::memory::{Arena, Handle};
use prism_core::renderer::api::{AttributeLocation, ProgramId, ProgramSource, ProgramStatus, ShaderStage};
use prism_core::renderer::{GpuDriver, ResourceError, ShaderError};
use prism_core::scene::ObjectFeatures;
use std::collections::HashMap;

/// Handle to a cached program.
pub type ProgramHandle = Handle<ProgramEntry>;

/// Readiness of a cached program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    /// Compiling in parallel.
    Pending,
    /// Linked and usable.
    Ready,
    /// Compilation or linking failed; draws using it are skipped.
    Failed,
}

/// A compiled program and its per-program tables.
#[derive(Debug)]
pub struct ProgramEntry {
    key: ProgramKey,
    program: ProgramId,
    state: ProgramState,
    label: String,
    uniforms: ProgramUniforms,
    attributes: HashMap<String, Option<AttributeLocation>>,
    usage_count: u32,
    last_used_frame: u64,
    source: Option<ProgramSource>,
    diagnostic: Option<ShaderError>,
}

impl ProgramEntry {
    /// The key this entry was compiled for.
    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    /// The driver program.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Current readiness.
    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Returns `true` if draws may use this program.
    pub fn is_ready(&self) -> bool {
        self.state == ProgramState::Ready
    }

    /// The diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of material bindings referencing the entry.
    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    /// The last frame a draw resolved to this entry.
    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    /// The uniform upload table.
    pub fn uniforms_mut(&mut self) -> &mut ProgramUniforms {
        &mut self.uniforms
    }

    /// The location of vertex input `name`, queried once per name.
    pub fn attribute_location<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        name: &str,
    ) -> Option<AttributeLocation> {
        if let Some(location) = self.attributes.get(name) {
            return *location;
        }
        let location = driver.attribute_location(self.program, name);
        self.attributes.insert(name.to_string(), location);
        location
    }

    /// The compile or link failure, if any.
    pub fn diagnostic(&self) -> Option<&ShaderError> {
        self.diagnostic.as_ref()
    }

    fn apply_status(&mut self, status: ProgramStatus) {
        match status {
            ProgramStatus::Pending => self.state = ProgramState::Pending,
            ProgramStatus::Ready => {
                self.state = ProgramState::Ready;
                self.source = None;
                log::debug!("Program '{}' is ready", self.label);
            }
            ProgramStatus::Failed { stage, log } => {
                self.state = ProgramState::Failed;
                let source = self.source.take().unwrap_or_else(|| ProgramSource {
                    label: self.label.clone(),
                    vertex: String::new(),
                    fragment: String::new(),
                });
                let error = ShaderError::CompilationFailed {
                    label: self.label.clone(),
                    stage,
                    log,
                    vertex_source: source.vertex,
                    fragment_source: source.fragment,
                };
                log::error!("{error}");
                self.diagnostic = Some(error);
            }
        }
    }
}

/// What a draw needs a program for.
#[derive(Debug, Clone, Copy)]
pub struct ProgramRequest<'a> {
    /// The material's handle, used to remember the binding.
    pub handle: Handle<Material>,
    /// The material.
    pub material: &'a Material,
    /// Per-object features of the drawable.
    pub object: ObjectFeatures,
    /// Whether the drawable samples shadow maps.
    pub receive_shadow: bool,
    /// Which pass variant.
    pub variant: ProgramVariant,
}

/// One binding per pass output: the transmission pre-pass and the main pass
/// resolve the same material to different programs in the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VariantKey {
    object: ObjectFeatures,
    receive_shadow: bool,
    variant: ProgramVariant,
    output: OutputKind,
}

#[derive(Debug, Clone, Copy)]
struct MaterialBinding {
    program: ProgramHandle,
    material_version: u64,
    signature: u64,
}

/// Behavior switches of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCacheSettings {
    /// Leave programs pending until polled when the driver compiles in parallel.
    pub async_compile: bool,
    /// Query the compile status at all. When off, programs are assumed ready.
    pub check_errors: bool,
}

impl Default for ProgramCacheSettings {
    fn default() -> Self {
        Self {
            async_compile: false,
            check_errors: true,
        }
    }
}

/// Shares compiled programs between functionally identical materials.
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: Arena<ProgramEntry>,
    by_key: HashMap<ProgramKey, ProgramHandle>,
    stages: StageCache,
    bindings: HashMap<(Handle<Material>, VariantKey), MaterialBinding>,
    settings: ProgramCacheSettings,
    compilations: u64,
}

impl ProgramCache {
    /// Creates an empty cache.
    pub fn new(settings: ProgramCacheSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Updates the behavior switches. Existing entries are unaffected.
    pub fn set_settings(&mut self, settings: ProgramCacheSettings) {
        self.settings = settings;
    }

    /// Resolves the program for `request` under `context`.
    ///
    /// The binding remembered for the material variant is reused when the
    /// material version and the context signature are unchanged. Otherwise the
    /// key is derived again; a binding that moves to another entry releases
    /// its previous one.
    pub fn resolve<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        request: &ProgramRequest<'_>,
        context: &ProgramContext,
        frame: u64,
    ) -> Result<ProgramHandle, ResourceError> {
        let variant = VariantKey {
            object: request.object,
            receive_shadow: request.receive_shadow,
            variant: request.variant,
            output: context.output,
        };
        let binding_key = (request.handle, variant);
        let signature = context.signature();
        let previous = self.bindings.get(&binding_key).copied();

        if let Some(binding) = previous {
            if binding.material_version == request.material.version
                && binding.signature == signature
            {
                if let Some(entry) = self.entries.get_mut(binding.program) {
                    entry.last_used_frame = frame;
                    return Ok(binding.program);
                }
            }
        }

        let key_and_sources = self.derive_key(request, context);
        let (key, sources) = match key_and_sources {
            Ok(v) => v,
            Err(err) => {
                self.stages.purge_unused();
                return Err(err.into());
            }
        };

        let handle = match self.by_key.get(&key) {
            Some(handle) => {
                log::debug!("Program cache hit for material '{}'", request.material.name);
                *handle
            }
            None => match self.compile(driver, key, sources) {
                Ok(handle) => handle,
                Err(err) => {
                    self.stages.purge_unused();
                    return Err(err);
                }
            },
        };

        match previous {
            Some(binding) if binding.program == handle => {}
            Some(binding) => {
                self.acquire(handle);
                self.release(driver, state, binding.program);
            }
            None => self.acquire(handle),
        }
        self.bindings.insert(
            binding_key,
            MaterialBinding {
                program: handle,
                material_version: request.material.version,
                signature,
            },
        );
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.last_used_frame = frame;
        }
        Ok(handle)
    }

    fn derive_key(
        &mut self,
        request: &ProgramRequest<'_>,
        context: &ProgramContext,
    ) -> Result<(ProgramKey, ProgramSource), ShaderError> {
        let material = request.material;
        let parameters =
            ProgramParameters::derive(material, &request.object, request.variant, context)
                .with_receive_shadow(request.receive_shadow);
        let bodies = stage_bodies(parameters.template, material)?;
        let vertex = assemble(&parameters, ShaderStage::Vertex, &bodies.vertex);
        let fragment = assemble(&parameters, ShaderStage::Fragment, &bodies.fragment);
        let label = program_label(&parameters, material);
        let key = ProgramKey {
            vertex: self.stages.id_of(&vertex),
            fragment: self.stages.id_of(&fragment),
            parameters,
            custom_key: material.custom_program_cache_key.clone(),
        };
        Ok((
            key,
            ProgramSource {
                label,
                vertex,
                fragment,
            },
        ))
    }

    fn compile<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        key: ProgramKey,
        source: ProgramSource,
    ) -> Result<ProgramHandle, ResourceError> {
        let program = driver.create_program(&source)?;
        self.compilations += 1;
        log::info!("Compiling program '{}'", source.label);

        let parallel = self.settings.async_compile && driver.capabilities().parallel_shader_compile;
        let mut entry = ProgramEntry {
            key: key.clone(),
            program,
            state: ProgramState::Pending,
            label: source.label.clone(),
            uniforms: ProgramUniforms::new(program),
            attributes: HashMap::new(),
            usage_count: 0,
            last_used_frame: 0,
            source: Some(source),
            diagnostic: None,
        };
        if !self.settings.check_errors {
            entry.apply_status(ProgramStatus::Ready);
        } else if !parallel {
            // Without parallel compilation the first status query blocks
            // until the link finishes.
            let mut status = driver.program_status(program);
            while status == ProgramStatus::Pending {
                status = driver.program_status(program);
            }
            entry.apply_status(status);
        }

        self.stages.acquire(key.vertex);
        self.stages.acquire(key.fragment);
        let handle = self.entries.insert(entry);
        self.by_key.insert(key, handle);
        Ok(handle)
    }

    fn acquire(&mut self, handle: ProgramHandle) {
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.usage_count += 1;
        }
    }

    fn release<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: ProgramHandle,
    ) {
        let Some(entry) = self.entries.get_mut(handle) else {
            return;
        };
        entry.usage_count = entry.usage_count.saturating_sub(1);
        if entry.usage_count > 0 {
            return;
        }
        if let Some(entry) = self.entries.remove(handle) {
            log::debug!("Evicting program '{}'", entry.label);
            driver.delete_program(entry.program);
            state.forget_program(entry.program);
            self.stages.release(entry.key.vertex);
            self.stages.release(entry.key.fragment);
            self.by_key.remove(&entry.key);
        }
    }

    /// Drops every binding of a disposed material, evicting programs no
    /// other material references.
    pub fn release_material<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        material: Handle<Material>,
    ) {
        let released: Vec<ProgramHandle> = self
            .bindings
            .iter()
            .filter(|((m, _), _)| *m == material)
            .map(|(_, binding)| binding.program)
            .collect();
        self.bindings.retain(|(m, _), _| *m != material);
        for handle in released {
            self.release(driver, state, handle);
        }
    }

    /// Polls pending programs. Returns how many finished.
    pub fn poll_pending<D: GpuDriver + ?Sized>(&mut self, driver: &mut D) -> usize {
        let mut finished = 0;
        for (_, entry) in self.entries.iter_mut() {
            if entry.state != ProgramState::Pending {
                continue;
            }
            let status = driver.program_status(entry.program);
            if status != ProgramStatus::Pending {
                finished += 1;
            }
            entry.apply_status(status);
        }
        finished
    }

    /// Returns `true` if any program is still compiling.
    pub fn has_pending(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, entry)| entry.state == ProgramState::Pending)
    }

    /// Forgets every entry without deleting driver objects, which died with
    /// the context.
    pub fn invalidate(&mut self) {
        self.entries.drain();
        self.by_key.clear();
        self.bindings.clear();
        self.stages.clear();
    }

    /// Resolves a handle.
    pub fn get(&self, handle: ProgramHandle) -> Option<&ProgramEntry> {
        self.entries.get(handle)
    }

    /// Resolves a handle mutably.
    pub fn get_mut(&mut self, handle: ProgramHandle) -> Option<&mut ProgramEntry> {
        self.entries.get_mut(handle)
    }

    /// The diagnostic of a failed program.
    pub fn program_diagnostic(&self, handle: ProgramHandle) -> Option<&ShaderError> {
        self.entries.get(handle).and_then(ProgramEntry::diagnostic)
    }

    /// Every failure currently cached.
    pub fn diagnostics(&self) -> impl Iterator<Item = &ShaderError> {
        self.entries.iter().filter_map(|(_, e)| e.diagnostic())
    }

    /// The usage count of `handle`, or `None` once evicted.
    pub fn usage_count(&self, handle: ProgramHandle) -> Option<u32> {
        self.entries.get(handle).map(ProgramEntry::usage_count)
    }

    /// Number of resident programs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no program is resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of programs created since the cache was built.
    pub fn compilations(&self) -> u64 {
        self.compilations
    }

    /// The interned stage sources.
    pub fn stages(&self) -> &StageCache {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::asset::MaterialKind;
    use prism_core::math::LinearRgba;
    use prism_core::renderer::api::{ColorSpace, FogKind};
    use prism_core::renderer::{DriverCapabilities, LightCounts};
    use prism_infra::{HeadlessConfig, HeadlessDriver};

    struct Fixture {
        driver: HeadlessDriver,
        state: StateCache,
        cache: ProgramCache,
        materials: Arena<Material>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                driver: HeadlessDriver::default(),
                state: StateCache::new(),
                cache: ProgramCache::new(ProgramCacheSettings::default()),
                materials: Arena::new(),
            }
        }

        fn resolve_with(
            &mut self,
            handle: Handle<Material>,
            object: ObjectFeatures,
            context: &ProgramContext,
        ) -> ProgramHandle {
            let material = self.materials.get(handle).unwrap();
            let request = ProgramRequest {
                handle,
                material,
                object,
                receive_shadow: false,
                variant: ProgramVariant::Forward,
            };
            self.cache
                .resolve(&mut self.driver, &mut self.state, &request, context, 1)
                .unwrap()
        }

        fn resolve(&mut self, handle: Handle<Material>, context: &ProgramContext) -> ProgramHandle {
            self.resolve_with(handle, ObjectFeatures::default(), context)
        }
    }

    fn lit(point: u32) -> ProgramContext {
        ProgramContext {
            lights: LightCounts {
                point,
                ..Default::default()
            },
            light_version: point as u64,
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_materials_share_one_entry() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let b = f.materials.insert(Material::standard(LinearRgba::rgb(1.0, 0.0, 0.0)));
        let ctx = lit(1);
        let pa = f.resolve(a, &ctx);
        let pb = f.resolve(b, &ctx);
        assert_eq!(pa, pb);
        assert_eq!(f.cache.usage_count(pa), Some(2));
        assert_eq!(f.driver.count("create_program"), 1);
    }

    #[test]
    fn test_signature_change_moves_binding() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let b = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let one = f.resolve(a, &lit(1));
        f.resolve(b, &lit(1));
        assert_eq!(f.cache.usage_count(one), Some(2));

        let two = f.resolve(a, &lit(2));
        assert_ne!(one, two);
        assert_eq!(f.cache.usage_count(one), Some(1));
        assert_eq!(f.cache.usage_count(two), Some(1));
    }

    #[test]
    fn test_pass_outputs_keep_separate_bindings() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let main = lit(1);
        let prepass = main.with_output(OutputKind::Intermediate);

        for _ in 0..3 {
            let final_program = f.resolve(a, &main);
            let intermediate = f.resolve(a, &prepass);
            assert_ne!(final_program, intermediate);
            assert_eq!(f.cache.usage_count(final_program), Some(1));
            assert_eq!(f.cache.usage_count(intermediate), Some(1));
        }
        assert_eq!(f.driver.count("create_program"), 2);
        assert_eq!(f.driver.count("delete_program"), 0);
    }

    #[test]
    fn test_unchanged_material_takes_fast_path() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let ctx = lit(1);
        let first = f.resolve(a, &ctx);
        let stages = f.cache.stages().len();
        let second = f.resolve(a, &ctx);
        assert_eq!(first, second);
        assert_eq!(f.cache.usage_count(first), Some(1));
        assert_eq!(f.cache.stages().len(), stages);
    }

    #[test]
    fn test_context_change_invalidates_fast_path() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let ctx = lit(1);
        let plain = f.resolve(a, &ctx);

        // Neither the material version nor the light version changes here.
        let fogged = ProgramContext {
            fog: FogKind::Linear,
            ..ctx
        };
        assert_ne!(f.resolve(a, &fogged), plain);

        let linear_out = ProgramContext {
            output_color_space: ColorSpace::LinearSrgb,
            ..ctx
        };
        let p = f.resolve(a, &linear_out);
        let entry = f.cache.get(p).unwrap();
        assert_eq!(entry.key().parameters.output_color_space, ColorSpace::LinearSrgb);
    }

    #[test]
    fn test_material_version_bump_rederives_key() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let ctx = lit(0);
        let before = f.resolve(a, &ctx);
        {
            let m = f.materials.get_mut(a).unwrap();
            m.vertex_colors = true;
            m.version += 1;
        }
        let after = f.resolve(a, &ctx);
        assert_ne!(before, after);
        assert!(f.cache.get(before).is_none());
        assert_eq!(f.driver.count("delete_program"), 1);
    }

    #[test]
    fn test_object_variants_coexist() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::standard(LinearRgba::WHITE));
        let ctx = lit(0);
        let plain = f.resolve(a, &ctx);
        let skinned = f.resolve_with(
            a,
            ObjectFeatures {
                skinning: true,
                bone_count: 4,
                ..Default::default()
            },
            &ctx,
        );
        assert_ne!(plain, skinned);
        assert!(f.cache.get(plain).is_some());
        assert_eq!(f.resolve(a, &ctx), plain);
        assert_eq!(f.driver.count("create_program"), 2);
    }

    #[test]
    fn test_custom_sources_do_not_collide() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::custom(
            "in vec3 position;\nvoid main() { gl_Position = vec4(position, 1.0); }",
            "out vec4 c;\nvoid main() { c = vec4(1.0); }",
        ));
        let b = f.materials.insert(Material::custom(
            "in vec3 position;\nvoid main() { gl_Position = vec4(position, 1.0); }",
            "out vec4 c;\nvoid main() { c = vec4(0.5); }",
        ));
        let ctx = ProgramContext::default();
        assert_ne!(f.resolve(a, &ctx), f.resolve(b, &ctx));
    }

    #[test]
    fn test_release_material_evicts_and_recompiles() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::basic(LinearRgba::WHITE));
        let ctx = ProgramContext::default();
        let first = f.resolve(a, &ctx);
        let program = f.cache.get(first).unwrap().program();
        f.state.use_program(&mut f.driver, Some(program));

        f.cache.release_material(&mut f.driver, &mut f.state, a);
        assert!(f.cache.is_empty());
        assert!(f.cache.stages().is_empty());
        assert_eq!(f.state.current_program(), None);
        assert_eq!(f.driver.live_programs(), 0);

        let b = f.materials.insert(Material::basic(LinearRgba::WHITE));
        let second = f.resolve(b, &ctx);
        assert_ne!(first, second);
        assert_eq!(f.driver.count("create_program"), 2);
    }

    #[test]
    fn test_failed_program_keeps_diagnostic() {
        let mut f = Fixture::new();
        let mut material = Material::custom("void main() {}", "#error broken\nvoid main() {}");
        material.name = "broken".into();
        let a = f.materials.insert(material);
        let p = f.resolve(a, &ProgramContext::default());
        let entry = f.cache.get(p).unwrap();
        assert_eq!(entry.state(), ProgramState::Failed);
        match f.cache.program_diagnostic(p) {
            Some(ShaderError::CompilationFailed {
                label,
                stage,
                fragment_source,
                ..
            }) => {
                assert_eq!(label, "custom:broken");
                assert_eq!(*stage, Some(ShaderStage::Fragment));
                assert!(fragment_source.contains("#error broken"));
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_missing_custom_source_is_an_error() {
        let mut f = Fixture::new();
        let a = f.materials.insert(Material::new(MaterialKind::Custom));
        let material = f.materials.get(a).unwrap();
        let request = ProgramRequest {
            handle: a,
            material,
            object: ObjectFeatures::default(),
            receive_shadow: false,
            variant: ProgramVariant::Forward,
        };
        let err = f
            .cache
            .resolve(&mut f.driver, &mut f.state, &request, &ProgramContext::default(), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Shader(ShaderError::MissingSource { .. })
        ));
        assert!(f.cache.stages().is_empty());
    }

    #[test]
    fn test_async_compile_stays_pending_until_polled() {
        let mut f = Fixture::new();
        f.driver = HeadlessDriver::new(HeadlessConfig {
            capabilities: DriverCapabilities {
                parallel_shader_compile: true,
                ..Default::default()
            },
            compile_latency_polls: 2,
            ..Default::default()
        });
        f.cache = ProgramCache::new(ProgramCacheSettings {
            async_compile: true,
            check_errors: true,
        });
        let a = f.materials.insert(Material::basic(LinearRgba::WHITE));
        let p = f.resolve(a, &ProgramContext::default());
        assert_eq!(f.cache.get(p).unwrap().state(), ProgramState::Pending);
        assert_eq!(f.cache.poll_pending(&mut f.driver), 0);
        assert_eq!(f.cache.poll_pending(&mut f.driver), 0);
        assert_eq!(f.cache.poll_pending(&mut f.driver), 1);
        assert!(f.cache.get(p).unwrap().is_ready());
        assert!(!f.cache.has_pending());
    }
}
