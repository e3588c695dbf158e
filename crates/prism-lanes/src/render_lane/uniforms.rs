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

//! The uniform upload cache.

use prism_core::renderer::api::{ProgramId, UniformLocation};
use prism_core::renderer::uniform::{FlatUniform, UniformKind};
use prism_core::renderer::{FloatLayout, GpuDriver, UniformValue};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct UniformSlot {
    location: UniformLocation,
    floats: Vec<f32>,
    ints: Vec<i32>,
    uploaded: bool,
}

impl UniformSlot {
    fn new(location: UniformLocation) -> Self {
        Self {
            location,
            floats: Vec::new(),
            ints: Vec::new(),
            uploaded: false,
        }
    }
}

/// The uniform location table of one program, with the last value uploaded
/// to each location.
///
/// Locations are resolved lazily by name; a name the program does not use is
/// remembered as inactive so the driver is only asked once.
#[derive(Debug)]
pub struct ProgramUniforms {
    program: ProgramId,
    slots: HashMap<String, Option<UniformSlot>>,
    scratch: FlatUniform,
}

impl ProgramUniforms {
    /// Creates an empty table for `program`.
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            slots: HashMap::new(),
            scratch: FlatUniform::default(),
        }
    }

    /// The program this table belongs to.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    fn slot<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, name: &str) -> Option<&mut UniformSlot> {
        if !self.slots.contains_key(name) {
            let slot = driver
                .uniform_location(self.program, name)
                .map(UniformSlot::new);
            self.slots.insert(name.to_string(), slot);
        }
        self.slots.get_mut(name).and_then(Option::as_mut)
    }

    /// Returns `true` if the program declares an active uniform `name`.
    pub fn is_active<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, name: &str) -> bool {
        self.slot(driver, name).is_some()
    }

    /// Uploads float data unless it equals the cached value element by
    /// element. Returns `true` if an upload was issued.
    pub fn set_f32<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        name: &str,
        layout: FloatLayout,
        data: &[f32],
    ) -> bool {
        let Some(slot) = self.slot(driver, name) else {
            return false;
        };
        if slot.uploaded && slot.floats.as_slice() == data {
            return false;
        }
        driver.uniform_f32(slot.location, layout, data);
        slot.floats.clear();
        slot.floats.extend_from_slice(data);
        slot.uploaded = true;
        true
    }

    /// Uploads integer data unless it equals the cached value. Returns `true`
    /// if an upload was issued.
    pub fn set_i32<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, name: &str, data: &[i32]) -> bool {
        let Some(slot) = self.slot(driver, name) else {
            return false;
        };
        if slot.uploaded && slot.ints.as_slice() == data {
            return false;
        }
        driver.uniform_i32(slot.location, data);
        slot.ints.clear();
        slot.ints.extend_from_slice(data);
        slot.uploaded = true;
        true
    }

    /// Uploads an already flattened value. Sampler values must be resolved
    /// to texture units by the caller and uploaded with
    /// [`set_i32`](Self::set_i32).
    pub fn set_flat<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, name: &str, flat: &FlatUniform) -> bool {
        match flat.kind {
            Some(UniformKind::Float(layout)) => self.set_f32(driver, name, layout, &flat.floats),
            Some(UniformKind::Int) => self.set_i32(driver, name, &flat.ints),
            Some(UniformKind::Sampler) => {
                log::warn!("Sampler uniform '{name}' must be bound through a texture unit");
                false
            }
            None => false,
        }
    }

    /// Flattens and uploads a non-sampler value.
    pub fn set_value<D: GpuDriver + ?Sized>(&mut self, driver: &mut D, name: &str, value: &UniformValue) -> bool {
        let mut flat = std::mem::take(&mut self.scratch);
        value.flatten(&mut flat);
        let uploaded = self.set_flat(driver, name, &flat);
        self.scratch = flat;
        uploaded
    }

    /// Forgets every cached value, keeping the resolved locations.
    pub fn invalidate_values(&mut self) {
        for slot in self.slots.values_mut().flatten() {
            slot.uploaded = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::{Mat4, Vec3};
    use prism_core::renderer::api::ProgramSource;
    use prism_infra::HeadlessDriver;

    fn program(driver: &mut HeadlessDriver) -> ProgramId {
        let source = ProgramSource {
            label: "test".into(),
            vertex: "uniform mat4 modelMatrix;\nuniform float weights[2];\nvoid main() {}".into(),
            fragment: "uniform vec3 diffuse;\nuniform int count;\nvoid main() {}".into(),
        };
        let id = driver.create_program(&source).unwrap();
        driver.use_program(Some(id));
        id
    }

    #[test]
    fn test_same_value_uploads_once() {
        let mut driver = HeadlessDriver::default();
        let mut uniforms = ProgramUniforms::new(program(&mut driver));
        let value = UniformValue::Vec3(Vec3::new(1.0, 0.5, 0.25));
        assert!(uniforms.set_value(&mut driver, "diffuse", &value));
        assert!(!uniforms.set_value(&mut driver, "diffuse", &value));
        assert_eq!(driver.count("uniform_f32"), 1);
    }

    #[test]
    fn test_changed_value_always_uploads() {
        let mut driver = HeadlessDriver::default();
        let mut uniforms = ProgramUniforms::new(program(&mut driver));
        for x in [1.0, 2.0, 2.0, 3.0] {
            let m = Mat4::from_translation(Vec3::new(x, 0.0, 0.0));
            uniforms.set_value(&mut driver, "modelMatrix", &UniformValue::Mat4(m));
        }
        assert_eq!(driver.count("uniform_f32"), 3);
        assert_eq!(driver.invalid_handle_uses(), 0);
    }

    #[test]
    fn test_array_uniform_is_one_upload() {
        let mut driver = HeadlessDriver::default();
        let mut uniforms = ProgramUniforms::new(program(&mut driver));
        let weights = UniformValue::Array(vec![UniformValue::Float(0.5), UniformValue::Float(0.25)]);
        uniforms.set_value(&mut driver, "weights", &weights);
        uniforms.set_value(&mut driver, "weights", &weights);
        assert_eq!(driver.count("uniform_f32"), 1);
    }

    #[test]
    fn test_inactive_uniform_is_resolved_once() {
        let mut driver = HeadlessDriver::default();
        let mut uniforms = ProgramUniforms::new(program(&mut driver));
        assert!(!uniforms.set_value(&mut driver, "missing", &UniformValue::Float(1.0)));
        assert!(!uniforms.set_value(&mut driver, "missing", &UniformValue::Float(2.0)));
        assert_eq!(driver.count("uniform_location"), 1);
        assert_eq!(driver.count("uniform_f32"), 0);
    }

    #[test]
    fn test_int_and_bool_share_int_path() {
        let mut driver = HeadlessDriver::default();
        let mut uniforms = ProgramUniforms::new(program(&mut driver));
        assert!(uniforms.set_value(&mut driver, "count", &UniformValue::Int(1)));
        assert!(!uniforms.set_value(&mut driver, "count", &UniformValue::Bool(true)));
        assert_eq!(driver.count("uniform_i32"), 1);
    }

    #[test]
    fn test_invalidate_values_forces_upload() {
        let mut driver = HeadlessDriver::default();
        let mut uniforms = ProgramUniforms::new(program(&mut driver));
        uniforms.set_value(&mut driver, "count", &UniformValue::Int(4));
        uniforms.invalidate_values();
        assert!(uniforms.set_value(&mut driver, "count", &UniformValue::Int(4)));
        assert_eq!(driver.count("uniform_location"), 1);
    }
}
