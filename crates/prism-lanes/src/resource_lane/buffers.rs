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

use super::coalesce_ranges;
use crate::render_lane::StateCache;
use prism_core::asset::{Attribute, Geometry, Indices};
use prism_core::memory::Handle;
use prism_core::renderer::api::{BufferId, BufferTarget, BufferUsage, IndexBinding};
use prism_core::renderer::{GpuDriver, ResourceError};
use std::collections::HashMap;

/// Name under which the i-th morph target position buffer is stored.
pub fn morph_attribute_name(index: usize) -> String {
    format!("morphTarget{index}")
}

#[derive(Debug, Clone, Copy)]
struct GpuBuffer {
    id: BufferId,
    version: u64,
    size: usize,
}

#[derive(Debug, Default)]
struct GeometryBuffers {
    version: Option<u64>,
    attributes: HashMap<String, GpuBuffer>,
    index: Option<(GpuBuffer, IndexBinding)>,
}

/// Vertex and index buffers of one context, per geometry.
#[derive(Debug, Default)]
pub struct BufferTable {
    geometries: HashMap<Handle<Geometry>, GeometryBuffers>,
    full_uploads: u64,
    partial_uploads: u64,
}

impl BufferTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings every buffer of `geometry` up to date.
    ///
    /// Attributes with pending update ranges are patched with one
    /// `buffer_sub_data` per coalesced range as long as the buffer size did
    /// not change. Buffers of attributes removed from the geometry are
    /// deleted.
    pub fn update<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: Handle<Geometry>,
        geometry: &mut Geometry,
    ) -> Result<(), ResourceError> {
        let entry = self.geometries.entry(handle).or_default();

        if entry.version != Some(geometry.version) {
            let keep: Vec<String> = entry
                .attributes
                .keys()
                .filter(|name| {
                    geometry.attributes.contains_key(*name)
                        || (0..geometry.morph_positions.len()).any(|i| morph_attribute_name(i) == **name)
                })
                .cloned()
                .collect();
            entry.attributes.retain(|name, buffer| {
                let alive = keep.contains(name);
                if !alive {
                    log::debug!("Deleting buffer {:?} of removed attribute '{name}'", buffer.id);
                    driver.delete_buffer(buffer.id);
                    state.forget_buffer(buffer.id);
                }
                alive
            });
            entry.version = Some(geometry.version);
        }

        for (name, attribute) in geometry.attributes.iter_mut() {
            Self::sync_attribute(
                driver,
                entry,
                name,
                attribute,
                &mut self.full_uploads,
                &mut self.partial_uploads,
            )?;
        }
        for (i, attribute) in geometry.morph_positions.iter_mut().enumerate() {
            Self::sync_attribute(
                driver,
                entry,
                &morph_attribute_name(i),
                attribute,
                &mut self.full_uploads,
                &mut self.partial_uploads,
            )?;
        }

        match &geometry.index {
            Some(indices) => {
                let current = entry
                    .index
                    .filter(|(buffer, binding)| {
                        buffer.version == geometry.index_version && binding.format == indices.format()
                    });
                if current.is_none() {
                    let id = match entry.index {
                        Some((buffer, _)) => buffer.id,
                        None => driver.create_buffer()?,
                    };
                    let bytes: &[u8] = match indices {
                        Indices::U16(v) => bytemuck::cast_slice(v),
                        Indices::U32(v) => bytemuck::cast_slice(v),
                    };
                    driver.bind_buffer(BufferTarget::ElementArray, Some(id));
                    driver.buffer_data(BufferTarget::ElementArray, bytes, BufferUsage::StaticDraw);
                    self.full_uploads += 1;
                    entry.index = Some((
                        GpuBuffer {
                            id,
                            version: geometry.index_version,
                            size: bytes.len(),
                        },
                        IndexBinding {
                            buffer: id,
                            format: indices.format(),
                        },
                    ));
                }
            }
            None => {
                if let Some((buffer, _)) = entry.index.take() {
                    driver.delete_buffer(buffer.id);
                }
            }
        }
        Ok(())
    }

    fn sync_attribute<D: GpuDriver + ?Sized>(
        driver: &mut D,
        entry: &mut GeometryBuffers,
        name: &str,
        attribute: &mut Attribute,
        full_uploads: &mut u64,
        partial_uploads: &mut u64,
    ) -> Result<(), ResourceError> {
        let bytes: &[u8] = bytemuck::cast_slice(&attribute.data);
        if let Some(buffer) = entry.attributes.get_mut(name) {
            if buffer.version == attribute.version {
                return Ok(());
            }
            driver.bind_buffer(BufferTarget::Array, Some(buffer.id));
            if !attribute.update_ranges.is_empty() && buffer.size == bytes.len() {
                let ranges = coalesce_ranges(&attribute.update_ranges);
                log::trace!("Patching '{name}' with {} range(s)", ranges.len());
                for range in ranges {
                    let end = range.end().min(attribute.data.len());
                    if range.start >= end {
                        continue;
                    }
                    let offset = range.start * std::mem::size_of::<f32>();
                    let slice: &[u8] = bytemuck::cast_slice(&attribute.data[range.start..end]);
                    driver.buffer_sub_data(BufferTarget::Array, offset, slice);
                }
                *partial_uploads += 1;
            } else {
                driver.buffer_data(BufferTarget::Array, bytes, usage_of(attribute));
                buffer.size = bytes.len();
                *full_uploads += 1;
            }
            buffer.version = attribute.version;
            attribute.update_ranges.clear();
            return Ok(());
        }

        let id = driver.create_buffer()?;
        driver.bind_buffer(BufferTarget::Array, Some(id));
        driver.buffer_data(BufferTarget::Array, bytes, usage_of(attribute));
        *full_uploads += 1;
        entry.attributes.insert(
            name.to_string(),
            GpuBuffer {
                id,
                version: attribute.version,
                size: bytes.len(),
            },
        );
        attribute.update_ranges.clear();
        Ok(())
    }

    /// The buffer holding attribute `name` of `geometry`.
    pub fn attribute(&self, geometry: Handle<Geometry>, name: &str) -> Option<BufferId> {
        self.geometries
            .get(&geometry)?
            .attributes
            .get(name)
            .map(|b| b.id)
    }

    /// The index buffer of `geometry`, if indexed.
    pub fn index(&self, geometry: Handle<Geometry>) -> Option<IndexBinding> {
        self.geometries.get(&geometry)?.index.map(|(_, binding)| binding)
    }

    /// Deletes every buffer of a disposed geometry.
    pub fn remove<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        geometry: Handle<Geometry>,
    ) {
        let Some(entry) = self.geometries.remove(&geometry) else {
            return;
        };
        let ids = entry
            .attributes
            .values()
            .map(|b| b.id)
            .chain(entry.index.map(|(b, _)| b.id));
        for id in ids {
            driver.delete_buffer(id);
            state.forget_buffer(id);
        }
    }

    /// Number of buffers owned by the table.
    pub fn len(&self) -> usize {
        self.geometries
            .values()
            .map(|g| g.attributes.len() + usize::from(g.index.is_some()))
            .sum()
    }

    /// Number of geometries with resident buffers.
    pub fn geometries(&self) -> usize {
        self.geometries.len()
    }

    /// Returns `true` if no buffer is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole-buffer uploads performed so far.
    pub fn full_uploads(&self) -> u64 {
        self.full_uploads
    }

    /// Range uploads performed so far.
    pub fn partial_uploads(&self) -> u64 {
        self.partial_uploads
    }

    /// Forgets every buffer without deleting, after a context loss.
    pub fn invalidate(&mut self) {
        self.geometries.clear();
    }
}

fn usage_of(attribute: &Attribute) -> BufferUsage {
    if attribute.dynamic {
        BufferUsage::DynamicDraw
    } else {
        BufferUsage::StaticDraw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::memory::Arena;
    use prism_infra::HeadlessDriver;

    fn handle() -> Handle<Geometry> {
        Arena::new().insert(Geometry::default())
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn triangle() -> Geometry {
        Geometry::from_positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    #[test]
    fn test_upload_once_per_version() {
        let mut driver = HeadlessDriver::default();
        let mut state = StateCache::new();
        let mut table = BufferTable::new();
        let handle = handle();
        let mut geometry = triangle();

        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();
        assert_eq!(driver.count("buffer_data"), 1);

        let id = table.attribute(handle, "position").unwrap();
        let contents = driver.buffer_contents(id).unwrap();
        assert_eq!(contents.len(), 9 * 4);
        assert_eq!(floats(&contents)[3], 1.0);
    }

    #[test]
    fn test_update_ranges_are_coalesced() {
        let mut driver = HeadlessDriver::default();
        let mut state = StateCache::new();
        let mut table = BufferTable::new();
        let handle = handle();
        let mut geometry = triangle();
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();

        let position = geometry.attributes.get_mut("position").unwrap();
        position.data[0] = 5.0;
        position.data[1] = 6.0;
        position.add_update_range(0, 1);
        position.add_update_range(1, 1);
        position.data[8] = 7.0;
        position.add_update_range(8, 1);
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();

        assert_eq!(driver.count("buffer_sub_data"), 2);
        assert_eq!(driver.count("buffer_data"), 1);
        assert_eq!(table.partial_uploads(), 1);
        let id = table.attribute(handle, "position").unwrap();
        let data = floats(&driver.buffer_contents(id).unwrap());
        assert_eq!(data[0], 5.0);
        assert_eq!(data[1], 6.0);
        assert_eq!(data[8], 7.0);
        assert!(geometry.attributes["position"].update_ranges.is_empty());
    }

    #[test]
    fn test_resized_attribute_gets_full_upload() {
        let mut driver = HeadlessDriver::default();
        let mut state = StateCache::new();
        let mut table = BufferTable::new();
        let handle = handle();
        let mut geometry = triangle();
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();

        let position = geometry.attributes.get_mut("position").unwrap();
        position.data.extend_from_slice(&[1.0, 1.0, 0.0]);
        position.add_update_range(9, 3);
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();
        assert_eq!(driver.count("buffer_sub_data"), 0);
        assert_eq!(driver.count("buffer_data"), 2);
    }

    #[test]
    fn test_index_and_removed_attribute() {
        let mut driver = HeadlessDriver::default();
        let mut state = StateCache::new();
        let mut table = BufferTable::new();
        let handle = handle();
        let mut geometry = triangle();
        geometry.set_attribute("uv", Attribute::new(vec![0.0; 6], 2));
        geometry.set_index(Indices::U16(vec![0, 1, 2]));
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();
        assert_eq!(table.len(), 3);
        let index = table.index(handle).unwrap();
        assert_eq!(driver.buffer_contents(index.buffer).unwrap().len(), 6);

        geometry.remove_attribute("uv");
        table.update(&mut driver, &mut state, handle, &mut geometry).unwrap();
        assert!(table.attribute(handle, "uv").is_none());
        assert_eq!(driver.live_buffers(), 2);

        table.remove(&mut driver, &mut state, handle);
        assert_eq!(driver.live_buffers(), 0);
        assert!(table.is_empty());
        assert_eq!(driver.invalid_handle_uses(), 0);
    }
}
