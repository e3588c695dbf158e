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

//! Statistics about rendered frames and resident resources.

/// Counters describing the last rendered frame and the renderer's memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// A sequential counter for rendered frames.
    pub frame: u64,
    /// Draw calls issued in the last frame, all passes included.
    pub draw_calls: u32,
    /// Triangles submitted in the last frame.
    pub triangles: u32,
    /// Line segments submitted in the last frame.
    pub lines: u32,
    /// Points submitted in the last frame.
    pub points: u32,
    /// Draws skipped because their program was pending or failed.
    pub skipped_draws: u32,
    /// Programs currently resident in the program cache.
    pub programs: usize,
    /// GPU textures currently resident.
    pub textures: usize,
    /// Geometries with at least one uploaded buffer.
    pub geometries: usize,
    /// Total driver calls as reported by the driver.
    pub driver_calls: u64,
}

impl RenderInfo {
    /// Clears the per-frame counters, keeping the memory counters.
    pub fn reset_frame(&mut self) {
        self.draw_calls = 0;
        self.triangles = 0;
        self.lines = 0;
        self.points = 0;
        self.skipped_draws = 0;
    }
}
