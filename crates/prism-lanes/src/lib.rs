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

//! # Prism Lanes
//!
//! The hot path of the renderer. Everything in this crate runs inside a frame
//! against a [`prism_core::renderer::GpuDriver`]: pipeline state diffing,
//! program and uniform caches, the GPU-side resource tables and the passes
//! that turn render lists into draw calls.

pub mod context;
pub mod render_lane;
pub mod resource_lane;

#[cfg(test)]
pub(crate) mod testing;

pub use context::*;
pub use render_lane::*;
pub use resource_lane::*;
