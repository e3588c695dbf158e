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

//! # Prism Infra
//!
//! Concrete implementations of the [`prism_core::renderer::GpuDriver`] contract.
//!
//! - [`HeadlessDriver`] records every call without touching a GPU. It
//!   simulates program compilation, fences and context loss, and is the
//!   driver used by tests and by the sandbox.
//! - `GlowDriver` (feature `gl`) drives a real OpenGL 3.3 / GLES 3.0 context
//!   through `glow`.

pub mod graphics;

pub use graphics::headless::{DrawRecord, DriverCall, HeadlessConfig, HeadlessDriver, UniformData};

#[cfg(feature = "gl")]
pub use graphics::gl::GlowDriver;
