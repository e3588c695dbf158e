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

//! # Prism Core
//!
//! Foundational crate containing the driver contract, pipeline state types and
//! the logical resources that the rest of the renderer consumes.
//!
//! Nothing in this crate talks to a GPU. The `prism-lanes` crate executes the
//! hot path against the [`renderer::GpuDriver`] trait, and `prism-infra`
//! provides concrete drivers.

#![warn(missing_docs)]

pub mod asset;
pub mod config;
pub mod math;
pub mod memory;
pub mod renderer;
pub mod scene;

pub use config::RendererConfig;
pub use memory::{Arena, Handle};
