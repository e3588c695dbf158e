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


//! Acts as the agent of the rendering subsystem.
//!
//! The [`Renderer`] decides *what* runs in a frame and in which order: it
//! builds the render list, then hands the frame to its lanes (shadow maps,
//! transmission background, main pass). The GPU work itself is delegated to
//! the lanes and caches of `prism-lanes`.
//!
//! Resource lifetime is driven from here too. Registering a resource only
//! stores it; GPU objects are created lazily on first use and released when
//! the resource is disposed or the context is lost.

mod agent;
mod frame;
mod readback;
mod resources;

pub use agent::*;
pub use frame::*;
pub use readback::*;
pub use resources::*;
