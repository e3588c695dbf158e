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

//! Shader program sources and compilation status.

use std::fmt;

/// A shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Fully assembled sources for a program, ready for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramSource {
    /// A human-readable label used in diagnostics.
    pub label: String,
    /// Complete vertex shader text.
    pub vertex: String,
    /// Complete fragment shader text.
    pub fragment: String,
}

impl ProgramSource {
    /// Returns the source text of `stage`.
    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

/// The compile/link state of a program as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    /// Compilation was started in parallel and has not finished.
    Pending,
    /// The program is linked and usable.
    Ready,
    /// Compilation or linking failed.
    Failed {
        /// The stage that failed, or `None` for a link failure.
        stage: Option<ShaderStage>,
        /// The driver's info log.
        log: String,
    },
}
