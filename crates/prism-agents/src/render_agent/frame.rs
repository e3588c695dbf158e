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


//! The per-frame state machine.

use prism_core::renderer::RenderError;

/// The phase a renderer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FramePhase {
    /// Between frames.
    #[default]
    Idle,
    /// Classifying and sorting the drawable items.
    ListBuilding,
    /// Rendering shadow maps.
    ShadowPass,
    /// Rendering the background sampled by transmissive materials.
    TransmissionPrePass,
    /// Rendering into the output.
    MainPass,
}

impl FramePhase {
    /// A short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            FramePhase::Idle => "idle",
            FramePhase::ListBuilding => "list-building",
            FramePhase::ShadowPass => "shadow-pass",
            FramePhase::TransmissionPrePass => "transmission-prepass",
            FramePhase::MainPass => "main-pass",
        }
    }

    /// The phase a lane runs in, from its strategy name.
    pub fn for_lane(strategy_name: &str) -> Self {
        match strategy_name {
            "ShadowPass" => FramePhase::ShadowPass,
            "TransmissionPrePass" => FramePhase::TransmissionPrePass,
            _ => FramePhase::MainPass,
        }
    }
}

/// Tracks the phase of the frame in progress.
///
/// Phases only move forward. A frame is started from `Idle` and always
/// returns to it, whether the frame succeeded or not.
#[derive(Debug, Default)]
pub struct FrameState {
    phase: FramePhase,
}

impl FrameState {
    /// Creates an idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current phase.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Returns `true` between frames.
    pub fn is_idle(&self) -> bool {
        self.phase == FramePhase::Idle
    }

    /// Starts a frame.
    ///
    /// ## Errors
    /// * `RenderError::NestedFrame` - If a frame is already in progress.
    pub fn begin(&mut self) -> Result<(), RenderError> {
        if self.phase != FramePhase::Idle {
            return Err(RenderError::NestedFrame {
                phase: self.phase.name(),
            });
        }
        self.phase = FramePhase::ListBuilding;
        Ok(())
    }

    /// Moves to `phase`. Going back to an earlier phase is ignored.
    pub fn advance(&mut self, phase: FramePhase) {
        if phase > self.phase {
            log::trace!("Frame phase {} -> {}", self.phase.name(), phase.name());
            self.phase = phase;
        }
    }

    /// Ends the frame.
    pub fn finish(&mut self) {
        self.phase = FramePhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_while_in_progress_is_nested_frame() {
        let mut frame = FrameState::new();
        frame.begin().unwrap();
        frame.advance(FramePhase::ShadowPass);
        assert_eq!(
            frame.begin(),
            Err(RenderError::NestedFrame {
                phase: "shadow-pass"
            })
        );
        frame.finish();
        assert!(frame.begin().is_ok());
    }

    #[test]
    fn test_phases_only_move_forward() {
        let mut frame = FrameState::new();
        frame.begin().unwrap();
        frame.advance(FramePhase::MainPass);
        frame.advance(FramePhase::ShadowPass);
        assert_eq!(frame.phase(), FramePhase::MainPass);
        frame.finish();
        assert!(frame.is_idle());
    }

    #[test]
    fn test_lane_names_map_to_phases() {
        assert_eq!(FramePhase::for_lane("ShadowPass"), FramePhase::ShadowPass);
        assert_eq!(
            FramePhase::for_lane("TransmissionPrePass"),
            FramePhase::TransmissionPrePass
        );
        assert_eq!(FramePhase::for_lane("Forward"), FramePhase::MainPass);
    }
}
