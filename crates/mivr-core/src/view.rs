//! Camera pose driving the next render.

use serde::{Deserialize, Serialize};

use crate::wire::{MetricRecord, ReplyRecord};

/// Start distance of the camera along its view axis.
pub const DEFAULT_TRANSLATION_Z: f32 = -4.0;

/// Rotation (degrees) and distance of the camera.
///
/// Written by exactly one steering component per run: the feedback client
/// from peer replies, or the sweep controller from its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub translation_z: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            rotation_x: 0.0,
            rotation_y: 0.0,
            translation_z: DEFAULT_TRANSLATION_Z,
        }
    }
}

impl ViewState {
    pub fn new(rotation_x: f32, rotation_y: f32, translation_z: f32) -> Self {
        Self {
            rotation_x,
            rotation_y,
            translation_z,
        }
    }

    /// Overwrite the whole pose with a peer reply.
    pub fn apply_reply(&mut self, reply: &ReplyRecord) {
        self.rotation_x = reply.rotation_x;
        self.rotation_y = reply.rotation_y;
        self.translation_z = reply.translation_z;
    }

    /// The record sent to the peer for this pose.
    pub fn metric_record(&self, mutual_information: f32) -> MetricRecord {
        MetricRecord::new(
            self.rotation_x,
            self.rotation_y,
            self.translation_z,
            mutual_information,
        )
    }
}

impl std::fmt::Display for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rot=({:.1}, {:.1}) z={:.2}",
            self.rotation_x, self.rotation_y, self.translation_z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose() {
        let v = ViewState::default();
        assert_eq!(v.rotation_x, 0.0);
        assert_eq!(v.rotation_y, 0.0);
        assert_eq!(v.translation_z, -4.0);
    }

    #[test]
    fn apply_reply_overwrites_everything() {
        let mut v = ViewState::new(1.0, 2.0, 3.0);
        v.apply_reply(&ReplyRecord::new(10.0, 20.0, -3.5));
        assert_eq!(v, ViewState::new(10.0, 20.0, -3.5));
    }

    #[test]
    fn metric_record_layout() {
        let v = ViewState::new(45.0, 90.0, -6.0);
        let r = v.metric_record(1.25);
        assert_eq!(r.as_array(), [0.0, 45.0, 90.0, -6.0, 1.25]);
    }

    #[test]
    fn display() {
        let v = ViewState::new(1.0, 2.0, -4.0);
        assert_eq!(v.to_string(), "rot=(1.0, 2.0) z=-4.00");
    }
}
