//! Pose bookkeeping and reward for the reference peer.
//!
//! The environment mirrors what the renderer reports. Each received
//! [`MetricRecord`] settles the reward for the action chosen on the previous
//! exchange, then a new action moves the pose that is sent back.

use mivr_core::{MetricRecord, ReplyRecord};
use serde::Serialize;

/// Degrees per rotation action.
pub const ROTATION_STEP: f32 = 1.0;
/// Camera distance change per zoom action.
pub const ZOOM_STEP: f32 = 0.1;
/// Closest and farthest camera distance reachable by zooming.
pub const ZOOM_BOUNDS: (f32, f32) = (-10.0, -5.0);
/// Reward per bit of mutual-information change.
pub const MI_REWARD_SCALE: f32 = 20.0;

/// Moves the peer can make between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Hold,
    RotateCw,
    RotateCcw,
    ZoomIn,
    ZoomOut,
    PitchNorth,
    PitchSouth,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Hold,
        Action::RotateCw,
        Action::RotateCcw,
        Action::ZoomIn,
        Action::ZoomOut,
        Action::PitchNorth,
        Action::PitchSouth,
    ];

    /// Action by its numeric id (0 = hold ... 6 = pitch south).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Reward charged for taking the action.
    pub fn cost(self) -> f32 {
        match self {
            Self::Hold => 0.0,
            Self::RotateCw | Self::RotateCcw | Self::PitchNorth | Self::PitchSouth => 1.0,
            Self::ZoomIn | Self::ZoomOut => 2.0,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hold => write!(f, "hold"),
            Self::RotateCw => write!(f, "rotate-cw"),
            Self::RotateCcw => write!(f, "rotate-ccw"),
            Self::ZoomIn => write!(f, "zoom-in"),
            Self::ZoomOut => write!(f, "zoom-out"),
            Self::PitchNorth => write!(f, "pitch-north"),
            Self::PitchSouth => write!(f, "pitch-south"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(i) = s.parse::<usize>() {
            return Self::from_index(i).ok_or_else(|| format!("action id {i} out of range 0-6"));
        }
        match s.to_ascii_lowercase().as_str() {
            "hold" | "none" => Ok(Self::Hold),
            "rotate-cw" | "cw" => Ok(Self::RotateCw),
            "rotate-ccw" | "ccw" => Ok(Self::RotateCcw),
            "zoom-in" | "in" => Ok(Self::ZoomIn),
            "zoom-out" | "out" => Ok(Self::ZoomOut),
            "pitch-north" | "north" => Ok(Self::PitchNorth),
            "pitch-south" | "south" => Ok(Self::PitchSouth),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// What the environment saw on one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub step: u64,
    pub rotation: [f32; 2],
    pub zoom: f32,
    pub mutual_information: f32,
    /// Reward for the previous action. Zero on the first exchange.
    pub reward: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    rotation: [f32; 2],
    zoom: f32,
    mutual_information: f32,
    pending_cost: f32,
    steps: u64,
    total_reward: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            rotation: [0.0, 0.0],
            zoom: 0.0,
            mutual_information: 0.0,
            pending_cost: 0.0,
            steps: 0,
            total_reward: 0.0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn total_reward(&self) -> f32 {
        self.total_reward
    }

    pub fn rotation(&self) -> [f32; 2] {
        self.rotation
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Fold in a record from the renderer.
    ///
    /// The first record adopts the renderer's pose as is. Later records charge
    /// the cost of the last action and add the scaled change in mutual
    /// information; the pose stays the one this peer asked for.
    pub fn observe(&mut self, record: &MetricRecord) -> Observation {
        let reward = if self.steps == 0 {
            self.rotation = [record.rotation_x, record.rotation_y];
            self.zoom = record.translation_z;
            0.0
        } else {
            (record.mutual_information - self.mutual_information) * MI_REWARD_SCALE
                - self.pending_cost
        };
        self.mutual_information = record.mutual_information;
        self.pending_cost = 0.0;
        self.total_reward += reward;

        let obs = Observation {
            step: self.steps,
            rotation: self.rotation,
            zoom: self.zoom,
            mutual_information: self.mutual_information,
            reward,
        };
        self.steps += 1;
        obs
    }

    /// Move the pose. The cost is charged on the next [`Self::observe`].
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Hold => {}
            Action::RotateCw => self.rotation[0] = wrap_up(self.rotation[0]),
            Action::RotateCcw => self.rotation[0] = wrap_down(self.rotation[0]),
            Action::PitchNorth => self.rotation[1] = wrap_up(self.rotation[1]),
            Action::PitchSouth => self.rotation[1] = wrap_down(self.rotation[1]),
            Action::ZoomIn => {
                let (near, _) = ZOOM_BOUNDS;
                self.zoom = if self.zoom - ZOOM_STEP <= near {
                    near
                } else {
                    self.zoom - ZOOM_STEP
                };
            }
            Action::ZoomOut => {
                let (_, far) = ZOOM_BOUNDS;
                self.zoom = if self.zoom + ZOOM_STEP >= far {
                    far
                } else {
                    self.zoom + ZOOM_STEP
                };
            }
        }
        self.pending_cost = action.cost();
    }

    /// The pose to send back.
    pub fn reply(&self) -> ReplyRecord {
        ReplyRecord::new(self.rotation[0], self.rotation[1], self.zoom)
    }
}

// Reaching 360 lands on one step past zero; going to or below zero lands one
// step short of 360.
fn wrap_up(angle: f32) -> f32 {
    if angle + ROTATION_STEP >= 360.0 {
        ROTATION_STEP
    } else {
        angle + ROTATION_STEP
    }
}

fn wrap_down(angle: f32) -> f32 {
    if angle - ROTATION_STEP <= 0.0 {
        360.0 - ROTATION_STEP
    } else {
        angle - ROTATION_STEP
    }
}
