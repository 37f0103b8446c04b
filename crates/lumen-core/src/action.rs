//! Persisted action specifications.
//!
//! An [`ActionSpec`] is plain data authored at design time and saved with the
//! project. It carries no live service references; the actions engine binds
//! it to the running model when it is performed.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCommand {
    Play,
    Pause,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionSpec {
    /// Flip `visible` on every listed annotation.
    ToggleVisibility { targets: Vec<String> },
    ShowAnnotations { targets: Vec<String> },
    HideAnnotations { targets: Vec<String> },

    NextScene,
    PreviousScene,
    /// Return to the scene shown before the current one.
    BackScene,
    GotoScene { scene: String },

    StartTimer { target: String },
    StopTimer { target: String },
    ResetTimer { target: String },

    Audio { target: String, command: MediaCommand },
    Video { target: String, command: MediaCommand },

    StartAnimation { target: String },
    StopAnimation { target: String },

    /// Run every sub-action on its own thread; no join, no ordering.
    Parallel { actions: Vec<ActionSpec> },
    /// Run sub-actions in order with a fixed pause between them.
    Sequential {
        actions: Vec<ActionSpec>,
        #[serde(default)]
        time_between_actions_ms: u64,
    },
}

/// Shape of what an action operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget<'a> {
    Annotation(&'a str),
    Annotations(&'a [String]),
    Scene(Option<&'a str>),
    None,
}

impl fmt::Display for ActionTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annotation(name) => f.write_str(name),
            Self::Annotations(names) => write!(f, "[{}]", names.join(",")),
            Self::Scene(Some(scene)) => write!(f, "scene:{}", scene),
            Self::Scene(None) => f.write_str("scene"),
            Self::None => f.write_str("-"),
        }
    }
}

impl ActionSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ToggleVisibility { .. } => "toggle_visibility",
            Self::ShowAnnotations { .. } => "show_annotations",
            Self::HideAnnotations { .. } => "hide_annotations",
            Self::NextScene => "next_scene",
            Self::PreviousScene => "previous_scene",
            Self::BackScene => "back_scene",
            Self::GotoScene { .. } => "goto_scene",
            Self::StartTimer { .. } => "start_timer",
            Self::StopTimer { .. } => "stop_timer",
            Self::ResetTimer { .. } => "reset_timer",
            Self::Audio { .. } => "audio",
            Self::Video { .. } => "video",
            Self::StartAnimation { .. } => "start_animation",
            Self::StopAnimation { .. } => "stop_animation",
            Self::Parallel { .. } => "parallel",
            Self::Sequential { .. } => "sequential",
        }
    }

    pub fn target(&self) -> ActionTarget<'_> {
        match self {
            Self::ToggleVisibility { targets }
            | Self::ShowAnnotations { targets }
            | Self::HideAnnotations { targets } => ActionTarget::Annotations(targets),
            Self::NextScene | Self::PreviousScene | Self::BackScene => ActionTarget::Scene(None),
            Self::GotoScene { scene } => ActionTarget::Scene(Some(scene)),
            Self::StartTimer { target }
            | Self::StopTimer { target }
            | Self::ResetTimer { target }
            | Self::Audio { target, .. }
            | Self::Video { target, .. }
            | Self::StartAnimation { target }
            | Self::StopAnimation { target } => ActionTarget::Annotation(target),
            Self::Parallel { .. } | Self::Sequential { .. } => ActionTarget::None,
        }
    }

    /// Annotation names referenced by this action and its sub-actions.
    pub fn annotation_refs(&self) -> Vec<&str> {
        match self {
            Self::Parallel { actions } | Self::Sequential { actions, .. } => {
                actions.iter().flat_map(|a| a.annotation_refs()).collect()
            }
            other => match other.target() {
                ActionTarget::Annotation(name) => vec![name],
                ActionTarget::Annotations(names) => names.iter().map(String::as_str).collect(),
                ActionTarget::Scene(_) | ActionTarget::None => Vec::new(),
            },
        }
    }

    /// Scene names referenced by `GotoScene` in this action tree.
    pub fn scene_refs(&self) -> Vec<&str> {
        match self {
            Self::GotoScene { scene } => vec![scene.as_str()],
            Self::Parallel { actions } | Self::Sequential { actions, .. } => {
                actions.iter().flat_map(|a| a.scene_refs()).collect()
            }
            _ => Vec::new(),
        }
    }
}
