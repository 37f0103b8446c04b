//! Event taxonomy.
//!
//! Events are compared structurally: two events are equal when they have the
//! same kind, the same scene and the same target name(s). Incidental payload
//! such as a timer's elapsed time does not take part in the comparison, so a
//! live event matches the pattern stored in a persisted rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Event aimed at a single named annotation or physical object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEvent {
    pub scene: String,
    pub target: String,
}

/// Event aimed at a set of targets (group conditions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEvent {
    pub scene: String,
    pub targets: BTreeSet<String>,
}

/// Event emitted by a running timer annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEvent {
    pub scene: String,
    pub target: String,
    /// Elapsed time when the event fired. Not part of equality.
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl PartialEq for TimerEvent {
    fn eq(&self, other: &Self) -> bool {
        self.scene == other.scene && self.target == other.target
    }
}

impl Eq for TimerEvent {}

/// Object entering or leaving an area annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaEvent {
    pub scene: String,
    pub object: String,
    pub area: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEvent {
    pub scene: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Selection(TargetEvent),
    HandOnTop(TargetEvent),
    CheckboxChecked(TargetEvent),
    CheckboxUnchecked(TargetEvent),
    CheckboxGroupChecked(GroupEvent),
    CheckboxGroupUnchecked(GroupEvent),
    TimerTick(TimerEvent),
    TimerTimeout1(TimerEvent),
    TimerTimeout2(TimerEvent),
    TimerTimeout3(TimerEvent),
    TimerFinished(TimerEvent),
    ObjectAppeared(TargetEvent),
    ObjectDisappeared(TargetEvent),
    ObjectPicked(TargetEvent),
    ObjectGroupAppeared(GroupEvent),
    ObjectPlacedInArea(AreaEvent),
    ObjectRemovedFromArea(AreaEvent),
    SceneShown(SceneEvent),
    SceneLeft(SceneEvent),
}

/// Discriminant of [`Event`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Selection,
    HandOnTop,
    CheckboxChecked,
    CheckboxUnchecked,
    CheckboxGroupChecked,
    CheckboxGroupUnchecked,
    TimerTick,
    TimerTimeout1,
    TimerTimeout2,
    TimerTimeout3,
    TimerFinished,
    ObjectAppeared,
    ObjectDisappeared,
    ObjectPicked,
    ObjectGroupAppeared,
    ObjectPlacedInArea,
    ObjectRemovedFromArea,
    SceneShown,
    SceneLeft,
}

impl EventKind {
    pub const ALL: [EventKind; 19] = [
        EventKind::Selection,
        EventKind::HandOnTop,
        EventKind::CheckboxChecked,
        EventKind::CheckboxUnchecked,
        EventKind::CheckboxGroupChecked,
        EventKind::CheckboxGroupUnchecked,
        EventKind::TimerTick,
        EventKind::TimerTimeout1,
        EventKind::TimerTimeout2,
        EventKind::TimerTimeout3,
        EventKind::TimerFinished,
        EventKind::ObjectAppeared,
        EventKind::ObjectDisappeared,
        EventKind::ObjectPicked,
        EventKind::ObjectGroupAppeared,
        EventKind::ObjectPlacedInArea,
        EventKind::ObjectRemovedFromArea,
        EventKind::SceneShown,
        EventKind::SceneLeft,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::HandOnTop => "hand_on_top",
            Self::CheckboxChecked => "checkbox_checked",
            Self::CheckboxUnchecked => "checkbox_unchecked",
            Self::CheckboxGroupChecked => "checkbox_group_checked",
            Self::CheckboxGroupUnchecked => "checkbox_group_unchecked",
            Self::TimerTick => "timer_tick",
            Self::TimerTimeout1 => "timer_timeout1",
            Self::TimerTimeout2 => "timer_timeout2",
            Self::TimerTimeout3 => "timer_timeout3",
            Self::TimerFinished => "timer_finished",
            Self::ObjectAppeared => "object_appeared",
            Self::ObjectDisappeared => "object_disappeared",
            Self::ObjectPicked => "object_picked",
            Self::ObjectGroupAppeared => "object_group_appeared",
            Self::ObjectPlacedInArea => "object_placed_in_area",
            Self::ObjectRemovedFromArea => "object_removed_from_area",
            Self::SceneShown => "scene_shown",
            Self::SceneLeft => "scene_left",
        }
    }

    /// Whether a persisting collision keeps re-firing this kind every
    /// repeat interval. Non-repeatable kinds fire once per collision.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, Self::Selection)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Event {
    pub fn selection(scene: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Selection(TargetEvent::new(scene, target))
    }

    pub fn hand_on_top(scene: impl Into<String>, target: impl Into<String>) -> Self {
        Self::HandOnTop(TargetEvent::new(scene, target))
    }

    pub fn scene_shown(scene: impl Into<String>) -> Self {
        Self::SceneShown(SceneEvent { scene: scene.into() })
    }

    pub fn scene_left(scene: impl Into<String>) -> Self {
        Self::SceneLeft(SceneEvent { scene: scene.into() })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Selection(_) => EventKind::Selection,
            Self::HandOnTop(_) => EventKind::HandOnTop,
            Self::CheckboxChecked(_) => EventKind::CheckboxChecked,
            Self::CheckboxUnchecked(_) => EventKind::CheckboxUnchecked,
            Self::CheckboxGroupChecked(_) => EventKind::CheckboxGroupChecked,
            Self::CheckboxGroupUnchecked(_) => EventKind::CheckboxGroupUnchecked,
            Self::TimerTick(_) => EventKind::TimerTick,
            Self::TimerTimeout1(_) => EventKind::TimerTimeout1,
            Self::TimerTimeout2(_) => EventKind::TimerTimeout2,
            Self::TimerTimeout3(_) => EventKind::TimerTimeout3,
            Self::TimerFinished(_) => EventKind::TimerFinished,
            Self::ObjectAppeared(_) => EventKind::ObjectAppeared,
            Self::ObjectDisappeared(_) => EventKind::ObjectDisappeared,
            Self::ObjectPicked(_) => EventKind::ObjectPicked,
            Self::ObjectGroupAppeared(_) => EventKind::ObjectGroupAppeared,
            Self::ObjectPlacedInArea(_) => EventKind::ObjectPlacedInArea,
            Self::ObjectRemovedFromArea(_) => EventKind::ObjectRemovedFromArea,
            Self::SceneShown(_) => EventKind::SceneShown,
            Self::SceneLeft(_) => EventKind::SceneLeft,
        }
    }

    /// Scene the event belongs to.
    pub fn scene(&self) -> &str {
        match self {
            Self::Selection(e)
            | Self::HandOnTop(e)
            | Self::CheckboxChecked(e)
            | Self::CheckboxUnchecked(e)
            | Self::ObjectAppeared(e)
            | Self::ObjectDisappeared(e)
            | Self::ObjectPicked(e) => &e.scene,
            Self::CheckboxGroupChecked(e)
            | Self::CheckboxGroupUnchecked(e)
            | Self::ObjectGroupAppeared(e) => &e.scene,
            Self::TimerTick(e)
            | Self::TimerTimeout1(e)
            | Self::TimerTimeout2(e)
            | Self::TimerTimeout3(e)
            | Self::TimerFinished(e) => &e.scene,
            Self::ObjectPlacedInArea(e) | Self::ObjectRemovedFromArea(e) => &e.scene,
            Self::SceneShown(e) | Self::SceneLeft(e) => &e.scene,
        }
    }

    /// Every annotation or object name the event refers to.
    pub fn target_names(&self) -> Vec<&str> {
        match self {
            Self::Selection(e)
            | Self::HandOnTop(e)
            | Self::CheckboxChecked(e)
            | Self::CheckboxUnchecked(e)
            | Self::ObjectAppeared(e)
            | Self::ObjectDisappeared(e)
            | Self::ObjectPicked(e) => vec![e.target.as_str()],
            Self::CheckboxGroupChecked(e)
            | Self::CheckboxGroupUnchecked(e)
            | Self::ObjectGroupAppeared(e) => e.targets.iter().map(String::as_str).collect(),
            Self::TimerTick(e)
            | Self::TimerTimeout1(e)
            | Self::TimerTimeout2(e)
            | Self::TimerTimeout3(e)
            | Self::TimerFinished(e) => vec![e.target.as_str()],
            Self::ObjectPlacedInArea(e) | Self::ObjectRemovedFromArea(e) => {
                vec![e.object.as_str(), e.area.as_str()]
            }
            Self::SceneShown(_) | Self::SceneLeft(_) => Vec::new(),
        }
    }
}

impl TargetEvent {
    pub fn new(scene: impl Into<String>, target: impl Into<String>) -> Self {
        Self { scene: scene.into(), target: target.into() }
    }
}

impl GroupEvent {
    pub fn new<I, S>(scene: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scene: scene.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }
}

impl TimerEvent {
    pub fn new(scene: impl Into<String>, target: impl Into<String>, elapsed_ms: u64) -> Self {
        Self { scene: scene.into(), target: target.into(), elapsed_ms }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind(), self.scene())?;
        let targets = self.target_names();
        if !targets.is_empty() {
            write!(f, "[{}]", targets.join(","))?;
        }
        Ok(())
    }
}
