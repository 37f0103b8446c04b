//! Project validation.
//!
//! Checks a loaded project for references the runtime cannot resolve before
//! it is bound: rules whose event belongs to another scene, events and
//! actions naming annotations, objects or scenes that do not exist, and
//! duplicate names.

use crate::action::ActionSpec;
use crate::event::Event;
use crate::model::{Project, Scene};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path to the problematic item (e.g. "scenes[intro].rules[press].event").
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.path, self.message)
    }
}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

pub fn validate_project(project: &Project) -> ValidationResult {
    let mut errors = Vec::new();

    if project.name.trim().is_empty() {
        errors.push(ValidationError {
            path: "name".to_string(),
            message: "Project name cannot be empty".to_string(),
        });
    }
    if project.scenes.is_empty() {
        errors.push(ValidationError {
            path: "scenes".to_string(),
            message: "Project must have at least one scene".to_string(),
        });
    }

    let scene_names: HashSet<&str> = project.scenes.iter().map(|s| s.name.as_str()).collect();
    check_duplicates(
        project.scenes.iter().map(|s| s.name.as_str()),
        "scenes",
        "scene",
        &mut errors,
    );

    check_names(project.scenes.iter().map(|s| s.name.as_str()), "scenes", &mut errors);

    for scene in &project.scenes {
        validate_scene(scene, &scene_names, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_scene(scene: &Scene, scene_names: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    let path = format!("scenes[{}]", scene.name);
    check_duplicates(
        scene.annotations.iter().map(|a| a.name.as_str()),
        &format!("{}.annotations", path),
        "annotation",
        errors,
    );
    check_duplicates(
        scene.physical_objects.iter().map(|o| o.name.as_str()),
        &format!("{}.physical_objects", path),
        "physical object",
        errors,
    );
    check_duplicates(
        scene.rules.iter().map(|r| r.name.as_str()),
        &format!("{}.rules", path),
        "rule",
        errors,
    );

    check_names(
        scene
            .annotations
            .iter()
            .map(|a| a.name.as_str())
            .chain(scene.physical_objects.iter().map(|o| o.name.as_str()))
            .chain(scene.rules.iter().map(|r| r.name.as_str())),
        &path,
        errors,
    );

    let known: HashSet<&str> = scene
        .annotations
        .iter()
        .map(|a| a.name.as_str())
        .chain(scene.physical_objects.iter().map(|o| o.name.as_str()))
        .collect();

    for rule in &scene.rules {
        let rule_path = format!("{}.rules[{}]", path, rule.name);
        validate_event(&rule.event, &scene.name, &known, &format!("{}.event", rule_path), errors);
        validate_action(&rule.action, &known, scene_names, &format!("{}.action", rule_path), errors);
    }
}

fn validate_event(
    event: &Event,
    owner: &str,
    known: &HashSet<&str>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if event.scene() != owner {
        errors.push(ValidationError {
            path: path.to_string(),
            message: format!(
                "Event belongs to scene '{}' but the rule is in scene '{}'; it can never fire",
                event.scene(),
                owner
            ),
        });
    }
    for target in event.target_names() {
        if !known.contains(target) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Unknown annotation or object '{}'", target),
            });
        }
    }
}

fn validate_action(
    action: &ActionSpec,
    known: &HashSet<&str>,
    scene_names: &HashSet<&str>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    match action {
        ActionSpec::Parallel { actions } | ActionSpec::Sequential { actions, .. } => {
            if actions.is_empty() {
                errors.push(ValidationError {
                    path: path.to_string(),
                    message: "Composite action has no sub-actions".to_string(),
                });
            }
            for (i, sub) in actions.iter().enumerate() {
                validate_action(sub, known, scene_names, &format!("{}.actions[{}]", path, i), errors);
            }
        }
        _ => {
            for name in action.annotation_refs() {
                if !known.contains(name) {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("Unknown annotation '{}'", name),
                    });
                }
            }
            for scene in action.scene_refs() {
                if !scene_names.contains(scene) {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("Unknown scene '{}'", scene),
                    });
                }
            }
        }
    }
}

fn check_duplicates<'a>(
    names: impl Iterator<Item = &'a str>,
    path: &str,
    what: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Duplicate {} name '{}'", what, name),
            });
        }
    }
}

/// NUL bytes are rejected in every name.
fn check_names<'a>(names: impl Iterator<Item = &'a str>, path: &str, errors: &mut Vec<ValidationError>) {
    for name in names.filter(|n| n.contains('\0')) {
        errors.push(ValidationError {
            path: path.to_string(),
            message: format!("Name {:?} contains a NUL byte", name),
        });
    }
}
