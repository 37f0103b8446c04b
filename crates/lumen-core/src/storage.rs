//! Project storage and persistence.

use crate::model::Project;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Project not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Get the app data directory for lumen.
pub fn get_app_data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("lumen")
}

/// Get the projects directory.
pub fn get_projects_dir() -> PathBuf {
    get_app_data_dir().join("projects")
}

pub fn save_project(project: &Project) -> StorageResult<PathBuf> {
    save_project_in(&get_projects_dir(), project)
}

pub fn load_project(name: &str) -> StorageResult<Project> {
    load_project_in(&get_projects_dir(), name)
}

pub fn delete_project(name: &str) -> StorageResult<()> {
    delete_project_in(&get_projects_dir(), name)
}

pub fn list_projects() -> StorageResult<Vec<String>> {
    list_projects_in(&get_projects_dir())
}

/// Save a project as pretty JSON under `dir`, creating it if needed.
pub fn save_project_in(dir: &Path, project: &Project) -> StorageResult<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        info!(?dir, "Created projects directory");
    }
    let path = project_path(dir, &project.name);
    fs::write(&path, serde_json::to_string_pretty(project)?)?;
    info!(?path, "Saved project");
    Ok(path)
}

pub fn load_project_in(dir: &Path, name: &str) -> StorageResult<Project> {
    let path = project_path(dir, name);
    if !path.exists() {
        return Err(StorageError::NotFound(name.to_string()));
    }
    let project = load_project_file(&path)?;
    debug!(?path, "Loaded project");
    Ok(project)
}

/// Load a project from an explicit file path.
pub fn load_project_file(path: &Path) -> StorageResult<Project> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn delete_project_in(dir: &Path, name: &str) -> StorageResult<()> {
    let path = project_path(dir, name);
    if !path.exists() {
        return Err(StorageError::NotFound(name.to_string()));
    }
    fs::remove_file(&path)?;
    info!(?path, "Deleted project");
    Ok(())
}

pub fn list_projects_in(dir: &Path) -> StorageResult<Vec<String>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut projects = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            if let Some(name) = path.file_stem() {
                projects.push(name.to_string_lossy().to_string());
            }
        }
    }
    projects.sort();
    Ok(projects)
}

fn project_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", sanitize_filename(name)))
}

/// Sanitize a project name to be a valid filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_project;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Museum Tour"), "Museum Tour");
        assert_eq!(sanitize_filename("lab/week1"), "lab_week1");
        assert_eq!(sanitize_filename("a:b*c?d"), "a_b_c_d");
    }

    #[test]
    fn test_save_list_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let projects = dir.path().join("projects");
        assert!(list_projects_in(&projects).unwrap().is_empty());

        let project = sample_project();
        let path = save_project_in(&projects, &project).unwrap();
        assert!(path.ends_with("demo.json"));
        assert_eq!(list_projects_in(&projects).unwrap(), vec!["demo"]);

        let loaded = load_project_in(&projects, "demo").unwrap();
        assert_eq!(loaded, project);

        delete_project_in(&projects, "demo").unwrap();
        assert!(matches!(
            load_project_in(&projects, "demo"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            delete_project_in(&projects, "demo"),
            Err(StorageError::NotFound(_))
        ));
    }
}
