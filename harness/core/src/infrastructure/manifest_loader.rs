// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Manifest Loader
//!
//! Reads policies, resources, CustomResourceDefinitions and values files from
//! disk. A path may be a single file or a directory, which is walked
//! recursively in sorted order. Files may hold several YAML documents; JSON
//! files parse as single-document YAML.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Files on disk to domain objects

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::domain::mock::ValuesSpec;
use crate::domain::object::UnstructuredObject;
use crate::domain::policy::Policy;

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid document in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Manifest files under `path`: the path itself when it is a file, else
/// every manifest below it, sorted. Hidden entries are skipped.
pub fn manifest_files(path: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        return Err(LoadError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(|source| LoadError::Walk {
            path: path.to_path_buf(),
            source,
        })?;
        let is_manifest = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext));
        if entry.file_type().is_file() && is_manifest {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Every non-empty document found under `path`.
pub fn load_documents(path: &Path) -> Result<Vec<(PathBuf, Value)>, LoadError> {
    let mut documents = Vec::new();
    for file in manifest_files(path)? {
        let content = fs::read_to_string(&file).map_err(|source| LoadError::Io {
            path: file.clone(),
            source,
        })?;
        for document in parse_documents(&content).map_err(|source| LoadError::Yaml {
            path: file.clone(),
            source,
        })? {
            documents.push((file.clone(), document));
        }
    }
    debug!(path = %path.display(), documents = documents.len(), "Loaded manifests");
    Ok(documents)
}

/// Split multi-document YAML. Empty documents are dropped.
pub fn parse_documents(content: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

pub fn load_policies(paths: &[PathBuf]) -> Result<Vec<Policy>, LoadError> {
    let mut policies = Vec::new();
    for path in paths {
        for (file, document) in load_documents(path)? {
            let policy = Policy::from_value(document).map_err(|e| LoadError::Invalid {
                path: file,
                reason: e.to_string(),
            })?;
            policies.push(policy);
        }
    }
    Ok(policies)
}

/// Raw resource documents. Validation happens when a backend seeds them, so
/// one malformed object does not stop a run.
pub fn load_resource_documents(paths: &[PathBuf]) -> Result<Vec<Value>, LoadError> {
    let mut documents = Vec::new();
    for path in paths {
        documents.extend(load_documents(path)?.into_iter().map(|(_, doc)| doc));
    }
    Ok(documents)
}

pub fn load_resources(paths: &[PathBuf]) -> Result<Vec<UnstructuredObject>, LoadError> {
    let mut resources = Vec::new();
    for path in paths {
        for (file, document) in load_documents(path)? {
            let resource = UnstructuredObject::from_value(document).map_err(|e| LoadError::Invalid {
                path: file,
                reason: e.to_string(),
            })?;
            resources.push(resource);
        }
    }
    Ok(resources)
}

/// CustomResourceDefinitions under `paths`. Other kinds are rejected.
pub fn load_crds(paths: &[PathBuf]) -> Result<Vec<UnstructuredObject>, LoadError> {
    let crds = load_resources(paths)?;
    if let Some(other) = crds.iter().find(|o| o.kind() != "CustomResourceDefinition") {
        return Err(LoadError::Invalid {
            path: paths.first().cloned().unwrap_or_default(),
            reason: format!("{} is not a CustomResourceDefinition", other.identity()),
        });
    }
    Ok(crds)
}

pub fn load_values(path: &Path) -> Result<ValuesSpec, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: require-labels
spec:
  rules:
    - name: check-team
      match:
        any:
          - resources:
              kinds: [Pod]
      validate:
        pattern:
          metadata:
            labels:
              team: "?*"
"#;

    #[test]
    fn test_multi_document_files() {
        let docs = parse_documents("---\na: 1\n---\n---\nb: 2\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["b"], 2);
    }

    #[test]
    fn test_directory_walk_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.yaml"), "kind: B\n").unwrap();
        fs::write(dir.path().join("a.json"), r#"{"kind": "A"}"#).unwrap();
        fs::write(nested.join("c.yml"), "kind: C\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "kind: ignored\n").unwrap();
        fs::write(dir.path().join(".hidden.yaml"), "kind: ignored\n").unwrap();

        let kinds: Vec<String> = load_documents(dir.path())
            .unwrap()
            .into_iter()
            .map(|(_, doc)| doc["kind"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_load_policies_and_resources() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("policy.yaml");
        fs::write(&policy, POLICY).unwrap();
        let resource = dir.path().join("pod.yaml");
        fs::write(
            &resource,
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n---\napiVersion: v1\nkind: Pod\nmetadata:\n  name: db\n",
        )
        .unwrap();

        let policies = load_policies(&[policy]).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name(), "require-labels");

        let resources = load_resources(&[resource.clone()]).unwrap();
        assert_eq!(resources.iter().map(|r| r.name()).collect::<Vec<_>>(), vec!["web", "db"]);
        assert_eq!(load_resource_documents(&[resource]).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(load_documents(&missing), Err(LoadError::Io { .. })));

        let broken = dir.path().join("broken.yaml");
        fs::write(&broken, "kind: [unclosed\n").unwrap();
        assert!(matches!(load_documents(&broken), Err(LoadError::Yaml { .. })));

        let pod = dir.path().join("pod.yaml");
        fs::write(&pod, "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n").unwrap();
        assert!(matches!(load_crds(&[pod]), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn test_load_values() {
        let dir = tempfile::tempdir().unwrap();
        let values = dir.path().join("values.yaml");
        fs::write(
            &values,
            r#"
mocks:
  apiCalls:
    - urlPath: /api/v1/namespaces/{{namespace}}/configmaps
      response: {items: []}
  globalContext:
    - name: registry
      value: ghcr.io
"#,
        )
        .unwrap();

        let spec = load_values(&values).unwrap();
        let mocks = spec.mocks.unwrap();
        assert_eq!(mocks.api_calls.len(), 1);
        assert_eq!(mocks.data[0].name, "registry");
    }
}
