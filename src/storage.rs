//! Storage collaborator: collections and environments as YAML documents
//!
//! One `<name>.yaml` per collection, holding its folders and requests as a
//! nested document, and one `<name>.env.yaml` per environment. Node ids are
//! not stored; they are reassigned every time the tree is loaded.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::collection::{CollectionTree, Container, NodeId, NodeKind};
use crate::constants::CONFIG_FILE_NAME;
use crate::error::{StorageError, TreeError};
use crate::models::{Auth, HttpMethod, KeyValue, RequestTemplate};
use crate::variables::{Environment, VariableMap};

const COLLECTION_SUFFIX: &str = ".yaml";
const ENVIRONMENT_SUFFIX: &str = ".env.yaml";

/// Loads and saves collection trees and environments
pub trait Storage: Send + Sync {
    fn load_collections(&self) -> Result<CollectionTree, StorageError>;

    fn load_environments(&self) -> Result<Vec<Environment>, StorageError>;

    /// Write the whole collection rooted at `collection`
    fn save_collection(&self, tree: &CollectionTree, collection: NodeId) -> Result<(), StorageError>;

    /// Forget a collection that was deleted or renamed
    fn remove_collection(&self, name: &str) -> Result<(), StorageError>;

    fn save_environment(&self, environment: &Environment) -> Result<(), StorageError>;
}

/// A persisted collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "VariableMap::is_empty")]
    pub variables: VariableMap,
    #[serde(default)]
    pub items: Vec<ItemDocument>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemDocument {
    Folder {
        name: String,
        #[serde(default, skip_serializing_if = "VariableMap::is_empty")]
        variables: VariableMap,
        #[serde(default)]
        items: Vec<ItemDocument>,
    },
    Request(RequestDocument),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDocument {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Auth::is_none")]
    pub auth: Auth,
    #[serde(default, skip_serializing_if = "VariableMap::is_empty")]
    pub variables: VariableMap,
}

impl From<&RequestTemplate> for RequestDocument {
    fn from(template: &RequestTemplate) -> Self {
        RequestDocument {
            name: template.name.clone(),
            method: template.method,
            url: template.url.clone(),
            headers: template.headers.clone(),
            query: template.query.clone(),
            body: template.body.clone(),
            auth: template.auth.clone(),
            variables: template.variables.clone(),
        }
    }
}

impl From<RequestDocument> for RequestTemplate {
    fn from(doc: RequestDocument) -> Self {
        RequestTemplate {
            id: NodeId::default(),
            name: doc.name,
            method: doc.method,
            url: doc.url,
            headers: doc.headers,
            query: doc.query,
            body: doc.body,
            auth: doc.auth,
            variables: doc.variables,
        }
    }
}

impl CollectionDocument {
    /// Snapshot the collection rooted at `root`
    pub fn from_tree(tree: &CollectionTree, root: NodeId) -> Result<Self, TreeError> {
        let node = tree.get(root).ok_or(TreeError::UnknownNode(root))?;
        let container = node.as_container().ok_or(TreeError::NotAContainer(root))?;
        Ok(CollectionDocument {
            name: container.name.clone(),
            variables: container.variables.clone(),
            items: items_of(tree, root),
        })
    }

    /// Add this collection to `tree` as a new root
    pub fn insert_into(self, tree: &mut CollectionTree) -> Result<NodeId, TreeError> {
        let root = tree.add_collection(self.name.clone());
        tree.replace_container(
            root,
            Container {
                name: self.name,
                variables: self.variables,
            },
        )?;
        insert_items(tree, root, self.items)?;
        Ok(root)
    }
}

fn items_of(tree: &CollectionTree, parent: NodeId) -> Vec<ItemDocument> {
    tree.children(parent)
        .iter()
        .filter_map(|child| tree.get(*child))
        .map(|node| match &node.kind {
            NodeKind::Request(template) => ItemDocument::Request(template.into()),
            NodeKind::Folder(c) | NodeKind::Collection(c) => ItemDocument::Folder {
                name: c.name.clone(),
                variables: c.variables.clone(),
                items: items_of(tree, node.id),
            },
        })
        .collect()
}

fn insert_items(tree: &mut CollectionTree, parent: NodeId, items: Vec<ItemDocument>) -> Result<(), TreeError> {
    for item in items {
        match item {
            ItemDocument::Folder { name, variables, items } => {
                let folder = tree.add_folder(parent, name.clone())?;
                tree.replace_container(folder, Container { name, variables })?;
                insert_items(tree, folder, items)?;
            }
            ItemDocument::Request(doc) => {
                tree.add_request(parent, doc.into())?;
            }
        }
    }
    Ok(())
}

/// Turn a display name into a safe file stem. Collections whose names share
/// a stem would share a document.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.').to_string();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}

/// YAML files in a single data directory
#[derive(Clone, Debug)]
pub struct YamlStorage {
    dir: PathBuf,
}

impl YamlStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        YamlStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", file_stem(name), COLLECTION_SUFFIX))
    }

    fn environment_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", file_stem(name), ENVIRONMENT_SUFFIX))
    }

    /// Ensure data directory exists
    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))
    }

    fn write_yaml<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let content = serde_yaml::to_string(value).map_err(|source| StorageError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(path, content).map_err(|source| io_error(path, source))
    }

    /// Files with `suffix`, sorted by name so load order is stable
    fn files(&self, accept: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, StorageError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|source| io_error(&self.dir, source))? {
            let path = entry.map_err(|source| io_error(&self.dir, source))?.path();
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if accept(filename) {
                    paths.push(path);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let content = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    serde_yaml::from_str(&content).map_err(|source| StorageError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

impl Storage for YamlStorage {
    /// Malformed files are skipped with a warning so one bad document does
    /// not hide the rest
    fn load_collections(&self) -> Result<CollectionTree, StorageError> {
        let mut tree = CollectionTree::new();
        let paths = self.files(|name| {
            name.ends_with(COLLECTION_SUFFIX) && !name.ends_with(ENVIRONMENT_SUFFIX) && name != CONFIG_FILE_NAME
        })?;
        for path in paths {
            match read_yaml::<CollectionDocument>(&path) {
                Ok(doc) => {
                    doc.insert_into(&mut tree)
                        .map_err(|e| StorageError::Other(anyhow::Error::new(e)))?;
                }
                Err(e) => tracing::warn!(error = %e, "Skipping collection"),
            }
        }
        Ok(tree)
    }

    fn load_environments(&self) -> Result<Vec<Environment>, StorageError> {
        let mut environments = Vec::new();
        for path in self.files(|name| name.ends_with(ENVIRONMENT_SUFFIX))? {
            match read_yaml::<Environment>(&path) {
                Ok(env) => environments.push(env),
                Err(e) => tracing::warn!(error = %e, "Skipping environment"),
            }
        }
        Ok(environments)
    }

    fn save_collection(&self, tree: &CollectionTree, collection: NodeId) -> Result<(), StorageError> {
        let doc = CollectionDocument::from_tree(tree, collection)
            .map_err(|e| StorageError::Other(anyhow::Error::new(e)))?;
        let path = self.collection_path(&doc.name);
        self.write_yaml(&path, &doc)?;
        tracing::debug!(path = %path.display(), "Collection saved");
        Ok(())
    }

    fn remove_collection(&self, name: &str) -> Result<(), StorageError> {
        let path = self.collection_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    fn save_environment(&self, environment: &Environment) -> Result<(), StorageError> {
        let path = self.environment_path(&environment.name);
        self.write_yaml(&path, environment)?;
        tracing::debug!(path = %path.display(), "Environment saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_tree() -> (CollectionTree, NodeId) {
        let mut tree = CollectionTree::new();
        let api = tree.add_collection("Users API");
        tree.replace_container(
            api,
            Container {
                name: "Users API".into(),
                variables: [("base".to_string(), "https://api.example.com".to_string())].into(),
            },
        )
        .unwrap();
        let admin = tree.add_folder(api, "admin").unwrap();
        tree.add_request(
            admin,
            RequestTemplate::new("Get user", HttpMethod::GET, "{{base}}/users/{{id}}")
                .with_header("Accept", "application/json")
                .with_variable("id", "42"),
        )
        .unwrap();
        let mut create = RequestTemplate::new("Create user", HttpMethod::POST, "{{base}}/users")
            .with_body(r#"{"name": "{{name}}"}"#);
        create.auth = Auth::Bearer {
            token: "{{token}}".into(),
        };
        tree.add_request(api, create).unwrap();
        (tree, api)
    }

    #[test]
    fn test_collection_round_trip_preserves_structure() {
        let dir = TempDir::new().unwrap();
        let storage = YamlStorage::new(dir.path());
        let (tree, api) = sample_tree();

        storage.save_collection(&tree, api).unwrap();
        assert!(dir.path().join("Users API.yaml").exists());

        let loaded = storage.load_collections().unwrap();
        assert_eq!(loaded.roots().len(), 1);
        let root = loaded.roots()[0];
        assert_eq!(
            CollectionDocument::from_tree(&loaded, root).unwrap(),
            CollectionDocument::from_tree(&tree, api).unwrap()
        );
    }

    #[test]
    fn test_loaded_requests_keep_scope_chain() {
        let dir = TempDir::new().unwrap();
        let storage = YamlStorage::new(dir.path());
        let (tree, api) = sample_tree();
        storage.save_collection(&tree, api).unwrap();

        let loaded = storage.load_collections().unwrap();
        let root = loaded.roots()[0];
        let folder = loaded.children(root)[0];
        let request = loaded.children(folder)[0];
        let chain = loaded.scope_chain(request, None).unwrap();
        assert_eq!(chain.resolve("id").unwrap(), "42");
        assert_eq!(chain.resolve("base").unwrap(), "https://api.example.com");
    }

    #[test]
    fn test_environment_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = YamlStorage::new(dir.path());
        let env = Environment::new("staging").with("base", "https://staging.example.com");

        storage.save_environment(&env).unwrap();
        assert!(dir.path().join("staging.env.yaml").exists());
        assert_eq!(storage.load_environments().unwrap(), vec![env]);
        // environment files are never mistaken for collections
        assert!(storage.load_collections().unwrap().is_empty());
    }

    #[test]
    fn test_missing_dir_loads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = YamlStorage::new(dir.path().join("absent"));
        assert!(storage.load_collections().unwrap().is_empty());
        assert!(storage.load_environments().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_and_config_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.yaml"), "name: [unclosed").unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "request_timeout_secs: 5\n").unwrap();
        let storage = YamlStorage::new(dir.path());
        let (tree, api) = sample_tree();
        storage.save_collection(&tree, api).unwrap();

        let loaded = storage.load_collections().unwrap();
        assert_eq!(loaded.roots().len(), 1);
    }

    #[test]
    fn test_remove_collection() {
        let dir = TempDir::new().unwrap();
        let storage = YamlStorage::new(dir.path());
        let (tree, api) = sample_tree();
        storage.save_collection(&tree, api).unwrap();

        storage.remove_collection("Users API").unwrap();
        storage.remove_collection("never saved").unwrap();
        assert!(storage.load_collections().unwrap().is_empty());
    }

    #[test]
    fn test_save_into_unwritable_path_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let storage = YamlStorage::new(blocker.join("nested"));
        let result = storage.save_environment(&Environment::new("dev"));
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[test]
    fn test_every_auth_kind_survives_reload() {
        let dir = TempDir::new().unwrap();
        let storage = YamlStorage::new(dir.path());
        let auths = vec![
            Auth::None,
            Auth::Bearer {
                token: "{{token}}".into(),
            },
            Auth::Basic {
                username: "{{user}}".into(),
                password: "p:w".into(),
            },
        ];

        let mut tree = CollectionTree::new();
        let api = tree.add_collection("auth");
        let folder = tree.add_folder(api, "nested").unwrap();
        for (i, auth) in auths.iter().enumerate() {
            let mut template = RequestTemplate::new(format!("r{}", i), HttpMethod::GET, "https://h/");
            template.auth = auth.clone();
            tree.add_request(folder, template).unwrap();
        }
        storage.save_collection(&tree, api).unwrap();

        let content = fs::read_to_string(dir.path().join("auth.yaml")).unwrap();
        assert!(!content.contains('!'), "no YAML tags expected:\n{}", content);

        let loaded = storage.load_collections().unwrap();
        assert_eq!(loaded.roots().len(), 1);
        let loaded_folder = loaded.children(loaded.roots()[0])[0];
        let loaded_auths: Vec<Auth> = loaded
            .children(loaded_folder)
            .iter()
            .map(|id| loaded.request(*id).unwrap().auth.clone())
            .collect();
        assert_eq!(loaded_auths, auths);
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("a/b:c"), "a_b_c");
        assert_eq!(file_stem("  "), "unnamed");
        assert_eq!(file_stem(".."), "unnamed");
        assert_eq!(file_stem("a/b"), file_stem("a_b"));
    }
}
