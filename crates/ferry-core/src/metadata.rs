//! Node metadata returned by providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a node is a file or a folder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// Description of an existing file or folder
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Name of the node
    pub name: String,
    /// Provider-relative path (or identifier) of the node
    pub path: String,
    /// File or folder
    pub kind: NodeKind,
    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// MIME type, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Last modification time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Provider specific version tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Provider specific attributes
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Children, populated by recursive transfers in completion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Metadata>,
}

impl Metadata {
    /// Metadata for a file
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, path, NodeKind::File)
    }

    /// Metadata for a folder
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, path, NodeKind::Folder)
    }

    fn new(name: impl Into<String>, path: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            size: None,
            content_type: None,
            modified: None,
            etag: None,
            extra: serde_json::Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Number of nodes in the `children` tree below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// Result of a metadata lookup: a single file, or a folder's direct children
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lookup {
    File(Metadata),
    Folder(Vec<Metadata>),
}

impl Lookup {
    /// Flatten into a list; a file becomes a one-item list
    pub fn into_items(self) -> Vec<Metadata> {
        match self {
            Lookup::File(metadata) => vec![metadata],
            Lookup::Folder(items) => items,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Lookup::Folder(_))
    }
}

/// A historical version of a file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Provider specific version identifier
    pub version: String,
    /// When this version was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Size of this version in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendant_count() {
        let mut root = Metadata::folder("root", "/root/");
        let mut sub = Metadata::folder("sub", "/root/sub/");
        sub.children.push(Metadata::file("b", "/root/sub/b"));
        root.children.push(Metadata::file("a", "/root/a"));
        root.children.push(sub);
        assert_eq!(root.descendant_count(), 3);
    }

    #[test]
    fn test_serialized_shape_omits_empty_fields() {
        let meta = Metadata::file("a.txt", "/a.txt").with_size(3);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["size"], 3);
        assert!(json.get("children").is_none());
        assert!(json.get("etag").is_none());
    }
}
