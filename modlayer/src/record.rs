//! Asset records: one entry per leaf or directory in the merged namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::accessor::DataAccessor;
use crate::classify::AssetKind;
use crate::vpath::VirtualPath;

/// Identifies the content source that contributed a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a source id from a stable name (e.g. the mod package id).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Owner id used for catalog-synthesized directory records.
    pub fn catalog() -> Self {
        Self("<catalog>".to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in the merged namespace.
///
/// Leaf records are produced by content sources; directory records are
/// synthesized by the catalog and carry no data accessor. Child enumeration
/// for directories goes through
/// [`OverlayCatalog::children`](crate::catalog::OverlayCatalog::children).
#[derive(Debug, Clone)]
pub struct AssetRecord {
    /// Normalized virtual path, unique as a catalog key.
    pub path: VirtualPath,

    /// The content source that contributed this record.
    pub source: SourceId,

    /// Semantic kind. Sources may leave this [`AssetKind::Unclassified`];
    /// the catalog classifies on insertion.
    pub kind: AssetKind,

    /// Format tag, normally the lowercased extension.
    pub format: String,

    /// Capability to open the record's byte stream.
    pub accessor: DataAccessor,
}

impl AssetRecord {
    /// Create an unclassified leaf record. The catalog assigns kind and
    /// format on insertion.
    pub fn new(path: VirtualPath, source: SourceId, accessor: DataAccessor) -> Self {
        Self {
            path,
            source,
            kind: AssetKind::Unclassified,
            format: String::new(),
            accessor,
        }
    }

    /// Create a synthesized directory record.
    pub fn directory(path: VirtualPath) -> Self {
        Self {
            path,
            source: SourceId::catalog(),
            kind: AssetKind::Directory,
            format: String::new(),
            accessor: DataAccessor::None,
        }
    }

    /// Pre-assign a kind (used by sources that know their content, e.g.
    /// synthetic generators).
    pub fn with_kind(mut self, kind: AssetKind) -> Self {
        self.kind = kind;
        self
    }

    /// Pre-assign a format tag.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// True for synthesized directory records.
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }
}

impl fmt::Display for AssetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.path, self.kind, self.source)
    }
}
