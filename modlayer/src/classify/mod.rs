//! Path classification: semantic asset kind and format from a virtual path.
//!
//! Classification is a pure function of the path. A [`PathClassifier`] holds
//! an ordered chain of `(predicate, classifier)` rules tried in registration
//! order; the first matching rule wins and may also rewrite the virtual path
//! (e.g. stripping a recognized suffix). When no rule matches, a built-in
//! extension table decides. Unrecognized extensions classify as
//! [`AssetKind::Binary`] rather than failing.

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::vpath::VirtualPath;

/// Semantic classification of an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Synthesized directory node. Never contributed by a source.
    Directory,

    /// Image data destined for the rendering host.
    Texture,

    /// Structured text (JSON, XML, ...), typically parsed into datasets.
    StructuredData,

    /// Localized text. Multiple sources may coexist at the same path.
    Dialog,

    /// Sound data.
    Audio,

    /// Informational side files (readmes, metadata). Conflict-exempt.
    Metadata,

    /// Anything without a recognized classification.
    Binary,

    /// Not yet classified. Records carrying this kind are classified on
    /// catalog insertion and never stored.
    Unclassified,
}

impl AssetKind {
    /// True for synthesized directory nodes.
    pub fn is_directory(&self) -> bool {
        matches!(self, AssetKind::Directory)
    }

    /// True for kinds exempt from override-conflict warnings.
    ///
    /// Directories always coexist; dialog and metadata entries are expected
    /// to be contributed by several sources at the same path.
    pub fn is_non_conflicting(&self) -> bool {
        matches!(
            self,
            AssetKind::Directory | AssetKind::Dialog | AssetKind::Metadata
        )
    }

    /// True for the pre-classification sentinel.
    pub fn is_unclassified(&self) -> bool {
        matches!(self, AssetKind::Unclassified)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Directory => "directory",
            AssetKind::Texture => "texture",
            AssetKind::StructuredData => "structured-data",
            AssetKind::Dialog => "dialog",
            AssetKind::Audio => "audio",
            AssetKind::Metadata => "metadata",
            AssetKind::Binary => "binary",
            AssetKind::Unclassified => "unclassified",
        };
        write!(f, "{}", name)
    }
}

/// Result of classifying a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Semantic kind assigned to the record.
    pub kind: AssetKind,

    /// Format tag, normally the lowercased extension (may be empty).
    pub format: String,

    /// Replacement virtual path, when the rule truncates or rewrites the
    /// path (e.g. stripping a recognized suffix). `None` keeps the path.
    pub rewrite: Option<VirtualPath>,
}

impl Classification {
    /// Classification that keeps the path unchanged.
    pub fn new(kind: AssetKind, format: impl Into<String>) -> Self {
        Self {
            kind,
            format: format.into(),
            rewrite: None,
        }
    }

    /// Classification that also rewrites the virtual path.
    pub fn with_rewrite(
        kind: AssetKind,
        format: impl Into<String>,
        rewrite: VirtualPath,
    ) -> Self {
        Self {
            kind,
            format: format.into(),
            rewrite: Some(rewrite),
        }
    }
}

type Predicate = dyn Fn(&VirtualPath) -> bool + Send + Sync;
type ClassifyFn = dyn Fn(&VirtualPath) -> Classification + Send + Sync;

/// One extension-point rule: a predicate plus the classifier applied when
/// the predicate matches.
pub struct ClassifierRule {
    name: String,
    matches: Box<Predicate>,
    classify: Box<ClassifyFn>,
}

impl ClassifierRule {
    /// Create a rule from a predicate and a classifier function.
    pub fn new(
        name: impl Into<String>,
        matches: impl Fn(&VirtualPath) -> bool + Send + Sync + 'static,
        classify: impl Fn(&VirtualPath) -> Classification + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            matches: Box::new(matches),
            classify: Box::new(classify),
        }
    }

    /// The rule name (used in trace output).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ClassifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered rule chain with a built-in extension-table fallback.
#[derive(Debug, Default)]
pub struct PathClassifier {
    rules: RwLock<Vec<ClassifierRule>>,
}

impl PathClassifier {
    /// Create a classifier with no extension rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Rules are tried in registration order; the first whose
    /// predicate matches wins.
    pub fn register_rule(&self, rule: ClassifierRule) {
        tracing::debug!(rule = rule.name(), "registering classifier rule");
        self.rules.write().push(rule);
    }

    /// Classify a virtual path.
    pub fn classify(&self, path: &VirtualPath) -> Classification {
        for rule in self.rules.read().iter() {
            if (rule.matches)(path) {
                return (rule.classify)(path);
            }
        }
        default_classification(path)
    }

    /// Number of registered extension rules.
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }
}

/// Built-in extension-table classification.
///
/// Unrecognized extensions map to [`AssetKind::Binary`] with the extension
/// retained as the format tag.
pub fn default_classification(path: &VirtualPath) -> Classification {
    let ext = path
        .extension()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let kind = match ext.as_str() {
        "png" | "jpg" | "jpeg" | "bmp" | "tga" | "dds" => AssetKind::Texture,
        "json" | "xml" | "yaml" | "yml" | "toml" => AssetKind::StructuredData,
        "txt" | "lang" | "po" => AssetKind::Dialog,
        "ogg" | "wav" | "mp3" | "flac" => AssetKind::Audio,
        "md" | "meta" => AssetKind::Metadata,
        _ => AssetKind::Binary,
    };
    Classification {
        kind,
        format: ext,
        rewrite: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification_by_extension() {
        let cases = [
            ("sprites/a.png", AssetKind::Texture, "png"),
            ("sprites/A.PNG", AssetKind::Texture, "png"),
            ("data/items.json", AssetKind::StructuredData, "json"),
            ("dialog/en.txt", AssetKind::Dialog, "txt"),
            ("sound/hit.ogg", AssetKind::Audio, "ogg"),
            ("README.md", AssetKind::Metadata, "md"),
        ];
        for (path, kind, format) in cases {
            let c = default_classification(&VirtualPath::new(path));
            assert_eq!(c.kind, kind, "kind for {}", path);
            assert_eq!(c.format, format, "format for {}", path);
            assert!(c.rewrite.is_none());
        }
    }

    #[test]
    fn test_unrecognized_extension_is_binary() {
        let c = default_classification(&VirtualPath::new("blob.xyzzy"));
        assert_eq!(c.kind, AssetKind::Binary);
        assert_eq!(c.format, "xyzzy");
    }

    #[test]
    fn test_no_extension_is_binary() {
        let c = default_classification(&VirtualPath::new("LICENSE"));
        assert_eq!(c.kind, AssetKind::Binary);
        assert_eq!(c.format, "");
    }

    #[test]
    fn test_rule_order_first_match_wins() {
        let classifier = PathClassifier::new();
        classifier.register_rule(ClassifierRule::new(
            "all-audio",
            |_| true,
            |_| Classification::new(AssetKind::Audio, "ogg"),
        ));
        classifier.register_rule(ClassifierRule::new(
            "all-texture",
            |_| true,
            |_| Classification::new(AssetKind::Texture, "png"),
        ));

        let c = classifier.classify(&VirtualPath::new("anything"));
        assert_eq!(c.kind, AssetKind::Audio);
    }

    #[test]
    fn test_rule_falls_back_to_default() {
        let classifier = PathClassifier::new();
        classifier.register_rule(ClassifierRule::new(
            "never",
            |_| false,
            |_| Classification::new(AssetKind::Audio, "ogg"),
        ));

        let c = classifier.classify(&VirtualPath::new("a.png"));
        assert_eq!(c.kind, AssetKind::Texture);
    }

    #[test]
    fn test_rule_rewrites_path() {
        let classifier = PathClassifier::new();
        // A rule that strips a ".hot" staging suffix from texture names.
        classifier.register_rule(ClassifierRule::new(
            "hot-suffix",
            |p| p.as_str().ends_with(".png.hot"),
            |p| {
                let stripped = p.as_str().trim_end_matches(".hot");
                Classification::with_rewrite(
                    AssetKind::Texture,
                    "png",
                    VirtualPath::new(stripped),
                )
            },
        ));

        let c = classifier.classify(&VirtualPath::new("sprites/a.png.hot"));
        assert_eq!(c.kind, AssetKind::Texture);
        assert_eq!(c.rewrite, Some(VirtualPath::new("sprites/a.png")));
    }

    #[test]
    fn test_non_conflicting_kinds() {
        assert!(AssetKind::Directory.is_non_conflicting());
        assert!(AssetKind::Dialog.is_non_conflicting());
        assert!(AssetKind::Metadata.is_non_conflicting());
        assert!(!AssetKind::Texture.is_non_conflicting());
        assert!(!AssetKind::StructuredData.is_non_conflicting());
        assert!(!AssetKind::Binary.is_non_conflicting());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AssetKind::Texture.to_string(), "texture");
        assert_eq!(AssetKind::StructuredData.to_string(), "structured-data");
        assert_eq!(AssetKind::Directory.to_string(), "directory");
    }
}
