use crate::error::BoundaryError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

// Reserved words that can never appear as a segment of a module or package
// name. `module`, `exports`, `requires` and friends are restricted keywords
// and stay legal as identifiers.
const RESERVED: &[&str] = &[
    "abstract",
    "assert",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extends",
    "final",
    "finally",
    "float",
    "for",
    "goto",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "short",
    "static",
    "strictfp",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "try",
    "void",
    "volatile",
    "while",
    "true",
    "false",
    "null",
    "_",
];

/// Fully qualified package name (e.g., `love.forte.codegentle.common.code`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

/// Module name as declared after the `module` keyword.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleName(String);

/// Fully qualified type name used by `uses`/`provides` directives.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeName(String);

macro_rules! dotted_name {
    ($ty:ident, $kind:literal) => {
        impl $ty {
            /// Parse and validate a dotted identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, BoundaryError> {
                let value = value.into();
                if is_dotted_identifier(&value) {
                    Ok(Self(value))
                } else {
                    Err(BoundaryError::InvalidName {
                        kind: $kind,
                        value,
                    })
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                $ty::new(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

dotted_name!(PackageName, "package");
dotted_name!(ModuleName, "module");
dotted_name!(TypeName, "type");

impl PackageName {
    /// Short name relative to the module namespace.
    ///
    /// `love.forte.codegentle.common.code` relative to module
    /// `love.forte.codegentle.common` is `code`. The module's root package and
    /// packages outside the namespace keep their full name.
    pub fn relative_to(&self, module: &ModuleName) -> &str {
        self.0
            .strip_prefix(module.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&self.0)
    }

    /// Resolve a short package name inside a module namespace.
    pub fn resolve(module: &ModuleName, short: &str) -> Result<Self, BoundaryError> {
        Self::new(format!("{}.{short}", module.as_str()))
    }
}

/// Who may read an exported package.
///
/// Serialized as the string `"public"` or `{"restricted_to": [..]}`.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum Visibility {
    #[default]
    Public,
    RestrictedTo(BTreeSet<ModuleName>),
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }

    /// Restriction targets; empty for public exports.
    pub fn targets(&self) -> impl Iterator<Item = &ModuleName> {
        let targets = match self {
            Visibility::Public => None,
            Visibility::RestrictedTo(set) => Some(set.iter()),
        };
        targets.into_iter().flatten()
    }

    pub fn label(&self) -> String {
        match self {
            Visibility::Public => "public".to_string(),
            Visibility::RestrictedTo(set) => {
                let names = set.iter().map(ModuleName::as_str).collect::<Vec<_>>();
                format!("restricted-to({})", names.join(", "))
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VisibilityRepr {
    Keyword(String),
    Restricted { restricted_to: Vec<ModuleName> },
}

impl Serialize for Visibility {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self {
            Visibility::Public => VisibilityRepr::Keyword("public".to_string()),
            Visibility::RestrictedTo(set) => VisibilityRepr::Restricted {
                restricted_to: set.iter().cloned().collect(),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match VisibilityRepr::deserialize(deserializer)? {
            VisibilityRepr::Keyword(word) if word == "public" => Ok(Visibility::Public),
            VisibilityRepr::Keyword(other) => Err(serde::de::Error::custom(format!(
                "unknown visibility '{other}', expected \"public\" or {{\"restricted_to\": [..]}}"
            ))),
            VisibilityRepr::Restricted { restricted_to } if restricted_to.is_empty() => Err(
                serde::de::Error::custom("restricted_to must name at least one module"),
            ),
            VisibilityRepr::Restricted { restricted_to } => {
                Ok(Visibility::RestrictedTo(restricted_to.into_iter().collect()))
            }
        }
    }
}

/// Free-text note attached to an export whose restriction is still undecided.
///
/// Notes live in a single `// TODO` line when rendered, so the canonical form
/// is one line: whitespace runs collapse to a space and leading `:` / `*`
/// separators are dropped.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProvisionalNote(pub String);

impl ProvisionalNote {
    pub fn new(text: &str) -> Self {
        Self(canonical_note(text))
    }
}

impl<'de> Deserialize<'de> for ProvisionalNote {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ok(ProvisionalNote::new(&text))
    }
}

pub(crate) fn canonical_note(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_start_matches([':', '*', ' ']).to_string()
}

pub(crate) fn is_java_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    !RESERVED.contains(&segment)
}

pub(crate) fn is_dotted_identifier(value: &str) -> bool {
    !value.is_empty() && value.split('.').all(is_java_identifier)
}
