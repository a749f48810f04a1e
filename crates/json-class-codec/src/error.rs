use thiserror::Error;

/// Wiring mistakes detected while declaring or registering a class.
///
/// These are raised by [`ClassBuilder`](crate::ClassBuilder) and
/// [`Registry::register`](crate::Registry::register), before any value is
/// serialized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("class `{class}` must be registered with at least one registry")]
    NoHomeCodec { class: String },

    #[error("class `{class}` lists the same registry more than once")]
    DuplicateHomeCodec { class: String },

    #[error(
        "property `{property}` of class `{class}` holds a `{value_class}`, which is registered \
         with {count} registries; add an explicit `delegates_to({value_class}, registry)` entry"
    )]
    AmbiguousDelegation {
        class: String,
        property: String,
        value_class: String,
        count: usize,
    },

    #[error("class `{class}` owns a property named `{key}`, which is reserved for the type tag")]
    ReservedKey { class: String, key: String },

    #[error("tag `{tag}` is already registered to a different class")]
    DuplicateTag { tag: String },

    #[error("class `{class}` refers to a registry that has been dropped")]
    DroppedRegistry { class: String },
}

/// Errors returned by [`Registry::stringify`](crate::Registry::stringify) and
/// [`Registry::parse`](crate::Registry::parse).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Converting circular structure to JSON: property at `{path}` closes the circle")]
    CircularReference { path: String },

    #[error("Unknown type: {tag}")]
    UnknownType { tag: String },

    #[error("Invalid JSON: {0}")]
    Syntax(String),

    #[error("Failed to format JSON: {0}")]
    Format(String),
}

impl CodecError {
    /// Returns `true` for errors raised while wiring classes and registries.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CodecError::Configuration(_))
    }
}
