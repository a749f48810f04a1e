//! Per-class delegation table.

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::class::Class;
use crate::error::ConfigurationError;
use crate::registry::{Registry, WeakRegistry};

/// A referenced class routed to a specific registry.
#[derive(Debug, Clone)]
pub(crate) struct ClassDelegate {
    pub class: Class,
    pub registry: WeakRegistry,
}

/// Routing table attached to a finalized [`Class`].
///
/// Registries are held weakly: a registry owns the classes registered with
/// it, never the other way round.
#[derive(Debug, Clone)]
pub struct Descriptor {
    home_codecs: Vec<WeakRegistry>,
    class_delegates: IndexMap<String, ClassDelegate>,
    property_delegates: IndexMap<String, WeakRegistry>,
}

impl Descriptor {
    pub(crate) fn new(
        home_codecs: Vec<WeakRegistry>,
        class_delegates: IndexMap<String, ClassDelegate>,
        property_delegates: IndexMap<String, WeakRegistry>,
    ) -> Self {
        Descriptor {
            home_codecs,
            class_delegates,
            property_delegates,
        }
    }

    /// Registries the class was registered with, in declaration order.
    ///
    /// Dropped registries are skipped.
    pub fn home_codecs(&self) -> Vec<Registry> {
        self.home_codecs.iter().filter_map(WeakRegistry::upgrade).collect()
    }

    /// The first home registry.
    pub fn default_codec(&self) -> Option<Registry> {
        self.home_codecs.first().and_then(WeakRegistry::upgrade)
    }

    /// Registry handling property `name`, explicit or inferred.
    pub fn property_delegate(&self, name: &str) -> Option<Registry> {
        self.property_delegates.get(name).and_then(WeakRegistry::upgrade)
    }

    /// Registry handling instances of the class tagged `tag`.
    pub fn class_delegate(&self, tag: &str) -> Option<Registry> {
        self.class_delegates
            .get(tag)
            .and_then(|delegate| delegate.registry.upgrade())
    }

    /// Names of all properties with a routing entry.
    pub fn delegated_properties(&self) -> Vec<String> {
        self.property_delegates.keys().cloned().collect()
    }

    pub(crate) fn home_codecs_checked(&self, class: &str) -> Result<Vec<Registry>, ConfigurationError> {
        self.home_codecs
            .iter()
            .map(|weak| upgrade(weak, class))
            .collect()
    }

    pub(crate) fn property_target(
        &self,
        class: &str,
        key: &str,
    ) -> Result<Option<Registry>, ConfigurationError> {
        self.property_delegates
            .get(key)
            .map(|weak| upgrade(weak, class))
            .transpose()
    }

    /// Class delegation for a value of `value_class`.
    ///
    /// Matches on tag and identity, so an unrelated class reusing the tag is
    /// not rerouted.
    pub(crate) fn class_target(
        &self,
        class: &str,
        value_class: &Class,
    ) -> Result<Option<Registry>, ConfigurationError> {
        match self.class_delegates.get(value_class.name()) {
            Some(delegate) if delegate.class == *value_class => {
                upgrade(&delegate.registry, class).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Class delegation for a serialized object.
    ///
    /// Each target registry looks for the delegated tag under its own type
    /// key, so routes work across registries with different keys. Routes to
    /// dropped registries cannot match: nothing serialized through them
    /// exists.
    pub(crate) fn class_target_for_json(&self, map: &Map<String, JsonValue>) -> Option<Registry> {
        self.class_delegates.iter().find_map(|(tag, delegate)| {
            let registry = delegate.registry.upgrade()?;
            let type_key = registry.type_key();
            (map.get(&type_key).and_then(JsonValue::as_str) == Some(tag.as_str()))
                .then_some(registry)
        })
    }
}

fn upgrade(weak: &WeakRegistry, class: &str) -> Result<Registry, ConfigurationError> {
    weak.upgrade().ok_or_else(|| ConfigurationError::DroppedRegistry {
        class: class.to_owned(),
    })
}
