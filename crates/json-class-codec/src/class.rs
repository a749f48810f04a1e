//! Class declaration and finalization.
//!
//! A [`ClassBuilder`] collects the home registries of a class and any
//! explicit routing overrides. [`ClassBuilder::register`] materializes a
//! representative instance, infers routes for its class-typed properties,
//! and registers the finalized [`Class`] with every home registry.
//!
//! # Example
//!
//! ```
//! use json_class_codec::{ClassBuilder, Registry};
//!
//! let registry = Registry::new();
//! let point = ClassBuilder::new("Point", [&registry])
//!     .unwrap()
//!     .constructor(|this| {
//!         this.set("x", 0);
//!         this.set("y", 0);
//!     })
//!     .register()
//!     .unwrap();
//!
//! let p = point.instantiate();
//! p.set("x", 3);
//! let text = registry.stringify(&p.into()).unwrap();
//! assert_eq!(text, r#"{"_type":"Point","x":3,"y":0}"#);
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::descriptor::{ClassDelegate, Descriptor};
use crate::error::ConfigurationError;
use crate::registry::{Registry, WeakRegistry};
use crate::value::Obj;

type Constructor = Arc<dyn Fn(&Obj) + Send + Sync>;

struct ClassInner {
    name: String,
    constructor: Option<Constructor>,
    descriptor: Descriptor,
    /// Own keys of the representative instance.
    sample_keys: Vec<String>,
}

/// A finalized class. Cheap to clone; compared by identity.
#[derive(Clone)]
pub struct Class(Arc<ClassInner>);

impl Class {
    /// The class name, used as its type tag.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Routing table computed at finalization.
    pub fn descriptor(&self) -> &Descriptor {
        &self.0.descriptor
    }

    /// Creates a new instance and runs the constructor on it.
    pub fn instantiate(&self) -> Obj {
        let obj = Obj::bare(self.clone());
        if let Some(constructor) = &self.0.constructor {
            constructor(&obj);
        }
        obj
    }

    pub(crate) fn owns_key(&self, key: &str) -> bool {
        self.0.sample_keys.iter().any(|k| k == key)
    }

    /// Whether both handles refer to the same finalized class.
    pub fn ptr_eq(&self, other: &Class) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.0.name)
    }
}

/// Fluent declaration of a class and its routing overrides.
pub struct ClassBuilder {
    name: String,
    home_codecs: Vec<Registry>,
    constructor: Option<Constructor>,
    property_delegates: IndexMap<String, Registry>,
    class_delegates: IndexMap<String, (Class, Registry)>,
}

impl ClassBuilder {
    /// Starts a declaration of class `name` with its home registries.
    ///
    /// The first registry is the default codec of the class.
    pub fn new<'a>(
        name: impl Into<String>,
        registries: impl IntoIterator<Item = &'a Registry>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let mut home_codecs: Vec<Registry> = Vec::new();
        for registry in registries {
            if home_codecs.iter().any(|r| r.ptr_eq(registry)) {
                return Err(ConfigurationError::DuplicateHomeCodec { class: name });
            }
            home_codecs.push(registry.clone());
        }
        if home_codecs.is_empty() {
            return Err(ConfigurationError::NoHomeCodec { class: name });
        }
        Ok(ClassBuilder {
            name,
            home_codecs,
            constructor: None,
            property_delegates: IndexMap::new(),
            class_delegates: IndexMap::new(),
        })
    }

    /// Sets the constructor that populates the own properties of new
    /// instances. It also runs once during [`register`](Self::register) to
    /// build the representative instance used for route inference.
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Obj) + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// Routes property `name` to `registry`. Last call wins.
    pub fn delegate_prop(mut self, name: impl Into<String>, registry: &Registry) -> Self {
        self.property_delegates.insert(name.into(), registry.clone());
        self
    }

    /// Routes instances of `class` held by this class to `registry`.
    /// Last call wins.
    pub fn delegates_to(mut self, class: &Class, registry: &Registry) -> Self {
        self.class_delegates
            .insert(class.name().to_owned(), (class.clone(), registry.clone()));
        self
    }

    /// Finalizes the class: infers property routes, then registers the class
    /// with every home registry.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::ReservedKey`] if an own property shadows the
    ///   type key of a home registry.
    /// - [`ConfigurationError::AmbiguousDelegation`] if an own property holds
    ///   an instance of a class with several home registries and no
    ///   `delegates_to` entry.
    /// - [`ConfigurationError::DuplicateTag`] if a home registry rejects the
    ///   tag. No registry is modified in that case.
    pub fn register(self) -> Result<Class, ConfigurationError> {
        let sample = Obj::new();
        if let Some(constructor) = &self.constructor {
            constructor(&sample);
        }

        let property_delegates = self.infer_property_delegates(&sample)?;
        let class_delegates = self
            .class_delegates
            .iter()
            .map(|(tag, (class, registry))| {
                let delegate = ClassDelegate {
                    class: class.clone(),
                    registry: registry.downgrade(),
                };
                (tag.clone(), delegate)
            })
            .collect();
        let descriptor = Descriptor::new(
            self.home_codecs.iter().map(Registry::downgrade).collect(),
            class_delegates,
            property_delegates,
        );

        let class = Class(Arc::new(ClassInner {
            name: self.name,
            constructor: self.constructor,
            descriptor,
            sample_keys: sample.keys(),
        }));

        for registry in &self.home_codecs {
            registry.admit(&class)?;
        }
        for registry in &self.home_codecs {
            registry.insert(&class);
        }
        debug!(
            class = class.name(),
            home_codecs = self.home_codecs.len(),
            routed_properties = class.descriptor().delegated_properties().len(),
            "class registered"
        );
        Ok(class)
    }

    fn infer_property_delegates(
        &self,
        sample: &Obj,
    ) -> Result<IndexMap<String, WeakRegistry>, ConfigurationError> {
        let mut routes: IndexMap<String, WeakRegistry> = self
            .property_delegates
            .iter()
            .map(|(name, registry)| (name.clone(), registry.downgrade()))
            .collect();

        for (property, value) in sample.entries() {
            if routes.contains_key(&property) {
                continue;
            }
            // Primitives, arrays and plain objects fall through to the
            // registry doing the traversal.
            let Some(value_class) = value.class() else {
                continue;
            };

            let target = match self.class_delegates.get(value_class.name()) {
                Some((class, registry)) if *class == value_class => registry.clone(),
                _ => {
                    let homes = value_class
                        .descriptor()
                        .home_codecs_checked(value_class.name())?;
                    if homes.len() != 1 {
                        return Err(ConfigurationError::AmbiguousDelegation {
                            class: self.name.clone(),
                            property,
                            value_class: value_class.name().to_owned(),
                            count: homes.len(),
                        });
                    }
                    homes[0].clone()
                }
            };
            trace!(
                class = self.name.as_str(),
                property = property.as_str(),
                value_class = value_class.name(),
                "inferred property route"
            );
            routes.insert(property, target.downgrade());
        }
        Ok(routes)
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("home_codecs", &self.home_codecs.len())
            .field("property_delegates", &self.property_delegates.keys())
            .field("class_delegates", &self.class_delegates.keys())
            .finish()
    }
}
