//! Class-aware JSON serialization.
//!
//! Classes are declared with a [`ClassBuilder`] and registered with one or
//! more [`Registry`] instances. A registry serializes object graphs to JSON
//! text, tagging instances of its classes with a reserved key (`_type` by
//! default), and parses such text back into instances of the original class.
//!
//! A class may route individual properties, or instances of specific
//! referenced classes, to a registry other than the one doing the traversal.
//! Routes for class-typed properties are inferred when the class is
//! registered; a property holding a class registered with several
//! registries must be routed explicitly with [`ClassBuilder::delegates_to`].
//!
//! # Example
//!
//! ```
//! use json_class_codec::{ClassBuilder, Registry, Value};
//!
//! let app = Registry::new();
//! let geo = Registry::new();
//!
//! let coords = ClassBuilder::new("Coords", [&geo])
//!     .unwrap()
//!     .constructor(|this| {
//!         this.set("lat", 0.0);
//!         this.set("lng", 0.0);
//!     })
//!     .register()
//!     .unwrap();
//!
//! let inner = coords.clone();
//! let place = ClassBuilder::new("Place", [&app])
//!     .unwrap()
//!     .constructor(move |this| {
//!         this.set("name", "");
//!         this.set("at", inner.instantiate());
//!     })
//!     .register()
//!     .unwrap();
//!
//! let home = place.instantiate();
//! home.set("name", "home");
//!
//! // `at` holds a `Coords`, which only `geo` knows, so `geo` handles it.
//! let text = app.stringify(&Value::from(home)).unwrap();
//! assert_eq!(
//!     text,
//!     r#"{"_type":"Place","name":"home","at":{"_type":"Coords","lat":0.0,"lng":0.0}}"#
//! );
//!
//! let back = app.parse(&text).unwrap();
//! let at = back.as_obj().unwrap().get("at").unwrap();
//! assert!(back.is_instance_of(&place));
//! assert!(at.is_instance_of(&coords));
//! ```

pub mod class;
pub mod descriptor;
pub mod error;
pub mod registry;
pub mod text;
pub mod value;

pub use class::{Class, ClassBuilder};
pub use descriptor::Descriptor;
pub use error::{CodecError, ConfigurationError};
pub use registry::{DuplicateTagPolicy, Registry, RegistryOptions, DEFAULT_TYPE_KEY};
pub use text::{Replacer, Reviver, Space};
pub use value::{Obj, Value};
