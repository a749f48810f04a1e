//! Routing between registries: property routes, class routes and the
//! registry doing the traversal.

use json_class_codec::{
    Class, ClassBuilder, ConfigurationError, Obj, Registry, RegistryOptions, Value,
};
use serde_json::json;

/// Registries with distinct type keys make the handling registry visible in
/// the output.
fn registry(type_key: &str) -> Registry {
    Registry::with_options(RegistryOptions {
        type_key: type_key.to_string(),
        ..RegistryOptions::default()
    })
}

fn leaf(name: &str, registries: &[&Registry]) -> Class {
    ClassBuilder::new(name, registries.iter().copied())
        .unwrap()
        .constructor(|this| {
            this.set("id", 0);
        })
        .register()
        .unwrap()
}

fn field(value: &Value, key: &str) -> Value {
    value.as_obj().unwrap().get(key).unwrap()
}

#[test]
fn property_route_beats_class_route_beats_home_codec() {
    let a = registry("_a");
    let b = registry("_b");
    let c = registry("_c");
    let gadget = leaf("Gadget", &[&a, &b, &c]);
    let widget = leaf("Widget", &[&a]);

    let g = gadget.clone();
    let holder = ClassBuilder::new("Holder", [&a])
        .unwrap()
        .constructor(move |this| {
            this.set("prop", g.instantiate());
            this.set("cls", g.instantiate());
        })
        .delegate_prop("prop", &b)
        .delegates_to(&gadget, &c)
        .register()
        .unwrap();

    let h = holder.instantiate();
    h.set("late", gadget.instantiate());
    h.set("widget", widget.instantiate());

    let json = a.to_json(&h.clone().into()).unwrap();
    assert_eq!(
        json,
        json!({
            "_a": "Holder",
            "prop": {"_b": "Gadget", "id": 0},
            "cls": {"_c": "Gadget", "id": 0},
            "late": {"_c": "Gadget", "id": 0},
            "widget": {"_a": "Widget", "id": 0}
        })
    );

    let back = a.from_json(&json).unwrap();
    assert!(back.is_instance_of(&holder));
    for key in ["prop", "cls", "late"] {
        assert!(field(&back, key).is_instance_of(&gadget), "key: {}", key);
    }
    assert!(field(&back, "widget").is_instance_of(&widget));
    assert_eq!(back, Value::from(h));
}

#[test]
fn single_home_codec_is_adopted_for_nested_instances() {
    let app = registry("_app");
    let parts = registry("_parts");
    let engine = leaf("Engine", &[&parts]);
    let e = engine.clone();
    let car = ClassBuilder::new("Car", [&app])
        .unwrap()
        .constructor(move |this| {
            this.set("engine", e.instantiate());
            this.set("doors", 4);
        })
        .register()
        .unwrap();

    let text = app.stringify(&car.instantiate().into()).unwrap();
    assert_eq!(
        text,
        r#"{"_app":"Car","engine":{"_parts":"Engine","id":0},"doors":4}"#
    );
    let back = app.parse(&text).unwrap();
    assert!(back.is_instance_of(&car));
    assert!(field(&back, "engine").is_instance_of(&engine));
}

#[test]
fn multi_codec_class_round_trips_through_either_home() {
    let a = registry("_a");
    let b = registry("_b");
    let shared = leaf("Shared", &[&a, &b]);
    let s = shared.instantiate();
    s.set("id", 9);
    let value = Value::from(s);

    for home in [&a, &b] {
        let text = home.stringify(&value).unwrap();
        let back = home.parse(&text).unwrap();
        assert!(back.is_instance_of(&shared));
        assert_eq!(back, value);
    }
    assert_eq!(a.stringify(&value).unwrap(), r#"{"_a":"Shared","id":9}"#);
    assert_eq!(b.stringify(&value).unwrap(), r#"{"_b":"Shared","id":9}"#);
}

#[test]
fn multi_codec_class_needs_explicit_route_when_nested() {
    let a = registry("_a");
    let b = registry("_b");
    let c = registry("_c");
    let shared = leaf("Shared", &[&a, &b]);

    let s = shared.clone();
    let err = ClassBuilder::new("Outer", [&c])
        .unwrap()
        .constructor(move |this| {
            this.set("inner", s.instantiate());
        })
        .register()
        .unwrap_err();
    match err {
        ConfigurationError::AmbiguousDelegation {
            class,
            property,
            value_class,
            count,
        } => {
            assert_eq!(class, "Outer");
            assert_eq!(property, "inner");
            assert_eq!(value_class, "Shared");
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(c.resolve("Outer").is_none());

    let s = shared.clone();
    let outer = ClassBuilder::new("Outer", [&c])
        .unwrap()
        .constructor(move |this| {
            this.set("inner", s.instantiate());
        })
        .delegates_to(&shared, &b)
        .register()
        .unwrap();

    let text = c.stringify(&outer.instantiate().into()).unwrap();
    assert_eq!(text, r#"{"_c":"Outer","inner":{"_b":"Shared","id":0}}"#);
    let back = c.parse(&text).unwrap();
    assert!(field(&back, "inner").is_instance_of(&shared));
}

#[test]
fn property_route_covers_whole_arrays() {
    let app = registry("_app");
    let parts = registry("_parts");
    let engine = leaf("Engine", &[&parts]);
    let garage = ClassBuilder::new("Garage", [&app])
        .unwrap()
        .constructor(|this| {
            this.set("engines", Value::Array(Vec::new()));
        })
        .delegate_prop("engines", &parts)
        .register()
        .unwrap();

    let g = garage.instantiate();
    g.set(
        "engines",
        vec![Value::from(engine.instantiate()), Value::from(engine.instantiate())],
    );
    let json = app.to_json(&g.into()).unwrap();
    assert_eq!(
        json,
        json!({
            "_app": "Garage",
            "engines": [{"_parts": "Engine", "id": 0}, {"_parts": "Engine", "id": 0}]
        })
    );
    let back = app.from_json(&json).unwrap();
    let engines = field(&back, "engines");
    assert!(engines
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e.is_instance_of(&engine)));
}

#[test]
fn array_elements_get_no_parent_context() {
    let app = registry("_app");
    let parts = registry("_parts");
    let engine = leaf("Engine", &[&parts, &app]);
    let fleet = ClassBuilder::new("Fleet", [&app])
        .unwrap()
        .delegates_to(&engine, &parts)
        .register()
        .unwrap();

    let f = fleet.instantiate();
    f.set("single", engine.instantiate());
    f.set("many", vec![Value::from(engine.instantiate())]);
    let json = app.to_json(&f.into()).unwrap();
    assert_eq!(json["single"], json!({"_parts": "Engine", "id": 0}));
    assert_eq!(json["many"], json!([{"_app": "Engine", "id": 0}]));
}

#[test]
fn property_route_to_foreign_registry_drops_tags() {
    let app = registry("_app");
    let raw = registry("_raw");
    let point = leaf("Point", &[&app]);
    let p = point.clone();
    let label = ClassBuilder::new("Label", [&app])
        .unwrap()
        .constructor(move |this| {
            this.set("anchor", p.instantiate());
        })
        .delegate_prop("anchor", &raw)
        .register()
        .unwrap();

    let text = app.stringify(&label.instantiate().into()).unwrap();
    assert_eq!(text, r#"{"_app":"Label","anchor":{"id":0}}"#);
    let back = app.parse(&text).unwrap();
    let anchor = field(&back, "anchor");
    assert!(anchor.class().is_none());
}

#[test]
fn primitive_properties_follow_their_route() {
    let app = registry("_app");
    let other = registry("_other");
    let tagged = ClassBuilder::new("Tagged", [&app])
        .unwrap()
        .constructor(|this| {
            this.set("n", 1);
            this.set("plain", Obj::new());
        })
        .delegate_prop("n", &other)
        .register()
        .unwrap();
    let text = app.stringify(&tagged.instantiate().into()).unwrap();
    assert_eq!(text, r#"{"_app":"Tagged","n":1,"plain":{}}"#);
    let back = app.parse(&text).unwrap();
    assert_eq!(field(&back, "n"), Value::from(1));
}
