use std::collections::BTreeMap;

use tracing::debug;
use trellis_container::{Container, ContainerStore};
use trellis_types::{ContainerId, TypeKey, Value};

use crate::error::{MapError, MapResult};

/// Which spec child a synthesized field came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Attribute,
    Dataset,
    Group,
    Link,
}

/// One constructor field of a registered type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub doc: String,
    pub required: bool,
    pub kind: FieldKind,
}

/// Named constructor arguments for a factory call.
pub type FieldArgs = BTreeMap<String, Value>;

/// Implementation surface of a registered type: the seam through which
/// hand-written domain classes plug into the mapping engine.
///
/// The engine instantiates containers through this trait only, so a type
/// without a hand-written implementation can be served by a synthesized
/// [`ContainerClass`] instead.
pub trait ContainerFactory: Send + Sync {
    /// The type this factory instantiates.
    fn key(&self) -> &TypeKey;

    /// The nearest ancestor type with its own factory, if any.
    fn base(&self) -> Option<&TypeKey>;

    /// Every constructor field, base fields first.
    fn fields(&self) -> &[FieldDescriptor];

    /// Instantiate a container from named arguments.
    fn construct(
        &self,
        name: &str,
        args: FieldArgs,
        store: &mut ContainerStore,
    ) -> MapResult<ContainerId>;
}

/// Synthesized factory for a registered type without a hand-written
/// implementation.
///
/// Built from the type's resolved spec: the field set is the base
/// factory's fields followed by the fields the type declares beyond its
/// base. Construction validates arguments against that field set,
/// assigns them, and parents any container-valued argument.
pub struct ContainerClass {
    key: TypeKey,
    base: Option<TypeKey>,
    fields: Vec<FieldDescriptor>,
}

impl ContainerClass {
    /// Synthesize a class from the base factory's fields (empty for a
    /// root synthesis) plus the type's own descriptors.
    pub fn new(
        key: TypeKey,
        base: Option<TypeKey>,
        base_fields: &[FieldDescriptor],
        own_fields: Vec<FieldDescriptor>,
    ) -> Self {
        let mut fields = base_fields.to_vec();
        for own in own_fields {
            if !fields.iter().any(|f| f.name == own.name) {
                fields.push(own);
            }
        }
        debug!(key = %key, base = ?base.as_ref().map(ToString::to_string), fields = fields.len(), "synthesized container class");
        Self { key, base, fields }
    }

    fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl ContainerFactory for ContainerClass {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn base(&self) -> Option<&TypeKey> {
        self.base.as_ref()
    }

    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn construct(
        &self,
        name: &str,
        args: FieldArgs,
        store: &mut ContainerStore,
    ) -> MapResult<ContainerId> {
        for arg in args.keys() {
            if self.field(arg).is_none() {
                return Err(MapError::UnknownArgument {
                    data_type: self.key.to_string(),
                    argument: arg.clone(),
                });
            }
        }
        for field in &self.fields {
            if field.required && !args.contains_key(&field.name) {
                return Err(MapError::MissingRequiredField {
                    data_type: self.key.to_string(),
                    field: field.name.clone(),
                });
            }
        }
        let mut container = Container::new(name, self.key.clone());
        container.fields = args;
        let children: Vec<ContainerId> = container
            .fields
            .values()
            .filter_map(Value::as_containers)
            .flatten()
            .collect();
        let id = store.insert(container);
        for child in children {
            // sibling references may already be owned elsewhere
            let unparented = store.require(child)?.parent().is_none();
            if unparented {
                store.set_parent(child, id)?;
            }
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, required: bool, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            doc: format!("{name} doc"),
            required,
            kind,
        }
    }

    fn block_class() -> ContainerClass {
        ContainerClass::new(
            TypeKey::new("core", "Block"),
            None,
            &[],
            vec![
                descriptor("label", true, FieldKind::Attribute),
                descriptor("values", true, FieldKind::Dataset),
                descriptor("comment", false, FieldKind::Attribute),
            ],
        )
    }

    #[test]
    fn construct_assigns_fields() {
        let class = block_class();
        let mut store = ContainerStore::new();
        let mut args = FieldArgs::new();
        args.insert("label".into(), Value::text("abc"));
        args.insert("values".into(), Value::from(3i64));
        let id = class.construct("block0", args, &mut store).unwrap();

        let c = store.get(id).unwrap();
        assert_eq!(c.name, "block0");
        assert_eq!(c.get_field("label"), Some(&Value::text("abc")));
        assert!(c.get_field("comment").is_none());
    }

    #[test]
    fn missing_required_field_fails() {
        let class = block_class();
        let mut store = ContainerStore::new();
        let mut args = FieldArgs::new();
        args.insert("label".into(), Value::text("abc"));
        let err = class.construct("block0", args, &mut store).unwrap_err();
        assert!(matches!(
            err,
            MapError::MissingRequiredField { field, .. } if field == "values"
        ));
    }

    #[test]
    fn unknown_argument_fails() {
        let class = block_class();
        let mut store = ContainerStore::new();
        let mut args = FieldArgs::new();
        args.insert("label".into(), Value::text("abc"));
        args.insert("values".into(), Value::from(1i64));
        args.insert("bogus".into(), Value::from(1i64));
        let err = class.construct("block0", args, &mut store).unwrap_err();
        assert!(matches!(
            err,
            MapError::UnknownArgument { argument, .. } if argument == "bogus"
        ));
    }

    #[test]
    fn derived_class_keeps_base_fields_first() {
        let base = block_class();
        let derived = ContainerClass::new(
            TypeKey::new("core", "TimedBlock"),
            Some(base.key().clone()),
            base.fields(),
            vec![descriptor("rate", true, FieldKind::Attribute)],
        );
        let names: Vec<&str> = derived.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["label", "values", "comment", "rate"]);
        assert_eq!(derived.base().unwrap().data_type, "Block");
    }

    #[test]
    fn container_arguments_are_parented() {
        let device_class = ContainerClass::new(
            TypeKey::new("core", "Device"),
            None,
            &[],
            vec![],
        );
        let holder_class = ContainerClass::new(
            TypeKey::new("core", "Holder"),
            None,
            &[],
            vec![descriptor("device", true, FieldKind::Group)],
        );
        let mut store = ContainerStore::new();
        let device = device_class
            .construct("probe0", FieldArgs::new(), &mut store)
            .unwrap();
        let mut args = FieldArgs::new();
        args.insert("device".into(), Value::Container(device));
        let holder = holder_class.construct("holder", args, &mut store).unwrap();
        assert_eq!(store.get(device).unwrap().parent(), Some(holder));
    }
}
