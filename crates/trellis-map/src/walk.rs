use trellis_spec::{AttributeSpec, DatasetSpec, GroupSpec, StorageSpec};

use crate::names::default_field_name;
use crate::synth::FieldKind;

/// One mappable child of a type spec, with the default field name the
/// naming rules assign to it.
///
/// Paths are slash-joined from the type's root; attributes of an inline
/// dataset sit under the dataset's name (`values/unit`). Fixed-value
/// attributes never appear here: they are stamped from the spec, not
/// mapped from object fields.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SpecEntry {
    pub path: String,
    pub field: String,
    pub kind: FieldKind,
    /// Whether construction fails without a value. An optional spec child
    /// or one with a default value is not constructor-required.
    pub required: bool,
    pub many: bool,
    pub doc: String,
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Every mappable entry of a resolved type spec, in declaration order:
/// attributes first, then datasets, groups, and links. Untyped subgroups
/// contribute their contents under a path prefix rather than a field of
/// their own.
pub(crate) fn collect_entries(spec: &StorageSpec) -> Vec<SpecEntry> {
    let mut entries = Vec::new();
    match spec {
        StorageSpec::Group(group) => walk_group(group, "", &mut entries),
        StorageSpec::Dataset(dataset) => {
            entries.push(SpecEntry {
                path: "data".to_string(),
                field: "data".to_string(),
                kind: FieldKind::Dataset,
                required: dataset.default_value.is_none(),
                many: false,
                doc: dataset.doc.clone(),
            });
            push_attributes(&dataset.attributes, "", &mut entries);
        }
    }
    entries
}

fn push_attributes(attributes: &[AttributeSpec], prefix: &str, entries: &mut Vec<SpecEntry>) {
    for attr in attributes {
        if attr.value.is_some() {
            continue;
        }
        entries.push(SpecEntry {
            path: join(prefix, &attr.name),
            field: attr.name.clone(),
            kind: FieldKind::Attribute,
            required: attr.required && attr.default_value.is_none(),
            many: false,
            doc: attr.doc.clone(),
        });
    }
}

fn push_dataset(dataset: &DatasetSpec, prefix: &str, entries: &mut Vec<SpecEntry>) {
    if let Some(data_type) = dataset.self_data_type() {
        let many = dataset.quantity.is_many();
        if let Some(field) = default_field_name(dataset.name.as_deref(), Some(data_type), many) {
            entries.push(SpecEntry {
                path: join(prefix, dataset.key()),
                field,
                kind: FieldKind::Dataset,
                required: dataset.required(),
                many,
                doc: dataset.doc.clone(),
            });
        }
        return;
    }
    // untyped datasets are validated to carry a fixed name
    let Some(name) = dataset.name.as_deref() else {
        return;
    };
    let path = join(prefix, name);
    entries.push(SpecEntry {
        path: path.clone(),
        field: name.to_string(),
        kind: FieldKind::Dataset,
        required: dataset.required() && dataset.default_value.is_none(),
        many: false,
        doc: dataset.doc.clone(),
    });
    push_attributes(&dataset.attributes, &path, entries);
}

fn walk_group(group: &GroupSpec, prefix: &str, entries: &mut Vec<SpecEntry>) {
    push_attributes(&group.attributes, prefix, entries);
    for dataset in &group.datasets {
        push_dataset(dataset, prefix, entries);
    }
    for child in &group.groups {
        if let Some(data_type) = child.self_data_type() {
            let many = child.quantity.is_many();
            if let Some(field) = default_field_name(child.name.as_deref(), Some(data_type), many) {
                entries.push(SpecEntry {
                    path: join(prefix, child.key()),
                    field,
                    kind: FieldKind::Group,
                    required: child.required(),
                    many,
                    doc: child.doc.clone(),
                });
            }
        } else if let Some(name) = child.name.as_deref() {
            walk_group(child, &join(prefix, name), entries);
        }
    }
    for link in &group.links {
        let many = link.quantity.is_many();
        if let Some(field) = default_field_name(link.name.as_deref(), Some(&link.target_type), many)
        {
            entries.push(SpecEntry {
                path: join(prefix, link.key()),
                field,
                kind: FieldKind::Link,
                required: link.required(),
                many,
                doc: link.doc.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use trellis_spec::{LinkSpec, Quantity, ShapeSpec};
    use trellis_types::DType;

    use super::*;

    fn block_spec() -> StorageSpec {
        let values = DatasetSpec::new("payload")
            .with_name("values")
            .with_dtype(DType::Float64)
            .with_shape(ShapeSpec::Single(vec![None]))
            .with_attribute(AttributeSpec::new("unit", DType::Text, "unit of measure"))
            .unwrap();
        let group = GroupSpec::new("a block of measurements")
            .with_data_type_def("Block")
            .with_attribute(AttributeSpec::new("help", DType::Text, "fixed").with_value("hint"))
            .unwrap()
            .with_attribute(
                AttributeSpec::new("comment", DType::Text, "free text")
                    .optional()
                    .with_default("n/a"),
            )
            .unwrap()
            .with_dataset(values)
            .unwrap()
            .with_group(
                GroupSpec::new("contained series")
                    .with_data_type_inc("Series")
                    .with_quantity(Quantity::ZeroOrMany),
            )
            .unwrap()
            .with_link(LinkSpec::new("Device", "acquisition device"))
            .unwrap();
        StorageSpec::Group(group)
    }

    #[test]
    fn entries_cover_every_mappable_child() {
        let entries = collect_entries(&block_spec());
        let fields: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.path.as_str(), e.field.as_str()))
            .collect();
        assert_eq!(
            fields,
            [
                ("comment", "comment"),
                ("values", "values"),
                ("values/unit", "unit"),
                ("Series", "seriess"),
                ("Device", "device"),
            ]
        );
    }

    #[test]
    fn fixed_value_attributes_are_skipped() {
        let entries = collect_entries(&block_spec());
        assert!(entries.iter().all(|e| e.field != "help"));
    }

    #[test]
    fn defaults_relax_requiredness() {
        let entries = collect_entries(&block_spec());
        let comment = entries.iter().find(|e| e.path == "comment").unwrap();
        assert!(!comment.required);
        let values = entries.iter().find(|e| e.path == "values").unwrap();
        assert!(values.required);
        let series = entries.iter().find(|e| e.path == "Series").unwrap();
        assert!(!series.required);
        assert!(series.many);
    }

    #[test]
    fn untyped_subgroups_flatten_with_a_prefix() {
        let inner = GroupSpec::new("general metadata")
            .with_name("general")
            .with_attribute(AttributeSpec::new("lab", DType::Text, "lab name"))
            .unwrap();
        let spec = StorageSpec::Group(
            GroupSpec::new("session")
                .with_data_type_def("Session")
                .with_group(inner)
                .unwrap(),
        );
        let entries = collect_entries(&spec);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "general/lab");
        assert_eq!(entries[0].field, "lab");
    }

    #[test]
    fn dataset_root_maps_its_payload_to_data() {
        let spec = StorageSpec::Dataset(
            DatasetSpec::new("a series")
                .with_data_type_def("Series")
                .with_dtype(DType::Float64)
                .with_attribute(AttributeSpec::new("rate", DType::Float64, "sampling rate"))
                .unwrap(),
        );
        let entries = collect_entries(&spec);
        assert_eq!(entries[0].path, "data");
        assert_eq!(entries[0].field, "data");
        assert_eq!(entries[1].path, "rate");
    }
}
