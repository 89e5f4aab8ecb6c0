/// Convert a camel-case type name to the snake-case field name it maps
/// to by default: `MyGroupType` becomes `my_group_type`, acronym runs
/// stay together (`DCSeries` becomes `dc_series`).
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (index, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = index > 0 && chars[index - 1].is_lowercase();
            let next_lower = index + 1 < chars.len()
                && chars[index + 1].is_lowercase()
                && index > 0
                && chars[index - 1].is_uppercase();
            if prev_lower || next_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }
    out
}

/// Default field name for a spec child: its fixed name if any, else the
/// snake-case data type, pluralized when the spec allows many instances.
pub fn default_field_name(
    name: Option<&str>,
    data_type: Option<&str>,
    many: bool,
) -> Option<String> {
    if let Some(name) = name {
        return Some(name.to_string());
    }
    let base = camel_to_snake(data_type?);
    if many {
        Some(format!("{base}s"))
    } else {
        Some(base)
    }
}
