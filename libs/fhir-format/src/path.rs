//! Field paths for diagnostics (`Observation.component[1].valueQuantity`)

pub(crate) fn child(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return name.to_string();
    }
    let mut path = String::with_capacity(parent.len() + name.len() + 1);
    path.push_str(parent);
    path.push('.');
    path.push_str(name);
    path
}

pub(crate) fn index(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}
