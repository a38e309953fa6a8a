use crate::emit::MethodInfo;
use crate::jvm::{BaseType, BinaryName, ClassGraph, FieldType, MethodAccessFlags, Name};
use crate::Error;
use std::collections::BTreeMap;

/// Bean property found on a class
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub property_type: FieldType,

    /// `getFoo()` or `isFoo()` accessor
    pub read_method: Option<MethodInfo>,

    /// `setFoo(value)` mutator
    pub write_method: Option<MethodInfo>,
}

/// Accessor kind recognized from a method's shape
enum Accessor {
    Read(String, FieldType),
    Write(String, FieldType),
}

/// Property name for an accessor suffix, following the `java.beans.Introspector` rules
///
/// `Name` becomes `name`, but `URL` stays `URL`.
fn decapitalize(suffix: &str) -> String {
    let mut chars = suffix.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            suffix.to_owned()
        }
        (Some(first), _) => first
            .to_lowercase()
            .chain(suffix[first.len_utf8()..].chars())
            .collect(),
        (None, _) => String::new(),
    }
}

fn classify(method: &MethodInfo) -> Option<Accessor> {
    let excluded =
        MethodAccessFlags::STATIC | MethodAccessFlags::PRIVATE | MethodAccessFlags::PROTECTED;
    if method.access_flags.intersects(excluded) || method.is_constructor() {
        return None;
    }

    let name = method.name.as_str();
    let parameters = &method.descriptor.parameters;
    match (&method.descriptor.return_type, parameters.as_slice()) {
        (Some(return_type), []) => {
            if let Some(suffix) = name.strip_prefix("get").filter(|s| !s.is_empty()) {
                Some(Accessor::Read(decapitalize(suffix), return_type.clone()))
            } else if let Some(suffix) = name.strip_prefix("is").filter(|s| !s.is_empty()) {
                match return_type {
                    FieldType::Base(BaseType::Boolean) => {
                        Some(Accessor::Read(decapitalize(suffix), return_type.clone()))
                    }
                    _ => None,
                }
            } else {
                None
            }
        }
        (None, [parameter]) => name
            .strip_prefix("set")
            .filter(|s| !s.is_empty())
            .map(|suffix| Accessor::Write(decapitalize(suffix), parameter.clone())),
        _ => None,
    }
}

/// All bean properties of a class, sorted by name
///
/// Inherited accessors count. A mutator whose type disagrees with the accessor of the same
/// property is not part of the property.
pub fn bean_properties(
    graph: &ClassGraph,
    class: &BinaryName,
) -> Result<Vec<PropertyDescriptor>, Error> {
    if !graph.contains(class) {
        return Err(Error::MissingClass(class.clone()));
    }

    let mut properties: BTreeMap<String, PropertyDescriptor> = BTreeMap::new();
    let mut writes: Vec<(String, FieldType, MethodInfo)> = vec![];

    for (declaring, method) in graph.methods_of(class) {
        let method = MethodInfo::from_class_graph(declaring, method);
        match classify(&method) {
            Some(Accessor::Read(name, property_type)) => {
                properties
                    .entry(name.clone())
                    .or_insert_with(|| PropertyDescriptor {
                        name,
                        property_type,
                        read_method: Some(method),
                        write_method: None,
                    });
            }
            Some(Accessor::Write(name, property_type)) => {
                writes.push((name, property_type, method));
            }
            None => (),
        }
    }

    for (name, property_type, method) in writes {
        match properties.get_mut(&name) {
            Some(property) if property.write_method.is_none() => {
                if property.property_type == property_type {
                    property.write_method = Some(method);
                } else {
                    log::trace!(
                        "Ignoring {} on {}: its type disagrees with the getter",
                        method.name,
                        class
                    );
                }
            }
            Some(_) => (),
            None => {
                properties.insert(
                    name.clone(),
                    PropertyDescriptor {
                        name,
                        property_type,
                        read_method: None,
                        write_method: Some(method),
                    },
                );
            }
        }
    }

    Ok(properties.into_values().collect())
}

/// Readable bean properties of a class, sorted by name
pub fn bean_getters(
    graph: &ClassGraph,
    class: &BinaryName,
) -> Result<Vec<PropertyDescriptor>, Error> {
    let mut properties = bean_properties(graph, class)?;
    properties.retain(|p| p.read_method.is_some());
    Ok(properties)
}

/// Writable bean properties of a class, sorted by name
pub fn bean_setters(
    graph: &ClassGraph,
    class: &BinaryName,
) -> Result<Vec<PropertyDescriptor>, Error> {
    let mut properties = bean_properties(graph, class)?;
    properties.retain(|p| p.write_method.is_some());
    Ok(properties)
}

/// Accessor and mutator methods of some properties (accessors first within each property)
pub fn property_methods(
    properties: &[PropertyDescriptor],
    read: bool,
    write: bool,
) -> Vec<MethodInfo> {
    let mut methods = vec![];
    for property in properties {
        if read {
            methods.extend(property.read_method.iter().cloned());
        }
        if write {
            methods.extend(property.write_method.iter().cloned());
        }
    }
    methods
}
