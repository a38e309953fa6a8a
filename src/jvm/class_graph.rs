use super::{
    BaseType, BinaryName, FieldAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor,
    RefType, UnqualifiedName,
};
use std::collections::{HashMap, HashSet};

/// Tracks the relationships between classes/interfaces and the members on those classes
///
/// Generators never load classes: everything they need to know about the types they reference
/// (supertypes, whether something is an interface, which accessors a bean has, which
/// constructors a wrapper exception has) is looked up here. Callers are expected to register
/// the classes they generate against alongside the JDK types from `insert_java_library_types`.
#[derive(Clone, Debug, Default)]
pub struct ClassGraph {
    classes: HashMap<BinaryName, ClassData>,
}

#[derive(Clone, Debug)]
pub struct ClassData {
    pub name: BinaryName,

    /// Superclass (only `java/lang/Object` has none)
    pub superclass: Option<BinaryName>,

    pub interfaces: Vec<BinaryName>,
    pub is_interface: bool,

    /// Methods, in declaration order
    pub methods: Vec<MethodData>,

    pub fields: Vec<FieldData>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodData {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Declared (`throws`) exception types
    pub exceptions: Vec<BinaryName>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldData {
    pub access_flags: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

impl ClassData {
    /// New class with no members
    pub fn new_class(name: BinaryName, superclass: BinaryName) -> ClassData {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: vec![],
            is_interface: false,
            methods: vec![],
            fields: vec![],
        }
    }

    /// New interface with no members
    pub fn new_interface(name: BinaryName) -> ClassData {
        ClassData {
            name,
            superclass: Some(BinaryName::OBJECT),
            interfaces: vec![],
            is_interface: true,
            methods: vec![],
            fields: vec![],
        }
    }

    pub fn implementing(mut self, interface: BinaryName) -> ClassData {
        self.interfaces.push(interface);
        self
    }

    /// Add a public method (abstract if this is an interface)
    pub fn with_method(self, name: UnqualifiedName, descriptor: MethodDescriptor) -> ClassData {
        let access_flags = if self.is_interface {
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT
        } else {
            MethodAccessFlags::PUBLIC
        };
        self.with_method_data(MethodData {
            access_flags,
            name,
            descriptor,
            exceptions: vec![],
        })
    }

    pub fn with_method_data(mut self, method: MethodData) -> ClassData {
        self.methods.push(method);
        self
    }

    pub fn with_static_method(
        self,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> ClassData {
        self.with_method_data(MethodData {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            name,
            descriptor,
            exceptions: vec![],
        })
    }

    pub fn with_field(
        mut self,
        access_flags: FieldAccessFlags,
        name: UnqualifiedName,
        descriptor: FieldType,
    ) -> ClassData {
        self.fields.push(FieldData {
            access_flags,
            name,
            descriptor,
        });
        self
    }

    /// Find a method declared directly on this class
    pub fn declared_method(
        &self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor,
    ) -> Option<&MethodData> {
        self.methods
            .iter()
            .find(|m| &m.name == name && &m.descriptor == descriptor)
    }

    /// Constructors declared on this class
    pub fn constructors(&self) -> impl Iterator<Item = &MethodData> {
        self.methods.iter().filter(|m| m.name.is_constructor())
    }
}

impl ClassGraph {
    /// New empty graph
    pub fn new() -> ClassGraph {
        ClassGraph {
            classes: HashMap::new(),
        }
    }

    /// Graph with the standard library types that generated code refers to
    pub fn with_java_library_types() -> ClassGraph {
        let mut graph = ClassGraph::new();
        graph.insert_java_library_types();
        graph
    }

    /// Add (or replace) a class in the graph
    pub fn insert(&mut self, class: ClassData) -> Option<ClassData> {
        self.classes.insert(class.name.clone(), class)
    }

    pub fn get(&self, name: &BinaryName) -> Option<&ClassData> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &BinaryName) -> bool {
        self.classes.contains_key(name)
    }

    /// Is the class known to be an interface?
    pub fn is_interface(&self, name: &BinaryName) -> bool {
        self.classes.get(name).map_or(false, |c| c.is_interface)
    }

    /// Superclass chain, starting with the class itself and ending at the first unknown class or
    /// at `java/lang/Object`
    pub fn superclasses<'a>(&'a self, name: &BinaryName) -> Vec<&'a ClassData> {
        let mut chain = vec![];
        let mut next = self.classes.get(name);
        while let Some(class) = next {
            chain.push(class);
            next = class.superclass.as_ref().and_then(|sup| self.classes.get(sup));
        }
        chain
    }

    /// All methods visible on a type, including inherited ones
    ///
    /// Methods from the class itself come first, then superclasses, then interfaces. When two
    /// methods have the same name and descriptor, only the first one found is kept.
    pub fn methods_of<'a>(&'a self, name: &BinaryName) -> Vec<(&'a ClassData, &'a MethodData)> {
        let mut methods = vec![];
        let mut seen: HashSet<(&UnqualifiedName, &MethodDescriptor)> = HashSet::new();
        let mut to_visit: Vec<&BinaryName> = vec![name];
        let mut visited: HashSet<&BinaryName> = HashSet::new();
        let mut interfaces: Vec<&BinaryName> = vec![];

        // Classes first, then breadth-first through the interfaces
        while let Some(next) = to_visit.pop() {
            if !visited.insert(next) {
                continue;
            }
            if let Some(class) = self.classes.get(next) {
                for method in &class.methods {
                    if seen.insert((&method.name, &method.descriptor)) {
                        methods.push((class, method));
                    }
                }
                interfaces.extend(class.interfaces.iter());
                if let Some(superclass) = &class.superclass {
                    to_visit.push(superclass);
                }
            }
            if to_visit.is_empty() {
                to_visit.extend(interfaces.drain(..).rev());
            }
        }

        methods
    }

    /// Find a method by name and descriptor on the type or any of its supertypes
    pub fn find_method<'a>(
        &'a self,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor,
    ) -> Option<(&'a ClassData, &'a MethodData)> {
        self.methods_of(owner)
            .into_iter()
            .find(|(_, m)| &m.name == name && &m.descriptor == descriptor)
    }

    /// Query if one type is assignable to another
    ///
    /// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)`
    /// in the JVM verifier specification.
    ///
    /// Note: if some of the types queried aren't in `ClassGraph`, this may return false negatives.
    pub fn is_java_assignable(&self, sub_type: &RefType, super_type: &RefType) -> bool {
        match (sub_type, super_type) {
            // Special superclass and interfaces of all arrays
            (RefType::Array(_), RefType::Object(object_type)) => {
                object_type == &BinaryName::OBJECT
                    || object_type == &BinaryName::CLONEABLE
                    || object_type == &BinaryName::SERIALIZABLE
            }

            // Cursed (unsound) covariance of arrays
            (RefType::Array(elem_type1), RefType::Array(elem_type2)) => {
                self.is_assignable(elem_type1, elem_type2)
            }

            (RefType::Object(class1), RefType::Object(class2)) => self.is_subclass(class1, class2),

            _ => false,
        }
    }

    /// Exact compatibility check: primitives must be identical, references must be subtypes
    pub fn is_assignable(&self, sub_type: &FieldType, super_type: &FieldType) -> bool {
        match (sub_type, super_type) {
            (FieldType::Base(base1), FieldType::Base(base2)) => base1 == base2,
            (FieldType::Ref(ref1), FieldType::Ref(ref2)) => self.is_java_assignable(ref1, ref2),
            (_, _) => false,
        }
    }

    /// Object-to-object assignability holds if there is a path through super type edges
    pub fn is_subclass(&self, sub_class: &BinaryName, super_class: &BinaryName) -> bool {
        if super_class == &BinaryName::OBJECT {
            return true;
        }

        let mut supertypes_to_visit: Vec<&BinaryName> = vec![sub_class];
        let mut dont_revisit: HashSet<&BinaryName> = supertypes_to_visit.iter().cloned().collect();

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class = !self.is_interface(super_class);

        while let Some(next_supertype) = supertypes_to_visit.pop() {
            if next_supertype == super_class {
                return true;
            } else if let Some(class_data) = self.classes.get(next_supertype) {
                if let Some(superclass) = &class_data.superclass {
                    if dont_revisit.insert(superclass) {
                        supertypes_to_visit.push(superclass);
                    }
                }
                if !super_is_class {
                    for interface in &class_data.interfaces {
                        if dont_revisit.insert(interface) {
                            supertypes_to_visit.push(interface);
                        }
                    }
                }
            }
        }

        false
    }

    /// Add the standard types that generated code refers to
    pub fn insert_java_library_types(&mut self) {
        let object = FieldType::object(BinaryName::OBJECT);
        let string = FieldType::object(BinaryName::STRING);
        let class = FieldType::object(BinaryName::CLASS);
        let throwable = FieldType::object(BinaryName::THROWABLE);
        let method = FieldType::object(BinaryName::METHOD);
        let no_args = MethodDescriptor::VOID;
        let cause_arg = MethodDescriptor::new(vec![throwable], None);

        self.insert(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: vec![],
            is_interface: false,
            methods: vec![],
            fields: vec![],
        }
        .with_method(UnqualifiedName::INIT, no_args.clone()));

        self.insert(ClassData::new_interface(BinaryName::CLONEABLE));
        self.insert(ClassData::new_interface(BinaryName::SERIALIZABLE));

        self.insert(
            ClassData::new_class(BinaryName::STRING, BinaryName::OBJECT)
                .implementing(BinaryName::SERIALIZABLE),
        );

        self.insert(
            ClassData::new_class(BinaryName::CLASS, BinaryName::OBJECT)
                .implementing(BinaryName::SERIALIZABLE)
                .with_static_method(
                    UnqualifiedName::FORNAME,
                    MethodDescriptor::new(vec![string.clone()], Some(class.clone())),
                )
                .with_method(
                    UnqualifiedName::GETDECLAREDMETHOD,
                    MethodDescriptor::new(
                        vec![string, FieldType::array(class.clone())],
                        Some(method),
                    ),
                ),
        );

        // Boxed primitives
        let mut number = ClassData::new_class(BinaryName::NUMBER, BinaryName::OBJECT)
            .implementing(BinaryName::SERIALIZABLE)
            .with_method(UnqualifiedName::INIT, no_args.clone());
        for base in [
            BaseType::Byte,
            BaseType::Double,
            BaseType::Float,
            BaseType::Int,
            BaseType::Long,
            BaseType::Short,
        ] {
            number = number.with_method(
                base.unboxing_method(),
                MethodDescriptor::new(vec![], Some(FieldType::Base(base))),
            );
        }
        self.insert(number);

        for base in [
            BaseType::Byte,
            BaseType::Char,
            BaseType::Double,
            BaseType::Float,
            BaseType::Int,
            BaseType::Long,
            BaseType::Short,
            BaseType::Boolean,
        ] {
            let boxed = base.boxed_class();
            let superclass = match base {
                BaseType::Char | BaseType::Boolean => BinaryName::OBJECT,
                _ => BinaryName::NUMBER,
            };
            let mut data = ClassData::new_class(boxed.clone(), superclass)
                .implementing(BinaryName::SERIALIZABLE)
                .with_field(
                    FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
                    UnqualifiedName::TYPE,
                    class.clone(),
                )
                .with_static_method(
                    UnqualifiedName::VALUEOF,
                    MethodDescriptor::new(
                        vec![FieldType::Base(base)],
                        Some(FieldType::object(boxed)),
                    ),
                );
            if let BaseType::Char | BaseType::Boolean = base {
                data = data.with_method(
                    base.unboxing_method(),
                    MethodDescriptor::new(vec![], Some(FieldType::Base(base))),
                );
            }
            self.insert(data);
        }

        // Exceptions
        for (name, superclass) in [
            (BinaryName::THROWABLE, BinaryName::OBJECT),
            (BinaryName::EXCEPTION, BinaryName::THROWABLE),
            (BinaryName::ERROR, BinaryName::THROWABLE),
            (BinaryName::RUNTIMEEXCEPTION, BinaryName::EXCEPTION),
            (BinaryName::UNDECLAREDTHROWABLEEXCEPTION, BinaryName::RUNTIMEEXCEPTION),
        ] {
            let mut data = ClassData::new_class(name, superclass)
                .with_method(UnqualifiedName::INIT, cause_arg.clone());
            if data.superclass.as_ref() == Some(&BinaryName::OBJECT) {
                data = data.implementing(BinaryName::SERIALIZABLE);
            }
            self.insert(data.with_method(UnqualifiedName::INIT, no_args.clone()));
        }

        // Reflection
        self.insert(ClassData::new_class(BinaryName::METHOD, BinaryName::OBJECT));
        self.insert(
            ClassData::new_interface(BinaryName::INVOCATIONHANDLER).with_method_data(MethodData {
                access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
                name: UnqualifiedName::INVOKE,
                descriptor: MethodDescriptor::new(
                    vec![
                        object.clone(),
                        FieldType::object(BinaryName::METHOD),
                        FieldType::array(object.clone()),
                    ],
                    Some(object),
                ),
                exceptions: vec![BinaryName::THROWABLE],
            }),
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    fn name(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    #[test]
    fn java_library_assignability() {
        let graph = ClassGraph::with_java_library_types();
        let ute = FieldType::object(BinaryName::UNDECLAREDTHROWABLEEXCEPTION);
        assert!(graph.is_assignable(&ute, &FieldType::object(BinaryName::THROWABLE)));
        assert!(graph.is_assignable(&ute, &FieldType::object(BinaryName::OBJECT)));
        assert!(!graph.is_assignable(&FieldType::int(), &FieldType::long()));
        assert!(!graph.is_assignable(
            &FieldType::object(BinaryName::INTEGER),
            &FieldType::object(BinaryName::LONG)
        ));
        assert!(graph.is_assignable(
            &FieldType::array(FieldType::int()),
            &FieldType::object(BinaryName::SERIALIZABLE)
        ));
    }

    #[test]
    fn interface_assignability() {
        let mut graph = ClassGraph::with_java_library_types();
        graph.insert(ClassData::new_interface(name("a/Named")));
        graph.insert(
            ClassData::new_class(name("a/Base"), BinaryName::OBJECT).implementing(name("a/Named")),
        );
        graph.insert(ClassData::new_class(name("a/Leaf"), name("a/Base")));

        assert!(graph.is_subclass(&name("a/Leaf"), &name("a/Named")));
        assert!(graph.is_subclass(&name("a/Leaf"), &name("a/Base")));
        assert!(!graph.is_subclass(&name("a/Base"), &name("a/Leaf")));
    }

    #[test]
    fn inherited_methods_are_visible_once() {
        let getter = MethodDescriptor::new(vec![], Some(FieldType::int()));
        let mut graph = ClassGraph::with_java_library_types();
        graph.insert(
            ClassData::new_interface(name("a/HasSize"))
                .with_method(UnqualifiedName::from_string("size".into()).unwrap(), getter.clone()),
        );
        graph.insert(
            ClassData::new_class(name("a/Base"), BinaryName::OBJECT)
                .implementing(name("a/HasSize"))
                .with_method(UnqualifiedName::from_string("size".into()).unwrap(), getter.clone()),
        );
        graph.insert(ClassData::new_class(name("a/Leaf"), name("a/Base")));

        let methods = graph.methods_of(&name("a/Leaf"));
        let sizes: Vec<_> = methods
            .iter()
            .filter(|(_, m)| m.name.as_str() == "size")
            .map(|(c, _)| c.name.clone())
            .collect();
        assert_eq!(sizes, vec![name("a/Base")]);
        assert!(graph
            .find_method(&name("a/Leaf"), &UnqualifiedName::INIT, &MethodDescriptor::VOID)
            .is_some());
    }
}
