use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods and fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in internal form (`java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BinaryName(Cow<'static, str>);

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extract the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extract the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(String::from("Unqualified name is empty"))
        } else if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if (name.contains('<') || name.contains('>'))
            && name != "<init>"
            && name != "<clinit>"
        {
            Err(format!(
                "Unqualified name '{}' may only use angle brackets for initializers",
                name
            ))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(String::from("Binary name is empty"));
        }
        for segment in name.split('/') {
            if segment.is_empty() || segment.contains(&['.', ';', '[', '<', '>'][..]) {
                return Err(format!("Binary name '{}' has a malformed segment", name));
            }
        }
        Ok(())
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Concatenate the contents of two unqualified names to produce a third
    pub fn concat(&self, other: &UnqualifiedName) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    /// Is this the name of an instance initializer?
    pub fn is_constructor(&self) -> bool {
        self == &Self::INIT
    }

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // JDK names
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const FORNAME: Self = Self::name("forName");
    pub const GETDECLAREDMETHOD: Self = Self::name("getDeclaredMethod");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const INVOKE: Self = Self::name("invoke");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const TYPE: Self = Self::name("TYPE");
    pub const VALUEOF: Self = Self::name("valueOf");

    // Runtime callback names
    pub const CONVERT: Self = Self::name("convert");
    pub const COPY: Self = Self::name("copy");
    pub const LOADOBJECT: Self = Self::name("loadObject");

    // Names we generate
    pub const DELEGATES: Self = Self::name("DELEGATES");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Concatenate the contents of an unqualified name onto the end of the binary name
    pub fn concat(&self, other: &UnqualifiedName) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    /// Name of the class with dots instead of slashes (`java.lang.Object`)
    pub fn to_source_name(&self) -> String {
        self.as_str().replace('/', ".")
    }

    /// Unqualified simple name of the class (`Object` for `java/lang/Object`)
    pub fn simple_name(&self) -> &str {
        match self.as_str().rfind('/') {
            Some(idx) => &self.as_str()[idx + 1..],
            None => self.as_str(),
        }
    }

    // JDK names
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const INVOCATIONHANDLER: Self = Self::name("java/lang/reflect/InvocationHandler");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const METHOD: Self = Self::name("java/lang/reflect/Method");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const UNDECLAREDTHROWABLEEXCEPTION: Self =
        Self::name("java/lang/reflect/UndeclaredThrowableException");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validates_unqualified_names() {
        assert!(UnqualifiedName::from_string(String::from("getName")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<init>")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<foo>")).is_err());
        assert!(UnqualifiedName::from_string(String::from("a/b")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
    }

    #[test]
    fn validates_binary_names() {
        assert!(BinaryName::from_string(String::from("com/acme/Bean")).is_ok());
        assert!(BinaryName::from_string(String::from("com//Bean")).is_err());
        assert!(BinaryName::from_string(String::from("com.acme.Bean")).is_err());
        assert_eq!(BinaryName::STRING.simple_name(), "String");
        assert_eq!(BinaryName::STRING.to_source_name(), "java.lang.String");
    }
}
