use super::{CallbackType, Context};
use crate::emit::{ClassSink, CodeEmitter, EmitterExts, MethodInfo, Signature};
use crate::jvm::{BinaryName, FieldRef, FieldType, MethodAccessFlags, Name, UnqualifiedName};
use crate::settings::Settings;
use crate::Error;

/// Generation context of a proxy whose callbacks live in instance fields
///
/// Slot `n` is stored in the field `<callback_field_prefix><n>`, typed with the interface of the
/// slot's callback type.
pub struct CallbackContext<'a> {
    class_name: BinaryName,
    settings: &'a Settings,
    callback_types: Vec<CallbackType>,

    /// Contract methods, in contract order, with their slot
    methods: Vec<(MethodInfo, usize)>,
}

impl<'a> CallbackContext<'a> {
    /// Context over already routed contract methods
    ///
    /// Fails if a method is routed to a slot without a callback type.
    pub fn new(
        class_name: BinaryName,
        settings: &'a Settings,
        callback_types: Vec<CallbackType>,
        methods: Vec<(MethodInfo, usize)>,
    ) -> Result<CallbackContext<'a>, Error> {
        if let Some((_, slot)) = methods.iter().find(|(_, slot)| *slot >= callback_types.len()) {
            return Err(Error::UnsupportedCallback(*slot));
        }
        Ok(CallbackContext {
            class_name,
            settings,
            callback_types,
            methods,
        })
    }

    pub fn callback_types(&self) -> &[CallbackType] {
        &self.callback_types
    }

    /// Contract methods routed to a slot, in contract order
    pub fn methods_for_slot(&self, slot: usize) -> Vec<MethodInfo> {
        self.methods
            .iter()
            .filter(|(_, s)| *s == slot)
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Field holding the callback of a slot
    pub fn callback_field(&self, index: usize) -> Result<FieldRef, Error> {
        let callback_type = self
            .callback_types
            .get(index)
            .ok_or(Error::UnsupportedCallback(index))?;
        let name = UnqualifiedName::from_string(format!(
            "{}{}",
            self.settings.callback_field_prefix, index
        ))
        .map_err(Error::MalformedName)?;
        Ok(FieldRef::new(
            self.class_name.clone(),
            name,
            FieldType::object(callback_type.interface(self.settings).clone()),
        ))
    }

    fn position(&self, method: &MethodInfo) -> Option<usize> {
        self.methods.iter().position(|(m, _)| m.same_target(method))
    }
}

impl<'a> Context for CallbackContext<'a> {
    fn class_name(&self) -> &BinaryName {
        &self.class_name
    }

    fn settings(&self) -> &Settings {
        self.settings
    }

    fn begin_method<'s>(
        &self,
        sink: &'s mut dyn ClassSink,
        method: &MethodInfo,
    ) -> Result<CodeEmitter<'s>, Error> {
        let access_flags =
            MethodAccessFlags::PUBLIC | (method.access_flags & MethodAccessFlags::VARARGS);
        CodeEmitter::begin(sink, method.moved_to(self.class_name.clone(), access_flags))
    }

    fn get_index(&self, method: &MethodInfo) -> Result<usize, Error> {
        self.position(method)
            .map(|position| self.methods[position].1)
            .ok_or_else(|| {
                Error::MissingCallbackSlot(method.name.clone(), method.descriptor.clone())
            })
    }

    fn emit_callback(&self, e: &mut CodeEmitter<'_>, index: usize) -> Result<(), Error> {
        let field = self.callback_field(index)?;
        e.load_this()?;
        e.get_field(field)
    }

    fn get_impl_signature(&self, method: &MethodInfo) -> Signature {
        let mut signature = method.signature();
        if let Some(position) = self.position(method) {
            let suffix = format!("$Method${}", position);
            if let Ok(suffix) = UnqualifiedName::from_string(suffix) {
                signature.name = signature.name.concat(&suffix);
            }
        }
        signature
    }
}
