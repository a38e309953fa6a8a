use super::{CallbackGenerator, Context, DispatchStrategy};
use crate::emit::{ClassSink, CodeEmitter, EmitterExts, FieldDecl, InstructionEmitter, MethodInfo};
use crate::jvm::{BinaryName, FieldAccessFlags, FieldRef, FieldType, Instruction, UnqualifiedName};
use crate::Error;

/// Hands every call to `InvocationHandler.invoke(proxy, method, args)`
///
/// Each method gets a `private static final` field caching its reflective `Method`, filled in
/// from the static initializer. Checked exceptions thrown by the handler that the method doesn't
/// declare come out wrapped in the configured undeclared-throwable wrapper.
#[derive(Copy, Clone, Debug, Default)]
pub struct InvocationHandlerGenerator;

impl InvocationHandlerGenerator {
    fn method_field(context: &dyn Context, method: &MethodInfo) -> FieldRef {
        FieldRef::new(
            context.class_name().clone(),
            context.get_impl_signature(method).name,
            FieldType::object(BinaryName::METHOD),
        )
    }
}

impl CallbackGenerator for InvocationHandlerGenerator {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::InvocationHandler
    }

    fn generate(
        &self,
        sink: &mut dyn ClassSink,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error> {
        let settings = context.settings();

        for method in methods {
            let field = Self::method_field(context, method);
            sink.declare_field(FieldDecl::new(
                FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
                field.name.clone(),
                field.descriptor.clone(),
            ))?;

            let index = context.get_index(method)?;
            let mut e = context.begin_method(sink, method)?;
            let mut handler = e.begin_block()?;
            context.emit_callback(&mut e, index)?;
            e.load_this()?;
            e.get_static(field)?;
            e.create_arg_array()?;
            e.invoke_interface(
                &settings.invocation_handler_interface,
                UnqualifiedName::INVOKE,
                settings.invoke_descriptor(),
            )?;
            match &method.descriptor.return_type {
                Some(return_type) => e.unbox(return_type)?,
                None => e.push_instruction(Instruction::Pop)?,
            }
            e.return_value()?;
            e.wrap_undeclared_throwable(
                &mut handler,
                &method.exceptions,
                &settings.undeclared_throwable_wrapper,
            )?;
            e.end()?;
        }
        Ok(())
    }

    fn generate_static(
        &self,
        e: &mut CodeEmitter<'_>,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error> {
        for method in methods {
            e.load_method(method)?;
            e.put_static(Self::method_field(context, method))?;
        }
        Ok(())
    }
}
