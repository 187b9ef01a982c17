//! Typed field access over opaque runtime pointers
//!
//! Generated code never sees the runtime structs, only base pointers and
//! the offsets in [`RuntimeLayout`]. The handle newtypes below keep a
//! thread pointer from being used where a method pointer is expected, and
//! every load or store goes through a [`Field`] that carries both offset
//! and width.

use cranelift_codegen::ir::{types, InstBuilder, MemFlags, Type, Value};
use cranelift_frontend::FunctionBuilder;

use jbridge_runtime::RuntimeLayout;

/// Width of a runtime field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 32-bit word (`u32` fields, thread state)
    U32,
    /// Native pointer
    Pointer,
}

/// One field of a runtime struct: byte offset plus width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Byte offset from the struct base
    pub offset: i32,
    /// Field width
    pub kind: FieldKind,
}

impl Field {
    const fn u32(offset: i32) -> Self {
        Field { offset, kind: FieldKind::U32 }
    }

    const fn pointer(offset: i32) -> Self {
        Field { offset, kind: FieldKind::Pointer }
    }
}

/// `Thread*` value in the function being built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRef(pub Value);

/// `JNIEnv*` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvRef(pub Value);

/// `Method*` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef(pub Value);

/// Emits loads and stores of runtime fields
#[derive(Debug, Clone, Copy)]
pub struct Addressing {
    layout: RuntimeLayout,
    pointer_type: Type,
}

impl Addressing {
    /// Address fields of `layout` with native pointers of `pointer_type`.
    pub fn new(layout: RuntimeLayout, pointer_type: Type) -> Self {
        Addressing { layout, pointer_type }
    }

    /// The offset table in use.
    pub fn layout(&self) -> &RuntimeLayout {
        &self.layout
    }

    /// Native pointer type.
    pub fn pointer_type(&self) -> Type {
        self.pointer_type
    }

    fn value_type(&self, field: Field) -> Type {
        match field.kind {
            FieldKind::U32 => types::I32,
            FieldKind::Pointer => self.pointer_type,
        }
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    /// Load `field` from `base`.
    pub fn load(&self, builder: &mut FunctionBuilder<'_>, base: Value, field: Field) -> Value {
        let ty = self.value_type(field);
        builder.ins().load(ty, MemFlags::trusted(), base, field.offset)
    }

    /// Store `value` into `field` of `base`.
    pub fn store(&self, builder: &mut FunctionBuilder<'_>, base: Value, field: Field, value: Value) {
        debug_assert_eq!(
            builder.func.dfg.value_type(value),
            self.value_type(field),
            "store of mismatched width at offset {}",
            field.offset
        );
        builder.ins().store(MemFlags::trusted(), value, base, field.offset);
    }

    /// `base + field.offset`
    pub fn field_addr(&self, builder: &mut FunctionBuilder<'_>, base: Value, field: Field) -> Value {
        builder.ins().iadd_imm(base, field.offset as i64)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// `Thread::state`
    pub fn thread_state(&self) -> Field {
        Field::u32(self.layout.thread_state)
    }

    /// `Thread::jni_env`
    pub fn thread_jni_env(&self) -> Field {
        Field::pointer(self.layout.thread_jni_env)
    }

    /// `Thread::top_of_managed_stack`
    pub fn thread_top_of_managed_stack(&self) -> Field {
        Field::pointer(self.layout.thread_top_of_managed_stack)
    }

    /// `Method::declaring_class`
    pub fn method_declaring_class(&self) -> Field {
        Field::pointer(self.layout.method_declaring_class)
    }

    /// `Method::native_method`
    pub fn method_native_entry(&self) -> Field {
        Field::pointer(self.layout.method_native_entry)
    }

    /// `JniEnv::local_ref_cookie`
    pub fn env_local_ref_cookie(&self) -> Field {
        Field::u32(self.layout.env_local_ref_cookie)
    }

    /// `JniEnv::segment_state`
    pub fn env_segment_state(&self) -> Field {
        Field::u32(self.layout.env_segment_state)
    }

    /// `ShadowFrame::slot_count`
    pub fn frame_slot_count(&self) -> Field {
        Field::u32(self.layout.frame_slot_count)
    }

    /// `ShadowFrame::method`
    pub fn frame_method(&self) -> Field {
        Field::pointer(self.layout.frame_method)
    }

    /// Reference slot `index` of a shadow frame
    pub fn frame_slot(&self, index: u32) -> Field {
        Field::pointer(self.layout.slot_offset(index))
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// `thread->jni_env`
    pub fn load_env(&self, builder: &mut FunctionBuilder<'_>, thread: ThreadRef) -> EnvRef {
        EnvRef(self.load(builder, thread.0, self.thread_jni_env()))
    }

    /// `method->declaring_class`
    pub fn load_declaring_class(&self, builder: &mut FunctionBuilder<'_>, method: MethodRef) -> Value {
        self.load(builder, method.0, self.method_declaring_class())
    }

    /// `method->native_method`
    pub fn load_native_entry(&self, builder: &mut FunctionBuilder<'_>, method: MethodRef) -> Value {
        self.load(builder, method.0, self.method_native_entry())
    }

    /// `thread->state = state`
    pub fn store_thread_state(&self, builder: &mut FunctionBuilder<'_>, thread: ThreadRef, state: Value) {
        self.store(builder, thread.0, self.thread_state(), state);
    }

    /// `thread->top_of_managed_stack = top`
    pub fn store_top_of_managed_stack(&self, builder: &mut FunctionBuilder<'_>, thread: ThreadRef, top: Value) {
        self.store(builder, thread.0, self.thread_top_of_managed_stack(), top);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::ir::{self, AbiParam, InstructionData, Opcode, UserFuncName};
    use cranelift_codegen::isa::CallConv;
    use cranelift_frontend::FunctionBuilderContext;

    #[test]
    fn test_field_kinds() {
        let addr = Addressing::new(RuntimeLayout::HOST, types::I64);
        assert_eq!(addr.thread_state().kind, FieldKind::U32);
        assert_eq!(addr.env_segment_state().kind, FieldKind::U32);
        assert_eq!(addr.thread_jni_env().kind, FieldKind::Pointer);
        assert_eq!(addr.frame_slot(2).offset, RuntimeLayout::HOST.slot_offset(2));
    }

    #[test]
    fn test_loads_use_field_offsets() {
        let addr = Addressing::new(RuntimeLayout::HOST, types::I64);
        let mut sig = ir::Signature::new(CallConv::SystemV);
        sig.params.push(AbiParam::new(types::I64));
        let mut func = ir::Function::with_name_signature(UserFuncName::user(0, 0), sig);
        let mut fctx = FunctionBuilderContext::new();
        {
            let mut builder = FunctionBuilder::new(&mut func, &mut fctx);
            let block = builder.create_block();
            builder.append_block_params_for_function_params(block);
            builder.switch_to_block(block);
            let thread = ThreadRef(builder.block_params(block)[0]);
            let env = addr.load_env(&mut builder, thread);
            let segment = addr.load(&mut builder, env.0, addr.env_segment_state());
            assert_eq!(builder.func.dfg.value_type(segment), types::I32);
            builder.ins().return_(&[]);
            builder.seal_all_blocks();
            builder.finalize();
        }

        let block = func.layout.entry_block().unwrap();
        let offsets: Vec<i32> = func
            .layout
            .block_insts(block)
            .filter_map(|inst| match func.dfg.insts[inst] {
                InstructionData::Load { opcode: Opcode::Load, offset, .. } => Some(offset.into()),
                _ => None,
            })
            .collect();
        assert_eq!(
            offsets,
            vec![RuntimeLayout::HOST.thread_jni_env, RuntimeLayout::HOST.env_segment_state]
        );
    }
}
