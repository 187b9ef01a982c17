//! Argument marshalling
//!
//! Turns the bridge's incoming values into the native callee's outgoing
//! argument list in a single pass. Two cursors move independently: the
//! argument cursor visits every incoming value, while the slot cursor only
//! advances for references, which are parked in the shadow frame and
//! replaced by the address of their slot.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;

use crate::addressing::{Addressing, EnvRef, MethodRef};
use crate::frame::LinkedFrame;
use crate::signature::{BridgeSignature, JType};

/// Everything the foreign call needs, in call order
#[derive(Debug, Clone)]
pub struct PreparedCall {
    /// Environment handle (also the first element of `args`)
    pub env: EnvRef,
    /// Native entry point loaded from the method
    pub code: Value,
    /// Outgoing arguments: env, this-or-class handle, then the rest
    pub args: Vec<Value>,
}

/// Next free reference slot of a linked frame
#[derive(Debug)]
struct SlotCursor<'f> {
    frame: &'f LinkedFrame,
    next: u32,
}

impl<'f> SlotCursor<'f> {
    fn new(frame: &'f LinkedFrame) -> Self {
        SlotCursor { frame, next: 0 }
    }

    /// Park `value` in the next slot and return the slot address.
    fn park(&mut self, builder: &mut FunctionBuilder<'_>, addressing: &Addressing, value: Value) -> Value {
        let addr = self.frame.store_slot(builder, addressing, self.next, value);
        self.next += 1;
        addr
    }
}

/// Emits argument marshalling for one bridge
#[derive(Debug, Clone, Copy)]
pub struct ArgumentMarshaller<'a> {
    addressing: &'a Addressing,
}

impl<'a> ArgumentMarshaller<'a> {
    /// Create a marshaller over `addressing`.
    pub fn new(addressing: &'a Addressing) -> Self {
        ArgumentMarshaller { addressing }
    }

    /// Build the outgoing argument list.
    ///
    /// `incoming` are the bridge's parameters after the method pointer
    /// (`this` first for instance methods), matching `sig.incoming()`.
    pub fn marshal(
        &self,
        builder: &mut FunctionBuilder<'_>,
        sig: &BridgeSignature,
        frame: &LinkedFrame,
        method: MethodRef,
        env: EnvRef,
        incoming: &[Value],
    ) -> PreparedCall {
        let addressing = self.addressing;
        let mut slots = SlotCursor::new(frame);
        let mut args = Vec::with_capacity(incoming.len() + 2);
        args.push(env.0);

        if sig.is_static() {
            let class = addressing.load_declaring_class(builder, method);
            let handle = slots.park(builder, addressing, class);
            args.push(handle);
        }

        debug_assert_eq!(incoming.len(), sig.incoming().count());
        for (&value, ty) in incoming.iter().zip(sig.incoming()) {
            match ty {
                JType::Object => {
                    let slot_addr = slots.park(builder, addressing, value);
                    args.push(self.handle_for(builder, value, slot_addr));
                }
                _ => args.push(value),
            }
        }
        debug_assert_eq!(slots.next, frame.slot_count(), "every slot must be written");

        let code = addressing.load_native_entry(builder, method);
        PreparedCall { env, code, args }
    }

    /// `value == null ? null : slot_addr`
    fn handle_for(&self, builder: &mut FunctionBuilder<'_>, value: Value, slot_addr: Value) -> Value {
        let pointer_type = self.addressing.pointer_type();
        let is_null = builder.ins().icmp_imm(IntCC::Equal, value, 0);
        let null = builder.ins().iconst(pointer_type, 0);
        builder.ins().select(is_null, null, slot_addr)
    }
}
