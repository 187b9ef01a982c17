//! Shadow frame setup and teardown
//!
//! The bridge keeps every object reference it hands to native code in a
//! shadow frame on its own stack, so the collector can find (and move)
//! them while the thread is in native code:
//!
//! ```text
//! +0   link        previous frame, written by push
//! +8   slot_count  u32 (+4 pad)
//! +16  method      owning Method*
//! +24  slots[n]    object references, null until written
//! ```
//!
//! Offsets are shown for 64-bit targets; the real ones come from
//! [`RuntimeLayout`](jbridge_runtime::RuntimeLayout).

use cranelift_codegen::ir::{types, FuncRef, InstBuilder, StackSlotData, StackSlotKind, Value};
use cranelift_frontend::FunctionBuilder;

use crate::addressing::{Addressing, MethodRef, ThreadRef};
use crate::signature::BridgeSignature;

/// Number of reference slots a bridge for `sig` needs: one per object
/// argument (including `this`) plus one for the class of a static method.
pub fn slot_count(sig: &BridgeSignature) -> u32 {
    sig.object_arg_count() + u32::from(sig.is_static())
}

/// A shadow frame that has been pushed onto the thread's frame stack.
///
/// Only a linked frame can have references stored into it, which keeps
/// frame-linked-before-populated a property of the types. It is consumed
/// by [`ShadowFrameBuilder::tear_down`].
#[derive(Debug)]
#[must_use = "a linked shadow frame must be torn down"]
pub struct LinkedFrame {
    base: Value,
    slot_count: u32,
}

impl LinkedFrame {
    /// Number of reference slots.
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    /// Store `value` into reference slot `index`, returning the slot address.
    pub fn store_slot(
        &self,
        builder: &mut FunctionBuilder<'_>,
        addressing: &Addressing,
        index: u32,
        value: Value,
    ) -> Value {
        assert!(index < self.slot_count, "slot {} out of range ({} slots)", index, self.slot_count);
        let field = addressing.frame_slot(index);
        addressing.store(builder, self.base, field, value);
        addressing.field_addr(builder, self.base, field)
    }
}

/// Emits the shadow frame prologue and epilogue
#[derive(Debug, Clone, Copy)]
pub struct ShadowFrameBuilder<'a> {
    addressing: &'a Addressing,
}

impl<'a> ShadowFrameBuilder<'a> {
    /// Create a frame builder over `addressing`.
    pub fn new(addressing: &'a Addressing) -> Self {
        ShadowFrameBuilder { addressing }
    }

    /// Allocate, zero, fill in and link the frame.
    ///
    /// Emits, in order: zeroing of the whole record, the `method` and
    /// `slot_count` header stores, the call to `push`, and the store of
    /// `&frame.method` into `thread.top_of_managed_stack`.
    pub fn build(
        &self,
        builder: &mut FunctionBuilder<'_>,
        sig: &BridgeSignature,
        thread: ThreadRef,
        method: MethodRef,
        push: FuncRef,
    ) -> LinkedFrame {
        let addressing = self.addressing;
        let pointer_type = addressing.pointer_type();
        let slot_count = slot_count(sig);
        let size = addressing.layout().frame_size(slot_count);

        let align_shift = pointer_type.bytes().trailing_zeros() as u8;
        let slot = builder.create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, size, align_shift));

        // Zero the record a word at a time so unwritten slots read as null
        let word = pointer_type.bytes();
        let zero = builder.ins().iconst(pointer_type, 0);
        let mut offset = 0;
        while offset + word <= size {
            builder.ins().stack_store(zero, slot, offset as i32);
            offset += word;
        }
        if offset < size {
            let zero32 = builder.ins().iconst(types::I32, 0);
            builder.ins().stack_store(zero32, slot, offset as i32);
        }

        let base = builder.ins().stack_addr(pointer_type, slot, 0);
        addressing.store(builder, base, addressing.frame_method(), method.0);
        let count = builder.ins().iconst(types::I32, i64::from(slot_count));
        addressing.store(builder, base, addressing.frame_slot_count(), count);

        builder.ins().call(push, &[base]);

        let top = addressing.field_addr(builder, base, addressing.frame_method());
        addressing.store_top_of_managed_stack(builder, thread, top);

        LinkedFrame { base, slot_count }
    }

    /// Unlink the frame.
    pub fn tear_down(&self, builder: &mut FunctionBuilder<'_>, frame: LinkedFrame, pop: FuncRef) {
        log::trace!("tear down shadow frame with {} slots", frame.slot_count);
        builder.ins().call(pop, &[]);
    }
}
