//! Bridge emission pipeline
//!
//! [`JniCompiler::compile`] runs a fixed sequence of steps over one
//! [`BridgeBuilder`]. Every step advances the builder's stage and the
//! typed tokens handed between steps (`LinkedFrame`, `SavedSegment`,
//! `NativeWindow`) make out-of-order emission a compile error:
//!
//! ```text
//! Created -> SignatureBuilt -> FrameSetup -> ArgsMarshalled -> SegmentSaved
//!   -> NativeEntered -> Called -> NativeExited -> ReturnDecoded
//!   -> SegmentRestored -> FrameTornDown -> Verified -> Finalized
//! ```
//!
//! The generated bridge is a single basic block.

use cranelift_codegen::ir::{self, FuncRef, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::{FuncId, Module};

use crate::addressing::{Addressing, EnvRef, MethodRef, ThreadRef};
use crate::error::{BridgeError, Result};
use crate::frame::{LinkedFrame, ShadowFrameBuilder};
use crate::guards::{NativeWindow, ReferenceSegmentGuard, SavedSegment, ThreadStateGuard};
use crate::marshal::{ArgumentMarshaller, PreparedCall};
use crate::method::{MethodResolver, ResolvedMethod};
use crate::signature::{BridgeSignature, JType, SignatureBuilder, SignatureForm};
use crate::unit::{CompilationUnit, CompiledMethod, RuntimeSupport};

/// Stage of bridge generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeStage {
    /// Compiler constructed, nothing emitted
    Created,
    /// Bridge and callee signatures derived
    SignatureBuilt,
    /// Shadow frame allocated and linked
    FrameSetup,
    /// Outgoing arguments prepared
    ArgsMarshalled,
    /// Reference segment cookie saved
    SegmentSaved,
    /// Thread state set to `Native`
    NativeEntered,
    /// Native method called
    Called,
    /// Thread state set back to `Runnable`
    NativeExited,
    /// Return value decoded (or passed through)
    ReturnDecoded,
    /// Reference segment restored
    SegmentRestored,
    /// Shadow frame popped and function returned
    FrameTornDown,
    /// IR passed the verifier
    Verified,
    /// Machine code defined in the unit
    Finalized,
}

impl BridgeStage {
    /// Every stage, in pipeline order.
    pub const ALL: [BridgeStage; 13] = [
        BridgeStage::Created,
        BridgeStage::SignatureBuilt,
        BridgeStage::FrameSetup,
        BridgeStage::ArgsMarshalled,
        BridgeStage::SegmentSaved,
        BridgeStage::NativeEntered,
        BridgeStage::Called,
        BridgeStage::NativeExited,
        BridgeStage::ReturnDecoded,
        BridgeStage::SegmentRestored,
        BridgeStage::FrameTornDown,
        BridgeStage::Verified,
        BridgeStage::Finalized,
    ];

    /// The stage after this one, or `None` for `Finalized`.
    pub fn next(self) -> Option<BridgeStage> {
        let pos = Self::ALL.iter().position(|&s| s == self)?;
        Self::ALL.get(pos + 1).copied()
    }
}

/// Stage tracker shared by the emission steps
#[derive(Debug)]
struct StageLog {
    stages: Vec<BridgeStage>,
}

impl StageLog {
    fn new() -> Self {
        StageLog { stages: vec![BridgeStage::Created] }
    }

    fn current(&self) -> BridgeStage {
        self.stages.last().copied().unwrap_or(BridgeStage::Created)
    }

    fn advance(&mut self, to: BridgeStage) {
        assert_eq!(self.current().next(), Some(to), "bridge stage {:?} cannot follow {:?}", to, self.current());
        log::trace!("bridge stage {:?}", to);
        self.stages.push(to);
    }
}

/// Runtime entry points imported into the function being built
#[derive(Debug, Clone, Copy)]
struct RuntimeRefs {
    push_frame: FuncRef,
    pop_frame: FuncRef,
    decode: Option<FuncRef>,
}

/// Result of the foreign call, before decoding
#[derive(Debug, Clone, Copy)]
struct RawReturn(Option<Value>);

/// Mutable state of one bridge body under construction
struct BridgeBuilder<'f> {
    builder: FunctionBuilder<'f>,
    addressing: Addressing,
    sig: BridgeSignature,
    callee_sig: ir::Signature,
    runtime: RuntimeRefs,
    stages: StageLog,
    thread: ThreadRef,
    method: MethodRef,
    incoming: Vec<Value>,
}

impl<'f> BridgeBuilder<'f> {
    fn setup_frame(&mut self) -> LinkedFrame {
        let frame = ShadowFrameBuilder::new(&self.addressing).build(
            &mut self.builder,
            &self.sig,
            self.thread,
            self.method,
            self.runtime.push_frame,
        );
        self.stages.advance(BridgeStage::FrameSetup);
        frame
    }

    fn marshal_args(&mut self, frame: &LinkedFrame) -> PreparedCall {
        let env: EnvRef = self.addressing.load_env(&mut self.builder, self.thread);
        let prepared = ArgumentMarshaller::new(&self.addressing).marshal(
            &mut self.builder,
            &self.sig,
            frame,
            self.method,
            env,
            &self.incoming,
        );
        self.stages.advance(BridgeStage::ArgsMarshalled);
        prepared
    }

    fn save_segment(&mut self, env: EnvRef) -> SavedSegment {
        let saved = ReferenceSegmentGuard::new(&self.addressing).save(&mut self.builder, env);
        self.stages.advance(BridgeStage::SegmentSaved);
        saved
    }

    fn enter_native(&mut self) -> NativeWindow {
        let guard = ThreadStateGuard::prepare(&mut self.builder, self.thread);
        let window = guard.enter_native(&mut self.builder, &self.addressing);
        self.stages.advance(BridgeStage::NativeEntered);
        window
    }

    fn call_native(&mut self, prepared: &PreparedCall) -> RawReturn {
        let sig_ref = self.builder.import_signature(self.callee_sig.clone());
        let call = self.builder.ins().call_indirect(sig_ref, prepared.code, &prepared.args);
        let result = self.builder.inst_results(call).first().copied();
        self.stages.advance(BridgeStage::Called);
        RawReturn(result)
    }

    fn exit_native(&mut self, window: NativeWindow) {
        window.exit_native(&mut self.builder, &self.addressing);
        self.stages.advance(BridgeStage::NativeExited);
    }

    fn decode_return(&mut self, raw: RawReturn) -> Option<Value> {
        let value = match (self.sig.return_type(), raw.0, self.runtime.decode) {
            (JType::Object, Some(handle), Some(decode)) => {
                let thread = self.thread.0;
                let call = self.builder.ins().call(decode, &[thread, handle]);
                Some(self.builder.inst_results(call)[0])
            }
            (_, value, _) => value,
        };
        self.stages.advance(BridgeStage::ReturnDecoded);
        value
    }

    fn restore_segment(&mut self, saved: SavedSegment) {
        ReferenceSegmentGuard::new(&self.addressing).restore(&mut self.builder, saved);
        self.stages.advance(BridgeStage::SegmentRestored);
    }

    fn tear_down(&mut self, frame: LinkedFrame, result: Option<Value>) {
        ShadowFrameBuilder::new(&self.addressing).tear_down(&mut self.builder, frame, self.runtime.pop_frame);
        match result {
            Some(value) => self.builder.ins().return_(&[value]),
            None => self.builder.ins().return_(&[]),
        };
        self.stages.advance(BridgeStage::FrameTornDown);
    }

    /// Emit the whole body, returning the stages passed.
    fn emit(mut self) -> Vec<BridgeStage> {
        let frame = self.setup_frame();
        let prepared = self.marshal_args(&frame);
        let saved = self.save_segment(prepared.env);
        let window = self.enter_native();
        let raw = self.call_native(&prepared);
        self.exit_native(window);
        let result = self.decode_return(raw);
        self.restore_segment(saved);
        self.tear_down(frame, result);

        self.builder.seal_all_blocks();
        self.builder.finalize();
        self.stages.stages
    }
}

/// Generates the bridge for one native method.
///
/// Holds the compilation context of a single generation: the resolved
/// method, its parsed signature and the unit the bridge is compiled into.
pub struct JniCompiler<'u, 'r, M: Module> {
    unit: &'u mut CompilationUnit<M>,
    method: &'r ResolvedMethod,
}

impl<'u, 'r, M: Module> JniCompiler<'u, 'r, M> {
    /// Resolve `method_idx` and check that it can be bridged.
    pub fn new<R>(unit: &'u mut CompilationUnit<M>, resolver: &'r R, method_idx: u32) -> Result<Self>
    where
        R: MethodResolver + ?Sized,
    {
        let method = resolver
            .resolve_method(method_idx)
            .ok_or(BridgeError::UnresolvedMethod { method_idx })?;
        if !method.is_native() {
            return Err(BridgeError::NotNative {
                name: method.name.clone(),
                access_flags: method.access_flags,
            });
        }
        Ok(JniCompiler { unit, method })
    }

    /// Emit, verify and define the bridge.
    pub fn compile(self) -> Result<CompiledMethod> {
        let JniCompiler { unit, method } = self;
        let mut stages = StageLog::new();

        let sig = BridgeSignature::parse(&method.shorty, method.is_static())?;
        let sig_builder = SignatureBuilder::new(unit.pointer_type(), unit.call_conv());
        let bridge_sig = sig_builder.build(&sig, SignatureForm::Bridge);
        let callee_sig = sig_builder.build(&sig, SignatureForm::Callee);
        stages.advance(BridgeStage::SignatureBuilt);

        let symbol = format!("jbridge_{}", method.jni_long_name());
        // Named once the bridge is declared in `install`
        let mut func = ir::Function::with_name_signature(ir::UserFuncName::testcase(&symbol), bridge_sig);
        let get_current_thread = unit.import_runtime(RuntimeSupport::GetCurrentThread, &mut func)?;
        let runtime = RuntimeRefs {
            push_frame: unit.import_runtime(RuntimeSupport::PushShadowFrame, &mut func)?,
            pop_frame: unit.import_runtime(RuntimeSupport::PopShadowFrame, &mut func)?,
            decode: match sig.return_type() {
                JType::Object => Some(unit.import_runtime(RuntimeSupport::DecodeJObject, &mut func)?),
                _ => None,
            },
        };

        let addressing = Addressing::new(*unit.layout(), unit.pointer_type());
        let slot_count = crate::frame::slot_count(&sig);
        let stages = {
            let mut builder = FunctionBuilder::new(&mut func, unit.builder_ctx());
            let block = builder.create_block();
            builder.append_block_params_for_function_params(block);
            builder.switch_to_block(block);
            let params = builder.block_params(block).to_vec();

            // Every later step needs the thread, so fetch it up front
            let call = builder.ins().call(get_current_thread, &[]);
            let thread = ThreadRef(builder.inst_results(call)[0]);

            let bridge = BridgeBuilder {
                builder,
                addressing,
                sig,
                callee_sig,
                runtime,
                stages,
                thread,
                method: MethodRef(params[0]),
                incoming: params[1..].to_vec(),
            };
            bridge.emit()
        };

        let mut stages = StageLog { stages };
        let (func_id, code_size) = Self::install(unit, &symbol, &mut func, &mut stages)?;

        log::debug!(
            "compiled bridge {} (shorty {}, {} slots, {} bytes)",
            symbol,
            method.shorty,
            slot_count,
            code_size
        );

        Ok(CompiledMethod {
            instruction_set: unit.instruction_set(),
            elf_index: unit.config().elf_index,
            method_idx: method.method_idx,
            func_id,
            symbol,
            shorty: method.shorty.clone(),
            slot_count,
            code_size,
            stages: stages.stages,
            function: func,
        })
    }

    fn verify(unit: &CompilationUnit<M>, symbol: &str, func: &ir::Function) -> Result<()> {
        if !unit.config().verify {
            return Ok(());
        }
        cranelift_codegen::verify_function(func, unit.isa_flags()).map_err(|errors| {
            log::warn!("bridge {} failed verification: {}", symbol, errors);
            BridgeError::Verification {
                symbol: symbol.to_string(),
                errors: errors.to_string(),
            }
        })
    }

    /// Verify `func`, then export it as `symbol`.
    ///
    /// The symbol is declared only after verification passes, so a rejected
    /// bridge leaves nothing behind in the unit.
    fn install(
        unit: &mut CompilationUnit<M>,
        symbol: &str,
        func: &mut ir::Function,
        stages: &mut StageLog,
    ) -> Result<(FuncId, u32)> {
        Self::verify(unit, symbol, func)?;
        stages.advance(BridgeStage::Verified);

        let func_id = unit.declare_bridge(symbol, &func.signature)?;
        func.name = ir::UserFuncName::user(0, func_id.as_u32());
        let code_size = unit.define(func_id, func.clone()).map_err(|e| {
            log::warn!("failed to define bridge {}: {}", symbol, e);
            e
        })?;
        stages.advance(BridgeStage::Finalized);
        Ok((func_id, code_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(BridgeStage::Created.next(), Some(BridgeStage::SignatureBuilt));
        assert_eq!(BridgeStage::Called.next(), Some(BridgeStage::NativeExited));
        assert_eq!(BridgeStage::Finalized.next(), None);
    }

    #[test]
    #[should_panic(expected = "cannot follow")]
    fn test_stage_log_rejects_skips() {
        let mut log = StageLog::new();
        log.advance(BridgeStage::FrameSetup);
    }

    #[cfg(feature = "aot")]
    #[test]
    fn test_verification_failure_leaves_unit_usable() {
        use crate::config::CompilerConfig;
        use crate::method::MethodTable;
        use cranelift_codegen::cursor::{Cursor, FuncCursor};
        use cranelift_codegen::ir::types;
        use cranelift_object::ObjectModule;
        use jbridge_runtime::{ACC_NATIVE, ACC_STATIC};

        let mut unit = CompilationUnit::object(CompilerConfig::default(), "verify").unwrap();

        // A block with no terminator
        let sig = ir::Signature::new(unit.call_conv());
        let mut broken = ir::Function::with_name_signature(ir::UserFuncName::testcase("jbridge_broken"), sig);
        let block = broken.dfg.make_block();
        broken.layout.append_block(block);
        FuncCursor::new(&mut broken).at_bottom(block).ins().iconst(types::I32, 1);

        let mut stages = StageLog::new();
        for &stage in &BridgeStage::ALL[1..11] {
            stages.advance(stage);
        }
        let err = JniCompiler::<'_, '_, ObjectModule>::install(&mut unit, "jbridge_broken", &mut broken, &mut stages).unwrap_err();
        assert!(matches!(err, BridgeError::Verification { ref symbol, .. } if symbol == "jbridge_broken"), "{:?}", err);
        assert_eq!(stages.current(), BridgeStage::FrameTornDown);

        let mut methods = MethodTable::new();
        methods.insert(ResolvedMethod::from_descriptor(1, ACC_STATIC | ACC_NATIVE, "LOk;", "ok", "(I)I").unwrap());
        let compiled = JniCompiler::new(&mut unit, &methods, 1).unwrap().compile().unwrap();
        assert_eq!(compiled.stages, BridgeStage::ALL.to_vec());

        let bytes = unit.finish().unwrap();
        let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"jbridge_Java_Ok_ok__I"));
        assert!(!contains(b"jbridge_broken"));
    }
}
