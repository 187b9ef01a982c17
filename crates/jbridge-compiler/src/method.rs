//! Resolved method metadata
//!
//! Method resolution itself belongs to the host runtime. The compiler only
//! needs the resolved view: access flags, declaring class, name, and the
//! descriptor with its derived shorty.

use rustc_hash::FxHashMap;

use jbridge_runtime::{ACC_NATIVE, ACC_STATIC};

use crate::error::{BridgeError, Result};
use crate::mangle;

/// A method after resolution against its declaring class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    /// Index of the method in its dex file / method table
    pub method_idx: u32,
    /// `ACC_*` access flags
    pub access_flags: u32,
    /// Declaring class descriptor, e.g. `Lcom/example/Calc;`
    pub class_descriptor: String,
    /// Method name
    pub name: String,
    /// Full method descriptor, e.g. `(II)I`
    pub descriptor: String,
    /// Shorty derived from `descriptor`
    pub shorty: String,
}

impl ResolvedMethod {
    /// Resolve from a full method descriptor.
    pub fn from_descriptor(
        method_idx: u32,
        access_flags: u32,
        class_descriptor: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Result<Self> {
        let descriptor = descriptor.into();
        let shorty = shorty_from_descriptor(&descriptor)?;
        Ok(ResolvedMethod {
            method_idx,
            access_flags,
            class_descriptor: class_descriptor.into(),
            name: name.into(),
            descriptor,
            shorty,
        })
    }

    /// Whether `ACC_STATIC` is set.
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    /// Whether `ACC_NATIVE` is set.
    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }

    /// `Java_<class>_<method>`
    pub fn jni_short_name(&self) -> String {
        mangle::jni_short_name(&self.class_descriptor, &self.name)
    }

    /// `Java_<class>_<method>__<args>`
    pub fn jni_long_name(&self) -> String {
        mangle::jni_long_name(&self.class_descriptor, &self.name, &self.descriptor)
    }
}

/// Derive the shorty of a method descriptor.
///
/// `(Ljava/lang/String;[II)V` -> `VLLI`. Every reference or array type
/// collapses to `L`.
pub fn shorty_from_descriptor(descriptor: &str) -> Result<String> {
    let body = descriptor
        .strip_prefix('(')
        .ok_or_else(|| BridgeError::malformed(descriptor, "descriptor must start with '('"))?;
    let (args, ret) = body
        .split_once(')')
        .ok_or_else(|| BridgeError::malformed(descriptor, "missing ')'"))?;

    let mut shorty = String::with_capacity(args.len() + 1);
    let (ret_char, rest) = field_type(ret, descriptor)?;
    if !rest.is_empty() {
        return Err(BridgeError::malformed(descriptor, "trailing characters after return type"));
    }
    shorty.push(ret_char);

    let mut rest = args;
    while !rest.is_empty() {
        let (c, next) = field_type(rest, descriptor)?;
        if c == 'V' {
            return Err(BridgeError::malformed(descriptor, "void parameter"));
        }
        shorty.push(c);
        rest = next;
    }
    Ok(shorty)
}

/// Parse one field type off the front of `s`, returning its shorty char.
fn field_type<'a>(s: &'a str, descriptor: &str) -> Result<(char, &'a str)> {
    let mut chars = s.chars();
    match chars.next() {
        Some(c @ ('V' | 'Z' | 'B' | 'C' | 'S' | 'I' | 'J' | 'F' | 'D')) => Ok((c, chars.as_str())),
        Some('L') => {
            let end = s
                .find(';')
                .ok_or_else(|| BridgeError::malformed(descriptor, "unterminated class type"))?;
            Ok(('L', &s[end + 1..]))
        }
        Some('[') => {
            let elem = s.trim_start_matches('[');
            let (c, rest) = field_type(elem, descriptor)?;
            if c == 'V' {
                return Err(BridgeError::malformed(descriptor, "array of void"));
            }
            Ok(('L', rest))
        }
        Some(c) => Err(BridgeError::malformed(descriptor, format!("unknown type '{}'", c))),
        None => Err(BridgeError::malformed(descriptor, "missing type")),
    }
}

/// Source of resolved methods.
///
/// Shared read-only between compilations, so it must be `Sync`.
pub trait MethodResolver: Sync {
    /// Resolve a method index, or `None` if it does not resolve.
    fn resolve_method(&self, method_idx: u32) -> Option<&ResolvedMethod>;
}

/// In-memory method table keyed by method index
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: FxHashMap<u32, ResolvedMethod>,
}

impl MethodTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a method, replacing any previous entry with the same index.
    pub fn insert(&mut self, method: ResolvedMethod) {
        self.methods.insert(method.method_idx, method);
    }

    /// Number of methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl MethodResolver for MethodTable {
    fn resolve_method(&self, method_idx: u32) -> Option<&ResolvedMethod> {
        self.methods.get(&method_idx)
    }
}
