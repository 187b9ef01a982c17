//! Method specs given on the command line.
//!
//! Syntax: `[static ]Lpkg/Class;->name(descriptor)`, e.g.
//! `static Lcom/example/Calc;->add(II)I`. Every method is taken to be
//! `native`.

use std::fmt;
use std::str::FromStr;

use jbridge_compiler::{MethodTable, ResolvedMethod};
use jbridge_runtime::{ACC_NATIVE, ACC_PUBLIC, ACC_STATIC};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub is_static: bool,
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl FromStr for MethodSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (is_static, rest) = match s.strip_prefix("static ") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, s),
        };
        let (class, member) = rest
            .split_once("->")
            .ok_or_else(|| format!("expected `Lpkg/Class;->name(descriptor)`, got `{}`", s))?;
        if !(class.starts_with('L') && class.ends_with(';')) {
            return Err(format!("class `{}` is not a class descriptor", class));
        }
        let paren = member
            .find('(')
            .ok_or_else(|| format!("missing descriptor in `{}`", member))?;
        let (name, descriptor) = member.split_at(paren);
        if name.is_empty() {
            return Err(format!("missing method name in `{}`", s));
        }
        Ok(MethodSpec {
            is_static,
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }
}

impl fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{}->{}{}", self.class, self.name, self.descriptor)
    }
}

/// Resolve every spec into a method table indexed by position.
pub fn method_table(specs: &[MethodSpec]) -> anyhow::Result<MethodTable> {
    let mut table = MethodTable::new();
    for (idx, spec) in specs.iter().enumerate() {
        let mut flags = ACC_PUBLIC | ACC_NATIVE;
        if spec.is_static {
            flags |= ACC_STATIC;
        }
        let method = ResolvedMethod::from_descriptor(idx as u32, flags, &spec.class, &spec.name, &spec.descriptor)
            .map_err(|e| anyhow::anyhow!("{}: {}", spec, e))?;
        table.insert(method);
    }
    Ok(table)
}
