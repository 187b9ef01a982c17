//! JNI symbol name mangling
//!
//! Native methods are looked up by `Java_<class>_<method>` (short name) or,
//! for overloads, `Java_<class>_<method>__<args>` (long name), where each
//! component is escaped:
//!
//! | input      | output   |
//! |------------|----------|
//! | `/`        | `_`      |
//! | `_`        | `_1`     |
//! | `;`        | `_2`     |
//! | `[`        | `_3`     |
//! | non-ASCII  | `_0xxxx` |

use std::fmt::Write;

/// Escape one name component.
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' => out.push(c),
            '.' | '/' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            _ => {
                // Characters outside the BMP are emitted as a surrogate pair
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "_0{:04x}", unit);
                }
            }
        }
    }
    out
}

/// Strip the `L...;` wrapper from a class descriptor.
fn class_name(class_descriptor: &str) -> &str {
    class_descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(class_descriptor)
}

/// `Java_<class>_<method>`
pub fn jni_short_name(class_descriptor: &str, method_name: &str) -> String {
    format!("Java_{}_{}", mangle(class_name(class_descriptor)), mangle(method_name))
}

/// `Java_<class>_<method>__<args>`
///
/// `descriptor` is the full method descriptor; only the argument part
/// between the parentheses is used.
pub fn jni_long_name(class_descriptor: &str, method_name: &str, descriptor: &str) -> String {
    let args = descriptor
        .strip_prefix('(')
        .and_then(|s| s.split_once(')'))
        .map(|(args, _)| args)
        .unwrap_or("");
    format!("{}__{}", jni_short_name(class_descriptor, method_name), mangle(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle_escapes() {
        assert_eq!(mangle("java/lang/String"), "java_lang_String");
        assert_eq!(mangle("my_method"), "my_1method");
        assert_eq!(mangle("Ljava/lang/Object;"), "Ljava_lang_Object_2");
        assert_eq!(mangle("[I"), "_3I");
        assert_eq!(mangle("caf\u{e9}"), "caf_000e9");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(jni_short_name("Lcom/example/Calc;", "add"), "Java_com_example_Calc_add");
    }

    #[test]
    fn test_long_name() {
        assert_eq!(
            jni_long_name("Lcom/example/Map;", "get", "(Ljava/lang/Object;)Ljava/lang/Object;"),
            "Java_com_example_Map_get__Ljava_lang_Object_2"
        );
        assert_eq!(jni_long_name("LFoo;", "run", "()V"), "Java_Foo_run__");
    }

    #[test]
    fn test_supplementary_char_is_surrogate_pair() {
        assert_eq!(mangle("\u{1F600}"), "_0d83d_0de00");
    }
}
