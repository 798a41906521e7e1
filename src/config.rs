//! Ambient method-set configuration (`SPEC_FULL.md` §4.9), grounded on
//! `methodset.cpp`'s glob-pattern matcher and `interpconfig.cpp`'s
//! environment-variable-driven toggles. This module is deliberately never
//! consulted by `compile_method` itself — it exists for embedders that
//! want to gate tracing, dumping, or alternate lowering strategies by
//! method name, the same way the original interpreter's `s_interpMethods`
//! method-set gated its own diagnostic dumps.

use std::fmt;

/// One `assembly!Class:Method(sig)` pattern, any component of which may be
/// the wildcard `*` (match anything) or contain `?` (match one
/// character). Mirrors `MethodSet::initialize`'s delimiter scan over `!`,
/// `:`, `(`, and `[`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodPattern {
    pub assembly: Option<String>,
    pub class: Option<String>,
    pub method: String,
    pub signature: Option<String>,
}

impl MethodPattern {
    /// Parses one pattern from the space-separated list syntax the
    /// original `MethodSet::initialize` consumes. The method-name component is the
    /// only one that is not optional — a bare pattern like `Foo` means
    /// "any assembly, any class, method named Foo".
    pub fn parse(pattern: &str) -> Option<MethodPattern> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }

        let (assembly, rest) = match pattern.split_once('!') {
            Some((a, r)) => (Some(a.to_string()), r),
            None => (None, pattern),
        };

        let (class, rest) = match rest.rsplit_once(':') {
            Some((c, r)) => (Some(c.to_string()), r),
            None => (None, rest),
        };

        let (method, signature) = match rest.split_once('(') {
            Some((m, sig)) => (m.to_string(), Some(format!("({sig}"))),
            None => (rest.to_string(), None),
        };

        if method.is_empty() {
            return None;
        }

        Some(MethodPattern { assembly, class, method, signature })
    }

    /// `MethodSet::contains`'s per-component glob match, applied to one
    /// already-resolved method name (signature matching is accepted
    /// syntactically but not evaluated, matching the instructions'
    /// Non-goal on overload-aware matching).
    pub fn matches(&self, assembly: &str, class: &str, method: &str) -> bool {
        let assembly_ok = match &self.assembly {
            Some(p) => glob_match(p, assembly),
            None => true,
        };
        let class_ok = match &self.class {
            Some(p) => glob_match(p, class),
            None => true,
        };
        assembly_ok && class_ok && glob_match(&self.method, method)
    }
}

/// `*`/`?` glob matching, case-sensitive, as in `methodset.cpp`'s
/// `WildcardMatch`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_rec(&p, &t)
}

fn glob_match_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => glob_match_rec(&p[1..], t) || (!t.is_empty() && glob_match_rec(p, &t[1..])),
        Some('?') => !t.is_empty() && glob_match_rec(&p[1..], &t[1..]),
        Some(&c) => t.first() == Some(&c) && glob_match_rec(&p[1..], &t[1..]),
    }
}

/// A space-separated collection of patterns, as produced by parsing an
/// environment variable such as `INTERP_TraceMethods`.
#[derive(Clone, Debug, Default)]
pub struct MethodSet {
    patterns: Vec<MethodPattern>,
}

impl MethodSet {
    pub fn empty() -> MethodSet {
        MethodSet::default()
    }

    pub fn parse(list: &str) -> MethodSet {
        let patterns = list.split_whitespace().filter_map(MethodPattern::parse).collect();
        MethodSet { patterns }
    }

    pub fn contains(&self, assembly: &str, class: &str, method: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(assembly, class, method))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Ambient toggles read once at process start, mirroring
/// `InterpConfig`'s `DOTNET_Interp*` environment-variable surface.
/// `compile_method` never reads this struct; an embedder threads it
/// through to gate its own tracing/dumping around the call.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub trace_methods: MethodSet,
    pub dump_ir_methods: MethodSet,
    /// Disables the `unlink_unreachable_blocks` prune pass, useful when
    /// diffing intermediate CFGs against a reference dump.
    pub keep_unreachable_blocks: bool,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            trace_methods: std::env::var("INTERP_TraceMethods")
                .map(|v| MethodSet::parse(&v))
                .unwrap_or_default(),
            dump_ir_methods: std::env::var("INTERP_DumpIRMethods")
                .map(|v| MethodSet::parse(&v))
                .unwrap_or_default(),
            keep_unreachable_blocks: std::env::var("INTERP_KeepUnreachableBlocks").is_ok(),
        }
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(a) = &self.assembly {
            write!(f, "{a}!")?;
        }
        if let Some(c) = &self.class {
            write!(f, "{c}:")?;
        }
        write!(f, "{}", self.method)?;
        if let Some(s) = &self.signature {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_pattern() {
        let p = MethodPattern::parse("MyAsm!MyNs.MyClass:MyMethod(System.Int32)").unwrap();
        assert_eq!(p.assembly.as_deref(), Some("MyAsm"));
        assert_eq!(p.class.as_deref(), Some("MyNs.MyClass"));
        assert_eq!(p.method, "MyMethod");
        assert_eq!(p.signature.as_deref(), Some("(System.Int32)"));
    }

    #[test]
    fn bare_method_name_matches_any_assembly_and_class() {
        let p = MethodPattern::parse("Foo").unwrap();
        assert!(p.matches("AnyAsm", "AnyClass", "Foo"));
        assert!(!p.matches("AnyAsm", "AnyClass", "Bar"));
    }

    #[test]
    fn wildcard_matches_prefix() {
        let p = MethodPattern::parse("Get*").unwrap();
        assert!(p.matches("Asm", "Class", "GetValue"));
        assert!(!p.matches("Asm", "Class", "SetValue"));
    }

    #[test]
    fn method_set_matches_any_pattern_in_list() {
        let set = MethodSet::parse("Foo Bar Baz*");
        assert!(set.contains("A", "B", "Bar"));
        assert!(set.contains("A", "B", "Bazooka"));
        assert!(!set.contains("A", "B", "Quux"));
    }
}
