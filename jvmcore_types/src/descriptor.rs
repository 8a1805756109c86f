//! Helpers for interpreting JVM method return descriptors.
//!
//! Only the return type is needed here (to compute operand-stack arity and native
//! return-value shaping); full descriptor parsing belongs to the class-file collaborator.

/// How many operand-stack slots a method's return value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnArity {
    /// `V` - no value, no slots.
    Void,
    /// `J` or `D` - long or double, two slots.
    Wide,
    /// `Z` - boolean, one slot, normalized to `0`/`1`.
    Boolean,
    /// Every other primitive or reference type - one slot.
    Single,
}

/// Classifies a JVM return descriptor (e.g. `"V"`, `"I"`, `"Ljava/lang/String;"`) by arity.
#[must_use]
pub fn return_arity(descriptor: &str) -> ReturnArity {
    match descriptor {
        "V" => ReturnArity::Void,
        "J" | "D" => ReturnArity::Wide,
        "Z" => ReturnArity::Boolean,
        _ => ReturnArity::Single,
    }
}

/// Extracts the class name from a reference return descriptor (`"Ljava/lang/String;"` ->
/// `"java/lang/String"`), or `None` if `descriptor` is not a reference or array type.
#[must_use]
pub fn reference_class_name(descriptor: &str) -> Option<&str> {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
}
