//! Host-side invariant checks.
//!
//! Violations here are implementation bugs, never JVM exceptions. [`host_fault`] logs at
//! `error` level and then panics, so a diagnostic survives even if a caller's panic hook
//! swallows the panic message. [`check_return_value`] is the return-value sanity check: a
//! debugging aid only, compiled out entirely when `debug_assertions` is off.

use jvmcore_types::{ClassLoader, Method, ReturnArity, ReturnSlot, Value, return_arity};
use std::rc::Rc;

/// Log `message` at error level, then abort the process.
///
/// Never returns. Used for every host-side invariant violation: illegal status transitions,
/// a frame of the wrong kind asked to run the wrong thing, a return-value mismatch.
#[track_caller]
pub fn host_fault(message: &str) -> ! {
    tracing::error!(message, "host invariant violated");
    panic!("{message}");
}

/// Validate `(rv1, rv2)` against `method`'s declared return descriptor.
///
/// `bootstrap_loader` is consulted to resolve the declared return class if `method`'s own class
/// loader hasn't resolved it yet.
///
/// A no-op when `debug_assertions` is disabled: this check exists purely to catch scheduler or
/// opcode bugs during development, not as part of the crate's release-mode correctness contract.
pub fn check_return_value(
    method: &Rc<dyn Method>,
    rv1: &Option<Value>,
    rv2: &ReturnSlot,
    bootstrap_loader: &Rc<dyn ClassLoader>,
) {
    if !cfg!(debug_assertions) {
        return;
    }
    check_return_value_impl(method, rv1, rv2, bootstrap_loader);
}

fn check_return_value_impl(
    method: &Rc<dyn Method>,
    rv1: &Option<Value>,
    rv2: &ReturnSlot,
    bootstrap_loader: &Rc<dyn ClassLoader>,
) {
    let descriptor = method.return_descriptor();
    match return_arity(descriptor) {
        ReturnArity::Void => {
            if rv1.is_some() || !rv2.is_absent() {
                host_fault(&format!(
                    "method {} declared void but returned a value",
                    method.full_signature()
                ));
            }
        }
        ReturnArity::Wide => {
            if rv1.is_none() {
                host_fault(&format!(
                    "method {} declared a wide return ({descriptor}) but returned nothing",
                    method.full_signature()
                ));
            }
            if !rv2.is_null() {
                host_fault(&format!(
                    "method {} declared a wide return ({descriptor}) but its second slot was not Null",
                    method.full_signature()
                ));
            }
            check_primitive_shape(method, descriptor, rv1.as_ref(), bootstrap_loader);
        }
        ReturnArity::Boolean | ReturnArity::Single => {
            if rv1.is_none() {
                host_fault(&format!(
                    "method {} declared a value return ({descriptor}) but returned nothing",
                    method.full_signature()
                ));
            }
            if !rv2.is_absent() {
                host_fault(&format!(
                    "method {} declared a single-slot return ({descriptor}) but a second slot was provided",
                    method.full_signature()
                ));
            }
            check_primitive_shape(method, descriptor, rv1.as_ref(), bootstrap_loader);
        }
    }
}

fn check_primitive_shape(
    method: &Rc<dyn Method>,
    descriptor: &str,
    value: Option<&Value>,
    bootstrap_loader: &Rc<dyn ClassLoader>,
) {
    let Some(value) = value else { return };
    let shape_matches = match (descriptor, value) {
        ("I" | "S" | "C" | "B", Value::Int(_))
        | ("Z", Value::Int(_))
        | ("J", Value::Long(_))
        | ("F", Value::Float(_))
        | ("D", Value::Double(_)) => true,
        (descriptor, Value::Reference(reference)) if descriptor.starts_with('L') || descriptor.starts_with('[') => {
            match reference {
                None => true,
                Some(object) => match jvmcore_types::reference_class_name(descriptor) {
                    Some(expected_class) => method
                        .class()
                        .loader()
                        .resolved_class(expected_class)
                        .or_else(|| bootstrap_loader.resolved_class(expected_class))
                        .is_none_or(|expected| object.class().is_castable(expected.as_ref())),
                    None => true,
                },
            }
        }
        (descriptor, Value::Str(_)) if descriptor.starts_with('L') => true,
        _ => false,
    };
    if !shape_matches {
        host_fault(&format!(
            "method {} declared return type {descriptor} but returned {value:?}",
            method.full_signature()
        ));
    }
}
