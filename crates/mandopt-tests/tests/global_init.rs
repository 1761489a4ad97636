//! Global initializers.
//!
//! These tests verify that:
//! 1. A call whose result is stored into a statically initialized global is
//!    inlined, so the initializer holds the value's construction directly
//! 2. A second call storing to the same location of the global is left alone
//! 3. A call whose result escapes elsewhere is never inlined

use mandopt::ir::verify::verify_module;
use mandopt::ir::{Instr, Module};
use mandopt::{optimize_module, OptimizerOptions};
use mandopt_tests::{escaping_initializer, global_init, init_logging, repeated_field_store};

fn applies_in(module: &Module, f: mandopt::ir::FuncId) -> usize {
    module
        .function(f)
        .body
        .as_ref()
        .map_or(0, |body| {
            body.instructions()
                .filter(|(_, i)| i.is_full_apply_site())
                .count()
        })
}

#[test]
fn test_stored_call_is_inlined() {
    init_logging();
    let mut s = global_init();
    let stats = optimize_module(&mut s.module, &OptimizerOptions::default()).unwrap();

    assert_eq!(stats.calls_inlined, 1);
    assert_eq!(applies_in(&s.module, s.init), 0);
    // Nothing calls makeValue anymore, so it was never visited.
    assert_eq!(stats.functions_optimized, 1);
    verify_module(&s.module).unwrap();

    let body = s.module.function(s.init).body.as_ref().unwrap();
    assert_eq!(body.blocks.len(), 1);
    let stored = body
        .instructions()
        .find_map(|(_, i)| match i {
            Instr::Store { value, .. } => Some(*value),
            _ => None,
        })
        .unwrap();
    // The global now receives the aggregate built in place.
    assert!(body
        .instructions()
        .any(|(_, i)| matches!(i, Instr::Struct { dest, fields } if *dest == stored && fields.len() == 2)));
}

#[test]
fn test_same_location_is_inlined_once() {
    init_logging();
    let mut s = repeated_field_store();
    let stats = optimize_module(&mut s.module, &OptimizerOptions::default()).unwrap();

    assert_eq!(stats.calls_inlined, 1);
    assert_eq!(applies_in(&s.module, s.init), 1);
    // The remaining call makes the callee reachable.
    assert_eq!(stats.functions_optimized, 2);
    let body = s.module.function(s.init).body.as_ref().unwrap();
    let remaining = body
        .instructions()
        .find_map(|(_, i)| i.as_apply())
        .and_then(|a| a.direct_callee());
    assert_eq!(remaining, Some(s.make_value));
}

#[test]
fn test_escaping_value_is_not_inlined() {
    init_logging();
    let mut s = escaping_initializer();
    let stats = optimize_module(&mut s.module, &OptimizerOptions::default()).unwrap();

    assert_eq!(stats.calls_inlined, 0);
    assert_eq!(applies_in(&s.module, s.init), 2);
    // `log` has no body.
    assert_eq!(stats.functions_skipped, 1);
    assert_eq!(stats.functions_optimized, 2);
}

#[test]
fn test_initializer_of_dynamic_global_is_not_a_root() {
    init_logging();
    let mut s = global_init();
    s.module.globals[s.global.as_usize()].must_be_initialized_statically = false;
    let stats = optimize_module(&mut s.module, &OptimizerOptions::default()).unwrap();

    assert_eq!(stats.functions_optimized, 0);
    assert_eq!(applies_in(&s.module, s.init), 1);
}
