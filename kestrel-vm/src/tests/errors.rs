use super::{output, run, run_err};
use crate::error::render;

#[test]
fn uncaught_errors_escape_with_a_trace() {
    let err = run_err("x = 1\ny = x + \"no\"");
    assert_eq!(err.value.type_name(), "OpError");
    assert!(!err.trace.is_empty());
    let text = render(&err);
    assert!(text.contains("OpError"));
    assert!(text.contains("<test>"), "trace names the source: {text}");
}

#[test]
fn trace_reaches_into_functions() {
    let err = run_err("func inner() throw KeyError(\"lost\")\nfunc outer() inner()\nouter()");
    assert_eq!(err.value.type_name(), "KeyError");
    let names: Vec<&str> = err.trace.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"inner"), "{names:?}");
    assert!(names.contains(&"outer"), "{names:?}");
}

#[test]
fn catch_binds_the_thrown_value() {
    assert_eq!(
        output("try throw TypeError(\"bad\") catch e print(type(e), e.what)"),
        "TypeError bad\n"
    );
}

#[test]
fn catch_without_a_binder() {
    assert_eq!(output("try throw Error(\"x\") catch { print(\"caught\") }"), "caught\n");
}

#[test]
fn uncaught_rethrow_from_catch() {
    let err = run_err("try throw Error(\"first\") catch e throw e");
    assert_eq!(err.value.type_name(), "Error");
}

#[test]
fn nested_try_unwinds_to_the_inner_handler_first() {
    let prog = "
try {
    try throw Error(\"inner\") catch e print(\"one:\", e.what)
    throw Error(\"outer\")
} catch e print(\"two:\", e.what)
";
    assert_eq!(output(prog), "one: inner\ntwo: outer\n");
}

#[test]
fn handler_catches_errors_from_called_functions() {
    let prog = "
func blow() ret [1][5]
try blow() catch e print(type(e))
print(\"after\")
";
    assert_eq!(output(prog), "KeyError\nafter\n");
}

#[test]
fn out_of_iter_is_catchable_like_any_value() {
    // a user-raised sentinel is indistinguishable from the iterator's own
    assert_eq!(
        output("try throw OutOfIterError(\"\") catch e print(type(e))"),
        "OutOfIterError\n"
    );
}

#[test]
fn loops_propagate_non_sentinel_errors() {
    let prog = "
func weird() {
    for x in [1, 2, 3] {
        if x == 2 throw TypeError(\"mid-loop\")
    }
}
try weird() catch e print(e.what)
";
    assert_eq!(output(prog), "mid-loop\n");
}

#[test]
fn throw_accepts_arbitrary_values() {
    assert_eq!(output("try throw 42 catch e print(e + 1)"), "43\n");
}

#[test]
fn syntax_errors_carry_a_caret() {
    let (out, _m) = run("x = (1 +");
    let err = out.unwrap_err();
    assert_eq!(err.value.type_name(), "SyntaxError");
    let text = render(&err);
    assert!(text.contains('^'), "{text}");
    assert!(text.contains("x = (1 +"), "{text}");
}

#[test]
fn undeclared_variables_report_the_name() {
    let err = run_err("print(missing_thing)");
    let what = crate::error::error_what(&err.value).unwrap_or_default();
    assert!(what.contains("missing_thing"), "{what}");
}

#[test]
fn stack_depth_is_bounded() {
    let err = run_err("func f() ret f()\nf()");
    assert_eq!(err.value.type_name(), "InternalError");
}

#[test]
fn value_stack_is_restored_after_a_catch() {
    // the handler truncates the frame's value stack back to its
    // recorded depth, so expression state does not leak across catches
    let prog = "
total = 0
for i in range(100) {
    try {
        x = 1 + [0][i]
    } catch e total += 1
}
print(total)
";
    // index 0 succeeds once, the other 99 raise mid-expression
    assert_eq!(output(prog), "99\n");
}
