use super::{eval, output, run_err};

// Lists.

#[test]
fn push_then_pop_returns_the_value() {
    assert_eq!(
        output("l = [1, 2]; l.push(9); x = l.pop(); print(x, len(l))"),
        "9 2\n"
    );
}

#[test]
fn pop_on_empty_is_a_size_error() {
    assert_eq!(run_err("[].pop()").value.type_name(), "SizeError");
}

#[test]
fn list_index_and_negative_wrap() {
    assert_eq!(output("l = [10, 20, 30]; print(l[0], l[-1])"), "10 30\n");
    assert_eq!(run_err("[1][5]").value.type_name(), "KeyError");
    assert_eq!(run_err("[][0]").value.type_name(), "KeyError");
}

#[test]
fn list_slicing() {
    assert_eq!(output("l = [0,1,2,3,4,5]; print(l[slice(1, 4)])"), "[1, 2, 3]\n");
    assert_eq!(
        output("l = [0,1,2,3,4,5]; print(l[slice(none, none, 2)])"),
        "[0, 2, 4]\n"
    );
    assert_eq!(
        output("l = [0,1,2,3]; print(l[slice(none, none, -1)])"),
        "[3, 2, 1, 0]\n"
    );
}

#[test]
fn slice_with_zero_step_is_an_arg_error() {
    assert_eq!(
        run_err("[1,2,3][slice(none, none, 0)]").value.type_name(),
        "ArgError"
    );
}

#[test]
fn mutation_during_iteration_sees_the_live_list() {
    let prog = "
l = [1, 2, 3]
seen = []
for x in l {
    seen.push(x)
    if x == 1 l.pop()
}
print(seen)
";
    // popping shortens the list; iteration stops at the new length
    assert_eq!(output(prog), "[1, 2]\n");
}

// Dicts.

#[test]
fn dict_get_set_del_has() {
    let prog = "
d = {\"a\": 1, \"b\": 2}
d.set(\"c\", 3)
print(d.get(\"c\"), d.has(\"b\"), d.get(\"zz\", 42))
d.del(\"b\")
print(d.has(\"b\"), len(d))
";
    assert_eq!(output(prog), "3 true 42\nfalse 2\n");
}

#[test]
fn missing_key_is_a_key_error() {
    assert_eq!(run_err("{\"a\": 1}[\"b\"]").value.type_name(), "KeyError");
}

#[test]
fn delete_then_set_moves_the_key_last() {
    let prog = "
d = {\"a\": 1, \"b\": 2, \"c\": 3}
d.del(\"b\")
d.set(\"b\", 9)
keys = []
for k in d keys.push(k)
print(keys, d[\"b\"])
";
    assert_eq!(output(prog), "['a', 'c', 'b'] 9\n");
}

#[test]
fn insertion_order_survives_growth() {
    let prog = "
d = {}
for i in range(100) d[str(i)] = i
first = none
count = 0
for k in d {
    if count == 0 first = k
    count += 1
}
print(first, count, d[\"57\"])
";
    assert_eq!(output(prog), "0 100 57\n");
}

#[test]
fn numeric_keys_unify_across_kinds() {
    // 1, 1.0 and true are the same mathematical key
    assert_eq!(output("d = {1: \"one\"}; print(d[1.0], d[true])"), "one one\n");
}

#[test]
fn unhashable_keys_are_type_errors() {
    assert_eq!(run_err("d = {}; d[[1]] = 2").value.type_name(), "TypeError");
}

// Sets.

#[test]
fn set_add_has_del() {
    let prog = "
s = set([1, 2, 2, 3])
print(len(s), s.has(2))
s.add(4)
s.del(1)
items = []
for x in s items.push(x)
print(items)
";
    assert_eq!(output(prog), "3 true\n[2, 3, 4]\n");
}

#[test]
fn empty_containers_iterate_zero_times() {
    let prog = "
count = 0
for x in [] count += 1
for x in {} count += 1
for x in set([]) count += 1
for x in \"\" count += 1
print(count)
";
    assert_eq!(output(prog), "0\n");
}

// Tuples and strings as sequences.

#[test]
fn tuple_index_errors_outside_range() {
    assert_eq!(output("t = (1, 2, 3); print(t[0], t[-3])"), "1 1\n");
    assert_eq!(run_err("(1, 2)[2]").value.type_name(), "KeyError");
    assert_eq!(run_err("(1, 2)[-3]").value.type_name(), "KeyError");
}

#[test]
fn string_indexing_is_by_code_point() {
    assert_eq!(output("s = \"héllo\"; print(s[1], s[-1])"), "é o\n");
    assert_eq!(run_err("\"ab\"[2]").value.type_name(), "KeyError");
}

#[test]
fn string_len_is_in_bytes() {
    // 'é' is two UTF-8 bytes
    assert_eq!(eval("len(\"héllo\")").as_i64(), Some(6));
}

#[test]
fn bytes_basics() {
    assert_eq!(
        output("b = bytes([104, 105]); print(b, len(b), b[0])"),
        "b'hi' 2 b'h'\n"
    );
}
