use super::{output, run_err};

#[test]
fn spawn_and_join_returns_the_result() {
    let prog = "
func work() ret 6 * 7
t = thread(work)
print(t.join())
";
    assert_eq!(output(prog), "42\n");
}

#[test]
fn thread_arguments_are_spliced() {
    let prog = "
func add(a, b) ret a + b
t = thread(add, (20, 22))
print(t.join())
";
    assert_eq!(output(prog), "42\n");
}

#[test]
fn join_reraises_the_thread_exception() {
    let err = run_err("func blow() throw KeyError(\"in thread\")\nthread(blow).join()");
    assert_eq!(err.value.type_name(), "KeyError");
}

#[test]
fn threads_share_the_object_graph_under_the_gil() {
    let prog = "
l = []
func work() {
    for i in range(200) l.push(i)
}
t1 = thread(work)
t2 = thread(work)
t1.join()
t2.join()
print(len(l))
";
    assert_eq!(output(prog), "400\n");
}

#[test]
fn many_threads_stress_shared_counters() {
    // refcounts and table state stay coherent under concurrent mutation
    let prog = "
d = {\"n\": 0}
func bump() {
    for i in range(50) d[\"n\"] += 1
}
ts = []
for i in range(8) ts.push(thread(bump))
for t in ts t.join()
print(d[\"n\"])
";
    assert_eq!(output(prog), "400\n");
}

#[test]
fn sleep_yields_the_lock() {
    let prog = "
func napper() {
    sleep(0.01)
    ret \"rested\"
}
t = thread(napper)
print(t.join())
";
    assert_eq!(output(prog), "rested\n");
}

#[test]
fn gil_stress_across_host_threads() {
    use rand::Rng;

    // many OS threads hammer one machine with programs of random sizes;
    // every execution must see consistent singleton refcounts and table
    // state, which only holds if the lock truly serializes the graph
    let machine = crate::machine::Machine::capturing();
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let machine = machine.clone();
            std::thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..20 {
                    let n: i64 = rng.gen_range(10..200);
                    let prog = format!("x = 0\nfor i in range({n}) x += 1\nx");
                    let out = machine.exec_source("<stress>", &prog).unwrap();
                    assert_eq!(out.as_i64(), Some(n));
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
}

#[test]
fn join_twice_is_benign() {
    let prog = "
func work() ret 1
t = thread(work)
print(t.join())
print(t.join())
";
    assert_eq!(output(prog), "1\nnone\n");
}
