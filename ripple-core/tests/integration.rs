//! Integration Tests for Reactive System
//!
//! These tests verify that tracked objects, refs, computed values, effects,
//! watchers and the scheduler work together correctly.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{init_logging, Counter};
use ripple_core::reactive::{
    EffectOptions, Getter, Job, OnCleanup, RawObject, Reactive, Runtime, Value, WatchOptions,
};
use serde_json::json;

fn state(rt: &Runtime, json: serde_json::Value) -> Reactive {
    rt.wrap(&RawObject::from_json(json))
}

/// Reading one key many times in a run links the subscriber once.
#[test]
fn repeated_reads_link_once() {
    init_logging();
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "n": 1 }));

    let effect = rt.effect(
        {
            let obj = obj.clone();
            move || {
                for _ in 0..10 {
                    obj.get("n");
                }
            }
        },
        Default::default(),
    );

    assert_eq!(obj.subscriber_count("n"), 1);
    assert_eq!(effect.dependency_count(), 1);

    // And again after a re-run
    obj.set("n", 2);
    assert_eq!(obj.subscriber_count("n"), 1);
    assert_eq!(effect.dependency_count(), 1);
}

/// K writes in one burst resolve into one run of each scheduled job, after
/// all of them are visible.
#[test]
fn burst_of_writes_runs_scheduled_job_once() {
    init_logging();
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "a": 0, "b": 0 }));
    let seen: Rc<RefCell<Vec<(i64, i64)>>> = Default::default();

    let scheduler = {
        let rt = rt.clone();
        move |job: &Job| rt.queue_job(job.clone())
    };
    let _effect = rt.effect(
        {
            let obj = obj.clone();
            let seen = seen.clone();
            move || {
                let a = obj.get("a").as_int().unwrap_or_default();
                let b = obj.get("b").as_int().unwrap_or_default();
                seen.borrow_mut().push((a, b));
            }
        },
        EffectOptions::default().scheduler(scheduler),
    );

    for k in 1..=5 {
        obj.set("a", k);
        obj.set("b", k * 10);
    }
    assert_eq!(*seen.borrow(), vec![(0, 0)]);

    rt.tick();
    assert_eq!(*seen.borrow(), vec![(0, 0), (5, 50)]);
    assert_eq!(rt.flush_count(), 1);
}

/// Computed getters run once per change, on read.
#[test]
fn computed_getter_call_counts() {
    init_logging();
    let rt = Runtime::new();
    let a = rt.create_ref(1);
    let b = rt.create_ref(2);
    let calls = Counter::new();

    let sum = rt.computed({
        let (a, b, calls) = (a.clone(), b.clone(), calls.clone());
        move || {
            calls.hit();
            a.get() + b.get()
        }
    });

    assert_eq!(sum.get(), 3);
    assert_eq!(calls.get(), 1);

    assert_eq!(sum.get(), 3);
    assert_eq!(calls.get(), 1);

    a.set(10);
    assert_eq!(sum.get(), 12);
    assert_eq!(calls.get(), 2);
}

/// An effect reading a computed re-runs when the computed's source changes.
#[test]
fn effect_through_computed_chain() {
    let rt = Runtime::new();
    let base = rt.create_ref(2);
    let squared = rt.computed({
        let base = base.clone();
        move || base.get() * base.get()
    });
    let plus_one = rt.computed({
        let squared = squared.clone();
        move || squared.get() + 1
    });

    let seen: Rc<RefCell<Vec<i32>>> = Default::default();
    let _effect = rt.effect(
        {
            let seen = seen.clone();
            move || seen.borrow_mut().push(plus_one.get())
        },
        Default::default(),
    );

    base.set(3);
    base.set(4);
    assert_eq!(*seen.borrow(), vec![5, 10, 17]);
}

/// A stopped subscriber is never called again.
#[test]
fn stopped_effect_sees_no_more_triggers() {
    init_logging();
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "n": 0 }));
    let runs = Counter::new();
    let scheduled = Counter::new();

    let effect = rt.effect(
        {
            let (obj, runs) = (obj.clone(), runs.clone());
            move || {
                runs.hit();
                obj.get("n");
            }
        },
        EffectOptions::default().scheduler({
            let scheduled = scheduled.clone();
            move |job: &Job| {
                scheduled.hit();
                job.run();
            }
        }),
    );
    obj.set("n", 1);
    assert_eq!((runs.get(), scheduled.get()), (2, 1));

    effect.stop();
    obj.set("n", 2);
    assert_eq!((runs.get(), scheduled.get()), (2, 1));
    assert_eq!(obj.subscriber_count("n"), 0);
    assert_eq!(rt.dependency_set_count(), 0);
}

/// A job captured in a pending flush still runs after `stop`, untracked.
#[test]
fn job_captured_before_stop_still_runs_once() {
    let rt = Runtime::new();
    let count = rt.create_ref(0);
    let runs = Counter::new();

    let effect = rt.effect(
        {
            let (count, runs) = (count.clone(), runs.clone());
            move || {
                runs.hit();
                count.get();
            }
        },
        EffectOptions::default().scheduler({
            let rt = rt.clone();
            move |job: &Job| rt.queue_job(job.clone())
        }),
    );

    count.set(1);
    effect.stop();
    rt.tick();

    assert_eq!(runs.get(), 2);
    assert_eq!(count.subscriber_count(), 0);
}

/// Same job twice before a flush runs once; a job queued during a flush
/// runs in the next one.
#[test]
fn scheduler_dedupes_and_defers_requeues() {
    let rt = Runtime::new();
    let log: Rc<RefCell<Vec<(&'static str, u64)>>> = Default::default();

    let second = {
        let (rt, log) = (rt.clone(), log.clone());
        Job::new(move || log.borrow_mut().push(("second", rt.flush_count())))
    };
    let first = {
        let (rt, log) = (rt.clone(), log.clone());
        Job::new(move || {
            log.borrow_mut().push(("first", rt.flush_count()));
            rt.queue_job(second.clone());
        })
    };

    rt.queue_job(first.clone());
    rt.queue_job(first);
    rt.tick();
    rt.tick();

    assert_eq!(*log.borrow(), vec![("first", 1), ("second", 2)]);
}

/// Writing inside one's own run does not re-trigger oneself.
#[test]
fn self_write_does_not_loop() {
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "n": 0 }));
    let runs = Counter::new();

    let _effect = rt.effect(
        {
            let (obj, runs) = (obj.clone(), runs.clone());
            move || {
                runs.hit();
                let n = obj.get("n").as_int().unwrap_or_default();
                obj.set("n", n + 1);
            }
        },
        Default::default(),
    );

    assert_eq!(runs.get(), 1);
    assert_eq!(obj.get_untracked("n"), Value::from(1));
}

/// Nested records are tracked lazily on read.
#[test]
fn nested_write_triggers_deep_reader() {
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "user": { "name": "ada" } }));
    let seen: Rc<RefCell<Vec<String>>> = Default::default();

    let _effect = rt.effect(
        {
            let (obj, seen) = (obj.clone(), seen.clone());
            move || {
                let name = match obj.get("user") {
                    Value::Reactive(user) => user.get("name").to_display_string(),
                    _ => String::new(),
                };
                seen.borrow_mut().push(name);
            }
        },
        Default::default(),
    );

    let user = obj.get_untracked("user");
    user.as_reactive().unwrap().set("name", "grace");
    assert_eq!(*seen.borrow(), vec!["ada", "grace"]);
}

/// Adding or removing keys notifies readers of the key set.
#[test]
fn key_iteration_is_tracked() {
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "a": 1 }));
    let sizes: Rc<RefCell<Vec<usize>>> = Default::default();

    let _effect = rt.effect(
        {
            let (obj, sizes) = (obj.clone(), sizes.clone());
            move || sizes.borrow_mut().push(obj.keys().len())
        },
        Default::default(),
    );

    obj.set("b", 2);
    obj.set("b", 3);
    obj.remove("a");
    assert_eq!(*sizes.borrow(), vec![1, 2, 1]);
}

/// Conditional reads drop the branch no longer taken.
#[test]
fn stale_branch_is_pruned() {
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "flag": true, "a": 1, "b": 2 }));
    let runs = Counter::new();

    let _effect = rt.effect(
        {
            let (obj, runs) = (obj.clone(), runs.clone());
            move || {
                runs.hit();
                if obj.get("flag") == Value::from(true) {
                    obj.get("a");
                } else {
                    obj.get("b");
                }
            }
        },
        Default::default(),
    );

    obj.set("flag", false);
    assert_eq!(obj.subscriber_count("a"), 0);
    assert_eq!(obj.subscriber_count("b"), 1);

    obj.set("a", 100);
    assert_eq!(runs.get(), 2);
}

/// Watchers over tracked objects fire on nested writes.
#[test]
fn watch_deep_object_and_getter() {
    init_logging();
    let rt = Runtime::new();
    let obj = state(&rt, json!({ "todo": { "done": false }, "title": "x" }));
    let deep = Counter::new();
    let titles: Rc<RefCell<Vec<(String, Option<String>)>>> = Default::default();

    let _deep = rt.watch(
        obj.clone(),
        {
            let deep = deep.clone();
            move |_: &Reactive, _: Option<&Reactive>, _: &mut OnCleanup| deep.hit()
        },
        WatchOptions::default(),
    );
    let _title = rt.watch(
        Getter({
            let obj = obj.clone();
            move || obj.get("title").to_display_string()
        }),
        {
            let titles = titles.clone();
            move |new: &String, old: Option<&String>, _: &mut OnCleanup| {
                titles.borrow_mut().push((new.clone(), old.cloned()))
            }
        },
        WatchOptions::default().immediate(true),
    );

    let todo = obj.get_untracked("todo");
    todo.as_reactive().unwrap().set("done", true);
    obj.set("title", "y");

    assert_eq!(deep.get(), 2);
    assert_eq!(
        *titles.borrow(),
        vec![
            ("x".to_string(), None),
            ("y".to_string(), Some("x".to_string()))
        ]
    );
}

/// Handles keep working, untracked, once the runtime is gone.
#[test]
fn handles_outlive_runtime() {
    let (count, doubled) = {
        let rt = Runtime::new();
        let count = rt.create_ref(2);
        let doubled = rt.computed({
            let count = count.clone();
            move || count.get() * 2
        });
        (count, doubled)
    };

    assert_eq!(doubled.get(), 4);
    count.set(5);
    assert_eq!(count.get(), 5);
}

/// Independent runtimes share nothing.
#[test]
fn runtimes_do_not_interfere() {
    let first = Runtime::new();
    let second = Runtime::new();
    let raw = RawObject::from_json(json!({ "n": 1 }));

    let a = first.wrap(&raw);
    let b = second.wrap(&raw);
    assert_ne!(a, b);

    let runs = Counter::new();
    let _effect = first.effect(
        {
            let (a, runs) = (a.clone(), runs.clone());
            move || {
                runs.hit();
                a.get("n");
            }
        },
        Default::default(),
    );

    // Writes through the other runtime's wrapper notify its own graph only.
    b.set("n", 2);
    assert_eq!(runs.get(), 1);
    a.set("n", 3);
    assert_eq!(runs.get(), 2);
}
