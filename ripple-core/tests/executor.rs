//! The update scheduler running on a tokio `LocalSet`.

mod common;

use std::rc::Rc;

use common::{init_logging, Counter};
use ripple_core::reactive::{EffectOptions, Flush, Job, OnCleanup, Runtime, WatchOptions};
use ripple_core::scheduler::TokioExecutor;

#[tokio::test(flavor = "current_thread")]
async fn flush_runs_on_a_later_turn() {
    init_logging();
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async {
            let rt = Runtime::with_executor(Rc::new(TokioExecutor));
            let count = rt.create_ref(0);
            let runs = Counter::new();

            let _effect = rt.effect(
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

            for n in 1..=10 {
                count.set(n);
            }
            assert_eq!(runs.get(), 1);

            tokio::task::yield_now().await;
            assert_eq!(runs.get(), 2);
            assert_eq!(rt.flush_count(), 1);

            // An external event loop drives this executor; tick does nothing.
            assert_eq!(rt.tick(), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn pre_flush_watch_on_tokio() {
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async {
            let rt = Runtime::with_executor(Rc::new(TokioExecutor));
            let name = rt.create_ref(String::from("a"));
            let calls = Counter::new();

            let _handle = rt.watch(
                name.clone(),
                {
                    let calls = calls.clone();
                    move |_: &String, _: Option<&String>, _: &mut OnCleanup| calls.hit()
                },
                WatchOptions::default().flush(Flush::Pre),
            );

            name.set(String::from("b"));
            name.set(String::from("c"));
            assert_eq!(calls.get(), 0);

            tokio::task::yield_now().await;
            assert_eq!(calls.get(), 1);
        })
        .await;
}
