//! Stage-2 fixed-size worker pool (spec §5, "Stage 2 is parallel
//! threads: a fixed-size worker pool pulls ids from the dependency
//! tracker's drain queues").

use std::sync::Mutex;

use crossbeam_channel::bounded;

use crate::error::{CoreError, Result};

/// Runs `work(state, id)` for every id in `ids` across `num_workers` OS
/// threads, where each thread owns one `T` built by `init()` (spec §5,
/// "each worker gets a clone of the output"). Each id is processed by
/// exactly one worker. Returns the per-thread states on success so the
/// caller can fold them back (e.g. merging each worker's expiry set into
/// a master). The first fatal error observed aborts the remaining queue
/// and is returned; recoverable errors are logged by `work` and do not
/// stop the drain.
pub fn drain_parallel<T, I, F>(ids: Vec<i64>, num_workers: u32, init: I, work: F) -> Result<Vec<T>>
where
    T: Send,
    I: Fn() -> T + Sync,
    F: Fn(&mut T, i64) -> Result<()> + Sync,
{
    let num_workers = num_workers.max(1) as usize;
    let (tx, rx) = bounded::<i64>(ids.len().max(1));
    for id in &ids {
        tx.send(*id).expect("channel sized to queue length");
    }
    drop(tx);

    let first_fatal: Mutex<Option<CoreError>> = Mutex::new(None);

    let states = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..num_workers)
            .map(|_| {
                let rx = rx.clone();
                let work = &work;
                let init = &init;
                let first_fatal = &first_fatal;
                scope.spawn(move || {
                    let mut state = init();
                    while let Ok(id) = rx.recv() {
                        if first_fatal.lock().unwrap().is_some() {
                            break;
                        }
                        if let Err(err) = work(&mut state, id) {
                            if err.is_fatal() {
                                let mut slot = first_fatal.lock().unwrap();
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                                break;
                            } else {
                                log::warn!("recoverable error draining id {id}: {err}");
                            }
                        }
                    }
                    state
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect::<Vec<T>>()
    });

    match first_fatal.into_inner().unwrap() {
        Some(err) => Err(err),
        None => Ok(states),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn processes_every_id_exactly_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let states = drain_parallel(
            vec![1, 2, 3, 4, 5],
            3,
            || (),
            {
                let seen = seen.clone();
                move |_state, id| {
                    seen.lock().unwrap().push(id);
                    Ok(())
                }
            },
        )
        .unwrap();
        assert_eq!(states.len(), 3);
        let mut got = seen.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fatal_error_is_propagated() {
        let err = drain_parallel(vec![1, 2, 3], 2, || (), |_state, id| {
            if id == 2 {
                Err(CoreError::BackendFailure("boom".to_string()))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn recoverable_error_does_not_abort_the_drain() {
        let count = Arc::new(AtomicUsize::new(0));
        drain_parallel(vec![1, 2, 3], 1, || (), {
            let count = count.clone();
            move |_state, _id| {
                count.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::InvalidGeometry("dropped".to_string()))
            }
        })
        .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_queue_still_builds_worker_state() {
        let states = drain_parallel(Vec::new(), 4, || 7_i32, |_state, _id| Ok(())).unwrap();
        assert_eq!(states.len(), 4);
        assert!(states.iter().all(|&s| s == 7));
    }

    #[test]
    fn per_thread_state_accumulates_independently() {
        let states = drain_parallel(
            (0..20).collect(),
            4,
            || 0_i64,
            |state, id| {
                *state += id;
                Ok(())
            },
        )
        .unwrap();
        let total: i64 = states.iter().sum();
        assert_eq!(total, (0..20).sum());
    }
}
