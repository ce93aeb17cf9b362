//! Integration tests for the specialization cache.

use kiln_term::{
    builtins, global_cache, make_apply, ApplyCache, BinaryFn, CacheConfig, Term, TermRef, Value,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_independent_calls_share_node() {
    let first = make_apply(builtins::add(), Term::arg(0), Term::arg(1));
    let second = make_apply(builtins::add(), Term::arg(0), Term::arg(1));
    assert!(Arc::ptr_eq(&first, &second));
    assert!(global_cache().check_integrity().is_ok());
}

#[test]
fn test_argument_order_matters() {
    let cache = ApplyCache::default();
    let ab = cache.make_apply(builtins::sub(), Term::arg(0), Term::arg(1));
    let ba = cache.make_apply(builtins::sub(), Term::arg(1), Term::arg(0));
    assert!(!Arc::ptr_eq(&ab, &ba));
    assert_ne!(ab, ba);
}

#[test]
fn test_concurrent_misses_converge() {
    let cache = ApplyCache::new(CacheConfig::new().unbounded());
    let threads = 8;
    let keys = 64;

    let shared = &cache;
    let results: Vec<Vec<TermRef>> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(move || {
                    (0..keys)
                        .map(|k| shared.make_apply(builtins::add(), Term::arg(k), Term::arg(k + 1)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for k in 0..keys {
        let winner = &results[0][k];
        for other in &results[1..] {
            assert!(Arc::ptr_eq(winner, &other[k]));
        }
        let later = cache.make_apply(builtins::add(), Term::arg(k), Term::arg(k + 1));
        assert!(Arc::ptr_eq(winner, &later));
    }

    let stats = cache.stats();
    assert_eq!(stats.entries, keys);
    assert_eq!(stats.misses, keys as u64);
    assert_eq!(stats.hits + stats.misses, (threads * keys + keys) as u64);
    assert_eq!(cache.check_integrity(), Ok(()));
}

#[test]
fn test_concurrent_nested_construction() {
    let cache = ApplyCache::new(CacheConfig::new().unbounded());

    let shared = &cache;
    let roots: Vec<TermRef> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(move || {
                    let x = shared.make_apply(builtins::add(), Term::arg(0), Term::arg(1));
                    shared.make_apply(builtins::mul(), x.clone(), x)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(roots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_bounded_cache_evicts_least_recent() {
    let cache = ApplyCache::new(CacheConfig::new().capacity(3));
    let nodes: Vec<TermRef> = (0..3)
        .map(|k| cache.make_apply(builtins::mul(), Term::arg(k), Term::arg(k)))
        .collect();

    // Touch 0 and 2, leaving 1 as the eviction candidate.
    cache.make_apply(builtins::mul(), Term::arg(0), Term::arg(0));
    cache.make_apply(builtins::mul(), Term::arg(2), Term::arg(2));
    cache.make_apply(builtins::mul(), Term::arg(9), Term::arg(9));

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.stats().evictions, 1);

    let zero = cache.make_apply(builtins::mul(), Term::arg(0), Term::arg(0));
    assert!(Arc::ptr_eq(&zero, &nodes[0]));

    // Evicted nodes stay usable; re-creating the key yields an equal node.
    let one = cache.make_apply(builtins::mul(), Term::arg(1), Term::arg(1));
    assert!(!Arc::ptr_eq(&one, &nodes[1]));
    assert_eq!(one, nodes[1]);
}

#[test]
fn test_function_identity_not_name() {
    let cache = ApplyCache::default();
    let twice = BinaryFn::new("twice", |l, _| match l {
        Value::Int(n) => Ok(Value::Int(n * 2)),
        _ => Err("twice expects an int".to_string()),
    });
    let same_name = BinaryFn::new("twice", |l, _| Ok(l.clone()));

    let a = cache.make_apply(twice.clone(), Term::arg(0), Term::arg(0));
    let b = cache.make_apply(twice, Term::arg(0), Term::arg(0));
    let c = cache.make_apply(same_name, Term::arg(0), Term::arg(0));
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}
