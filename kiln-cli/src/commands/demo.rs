//! The `kiln demo` command.

use crate::output;
use kiln_term::{builtins, evaluate, make_apply, ArgMarker, Args, Value};

/// Build `(a + b) * (a + b)` with a shared `a + b` node and evaluate it for a
/// few argument pairs.
pub fn run(verbose: bool) -> Result<(), String> {
    let mut args = ArgMarker::new();
    let (a, b) = match (args.next(), args.next()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err("argument markers exhausted".to_string()),
    };

    let x = make_apply(builtins::add(), a, b);
    let term = make_apply(builtins::mul(), x.clone(), x);

    output::heading("term");
    println!("  {}", term);

    output::heading("values");
    for (a, b) in [(2, 3), (7, 3)] {
        let values = Args::from([Value::Int(a), Value::Int(b)]);
        let result = evaluate(&term, &values).map_err(|e| output::report(&e))?;
        println!("  a = {}, b = {}  =>  {}", a, b, result);
    }

    if verbose {
        let stats = kiln_term::global_cache().stats();
        output::heading("apply cache");
        println!(
            "  {} entries, {} hits, {} misses, {} evictions",
            stats.entries, stats.hits, stats.misses, stats.evictions
        );
    }

    output::success("done");
    Ok(())
}
