//! Scoped-thread fan-out for CPU-bound scoring over occupations and validation pairs.

use std::num::NonZeroUsize;
use std::thread;

use crate::cancel::CancellationToken;
use crate::errors::EngineError;

/// Items per chunk; cancellation is checked before every chunk.
const CHUNK_SIZE: usize = 64;

fn worker_count(items: usize) -> usize {
    let available = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    available.min(items.div_ceil(CHUNK_SIZE)).max(1)
}

/// Applies `f` to every item across worker threads, preserving input order.
/// The first error (or a cancellation) aborts the whole map.
pub fn try_map<T, R, F>(
    items: &[T],
    cancel: &CancellationToken,
    f: F,
) -> Result<Vec<R>, EngineError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, EngineError> + Sync,
{
    cancel.check()?;
    let workers = worker_count(items.len());

    let run_chunk = |chunk: &[T]| -> Result<Vec<R>, EngineError> {
        cancel.check()?;
        chunk.iter().map(&f).collect()
    };

    if workers == 1 {
        let mut out = Vec::with_capacity(items.len());
        for chunk in items.chunks(CHUNK_SIZE) {
            out.extend(run_chunk(chunk)?);
        }
        return Ok(out);
    }

    let per_worker = items.len().div_ceil(workers);
    let results: Vec<Result<Vec<R>, EngineError>> = thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(per_worker)
            .map(|slice| {
                let run_chunk = &run_chunk;
                scope.spawn(move || {
                    let mut out = Vec::with_capacity(slice.len());
                    for chunk in slice.chunks(CHUNK_SIZE) {
                        out.extend(run_chunk(chunk)?);
                    }
                    Ok(out)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    });

    let mut out = Vec::with_capacity(items.len());
    for result in results {
        out.extend(result?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_map_preserves_order() {
        let items: Vec<usize> = (0..1000).collect();
        let doubled = try_map(&items, &CancellationToken::new(), |x| Ok(x * 2)).unwrap();
        assert_eq!(doubled.len(), 1000);
        assert!(doubled.iter().enumerate().all(|(i, v)| *v == i * 2));
    }

    #[test]
    fn test_try_map_propagates_errors() {
        let items: Vec<usize> = (0..500).collect();
        let result = try_map(&items, &CancellationToken::new(), |x| {
            if *x == 321 {
                Err(EngineError::NonFinite("item 321".into()))
            } else {
                Ok(*x)
            }
        });
        assert_eq!(result, Err(EngineError::NonFinite("item 321".into())));
    }

    #[test]
    fn test_try_map_honors_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let items = vec![1, 2, 3];
        let result = try_map(&items, &token, |x| Ok(*x));
        assert_eq!(result, Err(EngineError::Cancelled));
    }

    #[test]
    fn test_try_map_empty_input() {
        let items: Vec<u8> = Vec::new();
        let out = try_map(&items, &CancellationToken::new(), |x| Ok(*x)).unwrap();
        assert!(out.is_empty());
    }
}
