// THEORY:
// The `coordinator` owns the fan-out/fan-in protocol for one image's tile
// set. It is the only place where concurrency exists in the system.
//
// Key architectural principles:
// 1.  **One unit per tile, bounded pool**: every tile gets its own spawned
//     task, but a semaphore caps how many run at once so a large grid cannot
//     oversubscribe the machine. The actual analysis is CPU- and file-bound,
//     so it runs under `spawn_blocking` and keeps the async workers free.
// 2.  **Unordered completion channel**: workers publish `(slot, result)`
//     pairs on a shared mpsc channel as they finish, in whatever order that
//     happens to be. The drain loop is a blocking `recv().await` - a real
//     wait/wake suspension, never a spinning emptiness poll.
// 3.  **No deadlock on failure**: the drain loop terminates when it has seen
//     exactly one arrival per tile, or when the channel closes early because
//     a worker vanished without reporting (a panic drops its sender). Failed
//     arrivals are counted, the remaining workers are still drained, and the
//     first failure is surfaced afterwards. The caller never receives a
//     partial mapping.
// 4.  **Bijective hand-off**: on success the returned map holds every slot
//     exactly once; a duplicate slot is a hard error rather than a silent
//     overwrite, since slot indices are the sole reassembly identity.

use crate::core_modules::tile::tile::{AnnotatedTile, Tile};
use crate::error::PipelineError;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// Dispatches one worker per tile and blocks until every tile is accounted
/// for. Returns the completed slot-to-tile mapping, or the first failure once
/// all outstanding workers have resolved.
pub async fn run_tiles<F>(
    tiles: Vec<Tile>,
    max_parallel: usize,
    worker: F,
) -> Result<HashMap<usize, AnnotatedTile>, PipelineError>
where
    F: Fn(Tile) -> Result<AnnotatedTile, PipelineError> + Send + Sync + 'static,
{
    let expected = tiles.len();
    let worker = Arc::new(worker);
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let (tx, mut rx) = mpsc::channel::<(usize, Result<AnnotatedTile, PipelineError>)>(expected.max(1));

    for tile in tiles {
        let worker = Arc::clone(&worker);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                // Semaphore closed: coordinator is gone, nothing to report to.
                return;
            };
            let slot = tile.slot;
            let outcome = tokio::task::spawn_blocking(move || (*worker)(tile)).await;
            let result = match outcome {
                Ok(result) => result,
                Err(join_error) => Err(PipelineError::TileAnalysisFailure(format!(
                    "tile {slot} worker crashed: {join_error}"
                ))),
            };
            let _ = tx.send((slot, result)).await;
        });
    }
    // The coordinator's own sender must go away, or a lost worker would leave
    // the channel open and the drain loop waiting forever.
    drop(tx);

    let mut completed: HashMap<usize, AnnotatedTile> = HashMap::with_capacity(expected);
    let mut first_failure: Option<PipelineError> = None;
    let mut arrivals = 0usize;
    while arrivals < expected {
        match rx.recv().await {
            Some((slot, Ok(annotated))) => {
                arrivals += 1;
                if completed.insert(slot, annotated).is_some() {
                    return Err(PipelineError::ReassemblyMismatch(format!(
                        "slot {slot} reported twice"
                    )));
                }
            }
            Some((slot, Err(err))) => {
                arrivals += 1;
                warn!("tile {slot} failed: {err}");
                first_failure.get_or_insert(err);
            }
            None => {
                first_failure.get_or_insert(PipelineError::TileAnalysisFailure(format!(
                    "{} of {expected} tile workers exited without reporting",
                    expected - arrivals
                )));
                break;
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(completed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::tile::tile::partition;
    use image::RgbImage;

    fn identity(tile: Tile) -> Result<AnnotatedTile, PipelineError> {
        Ok(AnnotatedTile {
            slot: tile.slot,
            region: tile.region,
            image: tile.pixels,
            object_count: 0,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn collects_every_slot_exactly_once() {
        let tiles = partition(&RgbImage::new(32, 32), 4).expect("partition");
        let completed = run_tiles(tiles, 4, identity).await.expect("run_tiles");
        assert_eq!(completed.len(), 16);
        for slot in 0..16 {
            assert!(completed.contains_key(&slot), "slot {slot} missing");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_worker_bound_still_completes() {
        let tiles = partition(&RgbImage::new(32, 32), 4).expect("partition");
        let completed = run_tiles(tiles, 1, identity).await.expect("run_tiles");
        assert_eq!(completed.len(), 16);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_worker_terminates_instead_of_hanging() {
        let tiles = partition(&RgbImage::new(32, 32), 4).expect("partition");
        let result = run_tiles(tiles, 4, |tile| {
            if tile.slot == 5 {
                Err(PipelineError::TileAnalysisFailure("injected".to_string()))
            } else {
                identity(tile)
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(PipelineError::TileAnalysisFailure(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_worker_surfaces_as_failure() {
        let tiles = partition(&RgbImage::new(32, 32), 4).expect("partition");
        let result = run_tiles(tiles, 4, |tile| {
            if tile.slot == 0 {
                panic!("worker blew up");
            }
            identity(tile)
        })
        .await;
        assert!(matches!(
            result,
            Err(PipelineError::TileAnalysisFailure(_))
        ));
    }
}
