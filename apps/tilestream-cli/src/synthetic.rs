use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tilestream_common::{Bounds, TileId};
use tilestream_tileset::{RequestError, RequestHandle, TileDataSource};
use tokio::runtime::Handle;

/// Stand-in for decoded tile data.
#[derive(Debug)]
pub struct SyntheticTile {
    pub id: TileId,
    pub checksum: u64,
}

/// Data source that "loads" tiles on a tokio runtime after a fixed latency.
pub struct SyntheticSource {
    runtime: Handle,
    bounds: Bounds,
    max_level: u8,
    latency: Duration,
    /// Fail every n-th request, if set.
    fail_every: Option<u64>,
    issued: AtomicU64,
}

impl SyntheticSource {
    pub fn new(runtime: Handle, max_level: u8, latency: Duration, fail_every: Option<u64>) -> Self {
        Self {
            runtime,
            bounds: Bounds::world_geographic(),
            max_level,
            latency,
            fail_every: fail_every.filter(|n| *n > 0),
            issued: AtomicU64::new(0),
        }
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl TileDataSource for SyntheticSource {
    type Data = SyntheticTile;

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn min_level(&self) -> u8 {
        0
    }

    fn max_level(&self) -> u8 {
        self.max_level
    }

    fn num_root_tiles_x(&self) -> u32 {
        2
    }

    fn num_root_tiles_y(&self) -> u32 {
        1
    }

    fn request_data(&self, id: TileId) -> RequestHandle<SyntheticTile> {
        let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        let fails = self.fail_every.is_some_and(|every| n % every == 0);
        let latency = self.latency;
        let (handle, resolver) = RequestHandle::pending();

        self.runtime.spawn(async move {
            tokio::time::sleep(latency).await;
            if fails {
                tracing::debug!(%id, "synthetic request failed");
                resolver.fail(RequestError::Failed(format!("synthetic failure for {id}")));
            } else {
                let checksum = id.as_u64().wrapping_mul(0x9E37_79B9_7F4A_7C15);
                resolver.resolve(SyntheticTile { id, checksum });
            }
        });
        handle
    }
}
