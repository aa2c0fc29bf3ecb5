use std::path::PathBuf;

/// Errors that stop a tile set from being constructed or configured.
#[derive(Debug, thiserror::Error)]
pub enum TileSetError {
    #[error("max_tile_data must be below {}", u64::MAX)]
    MaxTileDataOverflow,
    #[error("root tile grid {x}x{y} is outside the supported 1..={max} per axis")]
    InvalidRootGrid { x: u32, y: u32, max: u32 },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
