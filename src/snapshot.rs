use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::world::{World, WorldSnapshot};

#[derive(Serialize)]
struct SnapshotFile<'a> {
    written_at: DateTime<Utc>,
    #[serde(flatten)]
    world: &'a WorldSnapshot,
}

/// Writes the tile arena to `<dir>/<scenario>/tick_NNNNNN.json` every
/// `interval` ticks. An interval of zero disables snapshots.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn is_due(&self, tick: u64) -> bool {
        self.interval != 0 && tick % self.interval == 0
    }

    pub fn maybe_write(&self, world: &World, scenario: &str) -> Result<Option<PathBuf>> {
        let tick = world.tick();
        if !self.is_due(tick) {
            return Ok(None);
        }

        let dir = self.output_dir.join(scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{tick:06}.json"));
        let snapshot = world.snapshot(scenario);
        let file = SnapshotFile {
            written_at: Utc::now(),
            world: &snapshot,
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimConfig, tile::TileState};

    fn world() -> World {
        World::builder(SimConfig::default())
            .tile(TileState::Grass)
            .tile(TileState::Corruption)
            .with_adjacency(vec![vec![], vec![]])
            .build()
            .expect("world builds")
    }

    #[test]
    fn zero_interval_never_writes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let writer = SnapshotWriter::new(temp.path(), 0);
        let mut world = world();
        for _ in 0..5 {
            world.advance_time();
            assert!(writer.maybe_write(&world, "pair").expect("write").is_none());
        }
    }

    #[test]
    fn writes_on_interval_with_tile_payload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let writer = SnapshotWriter::new(temp.path(), 2);
        let mut world = world();
        world.advance_time();
        assert!(writer.maybe_write(&world, "pair").expect("write").is_none());
        world.advance_time();
        let path = writer
            .maybe_write(&world, "pair")
            .expect("write")
            .expect("due at tick 2");
        assert!(path.ends_with("pair/tick_000002.json"));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value["tick"], 2);
        assert_eq!(value["tiles"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["tiles"][1]["state"], "corruption");
        assert!(value["written_at"].is_string());
    }
}
