//! Static adjacency resolved once per level by casting rays between cells.

use std::collections::HashMap;

use rand::{seq::SliceRandom, RngCore};
use thiserror::Error;

use crate::{config::NeighborConfig, tile::Position, tile::TileId};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("tile {tile} lists neighbor {neighbor} but only {count} tiles exist")]
    UnknownNeighbor {
        tile: TileId,
        neighbor: TileId,
        count: usize,
    },
    #[error("tile {0} lists itself as a neighbor")]
    SelfLoop(TileId),
    #[error("adjacency covers {lists} tiles but the arena holds {tiles}")]
    TileCountMismatch { lists: usize, tiles: usize },
}

/// A cell as seen by the ray caster.
#[derive(Debug, Clone, Copy)]
pub struct Collider {
    pub position: Position,
    /// Non-terrain colliders stop a ray without producing an edge.
    pub terrain: bool,
}

/// Uniform bucket grid over collider centers.
struct SpatialIndex {
    bucket: f32,
    buckets: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialIndex {
    fn new(colliders: &[Collider], bucket: f32) -> Self {
        let mut buckets: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        for (index, collider) in colliders.iter().enumerate() {
            let key = Self::key(collider.position, bucket);
            buckets.entry(key).or_default().push(index);
        }
        Self { bucket, buckets }
    }

    fn key(position: Position, bucket: f32) -> (i32, i32) {
        (
            (position.x / bucket).floor() as i32,
            (position.y / bucket).floor() as i32,
        )
    }

    /// Indices of colliders whose center lies within `reach` of `center`,
    /// in ascending index order.
    fn near(&self, center: Position, reach: f32) -> Vec<usize> {
        let span = (reach / self.bucket).ceil() as i32;
        let (cx, cy) = Self::key(center, self.bucket);
        let mut found = Vec::new();
        for dx in -span..=span {
            for dy in -span..=span {
                if let Some(indices) = self.buckets.get(&(cx + dx, cy + dy)) {
                    found.extend_from_slice(indices);
                }
            }
        }
        found.sort_unstable();
        found
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborGraph {
    adjacency: Vec<Vec<TileId>>,
}

impl NeighborGraph {
    /// Casts one ray per configured direction from every terrain collider and
    /// records the first collider hit within range. Colliders are indexed by
    /// tile id, so every collider must already exist when this runs.
    pub fn resolve(colliders: &[Collider], config: &NeighborConfig) -> Self {
        let reach = config.radius + config.collider_radius;
        let index = SpatialIndex::new(colliders, reach.max(f32::EPSILON));
        let directions: Vec<Position> = config
            .directions_deg
            .iter()
            .map(|deg| {
                let rad = deg.to_radians();
                Position::new(rad.cos(), rad.sin())
            })
            .collect();

        let adjacency = colliders
            .iter()
            .enumerate()
            .map(|(origin, collider)| {
                if !collider.terrain {
                    return Vec::new();
                }
                let nearby = index.near(collider.position, reach);
                let mut edges = Vec::with_capacity(directions.len());
                for direction in &directions {
                    let hit = first_hit(
                        colliders,
                        &nearby,
                        origin,
                        *direction,
                        config.radius,
                        config.collider_radius,
                    );
                    if let Some(target) = hit {
                        let target_id = TileId::from_index(target);
                        if colliders[target].terrain && !edges.contains(&target_id) {
                            edges.push(target_id);
                        }
                    }
                }
                edges
            })
            .collect();

        Self { adjacency }
    }

    /// Builds a graph from hand-written adjacency lists, checking that every
    /// referenced id exists.
    pub fn from_adjacency(
        adjacency: Vec<Vec<TileId>>,
        tile_count: usize,
    ) -> Result<Self, GraphError> {
        if adjacency.len() != tile_count {
            return Err(GraphError::TileCountMismatch {
                lists: adjacency.len(),
                tiles: tile_count,
            });
        }
        for (index, edges) in adjacency.iter().enumerate() {
            let tile = TileId::from_index(index);
            for neighbor in edges {
                if neighbor.index() >= tile_count {
                    return Err(GraphError::UnknownNeighbor {
                        tile,
                        neighbor: *neighbor,
                        count: tile_count,
                    });
                }
                if *neighbor == tile {
                    return Err(GraphError::SelfLoop(tile));
                }
            }
        }
        Ok(Self { adjacency })
    }

    pub fn neighbors(&self, id: TileId) -> &[TileId] {
        self.adjacency
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }
}

/// Shuffles `candidates` with `rng` and returns the first one accepted by
/// `accept`. The scan order is re-randomized on every call.
pub fn pick<F>(candidates: &[TileId], rng: &mut dyn RngCore, mut accept: F) -> Option<TileId>
where
    F: FnMut(TileId) -> bool,
{
    let mut order = candidates.to_vec();
    order.shuffle(rng);
    order.into_iter().find(|id| accept(*id))
}

fn first_hit(
    colliders: &[Collider],
    nearby: &[usize],
    origin: usize,
    direction: Position,
    max_distance: f32,
    collider_radius: f32,
) -> Option<usize> {
    let from = colliders[origin].position;
    let radius_sq = collider_radius * collider_radius;
    let mut best: Option<(f32, usize)> = None;

    for &candidate in nearby {
        if candidate == origin {
            continue;
        }
        let to_center = from.offset(colliders[candidate].position);
        let along = to_center.x * direction.x + to_center.y * direction.y;
        if along < 0.0 {
            continue;
        }
        let perp_sq = to_center.length_squared() - along * along;
        if perp_sq > radius_sq {
            continue;
        }
        let distance = (along - (radius_sq - perp_sq).sqrt()).max(0.0);
        if distance > max_distance {
            continue;
        }
        match best {
            Some((closest, _)) if closest <= distance => {}
            _ => best = Some((distance, candidate)),
        }
    }

    best.map(|(_, index)| index)
}
