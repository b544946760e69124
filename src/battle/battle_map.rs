//! Battle map: fixed-size grid of tiles with line of sight
//!
//! Tiles are stored row-major (`index = r * width + q`). Dimensions never
//! change after creation; only tile contents do (destruction).

use serde::{Deserialize, Serialize};

use crate::battle::grid::{GridCoord, GridKind};
use crate::battle::terrain::Terrain;

/// Hit points of a tile that can be reduced to rubble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destructible {
    pub hp: i32,
    pub max_hp: i32,
}

impl Destructible {
    pub fn new(hp: i32) -> Self {
        Self { hp, max_hp: hp }
    }
}

/// A single tile on the battle map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub elevation: i32,
    pub cover: i32,
    /// Multiplier on the cost of entering this tile (>= 0)
    pub movement_cost: f32,
    pub passable: bool,
    pub vision_boost: bool,
    /// Units standing here can refill ammo
    #[serde(default)]
    pub supply: bool,
    #[serde(default)]
    pub destructible: Option<Destructible>,
}

impl Tile {
    /// Tile with the default profile of a terrain category
    pub fn from_terrain(terrain: Terrain) -> Self {
        let profile = terrain.profile();
        Self {
            terrain,
            elevation: profile.elevation,
            cover: profile.cover,
            movement_cost: profile.movement_cost,
            passable: profile.passable,
            vision_boost: profile.vision_boost,
            supply: false,
            destructible: None,
        }
    }

    /// Destructible structure with the given hit points
    pub fn structure(hp: i32) -> Self {
        Self {
            destructible: Some(Destructible::new(hp)),
            ..Self::from_terrain(Terrain::Structure)
        }
    }

    pub fn is_destructible(&self) -> bool {
        self.destructible.is_some()
    }

    /// Reduce to the destroyed default. Irreversible within a battle.
    pub fn destroy(&mut self) {
        let rubble = Tile::from_terrain(Terrain::DESTROYED);
        self.terrain = rubble.terrain;
        self.cover = 0;
        self.passable = true;
        self.movement_cost = rubble.movement_cost;
        self.vision_boost = false;
        self.destructible = None;
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::from_terrain(Terrain::Plain)
    }
}

/// The full battle map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleMap {
    pub id: String,
    pub grid: GridKind,
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl BattleMap {
    /// Create a new battle map filled with plain terrain
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_grid("battle", GridKind::Hex, width, height)
    }

    pub fn with_grid(id: impl Into<String>, grid: GridKind, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            grid,
            width,
            height,
            tiles: vec![Tile::default(); (width * height) as usize],
        }
    }

    /// Build from an explicit row-major tile list. Returns `None` when the
    /// tile count does not match the dimensions.
    pub fn from_tiles(
        id: impl Into<String>,
        grid: GridKind,
        width: u32,
        height: u32,
        tiles: Vec<Tile>,
    ) -> Option<Self> {
        if tiles.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            id: id.into(),
            grid,
            width,
            height,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Check if coordinate is within map bounds
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.q >= 0
            && coord.r >= 0
            && coord.q < self.width as i32
            && coord.r < self.height as i32
    }

    /// Row-major tile index
    pub fn index_of(&self, coord: GridCoord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| coord.r as usize * self.width as usize + coord.q as usize)
    }

    pub fn coord_of(&self, index: usize) -> GridCoord {
        let w = self.width as usize;
        GridCoord::new((index % w) as i32, (index / w) as i32)
    }

    /// Get a tile at the given coordinate
    pub fn tile(&self, coord: GridCoord) -> Option<&Tile> {
        self.index_of(coord).map(|i| &self.tiles[i])
    }

    /// Get a mutable tile at the given coordinate
    pub fn tile_mut(&mut self, coord: GridCoord) -> Option<&mut Tile> {
        self.index_of(coord).map(move |i| &mut self.tiles[i])
    }

    /// Replace the tile at a coordinate
    pub fn set_tile(&mut self, coord: GridCoord, tile: Tile) {
        if let Some(t) = self.tile_mut(coord) {
            *t = tile;
        }
    }

    /// Set terrain at a coordinate, resetting the tile to that terrain's profile
    pub fn set_terrain(&mut self, coord: GridCoord, terrain: Terrain) {
        self.set_tile(coord, Tile::from_terrain(terrain));
    }

    /// Set elevation at a coordinate
    pub fn set_elevation(&mut self, coord: GridCoord, elevation: i32) {
        if let Some(tile) = self.tile_mut(coord) {
            tile.elevation = elevation;
        }
    }

    /// Set cover at a coordinate
    pub fn set_cover(&mut self, coord: GridCoord, cover: i32) {
        if let Some(tile) = self.tile_mut(coord) {
            tile.cover = cover;
        }
    }

    pub fn distance(&self, a: GridCoord, b: GridCoord) -> u32 {
        self.grid.distance(a, b)
    }

    /// In-bounds neighbors only
    pub fn neighbors(&self, coord: GridCoord) -> Vec<GridCoord> {
        self.grid
            .adjacent(coord)
            .into_iter()
            .filter(|c| self.in_bounds(*c))
            .collect()
    }

    pub fn line(&self, from: GridCoord, to: GridCoord) -> Vec<GridCoord> {
        self.grid.line(from, to)
    }

    /// In-bounds coordinates within range of center (center included)
    pub fn within_range(&self, center: GridCoord, range: u32) -> Vec<GridCoord> {
        self.grid
            .within_range(center, range)
            .into_iter()
            .filter(|c| self.in_bounds(*c))
            .collect()
    }

    /// Get elevation difference (positive = from is higher)
    pub fn elevation_difference(&self, from: GridCoord, to: GridCoord) -> i32 {
        let from_elev = self.tile(from).map(|t| t.elevation).unwrap_or(0);
        let to_elev = self.tile(to).map(|t| t.elevation).unwrap_or(0);
        from_elev - to_elev
    }

    /// Check line of sight between two tiles.
    ///
    /// Intermediate tiles block when their cover reaches `blocking_cover` or
    /// they stand higher than both endpoints.
    pub fn has_line_of_sight(&self, from: GridCoord, to: GridCoord, blocking_cover: i32) -> bool {
        let line = self.line(from, to);
        let from_elev = self.tile(from).map(|t| t.elevation).unwrap_or(0);
        let to_elev = self.tile(to).map(|t| t.elevation).unwrap_or(0);
        let ceiling = from_elev.max(to_elev);

        // Check all tiles except start and end
        for coord in line.iter().skip(1).take(line.len().saturating_sub(2)) {
            if let Some(tile) = self.tile(*coord) {
                if tile.cover >= blocking_cover || tile.elevation > ceiling {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::constants::LOS_BLOCKING_COVER;

    #[test]
    fn test_battle_map_creation() {
        let map = BattleMap::new(10, 8);
        assert_eq!(map.width(), 10);
        assert_eq!(map.height(), 8);
        assert_eq!(map.tiles().len(), 80);
    }

    #[test]
    fn test_row_major_index() {
        let map = BattleMap::new(10, 8);
        assert_eq!(map.index_of(GridCoord::new(3, 2)), Some(23));
        assert_eq!(map.coord_of(23), GridCoord::new(3, 2));
    }

    #[test]
    fn test_battle_map_out_of_bounds() {
        let map = BattleMap::new(10, 10);
        assert!(map.tile(GridCoord::new(100, 100)).is_none());
        assert!(map.tile(GridCoord::new(-1, 0)).is_none());
        assert!(!map.in_bounds(GridCoord::new(10, 0)));
        assert!(map.in_bounds(GridCoord::new(9, 9)));
    }

    #[test]
    fn test_from_tiles_rejects_bad_count() {
        let tiles = vec![Tile::default(); 5];
        assert!(BattleMap::from_tiles("m", GridKind::Hex, 2, 2, tiles).is_none());
    }

    #[test]
    fn test_neighbors_filtered_at_corner() {
        let map = BattleMap::new(5, 5);
        let corner = map.neighbors(GridCoord::new(0, 0));
        assert_eq!(corner.len(), 2);
        let square = BattleMap::with_grid("s", GridKind::Square, 5, 5);
        assert_eq!(square.neighbors(GridCoord::new(0, 0)).len(), 3);
    }

    #[test]
    fn test_line_of_sight_open() {
        let map = BattleMap::new(10, 10);
        assert!(map.has_line_of_sight(
            GridCoord::new(0, 0),
            GridCoord::new(5, 0),
            LOS_BLOCKING_COVER
        ));
    }

    #[test]
    fn test_line_of_sight_blocked_by_structure() {
        let mut map = BattleMap::new(10, 10);
        map.set_tile(GridCoord::new(2, 0), Tile::structure(10));
        assert!(!map.has_line_of_sight(
            GridCoord::new(0, 0),
            GridCoord::new(5, 0),
            LOS_BLOCKING_COVER
        ));
    }

    #[test]
    fn test_line_of_sight_blocked_by_ridge() {
        let mut map = BattleMap::new(10, 10);
        map.set_elevation(GridCoord::new(2, 0), 2);
        assert!(!map.has_line_of_sight(
            GridCoord::new(0, 0),
            GridCoord::new(5, 0),
            LOS_BLOCKING_COVER
        ));

        // Viewer on equal height sees over it
        map.set_elevation(GridCoord::new(0, 0), 2);
        assert!(map.has_line_of_sight(
            GridCoord::new(0, 0),
            GridCoord::new(5, 0),
            LOS_BLOCKING_COVER
        ));
    }

    #[test]
    fn test_elevation_difference() {
        let mut map = BattleMap::new(10, 10);
        map.set_elevation(GridCoord::new(0, 0), 3);
        map.set_elevation(GridCoord::new(5, 5), 1);
        assert_eq!(
            map.elevation_difference(GridCoord::new(0, 0), GridCoord::new(5, 5)),
            2
        );
    }

    #[test]
    fn test_destroy_resets_tile() {
        let mut tile = Tile::structure(10);
        tile.destroy();
        assert_eq!(tile.terrain, Terrain::DESTROYED);
        assert_eq!(tile.cover, 0);
        assert!(tile.passable);
        assert!(!tile.is_destructible());
    }
}
