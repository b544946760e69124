//! Cost-based pathfinding over the battle grid
//!
//! Step cost = tile movement cost x stance multiplier (flat for air units).
//! Unit-type terrain restrictions are hard exclusions. Ties in the open set
//! are broken by discovery order so equal-cost maps always yield the same
//! path.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::battle_map::{BattleMap, Tile};
use crate::battle::grid::GridCoord;
use crate::battle::state::TacticalBattleState;
use crate::battle::unit_type::UnitType;
use crate::battle::units::{FactionId, Stance, UnitInstance};
use crate::core::config::MovementConfig;

/// Slack for comparing accumulated float costs against budgets
pub const COST_EPSILON: f32 = 1e-4;

/// Why no path was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum PathFailure {
    #[error("destroyed units cannot move")]
    MoverDestroyed,
    #[error("destination is outside the map")]
    OutOfBounds,
    #[error("destination terrain is impassable for this unit")]
    Impassable,
    #[error("destination is occupied")]
    Occupied,
    #[error("no route to destination")]
    NoPath,
    #[error("route exceeds the cost cap")]
    ExceedsMaxCost,
}

/// A found path, start and goal included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub steps: Vec<GridCoord>,
    pub cost: f32,
}

pub type PathResult = Result<Path, PathFailure>;

/// Search options
#[derive(Debug, Clone, Default)]
pub struct PathOptions {
    /// Reject any path costing more than this
    pub max_cost: Option<f32>,
    /// Coordinates never entered
    pub avoid: BTreeSet<GridCoord>,
    /// Occupied coordinates treated as empty
    pub ignore_occupants: BTreeSet<GridCoord>,
}

impl PathOptions {
    pub fn with_max_cost(max_cost: f32) -> Self {
        Self {
            max_cost: Some(max_cost),
            ..Self::default()
        }
    }
}

/// What the pathfinder needs to know about the moving unit
#[derive(Debug, Clone)]
pub struct Mover {
    pub unit_type: UnitType,
    pub stance: Stance,
    /// Friendly units can be passed through; `None` treats every unit as hostile
    pub faction: Option<FactionId>,
}

impl Mover {
    pub fn of(unit: &UnitInstance) -> Self {
        Self {
            unit_type: unit.unit_type(),
            stance: unit.stance,
            faction: Some(unit.faction().clone()),
        }
    }
}

/// Cost of entering a tile, `None` if the mover may never enter it
pub fn step_cost(tile: &Tile, mover: &Mover, config: &MovementConfig) -> Option<f32> {
    if !mover.unit_type.can_enter(tile) {
        return None;
    }
    let base = if mover.unit_type.is_airborne() {
        config.air_step_cost
    } else {
        tile.movement_cost
    };
    let cost = base * config.stance_multiplier(mover.stance);
    cost.is_finite().then_some(cost)
}

enum Occupancy {
    Free,
    Friendly,
    Hostile,
}

fn occupancy(
    state: &TacticalBattleState,
    mover: &Mover,
    start: GridCoord,
    coord: GridCoord,
    options: &PathOptions,
) -> Occupancy {
    if coord == start || options.ignore_occupants.contains(&coord) {
        return Occupancy::Free;
    }
    match state.unit_at(coord) {
        None => Occupancy::Free,
        Some(u) if mover.faction.as_ref() == Some(u.faction()) => Occupancy::Friendly,
        Some(_) => Occupancy::Hostile,
    }
}

/// Find the cheapest legal path from `start` to `goal`
pub fn find_path(
    state: &TacticalBattleState,
    mover: &Mover,
    start: GridCoord,
    goal: GridCoord,
    options: &PathOptions,
    config: &MovementConfig,
) -> PathResult {
    let map = &state.map;

    if mover.stance == Stance::Destroyed {
        return Err(PathFailure::MoverDestroyed);
    }
    if !map.in_bounds(start) || !map.in_bounds(goal) {
        return Err(PathFailure::OutOfBounds);
    }
    if start == goal {
        return Ok(Path {
            steps: vec![start],
            cost: 0.0,
        });
    }

    let goal_tile = map.tile(goal).ok_or(PathFailure::OutOfBounds)?;
    if options.avoid.contains(&goal) || step_cost(goal_tile, mover, config).is_none() {
        return Err(PathFailure::Impassable);
    }
    if !matches!(occupancy(state, mover, start, goal, options), Occupancy::Free) {
        return Err(PathFailure::Occupied);
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<GridCoord, GridCoord> = AHashMap::new();
    let mut g_scores: AHashMap<GridCoord, f32> = AHashMap::new();
    let mut discovered: u64 = 0;

    g_scores.insert(start, 0.0);
    open_set.push(Reverse((OrderedFloat(0.0f32), discovered, start)));

    while let Some(Reverse((OrderedFloat(cost), _, current))) = open_set.pop() {
        if cost > *g_scores.get(&current).unwrap_or(&f32::INFINITY) {
            continue; // stale entry
        }

        if current == goal {
            if let Some(max_cost) = options.max_cost {
                if cost > max_cost + COST_EPSILON {
                    return Err(PathFailure::ExceedsMaxCost);
                }
            }
            return Ok(Path {
                steps: reconstruct_path(&came_from, current),
                cost,
            });
        }

        for neighbor in map.neighbors(current) {
            if options.avoid.contains(&neighbor) {
                continue;
            }
            if matches!(
                occupancy(state, mover, start, neighbor, options),
                Occupancy::Hostile
            ) {
                continue;
            }
            let Some(move_cost) = map.tile(neighbor).and_then(|t| step_cost(t, mover, config))
            else {
                continue;
            };

            let tentative_g = cost + move_cost;
            if tentative_g < *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY) {
                came_from.insert(neighbor, current);
                g_scores.insert(neighbor, tentative_g);
                discovered += 1;
                open_set.push(Reverse((OrderedFloat(tentative_g), discovered, neighbor)));
            }
        }
    }

    Err(PathFailure::NoPath)
}

/// Reconstruct path from came_from map
fn reconstruct_path(
    came_from: &AHashMap<GridCoord, GridCoord>,
    mut current: GridCoord,
) -> Vec<GridCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Every tile the mover can stop on within `budget`, with its cheapest cost
pub fn reachable_tiles(
    state: &TacticalBattleState,
    mover: &Mover,
    start: GridCoord,
    budget: f32,
    config: &MovementConfig,
) -> BTreeMap<GridCoord, f32> {
    let map = &state.map;
    let mut reachable = BTreeMap::new();
    if mover.stance == Stance::Destroyed || !map.in_bounds(start) {
        return reachable;
    }

    let options = PathOptions::default();
    let mut open_set = BinaryHeap::new();
    let mut g_scores: AHashMap<GridCoord, f32> = AHashMap::new();
    let mut discovered: u64 = 0;

    g_scores.insert(start, 0.0);
    open_set.push(Reverse((OrderedFloat(0.0f32), discovered, start)));

    while let Some(Reverse((OrderedFloat(cost), _, current))) = open_set.pop() {
        if cost > *g_scores.get(&current).unwrap_or(&f32::INFINITY) {
            continue;
        }
        if current != start
            && matches!(
                occupancy(state, mover, start, current, &options),
                Occupancy::Free
            )
        {
            reachable.insert(current, cost);
        }

        for neighbor in map.neighbors(current) {
            if matches!(
                occupancy(state, mover, start, neighbor, &options),
                Occupancy::Hostile
            ) {
                continue;
            }
            let Some(move_cost) = map.tile(neighbor).and_then(|t| step_cost(t, mover, config))
            else {
                continue;
            };
            let tentative_g = cost + move_cost;
            if tentative_g > budget + COST_EPSILON {
                continue;
            }
            if tentative_g < *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY) {
                g_scores.insert(neighbor, tentative_g);
                discovered += 1;
                open_set.push(Reverse((OrderedFloat(tentative_g), discovered, neighbor)));
            }
        }
    }

    reachable
}

/// Cost of walking an explicit path (start tile is free)
pub fn path_cost(
    map: &BattleMap,
    mover: &Mover,
    path: &[GridCoord],
    config: &MovementConfig,
) -> Option<f32> {
    path.iter()
        .skip(1)
        .map(|c| map.tile(*c).and_then(|t| step_cost(t, mover, config)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battle_map::Tile;
    use crate::battle::terrain::Terrain;
    use crate::battle::test_support::*;
    use crate::battle::units::UnitId;

    fn infantry(stance: Stance) -> Mover {
        Mover {
            unit_type: UnitType::Infantry,
            stance,
            faction: Some(blue()),
        }
    }

    fn config() -> MovementConfig {
        MovementConfig::default()
    }

    fn empty_state() -> TacticalBattleState {
        two_unit_state(GridCoord::new(0, 7), GridCoord::new(15, 7))
    }

    #[test]
    fn test_pathfind_straight_line() {
        let state = empty_state();
        let start = GridCoord::new(0, 0);
        let goal = GridCoord::new(5, 0);

        let path = find_path(&state, &infantry(Stance::Ready), start, goal, &PathOptions::default(), &config())
            .expect("open map has a path");
        assert_eq!(path.steps.first(), Some(&start));
        assert_eq!(path.steps.last(), Some(&goal));
        assert_eq!(path.cost, 5.0);
    }

    #[test]
    fn test_uniform_cost_scales_with_stance() {
        let state = empty_state();
        let start = GridCoord::new(1, 1);
        let goal = GridCoord::new(4, 3);
        let distance = state.map.distance(start, goal) as f32;

        for stance in [Stance::Ready, Stance::Suppressed, Stance::Routed] {
            let path = find_path(&state, &infantry(stance), start, goal, &PathOptions::default(), &config())
                .unwrap();
            let expected = distance * config().stance_multiplier(stance);
            assert!((path.cost - expected).abs() < COST_EPSILON, "{stance:?}");
        }
    }

    #[test]
    fn test_destroyed_never_paths() {
        let state = empty_state();
        let result = find_path(
            &state,
            &infantry(Stance::Destroyed),
            GridCoord::new(0, 0),
            GridCoord::new(1, 0),
            &PathOptions::default(),
            &config(),
        );
        assert_eq!(result, Err(PathFailure::MoverDestroyed));
    }

    #[test]
    fn test_max_cost_rejects_whole_path() {
        let state = empty_state();
        let result = find_path(
            &state,
            &infantry(Stance::Ready),
            GridCoord::new(0, 0),
            GridCoord::new(6, 0),
            &PathOptions::with_max_cost(4.0),
            &config(),
        );
        assert_eq!(result, Err(PathFailure::ExceedsMaxCost));
    }

    #[test]
    fn test_pathfind_around_obstacle() {
        let mut state = empty_state();
        state.map.set_terrain(GridCoord::new(2, 0), Terrain::Water);
        state.map.set_terrain(GridCoord::new(3, 0), Terrain::Water);

        let path = find_path(
            &state,
            &infantry(Stance::Ready),
            GridCoord::new(0, 0),
            GridCoord::new(5, 0),
            &PathOptions::default(),
            &config(),
        )
        .unwrap();
        assert!(!path.steps.contains(&GridCoord::new(2, 0)));
        assert!(!path.steps.contains(&GridCoord::new(3, 0)));
    }

    #[test]
    fn test_vehicle_cant_cross_forest_wall() {
        let mut state = empty_state();
        for r in 0..state.map.height() as i32 {
            state.map.set_terrain(GridCoord::new(7, r), Terrain::Forest);
        }
        let start = GridCoord::new(2, 3);
        let goal = GridCoord::new(12, 3);

        assert!(find_path(&state, &infantry(Stance::Ready), start, goal, &PathOptions::default(), &config()).is_ok());

        let vehicle = Mover {
            unit_type: UnitType::Vehicle,
            stance: Stance::Ready,
            faction: Some(blue()),
        };
        assert_eq!(
            find_path(&state, &vehicle, start, goal, &PathOptions::default(), &config()),
            Err(PathFailure::NoPath)
        );
    }

    #[test]
    fn test_air_ignores_terrain() {
        let mut state = empty_state();
        state.map.set_terrain(GridCoord::new(3, 3), Terrain::Water);
        let air = Mover {
            unit_type: UnitType::Air,
            stance: Stance::Ready,
            faction: Some(blue()),
        };
        let path = find_path(&state, &air, GridCoord::new(1, 3), GridCoord::new(3, 3), &PathOptions::default(), &config())
            .unwrap();
        assert_eq!(path.cost, 2.0);
    }

    #[test]
    fn test_enemy_blocks_friend_passes() {
        let state = two_unit_state(GridCoord::new(2, 0), GridCoord::new(4, 0));
        let mover = infantry(Stance::Ready);

        // Enemy tile cannot be the destination
        assert_eq!(
            find_path(&state, &mover, GridCoord::new(0, 0), GridCoord::new(4, 0), &PathOptions::default(), &config()),
            Err(PathFailure::Occupied)
        );

        // Friendly tile can be crossed
        let mut walled = state.clone();
        for r in 1..walled.map.height() as i32 {
            walled.map.set_tile(GridCoord::new(2, r), Tile::structure(5));
        }
        let path = find_path(&walled, &mover, GridCoord::new(0, 0), GridCoord::new(3, 0), &PathOptions::default(), &config())
            .unwrap();
        assert!(path.steps.contains(&GridCoord::new(2, 0)));

        // Unless ignored, the enemy would block the same corridor
        let mut enemy_mover = mover.clone();
        enemy_mover.faction = Some(red());
        assert_eq!(
            find_path(&walled, &enemy_mover, GridCoord::new(0, 0), GridCoord::new(3, 0), &PathOptions::default(), &config()),
            Err(PathFailure::NoPath)
        );
        let options = PathOptions {
            ignore_occupants: [GridCoord::new(2, 0)].into_iter().collect(),
            ..PathOptions::default()
        };
        assert!(find_path(&walled, &enemy_mover, GridCoord::new(0, 0), GridCoord::new(3, 0), &options, &config()).is_ok());
    }

    #[test]
    fn test_pathfind_no_path() {
        let mut state = empty_state();
        let goal = GridCoord::new(5, 4);
        for neighbor in state.map.neighbors(goal) {
            state.map.set_tile(neighbor, Tile::structure(5));
        }
        assert_eq!(
            find_path(&state, &infantry(Stance::Ready), GridCoord::new(0, 0), goal, &PathOptions::default(), &config()),
            Err(PathFailure::NoPath)
        );
    }

    #[test]
    fn test_same_start_goal() {
        let state = empty_state();
        let start = GridCoord::new(5, 5);
        let path = find_path(&state, &infantry(Stance::Ready), start, start, &PathOptions::default(), &config()).unwrap();
        assert_eq!(path.steps, vec![start]);
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn test_deterministic_tie_breaking() {
        let state = empty_state();
        let run = || {
            find_path(&state, &infantry(Stance::Ready), GridCoord::new(0, 0), GridCoord::new(6, 4), &PathOptions::default(), &config())
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_prefers_road() {
        let mut state = empty_state();
        for q in 0..10 {
            state.map.set_terrain(GridCoord::new(q, 1), Terrain::Road);
        }
        let path = find_path(&state, &infantry(Stance::Ready), GridCoord::new(0, 1), GridCoord::new(8, 1), &PathOptions::default(), &config())
            .unwrap();
        assert_eq!(path.cost, 4.0);
    }

    #[test]
    fn test_reachable_within_budget() {
        let state = empty_state();
        let unit = state.unit(&UnitId::new("blue-1")).unwrap();
        let reach = reachable_tiles(&state, &Mover::of(unit), unit.position, 2.0, &config());
        assert!(reach.values().all(|c| *c <= 2.0 + COST_EPSILON));
        assert!(!reach.contains_key(&unit.position));
        assert!(reach.contains_key(&GridCoord::new(2, 7)));
        assert!(!reach.contains_key(&GridCoord::new(3, 7)));
    }

    #[test]
    fn test_path_cost_matches_search() {
        let mut state = empty_state();
        state.map.set_terrain(GridCoord::new(1, 0), Terrain::Forest);
        let mover = infantry(Stance::Ready);
        let steps = vec![GridCoord::new(0, 0), GridCoord::new(1, 0), GridCoord::new(2, 0)];
        assert_eq!(path_cost(&state.map, &mover, &steps, &config()), Some(3.0));
    }
}
