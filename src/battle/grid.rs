//! Grid coordinates and the metric for each grid flavor
//!
//! Coordinates are axial (q, r). Hex maps use cube distance and six
//! neighbors; square maps use Chebyshev distance and eight neighbors.
//! Everything here is pure: no map, no state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Axial grid coordinate
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct GridCoord {
    pub q: i32,
    pub r: i32,
}

impl GridCoord {
    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Cube coordinate S (derived from q and r)
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Canonical string key, `"q,r"`
    pub fn key(&self) -> String {
        self.to_string()
    }

    fn offset(&self, dq: i32, dr: i32) -> Self {
        Self::new(self.q + dq, self.r + dr)
    }

    /// Round a fractional axial position to the nearest hex
    fn round_hex(q: f64, r: f64) -> Self {
        let s = -q - r;
        let mut rq = q.round();
        let mut rr = r.round();
        let rs = s.round();

        let q_diff = (rq - q).abs();
        let r_diff = (rr - r).abs();
        let s_diff = (rs - s).abs();

        if q_diff > r_diff && q_diff > s_diff {
            rq = -rr - rs;
        } else if r_diff > s_diff {
            rr = -rq - rs;
        }

        Self::new(rq as i32, rr as i32)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

/// Error parsing a `"q,r"` key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid grid coordinate key: {0:?}")]
pub struct ParseCoordError(pub String);

impl FromStr for GridCoord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (q, r) = s
            .split_once(',')
            .ok_or_else(|| ParseCoordError(s.to_string()))?;
        let q = q.trim().parse().map_err(|_| ParseCoordError(s.to_string()))?;
        let r = r.trim().parse().map_err(|_| ParseCoordError(s.to_string()))?;
        Ok(Self::new(q, r))
    }
}

const HEX_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

const SQUARE_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Grid flavor of a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    /// Axial hex grid, six neighbors
    #[default]
    Hex,
    /// Square grid with diagonal moves, eight neighbors
    Square,
}

impl GridKind {
    /// Native integer distance. Zero iff `a == b`.
    pub fn distance(&self, a: GridCoord, b: GridCoord) -> u32 {
        let dq = (a.q - b.q).abs();
        let dr = (a.r - b.r).abs();
        match self {
            GridKind::Hex => {
                let ds = (a.s() - b.s()).abs();
                ((dq + dr + ds) / 2) as u32
            }
            GridKind::Square => dq.max(dr) as u32,
        }
    }

    /// Adjacent coordinates, unfiltered by any map bounds
    pub fn adjacent(&self, c: GridCoord) -> Vec<GridCoord> {
        let offsets: &[(i32, i32)] = match self {
            GridKind::Hex => &HEX_OFFSETS,
            GridKind::Square => &SQUARE_OFFSETS,
        };
        offsets.iter().map(|&(dq, dr)| c.offset(dq, dr)).collect()
    }

    /// Rasterized straight line, both endpoints included
    pub fn line(&self, from: GridCoord, to: GridCoord) -> Vec<GridCoord> {
        match self {
            GridKind::Hex => hex_line(from, to),
            GridKind::Square => bresenham_line(from, to),
        }
    }

    /// Every coordinate within `range` of `center`, center included
    pub fn within_range(&self, center: GridCoord, range: u32) -> Vec<GridCoord> {
        let range = i32::try_from(range).unwrap_or(i32::MAX);
        let mut results = Vec::new();
        match self {
            GridKind::Hex => {
                for q in -range..=range {
                    for r in (-range).max(-q - range)..=range.min(-q + range) {
                        results.push(center.offset(q, r));
                    }
                }
            }
            GridKind::Square => {
                for q in -range..=range {
                    for r in -range..=range {
                        results.push(center.offset(q, r));
                    }
                }
            }
        }
        results
    }
}

fn hex_line(from: GridCoord, to: GridCoord) -> Vec<GridCoord> {
    let n = GridKind::Hex.distance(from, to) as i32;
    if n == 0 {
        return vec![from];
    }

    // Nudge off exact hex edges so ties always round the same way
    let (fq, fr) = (from.q as f64 + 1e-6, from.r as f64 + 1e-6);
    let (tq, tr) = (to.q as f64 + 1e-6, to.r as f64 + 1e-6);

    let mut results = Vec::with_capacity((n + 1) as usize);
    for i in 0..=n {
        let t = i as f64 / n as f64;
        let q = fq + (tq - fq) * t;
        let r = fr + (tr - fr) * t;
        results.push(GridCoord::round_hex(q, r));
    }
    results
}

fn bresenham_line(from: GridCoord, to: GridCoord) -> Vec<GridCoord> {
    let dq = (to.q - from.q).abs();
    let dr = -(to.r - from.r).abs();
    let sq = if from.q < to.q { 1 } else { -1 };
    let sr = if from.r < to.r { 1 } else { -1 };
    let mut err = dq + dr;

    let mut current = from;
    let mut results = vec![current];
    while current != to {
        let e2 = 2 * err;
        if e2 >= dr {
            err += dr;
            current.q += sq;
        }
        if e2 <= dq {
            err += dq;
            current.r += sr;
        }
        results.push(current);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_distance_same() {
        let a = GridCoord::new(3, 4);
        assert_eq!(GridKind::Hex.distance(a, a), 0);
    }

    #[test]
    fn test_hex_distance_adjacent() {
        let a = GridCoord::new(0, 0);
        for n in GridKind::Hex.adjacent(a) {
            assert_eq!(GridKind::Hex.distance(a, n), 1);
        }
    }

    #[test]
    fn test_square_distance_is_chebyshev() {
        let a = GridCoord::new(0, 0);
        let b = GridCoord::new(3, -5);
        assert_eq!(GridKind::Square.distance(a, b), 5);
    }

    #[test]
    fn test_neighbor_counts() {
        let c = GridCoord::new(5, 5);
        assert_eq!(GridKind::Hex.adjacent(c).len(), 6);
        assert_eq!(GridKind::Square.adjacent(c).len(), 8);
    }

    #[test]
    fn test_hex_line_includes_endpoints() {
        let a = GridCoord::new(0, 0);
        let b = GridCoord::new(3, 0);
        let line = GridKind::Hex.line(a, b);
        assert_eq!(line.len(), 4);
        assert_eq!(line.first(), Some(&a));
        assert_eq!(line.last(), Some(&b));
    }

    #[test]
    fn test_square_line_diagonal() {
        let line = GridKind::Square.line(GridCoord::new(0, 0), GridCoord::new(3, 3));
        assert_eq!(
            line,
            vec![
                GridCoord::new(0, 0),
                GridCoord::new(1, 1),
                GridCoord::new(2, 2),
                GridCoord::new(3, 3)
            ]
        );
    }

    #[test]
    fn test_within_range_sizes() {
        let center = GridCoord::new(0, 0);
        assert_eq!(GridKind::Hex.within_range(center, 1).len(), 7);
        assert_eq!(GridKind::Hex.within_range(center, 2).len(), 19);
        assert_eq!(GridKind::Square.within_range(center, 1).len(), 9);
        assert_eq!(GridKind::Hex.within_range(center, 0), vec![center]);
    }

    #[test]
    fn test_key_round_trip() {
        let c = GridCoord::new(-4, 12);
        assert_eq!(c.key(), "-4,12");
        assert_eq!("-4,12".parse::<GridCoord>(), Ok(c));
        assert!("4;12".parse::<GridCoord>().is_err());
    }

    fn coord() -> impl Strategy<Value = GridCoord> {
        (-30i32..30, -30i32..30).prop_map(|(q, r)| GridCoord::new(q, r))
    }

    fn kind() -> impl Strategy<Value = GridKind> {
        prop_oneof![Just(GridKind::Hex), Just(GridKind::Square)]
    }

    proptest! {
        #[test]
        fn distance_is_symmetric_and_zero_only_on_self(k in kind(), a in coord(), b in coord()) {
            prop_assert_eq!(k.distance(a, b), k.distance(b, a));
            prop_assert_eq!(k.distance(a, b) == 0, a == b);
        }

        #[test]
        fn line_is_contiguous_and_deterministic(k in kind(), a in coord(), b in coord()) {
            let line = k.line(a, b);
            prop_assert_eq!(line.first(), Some(&a));
            prop_assert_eq!(line.last(), Some(&b));
            prop_assert_eq!(line.len() as u32, k.distance(a, b) + 1);
            for pair in line.windows(2) {
                prop_assert_eq!(k.distance(pair[0], pair[1]), 1);
            }
            prop_assert_eq!(line, k.line(a, b));
        }

        #[test]
        fn within_range_matches_distance(k in kind(), c in coord(), range in 0u32..5) {
            let area = k.within_range(c, range);
            prop_assert!(area.contains(&c));
            for t in &area {
                prop_assert!(k.distance(c, *t) <= range);
            }
        }
    }
}
