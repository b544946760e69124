//! Battle timeline: append-only record of every state change
//!
//! Consumers match on `TimelineEvent` exhaustively, so adding a variant is a
//! compile error everywhere the timeline is read.

use serde::{Deserialize, Serialize};

use crate::battle::grid::GridCoord;
use crate::battle::units::{FactionId, Stance, UnitId};

/// One state change, with just enough payload to replay it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEvent {
    UnitMoved {
        unit_id: UnitId,
        from: GridCoord,
        to: GridCoord,
        path: Vec<GridCoord>,
        cost: f32,
    },
    UnitAttacked {
        attacker: UnitId,
        defender: UnitId,
        weapon: String,
        hit_chance: f32,
        roll: f32,
        hit: bool,
        damage: i32,
        remaining_health: i32,
    },
    UnitStanceChanged {
        unit_id: UnitId,
        from: Stance,
        to: Stance,
    },
    UnitDestroyed {
        unit_id: UnitId,
        at: GridCoord,
    },
    UnitLeveled {
        unit_id: UnitId,
        level: u32,
    },
    UnitSpotted {
        unit_id: UnitId,
        by: FactionId,
    },
    OverwatchSet {
        unit_id: UnitId,
        weapon: String,
    },
    OverwatchTriggered {
        unit_id: UnitId,
        target: UnitId,
    },
    UnitResupplied {
        unit_id: UnitId,
    },
    TileAttacked {
        attacker: UnitId,
        at: GridCoord,
        weapon: String,
        hit_chance: f32,
        roll: f32,
        hit: bool,
        damage: i32,
        remaining_hp: i32,
    },
    TileDestroyed {
        at: GridCoord,
    },
    TurnEnded {
        faction: FactionId,
        turn: u32,
    },
    TurnStarted {
        faction: FactionId,
        turn: u32,
    },
    BattleEnded {
        winner: Option<FactionId>,
    },
}

impl TimelineEvent {
    /// Stable kind tag, `"unit:moved"` style
    pub fn kind(&self) -> &'static str {
        match self {
            TimelineEvent::UnitMoved { .. } => "unit:moved",
            TimelineEvent::UnitAttacked { .. } => "unit:attacked",
            TimelineEvent::UnitStanceChanged { .. } => "unit:stance",
            TimelineEvent::UnitDestroyed { .. } => "unit:destroyed",
            TimelineEvent::UnitLeveled { .. } => "unit:level",
            TimelineEvent::UnitSpotted { .. } => "unit:spotted",
            TimelineEvent::OverwatchSet { .. } => "unit:overwatch",
            TimelineEvent::OverwatchTriggered { .. } => "unit:overwatch-fire",
            TimelineEvent::UnitResupplied { .. } => "unit:resupplied",
            TimelineEvent::TileAttacked { .. } => "tile:attacked",
            TimelineEvent::TileDestroyed { .. } => "tile:destroyed",
            TimelineEvent::TurnEnded { .. } => "turn:ended",
            TimelineEvent::TurnStarted { .. } => "turn:started",
            TimelineEvent::BattleEnded { .. } => "battle:ended",
        }
    }
}

/// Timeline entry: the event plus the turn it happened on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub turn: u32,
    pub event: TimelineEvent,
}

/// Append-only event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, turn: u32, event: TimelineEvent) {
        self.entries.push(TimelineEntry { turn, event });
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Entries appended at or after `cursor`; pass the previous `len()`
    pub fn since(&self, cursor: usize) -> &[TimelineEntry] {
        &self.entries[cursor.min(self.entries.len())..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Count events with the given kind tag
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events().filter(|e| e.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_cursor() {
        let mut timeline = Timeline::new();
        timeline.push(1, TimelineEvent::TileDestroyed { at: GridCoord::new(1, 1) });
        let cursor = timeline.len();
        timeline.push(
            1,
            TimelineEvent::TurnEnded {
                faction: FactionId::new("red"),
                turn: 1,
            },
        );

        assert_eq!(timeline.since(0).len(), 2);
        assert_eq!(timeline.since(cursor).len(), 1);
        assert_eq!(timeline.since(cursor)[0].event.kind(), "turn:ended");
        assert!(timeline.since(99).is_empty());
    }

    #[test]
    fn test_event_json_tag() {
        let event = TimelineEvent::UnitLeveled {
            unit_id: UnitId::new("a"),
            level: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "unit_leveled");
        assert_eq!(json["level"], 2);
    }

    #[test]
    fn test_count_kind() {
        let mut timeline = Timeline::new();
        timeline.push(1, TimelineEvent::TileDestroyed { at: GridCoord::new(0, 0) });
        timeline.push(1, TimelineEvent::TileDestroyed { at: GridCoord::new(1, 0) });
        assert_eq!(timeline.count_kind("tile:destroyed"), 2);
        assert_eq!(timeline.count_kind("unit:level"), 0);
    }
}
