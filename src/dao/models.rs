//! Persisted document shapes stored in the shared tree.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Top-level key holding the map of matches.
pub const MATCHES_PATH: &str = "matches";
/// Top-level key holding the last reset date marker.
pub const RESET_MARKER_PATH: &str = "lastResetDate";

/// Whole document written at the root of the tree by a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    /// Matches keyed by their store key.
    pub matches: IndexMap<String, MatchEntity>,
    /// Local date (`YYYY-MM-DD`) of the reset that wrote this document.
    pub last_reset_date: String,
}

/// Stored form of one match, keyed by its identifier in [`BoardDocument::matches`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntity {
    /// Display label of the slot.
    #[serde(default)]
    pub time: String,
    #[serde(default, deserialize_with = "deserialize_roster")]
    pub team1: Vec<PlayerEntity>,
    #[serde(default, deserialize_with = "deserialize_roster")]
    pub team2: Vec<PlayerEntity>,
}

impl MatchEntity {
    /// A match slot with both rosters empty.
    pub fn empty(time: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            team1: Vec::new(),
            team2: Vec::new(),
        }
    }
}

/// Stored form of a roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

/// Rosters come back either as arrays or, once the database has turned a sparse array into an
/// object, keyed by index. `null` holes are dropped.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRoster {
    List(Vec<Option<PlayerEntity>>),
    Keyed(IndexMap<String, Option<PlayerEntity>>),
}

fn deserialize_roster<'de, D>(deserializer: D) -> Result<Vec<PlayerEntity>, D::Error>
where
    D: Deserializer<'de>,
{
    let roster = Option::<StoredRoster>::deserialize(deserializer)?;
    Ok(match roster {
        Some(StoredRoster::List(players)) => players.into_iter().flatten().collect(),
        Some(StoredRoster::Keyed(players)) => {
            let mut players: Vec<(String, PlayerEntity)> = players
                .into_iter()
                .filter_map(|(key, player)| player.map(|player| (key, player)))
                .collect();
            players.sort_by_key(|(key, _)| key.parse::<usize>().unwrap_or(usize::MAX));
            players.into_iter().map(|(_, player)| player).collect()
        }
        None => Vec::new(),
    })
}
