use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

use crate::dao::models::{MatchEntity, PlayerEntity};

const PLAYER_ID_LEN: usize = 9;
const PLAYER_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// One of the two rosters of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeamKey {
    /// First roster, stored under `team1`.
    Team1,
    /// Second roster, stored under `team2`.
    Team2,
}

impl TeamKey {
    /// Key used for the roster inside a stored match.
    pub fn as_str(self) -> &'static str {
        match self {
            TeamKey::Team1 => "team1",
            TeamKey::Team2 => "team2",
        }
    }
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed-up player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Random token generated when the player joined.
    pub id: String,
    /// Trimmed display name.
    pub name: String,
    /// Trimmed contact phone.
    pub phone: String,
}

impl Player {
    /// Build a player with a freshly generated identifier.
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: generate_player_id(),
            name: name.into(),
            phone: phone.into(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            phone: entity.phone,
        }
    }
}

impl From<&Player> for PlayerEntity {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            phone: player.phone.clone(),
        }
    }
}

/// A scheduled time slot with its two rosters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Key of the match in the stored `matches` map.
    pub id: String,
    /// Display label, never parsed.
    pub time: String,
    /// First roster in sign-up order.
    pub team1: Vec<Player>,
    /// Second roster in sign-up order.
    pub team2: Vec<Player>,
}

impl Match {
    /// Build a match from its stored form and store key.
    pub fn from_entity(id: String, entity: MatchEntity) -> Self {
        Self {
            id,
            time: entity.time,
            team1: entity.team1.into_iter().map(Player::from).collect(),
            team2: entity.team2.into_iter().map(Player::from).collect(),
        }
    }

    /// Players registered on `team`, in sign-up order.
    pub fn roster(&self, team: TeamKey) -> &[Player] {
        match team {
            TeamKey::Team1 => &self.team1,
            TeamKey::Team2 => &self.team2,
        }
    }

    /// Players across both teams.
    pub fn player_count(&self) -> usize {
        self.team1.len() + self.team2.len()
    }
}

/// Match slot created by every reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSlot {
    /// Store key of the match (e.g. `match1`).
    pub key: String,
    /// Display label (e.g. `NTPA-13:00`).
    pub time: String,
}

impl MatchSlot {
    pub fn new(key: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            time: time.into(),
        }
    }
}

/// Sign-up form that passed validation; fields are already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerForm {
    /// Non-blank name.
    pub name: String,
    /// Non-blank phone.
    pub phone: String,
    /// Roster to join.
    pub team: TeamKey,
}

/// Turn a pushed snapshot of the `matches` path into the local match list.
///
/// A missing or non-object value yields an empty list. Entries that cannot be decoded as a
/// match are skipped.
pub fn matches_from_snapshot(snapshot: Option<Value>) -> Vec<Match> {
    let Some(Value::Object(entries)) = snapshot else {
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(
            |(id, raw)| match serde_json::from_value::<MatchEntity>(raw) {
                Ok(entity) => Some(Match::from_entity(id, entity)),
                Err(err) => {
                    warn!(match_id = %id, error = %err, "skipping undecodable match entry");
                    None
                }
            },
        )
        .collect()
}

/// Random 9-character base-36 token. Collisions are unlikely but possible.
pub fn generate_player_id() -> String {
    let mut rng = rand::rng();
    (0..PLAYER_ID_LEN)
        .map(|_| PLAYER_ID_ALPHABET[rng.random_range(0..PLAYER_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snapshot_keys_become_match_ids() {
        let matches = matches_from_snapshot(Some(json!({
            "match1": {"time": "NTPA-13:00", "team1": [{"id": "a", "name": "Ann", "phone": "1"}]},
            "match2": {"time": "VTPA-15:00"}
        })));

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "match1");
        assert_eq!(matches[0].time, "NTPA-13:00");
        assert_eq!(matches[0].roster(TeamKey::Team1)[0].name, "Ann");
        assert!(matches[0].roster(TeamKey::Team2).is_empty());
        assert_eq!(matches[1].id, "match2");
        assert_eq!(matches[1].player_count(), 0);
    }

    #[test]
    fn null_or_scalar_snapshot_yields_no_matches() {
        assert!(matches_from_snapshot(None).is_empty());
        assert!(matches_from_snapshot(Some(json!("oops"))).is_empty());
    }

    #[test]
    fn undecodable_entries_are_skipped() {
        let matches = matches_from_snapshot(Some(json!({
            "match1": "not a match",
            "match2": {"time": "VTPA-15:00"}
        })));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "match2");
    }

    #[test]
    fn player_ids_are_base36_tokens() {
        let id = generate_player_id();
        assert_eq!(id.len(), PLAYER_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn team_keys_serialize_as_roster_names() {
        assert_eq!(serde_json::to_value(TeamKey::Team2).unwrap(), json!("team2"));
        assert_eq!(
            serde_json::from_value::<TeamKey>(json!("team1")).unwrap(),
            TeamKey::Team1
        );
    }
}
