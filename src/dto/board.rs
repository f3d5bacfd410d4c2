use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationError;

use crate::{
    dto::validation::{validate_filled, validate_team_selected},
    state::{
        board::{Match, Player, PlayerForm, TeamKey},
        countdown::Countdown,
        notifications::{Notification, NotificationKind},
        session::{BoardSnapshot, LoadPhase},
    },
};

/// Sign-up form submitted to join a team.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JoinRequest {
    /// Display name; must not be blank.
    #[serde(default)]
    pub name: String,
    /// Contact phone; must not be blank.
    #[serde(default)]
    pub phone: String,
    /// Team to join; omitted when the user has not picked one yet.
    #[serde(default)]
    pub team: Option<TeamKey>,
}

impl JoinRequest {
    /// Check name, phone and team in that order, stopping at the first failure.
    pub fn to_form(&self) -> Result<PlayerForm, ValidationError> {
        validate_filled(&self.name, "name_required", "enter name")?;
        validate_filled(&self.phone, "phone_required", "enter phone")?;
        let team = validate_team_selected(self.team)?;

        Ok(PlayerForm {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            team,
        })
    }
}

/// Public view of a registered player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Identifier used to remove the player again.
    pub id: String,
    pub name: String,
    pub phone: String,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            phone: player.phone.clone(),
        }
    }
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JoinResponse {
    /// The newly registered player.
    pub player: PlayerSummary,
    /// Match the joining client should show expanded.
    pub expanded_match: String,
}

/// Public view of a match with both rosters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Store key of the match.
    pub id: String,
    /// Display label, e.g. `NTPA-13:00`.
    pub time: String,
    /// First roster in sign-up order.
    pub team1: Vec<PlayerSummary>,
    /// Second roster in sign-up order.
    pub team2: Vec<PlayerSummary>,
    /// Players across both teams.
    pub player_count: usize,
}

impl From<&Match> for MatchSummary {
    fn from(game: &Match) -> Self {
        Self {
            id: game.id.clone(),
            time: game.time.clone(),
            team1: game.team1.iter().map(PlayerSummary::from).collect(),
            team2: game.team2.iter().map(PlayerSummary::from).collect(),
            player_count: game.player_count(),
        }
    }
}

/// Loading state of the board as exposed to clients.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoardPhase {
    /// Nothing received from the store yet.
    Loading,
    /// The board has been loaded at least once.
    Ready,
}

impl From<LoadPhase> for BoardPhase {
    fn from(phase: LoadPhase) -> Self {
        match phase {
            LoadPhase::Loading => BoardPhase::Loading,
            LoadPhase::Ready => BoardPhase::Ready,
        }
    }
}

/// Snapshot of the whole board.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardResponse {
    /// Loading state of the board.
    pub phase: BoardPhase,
    /// Matches in store key order.
    pub matches: Vec<MatchSummary>,
    /// Date (`YYYY-MM-DD`) of the last reset, empty when none is stored.
    pub last_reset_date: String,
    /// Match whose rosters should be shown expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded_match: Option<String>,
}

impl From<&BoardSnapshot> for BoardResponse {
    fn from(snapshot: &BoardSnapshot) -> Self {
        Self {
            phase: snapshot.phase.into(),
            matches: snapshot.matches.iter().map(MatchSummary::from).collect(),
            last_reset_date: snapshot.last_reset_date.clone(),
            expanded_match: snapshot.expanded_match.clone(),
        }
    }
}

/// Time left until the next daily reset.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountdownResponse {
    /// Whole hours left.
    pub hours: i64,
    /// Minutes left beyond [`CountdownResponse::hours`].
    pub minutes: i64,
    /// Pre-formatted label, e.g. `0ч 29м`.
    pub label: String,
}

impl From<Countdown> for CountdownResponse {
    fn from(countdown: Countdown) -> Self {
        Self {
            hours: countdown.hours,
            minutes: countdown.minutes,
            label: countdown.to_string(),
        }
    }
}

/// Outcome reported by a notification.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// The operation went through.
    Success,
    /// The operation failed; the message carries the cause.
    Error,
}

/// Pending user notification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationResponse {
    /// Identifier used to dismiss the notification.
    pub id: Uuid,
    /// Success or error.
    pub level: NotificationLevel,
    /// Text shown to the user.
    pub message: String,
}

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            level: match notification.kind {
                NotificationKind::Success => NotificationLevel::Success,
                NotificationKind::Error => NotificationLevel::Error,
            },
            message: notification.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::validation::validation_message;

    fn request(name: &str, phone: &str, team: Option<TeamKey>) -> JoinRequest {
        JoinRequest {
            name: name.into(),
            phone: phone.into(),
            team,
        }
    }

    #[test]
    fn first_failing_field_wins() {
        let err = request("  ", "", None).to_form().unwrap_err();
        assert_eq!(validation_message(&err), "enter name");

        let err = request("Ann", " ", None).to_form().unwrap_err();
        assert_eq!(validation_message(&err), "enter phone");

        let err = request("Ann", "+7 900", None).to_form().unwrap_err();
        assert_eq!(validation_message(&err), "select team");
    }

    #[test]
    fn valid_form_is_trimmed() {
        let form = request("  Ann Lee ", " +7 900 ", Some(TeamKey::Team1))
            .to_form()
            .unwrap();
        assert_eq!(
            form,
            PlayerForm {
                name: "Ann Lee".into(),
                phone: "+7 900".into(),
                team: TeamKey::Team1,
            }
        );
    }

    #[test]
    fn missing_fields_deserialize_as_blank() {
        let request: JoinRequest = serde_json::from_str(r#"{"team": "team2"}"#).unwrap();
        assert_eq!(request.team, Some(TeamKey::Team2));
        let err = request.to_form().unwrap_err();
        assert_eq!(validation_message(&err), "enter name");
    }
}
