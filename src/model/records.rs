use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A table row cached by a synchronizer, keyed by its primary key.
pub trait Row: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    /// Backend table the row lives in
    const TABLE: &'static str;

    fn id(&self) -> &str;
}

/// Keys come back as text from uuid columns and as numbers from serial ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum Key {
    Text(String),
    Number(i64),
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        match key {
            Key::Text(text) => text,
            Key::Number(number) => number.to_string(),
        }
    }
}

/// Read a key column into its string form.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Key::deserialize(deserializer).map(String::from)
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Key>::deserialize(deserializer)?.map(String::from))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChoreStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chore {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Player the chore is assigned to
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: ChoreStatus,
    #[serde(default)]
    pub points: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Row for Chore {
    const TABLE: &'static str = "chores";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub created_by: Option<String>,
}

impl Row for Event {
    const TABLE: &'static str = "events";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Join row linking a player to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAttendee {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub event_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub player_id: String,
    pub status: Option<String>,
}

impl Row for EventAttendee {
    const TABLE: &'static str = "event_attendees";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct House {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub total_points: i64,
}

impl Row for House {
    const TABLE: &'static str = "houses";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub house_id: Option<String>,
    pub total_points: i64,
}

impl Row for Player {
    const TABLE: &'static str = "players";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Poor,
    Terrible,
    #[serde(other)]
    Unknown,
}

/// One wellness check-in submitted by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessLog {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub player_id: String,
    pub created_at: DateTime<Utc>,
    pub sleep_hours: Option<f64>,
    /// 1 (worst) to 5 (best)
    pub sleep_quality: Option<u8>,
    /// 1 (worst) to 5 (best)
    pub energy_level: Option<u8>,
    /// 1 (none) to 5 (severe)
    pub soreness: Option<u8>,
    /// 1 (none) to 5 (severe)
    pub stress: Option<u8>,
    pub mood: Option<Mood>,
    pub notes: Option<String>,
}

impl Row for WellnessLog {
    const TABLE: &'static str = "wellness_logs";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_enum_values_decode() {
        let chore: Chore = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "title": "Sweep",
            "status": "archived"
        }))
        .unwrap();
        assert_eq!(chore.status, ChoreStatus::Unknown);
        assert_eq!(chore.assigned_to, None);

        let mood: Mood = serde_json::from_str("\"ecstatic\"").unwrap();
        assert_eq!(mood, Mood::Unknown);
    }

    #[test]
    fn test_numeric_keys_read_as_text() {
        let attendee: EventAttendee = serde_json::from_value(serde_json::json!({
            "id": 41,
            "event_id": 7,
            "player_id": "p1",
            "status": null
        }))
        .unwrap();
        assert_eq!(attendee.id, "41");
        assert_eq!(attendee.event_id, "7");

        let player: Player = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "Ada",
            "house_id": 12,
            "total_points": 0
        }))
        .unwrap();
        assert_eq!(player.id, "3");
        assert_eq!(player.house_id.as_deref(), Some("12"));

        let chore: Chore = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "title": "Sweep"
        }))
        .unwrap();
        assert_eq!(chore.assigned_to, None);

        assert!(serde_json::from_value::<House>(serde_json::json!({
            "id": true,
            "name": "Red",
            "total_points": 1
        }))
        .is_err());
    }

    #[test]
    fn test_house_requires_points() {
        let partial = serde_json::json!({ "id": "h1", "name": "Red" });
        assert!(serde_json::from_value::<House>(partial).is_err());
    }
}
