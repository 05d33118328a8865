//! Flat record formats for cards and review logs.
//!
//! Cards serialize to `card_id, state, step, ease, due, current_interval`
//! with `state` as its ordinal and `due` as an ISO-8601 string. Every key
//! must be present; nullable fields may hold `null`.

use crate::{Card, Error, Rating, Result, ReviewLog, State};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Card record as stored by callers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardRecord {
    pub card_id: i64,
    pub state: u8,
    #[serde(deserialize_with = "nullable")]
    pub step: Option<u32>,
    #[serde(deserialize_with = "nullable")]
    pub ease: Option<f64>,
    pub due: String,
    #[serde(deserialize_with = "nullable")]
    pub current_interval: Option<u32>,
}

/// Review log record; `card` is the nested card record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewLogRecord {
    pub card: CardRecord,
    pub rating: u8,
    pub review_datetime: String,
    #[serde(deserialize_with = "nullable")]
    pub review_duration: Option<u64>,
}

/// Deserialize an `Option` whose key must still be present
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse an ISO-8601 timestamp; naive timestamps are taken as UTC
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::MalformedRecord(format!("Invalid timestamp '{}': {}", s, e)))
}

impl From<Card> for CardRecord {
    fn from(card: Card) -> Self {
        Self {
            card_id: card.id,
            state: card.state().into(),
            step: card.step(),
            ease: card.ease(),
            due: format_timestamp(&card.due),
            current_interval: card.current_interval(),
        }
    }
}

impl TryFrom<CardRecord> for Card {
    type Error = Error;

    fn try_from(record: CardRecord) -> Result<Self> {
        let state = State::try_from(record.state)?;
        let due = parse_timestamp(&record.due)?;

        Card::from_parts(
            Some(record.card_id),
            state,
            record.step,
            record.ease,
            Some(due),
            record.current_interval,
        )
    }
}

impl From<ReviewLog> for ReviewLogRecord {
    fn from(log: ReviewLog) -> Self {
        Self {
            card: log.card.into(),
            rating: log.rating.into(),
            review_datetime: format_timestamp(&log.review_datetime),
            review_duration: log.review_duration,
        }
    }
}

impl TryFrom<ReviewLogRecord> for ReviewLog {
    type Error = Error;

    fn try_from(record: ReviewLogRecord) -> Result<Self> {
        let rating = Rating::try_from(record.rating)
            .map_err(|e| Error::MalformedRecord(e.to_string()))?;

        Ok(Self {
            card: Card::try_from(record.card)?,
            rating,
            review_datetime: parse_timestamp(&record.review_datetime)?,
            review_duration: record.review_duration,
        })
    }
}

fn malformed(e: serde_json::Error) -> Error {
    Error::MalformedRecord(e.to_string())
}

impl Card {
    /// Serialize to a flat JSON object
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(CardRecord::from(self.clone()))?)
    }

    /// Deserialize from a flat JSON object
    pub fn from_value(value: Value) -> Result<Self> {
        let record: CardRecord = serde_json::from_value(value).map_err(malformed)?;
        Card::try_from(record)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&CardRecord::from(self.clone()))?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: CardRecord = serde_json::from_str(json).map_err(malformed)?;
        Card::try_from(record)
    }

    /// Load a card record file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Save the card record to `path` atomically
    ///
    /// The record is written to a temp file in the same directory, synced,
    /// and renamed over `path`, so readers see either the old or the new
    /// card and never a partial file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(&CardRecord::from(self.clone()))?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved card {} to {:?}", self.id, path);
        Ok(())
    }
}

impl ReviewLog {
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(ReviewLogRecord::from(self.clone()))?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let record: ReviewLogRecord = serde_json::from_value(value).map_err(malformed)?;
        ReviewLog::try_from(record)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&ReviewLogRecord::from(self.clone()))?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: ReviewLogRecord = serde_json::from_str(json).map_err(malformed)?;
        ReviewLog::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Phase;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 15).unwrap() + Duration::microseconds(123_456)
    }

    fn reachable_cards() -> Vec<Card> {
        vec![
            Card {
                id: 1,
                phase: Phase::Learning { step: 0 },
                due: due(),
            },
            Card {
                id: 2,
                phase: Phase::Learning { step: 1 },
                due: due(),
            },
            Card {
                id: 3,
                phase: Phase::Review {
                    ease: 2.5 * 1.15,
                    current_interval: 17,
                },
                due: due(),
            },
            Card {
                id: 4,
                phase: Phase::Relearning {
                    step: 0,
                    ease: 2.5 * 0.8 * 0.85,
                    current_interval: 1,
                },
                due: due(),
            },
        ]
    }

    #[test]
    fn test_card_record_field_names() {
        let card = Card {
            id: 1_700_000_000_000,
            phase: Phase::Review {
                ease: 2.5,
                current_interval: 4,
            },
            due: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };

        assert_eq!(
            card.to_value().unwrap(),
            json!({
                "card_id": 1_700_000_000_000i64,
                "state": 2,
                "step": null,
                "ease": 2.5,
                "due": "2024-01-02T03:04:05+00:00",
                "current_interval": 4,
            })
        );
    }

    #[test]
    fn test_card_roundtrip_every_state() {
        for card in reachable_cards() {
            let parsed = Card::from_value(card.to_value().unwrap()).unwrap();
            assert_eq!(parsed, card);

            let parsed = Card::from_json(&card.to_json().unwrap()).unwrap();
            assert_eq!(parsed, card);
        }
    }

    #[test]
    fn test_card_serde_uses_record_layout() {
        let card = reachable_cards().remove(3);
        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"card_id\":4"));
        assert!(json.contains("\"state\":3"));

        let parsed: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, card);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let value = json!({
            "card_id": 1,
            "state": 1,
            "ease": null,
            "due": "2024-01-02T03:04:05+00:00",
            "current_interval": null,
        });

        let result = Card::from_value(value);
        assert!(matches!(result, Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let value = json!({
            "card_id": "abc",
            "state": 1,
            "step": 0,
            "ease": null,
            "due": "2024-01-02T03:04:05+00:00",
            "current_interval": null,
        });
        assert!(matches!(
            Card::from_value(value),
            Err(Error::MalformedRecord(_))
        ));

        let value = json!({
            "card_id": 1,
            "state": 1,
            "step": 0,
            "ease": null,
            "due": "yesterday",
            "current_interval": null,
        });
        assert!(matches!(
            Card::from_value(value),
            Err(Error::MalformedRecord(_))
        ));

        let value = json!({
            "card_id": 1,
            "state": 9,
            "step": 0,
            "ease": null,
            "due": "2024-01-02T03:04:05+00:00",
            "current_interval": null,
        });
        assert!(matches!(
            Card::from_value(value),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_review_without_ease_is_invariant_violation() {
        let value = json!({
            "card_id": 1,
            "state": 2,
            "step": null,
            "ease": null,
            "due": "2024-01-02T03:04:05+00:00",
            "current_interval": 3,
        });

        assert!(matches!(
            Card::from_value(value),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_learning_record_without_step_starts_at_zero() {
        let value = json!({
            "card_id": 5,
            "state": 1,
            "step": null,
            "ease": null,
            "due": "2024-01-02T03:04:05.250000+00:00",
            "current_interval": null,
        });

        let card = Card::from_value(value).unwrap();
        assert_eq!(card.phase, Phase::Learning { step: 0 });
        assert_eq!(card.due.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let ts = parse_timestamp("2024-01-02T03:04:05").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());

        let ts = parse_timestamp("2024-01-02T05:04:05+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_review_log_roundtrip() {
        let log = ReviewLog::new(
            &reachable_cards()[2],
            Rating::Hard,
            due() + Duration::days(1),
            Some(4321),
        );

        let value = log.to_value().unwrap();
        assert_eq!(value["rating"], json!(2));
        assert_eq!(value["card"]["card_id"], json!(3));
        assert_eq!(value["review_duration"], json!(4321));

        assert_eq!(ReviewLog::from_value(value).unwrap(), log);
        assert_eq!(ReviewLog::from_json(&log.to_json().unwrap()).unwrap(), log);
    }

    #[test]
    fn test_review_log_bad_rating_is_malformed() {
        let log = ReviewLog::new(&reachable_cards()[0], Rating::Good, due(), None);
        let mut value = log.to_value().unwrap();
        value["rating"] = json!(7);

        assert!(matches!(
            ReviewLog::from_value(value),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_save_to_replaces_card_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("card.json");
        let cards = reachable_cards();

        cards[0].save_to(&path).unwrap();
        assert_eq!(Card::load_from(&path).unwrap(), cards[0]);

        cards[2].save_to(&path).unwrap();
        assert_eq!(Card::load_from(&path).unwrap(), cards[2]);

        // Only the card file is left behind
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("card.json")]);
    }

    #[test]
    fn test_save_to_creates_parent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("deck").join("card.json");
        let card = reachable_cards().remove(3);

        card.save_to(&path).unwrap();
        assert_eq!(Card::load_from(&path).unwrap(), card);
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = Card::load_from(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
