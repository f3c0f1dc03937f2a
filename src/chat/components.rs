//! Structured components carried by a message.
//!
//! Inbound components arrive as loosely-typed JSON objects tagged by a `type`
//! string. Decoding maps them onto a closed set of variants; anything that is
//! unrecognized or malformed becomes [`StructuredComponent::Unknown`] so one bad
//! entry never costs the rest of the message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::envelope::parse_timestamp;

/// Wire tag of a binary question.
const BINARY_QUESTION_TAG: &str = "binaryQuestion";
/// Wire tag of a multiple choice prompt.
const MULTI_CHOICE_TAG: &str = "multiChoice";
/// Wire tag of a reservation summary.
const RESERVATION_TAG: &str = "reservation";

/// One selectable option of a multiple choice prompt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Reply identifier.
    pub id: String,
    /// Displayed label, also the text transmitted when chosen.
    pub label: String,
}

impl Choice {
    /// Build a choice from a raw wire value.
    ///
    /// The label is the object's `text` when it is a string, else
    /// `text.{language}` when that is a string, else the JSON form of `text`.
    /// The id is the object's `id` when present, else the label. A bare
    /// string is both id and label.
    #[must_use]
    pub fn from_value(raw: &Value, language: &str) -> Self {
        match raw {
            Value::String(label) => Self {
                id: label.clone(),
                label: label.clone(),
            },
            Value::Object(map) => {
                let label = match map.get("text") {
                    Some(Value::String(text)) => text.clone(),
                    Some(text) => match text.get(language) {
                        Some(Value::String(localized)) => localized.clone(),
                        _ => text.to_string(),
                    },
                    None => raw.to_string(),
                };
                let id = match map.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    Some(Value::Null) | None => label.clone(),
                    Some(other) => other.to_string(),
                };
                Self { id, label }
            }
            other => {
                let label = other.to_string();
                Self {
                    id: label.clone(),
                    label,
                }
            }
        }
    }
}

/// Summary of a booked event. Informational only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Where the event takes place.
    pub location: String,
    /// When the event takes place.
    pub date: DateTime<Utc>,
    /// Name of the event.
    pub event_name: String,
    /// Number of attendees.
    pub party_size: u32,
}

/// A typed attachment of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StructuredComponent {
    /// Question answered with one of two canonical replies.
    BinaryQuestion {
        /// Question text.
        question: String,
    },
    /// Prompt offering an ordered list of choices.
    MultiChoice {
        /// Question text.
        question: String,
        /// Options in display order.
        choices: Vec<Choice>,
    },
    /// Reservation summary.
    Reservation(Reservation),
    /// Unrecognized or malformed component; never rendered.
    Unknown {
        /// The wire tag, when one was present.
        tag: Option<String>,
    },
}

impl StructuredComponent {
    /// Whether the component has anything to render.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

#[derive(Deserialize)]
struct RawBinaryQuestion {
    question: String,
}

#[derive(Deserialize)]
struct RawMultiChoice {
    question: String,
    choices: Vec<Value>,
}

#[derive(Deserialize)]
struct RawReservation {
    location: String,
    date: String,
    #[serde(alias = "eventName")]
    event_name: String,
    #[serde(alias = "partySize", alias = "party_size")]
    nb_of_people: u32,
}

/// Decode a sequence of raw components, preserving order.
#[must_use]
pub fn decode_components(raw: &[Value], language: &str) -> Vec<StructuredComponent> {
    raw.iter().map(|item| decode_component(item, language)).collect()
}

/// Decode one raw component; never fails.
#[must_use]
pub fn decode_component(raw: &Value, language: &str) -> StructuredComponent {
    let tag = raw.get("type").and_then(Value::as_str);
    let decoded = match tag {
        Some(BINARY_QUESTION_TAG) => RawBinaryQuestion::deserialize(raw)
            .ok()
            .map(|q| StructuredComponent::BinaryQuestion {
                question: q.question,
            }),
        Some(MULTI_CHOICE_TAG) => {
            RawMultiChoice::deserialize(raw)
                .ok()
                .map(|m| StructuredComponent::MultiChoice {
                    question: m.question,
                    choices: m
                        .choices
                        .iter()
                        .map(|choice| Choice::from_value(choice, language))
                        .collect(),
                })
        }
        Some(RESERVATION_TAG) => RawReservation::deserialize(raw).ok().and_then(|r| {
            parse_timestamp(&r.date).map(|date| {
                StructuredComponent::Reservation(Reservation {
                    location: r.location,
                    date,
                    event_name: r.event_name,
                    party_size: r.nb_of_people,
                })
            })
        }),
        _ => None,
    };

    decoded.unwrap_or_else(|| {
        debug!(tag = ?tag, "dropping unrecognized or malformed component");
        StructuredComponent::Unknown {
            tag: tag.map(str::to_string),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn choice_fallback_chain_is_deterministic() {
        let raw = [
            json!("Go!"),
            json!({"text": "Stop"}),
            json!({"id": "x9", "text": {"fr": "Oui"}}),
        ];
        let choices: Vec<Choice> = raw.iter().map(|c| Choice::from_value(c, "fr")).collect();

        let labels: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
        let ids: Vec<&str> = choices.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(labels, ["Go!", "Stop", "Oui"]);
        assert_eq!(ids, ["Go!", "Stop", "x9"]);
    }

    #[test]
    fn choice_without_locale_key_is_stringified() {
        let choice = Choice::from_value(&json!({"text": {"de": "Ja"}}), "fr");
        assert_eq!(choice.label, r#"{"de":"Ja"}"#);
        assert_eq!(choice.id, choice.label);

        let numeric = Choice::from_value(&json!({"id": 7, "text": "Seven"}), "fr");
        assert_eq!(numeric.id, "7");
        assert_eq!(numeric.label, "Seven");

        let bare_number = Choice::from_value(&json!(3), "fr");
        assert_eq!(bare_number.label, "3");
    }

    #[test]
    fn unknown_component_is_tolerated() {
        let raw = [
            json!({"type": "binaryQuestion", "question": "Ready?"}),
            json!({"type": "mystery", "foo": 1}),
        ];
        let decoded = decode_components(&raw, "fr");

        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded[0],
            StructuredComponent::BinaryQuestion {
                question: "Ready?".to_string()
            }
        );
        assert_eq!(decoded.iter().filter(|c| c.is_visible()).count(), 1);
        assert_eq!(
            decoded[1],
            StructuredComponent::Unknown {
                tag: Some("mystery".to_string())
            }
        );
    }

    #[test]
    fn malformed_entries_do_not_drop_neighbours() {
        let raw = [
            json!({"type": "multiChoice", "question": "Type ?"}),
            json!("not an object"),
            json!({"question": "untagged"}),
            json!({
                "type": "multiChoice",
                "question": "Type d'événement",
                "choices": ["concert", "match"]
            }),
        ];
        let decoded = decode_components(&raw, "fr");

        assert_eq!(decoded.len(), 4);
        assert!(!decoded[0].is_visible());
        assert!(!decoded[1].is_visible());
        assert_eq!(decoded[2], StructuredComponent::Unknown { tag: None });
        let StructuredComponent::MultiChoice { question, choices } = &decoded[3] else {
            unreachable!("expected multi choice, got {:?}", decoded[3]);
        };
        assert_eq!(question, "Type d'événement");
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[1].label, "match");
    }

    #[test]
    fn reservation_decodes_wire_and_camel_case_keys() {
        let snake = decode_component(
            &json!({
                "type": "reservation",
                "location": "Salle Polytech",
                "date": "2025-06-01",
                "event_name": "Concert",
                "nb_of_people": 4
            }),
            "fr",
        );
        let StructuredComponent::Reservation(r) = &snake else {
            unreachable!("expected reservation, got {snake:?}");
        };
        assert_eq!(r.location, "Salle Polytech");
        assert_eq!((r.date.year(), r.date.month(), r.date.day()), (2025, 6, 1));
        assert_eq!(r.party_size, 4);

        let camel = decode_component(
            &json!({
                "type": "reservation",
                "location": "Hall B",
                "date": "2025-06-01T20:30:00Z",
                "eventName": "Match",
                "partySize": 2
            }),
            "fr",
        );
        let StructuredComponent::Reservation(r) = &camel else {
            unreachable!("expected reservation, got {camel:?}");
        };
        assert_eq!(r.event_name, "Match");
        assert_eq!(r.date.hour(), 20);
    }

    #[test]
    fn reservation_with_bad_date_is_unknown() {
        let decoded = decode_component(
            &json!({
                "type": "reservation",
                "location": "Hall B",
                "date": "next tuesday",
                "event_name": "Match",
                "nb_of_people": 2
            }),
            "fr",
        );
        assert_eq!(
            decoded,
            StructuredComponent::Unknown {
                tag: Some("reservation".to_string())
            }
        );
    }
}
