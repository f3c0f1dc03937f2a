//! Plain-text rendering of log entries for a terminal.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};

use super::components::{Choice, Reservation, StructuredComponent};
use super::envelope::MessageEnvelope;

/// Line shown while a reply is awaited.
pub const TYPING_LINE: &str = "agent is typing...";

/// Format a timestamp as `h:mm AM/PM` in the given zone.
#[must_use]
pub fn format_time<Tz>(timestamp: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.with_timezone(zone).format("%-I:%M %p").to_string()
}

/// Render one envelope as display lines: a header line with time, speaker and
/// text, then one block per visible component.
#[must_use]
pub fn render_envelope<Tz>(envelope: &MessageEnvelope, zone: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let speaker = if envelope.is_local() { "you" } else { "agent" };
    let mut lines = vec![format!(
        "[{}] {speaker}: {}",
        format_time(&envelope.timestamp, zone),
        envelope.text
    )];

    for component in envelope.visible_components() {
        match component {
            StructuredComponent::BinaryQuestion { question } => {
                lines.push(format!("  {question}"));
                lines.push("    /yes | /no".to_string());
            }
            StructuredComponent::MultiChoice { question, choices } => {
                lines.push(format!("  {question}"));
                lines.extend(
                    choices
                        .iter()
                        .enumerate()
                        .map(|(i, choice)| format!("    /choice {} {}", i + 1, choice.label)),
                );
            }
            StructuredComponent::Reservation(reservation) => {
                lines.extend(render_reservation(reservation, zone));
            }
            StructuredComponent::Unknown { .. } => {}
        }
    }
    lines
}

fn render_reservation<Tz>(reservation: &Reservation, zone: &Tz) -> [String; 4]
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    [
        format!("  location: {}", reservation.location),
        format!(
            "  date: {}",
            reservation.date.with_timezone(zone).format("%Y-%m-%d %H:%M")
        ),
        format!("  event: {}", reservation.event_name),
        format!("  people: {}", reservation.party_size),
    ]
}

/// Choices of the most recent multiple choice prompt in the log.
#[must_use]
pub fn latest_choices(log: &[MessageEnvelope]) -> Option<&[Choice]> {
    log.iter().rev().find_map(|envelope| {
        envelope.components.iter().rev().find_map(|c| match c {
            StructuredComponent::MultiChoice { choices, .. } => Some(choices.as_slice()),
            _ => None,
        })
    })
}
