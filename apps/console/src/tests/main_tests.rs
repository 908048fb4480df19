use super::*;
use serde_json::json;

fn view(degraded: bool) -> AggregateView {
    serde_json::from_value(json!({
        "rsvpOpen": false,
        "maxGuests": 10,
        "adminPassword": "1234",
        "voiceAgentId": "",
        "schedule": [],
        "questions": [],
        "lodgingInfo": [],
        "travelInfo": "",
        "mood": "",
        "religion": "",
        "responses": [
            {
                "id": 2,
                "name": "Tariro",
                "companions": null,
                "partySize": 2,
                "answers": {},
                "submittedAt": "2026-03-01T10:00:00Z",
                "viaVoiceAgent": true
            },
            {
                "id": 1,
                "name": "Jane",
                "companions": "Tom",
                "partySize": 3,
                "answers": { "Dietary Requirements": "None" },
                "submittedAt": "2026-03-01T09:00:00Z",
                "viaVoiceAgent": false
            }
        ],
        "interactionLogs": [
            {
                "id": 1,
                "subjectIdentifier": "Tariro",
                "summary": "Voice RSVP for Tariro (2 ppl)",
                "channel": "voice",
                "occurredAt": "2026-03-01T10:00:00Z"
            }
        ],
        "adminChangeLogs": [],
        "degraded": degraded
    }))
    .expect("view")
}

#[test]
fn summary_lists_totals_and_guests() {
    let out = render_summary(&view(false));
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(
        lines[0],
        "RSVPs closed | 5 / 10 guests (2 responses, 5 places left)"
    );
    assert_eq!(lines[1], "  Tariro x2 [voice]");
    assert_eq!(lines[2], "  Jane x3 with Tom");
    assert_eq!(lines[3], "last interaction: Voice RSVP for Tariro (2 ppl) (voice)");
}

#[test]
fn degraded_view_is_flagged() {
    let out = render_summary(&view(true));
    assert!(out.starts_with("!! store unavailable"));
}

#[test]
fn answers_parse_as_field_value_pairs() {
    assert_eq!(
        parse_answer("1=No nuts").expect("answer"),
        ("1".to_string(), "No nuts".to_string())
    );
    assert_eq!(
        parse_answer("Will you be attending? = yes").expect("answer"),
        ("Will you be attending?".to_string(), "yes".to_string())
    );
    assert!(parse_answer("no-separator").is_err());
    assert!(parse_answer("=value").is_err());
}

#[test]
fn rsvp_command_collects_repeated_answers() {
    let args = Args::try_parse_from([
        "console",
        "--server-url",
        "http://127.0.0.1:3001",
        "rsvp",
        "--name",
        "Jane",
        "--party-size",
        "2",
        "--answer",
        "1=Vegan",
        "--answer",
        "2=yes",
    ])
    .expect("parse");
    match args.command {
        Command::Rsvp {
            name,
            party_size,
            answers,
            ..
        } => {
            assert_eq!(name, "Jane");
            assert_eq!(party_size, Some(2));
            assert_eq!(answers.len(), 2);
        }
        other => panic!("unexpected command {other:?}"),
    }
}
