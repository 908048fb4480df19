use shared::domain::{LodgingOption, Question, QuestionKind, ScheduleItem, Settings};

pub const DEFAULT_MAX_GUESTS: i64 = 250;
pub const DEFAULT_ADMIN_PASSWORD: &str = "1234";
pub const DEFAULT_VENUE_LOCATION: &str = "Venue Umwinzii, Harare";

fn schedule_item(time: &str, event: &str, icon_tag: &str, detail: &str) -> ScheduleItem {
    ScheduleItem {
        time: time.to_string(),
        event: event.to_string(),
        icon_tag: icon_tag.to_string(),
        detail: Some(detail.to_string()),
    }
}

fn lodging(name: &str, description: &str) -> LodgingOption {
    LodgingOption {
        name: name.to_string(),
        description: description.to_string(),
        url: "#".to_string(),
    }
}

/// The document created the first time settings are read from an empty store.
pub fn default_settings() -> Settings {
    Settings {
        rsvp_open: true,
        max_guests: DEFAULT_MAX_GUESTS,
        admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        voice_agent_id: String::new(),
        schedule: vec![
            schedule_item(
                "12:00 PM - 1:00 PM",
                "Arrival of Guests",
                "heart",
                "Welcome to the celebration! Guests arrive and are greeted with refreshments as we gather for this special day.",
            ),
            schedule_item(
                "1:00 PM - 3:00 PM",
                "Wedding Ceremony",
                "heart-handshake",
                "The sacred exchange of vows and rings in the presence of God and loved ones. The moment we become one.",
            ),
            schedule_item(
                "3:00 PM - 4:00 PM",
                "Cocktail Hour",
                "chef-hat",
                "Enjoy cocktails and hors d'oeuvres as we capture beautiful memories and celebrate the newlyweds.",
            ),
            schedule_item(
                "4:00 PM onwards",
                "Wedding Reception",
                "music",
                "A grand celebration with dining, dancing, heartfelt toasts, and the beginning of our forever together.",
            ),
        ],
        questions: vec![
            Question {
                field_id: "1".to_string(),
                label: "Dietary Requirements".to_string(),
                kind: QuestionKind::Text,
                options: None,
                required: false,
            },
            Question {
                field_id: "2".to_string(),
                label: "Will you be attending?".to_string(),
                kind: QuestionKind::Boolean,
                options: None,
                required: true,
            },
        ],
        lodging_info: vec![
            lodging("Meikles Hotel", "A historic luxury choice in Harare central."),
            lodging("Cresta Lodge", "Tranquil setting, perfect for wedding guests."),
        ],
        travel_info: "Arrival: Robert Gabriel Mugabe International Airport (HRE). Venue Umwinzii is located in the northern suburbs of Harare. We recommend using In-Drive or pre-arranged shuttles.".to_string(),
        mood: "Black Tie / Formal • Palette: Lilac, Lavender, and Gold".to_string(),
        religion: "Christian Tradition".to_string(),
    }
}

/// Served when the store cannot be read: empty content, RSVPs open.
pub fn fallback_settings() -> Settings {
    Settings {
        rsvp_open: true,
        max_guests: DEFAULT_MAX_GUESTS,
        admin_password: String::new(),
        voice_agent_id: String::new(),
        schedule: Vec::new(),
        questions: Vec::new(),
        lodging_info: Vec::new(),
        travel_info: String::new(),
        mood: String::new(),
        religion: String::new(),
    }
}
