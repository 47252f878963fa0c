use nav_session_types::ManeuverCategory;

/// The languages instructions and narration phrases exist for. Anything else falls back to
/// English.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Locale {
    English,
    Spanish,
}

/// The pieces of a provider step that go into its instruction text.
#[derive(Default)]
pub struct StepWords<'a> {
    pub road: &'a str,
    /// Compass abbreviation, like "NE"
    pub direction: &'a str,
    /// Provider modifier, like "slight left"
    pub modifier: Option<&'a str>,
    pub exit: Option<u32>,
}

impl Locale {
    pub fn from_tag(tag: &str) -> Locale {
        match primary_subtag(tag).as_str() {
            "es" | "spa" => Locale::Spanish,
            _ => Locale::English,
        }
    }

    pub fn intro(self) -> &'static str {
        match self {
            Locale::English => "Starting navigation",
            Locale::Spanish => "Iniciando navegación",
        }
    }

    pub fn arrival(self) -> &'static str {
        match self {
            Locale::English => "You have arrived at your destination",
            Locale::Spanish => "Ha llegado a su destino",
        }
    }

    pub fn distance_phrase(self, meters: f64) -> String {
        if meters < 1000.0 {
            let n = meters.round();
            match self {
                Locale::English => format!("in {n} meters"),
                Locale::Spanish => format!("en {n} metros"),
            }
        } else {
            let km = meters / 1000.0;
            match self {
                Locale::English => format!("in {km:.1} kilometers"),
                Locale::Spanish => format!("en {km:.1} kilómetros"),
            }
        }
    }

    pub fn compass_word(self, abbreviation: &str) -> &'static str {
        let english = match abbreviation {
            "N" => "north",
            "NE" => "northeast",
            "E" => "east",
            "SE" => "southeast",
            "S" => "south",
            "SW" => "southwest",
            "W" => "west",
            "NW" => "northwest",
            _ => "",
        };
        if self == Locale::English {
            return english;
        }
        match abbreviation {
            "N" => "norte",
            "NE" => "noreste",
            "E" => "este",
            "SE" => "sureste",
            "S" => "sur",
            "SW" => "suroeste",
            "W" => "oeste",
            "NW" => "noroeste",
            _ => "",
        }
    }

    fn modifier_word(self, modifier: Option<&str>) -> &'static str {
        match (self, modifier.unwrap_or("straight")) {
            (Locale::English, "left") => "left",
            (Locale::English, "right") => "right",
            (Locale::English, "slight left") => "slightly left",
            (Locale::English, "slight right") => "slightly right",
            (Locale::English, "sharp left") => "sharp left",
            (Locale::English, "sharp right") => "sharp right",
            (Locale::English, "uturn") => "around",
            (Locale::English, _) => "straight",
            (Locale::Spanish, "left") => "a la izquierda",
            (Locale::Spanish, "right") => "a la derecha",
            (Locale::Spanish, "slight left") => "levemente a la izquierda",
            (Locale::Spanish, "slight right") => "levemente a la derecha",
            (Locale::Spanish, "sharp left") => "fuerte a la izquierda",
            (Locale::Spanish, "sharp right") => "fuerte a la derecha",
            (Locale::Spanish, "uturn") => "en U",
            (Locale::Spanish, _) => "derecho",
        }
    }

    fn ordinal(self, n: u32) -> String {
        match self {
            Locale::English => {
                let suffix = match (n % 10, n % 100) {
                    (1, x) if x != 11 => "st",
                    (2, x) if x != 12 => "nd",
                    (3, x) if x != 13 => "rd",
                    _ => "th",
                };
                format!("{n}{suffix}")
            }
            Locale::Spanish => format!("{n}ª"),
        }
    }

    /// Builds the displayed and spoken text for one step.
    pub fn instruction(self, category: ManeuverCategory, words: &StepWords) -> String {
        let dir = self.compass_word(words.direction);
        let modifier = self.modifier_word(words.modifier);
        let exit = self.ordinal(words.exit.unwrap_or(1));

        // (text, suffix to use when the road has a name)
        let (text, onto) = match self {
            Locale::English => match category {
                ManeuverCategory::Head => (format!("Head {dir}"), " on "),
                ManeuverCategory::Straight => ("Continue".to_string(), " onto "),
                ManeuverCategory::SlightRight => ("Slight right".to_string(), " onto "),
                ManeuverCategory::Right => ("Right".to_string(), " onto "),
                ManeuverCategory::SharpRight => ("Sharp right".to_string(), " onto "),
                ManeuverCategory::TurnAround => ("Turn around".to_string(), ""),
                ManeuverCategory::SharpLeft => ("Sharp left".to_string(), " onto "),
                ManeuverCategory::Left => ("Left".to_string(), " onto "),
                ManeuverCategory::SlightLeft => ("Slight left".to_string(), " onto "),
                ManeuverCategory::Roundabout => {
                    (format!("Take the {exit} exit in the roundabout"), " onto ")
                }
                ManeuverCategory::Fork => (format!("At the fork, keep {modifier}"), " onto "),
                ManeuverCategory::Merge => (format!("Merge {modifier}"), " onto "),
                ManeuverCategory::OnRamp => (format!("Take the ramp {modifier}"), " onto "),
                ManeuverCategory::OffRamp => (format!("Take the exit {modifier}"), " onto "),
                ManeuverCategory::EndOfRoad => {
                    (format!("Turn {modifier} at the end of the road"), " onto ")
                }
                ManeuverCategory::WaypointReached => {
                    ("You have arrived at a waypoint".to_string(), "")
                }
                ManeuverCategory::DestinationReached => (self.arrival().to_string(), ""),
                ManeuverCategory::Other => ("Continue".to_string(), " on "),
            },
            Locale::Spanish => match category {
                ManeuverCategory::Head => (format!("Derecho {dir}"), " sobre "),
                ManeuverCategory::Straight => ("Continuar".to_string(), " en "),
                ManeuverCategory::SlightRight => {
                    ("Leve giro a la derecha".to_string(), " sobre ")
                }
                ManeuverCategory::Right => ("Derecha".to_string(), " sobre "),
                ManeuverCategory::SharpRight => {
                    ("Giro pronunciado a la derecha".to_string(), " sobre ")
                }
                ManeuverCategory::TurnAround => ("Dar vuelta".to_string(), ""),
                ManeuverCategory::SharpLeft => {
                    ("Giro pronunciado a la izquierda".to_string(), " sobre ")
                }
                ManeuverCategory::Left => ("Izquierda".to_string(), " sobre "),
                ManeuverCategory::SlightLeft => {
                    ("Leve giro a la izquierda".to_string(), " sobre ")
                }
                ManeuverCategory::Roundabout => {
                    (format!("Tomar la {exit} salida en la rotonda"), " en ")
                }
                ManeuverCategory::Fork => (format!("En el cruce gira {modifier}"), " hacia "),
                ManeuverCategory::Merge => (format!("Incorporarse {modifier}"), " hacia "),
                ManeuverCategory::OnRamp => (format!("Toma la rampa {modifier}"), " hacia "),
                ManeuverCategory::OffRamp => (format!("Toma la salida {modifier}"), " hacia "),
                ManeuverCategory::EndOfRoad => {
                    (format!("Gira {modifier} al final de la calle"), " hacia ")
                }
                ManeuverCategory::WaypointReached => {
                    ("Llegó a un punto del camino".to_string(), "")
                }
                ManeuverCategory::DestinationReached => ("Llegada a destino".to_string(), ""),
                ManeuverCategory::Other => ("Continuar".to_string(), " en "),
            },
        };

        let text = text.trim_end().to_string();
        if words.road.is_empty() || onto.is_empty() {
            text
        } else {
            format!("{text}{onto}{}", words.road)
        }
    }
}

/// "es-AR" -> "es", "SPA" -> "spa"
pub fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
