use serde::{Deserialize, Serialize};

/// Real-world status of a flight as reported by the oracle network.
///
/// Wire codes are fixed: 0, 10, 20, 30, 40, 50.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FlightStatus {
    #[default]
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    /// Every status code an oracle may report.
    pub const ALL: [FlightStatus; 6] = [
        FlightStatus::Unknown,
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
    ];

    pub fn code(self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// A final status has been written by consensus and never changes again.
    pub fn is_final(self) -> bool {
        self != FlightStatus::Unknown
    }

    /// Only an airline-caused delay pays out.
    pub fn is_payable(self) -> bool {
        self == FlightStatus::LateAirline
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FlightStatus::Unknown => "unknown",
            FlightStatus::OnTime => "on-time",
            FlightStatus::LateAirline => "late-airline",
            FlightStatus::LateWeather => "late-weather",
            FlightStatus::LateTechnical => "late-technical",
            FlightStatus::LateOther => "late-other",
        };
        write!(f, "{} ({})", label, self.code())
    }
}
