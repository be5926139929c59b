//! Questions about today's date or year are answered from the local clock
//! instead of the model's training cutoff: the text of such a question is
//! replaced with the fact before the turn is sent.

use chrono::{DateTime, Datelike, TimeZone, Weekday};

use crate::location::Location;

const DATE_PHRASES: [&str; 3] = ["que dia é hoje", "qual é a data de hoje", "data atual"];
const YEAR_PHRASES: [&str; 2] = ["que ano é esse", "ano atual"];

const MONTHS: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho",
    "julho", "agosto", "setembro", "outubro", "novembro", "dezembro",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalQuery {
    Date,
    Year,
}

impl TemporalQuery {
    /// When a text asks both, the year question wins.
    pub fn detect(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        if YEAR_PHRASES.iter().any(|p| lowered.contains(p)) {
            Some(TemporalQuery::Year)
        } else if DATE_PHRASES.iter().any(|p| lowered.contains(p)) {
            Some(TemporalQuery::Date)
        } else {
            None
        }
    }

    pub fn answer<Tz: TimeZone>(&self, now: &DateTime<Tz>, location: &Location) -> String {
        let fact = match self {
            TemporalQuery::Date => format!("Hoje é {}", full_date(now)),
            TemporalQuery::Year => format!("O ano atual é {}", now.year()),
        };
        if location.city_known() {
            format!("{} em {}, {}", fact, location.city, location.country)
        } else {
            fact
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// `sábado, 18 de outubro de 2026`
pub fn full_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!(
        "{}, {} de {} de {}",
        weekday_name(now.weekday()),
        now.day(),
        MONTHS[now.month0() as usize],
        now.year()
    )
}
