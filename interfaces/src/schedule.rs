use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::defs::{CategoryId, Subscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailFrequency {
    Daily,
    Biweekly,
    Weekly,
}

const EVERY_DAY: &[Weekday] = &[
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

impl EmailFrequency {
    /// Weekdays on which a subscriber with this frequency receives a digest.
    pub fn send_days(self) -> &'static [Weekday] {
        match self {
            EmailFrequency::Daily => EVERY_DAY,
            EmailFrequency::Biweekly => &[Weekday::Sun, Weekday::Wed],
            EmailFrequency::Weekly => &[Weekday::Sun],
        }
    }

    pub fn is_due_on(self, day: Weekday) -> bool {
        self.send_days().contains(&day)
    }
}

/// Subscribers whose frequency makes them due on `day`, in input order.
pub fn due_subscribers(subscribers: Vec<Subscriber>, day: Weekday) -> Vec<Subscriber> {
    subscribers
        .into_iter()
        .filter(|s| s.frequency.is_due_on(day))
        .collect()
}

/// Every distinct category any subscriber is interested in, in first-seen order.
pub fn category_set(subscribers: &[Subscriber]) -> Vec<CategoryId> {
    let mut seen = std::collections::HashSet::new();
    subscribers
        .iter()
        .flat_map(|s| s.categories.iter())
        .filter(|c| seen.insert((*c).clone()))
        .cloned()
        .collect()
}
