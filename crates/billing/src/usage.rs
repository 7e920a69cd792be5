use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::LimitKey;

/// Current consumption of each plan-limited resource.
///
/// Computed from the datastore on demand; never incremented in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounts {
    pub alunos_ano: u32,
    pub cursos: u32,
    pub instrutores: u32,
}

impl UsageCounts {
    pub fn get(&self, key: LimitKey) -> u32 {
        match key {
            LimitKey::AlunosAno => self.alunos_ano,
            LimitKey::Cursos => self.cursos,
            LimitKey::Instrutores => self.instrutores,
        }
    }
}

/// Number of timestamps at or after `anchor`.
///
/// This is the `alunosAno` counter: students created since the reset anchor.
/// The anchor is only moved by subscription creation or trial start, so the
/// window is "since last reset" rather than a rolling year.
pub fn count_since<I>(anchor: DateTime<Utc>, created: I) -> u32
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let n = created.into_iter().filter(|c| *c >= anchor).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn count_since_includes_the_anchor_instant() {
        let anchor = Utc::now();
        let dates = [
            anchor - Duration::days(400),
            anchor - Duration::seconds(1),
            anchor,
            anchor + Duration::days(2),
        ];
        assert_eq!(count_since(anchor, dates), 2);
    }

    #[test]
    fn anchor_does_not_roll_over_after_a_year() {
        let anchor = Utc::now() - Duration::days(800);
        let dates = [anchor + Duration::days(10), anchor + Duration::days(500)];
        assert_eq!(count_since(anchor, dates), 2);
    }
}
