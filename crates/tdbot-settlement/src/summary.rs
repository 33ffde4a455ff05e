//! Day-over-day profit summary.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tdbot_core::{Match, Size};

/// Matches settled on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProfit {
    pub date: NaiveDate,
    pub match_count: usize,
    pub matched_quantity: Size,
    pub realized_profit: Decimal,
}

impl DailyProfit {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            match_count: 0,
            matched_quantity: Size::ZERO,
            realized_profit: Decimal::ZERO,
        }
    }
}

/// Group matches by the UTC date of `matched_at`, oldest day first.
pub fn daily_profit<'a>(matches: impl IntoIterator<Item = &'a Match>) -> Vec<DailyProfit> {
    let mut days: BTreeMap<NaiveDate, DailyProfit> = BTreeMap::new();
    for m in matches {
        let date = m.matched_at.date_naive();
        let day = days.entry(date).or_insert_with(|| DailyProfit::empty(date));
        day.match_count += 1;
        day.matched_quantity += m.matched_quantity;
        day.realized_profit += m.profit;
    }
    days.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_groups_by_utc_day() {
        let a = buy("A", dec!(10), dec!(5), 0);
        let b = buy("B", dec!(12), dec!(5), 0);
        let c = sell("C", dec!(14), dec!(8), 1);

        let first = Match::between(&c, &a, Size::new(dec!(5)), at(0));
        let second = Match::between(&c, &b, Size::new(dec!(3)), at(0));
        let next_day = Match::between(&c, &b, Size::new(dec!(1)), at(0) + Duration::days(1));

        // out of order on purpose
        let days = daily_profit([&next_day, &first, &second]);
        assert_eq!(days.len(), 2);

        assert_eq!(days[0].date, at(0).date_naive());
        assert_eq!(days[0].match_count, 2);
        assert_eq!(days[0].matched_quantity, Size::new(dec!(8)));
        assert_eq!(days[0].realized_profit, dec!(26));

        assert_eq!(days[1].match_count, 1);
        assert_eq!(days[1].realized_profit, dec!(2));
    }

    #[test]
    fn test_no_matches_no_days() {
        assert!(daily_profit(std::iter::empty::<&Match>()).is_empty());
    }
}
