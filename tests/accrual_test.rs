// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The tutorpay-rs Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Accrual public API integration tests.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tutorpay_rs::accrual::{
    accrual_projection, available_balance, completion_pending_total, daily_accrual, days_active,
    eligible_for_completion,
};
use tutorpay_rs::{Student, StudentId, Tutor, TutorId, WalletSnapshot};

const PAYOUT: Decimal = dec!(800);

fn active_student(id: &str, days_ago: i64, now: DateTime<Utc>) -> Student {
    let mut s = Student::new(
        StudentId::new(id),
        format!("Student {id}"),
        format!("{id}@example.com"),
        "8888888888",
        now - Duration::days(days_ago),
    );
    s.is_active = true;
    s
}

#[test]
fn days_active_counts_whole_days() {
    let now = Utc::now();
    let s = active_student("s1", 0, now);
    assert_eq!(days_active(&s, now), 0);
    assert_eq!(days_active(&s, now + Duration::hours(23)), 0);
    assert_eq!(days_active(&s, now + Duration::hours(25)), 1);
}

#[test]
fn accrual_table_matches_daily_rate() {
    let now = Utc::now();
    for (days, expected) in [
        (1, dec!(26.67)),
        (10, dec!(266.67)),
        (15, dec!(400.00)),
        (29, dec!(773.33)),
    ] {
        let s = active_student("s1", days, now);
        assert_eq!(
            accrual_projection([&s], PAYOUT, now),
            expected,
            "day {days}"
        );
    }
}

#[test]
fn projection_is_zero_for_inactive_cleared_or_unstarted() {
    let now = Utc::now();

    let mut inactive = active_student("s1", 10, now);
    inactive.is_active = false;
    assert_eq!(daily_accrual(&inactive, PAYOUT, now), Decimal::ZERO);

    let mut cleared = active_student("s2", 10, now);
    cleared.payout_cleared = true;
    assert_eq!(daily_accrual(&cleared, PAYOUT, now), Decimal::ZERO);

    let day_zero = active_student("s3", 0, now);
    assert_eq!(daily_accrual(&day_zero, PAYOUT, now), Decimal::ZERO);
}

#[test]
fn completion_pending_is_separate_from_projection() {
    let now = Utc::now();
    let accruing = active_student("s1", 12, now);
    let matured = active_student("s2", 35, now);
    let roster = [&accruing, &matured];

    assert_eq!(accrual_projection(roster, PAYOUT, now), dec!(320));
    assert_eq!(completion_pending_total(roster, PAYOUT, now), dec!(800));
    assert!(eligible_for_completion(&matured, now));
    assert!(!eligible_for_completion(&accruing, now));
}

#[test]
fn mixed_roster_aggregates_then_rounds_once() {
    let now = Utc::now();
    // 7 + 11 + 13 days at 800/30 each: 826.666..., one half-up round.
    let roster: Vec<Student> = [7, 11, 13]
        .iter()
        .enumerate()
        .map(|(i, days)| active_student(&format!("s{i}"), *days, now))
        .collect();
    assert_eq!(
        accrual_projection(roster.iter(), PAYOUT, now),
        dec!(826.67)
    );
}

#[test]
fn available_balance_clamps_and_rounds() {
    assert_eq!(available_balance(dec!(1000), dec!(400)), dec!(600));
    assert_eq!(available_balance(dec!(100), dec!(400)), Decimal::ZERO);
    assert_eq!(available_balance(dec!(100.005), dec!(0)), dec!(100.01));
}

#[test]
fn snapshot_separates_all_four_figures() {
    let now = Utc::now();
    let mut tutor = Tutor::new(
        TutorId::new("t1"),
        "Asha",
        "asha@example.com",
        "9999999999",
        now,
    );
    tutor.admin_added_balance = dec!(1000);

    let roster = vec![
        active_student("s1", 10, now),
        active_student("s2", 40, now),
    ];

    let snap = WalletSnapshot::compute(&tutor, &roster, dec!(400), PAYOUT, now);
    assert_eq!(snap.admin_added, dec!(1000));
    assert_eq!(snap.pending_withdrawals, dec!(400));
    assert_eq!(snap.available, dec!(600));
    assert_eq!(snap.projected_accrual, dec!(266.67));
    assert_eq!(snap.completion_pending, dec!(800));
    // Headline adds the projection to available, never the pending payout.
    assert_eq!(snap.display_total, dec!(866.67));
}
