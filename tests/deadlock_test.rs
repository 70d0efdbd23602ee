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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The engine layers a settlement mutex over per-document map locks and a
//! ledger RwLock; these tests hammer every combination from multiple
//! threads and assert the lock graph never cycles.

use chrono::{Duration, Utc};
use parking_lot::deadlock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration as StdDuration;
use tutorpay_rs::{MemoryStore, PayoutEngine, Student, StudentId, Tutor, TutorId};

/// Spawns the background deadlock checker. Returns a flag that flips if a
/// cycle is ever observed.
fn spawn_detector(stop: Arc<AtomicBool>) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let found = Arc::new(AtomicBool::new(false));
    let found_clone = Arc::clone(&found);
    let handle = thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            thread::sleep(StdDuration::from_millis(50));
            if !deadlock::check_deadlock().is_empty() {
                found_clone.store(true, Ordering::Relaxed);
                return;
            }
        }
    });
    (found, handle)
}

fn seeded_engine(tutors: usize, students_per_tutor: usize) -> Arc<PayoutEngine> {
    let engine = Arc::new(PayoutEngine::new(Arc::new(MemoryStore::new())));
    let now = Utc::now();
    for t in 0..tutors {
        let tid = TutorId::new(format!("t{t}"));
        engine
            .register_tutor(Tutor::new(
                tid.clone(),
                format!("Tutor {t}"),
                format!("t{t}@example.com"),
                "9999999999",
                now,
            ))
            .unwrap();
        engine
            .credit_tutor(&tid, dec!(100000), "manual_adjustment", now)
            .unwrap();
        for s in 0..students_per_tutor {
            let mut student = Student::new(
                StudentId::new(format!("t{t}-s{s}")),
                format!("Student {s}"),
                format!("t{t}-s{s}@example.com"),
                "8888888888",
                now - Duration::days(31 + s as i64),
            );
            student.is_active = true;
            student.assigned_tutor_id = Some(tid.clone());
            engine.register_student(student).unwrap();
        }
    }
    engine
}

#[test]
fn concurrent_settlement_traffic_does_not_deadlock() {
    let stop = Arc::new(AtomicBool::new(false));
    let (found, detector) = spawn_detector(Arc::clone(&stop));

    let engine = seeded_engine(4, 4);
    let now = Utc::now();

    let mut workers = Vec::new();
    for worker in 0..8 {
        let engine = Arc::clone(&engine);
        workers.push(thread::spawn(move || {
            let tid = TutorId::new(format!("t{}", worker % 4));
            for i in 0..50 {
                match i % 4 {
                    0 => {
                        let _ = engine.credit_tutor(&tid, dec!(25), "manual_adjustment", now);
                    }
                    1 => {
                        if let Ok(request) = engine.request_withdrawal(&tid, dec!(10), now) {
                            let _ = engine.approve_withdrawal(&request.id, now);
                        }
                    }
                    2 => {
                        let sid = StudentId::new(format!("t{}-s{}", worker % 4, i % 4));
                        let _ = engine.approve_completion_payout(&sid, now);
                    }
                    _ => {
                        let _ = engine.wallet_snapshot(&tid, now);
                        let _ = engine.store().ledger_for(&tid);
                    }
                }
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    detector.join().unwrap();
    assert!(!found.load(Ordering::Relaxed), "deadlock detected");
}

#[test]
fn subscribers_do_not_block_publishers() {
    let stop = Arc::new(AtomicBool::new(false));
    let (found, detector) = spawn_detector(Arc::clone(&stop));

    let engine = seeded_engine(2, 0);
    let now = Utc::now();
    let tid = TutorId::new("t0");

    // A slow subscriber that never drains must not stall settlement.
    let _idle_rx = engine.store().subscribe(&tid);

    let mut workers = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let tid = tid.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..100 {
                let _ = engine.credit_tutor(&tid, dec!(5), "manual_adjustment", now);
            }
        }));
    }
    // A subscriber churning alongside the publishers.
    {
        let engine = Arc::clone(&engine);
        let tid = tid.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..20 {
                let rx = engine.store().subscribe(&tid);
                while rx.try_recv().is_ok() {}
                drop(rx);
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    detector.join().unwrap();
    assert!(!found.load(Ordering::Relaxed), "deadlock detected");

    let tutor = engine.store().tutor(&tid).unwrap();
    assert_eq!(tutor.admin_added_balance, dec!(100000) + dec!(2000));
}
