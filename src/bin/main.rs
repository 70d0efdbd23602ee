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

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tutorpay_rs::{MemoryStore, PayoutEngine, RequestId, Student, StudentId, Tutor, TutorId};

/// Payout Engine - Replay an operations CSV against tutor wallets
///
/// Reads lifecycle operations from a CSV file and outputs the resulting
/// wallet state of every tutor to stdout. Supports registration, student
/// activation, admin credits, completion payouts, and the withdrawal
/// lifecycle.
#[derive(Parser, Debug)]
#[command(name = "tutorpay-rs")]
#[command(about = "A payout engine that replays lifecycle operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,id,tutor,student,amount,days_ago,reason
    /// Example: cargo run -- operations.csv > wallets.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match process_operations(BufReader::new(file), Utc::now()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_wallets(&engine, Utc::now(), std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, id, tutor, student, amount, days_ago, reason`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    id: Option<String>,
    tutor: Option<String>,
    student: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    days_ago: Option<i64>,
    reason: Option<String>,
}

/// Parsed lifecycle operation.
#[derive(Debug)]
enum Operation {
    /// Register a tutor
    Tutor { tutor: String },
    /// Register a student, optionally assigned, created `days_ago` back
    Student {
        student: String,
        tutor: Option<String>,
        days_ago: i64,
    },
    /// Submit and approve a payment request for a student
    Activate { student: String },
    /// Manual admin credit to a tutor wallet
    Credit {
        tutor: String,
        amount: Decimal,
        reason: String,
    },
    /// Approve the one-time completion payout for a student
    Payout { student: String },
    /// Open a withdrawal request, tracked under a caller-chosen handle
    Withdraw {
        handle: String,
        tutor: String,
        amount: Decimal,
    },
    /// Approve a previously opened withdrawal by handle
    Approve { handle: String },
    /// Reject a previously opened withdrawal by handle
    Reject { handle: String },
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        match self.op.to_lowercase().as_str() {
            "tutor" => Some(Operation::Tutor {
                tutor: self.tutor?,
            }),
            "student" => Some(Operation::Student {
                student: self.student?,
                tutor: self.tutor,
                days_ago: self.days_ago.unwrap_or(0),
            }),
            "activate" => Some(Operation::Activate {
                student: self.student?,
            }),
            "credit" => Some(Operation::Credit {
                tutor: self.tutor?,
                amount: self.amount?,
                reason: self
                    .reason
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "manual_adjustment".to_string()),
            }),
            "payout" => Some(Operation::Payout {
                student: self.student?,
            }),
            "withdraw" => Some(Operation::Withdraw {
                handle: self.id?,
                tutor: self.tutor?,
                amount: self.amount?,
            }),
            "approve" => Some(Operation::Approve { handle: self.id? }),
            "reject" => Some(Operation::Reject { handle: self.id? }),
            _ => None,
        }
    }
}

fn apply(
    engine: &PayoutEngine,
    handles: &mut HashMap<String, RequestId>,
    op: Operation,
    now: DateTime<Utc>,
) -> Result<(), tutorpay_rs::PayoutError> {
    match op {
        Operation::Tutor { tutor } => {
            let email = format!("{tutor}@import.local");
            engine.register_tutor(Tutor::new(TutorId::new(tutor.clone()), tutor, email, "-", now))
        }
        Operation::Student {
            student,
            tutor,
            days_ago,
        } => {
            let email = format!("{student}@import.local");
            let mut doc = Student::new(
                StudentId::new(student.clone()),
                student,
                email,
                "-",
                now - Duration::days(days_ago),
            );
            doc.assigned_tutor_id = tutor.map(TutorId::new);
            engine.register_student(doc)
        }
        Operation::Activate { student } => {
            let student_id = StudentId::new(student);
            let request =
                engine.submit_payment_request(&student_id, "import", "import", "import", now)?;
            engine.approve_payment_request(&request.id, now)
        }
        Operation::Credit {
            tutor,
            amount,
            reason,
        } => engine
            .credit_tutor(&TutorId::new(tutor), amount, &reason, now)
            .map(|_| ()),
        Operation::Payout { student } => engine
            .approve_completion_payout(&StudentId::new(student), now)
            .map(|_| ()),
        Operation::Withdraw {
            handle,
            tutor,
            amount,
        } => {
            let request = engine.request_withdrawal(&TutorId::new(tutor), amount, now)?;
            handles.insert(handle, request.id);
            Ok(())
        }
        Operation::Approve { handle } => {
            let id = handles
                .get(&handle)
                .cloned()
                .ok_or(tutorpay_rs::PayoutError::RequestNotFound)?;
            engine.approve_withdrawal(&id, now).map(|_| ())
        }
        Operation::Reject { handle } => {
            let id = handles
                .get(&handle)
                .cloned()
                .ok_or(tutorpay_rs::PayoutError::RequestNotFound)?;
            engine.reject_withdrawal(&id, now)
        }
    }
}

/// Replay operations from a CSV reader.
///
/// Streaming parse; malformed rows and failed operations are skipped so a
/// partially bad file still yields the wallets the valid rows produce.
///
/// # CSV Format
///
/// Expected columns: `op, id, tutor, student, amount, days_ago, reason`
///
/// ```csv
/// op,id,tutor,student,amount,days_ago,reason
/// tutor,,t1,,,,
/// student,,t1,s1,,31,
/// activate,,,s1,,,
/// payout,,,s1,,,
/// withdraw,w1,t1,,500,,
/// approve,w1,,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
/// Individual operation errors are logged in debug mode but don't stop
/// processing.
pub fn process_operations<R: Read>(
    reader: R,
    now: DateTime<Utc>,
) -> Result<PayoutEngine, csv::Error> {
    let engine = PayoutEngine::new(Arc::new(MemoryStore::new()));
    let mut handles: HashMap<String, RequestId> = HashMap::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                if let Err(_e) = apply(&engine, &mut handles, op, now) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping operation: {}", _e);
                }
            }
            Err(_e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", _e);
                continue;
            }
        }
    }

    Ok(engine)
}

/// Wallet state row written for each tutor.
#[derive(Debug, Serialize)]
struct WalletRow {
    tutor: String,
    admin_added: Decimal,
    pending: Decimal,
    available: Decimal,
    projected: Decimal,
    total: Decimal,
}

/// Write every tutor's wallet state to a CSV writer.
///
/// Columns: `tutor, admin_added, pending, available, projected, total`,
/// in tutor id order.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_wallets<W: Write>(
    engine: &PayoutEngine,
    now: DateTime<Utc>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for tutor in engine.store().tutors() {
        // Tutor existed a moment ago; skip rather than fail if deleted since.
        let Ok(snapshot) = engine.wallet_snapshot(&tutor.id, now) else {
            continue;
        };
        wtr.serialize(WalletRow {
            tutor: tutor.id.to_string(),
            admin_added: snapshot.admin_added,
            pending: snapshot.pending_withdrawals,
            available: snapshot.available,
            projected: snapshot.projected_accrual,
            total: snapshot.display_total,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn wallet(engine: &PayoutEngine, id: &str, now: DateTime<Utc>) -> tutorpay_rs::WalletSnapshot {
        engine.wallet_snapshot(&TutorId::new(id), now).unwrap()
    }

    #[test]
    fn parse_tutor_and_credit() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   credit,,t1,,500,,signup_bonus\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        assert_eq!(wallet(&engine, "t1", now).admin_added, dec!(500));
    }

    #[test]
    fn student_accrues_but_is_not_withdrawable() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   student,,t1,s1,,10,\n\
                   activate,,,s1,,,\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        let w = wallet(&engine, "t1", now);
        assert_eq!(w.projected_accrual, dec!(266.67));
        assert_eq!(w.available, dec!(0));
    }

    #[test]
    fn payout_then_withdrawal_round_trip() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   student,,t1,s1,,31,\n\
                   activate,,,s1,,,\n\
                   payout,,,s1,,,\n\
                   withdraw,w1,t1,,500,,\n\
                   approve,w1,,,,,\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        let w = wallet(&engine, "t1", now);
        assert_eq!(w.admin_added, dec!(300));
        assert_eq!(w.available, dec!(300));
    }

    #[test]
    fn oversize_withdrawal_is_skipped() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   credit,,t1,,100,,manual_adjustment\n\
                   withdraw,w1,t1,,500,,\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        let w = wallet(&engine, "t1", now);
        assert_eq!(w.admin_added, dec!(100));
        assert_eq!(w.pending_withdrawals, dec!(0));
    }

    #[test]
    fn rejected_withdrawal_releases_pending() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   credit,,t1,,1000,,manual_adjustment\n\
                   withdraw,w1,t1,,400,,\n\
                   reject,w1,,,,,\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        let w = wallet(&engine, "t1", now);
        assert_eq!(w.admin_added, dec!(1000));
        assert_eq!(w.pending_withdrawals, dec!(0));
        assert_eq!(w.available, dec!(1000));
    }

    #[test]
    fn parse_with_whitespace() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n tutor ,, t1 ,,,,\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        assert_eq!(engine.store().tutors().len(), 1);
    }

    #[test]
    fn skip_malformed_rows() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   bogus,row,data,here,,,\n\
                   tutor,,t2,,,,\n";
        let now = Utc::now();

        let engine = process_operations(Cursor::new(csv), now).unwrap();

        assert_eq!(engine.store().tutors().len(), 2);
    }

    #[test]
    fn write_wallets_to_csv() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t1,,,,\n\
                   credit,,t1,,250.50,,manual_adjustment\n";
        let now = Utc::now();
        let engine = process_operations(Cursor::new(csv), now).unwrap();

        let mut output = Vec::new();
        write_wallets(&engine, now, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("tutor,admin_added,pending,available,projected,total"));
        assert!(output_str.contains("250.5"));
    }

    #[test]
    fn wallets_are_written_in_tutor_order() {
        let csv = "op,id,tutor,student,amount,days_ago,reason\n\
                   tutor,,t2,,,,\n\
                   tutor,,t1,,,,\n";
        let now = Utc::now();
        let engine = process_operations(Cursor::new(csv), now).unwrap();

        let mut output = Vec::new();
        write_wallets(&engine, now, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let t1 = output_str.find("t1").unwrap();
        let t2 = output_str.find("t2").unwrap();
        assert!(t1 < t2);
    }
}
