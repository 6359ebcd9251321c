use std::collections::BTreeMap;

use axum::Extension;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::err::{proceeds, Data, Payload};
use crate::models::Student;
use crate::store::StudentStore;

/// The fee breakdown only tracks the three canonical price points; other
/// fee values still count toward revenue and the average.
const CANONICAL_FEES: [i64; 3] = [1000, 2000, 3000];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentReport {
    pub total_students: usize,
    pub gender_distribution: GenderDistribution,
    pub class_distribution: ClassDistribution,
    pub recent_registrations: RecentRegistrations,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenderDistribution {
    pub male: usize,
    pub female: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDistribution {
    pub physics: usize,
    pub chemistry: usize,
    pub combined_maths: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRegistrations {
    pub this_week: usize,
    pub this_month: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceReport {
    pub total_revenue: i64,
    pub total_students: usize,
    pub month_revenue: i64,
    pub month_students: usize,
    pub average_fee: i64,
    pub fee_distribution: BTreeMap<i64, FeeBucket>,
    pub class_revenue: ClassRevenue,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeBucket {
    pub count: usize,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRevenue {
    pub physics: i64,
    pub chemistry: i64,
    pub combined_maths: i64,
}

fn enrolled_in(student: &Student, tag: &str) -> bool {
    student.classes.iter().any(|class| class == tag)
}

/// Head counts across the whole student set. "This week" is a rolling
/// seven-day window ending at `now`; "this month" starts at the first
/// instant of the current calendar month.
pub fn enrollment_overview(students: &[Student], now: DateTime<Utc>) -> EnrollmentReport {
    let week_ago = now - Duration::days(7);
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);

    let mut report = EnrollmentReport {
        total_students: students.len(),
        gender_distribution: GenderDistribution { male: 0, female: 0 },
        class_distribution: ClassDistribution {
            physics: 0,
            chemistry: 0,
            combined_maths: 0,
        },
        recent_registrations: RecentRegistrations {
            this_week: 0,
            this_month: 0,
        },
    };

    for student in students {
        match student.gender.as_str() {
            "male" => report.gender_distribution.male += 1,
            "female" => report.gender_distribution.female += 1,
            _ => {}
        }
        if enrolled_in(student, "physics") {
            report.class_distribution.physics += 1;
        }
        if enrolled_in(student, "chemistry") {
            report.class_distribution.chemistry += 1;
        }
        if enrolled_in(student, "combined-maths") {
            report.class_distribution.combined_maths += 1;
        }
        if student.created_at >= week_ago {
            report.recent_registrations.this_week += 1;
        }
        if student.created_at >= month_start {
            report.recent_registrations.this_month += 1;
        }
    }

    report
}

/// Revenue totals and breakdowns. Each student's fee is split evenly
/// across their classes for the per-class buckets, and each bucket is
/// rounded once at the end.
pub fn finance_overview(students: &[Student], now: DateTime<Utc>) -> FinanceReport {
    let total_revenue: i64 = students.iter().map(|s| s.registration_fee).sum();

    let month_prefix = now.format("%Y-%m").to_string();
    let mut month_students = 0;
    let mut month_revenue = 0;
    for student in students {
        if student.register_date.starts_with(&month_prefix) {
            month_students += 1;
            month_revenue += student.registration_fee;
        }
    }

    let average_fee = if students.is_empty() {
        0
    } else {
        total_revenue / students.len() as i64
    };

    let mut fee_distribution: BTreeMap<i64, FeeBucket> = CANONICAL_FEES
        .iter()
        .map(|&fee| (fee, FeeBucket { count: 0, total: 0 }))
        .collect();
    for student in students {
        if let Some(bucket) = fee_distribution.get_mut(&student.registration_fee) {
            bucket.count += 1;
            bucket.total += student.registration_fee;
        }
    }

    let mut physics = 0f64;
    let mut chemistry = 0f64;
    let mut combined_maths = 0f64;
    for student in students {
        if student.classes.is_empty() {
            continue;
        }
        let per_class = student.registration_fee as f64 / student.classes.len() as f64;
        if enrolled_in(student, "physics") {
            physics += per_class;
        }
        if enrolled_in(student, "chemistry") {
            chemistry += per_class;
        }
        if enrolled_in(student, "combined-maths") {
            combined_maths += per_class;
        }
    }

    FinanceReport {
        total_revenue,
        total_students: students.len(),
        month_revenue,
        month_students,
        average_fee,
        fee_distribution,
        class_revenue: ClassRevenue {
            physics: physics.round() as i64,
            chemistry: chemistry.round() as i64,
            combined_maths: combined_maths.round() as i64,
        },
    }
}

pub async fn overview(Extension(pg): Extension<PgPool>) -> Payload<Data<EnrollmentReport>> {
    let students = pg.all_students().await?;
    proceeds(Data {
        data: enrollment_overview(&students, Utc::now()),
    })
}

pub async fn finance(Extension(pg): Extension<PgPool>) -> Payload<Data<FinanceReport>> {
    let students = pg.all_students().await?;
    proceeds(Data {
        data: finance_overview(&students, Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn student(
        fee: i64,
        classes: &[&str],
        gender: &str,
        register_date: &str,
        created_at: DateTime<Utc>,
    ) -> Student {
        Student {
            id: Uuid::new_v4(),
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            email: format!("{}@example.com", Uuid::new_v4()),
            mobile: "0771234567".to_string(),
            gender: gender.to_string(),
            address: "12 Lake Rd".to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            register_date: register_date.to_string(),
            registration_fee: fee,
            registration_type: None,
            status: None,
            payment_receipt: None,
            payment_receipt_name: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn finance_totals_for_three_students() {
        let now = at(2026, 3, 15);
        let students = vec![
            student(1000, &["physics"], "male", "2026-03-02", now),
            student(1000, &["chemistry"], "female", "2026-03-05", now),
            student(2000, &["physics"], "male", "2026-02-20", now),
        ];
        let report = finance_overview(&students, now);

        assert_eq!(report.total_revenue, 4000);
        assert_eq!(report.average_fee, 1333);
        assert_eq!(report.month_revenue, 2000);
        assert_eq!(report.month_students, 2);
        assert_eq!(report.fee_distribution[&1000].count, 2);
        assert_eq!(report.fee_distribution[&1000].total, 2000);
        assert_eq!(report.fee_distribution[&2000].count, 1);
        assert_eq!(report.fee_distribution[&2000].total, 2000);
        assert_eq!(report.fee_distribution[&3000].count, 0);
        assert_eq!(report.fee_distribution[&3000].total, 0);
    }

    #[test]
    fn class_revenue_splits_the_fee_evenly() {
        let now = at(2026, 3, 15);
        let students = vec![student(
            3000,
            &["physics", "chemistry"],
            "male",
            "2026-03-02",
            now,
        )];
        let report = finance_overview(&students, now);

        assert_eq!(report.class_revenue.physics, 1500);
        assert_eq!(report.class_revenue.chemistry, 1500);
        assert_eq!(report.class_revenue.combined_maths, 0);
    }

    #[test]
    fn class_revenue_rounds_once_at_the_end() {
        let now = at(2026, 3, 15);
        // Each contributes 1000/3 = 333.33..; summed first, then rounded.
        let students = vec![
            student(
                1000,
                &["physics", "chemistry", "combined-maths"],
                "male",
                "2026-03-02",
                now,
            ),
            student(
                1000,
                &["physics", "chemistry", "combined-maths"],
                "female",
                "2026-03-03",
                now,
            ),
        ];
        let report = finance_overview(&students, now);
        assert_eq!(report.class_revenue.physics, 667);
    }

    #[test]
    fn empty_set_yields_a_zero_report() {
        let report = finance_overview(&[], at(2026, 3, 15));
        assert_eq!(report.total_revenue, 0);
        assert_eq!(report.average_fee, 0);
        assert_eq!(report.total_students, 0);
    }

    #[test]
    fn non_canonical_fees_stay_out_of_the_distribution() {
        let now = at(2026, 3, 15);
        let students = vec![student(1500, &["physics"], "male", "2026-03-02", now)];
        let report = finance_overview(&students, now);
        assert_eq!(report.total_revenue, 1500);
        assert_eq!(report.average_fee, 1500);
        assert!(report.fee_distribution.values().all(|b| b.count == 0));
    }

    #[test]
    fn enrollment_counts_genders_and_class_membership() {
        let now = at(2026, 3, 15);
        let students = vec![
            student(1000, &["physics", "chemistry"], "male", "2026-03-02", now),
            student(1000, &["chemistry"], "female", "2026-03-05", now),
            student(1000, &["combined-maths"], "other", "2026-03-07", now),
        ];
        let report = enrollment_overview(&students, now);

        assert_eq!(report.total_students, 3);
        assert_eq!(report.gender_distribution.male, 1);
        assert_eq!(report.gender_distribution.female, 1);
        assert_eq!(report.class_distribution.physics, 1);
        assert_eq!(report.class_distribution.chemistry, 2);
        assert_eq!(report.class_distribution.combined_maths, 1);
    }

    #[test]
    fn the_week_window_rolls_across_a_month_boundary() {
        // Early in the month: a record created at the end of February is
        // still inside the seven-day window.
        let now = at(2026, 3, 5);
        let students = vec![
            student(1000, &["physics"], "male", "2026-02-28", at(2026, 2, 28)),
            student(1000, &["physics"], "male", "2026-01-10", at(2026, 1, 10)),
        ];
        let report = enrollment_overview(&students, now);
        assert_eq!(report.recent_registrations.this_week, 1);
        assert_eq!(report.recent_registrations.this_month, 0);
    }

    #[test]
    fn the_month_window_starts_on_the_first() {
        let now = at(2026, 3, 20);
        let students = vec![
            student(1000, &["physics"], "male", "2026-03-01", at(2026, 3, 1)),
            student(1000, &["physics"], "male", "2026-02-27", at(2026, 2, 27)),
        ];
        let report = enrollment_overview(&students, now);
        assert_eq!(report.recent_registrations.this_month, 1);
        assert_eq!(report.recent_registrations.this_week, 0);
    }
}
