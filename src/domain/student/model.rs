use chrono::{DateTime, Duration, NaiveDate, Utc};

/// A student holding a reading-room membership at one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: i32,
    pub branch_id: i32,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub seat_number: Option<String>,
    pub membership_start: NaiveDate,
    pub membership_end: NaiveDate,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// Hosted portrait, set through the photo upload
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Days until the membership ends (negative once expired)
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.membership_end - today).num_days()
    }

    /// Last day that still falls inside the reminder window, `None` when
    /// the window is negative or runs past the calendar.
    pub fn reminder_window_end(today: NaiveDate, days_before: i64) -> Option<NaiveDate> {
        if days_before < 0 {
            return None;
        }
        Duration::try_days(days_before).and_then(|span| today.checked_add_signed(span))
    }
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub branch_id: i32,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub seat_number: Option<String>,
    pub membership_start: NaiveDate,
    pub membership_end: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct StudentChanges {
    pub branch_id: Option<i32>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub seat_number: Option<String>,
    pub membership_start: Option<NaiveDate>,
    /// A new end date re-arms the expiry reminder
    pub membership_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub branch_id: Option<i32>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(end: NaiveDate) -> Student {
        let now = Utc::now();
        Student {
            id: 1,
            branch_id: 1,
            full_name: "Asha Verma".into(),
            email: "asha@example.com".into(),
            phone: None,
            seat_number: Some("A-12".into()),
            membership_start: end - Duration::days(30),
            membership_end: end,
            reminder_sent_at: None,
            photo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn march_10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn days_remaining_goes_negative_after_expiry() {
        let today = march_10();
        assert_eq!(student(today + Duration::days(3)).days_remaining(today), 3);
        assert_eq!(student(today).days_remaining(today), 0);
        assert_eq!(student(today - Duration::days(1)).days_remaining(today), -1);
    }

    #[test]
    fn window_end_counts_whole_days() {
        let today = march_10();
        assert_eq!(Student::reminder_window_end(today, 0), Some(today));
        assert_eq!(
            Student::reminder_window_end(today, 3),
            NaiveDate::from_ymd_opt(2024, 3, 13)
        );
    }

    #[test]
    fn window_end_rejects_unusable_spans() {
        let today = march_10();
        assert_eq!(Student::reminder_window_end(today, -1), None);
        assert_eq!(Student::reminder_window_end(today, i64::MAX), None);
        assert_eq!(Student::reminder_window_end(NaiveDate::MAX, 1), None);
    }
}
