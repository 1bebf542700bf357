//! Reminder run and its periodic background task

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::mailer::{EmailMessage, Mailer};
use crate::config::ReminderConfig;
use crate::domain::{DomainError, DomainResult, RepositoryProvider, Student};
use crate::shared::ShutdownSignal;

/// Outcome of one reminder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderRun {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderService {
    repos: Arc<dyn RepositoryProvider>,
    mailer: Arc<dyn Mailer>,
    config: ReminderConfig,
    // Scheduled and manual runs must not interleave
    run_lock: Mutex<()>,
}

impl ReminderService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        mailer: Arc<dyn Mailer>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            repos,
            mailer,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Send one reminder to every student whose membership ends within
    /// `days_before` days of `today` and who has not been reminded yet.
    pub async fn run_once(&self, today: NaiveDate) -> DomainResult<ReminderRun> {
        let _guard = self.run_lock.lock().await;

        let until = Student::reminder_window_end(today, self.config.days_before).ok_or_else(|| {
            DomainError::Validation(format!(
                "reminder window of {} days is out of range",
                self.config.days_before
            ))
        })?;
        let students = self.repos.students().find_expiring(today, until).await?;

        let mut run = ReminderRun {
            candidates: students.len(),
            ..Default::default()
        };
        if students.is_empty() {
            debug!(%today, %until, "No memberships expiring");
            return Ok(run);
        }

        info!(count = students.len(), %until, "Sending membership reminders");

        for student in students {
            let branch_name = match self.repos.branches().find_by_id(student.branch_id).await {
                Ok(Some(branch)) => branch.name,
                Ok(None) => "your branch".to_string(),
                Err(e) => {
                    warn!(student_id = student.id, error = %e, "Branch lookup failed");
                    "your branch".to_string()
                }
            };

            let message = self.render(&student, &branch_name, today);
            if let Err(e) = self.mailer.send(&message).await {
                warn!(student_id = student.id, error = %e, "Failed to send reminder");
                run.failed += 1;
                continue;
            }

            match self.repos.students().mark_reminded(student.id, Utc::now()).await {
                Ok(()) => run.sent += 1,
                Err(e) => {
                    warn!(student_id = student.id, error = %e, "Failed to record reminder");
                    run.failed += 1;
                }
            }
        }

        metrics::counter!("reminders_sent_total").increment(run.sent as u64);
        info!(sent = run.sent, failed = run.failed, "Reminder run finished");
        Ok(run)
    }

    fn render(&self, student: &Student, branch_name: &str, today: NaiveDate) -> EmailMessage {
        let days = student.days_remaining(today);
        let when = match days {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {} days", n),
        };

        EmailMessage {
            from: self.config.from_address.clone(),
            to: student.email.clone(),
            subject: format!("Your {} membership ends {}", branch_name, when),
            body: format!(
                "Hello {},\n\nYour reading-room membership at {}{} ends on {}.\n\
                 Please renew at the front desk to keep your seat.\n",
                student.full_name,
                branch_name,
                student
                    .seat_number
                    .as_deref()
                    .map(|seat| format!(" (seat {})", seat))
                    .unwrap_or_default(),
                student.membership_end.format("%d %b %Y"),
            ),
        }
    }
}

/// Start the reminder background task.
pub fn start_reminder_task(
    service: Arc<ReminderService>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "📅 Reminder task started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = service.run_once(Utc::now().date_naive()).await {
                        warn!(error = %e, "Reminder run error");
                    }
                }
                _ = shutdown.wait() => {
                    info!("📅 Reminder task shutting down");
                    break;
                }
            }
        }

        info!("📅 Reminder task stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reminders::mailer::MailError;
    use crate::domain::{BranchRepository, NewBranch, NewStudent, StudentRepository};
    use crate::infrastructure::database::test_support::migrated_db;
    use crate::infrastructure::SeaOrmRepositoryProvider;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: StdMutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
            if message.to.starts_with("bounce") {
                return Err(MailError::Delivery("mailbox full".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    async fn setup(
        students: &[(&str, i64)],
    ) -> (Arc<SeaOrmRepositoryProvider>, Arc<RecordingMailer>, ReminderService) {
        let repos = Arc::new(SeaOrmRepositoryProvider::new(migrated_db().await));
        let branch = repos
            .branches()
            .create(NewBranch {
                name: "Central".into(),
                address: None,
                phone: None,
            })
            .await
            .unwrap();

        for (name, offset) in students {
            let end = today() + ChronoDuration::days(*offset);
            repos
                .students()
                .create(NewStudent {
                    branch_id: branch.id,
                    full_name: name.to_string(),
                    email: format!("{}@example.com", name),
                    phone: None,
                    seat_number: Some("A-1".into()),
                    membership_start: end - ChronoDuration::days(30),
                    membership_end: end,
                })
                .await
                .unwrap();
        }

        let mailer = Arc::new(RecordingMailer::default());
        let service = ReminderService::new(
            repos.clone(),
            mailer.clone(),
            ReminderConfig {
                days_before: 3,
                ..Default::default()
            },
        );
        (repos, mailer, service)
    }

    #[tokio::test]
    async fn sends_once_per_expiring_student() {
        let (_repos, mailer, service) =
            setup(&[("asha", 0), ("bina", 3), ("chetan", 4), ("dev", -2)]).await;

        let first = service.run_once(today()).await.unwrap();
        assert_eq!(first.sent, 2);
        assert_eq!(first.failed, 0);

        let second = service.run_once(today()).await.unwrap();
        assert_eq!(second, ReminderRun::default());

        let sent = mailer.sent.lock().unwrap();
        let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(recipients, vec!["asha@example.com", "bina@example.com"]);
        assert!(sent[0].subject.contains("today"));
        assert!(sent[0].body.contains("Central"));
    }

    #[tokio::test]
    async fn out_of_range_window_is_a_validation_error() {
        let (repos, mailer, _) = setup(&[("asha", 0)]).await;
        let service = ReminderService::new(
            repos,
            mailer.clone(),
            ReminderConfig {
                days_before: i64::MAX,
                ..Default::default()
            },
        );

        let err = service.run_once(today()).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let (repos, mailer, service) = setup(&[("bounce", 1), ("bina", 2)]).await;

        let run = service.run_once(today()).await.unwrap();
        assert_eq!(run.sent, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        // The failed student stays eligible for the next run
        let pending = repos
            .students()
            .find_expiring(today(), today() + ChronoDuration::days(3))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].full_name, "bounce");
    }
}
