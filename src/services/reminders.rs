//! Overdue reminder dispatch.
//!
//! Delivery is best-effort: a failed send is logged and reported, never
//! propagated into circulation state. The sweep is idempotent per calendar
//! day through the `loan_id + day` dedup key, so re-running it cannot
//! double-send.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::{Loan, LoanStatus},
    repository::CirculationStore,
};

/// Notification delivery seam; the engine only knows `send`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// SMTP notifier backed by lettre
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Circula");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;
        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Notification(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))?;

        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host).map_err(|e| {
                AppError::Notification(format!("Failed to create SMTP transport: {}", e))
            })?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        mailer_builder
            .build()
            .send(&email)
            .map_err(|e| AppError::Notification(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Outcome of one reminder attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOutcome {
    Sent,
    /// Dedup key already claimed for this loan today
    AlreadySent,
    /// Borrower has no contact entry
    NoContact,
    /// Delivery failed; logged, circulation state untouched
    Failed,
}

/// Totals for one sweep run, logged by the background task
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SweepReport {
    pub sent: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn CirculationStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn CirculationStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Send one reminder for a loan. Never mutates loan or inventory state.
    pub async fn send_reminder(&self, loan_id: i32) -> AppResult<ReminderOutcome> {
        let now = Utc::now();
        let loan = self.store.get_loan(loan_id).await?;
        if loan.status != LoanStatus::Approved {
            return Err(AppError::Conflict(format!(
                "Loan {} is {}, reminders only apply to approved loans",
                loan_id, loan.status
            )));
        }
        self.dispatch(&loan, now).await
    }

    async fn dispatch(&self, loan: &Loan, now: DateTime<Utc>) -> AppResult<ReminderOutcome> {
        if !self.store.claim_reminder(loan.id, now.date_naive()).await? {
            return Ok(ReminderOutcome::AlreadySent);
        }

        let Some(contact) = self.store.borrower_contact(loan.borrower_id).await? else {
            tracing::warn!(
                "No contact entry for borrower {}, skipping reminder for loan {}",
                loan.borrower_id,
                loan.id
            );
            return Ok(ReminderOutcome::NoContact);
        };

        let book = self.store.get_book(loan.book_id).await?;
        let subject = format!("Library reminder: {}", book.title);
        let due_line = loan
            .due_date
            .map(|d| format!("It was due back on {}.", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        let body = format!(
            "Hello {},\n\n\"{}\" by {} is still checked out to you. {}\n\nPlease return or renew it at your earliest convenience.\n",
            contact.name, book.title, book.author, due_line
        );

        match self.notifier.send(&contact.email, &subject, &body).await {
            Ok(()) => {
                tracing::info!("Reminder sent for loan {} to borrower {}", loan.id, loan.borrower_id);
                Ok(ReminderOutcome::Sent)
            }
            Err(err) => {
                tracing::warn!("Reminder delivery failed for loan {}: {}", loan.id, err);
                Ok(ReminderOutcome::Failed)
            }
        }
    }

    /// One pass over the overdue view. Safe to re-run: already-claimed loans
    /// are skipped, and failures never abort the rest of the batch.
    pub async fn run_sweep(&self) -> AppResult<SweepReport> {
        let now = Utc::now();
        let overdue = self.store.list_overdue(now).await?;
        let mut report = SweepReport::default();

        for loan in &overdue {
            match self.dispatch(loan, now).await {
                Ok(ReminderOutcome::Sent) => report.sent += 1,
                Ok(ReminderOutcome::AlreadySent) => report.skipped += 1,
                Ok(_) => report.failed += 1,
                Err(err) => {
                    tracing::warn!("Reminder sweep error for loan {}: {}", loan.id, err);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Reminder sweep done: {} sent, {} skipped, {} failed ({} overdue)",
            report.sent,
            report.skipped,
            report.failed,
            overdue.len()
        );
        Ok(report)
    }

    /// Periodic sweep loop; cancelled by aborting the spawning task
    pub async fn run_sweep_loop(self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_sweep().await {
                tracing::error!("Reminder sweep failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Book, BorrowerContact};
    use crate::repository::MockCirculationStore;
    use chrono::Duration;
    use mockall::predicate::eq;

    fn overdue_loan(id: i32) -> Loan {
        let now = Utc::now();
        Loan {
            id,
            book_id: 3,
            borrower_id: 12,
            status: LoanStatus::Approved,
            borrowed_at: Some(now - Duration::days(30)),
            due_date: Some(now - Duration::days(9)),
            returned_at: None,
            renewal_count: 0,
            max_renewals: 2,
            fine_amount: None,
            suggested_fine: None,
            return_condition: None,
            return_notes: None,
        }
    }

    fn book() -> Book {
        Book {
            id: 3,
            title: "Baudolino".to_string(),
            author: "Umberto Eco".to_string(),
            isbn: "978-0156029063".to_string(),
            category: None,
            total_quantity: 1,
            available_quantity: 0,
            institution_id: None,
        }
    }

    fn contact() -> BorrowerContact {
        BorrowerContact {
            id: 12,
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
        }
    }

    #[tokio::test]
    async fn second_reminder_same_day_is_skipped() {
        let mut store = MockCirculationStore::new();
        store.expect_get_loan().returning(|id| Ok(overdue_loan(id)));
        store
            .expect_claim_reminder()
            .times(1)
            .returning(|_, _| Ok(false));
        store.expect_borrower_contact().never();

        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));
        let outcome = service.send_reminder(5).await.unwrap();
        assert_eq!(outcome, ReminderOutcome::AlreadySent);
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_propagated() {
        let mut store = MockCirculationStore::new();
        store.expect_get_loan().returning(|id| Ok(overdue_loan(id)));
        store.expect_claim_reminder().returning(|_, _| Ok(true));
        store
            .expect_borrower_contact()
            .with(eq(12))
            .returning(|_| Ok(Some(contact())));
        store.expect_get_book().returning(|_| Ok(book()));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(AppError::Notification("smtp down".to_string())));

        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));
        let outcome = service.send_reminder(5).await.unwrap();
        assert_eq!(outcome, ReminderOutcome::Failed);
    }

    #[tokio::test]
    async fn reminder_for_returned_loan_is_a_conflict() {
        let mut store = MockCirculationStore::new();
        store.expect_get_loan().returning(|id| {
            let mut loan = overdue_loan(id);
            loan.status = LoanStatus::Returned;
            Ok(loan)
        });
        store.expect_claim_reminder().never();

        let notifier = MockNotifier::new();
        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));
        let err = service.send_reminder(5).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn sweep_counts_sent_and_skipped() {
        let mut store = MockCirculationStore::new();
        store
            .expect_list_overdue()
            .returning(|_| Ok(vec![overdue_loan(1), overdue_loan(2)]));
        // Loan 1 claims the key, loan 2 was already reminded today
        store
            .expect_claim_reminder()
            .with(eq(1), mockall::predicate::always())
            .returning(|_, _| Ok(true));
        store
            .expect_claim_reminder()
            .with(eq(2), mockall::predicate::always())
            .returning(|_, _| Ok(false));
        store
            .expect_borrower_contact()
            .returning(|_| Ok(Some(contact())));
        store.expect_get_book().returning(|_| Ok(book()));

        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_, _, _| Ok(()));

        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));
        let report = service.run_sweep().await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }
}
