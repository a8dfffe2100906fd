//! Batch processing of fetched emails against a rule set

use crate::engine::assemble;
use crate::message::Message;
use crate::output::output_filename;
use crate::record::Record;
use crate::rule::RuleSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifecycle of a processing job
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Job counters, reported after every email
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub status: JobStatus,
    pub total_emails: usize,
    pub processed_emails: usize,
    pub successful_emails: usize,
    pub failed_emails: usize,
}

impl JobProgress {
    #[must_use]
    pub fn new(total_emails: usize) -> Self {
        Self {
            total_emails,
            ..Self::default()
        }
    }

    /// Count one finished email
    pub const fn record(&mut self, success: bool) {
        self.processed_emails += 1;
        if success {
            self.successful_emails += 1;
        } else {
            self.failed_emails += 1;
        }
    }
}

/// Outcome status of one email
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
}

impl ResultStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Record produced for one email by its matching rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub email_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub rule_name: String,
    pub subject: String,
    pub sender: String,
    pub processed_at: DateTime<Utc>,
    pub extracted_data: Record,
    /// Document name for the renderer, only set on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// What happened to one email
#[derive(Debug, Clone)]
pub enum EmailOutcome {
    /// No active rule pattern occurs in the subject or sender
    NoMatchingRule {
        email_id: String,
        subject: String,
        sender: String,
    },

    /// A rule matched and produced a record, valid or not
    Processed(ProcessingResult),
}

impl EmailOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Processed(ProcessingResult {
                status: ResultStatus::Success,
                ..
            })
        )
    }

    #[must_use]
    pub const fn result(&self) -> Option<&ProcessingResult> {
        match self {
            Self::NoMatchingRule { .. } => None,
            Self::Processed(result) => Some(result),
        }
    }
}

/// Everything a batch run produced
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub progress: JobProgress,
    pub outcomes: Vec<EmailOutcome>,
}

impl BatchReport {
    /// Successful results, in input order
    pub fn successful(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.outcomes
            .iter()
            .filter_map(EmailOutcome::result)
            .filter(|r| r.status == ResultStatus::Success)
    }
}

/// Match, extract and validate a single email
#[must_use]
pub fn process_email(message: &Message, rules: &RuleSet, now: DateTime<Utc>) -> EmailOutcome {
    let headers = message.headers();
    let email_id = message.id.clone().unwrap_or_default();
    let subject = headers.get("Subject").cloned().unwrap_or_default();
    let sender = headers.get("From").cloned().unwrap_or_default();

    let Some(rule) = rules.find_match(&subject, &sender) else {
        debug!("No rule matches email {email_id}");
        return EmailOutcome::NoMatchingRule {
            email_id,
            subject,
            sender,
        };
    };

    let record = assemble(rule, message);
    let missing = record.missing(&rule.required_fields);

    let (status, output_name, error_message) = if missing.is_empty() {
        let name = output_filename(&rule.output_template, &record, now);
        (ResultStatus::Success, Some(name), None)
    } else {
        let message = format!("Missing required fields: {}", missing.join(", "));
        (ResultStatus::Failed, None, Some(message))
    };

    debug!(
        "Email {email_id} processed with rule {}: {}",
        rule.name,
        status.as_str()
    );

    EmailOutcome::Processed(ProcessingResult {
        email_id,
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        subject,
        sender,
        processed_at: now,
        extracted_data: record,
        output_name,
        status,
        error_message,
    })
}

/// Process emails in order, reporting progress after each one.
///
/// The final report carries status [`JobStatus::Completed`]. Counters only
/// ever grow, so callers may forward each snapshot to a shared job store.
pub fn process_batch<F>(
    messages: &[Message],
    rules: &RuleSet,
    now: DateTime<Utc>,
    mut on_progress: F,
) -> BatchReport
where
    F: FnMut(&JobProgress),
{
    let mut progress = JobProgress::new(messages.len());
    progress.status = JobStatus::Processing;
    let mut outcomes = Vec::with_capacity(messages.len());

    for message in messages {
        let outcome = process_email(message, rules, now);
        progress.record(outcome.is_success());
        on_progress(&progress);
        outcomes.push(outcome);
    }

    progress.status = JobStatus::Completed;
    debug!(
        "Batch finished: {} processed, {} successful, {} failed",
        progress.processed_emails, progress.successful_emails, progress.failed_emails
    );

    BatchReport { progress, outcomes }
}
