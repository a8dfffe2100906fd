use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeZone, Utc};
use email_rule_engine::{
    EmailOutcome, JobProgress, JobStatus, Message, ResultStatus, RuleSet, UNKNOWN, process_batch,
    process_email,
};
use serde_json::json;

fn message(id: &str, subject: &str, html: &str) -> Message {
    serde_json::from_value(json!({
        "id": id,
        "payload": {
            "mimeType": "text/html",
            "headers": [
                {"name": "Subject", "value": subject},
                {"name": "From", "value": "receipts@shop.example"}
            ],
            "body": {"data": STANDARD.encode(html)}
        }
    }))
    .unwrap()
}

fn rules() -> RuleSet {
    serde_json::from_value(json!([{
        "id": "r1",
        "name": "Shop receipt",
        "pattern": "Receipt",
        "fields": [
            {"name": "order", "source": "html", "selector": ".order", "process": "extract_text"},
            {"name": "amount", "source": "html", "selector": ".total", "process": "extract_text"}
        ],
        "outputTemplate": "shop_{order}",
        "requiredFields": ["amount"]
    }]))
    .unwrap()
}

#[test]
fn test_process_email_success() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let msg = message("m1", "Receipt #1", r#"<p class="order">A1</p><p class="total">$5</p>"#);

    let outcome = process_email(&msg, &rules(), now);
    assert!(outcome.is_success());

    let result = outcome.result().unwrap();
    assert_eq!(result.email_id, "m1");
    assert_eq!(result.rule_id.as_deref(), Some("r1"));
    assert_eq!(result.sender, "receipts@shop.example");
    assert_eq!(result.output_name.as_deref(), Some("shop_A1.pdf"));
    assert_eq!(result.extracted_data.text("amount"), Some("$5"));
    assert!(result.error_message.is_none());
}

#[test]
fn test_process_email_missing_required_field() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let msg = message("m2", "Receipt #2", r#"<p class="order">A2</p>"#);

    let outcome = process_email(&msg, &rules(), now);
    assert!(!outcome.is_success());

    let result = outcome.result().unwrap();
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(result.error_message.as_deref(), Some("Missing required fields: amount"));
    assert!(result.output_name.is_none());
    assert_eq!(result.extracted_data.text("amount"), Some(UNKNOWN));
}

#[test]
fn test_process_email_without_matching_rule() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let msg = message("m3", "Newsletter", "<p>hi</p>");

    let outcome = process_email(&msg, &rules(), now);
    assert!(matches!(outcome, EmailOutcome::NoMatchingRule { ref email_id, .. } if email_id == "m3"));
    assert!(outcome.result().is_none());
}

#[test]
fn test_process_batch_counts_and_progress() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let messages = vec![
        message("m1", "Receipt #1", r#"<p class="order">A1</p><p class="total">$5</p>"#),
        message("m2", "Receipt #2", r#"<p class="order">A2</p>"#),
        message("m3", "Newsletter", "<p>hi</p>"),
        message("m4", "Receipt #4", r#"<p class="total">$7</p>"#),
    ];

    let mut snapshots = Vec::new();
    let report = process_batch(&messages, &rules(), now, |p| snapshots.push(*p));

    assert_eq!(snapshots.len(), 4);
    assert!(snapshots.windows(2).all(|w| w[0].processed_emails < w[1].processed_emails));
    assert!(snapshots.iter().all(|p| p.status == JobStatus::Processing));

    let progress = report.progress;
    assert_eq!(progress.status, JobStatus::Completed);
    assert_eq!(progress.total_emails, 4);
    assert_eq!(progress.processed_emails, 4);
    assert_eq!(progress.successful_emails, 2);
    assert_eq!(progress.failed_emails, 2);

    let ids: Vec<&str> = report.successful().map(|r| r.email_id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m4"]);

    // m4 has no order number, so the sentinel lands in its name
    let names: Vec<_> = report.successful().filter_map(|r| r.output_name.clone()).collect();
    assert_eq!(names, vec!["shop_A1.pdf", "shop_Unknown.pdf"]);
}

#[test]
fn test_progress_serializes_camel_case() {
    let mut progress = JobProgress::new(2);
    progress.record(true);
    assert_eq!(
        serde_json::to_value(progress).unwrap(),
        json!({
            "status": "pending",
            "totalEmails": 2,
            "processedEmails": 1,
            "successfulEmails": 1,
            "failedEmails": 0
        })
    );
}

#[test]
fn test_builtin_uber_rule_end_to_end() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let html = r#"
        <div class="receipt">
          <p class="trip-date">Mar 1, 2025</p>
          <p class="total-amount">$23.10</p>
          <p class="pickup-address">1 Market St</p>
        </div>
    "#;
    let msg = message("u1", "Your Uber receipt for Saturday", html);

    let rules = RuleSet::builtin();
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().all(|rule| rule.lint().is_empty()));

    let outcome = process_email(&msg, &rules, now);
    assert!(outcome.is_success());

    let result = outcome.result().unwrap();
    assert_eq!(result.rule_name, "Uber Receipts");
    assert_eq!(result.extracted_data.text("trip_date"), Some("Mar 1, 2025"));
    assert_eq!(result.extracted_data.text("amount"), Some("$23.10"));
    assert_eq!(result.extracted_data.text("pickup_location"), Some("1 Market St"));
    assert_eq!(result.extracted_data.text("dropoff_location"), Some(UNKNOWN));
    assert_eq!(
        result.output_name.as_deref(),
        Some("uber_Mar_1__2025__23.10.pdf")
    );
}

#[test]
fn test_builtin_uber_eats_rule_requires_total() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let msg = message(
        "e1",
        "Your Uber Eats order with Pizza Place",
        r#"<p class="order-date">Mar 1</p><p class="restaurant-name">Pizza Place</p>"#,
    );

    let outcome = process_email(&msg, &RuleSet::builtin(), now);
    let result = outcome.result().unwrap();
    assert_eq!(result.rule_name, "Uber Eats");
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Missing required fields: total_amount")
    );
}
