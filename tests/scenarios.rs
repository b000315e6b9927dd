use anyhow::Context;
use contest_participation::error::ParticipationError;
use contest_participation::mail::{MailNotifier, NotifyError, NullNotifier};
use contest_participation::participation::{ParticipationForm, SatisfactionForm, Status};
use contest_participation::service::ParticipationService;
use contest_participation::store::SledStore;
use sled::open;
use std::collections::HashMap;
use std::sync::Arc;

use tempfile::tempdir; // Use for test db cleanup.

type Service<N> = ParticipationService<SledStore, N>;

fn service_in<N: MailNotifier>(
    dir: &tempfile::TempDir,
    name: &str,
    notifier: N,
) -> anyhow::Result<Service<N>> {
    let db = open(dir.path().join(name))?;
    let db = Arc::new(db);

    // reset the db for each test run
    db.clear()?;

    Ok(ParticipationService::new(
        Arc::new(SledStore::new(db)),
        notifier,
    ))
}

fn participation_form(email: &str, street: &str, city: &str, post_code: u32) -> ParticipationForm {
    ParticipationForm::new()
        .set_first_name("Alice")
        .set_last_name("Smith")
        .set_email(email)
        .set_product_type("Insecticide")
        .set_street(street)
        .set_city(city)
        .set_post_code(post_code)
        .set_accept_newsletter(true)
        .set_accept_exposure(true)
}

#[test]
fn submit_validate_and_report() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. As is good practice in testing create separate
    // databases for each test. The db is created on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let service = service_in(&temp_dir, "submit_validate_and_report.db", NullNotifier)?;

    let saved = service
        .create(&participation_form("a@x.com", "Rue X", "Liège", 4000))
        .context("first submission should pass the duplicate guard")?;

    assert!(saved.id > 0);
    assert_eq!(saved.status, Status::Pending);
    assert!(saved.status_update_date.is_none());

    // same email up to case and whitespace: the guard must refuse it
    let err = service
        .create(&participation_form(" A@X.com ", "Avenue Y", "Namur", 5000))
        .unwrap_err();
    match err.downcast_ref::<ParticipationError>() {
        Some(ParticipationError::Duplicate(msg)) => {
            assert_eq!(msg, "email already used for a participation")
        }
        other => panic!("expected a duplicate email refusal, got {other:?}"),
    }

    let validated = service.validate(saved.id)?;
    assert_eq!(validated.status, Status::Validated);
    assert!(validated.status_update_date.is_some());

    let provinces = service.count_by_province()?;
    assert!(provinces.contains(&("Liège".to_string(), 1)));

    Ok(())
}

#[test]
fn same_household_is_refused() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. As is good practice in testing create separate
    // databases for each test. The db is created on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let service = service_in(&temp_dir, "same_household_is_refused.db", NullNotifier)?;

    service
        .create(&participation_form(
            "first@x.com",
            " rue du Paradis ",
            "Liège",
            4000,
        ))
        .context("first submission should pass the duplicate guard")?;

    // different email, same address up to punctuation and case
    let err = service
        .create(&participation_form(
            "second@x.com",
            "_Rue du Paradis?",
            "LIÈGE",
            4000,
        ))
        .unwrap_err();
    match err.downcast_ref::<ParticipationError>() {
        Some(ParticipationError::Duplicate(msg)) => {
            assert_eq!(msg, "address already used for a participation")
        }
        other => panic!("expected a duplicate address refusal, got {other:?}"),
    }

    assert_eq!(service.count_participation()?, 1);

    Ok(())
}

#[test]
fn photo_and_satisfaction_follow_up() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. As is good practice in testing create separate
    // databases for each test. The db is created on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let service = service_in(&temp_dir, "photo_and_satisfaction.db", NullNotifier)?;

    let saved = service.create(&participation_form("a@x.com", "Rue X", "Liège", 4000))?;

    let with_photo = service.add_photo(
        saved.id,
        "device.jpg",
        "image/jpeg",
        &[0xff_u8, 0xd8, 0xff][..],
    )?;
    assert_eq!(with_photo.picture_name.as_deref(), Some("device.jpg"));
    assert_eq!(with_photo.picture_type.as_deref(), Some("image/jpeg"));
    assert_eq!(with_photo.photo.as_deref(), Some(&[0xff_u8, 0xd8, 0xff][..]));

    let rated = service.add_satisfaction(
        &SatisfactionForm::new(saved.id, 3).with_comment("C'était trop long"),
    )?;
    assert_eq!(rated.satisfaction, Some(3));
    assert_eq!(rated.satisfaction_comment.as_deref(), Some("C'était trop long"));

    // a follow-up without a comment keeps the stored one
    let rated_again = service.add_satisfaction(&SatisfactionForm::new(saved.id, 1))?;
    assert_eq!(rated_again.satisfaction, Some(1));
    assert_eq!(
        rated_again.satisfaction_comment.as_deref(),
        Some("C'était trop long")
    );

    Ok(())
}

#[test]
fn transitions_have_no_ordering_guard() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. As is good practice in testing create separate
    // databases for each test. The db is created on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let service = service_in(&temp_dir, "transitions_no_guard.db", NullNotifier)?;

    let saved = service.create(&participation_form("a@x.com", "Rue X", "Liège", 4000))?;

    let shipped = service.ship(saved.id)?;
    assert_eq!(shipped.status, Status::Shipped);
    let first_stamp = shipped
        .status_update_date
        .expect("transition must stamp the update time")
        .to_datetime_utc();

    // shipping first does not block a later deny, the last transition wins
    let denied = service.deny(saved.id)?;
    assert_eq!(denied.status, Status::Denied);
    let second_stamp = denied
        .status_update_date
        .expect("transition must stamp the update time")
        .to_datetime_utc();
    assert!(second_stamp >= first_stamp);

    assert_eq!(service.find_by_id(saved.id)?.status, Status::Denied);

    Ok(())
}

struct UnreachableMailServer;

impl MailNotifier for UnreachableMailServer {
    fn send_notification(
        &self,
        _recipient: &str,
        _template: &str,
        _variables: &HashMap<String, String>,
    ) -> Result<(), NotifyError> {
        Err(NotifyError("connection refused".into()))
    }
}

#[test]
fn mail_failure_does_not_undo_creation() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. As is good practice in testing create separate
    // databases for each test. The db is created on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let service = service_in(&temp_dir, "mail_failure.db", UnreachableMailServer)?;

    let saved = service
        .create(&participation_form("a@x.com", "Rue X", "Liège", 4000))
        .context("creation must survive a failed notification")?;

    let found = service.find_by_email("a@x.com")?;
    assert_eq!(found.map(|p| p.id), Some(saved.id));

    Ok(())
}
