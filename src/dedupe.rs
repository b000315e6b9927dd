//! Duplicate guard: one participation per person and per household.
//!
//! Comparison happens on canonicalized strings, never on the stored values:
//! emails fold case and surrounding whitespace, addresses additionally drop
//! every character outside [a-z0-9] so that punctuation and spacing
//! variations of the same street collide.
use crate::error::ParticipationError;
use crate::participation::{Address, Participation};
use crate::store::ParticipationStore;

/// Canonical form of an email for duplicate comparison only.
pub fn normalized_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical form of an address (street + city + post code) for duplicate
/// comparison only. Lowercases first, then strips non-alphanumerics, so
/// accented letters are dropped rather than transliterated.
pub fn normalized_address(address: &Address) -> String {
    format!(
        "{}{}{}",
        address.street.trim(),
        address.city.trim(),
        address.post_code
    )
    .to_lowercase()
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .collect()
}

/// Refuse a candidate that would duplicate an already stored participation.
/// The email check runs first; an empty store always passes.
pub fn ensure_unique<S: ParticipationStore>(
    store: &S,
    candidate: &Participation,
) -> anyhow::Result<()> {
    if store.exists_by_normalized_email(&normalized_email(&candidate.email))? {
        return Err(
            ParticipationError::Duplicate("email already used for a participation".into()).into(),
        );
    }

    if store.exists_by_normalized_address(&normalized_address(&candidate.address))? {
        return Err(
            ParticipationError::Duplicate("address already used for a participation".into()).into(),
        );
    }

    Ok(())
}
