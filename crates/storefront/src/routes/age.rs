//! Age verification for alcohol products.

use axum::{Form, response::Redirect};
use marketmate_core::{AgeGate, BirthDate, BirthDateError};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::redirect_back;
use super::store::STORE_PATH;
use crate::models::Flash;
use crate::models::session as session_data;

pub const ADULT_MESSAGE: &str =
    "You are of age. You can now view all products, even alcohol products.";
pub const UNDERAGE_MESSAGE: &str = "You are underage. You can still browse the site, \
     but you will not be able to view alcohol products.";
pub const INVALID_DATE_MESSAGE: &str = "That date of birth could not be read (DD-MM-YYYY), \
     so alcohol products stay hidden for this visit.";

#[derive(Debug, Deserialize)]
pub struct AgeForm {
    pub birth_date: String,
    pub return_to: Option<String>,
}

/// Record the visitor's age decision for the rest of the session.
///
/// The first answer is final. An unreadable or future date counts as
/// underage.
#[instrument(skip(session, form))]
pub async fn verify(session: Session, Form(form): Form<AgeForm>) -> Redirect {
    let return_to = form.return_to.as_deref();

    if session_data::age_gate(&session).await.is_decided() {
        tracing::debug!("Age already verified for this session");
        return redirect_back(return_to, STORE_PATH);
    }

    let today = chrono::Local::now().date_naive();
    let (gate, flash) = outcome(&form.birth_date, today);

    match session_data::set_age_gate(&session, gate).await {
        Ok(()) => session_data::push_flash(&session, flash).await,
        Err(e) => tracing::error!("Failed to store age decision: {e}"),
    }

    redirect_back(return_to, STORE_PATH)
}

fn decide(input: &str, today: chrono::NaiveDate) -> Result<AgeGate, BirthDateError> {
    AgeGate::from_birth_date(BirthDate::parse(input)?, today)
}

/// The gate to record for a submitted birth date and the notice to show.
fn outcome(input: &str, today: chrono::NaiveDate) -> (AgeGate, Flash) {
    match decide(input, today) {
        Ok(AgeGate::Adult) => (AgeGate::Adult, Flash::success(ADULT_MESSAGE)),
        Ok(gate) => (gate, Flash::info(UNDERAGE_MESSAGE)),
        Err(e) => {
            tracing::debug!("Rejected birth date: {e}");
            (AgeGate::Underage, Flash::error(INVALID_DATE_MESSAGE))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_decide() {
        assert_eq!(decide("15-06-2006", today()).unwrap(), AgeGate::Adult);
        assert_eq!(decide("16-06-2006", today()).unwrap(), AgeGate::Underage);
        assert!(decide("2006-06-15", today()).is_err());
        assert!(decide("01-01-2030", today()).is_err());
    }

    #[test]
    fn test_unreadable_dates_count_as_underage() {
        for input in ["2006-06-15", "01-01-2030", ""] {
            let (gate, flash) = outcome(input, today());
            assert_eq!(gate, AgeGate::Underage, "{input:?}");
            assert_eq!(flash, Flash::error(INVALID_DATE_MESSAGE));
        }
        assert_eq!(outcome("15-06-2006", today()).0, AgeGate::Adult);
    }
}
