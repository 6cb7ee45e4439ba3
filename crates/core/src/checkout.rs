//! Checkout form validation.
//!
//! Payment details are only checked for presence. They are never sent
//! anywhere: the backend records a purchase from product ids alone.

use core::fmt;

use serde::Deserialize;

/// Raw checkout form as submitted by the browser.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutForm {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub card_number: String,
    pub name_on_card: String,
    pub expiration: String,
    pub cvv: String,
}

impl fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("street", &self.street)
            .field("city", &self.city)
            .field("postal_code", &self.postal_code)
            .field("card_number", &"[REDACTED]")
            .field("name_on_card", &self.name_on_card)
            .field("expiration", &"[REDACTED]")
            .field("cvv", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Please fill all fields")]
pub struct CheckoutError {
    /// Human-readable labels of the empty fields, in form order.
    pub missing: Vec<&'static str>,
}

impl CheckoutForm {
    /// Check that every address and payment field is filled in.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] listing each field that is blank after trimming.
    pub fn validate(&self) -> Result<ShippingAddress, CheckoutError> {
        let fields: [(&'static str, &str); 7] = [
            ("Street address", &self.street),
            ("City", &self.city),
            ("Postal code", &self.postal_code),
            ("Card number", &self.card_number),
            ("Name on card", &self.name_on_card),
            ("Expiration", &self.expiration),
            ("CVV", &self.cvv),
        ];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(label, _)| *label)
            .collect();

        if !missing.is_empty() {
            return Err(CheckoutError { missing });
        }

        Ok(ShippingAddress {
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete() -> CheckoutForm {
        CheckoutForm {
            street: "1 Main St".to_string(),
            city: "Lisbon".to_string(),
            postal_code: "1000-001".to_string(),
            card_number: "4242424242424242".to_string(),
            name_on_card: "Ana Silva".to_string(),
            expiration: "12/29".to_string(),
            cvv: "123".to_string(),
        }
    }

    #[test]
    fn test_complete_form_passes() {
        let address = complete().validate().unwrap();
        assert_eq!(address.city, "Lisbon");
    }

    #[test]
    fn test_blank_fields_are_listed() {
        let form = CheckoutForm {
            city: "   ".to_string(),
            cvv: String::new(),
            ..complete()
        };
        let err = form.validate().unwrap_err();
        assert_eq!(err.missing, vec!["City", "CVV"]);
        assert_eq!(err.to_string(), "Please fill all fields");
    }

    #[test]
    fn test_debug_redacts_card() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("4242"));
        assert!(!rendered.contains("123\""));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_deserializes_camel_case_fields() {
        let form: CheckoutForm =
            serde_json::from_str(r#"{"postalCode":"9000","nameOnCard":"Bo"}"#).unwrap();
        assert_eq!(form.postal_code, "9000");
        assert_eq!(form.name_on_card, "Bo");
        assert!(form.street.is_empty());
    }
}
