use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::err::Error;

/// Which path a registration payload arrives through. Walk-in records are
/// created by an admin; online ones come from public self-registration
/// and must attach a payment receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPath {
    WalkIn,
    Online,
}

/// A validated, normalized payload ready to be shaped into a document.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub gender: String,
    pub address: String,
    pub classes: Vec<String>,
    pub register_date: String,
    pub registration_fee: i64,
    pub payment_receipt: Option<String>,
    pub payment_receipt_name: Option<String>,
}

const WALK_IN_REQUIRED: [&str; 9] = [
    "firstName",
    "lastName",
    "email",
    "mobile",
    "gender",
    "address",
    "classes",
    "registerDate",
    "registrationFee",
];

const ONLINE_REQUIRED: [&str; 8] = [
    "firstName",
    "lastName",
    "email",
    "mobile",
    "gender",
    "address",
    "classes",
    "registrationFee",
];

/// Checks the required set for the given path, trims every string field,
/// lower-cases the email, and coerces the fee. `now` supplies the default
/// register date for online payloads that omit one.
pub fn validate_student(
    data: &Value,
    path: RegistrationPath,
    now: DateTime<Utc>,
) -> Result<NewStudent, Error> {
    let required: &[&str] = match path {
        RegistrationPath::WalkIn => &WALK_IN_REQUIRED,
        RegistrationPath::Online => &ONLINE_REQUIRED,
    };
    for field in required {
        require(data, field)?;
    }

    let (payment_receipt, payment_receipt_name, register_date) = match path {
        RegistrationPath::WalkIn => (None, None, string_field(data, "registerDate")?),
        RegistrationPath::Online => {
            require(data, "paymentReceipt")?;
            let register_date = match data.get("registerDate") {
                Some(value) if !is_falsy(value) => coerce_string("registerDate", value)?,
                _ => now.format("%Y-%m-%d").to_string(),
            };
            (
                Some(string_field(data, "paymentReceipt")?),
                optional_string(data, "paymentReceiptName"),
                register_date,
            )
        }
    };

    Ok(NewStudent {
        first_name: string_field(data, "firstName")?,
        last_name: string_field(data, "lastName")?,
        email: string_field(data, "email")?.to_lowercase(),
        mobile: string_field(data, "mobile")?,
        gender: string_field(data, "gender")?,
        address: string_field(data, "address")?,
        classes: coerce_classes(field_value(data, "classes")?)?,
        register_date,
        registration_fee: coerce_fee(field_value(data, "registrationFee")?)?,
        payment_receipt,
        payment_receipt_name,
    })
}

/// An empty string, empty list, zero fee, or explicit null fails the
/// required check the same way an absent key does.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
    }
}

fn require<'a>(data: &'a Value, field: &str) -> Result<&'a Value, Error> {
    match data.get(field) {
        Some(value) if !is_falsy(value) => Ok(value),
        _ => Err(Error::validation(format!("{} is required", field))),
    }
}

fn field_value<'a>(data: &'a Value, field: &str) -> Result<&'a Value, Error> {
    data.get(field)
        .ok_or_else(|| Error::validation(format!("{} is required", field)))
}

fn string_field(data: &Value, field: &str) -> Result<String, Error> {
    coerce_string(field, field_value(data, field)?)
}

fn optional_string(data: &Value, field: &str) -> Option<String> {
    match data.get(field).and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

pub fn coerce_string(field: &str, value: &Value) -> Result<String, Error> {
    value
        .as_str()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| Error::validation(format!("{} must be a string", field)))
}

pub fn coerce_classes(value: &Value) -> Result<Vec<String>, Error> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::validation("classes must be a list of class tags"))?;
    if items.is_empty() {
        return Err(Error::validation("classes must not be empty"));
    }
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::validation("classes must be a list of class tags"))
        })
        .collect()
}

pub fn coerce_fee(value: &Value) -> Result<i64, Error> {
    let fee = match value {
        Value::Number(number) => {
            if let Some(fee) = number.as_i64() {
                fee
            } else if let Some(fee) = number.as_f64() {
                fee as i64
            } else {
                return Err(non_numeric_fee());
            }
        }
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| non_numeric_fee())?,
        _ => return Err(non_numeric_fee()),
    };
    if fee < 0 {
        return Err(Error::validation("registrationFee must not be negative"));
    }
    Ok(fee)
}

fn non_numeric_fee() -> Error {
    Error::validation("registrationFee must be a number")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "firstName": "  Jane ",
            "lastName": "Smith",
            "email": " Jane.Smith@Example.COM ",
            "mobile": "0771234567",
            "gender": "female",
            "address": "12 Lake Rd, Kandy",
            "classes": ["physics", "chemistry"],
            "registerDate": "2026-03-02",
            "registrationFee": 2000
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 10, 30, 0).unwrap()
    }

    #[test]
    fn normalizes_strings_and_email() {
        let new = validate_student(&payload(), RegistrationPath::WalkIn, now()).unwrap();
        assert_eq!(new.first_name, "Jane");
        assert_eq!(new.email, "jane.smith@example.com");
        assert_eq!(new.classes, vec!["physics", "chemistry"]);
        assert_eq!(new.registration_fee, 2000);
        assert!(new.payment_receipt.is_none());
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut data = payload();
        data.as_object_mut().unwrap().remove("mobile");
        let err = validate_student(&data, RegistrationPath::WalkIn, now()).unwrap_err();
        assert!(matches!(err, Error::Validation { message } if message == "mobile is required"));
    }

    #[test]
    fn empty_string_fails_required_check() {
        let mut data = payload();
        data["email"] = json!("");
        let err = validate_student(&data, RegistrationPath::WalkIn, now()).unwrap_err();
        assert!(matches!(err, Error::Validation { message } if message == "email is required"));
    }

    #[test]
    fn zero_fee_fails_required_check() {
        let mut data = payload();
        data["registrationFee"] = json!(0);
        let err = validate_student(&data, RegistrationPath::WalkIn, now()).unwrap_err();
        assert!(
            matches!(err, Error::Validation { message } if message == "registrationFee is required")
        );
    }

    #[test]
    fn empty_class_list_fails_required_check() {
        let mut data = payload();
        data["classes"] = json!([]);
        let err = validate_student(&data, RegistrationPath::WalkIn, now()).unwrap_err();
        assert!(matches!(err, Error::Validation { message } if message == "classes is required"));
    }

    #[test]
    fn fee_is_coerced_from_a_numeric_string() {
        let mut data = payload();
        data["registrationFee"] = json!(" 2500 ");
        let new = validate_student(&data, RegistrationPath::WalkIn, now()).unwrap();
        assert_eq!(new.registration_fee, 2500);
    }

    #[test]
    fn non_numeric_fee_is_rejected() {
        let mut data = payload();
        data["registrationFee"] = json!("two thousand");
        let err = validate_student(&data, RegistrationPath::WalkIn, now()).unwrap_err();
        assert!(
            matches!(err, Error::Validation { message } if message == "registrationFee must be a number")
        );
    }

    #[test]
    fn negative_fee_is_rejected() {
        let mut data = payload();
        data["registrationFee"] = json!(-500);
        assert!(validate_student(&data, RegistrationPath::WalkIn, now()).is_err());
    }

    #[test]
    fn online_path_requires_a_payment_receipt() {
        let err = validate_student(&payload(), RegistrationPath::Online, now()).unwrap_err();
        assert!(
            matches!(err, Error::Validation { message } if message == "paymentReceipt is required")
        );
    }

    #[test]
    fn online_path_defaults_the_register_date() {
        let mut data = payload();
        data.as_object_mut().unwrap().remove("registerDate");
        data["paymentReceipt"] = json!("aGVsbG8=");
        let new = validate_student(&data, RegistrationPath::Online, now()).unwrap();
        assert_eq!(new.register_date, "2026-03-14");
        assert_eq!(new.payment_receipt.as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn online_path_keeps_an_explicit_register_date() {
        let mut data = payload();
        data["paymentReceipt"] = json!("aGVsbG8=");
        let new = validate_student(&data, RegistrationPath::Online, now()).unwrap();
        assert_eq!(new.register_date, "2026-03-02");
    }

    #[test]
    fn blank_receipt_name_is_dropped() {
        let mut data = payload();
        data["paymentReceipt"] = json!("aGVsbG8=");
        data["paymentReceiptName"] = json!("   ");
        let new = validate_student(&data, RegistrationPath::Online, now()).unwrap();
        assert!(new.payment_receipt_name.is_none());
    }
}
