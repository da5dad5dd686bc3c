use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Shared Models
// ============================================================================
//
// Types used across bag, checkout, payment and order handling.
//
// ============================================================================

/// Role of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Tailor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Tailor => "tailor",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "tailor" => Ok(Role::Tailor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Who is performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn customer(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Customer }
    }

    pub fn tailor(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Tailor }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Admin }
    }
}

/// Contact details of a customer or tailor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
}

impl Profile {
    /// Usable email address, if any
    pub fn contact_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Stand-in used when a profile cannot be found; it has no contact info
    pub fn unknown(user_id: Uuid) -> Self {
        Self {
            user_id,
            display_name: String::new(),
            email: None,
        }
    }
}

/// Where a finished garment is delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Names of required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("fullName", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Upper-case ISO-4217 currency code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, String> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.len() != 3 || !normalized.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("invalid currency code '{}'", code));
        }
        Ok(Self(normalized))
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Obi".to_string(),
            line1: "12 Marina Road".to_string(),
            line2: None,
            city: "Lagos".to_string(),
            region: None,
            postal_code: "101001".to_string(),
            country: "NG".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_complete_address() {
        assert!(address().is_complete());
    }

    #[test]
    fn test_blank_fields_are_reported() {
        let mut incomplete = address();
        incomplete.city = "  ".to_string();
        incomplete.postal_code = String::new();

        assert_eq!(incomplete.missing_fields(), vec!["city", "postalCode"]);
        assert!(!incomplete.is_complete());
    }

    #[test]
    fn test_currency_code_is_normalized() {
        let code = CurrencyCode::new(" ngn ").unwrap();
        assert_eq!(code.as_str(), "NGN");
        assert!(CurrencyCode::new("NAIRA").is_err());
        assert!(CurrencyCode::new("U1D").is_err());
    }

    #[test]
    fn test_currency_code_deserialization_validates() {
        let code: CurrencyCode = serde_json::from_str("\"eur\"").unwrap();
        assert_eq!(code, CurrencyCode::new("EUR").unwrap());
        assert!(serde_json::from_str::<CurrencyCode>("\"euro\"").is_err());
    }

    #[test]
    fn test_profile_contact_email_ignores_blank() {
        let mut profile = Profile {
            user_id: Uuid::new_v4(),
            display_name: "Tunde".to_string(),
            email: Some("   ".to_string()),
        };
        assert_eq!(profile.contact_email(), None);

        profile.email = Some("tunde@example.com".to_string());
        assert_eq!(profile.contact_email(), Some("tunde@example.com"));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("guest".parse::<Role>().is_err());
    }
}
