use validator::ValidateEmail;

/// An address that passed the same gate the footer's `<input type="email"
/// required>` applied in the browser: surrounding whitespace is stripped, and
/// the remainder must be a syntactically valid email.
///
/// Must be instantiated with `SubscriberEmail::parse`; the field is private so
/// that an unchecked `String` can never reach the subscription endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: &str) -> Result<Self, String> {
        let email = email.trim().to_string();
        match ValidateEmail::validate_email(&email) {
            true => Ok(Self(email)),
            false => Err(format!("Invalid email: {email:?}")),
        }
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str { &self.0 }
}
