use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 8;

pub const MSG_MISSING_FIELDS: &str = "Please fill in all fields";
pub const MSG_INVALID_EMAIL: &str = "Please enter a valid email address";
pub const MSG_SHORT_PASSWORD: &str = "Password must be at least 8 characters";
pub const MSG_PASSWORD_MISMATCH: &str = "Passwords do not match";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Checks applied before a login request leaves the device.
pub fn validate_login(email: &str, password: &str) -> Result<(), &'static str> {
    if email.is_empty() || password.is_empty() {
        return Err(MSG_MISSING_FIELDS);
    }
    validate_credentials(email, password)
}

/// Checks applied to a registration form. The backend runs the same checks with
/// `confirm_password` set to the password itself.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), &'static str> {
    if name.trim().is_empty() || email.is_empty() || password.is_empty() || confirm_password.is_empty() {
        return Err(MSG_MISSING_FIELDS);
    }
    validate_credentials(email, password)?;
    if password != confirm_password {
        return Err(MSG_PASSWORD_MISMATCH);
    }
    Ok(())
}

fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if !is_valid_email(email) {
        return Err(MSG_INVALID_EMAIL);
    }
    if !is_valid_password(password) {
        return Err(MSG_SHORT_PASSWORD);
    }
    Ok(())
}
