use crate::error::{TenancyError, TenancyResult};

const MAX_EMAIL_LEN: usize = 320;
const MAX_NAME_LEN: usize = 120;

fn has_forbidden_byte(part: &str) -> bool {
    part.bytes()
        .any(|ch| ch <= b' ' || matches!(ch, b'@' | b';' | b',' | b'"' | b'<' | b'>'))
}

pub fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_EMAIL_LEN {
        return false;
    }

    let Some((local, domain)) = trimmed.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() {
        return false;
    }

    if has_forbidden_byte(local) || has_forbidden_byte(domain) {
        return false;
    }

    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Trims an email address and rejects malformed input. Case is preserved:
/// invitation acceptance compares addresses exactly.
pub fn normalize_email(value: &str) -> TenancyResult<String> {
    let trimmed = value.trim();
    if is_valid_email(trimmed) {
        Ok(trimmed.to_owned())
    } else {
        Err(TenancyError::validation("invalid email address"))
    }
}

/// Trims a display name, rejecting blank or oversized input. `what` names the
/// field in the error message.
pub fn normalize_name(value: &str, what: &str) -> TenancyResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TenancyError::validation(format!("{what} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(TenancyError::validation(format!(
            "{what} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Name shown for a person: their full name when set, else the local part of
/// their email address.
pub fn display_name(full_name: Option<&str>, email: &str) -> String {
    if let Some(name) = full_name.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_owned();
    }

    email
        .split('@')
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or(email)
        .to_owned()
}
