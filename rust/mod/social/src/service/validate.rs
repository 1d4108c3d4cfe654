//! Field validation. Every check runs and all failures are reported together.

use twtr_core::FieldError;

use crate::model::{ProfilePatch, Registration, TweetKind};

pub(crate) const MAX_NAME_CHARS: usize = 50;
pub(crate) const MIN_PASSWORD_CHARS: usize = 8;
pub(crate) const MAX_TWEET_CHARS: usize = 280;

/// Path segments under `/users/` that route elsewhere, so a handle equal to
/// one of them could not be looked up by `GET /users/{handle}`.
pub(crate) const RESERVED_HANDLES: [&str; 4] = ["user", "tokens", "password", "tweets"];

fn name(field: &str, value: &str, label: &str, errors: &mut Vec<FieldError>) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, format!("{} is required", label)));
    } else if len > MAX_NAME_CHARS {
        errors.push(FieldError::new(
            field,
            format!("{} must be at most {} characters", label, MAX_NAME_CHARS),
        ));
    }
}

fn handle(value: &str, errors: &mut Vec<FieldError>) {
    name("handle", value, "Handle", errors);
    if value.trim().chars().any(char::is_whitespace) {
        errors.push(FieldError::new("handle", "Handle cannot contain spaces"));
    }
    let trimmed = value.trim();
    if RESERVED_HANDLES.iter().any(|r| r.eq_ignore_ascii_case(trimmed)) {
        errors.push(FieldError::new("handle", "This handle is reserved"));
    }
}

pub(crate) fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn email(value: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !is_email(value.trim()) {
        errors.push(FieldError::new("email", "Enter a valid email address"));
    }
}

pub(crate) fn password(value: &str, errors: &mut Vec<FieldError>) {
    if value.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_CHARS),
        ));
    }
}

/// An absolute http(s) URL with a host.
pub(crate) fn is_web_url(value: &str) -> bool {
    match url::Url::parse(value.trim()) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

pub(crate) fn registration(input: &Registration) -> Vec<FieldError> {
    let mut errors = Vec::new();
    name("username", &input.username, "Username", &mut errors);
    handle(&input.handle, &mut errors);
    email(&input.email, &mut errors);
    password(&input.password, &mut errors);
    errors
}

pub(crate) fn profile(patch: &ProfilePatch) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(username) = &patch.username {
        name("username", username, "Username", &mut errors);
    }
    if let Some(h) = &patch.handle {
        handle(h, &mut errors);
    }
    if let Some(e) = &patch.email {
        email(e, &mut errors);
    }
    if let Some(website) = &patch.website {
        if !website.trim().is_empty() && !is_web_url(website) {
            errors.push(FieldError::new("website", "Enter a valid URL"));
        }
    }
    errors
}

/// Type rules for tweet content.
pub(crate) struct TweetContent<'a> {
    pub kind: TweetKind,
    pub text: Option<&'a str>,
    pub link_url: Option<&'a str>,
    pub is_retweet: bool,
    /// Content type of the attached file, if any.
    pub image: Option<&'a str>,
}

pub(crate) fn tweet(content: &TweetContent<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let text = content.text.map(str::trim).unwrap_or_default();

    if text.chars().count() > MAX_TWEET_CHARS {
        errors.push(FieldError::new(
            "text",
            format!("Tweet must be at most {} characters", MAX_TWEET_CHARS),
        ));
    }

    match content.kind {
        TweetKind::Text => {
            if text.is_empty() && !content.is_retweet {
                errors.push(FieldError::new("text", "Enter some text"));
            }
        }
        TweetKind::Link => match content.link_url {
            Some(link) if is_web_url(link) => {}
            Some(_) => errors.push(FieldError::new("linkUrl", "Enter a valid URL")),
            None => errors.push(FieldError::new("linkUrl", "Enter a link")),
        },
        TweetKind::Image => match content.image {
            Some(ct) if twtr_blob::extension_for(ct).is_some() => {}
            Some(_) => errors.push(FieldError::new("image", "File must be an image")),
            None => errors.push(FieldError::new("image", "Upload an image")),
        },
    }
    errors
}
