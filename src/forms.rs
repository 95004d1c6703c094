//! Form payloads and the rules that turn them into clean values.
//!
//! Every form derives `Default` with `#[serde(default)]` so a missing field
//! reaches validation as an empty string instead of failing extraction.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required.")]
    Required(&'static str),
    #[error("{0} is too long.")]
    TooLong(&'static str),
    #[error("Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.")]
    InvalidUsername,
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("The two password fields didn't match.")]
    PasswordMismatch,
    #[error("This password is too short. It must contain at least 8 characters.")]
    PasswordTooShort,
    #[error("This password is entirely numeric.")]
    PasswordNumeric,
    #[error("Upload a valid PNG, JPEG, GIF or WebP image.")]
    InvalidImage,
}

pub const MIN_PASSWORD_LEN: usize = 8;

fn required(field: &'static str, value: &str, max_len: usize) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Required(field));
    }
    if value.chars().count() > max_len {
        return Err(FormError::TooLong(field));
    }
    Ok(value.to_owned())
}

fn optional(field: &'static str, value: &str, max_len: usize) -> Result<String, FormError> {
    let value = value.trim();
    if value.chars().count() > max_len {
        return Err(FormError::TooLong(field));
    }
    Ok(value.to_owned())
}

/// Usernames are stored lowercase.
pub fn clean_username(value: &str) -> Result<String, FormError> {
    let value = required("Username", value, 150)?;
    if !value.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        return Err(FormError::InvalidUsername);
    }
    Ok(value.to_lowercase())
}

pub fn clean_email(value: &str) -> Result<String, FormError> {
    let value = required("Email", value, 254)?;
    let Some((local, domain)) = value.split_once('@') else {
        return Err(FormError::InvalidEmail);
    };
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || value.chars().any(char::is_whitespace)
    {
        return Err(FormError::InvalidEmail);
    }
    Ok(value.to_lowercase())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    /// A username or an email address.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn clean(&self) -> Result<NewUser, FormError> {
        let name = optional("Name", &self.name, 200)?;
        let username = clean_username(&self.username)?;
        let email = clean_email(&self.email)?;

        if self.password1.is_empty() {
            return Err(FormError::Required("Password"));
        }
        if self.password1 != self.password2 {
            return Err(FormError::PasswordMismatch);
        }
        if self.password1.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort);
        }
        if self.password1.chars().all(|c| c.is_ascii_digit()) {
            return Err(FormError::PasswordNumeric);
        }

        Ok(NewUser { name, username, email, password: self.password1.clone() })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RoomForm {
    pub topic: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CleanRoom {
    pub topic: String,
    pub name: String,
    pub description: String,
}

impl RoomForm {
    pub fn clean(&self) -> Result<CleanRoom, FormError> {
        Ok(CleanRoom {
            topic: required("Topic", &self.topic, 200)?,
            name: required("Name", &self.name, 200)?,
            description: optional("Description", &self.description, 5_000)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MessageForm {
    pub body: String,
}

impl MessageForm {
    pub fn clean(&self) -> Result<String, FormError> {
        required("Message", &self.body, 10_000)
    }
}

/// Profile fields. The avatar arrives as a separate multipart part.
#[derive(Debug, Default, Clone)]
pub struct UserForm {
    pub name: String,
    pub username: String,
    pub email: String,
    pub bio: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct UserChanges {
    pub name: String,
    pub username: String,
    pub email: String,
    pub bio: String,
}

impl UserForm {
    pub fn clean(&self) -> Result<UserChanges, FormError> {
        Ok(UserChanges {
            name: optional("Name", &self.name, 200)?,
            username: clean_username(&self.username)?,
            email: clean_email(&self.email)?,
            bio: optional("Bio", &self.bio, 2_000)?,
        })
    }
}

/// File extension for an uploaded avatar, judged by its declared content type.
pub fn avatar_extension(content_type: &str) -> Result<&'static str, FormError> {
    match content_type {
        "image/png" => Ok("png"),
        "image/jpeg" => Ok("jpg"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        _ => Err(FormError::InvalidImage),
    }
}
