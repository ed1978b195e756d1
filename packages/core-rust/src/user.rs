//! The user record, its partial-update form, and best-effort decoding.
//!
//! A stored entry is a flat [`Document`] `{id, name, email, age, imageUrl}`.
//! Decoding never fails: malformed fields fall back to their defaults and are
//! reported through a [`DecodeWarning`] so one bad entry cannot hide its
//! siblings from a snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Document, Value};

/// Field names as they appear in a stored entry.
pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const AGE: &str = "age";
    pub const IMAGE_URL: &str = "imageUrl";
}

/// A user record.
///
/// `id` is the key the record is stored under and never changes once
/// assigned. `image_url` of `None` means "no image".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl User {
    /// Creates a record without an id; the store assigns one on create.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: u32) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            email: email.into(),
            age,
            image_url: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.image_url = if url.is_empty() { None } else { Some(url) };
        self
    }

    /// Whether an id has been assigned.
    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Converts the record to its stored form. `imageUrl` is omitted when absent.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(fields::ID.to_string(), Value::from(self.id.as_str()));
        doc.insert(fields::NAME.to_string(), Value::from(self.name.as_str()));
        doc.insert(fields::EMAIL.to_string(), Value::from(self.email.as_str()));
        doc.insert(fields::AGE.to_string(), Value::from(self.age));
        if let Some(url) = &self.image_url {
            doc.insert(fields::IMAGE_URL.to_string(), Value::from(url.as_str()));
        }
        doc
    }

    /// Applies a partial update locally, mirroring what a store merge does.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(url) = &patch.image_url {
            self.image_url = if url.is_empty() {
                None
            } else {
                Some(url.clone())
            };
        }
    }

    /// Decodes the entry stored under `key`.
    ///
    /// The key is authoritative for identity: a missing or mismatched `id`
    /// field is replaced by `key`. Absent (or null) fields take their default
    /// silently; present but malformed fields take their default and are
    /// listed in the returned warning.
    #[must_use]
    pub fn decode(key: &str, value: &Value) -> Decoded {
        let mut defaulted = Vec::new();

        let Some(map) = value.as_map() else {
            return Decoded {
                user: User {
                    id: key.to_string(),
                    ..User::default()
                },
                warning: Some(DecodeWarning {
                    key: key.to_string(),
                    fields: vec!["entry"],
                }),
            };
        };

        let field = |name: &str| map.get(name).filter(|v| !v.is_null());

        match field(fields::ID) {
            None => {}
            Some(Value::String(id)) if id == key => {}
            Some(_) => defaulted.push(fields::ID),
        }

        let name = decode_text(field(fields::NAME), fields::NAME, &mut defaulted);
        let email = decode_text(field(fields::EMAIL), fields::EMAIL, &mut defaulted);

        let age = match field(fields::AGE) {
            None => 0,
            Some(v) => decode_age(v).unwrap_or_else(|| {
                defaulted.push(fields::AGE);
                0
            }),
        };

        let image_url = match field(fields::IMAGE_URL) {
            None => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                defaulted.push(fields::IMAGE_URL);
                None
            }
        };

        let warning = if defaulted.is_empty() {
            None
        } else {
            Some(DecodeWarning {
                key: key.to_string(),
                fields: defaulted,
            })
        };

        Decoded {
            user: User {
                id: key.to_string(),
                name,
                email,
                age,
                image_url,
            },
            warning,
        }
    }
}

/// Scalars are stringified; containers fall back to the empty string.
fn decode_text(
    value: Option<&Value>,
    name: &'static str,
    defaulted: &mut Vec<&'static str>,
) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Bool(_) | Value::Int(_) | Value::Float(_))) => {
            defaulted.push(name);
            v.to_string()
        }
        Some(_) => {
            defaulted.push(name);
            String::new()
        }
    }
}

/// Accepts non-negative integers, integral floats, and numeric strings.
fn decode_age(value: &Value) -> Option<u32> {
    match value {
        Value::Int(n) => u32::try_from(*n).ok(),
        Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX) => {
            // Range checked above.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = *f as u32;
            Some(n)
        }
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Result of decoding one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub user: User,
    /// Present when at least one field was defaulted.
    pub warning: Option<DecodeWarning>,
}

/// An entry had malformed fields that were replaced by defaults.
///
/// Not an operation failure: callers log it and keep the decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Key of the offending entry.
    pub key: String,
    /// Names of the defaulted fields (`"entry"` when the whole value was not a map).
    pub fields: Vec<&'static str>,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry {} decoded with defaulted fields: {}",
            self.key,
            self.fields.join(", ")
        )
    }
}

/// Partial update: only the fields that are `Some` are written.
///
/// `image_url: Some("")` clears the stored image URL. The id is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl UserPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    #[must_use]
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Patch that rewrites every editable field of `user`.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            age: Some(user.age),
            image_url: Some(user.image_url.clone().unwrap_or_default()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.age.is_none()
            && self.image_url.is_none()
    }

    /// Fields to merge into the stored entry. A cleared image becomes `Null`,
    /// which merge treats as "remove this field".
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(name) = &self.name {
            doc.insert(fields::NAME.to_string(), Value::from(name.as_str()));
        }
        if let Some(email) = &self.email {
            doc.insert(fields::EMAIL.to_string(), Value::from(email.as_str()));
        }
        if let Some(age) = self.age {
            doc.insert(fields::AGE.to_string(), Value::from(age));
        }
        if let Some(url) = &self.image_url {
            let value = if url.is_empty() {
                Value::Null
            } else {
                Value::from(url.as_str())
            };
            doc.insert(fields::IMAGE_URL.to_string(), value);
        }
        doc
    }
}
