//! The acting principal of a check.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PdpError;

use super::Attributes;

/// Who is acting: an opaque key plus optional profile data.
///
/// Profile fields and attributes are forwarded to the PDP as-is and never
/// inspected locally. Empty fields are left out of the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", try_from = "RawSubjectKey")]
pub struct SubjectKey {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    #[schema(value_type = Object)]
    attributes: Attributes,
}

/// Wire form accepted on input; validated into a [`SubjectKey`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubjectKey {
    key: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    attributes: Attributes,
}

impl TryFrom<RawSubjectKey> for SubjectKey {
    type Error = PdpError;

    fn try_from(raw: RawSubjectKey) -> Result<Self, Self::Error> {
        let mut subject = SubjectKey::new(raw.key)?;
        subject.first_name = raw.first_name;
        subject.last_name = raw.last_name;
        subject.email = raw.email;
        subject.attributes = raw.attributes;
        Ok(subject)
    }
}

impl SubjectKey {
    /// Create a subject from its key. The key must contain something other
    /// than whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, PdpError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(PdpError::InvalidSubject(
                "subject key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            key,
            first_name: None,
            last_name: None,
            email: None,
            attributes: Attributes::new(),
        })
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Add one attribute, returning the updated subject.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl Display for SubjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.key)
    }
}

impl FromStr for SubjectKey {
    type Err = PdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubjectKey::new(s)
    }
}
