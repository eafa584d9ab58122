//! External address-book feed

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AddressBookError;

/// One contact as the address book stores it. Phones are raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressBookRecord {
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

pub trait AddressBook {
    fn records(&self) -> Result<Vec<AddressBookRecord>, AddressBookError>;
}

impl AddressBook for Vec<AddressBookRecord> {
    fn records(&self) -> Result<Vec<AddressBookRecord>, AddressBookError> {
        Ok(self.clone())
    }
}

/// A JSON array of [`AddressBookRecord`]s on disk.
#[derive(Debug, Clone)]
pub struct JsonAddressBook {
    path: PathBuf,
}

impl JsonAddressBook {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AddressBook for JsonAddressBook {
    fn records(&self) -> Result<Vec<AddressBookRecord>, AddressBookError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::NotFound => "not found".to_string(),
                ErrorKind::PermissionDenied => "permission denied".to_string(),
                _ => e.to_string(),
            };
            AddressBookError::Unavailable(format!("{}: {}", self.path.display(), reason))
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}
