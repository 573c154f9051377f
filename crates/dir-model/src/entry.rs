//! Directory entry model.
//!
//! A directory entry is a read-only snapshot of an object returned by the
//! directory service. Attribute names are case-insensitive in LDAP, so they
//! are normalized to lowercase on insertion and lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute name that resolves to the entry's distinguished name.
pub const DN_ATTRIBUTE: &str = "distinguishedname";

/// Active Directory `userAccountControl` flag for disabled accounts.
const ACCOUNT_DISABLE: u32 = 0x0002;

/// An entry returned by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    dn: String,
    guid: String,
    domain: Option<String>,
    attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry with the given DN and unique identifier.
    #[must_use]
    pub fn new(dn: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            guid: guid.into(),
            domain: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a multi-valued attribute.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_attribute(name, values);
        self
    }

    /// Sets the connection/domain tag.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Replaces the values of an attribute.
    pub fn set_attribute<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.insert(
            name.to_ascii_lowercase(),
            values.into_iter().map(Into::into).collect(),
        );
    }

    /// Returns the distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns the unique identifier in canonical string form.
    #[must_use]
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Returns the connection/domain tag, if the entry carries one.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Returns all values of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Returns the first value of an attribute.
    ///
    /// `distinguishedname` falls back to the entry DN for directories that do
    /// not return it as an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        let value = self
            .attribute(name)
            .and_then(|values| values.first())
            .map(String::as_str);

        match value {
            Some(v) => Some(v),
            None if name.eq_ignore_ascii_case(DN_ATTRIBUTE) => Some(self.dn.as_str()),
            None => None,
        }
    }

    /// Checks if the entry has a non-empty attribute.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|values| !values.is_empty())
    }

    /// Returns the attribute map.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// Returns the common name, falling back to the DN.
    #[must_use]
    pub fn common_name(&self) -> &str {
        self.first("cn").unwrap_or(&self.dn)
    }

    /// Returns whether Active Directory marks the account as disabled.
    ///
    /// Entries without `userAccountControl` are treated as enabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.first("useraccountcontrol")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .is_some_and(|flags| flags & ACCOUNT_DISABLE != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> DirectoryEntry {
        DirectoryEntry::new("cn=Alice,ou=users,dc=corp,dc=com", "G-1")
            .with_attribute("cn", ["Alice"])
            .with_attribute("mail", ["a@b.com", "alice@b.com"])
            .with_attribute("userPrincipalName", ["alice@corp.com"])
    }

    #[test]
    fn attribute_lookup_is_case_insensitive() {
        let entry = alice();
        assert_eq!(entry.first("userprincipalname"), Some("alice@corp.com"));
        assert_eq!(entry.first("USERPRINCIPALNAME"), Some("alice@corp.com"));
        assert_eq!(entry.attribute("MAIL").map(<[String]>::len), Some(2));
        assert_eq!(entry.first("mail"), Some("a@b.com"));
        assert_eq!(entry.first("missing"), None);
    }

    #[test]
    fn distinguished_name_falls_back_to_dn() {
        let entry = alice();
        assert_eq!(
            entry.first("distinguishedName"),
            Some("cn=Alice,ou=users,dc=corp,dc=com")
        );
    }

    #[test]
    fn common_name_falls_back_to_dn() {
        let entry = DirectoryEntry::new("uid=bob,dc=corp,dc=com", "G-2");
        assert_eq!(entry.common_name(), "uid=bob,dc=corp,dc=com");
        assert_eq!(alice().common_name(), "Alice");
    }

    #[test]
    fn empty_attribute_is_not_present() {
        let entry = alice().with_attribute("description", Vec::<String>::new());
        assert!(!entry.has_attribute("description"));
        assert!(entry.has_attribute("cn"));
    }

    #[test]
    fn disabled_flag_from_user_account_control() {
        assert!(!alice().is_disabled());
        assert!(!alice()
            .with_attribute("userAccountControl", ["512"])
            .is_disabled());
        assert!(alice()
            .with_attribute("userAccountControl", ["514"])
            .is_disabled());
    }
}
