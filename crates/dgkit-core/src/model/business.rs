//! Business information: ownership and reference material.

use super::{ensure_natural_key, ensure_same_identity};
use crate::error::{Error, Result};
use crate::identity::{assign_id, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A linked document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    /// Link to the document, if any.
    pub reference: Option<String>,
}

impl Document {
    /// Create a document.
    pub fn new(natural_key: impl Into<String>, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            name: name.into(),
            reference: None,
        }
    }

    /// Set the document link.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// An email address of a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    pub email_address: Option<String>,
}

impl Email {
    /// Create an email unit.
    pub fn new(natural_key: impl Into<String>, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            name: name.into(),
            email_address: None,
        }
    }

    /// Set the address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.email_address = Some(address.into());
        self
    }
}

/// A url of a contact (chat channel, wiki page, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    pub url: Option<String>,
}

impl Url {
    /// Create a url unit.
    pub fn new(natural_key: impl Into<String>, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            name: name.into(),
            url: None,
        }
    }

    /// Set the target.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A contact reachable through emails and urls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    pub emails: Vec<Email>,
    pub urls: Vec<Url>,
}

impl Contact {
    /// Create a contact with no channels.
    pub fn new(natural_key: impl Into<String>, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            name: name.into(),
            emails: Vec::new(),
            urls: Vec::new(),
        }
    }

    /// Add an email.
    pub fn with_email(mut self, email: Email) -> Self {
        self.emails.push(email);
        self
    }

    /// Add a url.
    pub fn with_url(mut self, url: Url) -> Self {
        self.urls.push(url);
        self
    }
}

/// A team responsible for units of the logical model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    pub contacts: Vec<Contact>,
}

impl Team {
    /// Create a team with no contacts.
    pub fn new(natural_key: impl Into<String>, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            name: name.into(),
            contacts: Vec::new(),
        }
    }

    /// Add a contact.
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }
}

/// Any business information unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit_type", rename_all = "lowercase")]
pub enum BusinessUnit {
    Team(Team),
    Contact(Contact),
    Document(Document),
    Email(Email),
    Url(Url),
}

impl BusinessUnit {
    /// Unit id.
    pub fn id(&self) -> &UnitId {
        match self {
            BusinessUnit::Team(u) => &u.id,
            BusinessUnit::Contact(u) => &u.id,
            BusinessUnit::Document(u) => &u.id,
            BusinessUnit::Email(u) => &u.id,
            BusinessUnit::Url(u) => &u.id,
        }
    }

    /// Natural key.
    pub fn natural_key(&self) -> &str {
        match self {
            BusinessUnit::Team(u) => &u.natural_key,
            BusinessUnit::Contact(u) => &u.natural_key,
            BusinessUnit::Document(u) => &u.natural_key,
            BusinessUnit::Email(u) => &u.natural_key,
            BusinessUnit::Url(u) => &u.natural_key,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            BusinessUnit::Team(u) => &u.name,
            BusinessUnit::Contact(u) => &u.name,
            BusinessUnit::Document(u) => &u.name,
            BusinessUnit::Email(u) => &u.name,
            BusinessUnit::Url(u) => &u.name,
        }
    }

    /// Unit kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            BusinessUnit::Team(_) => "team",
            BusinessUnit::Contact(_) => "contact",
            BusinessUnit::Document(_) => "document",
            BusinessUnit::Email(_) => "email",
            BusinessUnit::Url(_) => "url",
        }
    }
}

/// Registry of business information for one model version.
#[derive(Debug, Clone, Default)]
pub struct BusinessInformation {
    version: String,
    teams: BTreeMap<UnitId, Team>,
    contacts: BTreeMap<UnitId, Contact>,
    documents: BTreeMap<UnitId, Document>,
    emails: BTreeMap<UnitId, Email>,
    urls: BTreeMap<UnitId, Url>,
    all_units_by_id: BTreeMap<UnitId, BusinessUnit>,
    all_units_by_natural_key: BTreeMap<String, UnitId>,
}

impl BusinessInformation {
    /// Create an empty registry for `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Model version tag.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register a team (not its contacts).
    pub fn register_team(&mut self, team: Team) -> Result<()> {
        self.admit(BusinessUnit::Team(team.clone()))?;
        self.teams.insert(team.id.clone(), team);
        Ok(())
    }

    /// Register a team together with every contact, email and url it carries.
    pub fn register_team_with_members(&mut self, team: Team) -> Result<()> {
        for contact in &team.contacts {
            self.register_contact_with_channels(contact.clone())?;
        }
        self.register_team(team)
    }

    /// Register a contact (not its channels).
    pub fn register_contact(&mut self, contact: Contact) -> Result<()> {
        self.admit(BusinessUnit::Contact(contact.clone()))?;
        self.contacts.insert(contact.id.clone(), contact);
        Ok(())
    }

    /// Register a contact together with its emails and urls.
    pub fn register_contact_with_channels(&mut self, contact: Contact) -> Result<()> {
        for email in &contact.emails {
            self.register_email(email.clone())?;
        }
        for url in &contact.urls {
            self.register_url(url.clone())?;
        }
        self.register_contact(contact)
    }

    /// Register a document.
    pub fn register_document(&mut self, document: Document) -> Result<()> {
        self.admit(BusinessUnit::Document(document.clone()))?;
        self.documents.insert(document.id.clone(), document);
        Ok(())
    }

    /// Register an email.
    pub fn register_email(&mut self, email: Email) -> Result<()> {
        self.admit(BusinessUnit::Email(email.clone()))?;
        self.emails.insert(email.id.clone(), email);
        Ok(())
    }

    /// Register a url.
    pub fn register_url(&mut self, url: Url) -> Result<()> {
        self.admit(BusinessUnit::Url(url.clone()))?;
        self.urls.insert(url.id.clone(), url);
        Ok(())
    }

    fn admit(&mut self, unit: BusinessUnit) -> Result<()> {
        ensure_natural_key(unit.kind(), unit.natural_key())?;
        ensure_same_identity(
            unit.id(),
            self.all_units_by_id
                .get(unit.id())
                .map(|u| (u.kind(), u.natural_key())),
            (unit.kind(), unit.natural_key()),
        )?;
        self.all_units_by_natural_key
            .insert(unit.natural_key().to_string(), unit.id().clone());
        self.all_units_by_id.insert(unit.id().clone(), unit);
        Ok(())
    }

    /// Look up any unit by id.
    pub fn unit(&self, id: &UnitId) -> Result<&BusinessUnit> {
        self.all_units_by_id
            .get(id)
            .ok_or_else(|| Error::not_found("business unit", id))
    }

    /// Look up any unit by natural key.
    pub fn unit_by_natural_key(&self, natural_key: &str) -> Result<&BusinessUnit> {
        self.all_units_by_natural_key
            .get(natural_key)
            .and_then(|id| self.all_units_by_id.get(id))
            .ok_or_else(|| Error::not_found("business unit", natural_key))
    }

    /// Look up a team by id.
    pub fn team(&self, id: &UnitId) -> Result<&Team> {
        self.teams.get(id).ok_or_else(|| Error::not_found("team", id))
    }

    /// Look up a document by id.
    pub fn document(&self, id: &UnitId) -> Result<&Document> {
        self.documents
            .get(id)
            .ok_or_else(|| Error::not_found("document", id))
    }

    /// Check whether a unit with this id is registered.
    pub fn contains(&self, id: &UnitId) -> bool {
        self.all_units_by_id.contains_key(id)
    }

    /// All units keyed by id.
    pub fn all_units_by_id(&self) -> &BTreeMap<UnitId, BusinessUnit> {
        &self.all_units_by_id
    }

    pub fn teams(&self) -> &BTreeMap<UnitId, Team> {
        &self.teams
    }

    pub fn contacts(&self) -> &BTreeMap<UnitId, Contact> {
        &self.contacts
    }

    pub fn documents(&self) -> &BTreeMap<UnitId, Document> {
        &self.documents
    }

    pub fn emails(&self) -> &BTreeMap<UnitId, Email> {
        &self.emails
    }

    pub fn urls(&self) -> &BTreeMap<UnitId, Url> {
        &self.urls
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.all_units_by_id.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.all_units_by_id.is_empty()
    }
}
