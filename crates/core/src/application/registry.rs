// Registration Table - name -> registration, immutable once runs begin

use crate::domain::{Predicate, Registration};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Table of registrations keyed by case-insensitive name
///
/// Populated at setup; shared read-only (`Arc<RegistrationTable>`) by the
/// executor and scheduler afterwards.
#[derive(Default)]
pub struct RegistrationTable {
    registrations: Vec<Arc<Registration>>,
    index: HashMap<String, usize>,
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration
    ///
    /// # Errors
    /// - AppError::DuplicateRegistration if the name (ignoring case) is taken
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        let key = registration.name().to_lowercase();
        if self.index.contains_key(&key) {
            return Err(AppError::DuplicateRegistration(
                registration.name().to_string(),
            ));
        }

        debug!(
            name = %registration.name(),
            severity = %registration.failure_severity(),
            timeout_ms = registration.timeout().as_millis() as u64,
            tags = ?registration.tags(),
            "Probe registered"
        );

        self.index.insert(key, self.registrations.len());
        self.registrations.push(Arc::new(registration));
        Ok(())
    }

    /// Registrations selected by `predicate`, in registration order
    ///
    /// `None` selects every registration.
    pub fn filtered(&self, predicate: Option<&Predicate>) -> Vec<Arc<Registration>> {
        self.registrations
            .iter()
            .filter(|reg| predicate.map_or(true, |p| p(reg.as_ref())))
            .cloned()
            .collect()
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&Arc<Registration>> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.registrations[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|reg| reg.name())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
