// Registration Filters

use super::registration::Registration;
use std::collections::HashSet;
use std::sync::Arc;

/// Predicate over registrations (true = include in the run)
pub type Predicate = Arc<dyn Fn(&Registration) -> bool + Send + Sync>;

/// Predicate constructors for selecting registrations by name or tags
pub struct RegistrationFilter;

impl RegistrationFilter {
    /// Include every registration
    pub fn all() -> Predicate {
        Arc::new(|_| true)
    }

    /// Include registrations carrying at least one of `tags`
    pub fn with_any_tag<I, S>(tags: I) -> Predicate
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: HashSet<String> = tags.into_iter().map(Into::into).collect();
        Arc::new(move |reg| reg.tags().iter().any(|tag| tags.contains(tag)))
    }

    /// Include registrations carrying every one of `tags`
    pub fn with_all_tags<I, S>(tags: I) -> Predicate
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        Arc::new(move |reg| tags.iter().all(|tag| reg.has_tag(tag)))
    }

    /// Include registrations whose name matches one of `names` (case-insensitive)
    pub fn named<I, S>(names: I) -> Predicate
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: HashSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_lowercase())
            .collect();
        Arc::new(move |reg| names.contains(&reg.name().to_lowercase()))
    }

    pub fn and(left: Predicate, right: Predicate) -> Predicate {
        Arc::new(move |reg| left(reg) && right(reg))
    }

    pub fn not(inner: Predicate) -> Predicate {
        Arc::new(move |reg| !inner(reg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::probe::mocks::MockProbe;

    fn reg(name: &str, tags: &[&str]) -> Registration {
        Registration::new(name, Arc::new(MockProbe::healthy()))
            .unwrap()
            .with_tags(tags.iter().copied())
    }

    #[test]
    fn test_any_tag() {
        let filter = RegistrationFilter::with_any_tag(["db", "cache"]);
        assert!(filter(&reg("pg", &["db"])));
        assert!(filter(&reg("redis", &["cache", "ready"])));
        assert!(!filter(&reg("disk", &["system"])));
        assert!(!filter(&reg("untagged", &[])));
    }

    #[test]
    fn test_all_tags() {
        let filter = RegistrationFilter::with_all_tags(["db", "ready"]);
        assert!(filter(&reg("pg", &["db", "ready", "live"])));
        assert!(!filter(&reg("pg-replica", &["db"])));
    }

    #[test]
    fn test_named_is_case_insensitive() {
        let filter = RegistrationFilter::named(["Postgres"]);
        assert!(filter(&reg("postgres", &[])));
        assert!(filter(&reg("POSTGRES", &[])));
        assert!(!filter(&reg("redis", &[])));
    }

    #[test]
    fn test_combinators() {
        let filter = RegistrationFilter::and(
            RegistrationFilter::with_any_tag(["ready"]),
            RegistrationFilter::not(RegistrationFilter::named(["slow"])),
        );
        assert!(filter(&reg("fast", &["ready"])));
        assert!(!filter(&reg("slow", &["ready"])));
        assert!(!filter(&reg("other", &[])));
        assert!(RegistrationFilter::all()(&reg("any", &[])));
    }
}
