use crate::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Role that marks a person as a platform administrator, the target of
/// `FALLBACK_ADMIN` resolution.
pub const PLATFORM_ADMIN_ROLE: &str = "platform-admin";

/// A person as seen through the external directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

/// Read-only contract onto the external person directory.
///
/// The engine never mutates people; the directory is an external collaborator
/// resolved before the core is invoked.
pub trait PersonDirectory: Send + Sync {
    /// Resolve one person by id, active or not.
    fn get(&self, id: &PersonId) -> Option<Person>;

    /// All active people holding the given role.
    fn people_with_role(&self, role: &str) -> Vec<Person>;

    /// All active people.
    fn list_active(&self) -> Vec<Person>;

    /// All active platform administrators.
    fn administrators(&self) -> Vec<Person> {
        self.people_with_role(PLATFORM_ADMIN_ROLE)
    }
}

/// In-memory directory used by tests and local wiring.
#[derive(Default)]
pub struct InMemoryDirectory {
    people: RwLock<HashMap<PersonId, Person>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, person: Person) {
        if let Ok(mut guard) = self.people.write() {
            guard.insert(person.id.clone(), person);
        }
    }

    /// Convenience for tests: insert an active person with a role.
    pub fn insert_active(&self, id: impl Into<String>, name: &str, role: &str) -> PersonId {
        let person_id = PersonId::new(id);
        self.insert(Person {
            id: person_id.clone(),
            name: name.to_string(),
            email: format!("{}@example.com", person_id),
            role: role.to_string(),
            is_active: true,
        });
        person_id
    }

    pub fn deactivate(&self, id: &PersonId) {
        if let Ok(mut guard) = self.people.write() {
            if let Some(person) = guard.get_mut(id) {
                person.is_active = false;
            }
        }
    }
}

impl PersonDirectory for InMemoryDirectory {
    fn get(&self, id: &PersonId) -> Option<Person> {
        self.people
            .read()
            .ok()
            .and_then(|guard| guard.get(id).cloned())
    }

    fn people_with_role(&self, role: &str) -> Vec<Person> {
        let mut people: Vec<Person> = self
            .people
            .read()
            .map(|guard| {
                guard
                    .values()
                    .filter(|person| person.is_active && person.role == role)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        people.sort_by(|a, b| a.id.cmp(&b.id));
        people
    }

    fn list_active(&self) -> Vec<Person> {
        let mut people: Vec<Person> = self
            .people
            .read()
            .map(|guard| {
                guard
                    .values()
                    .filter(|person| person.is_active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        people.sort_by(|a, b| a.id.cmp(&b.id));
        people
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_lookup_skips_inactive_people() {
        let directory = InMemoryDirectory::new();
        let kept = directory.insert_active("p-1", "Ana", "finance-lead");
        let dropped = directory.insert_active("p-2", "Bo", "finance-lead");
        directory.deactivate(&dropped);

        let people = directory.people_with_role("finance-lead");
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, kept);
    }

    #[test]
    fn administrators_use_the_platform_admin_role() {
        let directory = InMemoryDirectory::new();
        directory.insert_active("adm-2", "Zoe", PLATFORM_ADMIN_ROLE);
        directory.insert_active("adm-1", "Yuri", PLATFORM_ADMIN_ROLE);
        directory.insert_active("p-1", "Ana", "engineer");

        let admins = directory.administrators();
        assert_eq!(admins.len(), 2);
        // Sorted by id for deterministic resolution output.
        assert_eq!(admins[0].id, PersonId::new("adm-1"));
    }
}
