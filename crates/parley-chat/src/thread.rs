//! Named conversation threads within one session.

use serde::Serialize;

use crate::error::ChatError;
use crate::store::SessionStore;

/// Summary of one thread, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub name: String,
    pub message_count: usize,
    pub active: bool,
}

/// Ordered set of named threads with one active thread.
///
/// Always holds at least one thread.
#[derive(Debug, Clone)]
pub struct ThreadBook {
    threads: Vec<(String, SessionStore)>,
    /// Index into `threads`.
    active: usize,
}

impl ThreadBook {
    /// Create a book holding one empty thread, which is active.
    ///
    /// A blank name falls back to `"main"`.
    pub fn new(initial: &str) -> Self {
        let name = match initial.trim() {
            "" => "main".to_string(),
            trimmed => trimmed.to_string(),
        };
        Self {
            threads: vec![(name, SessionStore::new())],
            active: 0,
        }
    }

    pub fn active_name(&self) -> &str {
        &self.threads[self.active].0
    }

    pub fn active(&self) -> &SessionStore {
        &self.threads[self.active].1
    }

    pub fn active_mut(&mut self) -> &mut SessionStore {
        &mut self.threads[self.active].1
    }

    pub fn get(&self, name: &str) -> Option<&SessionStore> {
        self.threads
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, store)| store)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SessionStore> {
        self.threads
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, store)| store)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Never true: a book always holds at least one thread.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Threads in creation order.
    pub fn list(&self) -> Vec<ThreadSummary> {
        self.threads
            .iter()
            .enumerate()
            .map(|(idx, (name, store))| ThreadSummary {
                name: name.clone(),
                message_count: store.len(),
                active: idx == self.active,
            })
            .collect()
    }

    /// Add an empty thread. Does not change the active thread.
    pub fn create(&mut self, name: &str) -> Result<(), ChatError> {
        let name = normalize(name)?;
        if self.contains(&name) {
            return Err(ChatError::ThreadExists(name));
        }
        self.threads.push((name, SessionStore::new()));
        Ok(())
    }

    /// Make an existing thread the active one.
    pub fn switch(&mut self, name: &str) -> Result<(), ChatError> {
        let name = name.trim();
        self.active = self
            .position(name)
            .ok_or_else(|| ChatError::ThreadNotFound(name.to_string()))?;
        Ok(())
    }

    /// Remove a thread and its history.
    ///
    /// Deleting the last thread is rejected. Deleting the active thread
    /// activates the first remaining one.
    pub fn delete(&mut self, name: &str) -> Result<(), ChatError> {
        let name = name.trim();
        let idx = self
            .position(name)
            .ok_or_else(|| ChatError::ThreadNotFound(name.to_string()))?;
        if self.threads.len() == 1 {
            return Err(ChatError::LastThread);
        }
        self.threads.remove(idx);
        if idx == self.active {
            self.active = 0;
        } else if idx < self.active {
            self.active -= 1;
        }
        Ok(())
    }

    /// Resolve an optional thread name to an existing thread name.
    pub fn resolve(&self, name: Option<&str>) -> Result<String, ChatError> {
        match name.map(str::trim) {
            None | Some("") => Ok(self.active_name().to_string()),
            Some(n) if self.contains(n) => Ok(n.to_string()),
            Some(n) => Err(ChatError::ThreadNotFound(n.to_string())),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.threads.iter().position(|(n, _)| n == name)
    }

    /// Total messages across all threads.
    pub fn message_count(&self) -> usize {
        self.threads.iter().map(|(_, s)| s.len()).sum()
    }
}

fn normalize(name: &str) -> Result<String, ChatError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidThreadName);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::Message;

    #[test]
    fn test_new_book_has_one_active_thread() {
        let book = ThreadBook::new("main");
        assert_eq!(book.len(), 1);
        assert_eq!(book.active_name(), "main");
        assert!(book.active().is_empty());
    }

    #[test]
    fn test_blank_initial_name_falls_back() {
        let book = ThreadBook::new("   ");
        assert_eq!(book.active_name(), "main");
    }

    #[test]
    fn test_create_and_switch() {
        let mut book = ThreadBook::new("main");
        book.create("work").unwrap();
        assert_eq!(book.active_name(), "main");
        book.switch("work").unwrap();
        assert_eq!(book.active_name(), "work");
        book.active_mut().append(Message::user("hi"));
        assert_eq!(book.get("work").unwrap().len(), 1);
        assert!(book.get("main").unwrap().is_empty());
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let mut book = ThreadBook::new("main");
        let err = book.create(" main ").unwrap_err();
        assert!(matches!(err, ChatError::ThreadExists(n) if n == "main"));
    }

    #[test]
    fn test_create_blank_rejected() {
        let mut book = ThreadBook::new("main");
        assert!(matches!(book.create("  "), Err(ChatError::InvalidThreadName)));
    }

    #[test]
    fn test_switch_unknown_rejected() {
        let mut book = ThreadBook::new("main");
        assert!(matches!(book.switch("nope"), Err(ChatError::ThreadNotFound(_))));
        assert_eq!(book.active_name(), "main");
    }

    #[test]
    fn test_delete_last_thread_rejected() {
        let mut book = ThreadBook::new("main");
        assert!(matches!(book.delete("main"), Err(ChatError::LastThread)));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_delete_active_thread_activates_first_remaining() {
        let mut book = ThreadBook::new("main");
        book.create("a").unwrap();
        book.create("b").unwrap();
        book.switch("b").unwrap();
        book.delete("b").unwrap();
        assert_eq!(book.active_name(), "main");
        book.switch("a").unwrap();
        book.delete("main").unwrap();
        assert_eq!(book.active_name(), "a");
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_delete_before_active_keeps_active_thread() {
        let mut book = ThreadBook::new("main");
        book.create("a").unwrap();
        book.create("b").unwrap();
        book.switch("b").unwrap();
        book.delete("a").unwrap();
        assert_eq!(book.active_name(), "b");
    }

    #[test]
    fn test_delete_unknown_rejected() {
        let mut book = ThreadBook::new("main");
        book.create("x").unwrap();
        assert!(matches!(book.delete("y"), Err(ChatError::ThreadNotFound(_))));
    }

    #[test]
    fn test_list_marks_active() {
        let mut book = ThreadBook::new("main");
        book.create("side").unwrap();
        book.get_mut("side").unwrap().append(Message::user("x"));
        let list = book.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "main");
        assert!(list[0].active);
        assert_eq!(list[1].message_count, 1);
        assert!(!list[1].active);
        assert_eq!(book.message_count(), 1);
    }

    #[test]
    fn test_resolve() {
        let mut book = ThreadBook::new("main");
        book.create("side").unwrap();
        assert_eq!(book.resolve(None).unwrap(), "main");
        assert_eq!(book.resolve(Some("")).unwrap(), "main");
        assert_eq!(book.resolve(Some("side")).unwrap(), "side");
        assert!(matches!(
            book.resolve(Some("ghost")),
            Err(ChatError::ThreadNotFound(_))
        ));
    }
}
