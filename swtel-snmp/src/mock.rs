//! In-memory SNMP agent for testing.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use crate::client::{SnmpClient, SnmpError};
use crate::oid::Oid;
use crate::pdu::{Value, Varbind};

/// A scripted outcome for the next `get` call.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scripted {
    Fail(String),
    Empty,
}

/// Mock client backed by an ordered object table.
///
/// `get` answers missing instances with `noSuchInstance`, the same way a
/// real agent does. Failures and empty responses can be queued for upcoming
/// `get` calls.
#[derive(Debug, Default)]
pub struct MockSnmpClient {
    table: RwLock<BTreeMap<Oid, Value>>,
    script: Mutex<VecDeque<Scripted>>,
    walk_error: RwLock<Option<String>>,
    get_calls: AtomicUsize,
    walk_calls: AtomicUsize,
}

impl MockSnmpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mock from `(oid, value)` pairs.
    pub fn with_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (Oid, Value)>,
    {
        let mock = Self::new();
        for (name, value) in values {
            mock.set(name, value);
        }
        mock
    }

    /// Set or replace one object.
    pub fn set(&self, name: Oid, value: Value) {
        self.table
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, value);
    }

    /// Make the next `get` fail with an IO error carrying `message`.
    pub fn fail_next_get(&self, message: &str) {
        self.push(Scripted::Fail(message.to_string()));
    }

    /// Make the next `get` succeed with no bindings.
    pub fn respond_empty_next(&self) {
        self.push(Scripted::Empty);
    }

    /// Make every `walk` fail with `message`, or clear with `None`.
    pub fn set_walk_error(&self, message: Option<&str>) {
        *self.walk_error.write().unwrap_or_else(|e| e.into_inner()) = message.map(str::to_string);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn walk_calls(&self) -> usize {
        self.walk_calls.load(Ordering::SeqCst)
    }

    fn push(&self, scripted: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(scripted);
    }
}

fn io_error(message: &str) -> SnmpError {
    SnmpError::Io(io::Error::new(io::ErrorKind::Other, message.to_string()))
}

impl SnmpClient for MockSnmpClient {
    fn walk(&self, prefix: &Oid) -> Result<Vec<Varbind>, SnmpError> {
        self.walk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self
            .walk_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_deref()
        {
            return Err(io_error(message));
        }

        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        Ok(table
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .filter(|(name, _)| *name != prefix)
            .map(|(name, value)| Varbind::new(name.clone(), value.clone()))
            .collect())
    }

    fn get(&self, names: &[Oid]) -> Result<Vec<Varbind>, SnmpError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(Scripted::Fail(message)) => return Err(io_error(&message)),
            Some(Scripted::Empty) => return Ok(Vec::new()),
            None => {}
        }

        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        Ok(names
            .iter()
            .map(|name| {
                let value = table.get(name).cloned().unwrap_or(Value::NoSuchInstance);
                Varbind::new(name.clone(), value)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> Oid {
        s.parse().expect("valid oid")
    }

    fn mock() -> MockSnmpClient {
        MockSnmpClient::with_values([
            (oid(".1.3.6.1.2.1.31.1.1.1.18.524"), Value::OctetString(b"xe-0/0/12".to_vec())),
            (oid(".1.3.6.1.2.1.31.1.1.1.18.568"), Value::OctetString(b"uplink-10g".to_vec())),
            (oid(".1.3.6.1.2.1.31.1.1.1.180.1"), Value::Integer(1)),
            (oid(".1.3.6.1.2.1.31.1.1.1.6.524"), Value::Counter64(275)),
        ])
    }

    #[test]
    fn test_walk_returns_subtree_in_order() {
        let result = mock().walk(&oid(".1.3.6.1.2.1.31.1.1.1.18")).expect("walk");
        let names: Vec<String> = result.iter().map(|vb| vb.name.to_string()).collect();
        assert_eq!(
            names,
            vec![".1.3.6.1.2.1.31.1.1.1.18.524", ".1.3.6.1.2.1.31.1.1.1.18.568"]
        );
    }

    #[test]
    fn test_get_missing_instance() {
        let result = mock()
            .get(&[oid(".1.3.6.1.2.1.31.1.1.1.6.524"), oid(".1.3.6.1.2.1.31.1.1.1.6.1")])
            .expect("get");
        assert_eq!(result[0].value, Value::Counter64(275));
        assert_eq!(result[1].value, Value::NoSuchInstance);
    }

    #[test]
    fn test_scripted_failure_applies_once() {
        let client = mock();
        client.fail_next_get("timeout");
        let names = [oid(".1.3.6.1.2.1.31.1.1.1.6.524")];

        let err = client.get(&names).unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(client.get(&names).is_ok());
        assert_eq!(client.get_calls(), 2);
    }

    #[test]
    fn test_scripted_empty_response() {
        let client = mock();
        client.respond_empty_next();
        assert!(client
            .get(&[oid(".1.3.6.1.2.1.31.1.1.1.6.524")])
            .expect("get")
            .is_empty());
    }

    #[test]
    fn test_walk_error() {
        let client = mock();
        client.set_walk_error(Some("unreachable"));
        assert!(client.walk(&oid(".1.3")).is_err());
        client.set_walk_error(None);
        assert!(client.walk(&oid(".1.3")).is_ok());
        assert_eq!(client.walk_calls(), 2);
    }

    #[test]
    fn test_set_updates_value() {
        let client = mock();
        let name = oid(".1.3.6.1.2.1.31.1.1.1.6.524");
        client.set(name.clone(), Value::Counter64(511));
        assert_eq!(client.get(&[name]).expect("get")[0].value, Value::Counter64(511));
    }
}
