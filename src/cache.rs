use std::collections::HashMap;

use parking_lot::Mutex;

use crate::context::ContextId;
use crate::run::RunId;
use crate::value::{Fingerprint, Value};

type Partition = HashMap<ContextId, HashMap<Fingerprint, Value>>;

/// Memoized results of one cached dependency, partitioned by top-level run and, within a run, by
/// the flow context the dependency was resolved from.  Contexts bind the dependency's own
/// dependencies independently, so a result is only reused under the context that produced it.
///
/// The lock is only ever held for a lookup or an insert, never while the dependency runs, so
/// concurrent runs sharing the dependency interleave freely.
#[derive(Default)]
pub(crate) struct MemoTable(Mutex<HashMap<RunId, Partition>>);
impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run: RunId, context: ContextId, fingerprint: &Fingerprint) -> Option<Value> {
        self.0.lock().get(&run)?.get(&context)?.get(fingerprint).cloned()
    }

    /// Stores `value` unless another call in the same run and context got there first; either
    /// way returns the value now stored.
    pub fn insert(
        &self,
        run: RunId,
        context: ContextId,
        fingerprint: Fingerprint,
        value: Value,
    ) -> Value {
        self.0
            .lock()
            .entry(run)
            .or_default()
            .entry(context)
            .or_default()
            .entry(fingerprint)
            .or_insert(value)
            .clone()
    }

    /// Forgets everything memoized for `run`, leaving other runs untouched.
    pub fn invalidate(&self, run: RunId) -> usize {
        self.0.lock().remove(&run).map_or(0, |partition| count(&partition))
    }

    pub fn len(&self, run: RunId) -> usize {
        self.0.lock().get(&run).map_or(0, count)
    }
}

fn count(partition: &Partition) -> usize {
    partition.values().map(HashMap::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FlowContext;
    use crate::run::RunScope;

    fn fingerprint(index: i32) -> Fingerprint {
        let value = Value::new(index);
        Fingerprint::of([("index", &value)]).unwrap()
    }

    fn context(run: &RunScope) -> ContextId {
        FlowContext::new("hello_world", run.clone()).id()
    }

    #[test]
    fn partitions_by_run() {
        let table = MemoTable::new();
        let (first_run, second_run) = (RunScope::begin(), RunScope::begin());
        let (first, second) = (first_run.id(), second_run.id());
        let (first_context, second_context) = (context(&first_run), context(&second_run));

        table.insert(first, first_context, fingerprint(11), Value::new(String::from("first")));
        assert!(table.get(second, first_context, &fingerprint(11)).is_none());

        table.insert(second, second_context, fingerprint(11), Value::new(String::from("second")));
        assert_eq!(
            table
                .get(first, first_context, &fingerprint(11))
                .unwrap()
                .downcast_ref::<String>()
                .unwrap(),
            "first"
        );

        assert_eq!(table.invalidate(first), 1);
        assert!(table.get(first, first_context, &fingerprint(11)).is_none());
        assert_eq!(table.len(second), 1);
    }

    #[test]
    fn partitions_by_context_within_a_run() {
        let table = MemoTable::new();
        let run = RunScope::begin();
        let (outer, nested) = (context(&run), context(&run));

        table.insert(run.id(), outer, fingerprint(11), Value::new(String::from("HELLO")));
        assert!(table.get(run.id(), nested, &fingerprint(11)).is_none());

        table.insert(run.id(), nested, fingerprint(11), Value::new(String::from("HI")));
        assert_eq!(table.len(run.id()), 2);
        assert_eq!(table.invalidate(run.id()), 2);
        assert_eq!(table.len(run.id()), 0);
    }

    #[test]
    fn first_insert_wins() {
        let table = MemoTable::new();
        let run = RunScope::begin();
        let context = context(&run);
        let stored = table.insert(run.id(), context, fingerprint(11), Value::new(1_i32));
        let again = table.insert(run.id(), context, fingerprint(11), Value::new(2_i32));
        assert!(stored.ptr_eq(&again));
        assert_eq!(table.len(run.id()), 1);
    }
}
