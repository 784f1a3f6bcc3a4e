use std::collections::BTreeMap;

use mlua::RegistryKey;

use super::super::types::THREAD_ID_START;

/// Ownership scope of a script thread. The thread runtime is the sole owner
/// of every record; rooms and cutscenes hold ids only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ThreadScope {
    Global,
    Room(u32),
    Cutscene,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ThreadState {
    Running,
    Suspended,
    Dead,
}

#[derive(Debug)]
pub(super) struct ThreadRecord {
    label: String,
    scope: ThreadScope,
    state: ThreadState,
    // pauseable threads hold their wake-ups while a cutscene runs
    pauseable: bool,
    coroutine: Option<RegistryKey>,
    closure: Option<RegistryKey>,
}

/// Registry keys released when a record goes dead; the caller removes them
/// from the Lua registry since only it holds the `Lua` handle.
#[derive(Debug, Default)]
pub(super) struct ThreadCleanup {
    pub(super) coroutine: Option<RegistryKey>,
    pub(super) closure: Option<RegistryKey>,
}

/// Arena of script threads keyed by ids in the thread range. Ids are never
/// reused, so a lookup miss is exactly a stale handle.
#[derive(Debug)]
pub(super) struct ThreadRuntime {
    next_id: u32,
    records: BTreeMap<u32, ThreadRecord>,
}

impl ThreadRuntime {
    pub(super) fn new() -> Self {
        ThreadRuntime {
            next_id: THREAD_ID_START,
            records: BTreeMap::new(),
        }
    }

    /// Registers a freshly created coroutine. The thread is not started;
    /// the first resume happens through the bindings layer.
    pub(super) fn spawn(
        &mut self,
        label: String,
        scope: ThreadScope,
        coroutine: RegistryKey,
        closure: RegistryKey,
    ) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(
            id,
            ThreadRecord {
                label,
                scope,
                state: ThreadState::Suspended,
                pauseable: true,
                coroutine: Some(coroutine),
                closure: Some(closure),
            },
        );
        id
    }

    pub(super) fn is_alive(&self, id: u32) -> bool {
        self.records
            .get(&id)
            .map(|record| record.state != ThreadState::Dead)
            .unwrap_or(false)
    }

    pub(super) fn is_suspended(&self, id: u32) -> bool {
        self.records
            .get(&id)
            .map(|record| record.state == ThreadState::Suspended)
            .unwrap_or(false)
    }

    pub(super) fn set_state(&mut self, id: u32, state: ThreadState) {
        if let Some(record) = self.records.get_mut(&id) {
            if record.state != ThreadState::Dead {
                record.state = state;
            }
        }
    }

    pub(super) fn is_pauseable(&self, id: u32) -> bool {
        self.records
            .get(&id)
            .map(|record| record.pauseable)
            .unwrap_or(false)
    }

    pub(super) fn set_pauseable(&mut self, id: u32, pauseable: bool) {
        if let Some(record) = self.records.get_mut(&id) {
            record.pauseable = pauseable;
        }
    }

    pub(super) fn scope(&self, id: u32) -> Option<ThreadScope> {
        self.records.get(&id).map(|record| record.scope)
    }

    pub(super) fn coroutine_key(&self, id: u32) -> Option<&RegistryKey> {
        self.records.get(&id).and_then(|record| {
            if record.state == ThreadState::Dead {
                None
            } else {
                record.coroutine.as_ref()
            }
        })
    }

    pub(super) fn label(&self, id: u32) -> Option<String> {
        self.records.get(&id).map(|record| record.label.clone())
    }

    /// Forces a record to `Dead`. Idempotent: a second kill returns `None`
    /// and the record transitions exactly once.
    pub(super) fn kill(&mut self, id: u32) -> Option<ThreadCleanup> {
        let record = self.records.get_mut(&id)?;
        if record.state == ThreadState::Dead {
            return None;
        }
        record.state = ThreadState::Dead;
        Some(ThreadCleanup {
            coroutine: record.coroutine.take(),
            closure: record.closure.take(),
        })
    }

    pub(super) fn ids_in_scope(&self, scope: ThreadScope) -> Vec<u32> {
        self.records
            .iter()
            .filter(|(_, record)| record.scope == scope && record.state != ThreadState::Dead)
            .map(|(id, _)| *id)
            .collect()
    }

    pub(super) fn live_count(&self) -> usize {
        self.records
            .values()
            .filter(|record| record.state != ThreadState::Dead)
            .count()
    }

    /// Drops dead records. Their registry keys were already released when
    /// the record was killed.
    pub(super) fn prune_dead(&mut self) {
        self.records
            .retain(|_, record| record.state != ThreadState::Dead);
    }
}
