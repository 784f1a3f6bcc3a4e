use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use mlua::{Function, Lua, RegistryKey, Result as LuaResult, Thread};

use super::bindings::push_object_table;
use super::EngineContext;

/// One hotspot trigger, keyed by the object it watches. The dispatcher is a
/// persistent Lua coroutine parked on a yield; invocations resume it with
/// the closure to run, so two invocations can never overlap.
#[derive(Debug)]
pub(super) struct TriggerRecord {
    inside: RegistryKey,
    outside: Option<RegistryKey>,
    dispatcher: RegistryKey,
    actor_inside: bool,
}

/// Registry keys to release after a trigger is removed or replaced.
#[derive(Debug)]
pub(super) struct TriggerCleanup {
    pub(super) keys: Vec<RegistryKey>,
}

impl TriggerRecord {
    fn into_cleanup(self) -> TriggerCleanup {
        let mut keys = vec![self.inside, self.dispatcher];
        keys.extend(self.outside);
        TriggerCleanup { keys }
    }
}

#[derive(Debug)]
pub(super) struct TriggerRuntime {
    records: BTreeMap<u32, TriggerRecord>,
}

impl TriggerRuntime {
    pub(super) fn new() -> Self {
        TriggerRuntime {
            records: BTreeMap::new(),
        }
    }

    pub(super) fn add(
        &mut self,
        object: u32,
        inside: RegistryKey,
        outside: Option<RegistryKey>,
        dispatcher: RegistryKey,
    ) -> Option<TriggerCleanup> {
        self.records
            .insert(
                object,
                TriggerRecord {
                    inside,
                    outside,
                    dispatcher,
                    actor_inside: false,
                },
            )
            .map(TriggerRecord::into_cleanup)
    }

    pub(super) fn remove(&mut self, object: u32) -> Option<TriggerCleanup> {
        self.records.remove(&object).map(TriggerRecord::into_cleanup)
    }

    pub(super) fn object_ids(&self) -> Vec<u32> {
        self.records.keys().copied().collect()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn get(&self, object: u32) -> Option<&TriggerRecord> {
        self.records.get(&object)
    }

    fn set_actor_inside(&mut self, object: u32, inside: bool) {
        if let Some(record) = self.records.get_mut(&object) {
            record.actor_inside = inside;
        }
    }

    fn swap_dispatcher(&mut self, object: u32, dispatcher: RegistryKey) -> Option<RegistryKey> {
        self.records
            .get_mut(&object)
            .map(|record| std::mem::replace(&mut record.dispatcher, dispatcher))
    }
}

/// Creates a fresh dispatcher coroutine from the prelude loop and parks it
/// on its first yield.
pub(super) fn make_dispatcher(lua: &Lua) -> LuaResult<RegistryKey> {
    let dispatch_loop: Function = lua.globals().get("__trigger_loop")?;
    let thread = lua.create_thread(dispatch_loop)?;
    thread.resume::<_, ()>(())?;
    lua.create_registry_value(thread)
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Enter,
    Exit,
}

/// Per-frame containment check of the selected actor against every trigger's
/// hotspot. Fires closures on edges only.
pub(super) fn evaluate_triggers(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> LuaResult<()> {
    let firings = {
        let mut ctx = context.borrow_mut();
        let (actor, position) = match ctx
            .actors()
            .selected()
            .and_then(|id| ctx.actors().get(id).map(|record| (id, record.position())))
        {
            Some(snapshot) => snapshot,
            None => return Ok(()),
        };
        let mut firings = Vec::new();
        for object in ctx.triggers().object_ids() {
            let hotspot = match ctx.objects().get(object) {
                Some(record) => record.hotspot(),
                None => continue,
            };
            let was_inside = match ctx.triggers().get(object) {
                Some(record) => record.actor_inside,
                None => continue,
            };
            let is_inside = hotspot.contains(position);
            if is_inside == was_inside {
                continue;
            }
            ctx.triggers_mut().set_actor_inside(object, is_inside);
            let edge = if is_inside { Edge::Enter } else { Edge::Exit };
            let object_name = ctx
                .objects()
                .get(object)
                .map(|record| record.name().to_string())
                .unwrap_or_default();
            let event = match edge {
                Edge::Enter => format!("trigger.inside {object_name} (#{object})"),
                Edge::Exit => format!("trigger.outside {object_name} (#{object})"),
            };
            ctx.log_event(event);
            firings.push((object, actor, edge));
        }
        firings
    };

    for (object, actor, edge) in firings {
        fire_trigger(lua, context, object, actor, edge)?;
    }
    Ok(())
}

fn fire_trigger(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    object: u32,
    actor: u32,
    edge: Edge,
) -> LuaResult<()> {
    let fetched = {
        let ctx = context.borrow();
        let record = match ctx.triggers().get(object) {
            Some(record) => record,
            None => return Ok(()),
        };
        let closure_key = match edge {
            Edge::Enter => Some(&record.inside),
            Edge::Exit => record.outside.as_ref(),
        };
        match closure_key {
            Some(key) => Some((
                lua.registry_value::<Function>(key)?,
                lua.registry_value::<Thread>(&record.dispatcher)?,
            )),
            None => None,
        }
    };
    let (closure, dispatcher) = match fetched {
        Some(pair) => pair,
        None => return Ok(()),
    };
    let object_table = push_object_table(lua, context, object)?;
    let actor_table = push_object_table(lua, context, actor)?;
    if let Err(err) = dispatcher.resume::<_, ()>((closure, object_table, actor_table)) {
        context
            .borrow_mut()
            .log_event(format!("trigger.error #{object}: {err}"));
        // the coroutine died with the closure; park a fresh one so the
        // trigger keeps firing on later edges
        let replacement = make_dispatcher(lua)?;
        let old = context
            .borrow_mut()
            .triggers_mut()
            .swap_dispatcher(object, replacement);
        if let Some(key) = old {
            lua.remove_registry_value(key)?;
        }
    }
    Ok(())
}
