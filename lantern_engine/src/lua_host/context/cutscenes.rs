use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Function, Lua, RegistryKey, Result as LuaResult};

use super::bindings::{resume_thread, spawn_thread, stop_thread_now};
use super::functions::DeferredAction;
use super::threads::ThreadScope;
use super::EngineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutscenePhase {
    Init,
    RunBody,
    RunOverride,
}

/// The single active cutscene. Threads started while it runs take the
/// cutscene scope and die with it; the calling thread stays suspended until
/// the body (or its override) finishes.
#[derive(Debug)]
pub(super) struct CutsceneState {
    caller: u32,
    body_thread: u32,
    override_closure: Option<RegistryKey>,
    override_requested: bool,
    override_thread: Option<u32>,
    input_was_active: bool,
    phase: CutscenePhase,
}

impl CutsceneState {
    pub(super) fn new(
        caller: u32,
        body_thread: u32,
        override_closure: Option<RegistryKey>,
        input_was_active: bool,
    ) -> Self {
        CutsceneState {
            caller,
            body_thread,
            override_closure,
            override_requested: false,
            override_thread: None,
            input_was_active,
            phase: CutscenePhase::Init,
        }
    }

    /// Marks the skip request. Takes effect on the next cutscene tick; a
    /// second request, or one during the override itself, is a no-op.
    pub(super) fn request_override(&mut self) -> bool {
        if self.phase == CutscenePhase::RunOverride || self.override_requested {
            return false;
        }
        self.override_requested = true;
        true
    }
}

enum CutsceneStep {
    Idle,
    StartBody(u32),
    SwitchToOverride,
    Finish,
}

/// Drives the active cutscene one frame forward. Runs after the deferred
/// actions so a body finishing this frame ends the cutscene this frame.
pub(super) fn tick_cutscene(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> LuaResult<()> {
    let step = {
        let ctx = context.borrow();
        match ctx.cutscene() {
            None => return Ok(()),
            Some(state) => match state.phase {
                CutscenePhase::Init => CutsceneStep::StartBody(state.body_thread),
                CutscenePhase::RunBody => {
                    if state.override_requested && state.override_closure.is_some() {
                        CutsceneStep::SwitchToOverride
                    } else if !ctx.threads().is_alive(state.body_thread) {
                        CutsceneStep::Finish
                    } else {
                        CutsceneStep::Idle
                    }
                }
                CutscenePhase::RunOverride => match state.override_thread {
                    Some(thread) if ctx.threads().is_alive(thread) => CutsceneStep::Idle,
                    _ => CutsceneStep::Finish,
                },
            },
        }
    };
    match step {
        CutsceneStep::Idle => Ok(()),
        CutsceneStep::StartBody(body) => {
            if let Some(state) = context.borrow_mut().cutscene_mut() {
                state.phase = CutscenePhase::RunBody;
            }
            resume_thread(lua, context, body, None)
        }
        CutsceneStep::SwitchToOverride => switch_to_override(lua, context),
        CutsceneStep::Finish => finish_cutscene(lua, context),
    }
}

fn switch_to_override(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> LuaResult<()> {
    let (body, closure_key) = {
        let mut ctx = context.borrow_mut();
        let state = match ctx.cutscene_mut() {
            Some(state) => state,
            None => return Ok(()),
        };
        let key = match state.override_closure.take() {
            Some(key) => key,
            None => return Ok(()),
        };
        (state.body_thread, key)
    };
    // everything the body started goes down with it
    let cutscene_ids = context.borrow().threads().ids_in_scope(ThreadScope::Cutscene);
    for id in cutscene_ids {
        if id != body {
            stop_thread_now(lua, context, id)?;
        }
    }
    stop_thread_now(lua, context, body)?;

    let closure: Function = lua.registry_value(&closure_key)?;
    lua.remove_registry_value(closure_key)?;
    let override_thread = spawn_thread(lua, context, closure, ThreadScope::Cutscene, "override")?;
    {
        let mut ctx = context.borrow_mut();
        ctx.log_event("cutscene.override".to_string());
        if let Some(state) = ctx.cutscene_mut() {
            state.phase = CutscenePhase::RunOverride;
            state.override_thread = Some(override_thread);
        }
    }
    resume_thread(lua, context, override_thread, None)
}

fn finish_cutscene(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> LuaResult<()> {
    let (caller, leftover, input_was_active) = {
        let mut ctx = context.borrow_mut();
        match ctx.take_cutscene() {
            Some(state) => (
                state.caller,
                state.override_closure,
                state.input_was_active,
            ),
            None => return Ok(()),
        }
    };
    let cutscene_ids = context.borrow().threads().ids_in_scope(ThreadScope::Cutscene);
    for id in cutscene_ids {
        stop_thread_now(lua, context, id)?;
    }
    if let Some(key) = leftover {
        lua.remove_registry_value(key)?;
    }
    let mut ctx = context.borrow_mut();
    ctx.set_input_active(input_was_active);
    ctx.log_event("cutscene.end".to_string());
    ctx.bump_counter("cutscene.finished");
    // the caller resumes next frame, after the world has seen the end state
    ctx.queue_action(DeferredAction::wakeup(caller));
    Ok(())
}
