use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Function, Lua, RegistryKey, Result as LuaResult};

use super::bindings::{resume_thread, stop_thread_now};
use super::threads::ThreadScope;
use super::EngineContext;

/// Which live entity a `breakwhileanimating` observes.
#[derive(Debug, Clone, Copy)]
pub(super) enum AnimationTarget {
    Actor(u32),
    Object(u32),
}

/// Closed catalogue of deferred actions: every break condition, plus the
/// side-effect-only actions the scheduler itself queues.
#[derive(Debug)]
pub(super) enum ActionKind {
    BreakHere {
        thread: u32,
    },
    BreakTime {
        thread: u32,
        duration: f32,
    },
    BreakWhileAnimating {
        thread: u32,
        target: AnimationTarget,
    },
    BreakWhileWalking {
        thread: u32,
        actor: u32,
    },
    BreakWhileTalking {
        thread: u32,
        actor: u32,
    },
    BreakWhileSound {
        thread: u32,
        sound: u32,
    },
    BreakWhileRunning {
        thread: u32,
        observed: u32,
    },
    BreakWhileDialog {
        thread: u32,
    },
    BreakWhileCutscene {
        thread: u32,
    },
    BreakWhileCamera {
        thread: u32,
    },
    BreakWhileInputOff {
        thread: u32,
    },
    WakeupThread {
        thread: u32,
    },
    StopThread {
        thread: u32,
    },
    Callback {
        duration: f32,
        closure: Option<RegistryKey>,
    },
}

impl ActionKind {
    /// The suspended thread a break condition will reawaken, if any.
    fn suspended_thread(&self) -> Option<u32> {
        match self {
            ActionKind::BreakHere { thread }
            | ActionKind::BreakTime { thread, .. }
            | ActionKind::BreakWhileAnimating { thread, .. }
            | ActionKind::BreakWhileWalking { thread, .. }
            | ActionKind::BreakWhileTalking { thread, .. }
            | ActionKind::BreakWhileSound { thread, .. }
            | ActionKind::BreakWhileRunning { thread, .. }
            | ActionKind::BreakWhileDialog { thread }
            | ActionKind::BreakWhileCutscene { thread }
            | ActionKind::BreakWhileCamera { thread }
            | ActionKind::BreakWhileInputOff { thread } => Some(*thread),
            ActionKind::WakeupThread { .. }
            | ActionKind::StopThread { .. }
            | ActionKind::Callback { .. } => None,
        }
    }

    /// Pure completion predicate for break conditions, evaluated against the
    /// engine state once per tick.
    fn is_satisfied(&self, ctx: &EngineContext, elapsed: f32) -> bool {
        match self {
            ActionKind::BreakHere { .. } => true,
            ActionKind::BreakTime { duration, .. } => elapsed >= *duration,
            ActionKind::BreakWhileAnimating { target, .. } => match target {
                AnimationTarget::Actor(id) => ctx
                    .actors()
                    .get(*id)
                    .map(|actor| !actor.is_animating())
                    .unwrap_or(true),
                AnimationTarget::Object(id) => ctx
                    .objects()
                    .get(*id)
                    .map(|object| !object.is_animating())
                    .unwrap_or(true),
            },
            ActionKind::BreakWhileWalking { actor, .. } => ctx
                .actors()
                .get(*actor)
                .map(|record| !record.is_walking())
                .unwrap_or(true),
            ActionKind::BreakWhileTalking { actor, .. } => ctx
                .actors()
                .get(*actor)
                .map(|record| !record.is_talking())
                .unwrap_or(true),
            ActionKind::BreakWhileSound { sound, .. } => !ctx.sounds().is_playing(*sound),
            ActionKind::BreakWhileRunning { observed, .. } => !ctx.threads().is_alive(*observed),
            ActionKind::BreakWhileDialog { .. } => !ctx.dialog_active(),
            ActionKind::BreakWhileCutscene { .. } => !ctx.in_cutscene(),
            ActionKind::BreakWhileCamera { .. } => !ctx.camera_moving(),
            ActionKind::BreakWhileInputOff { .. } => ctx.input_active(),
            ActionKind::WakeupThread { .. }
            | ActionKind::StopThread { .. }
            | ActionKind::Callback { .. } => true,
        }
    }
}

/// One per-frame-ticked unit: a completion predicate and a one-shot side
/// effect fired on the first tick the predicate holds.
#[derive(Debug)]
pub(super) struct DeferredAction {
    kind: ActionKind,
    elapsed: f32,
    done: bool,
}

impl DeferredAction {
    pub(super) fn new(kind: ActionKind) -> Self {
        DeferredAction {
            kind,
            elapsed: 0.0,
            done: false,
        }
    }

    pub(super) fn wakeup(thread: u32) -> Self {
        DeferredAction::new(ActionKind::WakeupThread { thread })
    }

    pub(super) fn stop(thread: u32) -> Self {
        DeferredAction::new(ActionKind::StopThread { thread })
    }

    pub(super) fn callback(duration: f32, closure: RegistryKey) -> Self {
        DeferredAction::new(ActionKind::Callback {
            duration,
            closure: Some(closure),
        })
    }

    pub(super) fn is_elapsed(&self) -> bool {
        self.done
    }

    /// Advances the accumulator and fires the side effect on first
    /// completion. Borrows of the context are dropped before any call back
    /// into Lua.
    pub(super) fn tick(
        &mut self,
        lua: &Lua,
        context: &Rc<RefCell<EngineContext>>,
        dt: f32,
    ) -> LuaResult<()> {
        if self.done {
            return Ok(());
        }
        self.elapsed += dt;
        match &mut self.kind {
            ActionKind::WakeupThread { thread } => {
                let thread = *thread;
                self.done = true;
                let (resumable, paused) = {
                    let ctx = context.borrow();
                    let resumable = ctx.threads().is_suspended(thread);
                    // pauseable threads outside the cutscene scope hold
                    // their wake-ups until the cutscene is over
                    let paused = resumable
                        && ctx.in_cutscene()
                        && ctx.threads().is_pauseable(thread)
                        && ctx.threads().scope(thread) != Some(ThreadScope::Cutscene);
                    (resumable, paused)
                };
                if paused {
                    context.borrow_mut().queue_action(DeferredAction::wakeup(thread));
                    return Ok(());
                }
                // a wake-up against a dead or stopped thread is dropped, not
                // an error
                if resumable {
                    context.borrow_mut().bump_counter("wakeup.fired");
                    resume_thread(lua, context, thread, None)?;
                }
                Ok(())
            }
            ActionKind::StopThread { thread } => {
                let thread = *thread;
                self.done = true;
                stop_thread_now(lua, context, thread)
            }
            ActionKind::Callback { duration, closure } => {
                if self.elapsed < *duration {
                    return Ok(());
                }
                self.done = true;
                if let Some(key) = closure.take() {
                    let callback: Function = lua.registry_value(&key)?;
                    if let Err(err) = callback.call::<_, ()>(()) {
                        context
                            .borrow_mut()
                            .log_event(format!("callback.error {err}"));
                    } else {
                        context.borrow_mut().bump_counter("callback.fired");
                    }
                    lua.remove_registry_value(key)?;
                }
                Ok(())
            }
            _ => self.tick_break(lua, context),
        }
    }

    fn tick_break(&mut self, lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> LuaResult<()> {
        let target = match self.kind.suspended_thread() {
            Some(thread) => thread,
            None => return Ok(()),
        };
        {
            let ctx = context.borrow();
            // the suspended thread was stopped: the condition is moot and
            // must not outlive it
            if !ctx.threads().is_alive(target) {
                drop(ctx);
                self.done = true;
                return Ok(());
            }
            if !self.kind.is_satisfied(&ctx, self.elapsed) {
                return Ok(());
            }
        }
        self.done = true;
        if let ActionKind::BreakWhileRunning { observed, .. } = self.kind {
            // the observed sub-thread is stopped before the waiter resumes
            stop_thread_now(lua, context, observed)?;
        }
        let mut ctx = context.borrow_mut();
        ctx.bump_counter("wakeup.scheduled");
        ctx.queue_action(DeferredAction::wakeup(target));
        Ok(())
    }
}

/// One frame of the scheduler: merge last frame's queued actions, tick the
/// live list in insertion order (the list may grow while we iterate, from
/// native calls made by resumed threads), then prune completed entries.
pub(super) fn run_pending_actions(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    dt: f32,
) -> LuaResult<()> {
    context.borrow_mut().merge_queued_actions();
    let mut index = 0;
    loop {
        let mut action = {
            let mut ctx = context.borrow_mut();
            if index >= ctx.actions_len() {
                break;
            }
            match ctx.take_action_slot(index) {
                Some(action) => action,
                None => {
                    index += 1;
                    continue;
                }
            }
        };
        action.tick(lua, context, dt)?;
        context.borrow_mut().put_action_slot(index, action);
        index += 1;
    }
    context.borrow_mut().retain_unfinished_actions();
    Ok(())
}
