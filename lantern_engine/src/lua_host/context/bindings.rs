use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use mlua::{
    Function, Lua, MultiValue, Result as LuaResult, Table, Thread, ThreadStatus, Value,
};

use super::super::types::{classify_id, ObjectKind, Rect, Vec2};
use super::cutscenes::CutsceneState;
use super::functions::{ActionKind, AnimationTarget, DeferredAction};
use super::threads::{ThreadScope, ThreadState};
use super::triggers::make_dispatcher;
use super::EngineContext;

/// Lua-side shims. Suspension has to happen in Lua (a native cannot yield
/// the calling coroutine), so every suspend point registers its condition
/// through a hidden native and then yields from script code.
const PRELUDE: &str = r#"
function breakhere() __break_here(); return coroutine.yield() end
function breaktime(seconds) __break_time(seconds); return coroutine.yield() end
function breakwhileanimating(target) __break_while_animating(target); return coroutine.yield() end
function breakwhilewalking(actor) __break_while_walking(actor); return coroutine.yield() end
function breakwhiletalking(actor) __break_while_talking(actor); return coroutine.yield() end
function breakwhilesound(sound) __break_while_sound(sound); return coroutine.yield() end
function breakwhilerunning(handle) __break_while_running(handle); return coroutine.yield() end
function breakwhiledialog() __break_while_dialog(); return coroutine.yield() end
function breakwhilecutscene() __break_while_cutscene(); return coroutine.yield() end
function breakwhilecamera() __break_while_camera(); return coroutine.yield() end
function breakwhileinputoff() __break_while_inputoff(); return coroutine.yield() end
function cutscene(body, override) __cutscene_begin(body, override); return coroutine.yield() end

function __trigger_loop()
    while true do
        local fn, obj, actor = coroutine.yield()
        fn(obj, actor)
    end
end
"#;

fn runtime_error(message: String) -> mlua::Error {
    mlua::Error::RuntimeError(message)
}

/// `_id` lives in every handle table the engine hands to scripts; plain
/// numbers are accepted everywhere a handle is.
fn value_id(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(id) => Some(*id),
        Value::Number(id) => Some(*id as i64),
        Value::Table(table) => table.get::<_, Option<i64>>("_id").ok().flatten(),
        _ => None,
    }
}

fn id_of(value: &Value, native: &str) -> LuaResult<i64> {
    value_id(value)
        .ok_or_else(|| runtime_error(format!("{native}: expected an id or a handle table")))
}

fn kind_of(id: i64, native: &str) -> LuaResult<ObjectKind> {
    classify_id(id).map_err(|err| runtime_error(format!("{native}: {err}")))
}

fn resolve_actor(
    ctx: &EngineContext,
    value: Option<&Value>,
    native: &str,
) -> LuaResult<u32> {
    match value {
        Some(value) if !value.is_nil() => {
            let id = id_of(value, native)?;
            if kind_of(id, native)? != ObjectKind::Actor {
                return Err(runtime_error(format!("{native}: #{id} is not an actor")));
            }
            let id = id as u32;
            if !ctx.actors().contains(id) {
                return Err(runtime_error(format!("{native}: unknown actor #{id}")));
            }
            Ok(id)
        }
        _ => ctx
            .actors()
            .selected()
            .ok_or_else(|| runtime_error(format!("{native}: no actor selected"))),
    }
}

fn resolve_object(ctx: &EngineContext, value: &Value, native: &str) -> LuaResult<u32> {
    let id = id_of(value, native)?;
    if kind_of(id, native)? != ObjectKind::Object {
        return Err(runtime_error(format!("{native}: #{id} is not an object")));
    }
    let id = id as u32;
    if !ctx.objects().contains(id) {
        return Err(runtime_error(format!("{native}: unknown object #{id}")));
    }
    Ok(id)
}

fn resolve_room(ctx: &EngineContext, value: &Value, native: &str) -> LuaResult<u32> {
    let id = id_of(value, native)?;
    if kind_of(id, native)? != ObjectKind::Room {
        return Err(runtime_error(format!("{native}: #{id} is not a room")));
    }
    let id = id as u32;
    if !ctx.room_exists(id) {
        return Err(runtime_error(format!("{native}: unknown room #{id}")));
    }
    Ok(id)
}

fn resolve_sound(value: &Value, native: &str) -> LuaResult<u32> {
    let id = id_of(value, native)?;
    if kind_of(id, native)? != ObjectKind::Sound {
        return Err(runtime_error(format!("{native}: #{id} is not a sound")));
    }
    Ok(id as u32)
}

/// Builds the `{_id = ..., name = ...}` mirror table scripts hold instead of
/// a raw pointer.
pub(super) fn push_object_table<'lua>(
    lua: &'lua Lua,
    context: &Rc<RefCell<EngineContext>>,
    id: u32,
) -> LuaResult<Table<'lua>> {
    let (kind, name) = {
        let ctx = context.borrow();
        let kind = classify_id(i64::from(id)).ok();
        let name = match kind {
            Some(ObjectKind::Actor) => {
                ctx.actors().get(id).map(|record| record.name().to_string())
            }
            Some(ObjectKind::Object) => {
                ctx.objects().get(id).map(|record| record.name().to_string())
            }
            Some(ObjectKind::Room) => ctx.room_name(id).map(str::to_string),
            Some(ObjectKind::Thread) => ctx.threads().label(id),
            _ => None,
        };
        (kind, name)
    };
    let table = lua.create_table()?;
    table.set("_id", id)?;
    if let Some(kind) = kind {
        table.set("kind", kind.as_str())?;
    }
    if let Some(name) = name {
        table.set("name", name)?;
    }
    Ok(table)
}

fn scope_label(scope: ThreadScope) -> &'static str {
    match scope {
        ThreadScope::Global => "global",
        ThreadScope::Room(_) => "room",
        ThreadScope::Cutscene => "cutscene",
    }
}

/// Registers a coroutine for `closure` without running it.
pub(super) fn spawn_thread(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    closure: Function,
    scope: ThreadScope,
    label: &str,
) -> LuaResult<u32> {
    let thread = lua.create_thread(closure.clone())?;
    let coroutine_key = lua.create_registry_value(thread)?;
    let closure_key = lua.create_registry_value(closure)?;
    let mut ctx = context.borrow_mut();
    let id = ctx
        .threads_mut()
        .spawn(label.to_string(), scope, coroutine_key, closure_key);
    ctx.log_event(format!("thread.start {label} (#{id})"));
    ctx.bump_counter("thread.started");
    Ok(id)
}

/// Runs one leg of a script thread: from its current suspension point to
/// the next yield, its natural end, or an error. Resume against a dead or
/// unknown id is a silent no-op; errors are logged and kill only this
/// thread.
pub(super) fn resume_thread(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    id: u32,
    args: Option<MultiValue>,
) -> LuaResult<()> {
    let (thread, label) = {
        let ctx = context.borrow();
        match ctx.threads().coroutine_key(id) {
            Some(key) => (
                lua.registry_value::<Thread>(key)?,
                ctx.threads().label(id).unwrap_or_default(),
            ),
            None => return Ok(()),
        }
    };
    if thread.status() != ThreadStatus::Resumable {
        return finish_thread(lua, context, id);
    }
    let previous = {
        let mut ctx = context.borrow_mut();
        ctx.threads_mut().set_state(id, ThreadState::Running);
        ctx.set_current_thread(Some(id))
    };
    let outcome = match args {
        Some(args) => thread.resume::<_, MultiValue>(args),
        None => thread.resume::<_, MultiValue>(()),
    };
    context.borrow_mut().set_current_thread(previous);
    match outcome {
        Ok(_) => {
            if thread.status() == ThreadStatus::Resumable {
                context
                    .borrow_mut()
                    .threads_mut()
                    .set_state(id, ThreadState::Suspended);
                Ok(())
            } else {
                finish_thread(lua, context, id)
            }
        }
        Err(err) => {
            {
                let mut ctx = context.borrow_mut();
                ctx.log_event(format!("script.error {label} (#{id}): {err}"));
                ctx.bump_counter("script.errors");
            }
            finish_thread(lua, context, id)
        }
    }
}

fn finish_thread(lua: &Lua, context: &Rc<RefCell<EngineContext>>, id: u32) -> LuaResult<()> {
    release_thread(lua, context, id, "thread.done")
}

/// Forces a thread dead right now and drops its registry keys. Idempotent.
pub(super) fn stop_thread_now(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    id: u32,
) -> LuaResult<()> {
    release_thread(lua, context, id, "thread.stop")
}

fn release_thread(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    id: u32,
    event: &str,
) -> LuaResult<()> {
    let (label, cleanup) = {
        let mut ctx = context.borrow_mut();
        let label = ctx.threads().label(id).unwrap_or_default();
        (label, ctx.threads_mut().kill(id))
    };
    if let Some(cleanup) = cleanup {
        context
            .borrow_mut()
            .log_event(format!("{event} {label} (#{id})"));
        if let Some(key) = cleanup.coroutine {
            lua.remove_registry_value(key)?;
        }
        if let Some(key) = cleanup.closure {
            lua.remove_registry_value(key)?;
        }
    }
    Ok(())
}

/// Starts a named global function as a global script thread. Returns false
/// when the global is missing or not a function.
pub(crate) fn start_entry_thread(
    lua: &Lua,
    context: &Rc<RefCell<EngineContext>>,
    name: &str,
) -> LuaResult<bool> {
    let entry: Option<Function> = lua.globals().get(name)?;
    let entry = match entry {
        Some(entry) => entry,
        None => return Ok(false),
    };
    let id = spawn_thread(lua, context, entry, ThreadScope::Global, name)?;
    resume_thread(lua, context, id, None)?;
    Ok(true)
}

/// Calls a global function by name. Failure is logged, never fatal.
pub(crate) fn call_global(lua: &Lua, context: &Rc<RefCell<EngineContext>>, name: &str) -> bool {
    let target: Option<Function> = match lua.globals().get(name) {
        Ok(target) => target,
        Err(err) => {
            context
                .borrow_mut()
                .log_event(format!("script.error {name}: {err}"));
            return false;
        }
    };
    let target = match target {
        Some(target) => target,
        None => return false,
    };
    match target.call::<_, ()>(()) {
        Ok(()) => true,
        Err(err) => {
            context
                .borrow_mut()
                .log_event(format!("script.error {name}: {err}"));
            false
        }
    }
}

/// Loads and runs a script file from the script root. Compile and runtime
/// failures abort only the fragment.
fn execute_script_file(lua: &Lua, context: &Rc<RefCell<EngineContext>>, name: &str) {
    let path = context.borrow().script_root().join(name);
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            context
                .borrow_mut()
                .log_event(format!("script.error {name}: {err}"));
            return;
        }
    };
    if let Err(err) = lua.load(&source).set_name(name).exec() {
        context
            .borrow_mut()
            .log_event(format!("script.error {name}: {err}"));
    } else {
        context.borrow_mut().log_event(format!("script.include {name}"));
    }
}

fn register_break(
    ctx: &mut EngineContext,
    native: &str,
    kind: impl FnOnce(u32) -> ActionKind,
) -> LuaResult<()> {
    let thread = ctx.require_current_thread(native)?;
    ctx.add_action(DeferredAction::new(kind(thread)));
    Ok(())
}

/// Binds the whole native surface plus the prelude. Must run before any
/// script is loaded.
pub(crate) fn install_globals(lua: &Lua, context: &Rc<RefCell<EngineContext>>) -> LuaResult<()> {
    let globals = lua.globals();

    install_system_pack(lua, &globals, context)?;
    install_general_pack(lua, &globals, context)?;
    install_world_pack(lua, &globals, context)?;

    lua.load(PRELUDE).set_name("prelude").exec()
}

fn install_system_pack(
    lua: &Lua,
    globals: &Table,
    context: &Rc<RefCell<EngineContext>>,
) -> LuaResult<()> {
    let ctx = context.clone();
    globals.set(
        "__break_here",
        lua.create_function(move |_, ()| {
            register_break(&mut ctx.borrow_mut(), "breakhere", |thread| {
                ActionKind::BreakHere { thread }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_time",
        lua.create_function(move |_, seconds: f64| {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(runtime_error(format!(
                    "breaktime: invalid duration {seconds}"
                )));
            }
            register_break(&mut ctx.borrow_mut(), "breaktime", |thread| {
                ActionKind::BreakTime {
                    thread,
                    duration: seconds as f32,
                }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_animating",
        lua.create_function(move |_, value: Value| {
            let mut ctx = ctx.borrow_mut();
            let id = id_of(&value, "breakwhileanimating")?;
            let target = match kind_of(id, "breakwhileanimating")? {
                ObjectKind::Actor => AnimationTarget::Actor(id as u32),
                ObjectKind::Object => AnimationTarget::Object(id as u32),
                _ => {
                    return Err(runtime_error(format!(
                        "breakwhileanimating: #{id} is neither an actor nor an object"
                    )))
                }
            };
            register_break(&mut ctx, "breakwhileanimating", |thread| {
                ActionKind::BreakWhileAnimating { thread, target }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_walking",
        lua.create_function(move |_, value: Option<Value>| {
            let mut ctx = ctx.borrow_mut();
            let actor = resolve_actor(&ctx, value.as_ref(), "breakwhilewalking")?;
            register_break(&mut ctx, "breakwhilewalking", |thread| {
                ActionKind::BreakWhileWalking { thread, actor }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_talking",
        lua.create_function(move |_, value: Option<Value>| {
            let mut ctx = ctx.borrow_mut();
            let actor = resolve_actor(&ctx, value.as_ref(), "breakwhiletalking")?;
            register_break(&mut ctx, "breakwhiletalking", |thread| {
                ActionKind::BreakWhileTalking { thread, actor }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_sound",
        lua.create_function(move |_, value: Value| {
            let mut ctx = ctx.borrow_mut();
            let sound = resolve_sound(&value, "breakwhilesound")?;
            register_break(&mut ctx, "breakwhilesound", |thread| {
                ActionKind::BreakWhileSound { thread, sound }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_running",
        lua.create_function(move |_, value: Value| {
            let mut ctx = ctx.borrow_mut();
            let id = id_of(&value, "breakwhilerunning")?;
            match kind_of(id, "breakwhilerunning")? {
                ObjectKind::Thread => {
                    register_break(&mut ctx, "breakwhilerunning", |thread| {
                        ActionKind::BreakWhileRunning {
                            thread,
                            observed: id as u32,
                        }
                    })
                }
                // a sound handle here waits for the sound instead, matching
                // the classic engine surface
                ObjectKind::Sound => register_break(&mut ctx, "breakwhilerunning", |thread| {
                    ActionKind::BreakWhileSound {
                        thread,
                        sound: id as u32,
                    }
                }),
                _ => Err(runtime_error(format!(
                    "breakwhilerunning: #{id} is neither a thread nor a sound"
                ))),
            }
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_dialog",
        lua.create_function(move |_, ()| {
            register_break(&mut ctx.borrow_mut(), "breakwhiledialog", |thread| {
                ActionKind::BreakWhileDialog { thread }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_cutscene",
        lua.create_function(move |_, ()| {
            register_break(&mut ctx.borrow_mut(), "breakwhilecutscene", |thread| {
                ActionKind::BreakWhileCutscene { thread }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_camera",
        lua.create_function(move |_, ()| {
            register_break(&mut ctx.borrow_mut(), "breakwhilecamera", |thread| {
                ActionKind::BreakWhileCamera { thread }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "__break_while_inputoff",
        lua.create_function(move |_, ()| {
            register_break(&mut ctx.borrow_mut(), "breakwhileinputoff", |thread| {
                ActionKind::BreakWhileInputOff { thread }
            })
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "startthread",
        lua.create_function(move |lua, (closure, args): (Function, MultiValue)| {
            let scope = ctx.borrow().spawn_scope();
            let id = spawn_thread(lua, &ctx, closure, scope, scope_label(scope))?;
            resume_thread(lua, &ctx, id, Some(args))?;
            push_object_table(lua, &ctx, id)
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "startglobalthread",
        lua.create_function(move |lua, (closure, args): (Function, MultiValue)| {
            let id = spawn_thread(lua, &ctx, closure, ThreadScope::Global, "global")?;
            resume_thread(lua, &ctx, id, Some(args))?;
            push_object_table(lua, &ctx, id)
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "stopthread",
        lua.create_function(move |lua, value: Value| {
            let id = id_of(&value, "stopthread")?;
            if id == 0 {
                return Ok(());
            }
            if kind_of(id, "stopthread")? != ObjectKind::Thread {
                return Err(runtime_error(format!("stopthread: #{id} is not a thread")));
            }
            let id = id as u32;
            let self_stop = ctx.borrow().current_thread() == Some(id);
            if self_stop {
                // stopping the running thread takes effect at its next
                // suspension point
                ctx.borrow_mut().queue_action(DeferredAction::stop(id));
                Ok(())
            } else {
                stop_thread_now(lua, &ctx, id)
            }
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "threadid",
        lua.create_function(move |_, ()| Ok(ctx.borrow().current_thread().unwrap_or(0)))?,
    )?;

    let ctx = context.clone();
    globals.set(
        "threadpauseable",
        lua.create_function(move |_, (value, pauseable): (Value, bool)| {
            let id = id_of(&value, "threadpauseable")?;
            if kind_of(id, "threadpauseable")? != ObjectKind::Thread {
                return Err(runtime_error(format!(
                    "threadpauseable: #{id} is not a thread"
                )));
            }
            // a stale or dead handle is ignored, like a stale wake-up
            ctx.borrow_mut()
                .threads_mut()
                .set_pauseable(id as u32, pauseable);
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "addCallback",
        lua.create_function(move |lua, (seconds, closure): (f64, Function)| {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(runtime_error(format!(
                    "addCallback: invalid delay {seconds}"
                )));
            }
            let key = lua.create_registry_value(closure)?;
            let mut ctx = ctx.borrow_mut();
            ctx.add_action(DeferredAction::callback(seconds as f32, key));
            ctx.bump_counter("callback.added");
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "gameTime",
        lua.create_function(move |_, ()| Ok(f64::from(ctx.borrow().game_time())))?,
    )?;

    let ctx = context.clone();
    globals.set(
        "logEvent",
        lua.create_function(move |_, message: String| {
            ctx.borrow_mut().log_event(format!("script.log {message}"));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "include",
        lua.create_function(move |lua, name: String| {
            execute_script_file(lua, &ctx, &name);
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "inputOn",
        lua.create_function(move |_, ()| {
            let mut ctx = ctx.borrow_mut();
            ctx.set_input_active(true);
            ctx.log_event("input.on");
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "inputOff",
        lua.create_function(move |_, ()| {
            let mut ctx = ctx.borrow_mut();
            ctx.set_input_active(false);
            ctx.log_event("input.off");
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "inputSilentOff",
        lua.create_function(move |_, ()| {
            ctx.borrow_mut().set_input_active(false);
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "isInputOn",
        lua.create_function(move |_, ()| Ok(ctx.borrow().input_active()))?,
    )?;

    Ok(())
}

fn install_general_pack(
    lua: &Lua,
    globals: &Table,
    context: &Rc<RefCell<EngineContext>>,
) -> LuaResult<()> {
    let ctx = context.clone();
    globals.set(
        "__cutscene_begin",
        lua.create_function(move |lua, (body, override_closure): (Function, Option<Function>)| {
            let caller = {
                let ctx = ctx.borrow();
                let caller = ctx.require_current_thread("cutscene")?;
                if ctx.in_cutscene() {
                    return Err(runtime_error(
                        "cutscene: a cutscene is already active".to_string(),
                    ));
                }
                caller
            };
            let body_thread = spawn_thread(lua, &ctx, body, ThreadScope::Cutscene, "cutscene")?;
            let override_key = override_closure
                .map(|closure| lua.create_registry_value(closure))
                .transpose()?;
            let mut ctx = ctx.borrow_mut();
            let input_was_active = ctx.input_active();
            ctx.set_input_active(false);
            ctx.log_event("cutscene.start");
            ctx.bump_counter("cutscene.started");
            ctx.set_cutscene(CutsceneState::new(
                caller,
                body_thread,
                override_key,
                input_was_active,
            ));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "cutsceneOverride",
        lua.create_function(move |_, ()| {
            let mut ctx = ctx.borrow_mut();
            let requested = ctx
                .cutscene_mut()
                .map(|state| state.request_override())
                .unwrap_or(false);
            if requested {
                ctx.bump_counter("cutscene.override.requested");
            }
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "incutscene",
        lua.create_function(move |_, ()| Ok(ctx.borrow().in_cutscene()))?,
    )?;

    Ok(())
}

fn install_world_pack(
    lua: &Lua,
    globals: &Table,
    context: &Rc<RefCell<EngineContext>>,
) -> LuaResult<()> {
    let ctx = context.clone();
    globals.set(
        "createActor",
        lua.create_function(move |lua, name: String| {
            let id = {
                let mut ctx = ctx.borrow_mut();
                let id = ctx.actors_mut().create(name.clone());
                ctx.log_event(format!("actor.create {name} (#{id})"));
                id
            };
            push_object_table(lua, &ctx, id)
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "selectActor",
        lua.create_function(move |_, value: Value| {
            let mut ctx = ctx.borrow_mut();
            let actor = resolve_actor(&ctx, Some(&value), "selectActor")?;
            ctx.actors_mut().select(actor);
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "actorWalkTo",
        lua.create_function(move |_, (value, x, y): (Value, f64, f64)| {
            let mut ctx = ctx.borrow_mut();
            let actor = resolve_actor(&ctx, Some(&value), "actorWalkTo")?;
            ctx.actors_mut()
                .start_walk(actor, Vec2::new(x as f32, y as f32));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "actorSay",
        lua.create_function(move |_, (value, line): (Value, String)| {
            let mut ctx = ctx.borrow_mut();
            let actor = resolve_actor(&ctx, Some(&value), "actorSay")?;
            let name = ctx
                .actors()
                .get(actor)
                .map(|record| record.name().to_string())
                .unwrap_or_default();
            ctx.actors_mut().start_talk(actor, line.clone());
            ctx.log_event(format!("actor.say {name}: {line}"));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "actorPlayAnimation",
        lua.create_function(
            move |_, (value, animation, seconds): (Value, String, f64)| {
                let mut ctx = ctx.borrow_mut();
                let actor = resolve_actor(&ctx, Some(&value), "actorPlayAnimation")?;
                ctx.actors_mut()
                    .start_animation(actor, animation, seconds.max(0.0) as f32);
                Ok(())
            },
        )?,
    )?;

    let ctx = context.clone();
    globals.set(
        "isActorWalking",
        lua.create_function(move |_, value: Value| {
            let ctx = ctx.borrow();
            let actor = resolve_actor(&ctx, Some(&value), "isActorWalking")?;
            Ok(ctx
                .actors()
                .get(actor)
                .map(|record| record.is_walking())
                .unwrap_or(false))
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "isActorTalking",
        lua.create_function(move |_, value: Value| {
            let ctx = ctx.borrow();
            let actor = resolve_actor(&ctx, Some(&value), "isActorTalking")?;
            Ok(ctx
                .actors()
                .get(actor)
                .map(|record| record.is_talking())
                .unwrap_or(false))
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "createObject",
        lua.create_function(
            move |lua, (name, x, y, width, height): (String, f64, f64, f64, f64)| {
                let id = {
                    let mut ctx = ctx.borrow_mut();
                    let hotspot =
                        Rect::new(x as f32, y as f32, width as f32, height as f32);
                    let id = ctx.objects_mut().create(name.clone(), hotspot);
                    ctx.log_event(format!("object.create {name} (#{id})"));
                    id
                };
                push_object_table(lua, &ctx, id)
            },
        )?,
    )?;

    let ctx = context.clone();
    globals.set(
        "objectPlayAnimation",
        lua.create_function(
            move |_, (value, animation, seconds): (Value, String, f64)| {
                let mut ctx = ctx.borrow_mut();
                let object = resolve_object(&ctx, &value, "objectPlayAnimation")?;
                ctx.objects_mut()
                    .start_animation(object, animation, seconds.max(0.0) as f32);
                Ok(())
            },
        )?,
    )?;

    let ctx = context.clone();
    globals.set(
        "addTrigger",
        lua.create_function(
            move |lua, (value, inside, outside): (Value, Function, Option<Function>)| {
                let object = resolve_object(&ctx.borrow(), &value, "addTrigger")?;
                let inside_key = lua.create_registry_value(inside)?;
                let outside_key = outside
                    .map(|closure| lua.create_registry_value(closure))
                    .transpose()?;
                let dispatcher = make_dispatcher(lua)?;
                let replaced = {
                    let mut ctx = ctx.borrow_mut();
                    ctx.log_event(format!("trigger.add #{object}"));
                    ctx.triggers_mut()
                        .add(object, inside_key, outside_key, dispatcher)
                };
                if let Some(cleanup) = replaced {
                    for key in cleanup.keys {
                        lua.remove_registry_value(key)?;
                    }
                }
                Ok(())
            },
        )?,
    )?;

    let ctx = context.clone();
    globals.set(
        "removeTrigger",
        lua.create_function(move |lua, value: Value| {
            let object = resolve_object(&ctx.borrow(), &value, "removeTrigger")?;
            let removed = {
                let mut ctx = ctx.borrow_mut();
                ctx.log_event(format!("trigger.remove #{object}"));
                ctx.triggers_mut().remove(object)
            };
            if let Some(cleanup) = removed {
                for key in cleanup.keys {
                    lua.remove_registry_value(key)?;
                }
            }
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "defineRoom",
        lua.create_function(move |lua, name: String| {
            let id = {
                let mut ctx = ctx.borrow_mut();
                let id = ctx.define_room(name.clone());
                ctx.log_event(format!("room.define {name} (#{id})"));
                id
            };
            push_object_table(lua, &ctx, id)
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "enterRoom",
        lua.create_function(move |lua, value: Value| {
            let (room, previous) = {
                let ctx = ctx.borrow();
                let room = resolve_room(&ctx, &value, "enterRoom")?;
                (room, ctx.current_room())
            };
            if previous == Some(room) {
                return Ok(());
            }
            if let Some(previous) = previous {
                let doomed = ctx
                    .borrow()
                    .threads()
                    .ids_in_scope(ThreadScope::Room(previous));
                for id in doomed {
                    stop_thread_now(lua, &ctx, id)?;
                }
            }
            let mut ctx = ctx.borrow_mut();
            ctx.set_current_room(room);
            let name = ctx.room_name(room).unwrap_or_default().to_string();
            ctx.log_event(format!("room.enter {name} (#{room})"));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "playSound",
        lua.create_function(move |lua, (name, seconds): (String, f64)| {
            let id = {
                let mut ctx = ctx.borrow_mut();
                let id = ctx.sounds_mut().play(name.clone(), seconds.max(0.0) as f32);
                ctx.log_event(format!("sound.play {name} (#{id})"));
                id
            };
            let table = lua.create_table()?;
            table.set("_id", id)?;
            table.set("kind", ObjectKind::Sound.as_str())?;
            table.set("name", name)?;
            Ok(table)
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "stopSound",
        lua.create_function(move |_, value: Value| {
            let sound = resolve_sound(&value, "stopSound")?;
            let mut ctx = ctx.borrow_mut();
            if let Some(record) = ctx.sounds_mut().stop(sound) {
                let name = record.name().to_string();
                ctx.log_event(format!("sound.stop {name} (#{sound})"));
            }
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "isSoundPlaying",
        lua.create_function(move |_, value: Value| {
            let sound = resolve_sound(&value, "isSoundPlaying")?;
            Ok(ctx.borrow().sounds().is_playing(sound))
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "cameraPanTo",
        lua.create_function(move |_, (x, y, seconds): (f64, f64, f64)| {
            ctx.borrow_mut()
                .camera_mut()
                .pan_to(Vec2::new(x as f32, y as f32), seconds.max(0.0) as f32);
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "cameraAt",
        lua.create_function(move |_, (x, y): (f64, f64)| {
            let mut ctx = ctx.borrow_mut();
            ctx.camera_mut().jump_to(Vec2::new(x as f32, y as f32));
            let at = ctx.camera().at();
            ctx.log_event(format!("camera.at ({}, {})", at.x, at.y));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "startDialog",
        lua.create_function(move |_, ()| {
            let mut ctx = ctx.borrow_mut();
            ctx.set_dialog(true);
            ctx.log_event("dialog.start");
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    globals.set(
        "stopDialog",
        lua.create_function(move |_, ()| {
            let mut ctx = ctx.borrow_mut();
            ctx.set_dialog(false);
            ctx.log_event("dialog.stop");
            Ok(())
        })?,
    )?;

    Ok(())
}
