use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

mod actors;
mod bindings;
mod camera;
mod cutscenes;
mod functions;
mod objects;
mod sounds;
mod threads;
mod triggers;

use actors::ActorStore;
use camera::CameraState;
use cutscenes::CutsceneState;
use functions::DeferredAction;
use objects::ObjectRuntime;
use sounds::SoundRuntime;
use threads::{ThreadRuntime, ThreadScope};
use triggers::TriggerRuntime;

pub(super) use bindings::{call_global, install_globals, start_entry_thread};

use super::types::ROOM_ID_START;
use mlua::{Lua, Result as LuaResult};

#[derive(Debug)]
struct RoomRegistry {
    next_id: u32,
    names: BTreeMap<u32, String>,
    current: Option<u32>,
}

impl RoomRegistry {
    fn new() -> Self {
        RoomRegistry {
            next_id: ROOM_ID_START,
            names: BTreeMap::new(),
            current: None,
        }
    }

    fn define(&mut self, name: String) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.names.insert(id, name);
        id
    }
}

/// All engine state, shared behind `Rc<RefCell<...>>` with every native
/// binding closure. Nothing in here touches the Lua state; callers drop
/// their borrow before resuming a coroutine.
pub(super) struct EngineContext {
    verbose: bool,
    script_root: PathBuf,
    time: f32,
    events: Vec<String>,
    counters: BTreeMap<String, u64>,
    threads: ThreadRuntime,
    actions: Vec<Option<DeferredAction>>,
    queued_actions: Vec<DeferredAction>,
    actors: ActorStore,
    objects: ObjectRuntime,
    sounds: SoundRuntime,
    rooms: RoomRegistry,
    camera: CameraState,
    dialog: bool,
    input_active: bool,
    cutscene: Option<CutsceneState>,
    triggers: TriggerRuntime,
    current_thread: Option<u32>,
}

impl EngineContext {
    pub(super) fn new(verbose: bool, script_root: PathBuf) -> Self {
        EngineContext {
            verbose,
            script_root,
            time: 0.0,
            events: Vec::new(),
            counters: BTreeMap::new(),
            threads: ThreadRuntime::new(),
            actions: Vec::new(),
            queued_actions: Vec::new(),
            actors: ActorStore::new(),
            objects: ObjectRuntime::new(),
            sounds: SoundRuntime::new(),
            rooms: RoomRegistry::new(),
            camera: CameraState::new(),
            dialog: false,
            input_active: true,
            cutscene: None,
            triggers: TriggerRuntime::new(),
            current_thread: None,
        }
    }

    pub(super) fn log_event(&mut self, event: impl Into<String>) {
        let event = event.into();
        if self.verbose {
            eprintln!("[lantern_engine] {event}");
        }
        self.events.push(event);
    }

    pub(super) fn bump_counter(&mut self, name: &str) {
        *self.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    pub(super) fn events(&self) -> &[String] {
        &self.events
    }

    pub(super) fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }

    pub(super) fn game_time(&self) -> f32 {
        self.time
    }

    pub(super) fn script_root(&self) -> &Path {
        &self.script_root
    }

    pub(super) fn live_thread_count(&self) -> usize {
        self.threads.live_count()
    }

    fn threads(&self) -> &ThreadRuntime {
        &self.threads
    }

    fn threads_mut(&mut self) -> &mut ThreadRuntime {
        &mut self.threads
    }

    fn actors(&self) -> &ActorStore {
        &self.actors
    }

    fn actors_mut(&mut self) -> &mut ActorStore {
        &mut self.actors
    }

    fn objects(&self) -> &ObjectRuntime {
        &self.objects
    }

    fn objects_mut(&mut self) -> &mut ObjectRuntime {
        &mut self.objects
    }

    fn sounds(&self) -> &SoundRuntime {
        &self.sounds
    }

    fn sounds_mut(&mut self) -> &mut SoundRuntime {
        &mut self.sounds
    }

    fn camera(&self) -> &CameraState {
        &self.camera
    }

    fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    fn camera_moving(&self) -> bool {
        self.camera.is_moving()
    }

    fn triggers(&self) -> &TriggerRuntime {
        &self.triggers
    }

    fn triggers_mut(&mut self) -> &mut TriggerRuntime {
        &mut self.triggers
    }

    /// Dialog is considered active while the explicit flag is set or any
    /// actor still holds a talk line.
    pub(super) fn dialog_active(&self) -> bool {
        self.dialog || self.actors.any_talking()
    }

    pub(super) fn set_dialog(&mut self, active: bool) {
        self.dialog = active;
    }

    pub(super) fn input_active(&self) -> bool {
        self.input_active
    }

    pub(super) fn set_input_active(&mut self, active: bool) {
        self.input_active = active;
    }

    pub(super) fn in_cutscene(&self) -> bool {
        self.cutscene.is_some()
    }

    fn cutscene(&self) -> Option<&CutsceneState> {
        self.cutscene.as_ref()
    }

    fn cutscene_mut(&mut self) -> Option<&mut CutsceneState> {
        self.cutscene.as_mut()
    }

    fn set_cutscene(&mut self, state: CutsceneState) {
        self.cutscene = Some(state);
    }

    fn take_cutscene(&mut self) -> Option<CutsceneState> {
        self.cutscene.take()
    }

    pub(super) fn current_thread(&self) -> Option<u32> {
        self.current_thread
    }

    pub(super) fn set_current_thread(&mut self, thread: Option<u32>) -> Option<u32> {
        std::mem::replace(&mut self.current_thread, thread)
    }

    /// Id of the script thread executing right now; suspend points and
    /// cutscenes are meaningless outside one.
    pub(super) fn require_current_thread(&self, native: &str) -> LuaResult<u32> {
        self.current_thread.ok_or_else(|| {
            mlua::Error::RuntimeError(format!("{native} may only be called from a script thread"))
        })
    }

    /// Scope for a plain `startthread`: cutscene children first, then the
    /// current room, then global.
    fn spawn_scope(&self) -> ThreadScope {
        if self.cutscene.is_some() {
            ThreadScope::Cutscene
        } else if let Some(room) = self.rooms.current {
            ThreadScope::Room(room)
        } else {
            ThreadScope::Global
        }
    }

    pub(super) fn define_room(&mut self, name: String) -> u32 {
        self.rooms.define(name)
    }

    pub(super) fn room_exists(&self, id: u32) -> bool {
        self.rooms.names.contains_key(&id)
    }

    pub(super) fn room_name(&self, id: u32) -> Option<&str> {
        self.rooms.names.get(&id).map(String::as_str)
    }

    pub(super) fn current_room(&self) -> Option<u32> {
        self.rooms.current
    }

    pub(super) fn set_current_room(&mut self, id: u32) {
        self.rooms.current = Some(id);
    }

    fn add_action(&mut self, action: DeferredAction) {
        self.actions.push(Some(action));
    }

    fn queue_action(&mut self, action: DeferredAction) {
        self.queued_actions.push(action);
    }

    pub(super) fn merge_queued_actions(&mut self) {
        self.actions
            .extend(self.queued_actions.drain(..).map(Some));
    }

    pub(super) fn actions_len(&self) -> usize {
        self.actions.len()
    }

    fn take_action_slot(&mut self, index: usize) -> Option<DeferredAction> {
        self.actions.get_mut(index).and_then(Option::take)
    }

    fn put_action_slot(&mut self, index: usize, action: DeferredAction) {
        if let Some(slot) = self.actions.get_mut(index) {
            *slot = Some(action);
        }
    }

    pub(super) fn retain_unfinished_actions(&mut self) {
        self.actions.retain(|slot| {
            slot.as_ref()
                .map(|action| !action.is_elapsed())
                .unwrap_or(false)
        });
    }

    /// Steps every world clock and logs whatever finished this frame.
    pub(super) fn advance_world(&mut self, dt: f32) {
        self.time += dt;
        let mut finished = self.actors.advance(dt);
        finished.extend(self.objects.advance(dt));
        finished.extend(self.sounds.advance(dt));
        finished.extend(self.camera.advance(dt));
        for event in finished {
            self.log_event(event);
        }
    }

    /// True once nothing is left that could ever make progress again: no
    /// live threads or actions, no cutscene, and no walking actor that an
    /// armed trigger could still observe.
    pub(super) fn is_idle(&self) -> bool {
        let trigger_pending = !self.triggers.is_empty() && self.actors.any_walking();
        self.threads.live_count() == 0
            && self.actions.is_empty()
            && self.queued_actions.is_empty()
            && self.cutscene.is_none()
            && !trigger_pending
    }
}

/// One fixed-timestep frame: world clocks, deferred actions, the cutscene
/// machine, room triggers, then dead-thread cleanup.
pub(super) fn run_frame(lua: &Lua, context: &Rc<RefCell<EngineContext>>, dt: f32) -> LuaResult<()> {
    context.borrow_mut().advance_world(dt);
    functions::run_pending_actions(lua, context, dt)?;
    cutscenes::tick_cutscene(lua, context)?;
    triggers::evaluate_triggers(lua, context)?;
    context.borrow_mut().threads_mut().prune_dead();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::Vec2;
    use mlua::Lua;

    fn make_host() -> (Lua, Rc<RefCell<EngineContext>>) {
        let lua = Lua::new();
        let context = Rc::new(RefCell::new(EngineContext::new(false, PathBuf::from("."))));
        install_globals(&lua, &context).expect("install globals");
        (lua, context)
    }

    fn exec(lua: &Lua, chunk: &str) {
        lua.load(chunk).exec().expect("chunk runs");
    }

    fn global_i64(lua: &Lua, name: &str) -> i64 {
        lua.globals().get::<_, Option<i64>>(name).expect("global").unwrap_or(0)
    }

    fn run_frames(lua: &Lua, context: &Rc<RefCell<EngineContext>>, frames: usize, dt: f32) {
        for _ in 0..frames {
            run_frame(lua, context, dt).expect("frame");
        }
    }

    #[test]
    fn breakhere_resumes_once_per_frame() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            startglobalthread(function()
                while true do
                    ticks = ticks + 1
                    breakhere()
                end
            end)
            "#,
        );
        // the first leg ran during startglobalthread
        assert_eq!(global_i64(&lua, "ticks"), 1);
        run_frames(&lua, &context, 1, 0.1);
        assert_eq!(global_i64(&lua, "ticks"), 1, "wake-up waits a full frame");
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "ticks"), 4);
    }

    #[test]
    fn breaktime_boundary_is_inclusive() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            marker = 1
            startglobalthread(function()
                breaktime(0.25)
                marker = 2
            end)
            "#,
        );
        // 0.3s accumulated on frame 3 satisfies the condition; the wake-up
        // lands on frame 4
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 1);
        run_frames(&lua, &context, 1, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 2);
    }

    #[test]
    fn stopthread_silences_a_looping_thread() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            handle = startglobalthread(function()
                while true do
                    ticks = ticks + 1
                    breakhere()
                end
            end)
            "#,
        );
        run_frames(&lua, &context, 2, 0.1);
        let before = global_i64(&lua, "ticks");
        exec(&lua, "stopthread(handle)");
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "ticks"), before);
        assert_eq!(context.borrow().threads().live_count(), 0);
    }

    #[test]
    fn stale_wakeup_after_stop_is_dropped_silently() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            marker = 0
            handle = startglobalthread(function()
                breaktime(0.1)
                marker = 1
            end)
            "#,
        );
        // let the condition complete and the wake-up enter the queue, then
        // stop the thread before the wake-up fires
        run_frames(&lua, &context, 1, 0.2);
        exec(&lua, "stopthread(handle)");
        run_frames(&lua, &context, 2, 0.2);
        assert_eq!(global_i64(&lua, "marker"), 0);
        assert!(!context
            .borrow()
            .events()
            .iter()
            .any(|e| e.starts_with("script.error")));
    }

    #[test]
    fn breakwhilesound_resumes_when_the_sound_ends() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            marker = 0
            startglobalthread(function()
                local sound = playSound("drip", 0.3)
                breakwhilesound(sound)
                marker = 1
            end)
            "#,
        );
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 0);
        run_frames(&lua, &context, 2, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 1);
    }

    #[test]
    fn breakwhilerunning_joins_a_child_thread() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            order = ""
            startglobalthread(function()
                local child = startthread(function()
                    breaktime(0.2)
                    order = order .. "child "
                end)
                breakwhilerunning(child)
                order = order .. "parent"
            end)
            "#,
        );
        run_frames(&lua, &context, 8, 0.1);
        let order: String = lua.globals().get("order").expect("order");
        assert_eq!(order, "child parent");
    }

    #[test]
    fn script_error_is_contained_and_logged() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            startglobalthread(function()
                breakhere()
                error("boom")
            end)
            startglobalthread(function()
                while true do
                    ticks = ticks + 1
                    breakhere()
                end
            end)
            "#,
        );
        run_frames(&lua, &context, 4, 0.1);
        assert!(context
            .borrow()
            .events()
            .iter()
            .any(|e| e.starts_with("script.error") && e.contains("boom")));
        // the healthy thread kept running
        assert!(global_i64(&lua, "ticks") >= 4);
        assert_eq!(context.borrow().threads().live_count(), 1);
    }

    #[test]
    fn cutscene_suspends_caller_until_body_finishes() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            log = ""
            startglobalthread(function()
                log = log .. "before "
                cutscene(function()
                    log = log .. "body "
                    breaktime(0.2)
                    log = log .. "done "
                end)
                log = log .. "after"
            end)
            "#,
        );
        run_frames(&lua, &context, 1, 0.1);
        assert!(context.borrow().in_cutscene());
        assert!(!context.borrow().input_active());
        run_frames(&lua, &context, 6, 0.1);
        let log: String = lua.globals().get("log").expect("log");
        assert_eq!(log, "before body done after");
        assert!(!context.borrow().in_cutscene());
        assert!(context.borrow().input_active());
    }

    #[test]
    fn cutscene_override_replaces_the_body() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            log = ""
            startglobalthread(function()
                cutscene(function()
                    log = log .. "body "
                    breaktime(10.0)
                    log = log .. "never "
                end, function()
                    log = log .. "skip "
                end)
                log = log .. "after"
            end)
            "#,
        );
        run_frames(&lua, &context, 2, 0.1);
        exec(&lua, "cutsceneOverride()");
        run_frames(&lua, &context, 3, 0.1);
        let log: String = lua.globals().get("log").expect("log");
        assert_eq!(log, "body skip after");
        assert!(!context.borrow().in_cutscene());
    }

    #[test]
    fn pauseable_threads_hold_their_wakeups_during_a_cutscene() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            bg = startglobalthread(function()
                while true do
                    ticks = ticks + 1
                    breakhere()
                end
            end)
            startglobalthread(function()
                cutscene(function()
                    breaktime(0.5)
                end)
            end)
            "#,
        );
        run_frames(&lua, &context, 6, 0.1);
        assert!(context.borrow().in_cutscene());
        assert_eq!(global_i64(&lua, "ticks"), 1, "held while the cutscene runs");
        run_frames(&lua, &context, 4, 0.1);
        assert!(!context.borrow().in_cutscene());
        assert!(global_i64(&lua, "ticks") >= 2, "resumes once the cutscene ends");
    }

    #[test]
    fn threadpauseable_off_keeps_a_thread_running_through_a_cutscene() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            bg = startglobalthread(function()
                while true do
                    ticks = ticks + 1
                    breakhere()
                end
            end)
            threadpauseable(bg, false)
            startglobalthread(function()
                cutscene(function()
                    breaktime(0.5)
                end)
            end)
            "#,
        );
        run_frames(&lua, &context, 6, 0.1);
        assert!(context.borrow().in_cutscene());
        assert!(global_i64(&lua, "ticks") >= 4, "keeps ticking inside the cutscene");
    }

    #[test]
    fn breakwhileanimating_waits_for_the_object_animation() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            marker = 0
            door = createObject("door", 0.0, 0.0, 1.0, 1.0)
            startglobalthread(function()
                objectPlayAnimation(door, "open", 0.25)
                breakwhileanimating(door)
                marker = 1
            end)
            "#,
        );
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 0);
        run_frames(&lua, &context, 2, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 1);
    }

    #[test]
    fn cutscene_children_die_with_the_cutscene() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            startglobalthread(function()
                cutscene(function()
                    startthread(function()
                        while true do
                            ticks = ticks + 1
                            breakhere()
                        end
                    end)
                    breaktime(0.3)
                end)
            end)
            "#,
        );
        run_frames(&lua, &context, 6, 0.1);
        assert!(!context.borrow().in_cutscene());
        let before = global_i64(&lua, "ticks");
        assert!(before >= 2, "the child ran while the body did");
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "ticks"), before);
        assert_eq!(context.borrow().threads().live_count(), 0);
        assert!(context
            .borrow()
            .events()
            .iter()
            .any(|e| e.starts_with("thread.stop")));
    }

    #[test]
    fn cutscene_override_stops_the_bodys_children() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            log = ""
            startglobalthread(function()
                cutscene(function()
                    startthread(function()
                        while true do
                            ticks = ticks + 1
                            breakhere()
                        end
                    end)
                    breaktime(10.0)
                end, function()
                    log = "skipped"
                end)
            end)
            "#,
        );
        run_frames(&lua, &context, 2, 0.1);
        exec(&lua, "cutsceneOverride()");
        run_frames(&lua, &context, 1, 0.1);
        let before = global_i64(&lua, "ticks");
        assert!(before >= 2);
        run_frames(&lua, &context, 4, 0.1);
        assert_eq!(global_i64(&lua, "ticks"), before);
        let log: String = lua.globals().get("log").expect("log");
        assert_eq!(log, "skipped");
        assert!(!context.borrow().in_cutscene());
        assert_eq!(context.borrow().threads().live_count(), 0);
    }

    #[test]
    fn nested_cutscene_raises_a_contained_script_error() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            startglobalthread(function()
                cutscene(function()
                    cutscene(function() end)
                end)
            end)
            "#,
        );
        run_frames(&lua, &context, 4, 0.1);
        assert!(context
            .borrow()
            .events()
            .iter()
            .any(|e| e.starts_with("script.error")));
    }

    #[test]
    fn trigger_fires_on_containment_edges() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            entered = 0
            left = 0
            actor = createActor("ray")
            door = createObject("door", 2.0, -1.0, 2.0, 2.0)
            addTrigger(door, function(obj, who)
                entered = entered + 1
            end, function(obj, who)
                left = left + 1
            end)
            startglobalthread(function()
                actorWalkTo(actor, 6.0, 0.0)
                breakwhilewalking(actor)
            end)
            "#,
        );
        // walk speed 1.5 units/s across x in [2, 4]: inside near t = 1.4s,
        // out again near t = 2.7s
        run_frames(&lua, &context, 40, 0.1);
        assert_eq!(global_i64(&lua, "entered"), 1);
        assert_eq!(global_i64(&lua, "left"), 1);
    }

    #[test]
    fn trigger_error_is_logged_and_trigger_stays_armed() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            fired = 0
            actor = createActor("ray")
            pad = createObject("pad", 1.0, -1.0, 1.0, 2.0)
            addTrigger(pad, function(obj, who)
                fired = fired + 1
                error("trigger boom")
            end)
            "#,
        );
        exec(&lua, "actorWalkTo(actor, 1.5, 0.0)");
        run_frames(&lua, &context, 15, 0.1);
        assert_eq!(global_i64(&lua, "fired"), 1);
        assert!(context
            .borrow()
            .events()
            .iter()
            .any(|e| e.starts_with("trigger.error")));
        // leave and re-enter: the recreated dispatcher fires again
        exec(&lua, "actorWalkTo(actor, 5.0, 0.0)");
        run_frames(&lua, &context, 30, 0.1);
        exec(&lua, "actorWalkTo(actor, 1.5, 0.0)");
        run_frames(&lua, &context, 30, 0.1);
        assert_eq!(global_i64(&lua, "fired"), 2);
    }

    #[test]
    fn enter_room_stops_the_previous_rooms_threads() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            ticks = 0
            hall = defineRoom("hall")
            cellar = defineRoom("cellar")
            enterRoom(hall)
            startthread(function()
                while true do
                    ticks = ticks + 1
                    breakhere()
                end
            end)
            "#,
        );
        run_frames(&lua, &context, 2, 0.1);
        let before = global_i64(&lua, "ticks");
        assert!(before >= 2);
        exec(&lua, "enterRoom(cellar)");
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "ticks"), before);
    }

    #[test]
    fn callback_fires_once_after_its_delay() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            fired = 0
            addCallback(0.25, function() fired = fired + 1 end)
            "#,
        );
        run_frames(&lua, &context, 2, 0.1);
        assert_eq!(global_i64(&lua, "fired"), 0);
        run_frames(&lua, &context, 1, 0.1);
        assert_eq!(global_i64(&lua, "fired"), 1);
        run_frames(&lua, &context, 5, 0.1);
        assert_eq!(global_i64(&lua, "fired"), 1);
    }

    #[test]
    fn callback_error_is_logged_and_does_not_unwind() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            fired = 0
            addCallback(0.1, function() error("callback boom") end)
            addCallback(0.2, function() fired = fired + 1 end)
            "#,
        );
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "fired"), 1);
        assert!(context
            .borrow()
            .events()
            .iter()
            .any(|e| e.starts_with("callback.error") && e.contains("callback boom")));
    }

    #[test]
    fn breakwhiledialog_waits_for_the_talk_line() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            marker = 0
            actor = createActor("clerk")
            startglobalthread(function()
                actorSay(actor, "hi")
                breakwhiledialog()
                marker = 1
            end)
            "#,
        );
        // 0.4 + 2 * 0.05 = 0.5 seconds of talk
        run_frames(&lua, &context, 5, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 0);
        run_frames(&lua, &context, 2, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 1);
    }

    #[test]
    fn idle_when_every_thread_and_action_is_gone() {
        let (lua, context) = make_host();
        assert!(context.borrow().is_idle());
        exec(
            &lua,
            r#"
            startglobalthread(function()
                breaktime(0.1)
            end)
            "#,
        );
        assert!(!context.borrow().is_idle());
        run_frames(&lua, &context, 5, 0.1);
        assert!(context.borrow().is_idle());
    }

    #[test]
    fn camera_pan_backs_the_camera_break() {
        let (lua, context) = make_host();
        exec(
            &lua,
            r#"
            marker = 0
            startglobalthread(function()
                cameraPanTo(10.0, 0.0, 0.3)
                breakwhilecamera()
                marker = 1
            end)
            "#,
        );
        run_frames(&lua, &context, 3, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 0);
        run_frames(&lua, &context, 2, 0.1);
        assert_eq!(global_i64(&lua, "marker"), 1);
    }

    #[test]
    fn vec2_helpers_feed_the_world_clocks() {
        let mut context = EngineContext::new(false, PathBuf::from("."));
        let actor = context.actors_mut().create("ray".to_string());
        context.actors_mut().set_position(actor, Vec2::new(1.0, 1.0));
        context.advance_world(0.1);
        assert!((context.game_time() - 0.1).abs() < 1e-6);
        assert_eq!(context.actors().get(actor).map(|a| a.position().x), Some(1.0));
    }
}
