use std::collections::BTreeMap;

use super::super::types::{Vec2, ACTOR_ID_START};

const WALK_SPEED: f32 = 1.5;
const TALK_BASE_SECONDS: f32 = 0.4;
const TALK_SECONDS_PER_CHAR: f32 = 0.05;

#[derive(Debug, Clone)]
struct WalkState {
    target: Vec2,
}

#[derive(Debug, Clone)]
struct TalkState {
    line: String,
    remaining: f32,
}

#[derive(Debug, Clone)]
struct AnimationState {
    name: String,
    remaining: f32,
}

#[derive(Debug)]
pub(super) struct ActorRecord {
    name: String,
    position: Vec2,
    walk: Option<WalkState>,
    talk: Option<TalkState>,
    animation: Option<AnimationState>,
}

impl ActorRecord {
    pub(super) fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn position(&self) -> Vec2 {
        self.position
    }

    pub(super) fn is_walking(&self) -> bool {
        self.walk.is_some()
    }

    pub(super) fn is_talking(&self) -> bool {
        self.talk.is_some()
    }

    pub(super) fn is_animating(&self) -> bool {
        self.animation.is_some()
    }
}

/// Minimal world state behind the actor-observing break predicates: timed
/// walks, talk lines and costume animations, advanced once per frame.
#[derive(Debug)]
pub(super) struct ActorStore {
    next_id: u32,
    records: BTreeMap<u32, ActorRecord>,
    selected: Option<u32>,
}

impl ActorStore {
    pub(super) fn new() -> Self {
        ActorStore {
            next_id: ACTOR_ID_START,
            records: BTreeMap::new(),
            selected: None,
        }
    }

    pub(super) fn create(&mut self, name: String) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(
            id,
            ActorRecord {
                name,
                position: Vec2::default(),
                walk: None,
                talk: None,
                animation: None,
            },
        );
        if self.selected.is_none() {
            self.selected = Some(id);
        }
        id
    }

    pub(super) fn get(&self, id: u32) -> Option<&ActorRecord> {
        self.records.get(&id)
    }

    pub(super) fn contains(&self, id: u32) -> bool {
        self.records.contains_key(&id)
    }

    pub(super) fn select(&mut self, id: u32) {
        self.selected = Some(id);
    }

    pub(super) fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub(super) fn any_talking(&self) -> bool {
        self.records.values().any(ActorRecord::is_talking)
    }

    pub(super) fn any_walking(&self) -> bool {
        self.records.values().any(ActorRecord::is_walking)
    }

    pub(super) fn set_position(&mut self, id: u32, position: Vec2) {
        if let Some(record) = self.records.get_mut(&id) {
            record.position = position;
        }
    }

    pub(super) fn start_walk(&mut self, id: u32, target: Vec2) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.walk = Some(WalkState { target });
                true
            }
            None => false,
        }
    }

    pub(super) fn start_talk(&mut self, id: u32, line: String) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                let remaining = TALK_BASE_SECONDS + TALK_SECONDS_PER_CHAR * line.len() as f32;
                record.talk = Some(TalkState { line, remaining });
                true
            }
            None => false,
        }
    }

    pub(super) fn start_animation(&mut self, id: u32, name: String, seconds: f32) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.animation = Some(AnimationState {
                    name,
                    remaining: seconds,
                });
                true
            }
            None => false,
        }
    }

    /// Advances walk, talk and animation clocks; returns the events the
    /// frame produced, in actor-id order.
    pub(super) fn advance(&mut self, dt: f32) -> Vec<String> {
        let mut events = Vec::new();
        for (id, record) in self.records.iter_mut() {
            if let Some(walk) = record.walk.as_ref() {
                let step = WALK_SPEED * dt;
                let distance = record.position.distance_to(walk.target);
                if distance <= step {
                    record.position = walk.target;
                    record.walk = None;
                    events.push(format!("actor.walk.done {} (#{id})", record.name));
                } else {
                    let t = step / distance;
                    record.position = Vec2::new(
                        record.position.x + (walk.target.x - record.position.x) * t,
                        record.position.y + (walk.target.y - record.position.y) * t,
                    );
                }
            }
            if let Some(talk) = record.talk.as_mut() {
                talk.remaining -= dt;
                if talk.remaining <= 0.0 {
                    events.push(format!("actor.talk.done {} {}", record.name, talk.line));
                    record.talk = None;
                }
            }
            if let Some(animation) = record.animation.as_mut() {
                animation.remaining -= dt;
                if animation.remaining <= 0.0 {
                    events.push(format!("actor.anim.done {} {}", record.name, animation.name));
                    record.animation = None;
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_advances_toward_target_and_arrives() {
        let mut store = ActorStore::new();
        let id = store.create("guard".to_string());
        store.start_walk(id, Vec2::new(3.0, 0.0));
        assert!(store.get(id).unwrap().is_walking());

        // 3.0 units at 1.5 units/s takes 2 seconds
        let mut elapsed = 0.0;
        while store.get(id).unwrap().is_walking() {
            store.advance(0.1);
            elapsed += 0.1;
            assert!(elapsed < 2.5, "walk should finish within ~2 seconds");
        }
        let position = store.get(id).unwrap().position();
        assert!((position.x - 3.0).abs() < 1e-4);
        assert!(position.y.abs() < 1e-4);
    }

    #[test]
    fn talk_duration_scales_with_line_length() {
        let mut store = ActorStore::new();
        let id = store.create("clerk".to_string());
        store.start_talk(id, "hello".to_string());
        // 0.4 + 5 * 0.05 = 0.65 seconds
        store.advance(0.6);
        assert!(store.get(id).unwrap().is_talking());
        let events = store.advance(0.1);
        assert!(!store.get(id).unwrap().is_talking());
        assert!(events.iter().any(|e| e.starts_with("actor.talk.done")));
    }

    #[test]
    fn first_actor_becomes_selected() {
        let mut store = ActorStore::new();
        let first = store.create("a".to_string());
        let second = store.create("b".to_string());
        assert_eq!(store.selected(), Some(first));
        store.select(second);
        assert_eq!(store.selected(), Some(second));
    }
}
