use std::collections::BTreeMap;

use super::super::types::{Rect, OBJECT_ID_START};

#[derive(Debug, Clone)]
struct AnimationState {
    name: String,
    remaining: f32,
}

#[derive(Debug)]
pub(super) struct ObjectRecord {
    name: String,
    hotspot: Rect,
    animation: Option<AnimationState>,
}

impl ObjectRecord {
    pub(super) fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn hotspot(&self) -> Rect {
        self.hotspot
    }

    pub(super) fn is_animating(&self) -> bool {
        self.animation.is_some()
    }
}

#[derive(Debug)]
pub(super) struct ObjectRuntime {
    next_id: u32,
    records: BTreeMap<u32, ObjectRecord>,
}

impl ObjectRuntime {
    pub(super) fn new() -> Self {
        ObjectRuntime {
            next_id: OBJECT_ID_START,
            records: BTreeMap::new(),
        }
    }

    pub(super) fn create(&mut self, name: String, hotspot: Rect) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(
            id,
            ObjectRecord {
                name,
                hotspot,
                animation: None,
            },
        );
        id
    }

    pub(super) fn get(&self, id: u32) -> Option<&ObjectRecord> {
        self.records.get(&id)
    }

    pub(super) fn contains(&self, id: u32) -> bool {
        self.records.contains_key(&id)
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

    pub(super) fn advance(&mut self, dt: f32) -> Vec<String> {
        let mut events = Vec::new();
        for (id, record) in self.records.iter_mut() {
            if let Some(animation) = record.animation.as_mut() {
                animation.remaining -= dt;
                if animation.remaining <= 0.0 {
                    events.push(format!("object.anim.done {} (#{id})", animation.name));
                    record.animation = None;
                }
            }
        }
        events
    }
}
