use std::collections::BTreeMap;

use super::super::types::SOUND_ID_START;

#[derive(Debug)]
pub(super) struct SoundRecord {
    name: String,
    remaining: f32,
}

impl SoundRecord {
    pub(super) fn name(&self) -> &str {
        &self.name
    }
}

/// Playing sounds as timers; a finished or stopped sound disappears from the
/// map, so stale handles simply fail to resolve.
#[derive(Debug)]
pub(super) struct SoundRuntime {
    next_id: u32,
    records: BTreeMap<u32, SoundRecord>,
}

impl SoundRuntime {
    pub(super) fn new() -> Self {
        SoundRuntime {
            next_id: SOUND_ID_START,
            records: BTreeMap::new(),
        }
    }

    pub(super) fn play(&mut self, name: String, seconds: f32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(
            id,
            SoundRecord {
                name,
                remaining: seconds,
            },
        );
        id
    }

    pub(super) fn is_playing(&self, id: u32) -> bool {
        self.records.contains_key(&id)
    }

    pub(super) fn stop(&mut self, id: u32) -> Option<SoundRecord> {
        self.records.remove(&id)
    }

    pub(super) fn advance(&mut self, dt: f32) -> Vec<String> {
        let mut events = Vec::new();
        self.records.retain(|id, record| {
            record.remaining -= dt;
            if record.remaining <= 0.0 {
                events.push(format!("sound.done {} (#{id})", record.name));
                false
            } else {
                true
            }
        });
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_stops_after_its_duration() {
        let mut sounds = SoundRuntime::new();
        let id = sounds.play("creak".to_string(), 0.3);
        assert!(sounds.is_playing(id));
        sounds.advance(0.2);
        assert!(sounds.is_playing(id));
        let events = sounds.advance(0.2);
        assert!(!sounds.is_playing(id));
        assert!(events.iter().any(|e| e.starts_with("sound.done creak")));
    }

    #[test]
    fn stop_removes_the_record() {
        let mut sounds = SoundRuntime::new();
        let id = sounds.play("hum".to_string(), 10.0);
        assert!(sounds.stop(id).is_some());
        assert!(!sounds.is_playing(id));
        assert!(sounds.stop(id).is_none());
    }
}
