use thiserror::Error;

pub(crate) const ACTOR_ID_START: u32 = 1000;
pub(crate) const ROOM_ID_START: u32 = 2000;
pub(crate) const OBJECT_ID_START: u32 = 3000;
pub(crate) const SOUND_ID_START: u32 = 5000;
pub(crate) const THREAD_ID_START: u32 = 8000;

/// Classification of the opaque `_id` every script-side mirror table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    Actor,
    Room,
    Object,
    Sound,
    Thread,
}

impl ObjectKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Actor => "actor",
            ObjectKind::Room => "room",
            ObjectKind::Object => "object",
            ObjectKind::Sound => "sound",
            ObjectKind::Thread => "thread",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ResolveError {
    #[error("id {0} is outside every known object range")]
    UnknownRange(i64),
}

pub(crate) fn classify_id(id: i64) -> Result<ObjectKind, ResolveError> {
    let id = u32::try_from(id).map_err(|_| ResolveError::UnknownRange(id))?;
    match id {
        _ if id >= THREAD_ID_START => Ok(ObjectKind::Thread),
        _ if id >= SOUND_ID_START => Ok(ObjectKind::Sound),
        _ if id >= OBJECT_ID_START => Ok(ObjectKind::Object),
        _ if id >= ROOM_ID_START => Ok(ObjectKind::Room),
        _ if id >= ACTOR_ID_START => Ok(ObjectKind::Actor),
        _ => Err(ResolveError::UnknownRange(id as i64)),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct Vec2 {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl Vec2 {
    pub(crate) fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub(crate) fn distance_to(&self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned hotspot rectangle, origin at the lower-left corner.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Rect {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

impl Rect {
    pub(crate) fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_id_covers_every_range() {
        assert_eq!(classify_id(1000).unwrap(), ObjectKind::Actor);
        assert_eq!(classify_id(2400).unwrap(), ObjectKind::Room);
        assert_eq!(classify_id(3001).unwrap(), ObjectKind::Object);
        assert_eq!(classify_id(5000).unwrap(), ObjectKind::Sound);
        assert_eq!(classify_id(8123).unwrap(), ObjectKind::Thread);
        assert!(classify_id(0).is_err());
        assert!(classify_id(999).is_err());
        assert!(classify_id(-4).is_err());
    }

    #[test]
    fn rect_contains_is_edge_inclusive() {
        let rect = Rect::new(1.0, 1.0, 2.0, 2.0);
        assert!(rect.contains(Vec2::new(1.0, 1.0)));
        assert!(rect.contains(Vec2::new(3.0, 3.0)));
        assert!(rect.contains(Vec2::new(2.0, 2.0)));
        assert!(!rect.contains(Vec2::new(0.9, 2.0)));
        assert!(!rect.contains(Vec2::new(2.0, 3.1)));
    }
}
