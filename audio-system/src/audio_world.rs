use std::collections::HashMap;

use crate::fixed::{Angle, Fixed};

/// Identity of a world object that can emit sounds. Never owned by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginId(pub u32);

/// Portal group (linked region) a position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GroupId(pub u16);

/// Position of a sound emitter plus the region flags the spatial math needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePose {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub group: GroupId,
    /// The containing sector silences every sound in it.
    pub kill_sound: bool,
}

impl SourcePose {
    pub fn at(x: Fixed, y: Fixed) -> Self {
        Self { x, y, ..Self::default() }
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = group;
        self
    }

    pub fn killed(mut self, kill: bool) -> Self {
        self.kill_sound = kill;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerPose {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    /// Facing, as a binary angle.
    pub angle: Angle,
    pub group: GroupId,
    pub kill_sound: bool,
    /// Sounds emitted by this origin are never spatialized.
    pub origin: Option<OriginId>,
}

impl ListenerPose {
    pub fn at(x: Fixed, y: Fixed, angle: Angle) -> Self {
        Self { x, y, angle, ..Self::default() }
    }

    pub fn with_origin(mut self, origin: OriginId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = group;
        self
    }

    pub fn killed(mut self, kill: bool) -> Self {
        self.kill_sound = kill;
        self
    }
}

/// Translation applied to a source in one group to express it in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortalOffset {
    pub dx: Fixed,
    pub dy: Fixed,
    pub dz: Fixed,
}

/// Read-only view of the game world used by the sound core.
pub trait SoundWorld {
    /// Current pose of `origin`, or `None` once the object is gone.
    fn origin_pose(&self, origin: OriginId) -> Option<SourcePose>;

    /// Offset that moves a point from group `from` into group `to`.
    fn portal_offset(&self, _from: GroupId, _to: GroupId) -> Option<PortalOffset> {
        None
    }
}

/// In-memory world: origins and portal offsets registered by hand.
#[derive(Debug, Default, Clone)]
pub struct StaticWorld {
    origins: HashMap<OriginId, SourcePose>,
    portals: HashMap<(GroupId, GroupId), PortalOffset>,
}

impl StaticWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_origin(&mut self, origin: OriginId, pose: SourcePose) {
        self.origins.insert(origin, pose);
    }

    pub fn remove_origin(&mut self, origin: OriginId) -> Option<SourcePose> {
        self.origins.remove(&origin)
    }

    /// Registers `offset` for `from -> to` and its negation for `to -> from`.
    pub fn link_groups(&mut self, from: GroupId, to: GroupId, offset: PortalOffset) {
        self.portals.insert((from, to), offset);
        self.portals.insert((to, from), PortalOffset { dx: -offset.dx, dy: -offset.dy, dz: -offset.dz });
    }
}

impl SoundWorld for StaticWorld {
    fn origin_pose(&self, origin: OriginId) -> Option<SourcePose> {
        self.origins.get(&origin).copied()
    }

    fn portal_offset(&self, from: GroupId, to: GroupId) -> Option<PortalOffset> {
        self.portals.get(&(from, to)).copied()
    }
}
