//! NPC entity and the partial record pushed over the socket

use serde::{Deserialize, Serialize};

use crate::NpcId;

fn default_stat() -> i32 {
    100
}

fn default_alive() -> bool {
    true
}

/// A non-player character as the director sees it.
///
/// Plain data struct; the backend owns every rule about how these numbers
/// move, the client only mirrors them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
    #[serde(default = "default_stat")]
    pub hp: i32,
    #[serde(default = "default_stat")]
    pub sanity: i32,
    #[serde(default)]
    pub fear: i32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status_effects: Vec<String>,
    #[serde(default = "default_alive")]
    pub is_alive: bool,
}

impl Npc {
    pub fn new(id: impl Into<NpcId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hp: default_stat(),
            sanity: default_stat(),
            fear: 0,
            location: String::new(),
            status_effects: Vec::new(),
            is_alive: true,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Partial NPC update: `id` plus whichever fields changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcPatch {
    pub id: NpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fear: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_effects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
}

impl NpcPatch {
    pub fn new(id: impl Into<NpcId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Overwrite the fields this patch carries. The id is never changed.
    pub fn apply_to(&self, npc: &mut Npc) {
        if let Some(name) = &self.name {
            npc.name.clone_from(name);
        }
        if let Some(hp) = self.hp {
            npc.hp = hp;
        }
        if let Some(sanity) = self.sanity {
            npc.sanity = sanity;
        }
        if let Some(fear) = self.fear {
            npc.fear = fear;
        }
        if let Some(location) = &self.location {
            npc.location.clone_from(location);
        }
        if let Some(effects) = &self.status_effects {
            npc.status_effects.clone_from(effects);
        }
        if let Some(is_alive) = self.is_alive {
            npc.is_alive = is_alive;
        }
    }

    /// Build a full NPC from this patch, using defaults for missing fields.
    /// The name falls back to the id.
    pub fn into_npc(self) -> Npc {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| self.id.as_str().to_string());
        let mut npc = Npc::new(self.id.clone(), name);
        self.apply_to(&mut npc);
        npc
    }
}

impl From<Npc> for NpcPatch {
    fn from(npc: Npc) -> Self {
        Self {
            id: npc.id,
            name: Some(npc.name),
            hp: Some(npc.hp),
            sanity: Some(npc.sanity),
            fear: Some(npc.fear),
            location: Some(npc.location),
            status_effects: Some(npc.status_effects),
            is_alive: Some(npc.is_alive),
        }
    }
}
