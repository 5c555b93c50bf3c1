// src/models/server.rs
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub name: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(rename = "steamId")]
    pub steam_id: String,
}

/// Players currently online. `count` always mirrors the list length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerSet {
    count: usize,
    list: Vec<Player>,
}

impl PlayerSet {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn list(&self) -> &[Player] {
        &self.list
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl From<Vec<Player>> for PlayerSet {
    fn from(list: Vec<Player>) -> Self {
        Self {
            count: list.len(),
            list,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRecord {
    pub online: bool,
    #[serde(rename = "serverName")]
    pub name: String,
    #[serde(rename = "serverVer")]
    pub version: String,
    pub players: PlayerSet,
}

impl ServerRecord {
    pub fn new(name: String, version: String, players: PlayerSet) -> Self {
        Self {
            online: !name.is_empty() && !version.is_empty(),
            name,
            version,
            players,
        }
    }

    /// Placeholder for a target that could not be reached.
    pub fn offline() -> Self {
        Self::new(String::new(), String::new(), PlayerSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str) -> Player {
        Player {
            name: name.to_string(),
            player_id: "1".to_string(),
            steam_id: "2".to_string(),
        }
    }

    #[test]
    fn online_requires_name_and_version() {
        assert!(ServerRecord::new("a".into(), "v1".into(), PlayerSet::default()).online);
        assert!(!ServerRecord::new("a".into(), String::new(), PlayerSet::default()).online);
        assert!(!ServerRecord::new(String::new(), "v1".into(), PlayerSet::default()).online);
        assert!(!ServerRecord::offline().online);
    }

    #[test]
    fn player_set_count_tracks_list() {
        let set = PlayerSet::from(vec![player("a"), player("b")]);
        assert_eq!(set.count(), 2);
        assert_eq!(set.list().len(), set.count());
    }

    #[test]
    fn serializes_with_wire_names() {
        let record = ServerRecord::new(
            "MyServer".into(),
            "v1.5.0".into(),
            PlayerSet::from(vec![player("Alice")]),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["serverName"], "MyServer");
        assert_eq!(json["serverVer"], "v1.5.0");
        assert_eq!(json["online"], true);
        assert_eq!(json["players"]["count"], 1);
        assert_eq!(json["players"]["list"][0]["playerId"], "1");
        assert_eq!(json["players"]["list"][0]["steamId"], "2");
    }

    #[test]
    fn empty_player_set_serializes_as_empty_list() {
        let json = serde_json::to_value(PlayerSet::default()).unwrap();
        assert_eq!(json["count"], 0);
        assert!(json["list"].as_array().unwrap().is_empty());
    }
}
