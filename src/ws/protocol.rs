//! Event channel protocol definitions
//! These are the wire types exchanged with the authoritative peer.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::game::projectile::{Projectile, RemoteProjectile};
use crate::game::state::{Player, Stats};
use crate::game::{PlayerId, Vec2};

/// Events sent from the client to the authoritative peer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Request to enter the session
    Join(JoinPayload),
    /// New candidate local position
    UpdatePosition(Vec2),
    /// A projectile was just fired locally
    NewBullet(BulletPayload),
    /// Full set of local projectiles, sent every projectile tick
    UpdateBullets(Vec<BulletPayload>),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::UpdatePosition(_) => "updatePosition",
            ClientEvent::NewBullet(_) => "newBullet",
            ClientEvent::UpdateBullets(_) => "updateBullets",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

/// Projectile as the peer sees it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BulletPayload {
    pub x: f32,
    pub y: f32,
    pub velocity: Vec2,
}

impl From<&Projectile> for BulletPayload {
    fn from(projectile: &Projectile) -> Self {
        Self {
            x: projectile.position.x,
            y: projectile.position.y,
            velocity: projectile.velocity,
        }
    }
}

/// Events received from the authoritative peer, already normalised
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Connection confirmed; carries the id the peer assigned to us
    Connect { id: PlayerId },
    /// Full roster, keyed form
    PlayersState(Vec<Player>),
    /// Full roster, array form
    UpdatePlayerList(Vec<Player>),
    /// One player changed
    PlayerMoved(Player),
    PlayerDisconnected(PlayerId),
    /// Snapshot of every projectile the peer knows about
    BulletUpdate(Vec<RemoteProjectile>),
    /// We were hit; optionally respawned at a new position
    PlayerHit { respawn: Option<Vec2> },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connect { .. } => "connect",
            ServerEvent::PlayersState(_) => "playersState",
            ServerEvent::UpdatePlayerList(_) => "updatePlayerList",
            ServerEvent::PlayerMoved(_) => "playerMoved",
            ServerEvent::PlayerDisconnected(_) => "playerDisconnected",
            ServerEvent::BulletUpdate(_) => "bulletUpdate",
            ServerEvent::PlayerHit { .. } => "playerHit",
        }
    }

    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let Envelope { event, data } = serde_json::from_str(text)?;

        match event.as_str() {
            "connect" => {
                let ConnectPayload { id } = payload("connect", data)?;
                Ok(ServerEvent::Connect { id })
            }
            "playersState" => {
                let entries: Vec<(String, PlayerRecord)> =
                    match payload::<RosterPayload>("playersState", data)? {
                        RosterPayload::Keyed(map) => map
                            .into_iter()
                            .filter_map(|(id, value)| {
                                record("playersState", value).map(|record| (id, record))
                            })
                            .collect(),
                        RosterPayload::Entries(items) => records("playersState", items),
                    };
                let players = entries
                    .into_iter()
                    .map(|(id, record)| record.into_player(PlayerId::new(id)))
                    .collect();
                Ok(ServerEvent::PlayersState(players))
            }
            "updatePlayerList" => {
                let items: Vec<Value> = payload("updatePlayerList", data)?;
                let players = records::<PlayerRecord>("updatePlayerList", items)
                    .into_iter()
                    .filter_map(|record| {
                        record
                            .into_identified_player("updatePlayerList")
                            .map_err(|e| warn!(error = %e, "Skipping roster entry"))
                            .ok()
                    })
                    .collect();
                Ok(ServerEvent::UpdatePlayerList(players))
            }
            "playerMoved" => {
                let record: PlayerRecord = payload("playerMoved", data)?;
                Ok(ServerEvent::PlayerMoved(
                    record.into_identified_player("playerMoved")?,
                ))
            }
            "playerDisconnected" => Ok(ServerEvent::PlayerDisconnected(payload(
                "playerDisconnected",
                data,
            )?)),
            "bulletUpdate" => {
                let items: Vec<Value> = payload("bulletUpdate", data)?;
                Ok(ServerEvent::BulletUpdate(
                    records::<RemoteBulletRecord>("bulletUpdate", items)
                        .into_iter()
                        .map(RemoteProjectile::from)
                        .collect(),
                ))
            }
            "playerHit" => {
                let hit: HitPayload = if data.is_null() {
                    HitPayload::default()
                } else {
                    payload("playerHit", data)?
                };
                Ok(ServerEvent::PlayerHit {
                    respawn: hit.x.zip(hit.y).map(|(x, y)| Vec2::new(x, y)),
                })
            }
            _ => Err(ProtocolError::UnknownEvent(event)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ConnectPayload {
    id: PlayerId,
}

/// Keyed roster: either a JSON object or a list of `[id, player]` pairs.
/// Entries are decoded one by one so a bad entry only costs itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RosterPayload {
    Keyed(HashMap<String, Value>),
    Entries(Vec<Value>),
}

/// Player as sent by the peer. Any field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerRecord {
    pub id: Option<PlayerId>,
    pub name: Option<String>,
    pub character: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
}

impl PlayerRecord {
    /// Partial coordinates or counters are dropped rather than zero-filled
    pub fn into_player(self, id: PlayerId) -> Player {
        Player {
            id,
            name: self.name.unwrap_or_default(),
            character: self.character,
            position: self.x.zip(self.y).map(|(x, y)| Vec2::new(x, y)),
            stats: self.kills.zip(self.deaths).map(|(kills, deaths)| Stats { kills, deaths }),
        }
    }

    fn into_identified_player(mut self, event: &'static str) -> Result<Player, ProtocolError> {
        let id = self.id.take().ok_or(ProtocolError::MissingId(event))?;
        Ok(self.into_player(id))
    }
}

#[derive(Debug, Deserialize)]
struct RemoteBulletRecord {
    x: f32,
    y: f32,
    #[serde(default)]
    velocity: Vec2,
    #[serde(default, rename = "playerId")]
    player_id: Option<PlayerId>,
}

impl From<RemoteBulletRecord> for RemoteProjectile {
    fn from(record: RemoteBulletRecord) -> Self {
        Self {
            owner: record.player_id,
            position: Vec2::new(record.x, record.y),
            velocity: record.velocity,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HitPayload {
    x: Option<f32>,
    y: Option<f32>,
}

fn payload<T: DeserializeOwned>(
    event: &'static str,
    data: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload { event, source })
}

/// Decode one entry of a collection payload; a malformed entry is logged and skipped
fn record<T: DeserializeOwned>(event: &'static str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(event, error = %e, "Skipping malformed entry");
            None
        }
    }
}

fn records<T: DeserializeOwned>(event: &'static str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| record(event, item))
        .collect()
}

/// Reasons an inbound frame is dropped
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not a valid event envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown event {0:?}")]
    UnknownEvent(String),

    #[error("malformed {event} payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} record has no id")]
    MissingId(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_events_use_event_data_envelope() {
        let join = ClientEvent::Join(JoinPayload {
            name: "ana".to_string(),
            character: None,
        });
        assert_eq!(
            serde_json::to_value(&join).unwrap(),
            json!({"event": "join", "data": {"name": "ana"}})
        );

        let moved = ClientEvent::UpdatePosition(Vec2::new(105.0, 100.0));
        assert_eq!(
            serde_json::to_value(&moved).unwrap(),
            json!({"event": "updatePosition", "data": {"x": 105.0, "y": 100.0}})
        );

        let bullets = ClientEvent::UpdateBullets(vec![BulletPayload {
            x: 1.0,
            y: 2.0,
            velocity: Vec2::new(5.0, 0.0),
        }]);
        assert_eq!(
            serde_json::to_value(&bullets).unwrap(),
            json!({"event": "updateBullets", "data": [{"x": 1.0, "y": 2.0, "velocity": {"x": 5.0, "y": 0.0}}]})
        );
        assert_eq!(bullets.name(), "updateBullets");
    }

    #[test]
    fn keyed_roster_takes_ids_from_keys() {
        let text = r#"{"event":"playersState","data":{
            "A":{"x":10,"y":10,"kills":2,"deaths":1},
            "B":{"x":20,"y":20}
        }}"#;

        let ServerEvent::PlayersState(mut players) = ServerEvent::decode(text).unwrap() else {
            panic!("expected playersState");
        };
        players.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(players[0].id, PlayerId::from("A"));
        assert_eq!(players[0].stats, Some(Stats { kills: 2, deaths: 1 }));
        assert_eq!(players[1].position, Some(Vec2::new(20.0, 20.0)));
        assert_eq!(players[1].stats, None);
    }

    #[test]
    fn roster_accepts_entry_pairs() {
        let text = r#"{"event":"playersState","data":[["B",{"name":"bo","x":1,"y":2}]]}"#;
        let event = ServerEvent::decode(text).unwrap();
        let ServerEvent::PlayersState(players) = event else {
            panic!("expected playersState");
        };
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "bo");
    }

    #[test]
    fn partial_coordinates_are_absent_not_zero() {
        let text = r#"{"event":"playerMoved","data":{"id":"B","x":5,"kills":3}}"#;
        let ServerEvent::PlayerMoved(player) = ServerEvent::decode(text).unwrap() else {
            panic!("expected playerMoved");
        };
        assert_eq!(player.position, None);
        assert_eq!(player.stats, None);
    }

    #[test]
    fn player_list_skips_entries_without_ids() {
        let text = r#"{"event":"updatePlayerList","data":[{"id":"B"},{"id":"C"},{"name":"ghost"}]}"#;
        let ServerEvent::UpdatePlayerList(players) = ServerEvent::decode(text).unwrap() else {
            panic!("expected updatePlayerList");
        };
        let ids: Vec<_> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["B", "C"]);
    }

    #[test]
    fn malformed_roster_entries_are_skipped_in_both_forms() {
        let keyed = r#"{"event":"playersState","data":{"A":{"x":1,"y":1},"B":{"x":"far"},"C":7}}"#;
        let ServerEvent::PlayersState(players) = ServerEvent::decode(keyed).unwrap() else {
            panic!("expected playersState");
        };
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, PlayerId::from("A"));

        let pairs = r#"{"event":"playersState","data":[["A",{}],["B"],"C"]}"#;
        let ServerEvent::PlayersState(players) = ServerEvent::decode(pairs).unwrap() else {
            panic!("expected playersState");
        };
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, PlayerId::from("A"));
    }

    #[test]
    fn moved_record_without_id_is_rejected() {
        let text = r#"{"event":"playerMoved","data":{"x":1,"y":1}}"#;
        assert!(matches!(
            ServerEvent::decode(text),
            Err(ProtocolError::MissingId("playerMoved"))
        ));
    }

    #[test]
    fn bullet_update_keeps_valid_entries() {
        let text = r#"{"event":"bulletUpdate","data":[{"x":1,"y":1,"playerId":"B"},{"x":2}]}"#;
        let ServerEvent::BulletUpdate(bullets) = ServerEvent::decode(text).unwrap() else {
            panic!("expected bulletUpdate");
        };
        assert_eq!(bullets.len(), 1);
        assert_eq!(bullets[0].owner, Some(PlayerId::from("B")));
        assert_eq!(bullets[0].position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn player_hit_accepts_missing_empty_and_positioned_payloads() {
        for text in [
            r#"{"event":"playerHit"}"#,
            r#"{"event":"playerHit","data":null}"#,
            r#"{"event":"playerHit","data":{}}"#,
            r#"{"event":"playerHit","data":{"x":3}}"#,
        ] {
            assert_eq!(
                ServerEvent::decode(text).unwrap(),
                ServerEvent::PlayerHit { respawn: None },
                "{text}"
            );
        }

        let text = r#"{"event":"playerHit","data":{"x":30,"y":40}}"#;
        assert_eq!(
            ServerEvent::decode(text).unwrap(),
            ServerEvent::PlayerHit {
                respawn: Some(Vec2::new(30.0, 40.0))
            }
        );
    }

    #[test]
    fn bullet_update_reads_owner_and_defaults_velocity() {
        let text = r#"{"event":"bulletUpdate","data":[
            {"x":1,"y":2,"velocity":{"x":5,"y":0},"playerId":"A"},
            {"x":3,"y":4}
        ]}"#;
        let ServerEvent::BulletUpdate(bullets) = ServerEvent::decode(text).unwrap() else {
            panic!("expected bulletUpdate");
        };
        assert_eq!(bullets[0].owner, Some(PlayerId::from("A")));
        assert_eq!(bullets[1].owner, None);
        assert_eq!(bullets[1].velocity, Vec2::ZERO);
    }

    #[test]
    fn connect_and_disconnect_carry_ids() {
        assert_eq!(
            ServerEvent::decode(r#"{"event":"connect","data":{"id":"A"}}"#).unwrap(),
            ServerEvent::Connect {
                id: PlayerId::from("A")
            }
        );
        assert_eq!(
            ServerEvent::decode(r#"{"event":"playerDisconnected","data":"B"}"#).unwrap(),
            ServerEvent::PlayerDisconnected(PlayerId::from("B"))
        );
    }

    #[test]
    fn malformed_frames_are_errors_not_panics() {
        assert!(matches!(
            ServerEvent::decode("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"event":"teleport","data":{}}"#),
            Err(ProtocolError::UnknownEvent(name)) if name == "teleport"
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"event":"playerMoved","data":{"id":"B","x":"far"}}"#),
            Err(ProtocolError::Payload { event: "playerMoved", .. })
        ));
    }
}
