//! Request/response messages of the remote-call surface and their wire encoding
//!
//! ## Encoding
//!
//! Every message implements `zenoh_ext::Serialize` / `zenoh_ext::Deserialize`:
//! - enums are a `u8` tag, unknown tags fail to deserialize
//! - optional fields are a `bool` presence flag followed by the value
//! - vector clocks are a `Vec<String>` of nodes followed by a `Vec<u64>` of counters
//! - timestamps and durations are milliseconds (`u64`), timestamps since the Unix epoch

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use zenoh_ext::{Deserialize, Serialize, ZDeserializeError, ZDeserializer, ZSerializer};

use crate::clock::VectorClock;
use crate::state::QueueEntry;
use crate::types::{MatchId, PlayerId, PlayerStatus, ServerId, ServerStatus, StatusCode};

/// `QueuePlayer` request
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlayerRequest {
    pub player_id: PlayerId,
    pub game_mode_preference: String,
    pub clock: VectorClock,
}

/// `QueuePlayer` response
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlayerResponse {
    pub message: String,
    pub clock: VectorClock,
}

/// `GetPlayerStatus` request
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatusRequest {
    pub player_id: PlayerId,
    pub clock: VectorClock,
}

/// `GetPlayerStatus` response; match fields are set while the player is `IN_MATCH`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatusResponse {
    pub status: PlayerStatus,
    pub match_id: Option<MatchId>,
    pub server_address: Option<String>,
    pub clock: VectorClock,
}

/// `UpdateServerStatus` request, sent by game servers
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatusUpdate {
    pub server_id: ServerId,
    pub new_status: ServerStatus,
    pub address: String,
    /// Last match the server played to the end, if any
    pub finished_match: Option<MatchId>,
    pub clock: VectorClock,
}

/// `UpdateServerStatus` response
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatusResponse {
    pub status_code: StatusCode,
    pub message: String,
    pub clock: VectorClock,
}

/// `AssignMatch` request, sent by the coordinator to a game server
#[derive(Debug, Clone, PartialEq)]
pub struct AssignMatchRequest {
    pub match_id: MatchId,
    pub player_ids: (PlayerId, PlayerId),
    pub clock: VectorClock,
}

/// `AssignMatch` response
#[derive(Debug, Clone, PartialEq)]
pub struct AssignMatchResponse {
    pub message: String,
    pub match_id: MatchId,
    pub player_ids: (PlayerId, PlayerId),
    pub server_address: String,
    pub clock: VectorClock,
}

/// `AdminGetSystemStatus` request
#[derive(Debug, Clone, PartialEq)]
pub struct AdminStatusRequest {
    pub admin_id: String,
}

/// One server as listed in the admin snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ServerState {
    pub id: ServerId,
    pub status: ServerStatus,
    pub address: String,
    pub current_match_id: Option<MatchId>,
    pub last_update: SystemTime,
}

/// `AdminGetSystemStatus` response
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub servers: Vec<ServerState>,
    pub queue: Vec<QueueEntry>,
    pub clock: VectorClock,
}

/// `AdminUpdateServerState` request
#[derive(Debug, Clone, PartialEq)]
pub struct AdminServerUpdate {
    pub server_id: ServerId,
    pub new_status: ServerStatus,
}

/// `AdminUpdateServerState` response
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUpdateResponse {
    pub status_code: StatusCode,
    pub message: String,
}

// ---- helpers ----

fn put_option<T: Serialize>(value: &Option<T>, serializer: &mut ZSerializer) {
    value.is_some().serialize(serializer);
    if let Some(value) = value {
        value.serialize(serializer);
    }
}

fn take_option<T: Deserialize>(
    deserializer: &mut ZDeserializer,
) -> Result<Option<T>, ZDeserializeError> {
    if bool::deserialize(deserializer)? {
        Ok(Some(T::deserialize(deserializer)?))
    } else {
        Ok(None)
    }
}

fn put_pair(pair: &(PlayerId, PlayerId), serializer: &mut ZSerializer) {
    pair.0.serialize(serializer);
    pair.1.serialize(serializer);
}

fn take_pair(deserializer: &mut ZDeserializer) -> Result<(PlayerId, PlayerId), ZDeserializeError> {
    Ok((
        PlayerId::deserialize(deserializer)?,
        PlayerId::deserialize(deserializer)?,
    ))
}

fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---- domain types ----

impl Serialize for VectorClock {
    fn serialize(&self, serializer: &mut ZSerializer) {
        let nodes: Vec<String> = self.iter().map(|(node, _)| node.to_string()).collect();
        let counters: Vec<u64> = self.iter().map(|(_, value)| value).collect();
        nodes.serialize(serializer);
        counters.serialize(serializer);
    }
}

impl Deserialize for VectorClock {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        let nodes = Vec::<String>::deserialize(deserializer)?;
        let counters = Vec::<u64>::deserialize(deserializer)?;
        let nodes_len = nodes.len();
        if nodes_len != counters.len() {
            return Err(ZDeserializeError);
        }
        let clock: VectorClock = nodes.into_iter().zip(counters).collect();
        // A node listed twice would collapse into one entry
        if clock.len() != nodes_len {
            return Err(ZDeserializeError);
        }
        Ok(clock)
    }
}

impl Serialize for PlayerId {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.0.serialize(serializer);
    }
}

impl Deserialize for PlayerId {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(PlayerId(u32::deserialize(deserializer)?))
    }
}

impl Serialize for ServerId {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.as_str().to_string().serialize(serializer);
    }
}

impl Deserialize for ServerId {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        ServerId::from_name(String::deserialize(deserializer)?).map_err(|_| ZDeserializeError)
    }
}

impl Serialize for PlayerStatus {
    fn serialize(&self, serializer: &mut ZSerializer) {
        let tag: u8 = match self {
            PlayerStatus::Idle => 0,
            PlayerStatus::InQueue => 1,
            PlayerStatus::InMatch => 2,
        };
        tag.serialize(serializer);
    }
}

impl Deserialize for PlayerStatus {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        match u8::deserialize(deserializer)? {
            0 => Ok(PlayerStatus::Idle),
            1 => Ok(PlayerStatus::InQueue),
            2 => Ok(PlayerStatus::InMatch),
            _ => Err(ZDeserializeError),
        }
    }
}

impl Serialize for ServerStatus {
    fn serialize(&self, serializer: &mut ZSerializer) {
        let tag: u8 = match self {
            ServerStatus::Available => 0,
            ServerStatus::Busy => 1,
            ServerStatus::Down => 2,
        };
        tag.serialize(serializer);
    }
}

impl Deserialize for ServerStatus {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        match u8::deserialize(deserializer)? {
            0 => Ok(ServerStatus::Available),
            1 => Ok(ServerStatus::Busy),
            2 => Ok(ServerStatus::Down),
            _ => Err(ZDeserializeError),
        }
    }
}

impl Serialize for StatusCode {
    fn serialize(&self, serializer: &mut ZSerializer) {
        let tag: u8 = match self {
            StatusCode::Success => 0,
            StatusCode::NotFound => 1,
            StatusCode::InvalidStatus => 2,
            StatusCode::InvalidTransition => 3,
            StatusCode::Failure => 4,
        };
        tag.serialize(serializer);
    }
}

impl Deserialize for StatusCode {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        match u8::deserialize(deserializer)? {
            0 => Ok(StatusCode::Success),
            1 => Ok(StatusCode::NotFound),
            2 => Ok(StatusCode::InvalidStatus),
            3 => Ok(StatusCode::InvalidTransition),
            4 => Ok(StatusCode::Failure),
            _ => Err(ZDeserializeError),
        }
    }
}

impl Serialize for QueueEntry {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.player_id.serialize(serializer);
        (self.time_in_queue.as_millis() as u64).serialize(serializer);
    }
}

impl Deserialize for QueueEntry {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(QueueEntry {
            player_id: PlayerId::deserialize(deserializer)?,
            time_in_queue: Duration::from_millis(u64::deserialize(deserializer)?),
        })
    }
}

// ---- messages ----

impl Serialize for QueuePlayerRequest {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.player_id.serialize(serializer);
        self.game_mode_preference.serialize(serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for QueuePlayerRequest {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            player_id: PlayerId::deserialize(deserializer)?,
            game_mode_preference: String::deserialize(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for QueuePlayerResponse {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.message.serialize(serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for QueuePlayerResponse {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            message: String::deserialize(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for PlayerStatusRequest {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.player_id.serialize(serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for PlayerStatusRequest {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            player_id: PlayerId::deserialize(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for PlayerStatusResponse {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.status.serialize(serializer);
        put_option(&self.match_id, serializer);
        put_option(&self.server_address, serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for PlayerStatusResponse {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            status: PlayerStatus::deserialize(deserializer)?,
            match_id: take_option(deserializer)?,
            server_address: take_option(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for ServerStatusUpdate {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.server_id.serialize(serializer);
        self.new_status.serialize(serializer);
        self.address.serialize(serializer);
        put_option(&self.finished_match, serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for ServerStatusUpdate {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            server_id: ServerId::deserialize(deserializer)?,
            new_status: ServerStatus::deserialize(deserializer)?,
            address: String::deserialize(deserializer)?,
            finished_match: take_option(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for ServerStatusResponse {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.status_code.serialize(serializer);
        self.message.serialize(serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for ServerStatusResponse {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            status_code: StatusCode::deserialize(deserializer)?,
            message: String::deserialize(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for AssignMatchRequest {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.match_id.serialize(serializer);
        put_pair(&self.player_ids, serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for AssignMatchRequest {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            match_id: u64::deserialize(deserializer)?,
            player_ids: take_pair(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for AssignMatchResponse {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.message.serialize(serializer);
        self.match_id.serialize(serializer);
        put_pair(&self.player_ids, serializer);
        self.server_address.serialize(serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for AssignMatchResponse {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            message: String::deserialize(deserializer)?,
            match_id: u64::deserialize(deserializer)?,
            player_ids: take_pair(deserializer)?,
            server_address: String::deserialize(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for AdminStatusRequest {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.admin_id.serialize(serializer);
    }
}

impl Deserialize for AdminStatusRequest {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            admin_id: String::deserialize(deserializer)?,
        })
    }
}

impl Serialize for ServerState {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.id.serialize(serializer);
        self.status.serialize(serializer);
        self.address.serialize(serializer);
        put_option(&self.current_match_id, serializer);
        millis_since_epoch(self.last_update).serialize(serializer);
    }
}

impl Deserialize for ServerState {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            id: ServerId::deserialize(deserializer)?,
            status: ServerStatus::deserialize(deserializer)?,
            address: String::deserialize(deserializer)?,
            current_match_id: take_option(deserializer)?,
            last_update: UNIX_EPOCH + Duration::from_millis(u64::deserialize(deserializer)?),
        })
    }
}

impl Serialize for SystemStatus {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.servers.serialize(serializer);
        self.queue.serialize(serializer);
        self.clock.serialize(serializer);
    }
}

impl Deserialize for SystemStatus {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            servers: Vec::<ServerState>::deserialize(deserializer)?,
            queue: Vec::<QueueEntry>::deserialize(deserializer)?,
            clock: VectorClock::deserialize(deserializer)?,
        })
    }
}

impl Serialize for AdminServerUpdate {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.server_id.serialize(serializer);
        self.new_status.serialize(serializer);
    }
}

impl Deserialize for AdminServerUpdate {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            server_id: ServerId::deserialize(deserializer)?,
            new_status: ServerStatus::deserialize(deserializer)?,
        })
    }
}

impl Serialize for AdminUpdateResponse {
    fn serialize(&self, serializer: &mut ZSerializer) {
        self.status_code.serialize(serializer);
        self.message.serialize(serializer);
    }
}

impl Deserialize for AdminUpdateResponse {
    fn deserialize(deserializer: &mut ZDeserializer) -> Result<Self, ZDeserializeError> {
        Ok(Self {
            status_code: StatusCode::deserialize(deserializer)?,
            message: String::deserialize(deserializer)?,
        })
    }
}
