// spl_gateway/src/proxy_server/shadow.rs

//! Vehicle shadow: the gateway's local copy of the vehicle's state.
//!
//! Ground stations ask for parameters and missions far more often than the
//! satellite link can carry. The shadow keeps the last known values so the shadow
//! server can answer those queries locally:
//!
//! - desired state written by clients of the shadow server (`PARAM_SET`, mission
//!   uploads, `MISSION_CLEAR_ALL`, `SET_HOME_POSITION`, `SET_MODE`);
//! - reported state relayed from the vehicle over the downlink (`PARAM_VALUE`,
//!   `HEARTBEAT`, `HOME_POSITION`).
//!
//! Mission uploads are staged per session in [`MissionStaging`] and replace the
//! stored mission only once complete, so concurrent uploads never mix.
//!
//! The state can be persisted as a [`ShadowSnapshot`] JSON file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use gateway_models::shadow_models::{decode_param_id, encode_param_id};
use gateway_models::{ShadowHome, ShadowParam, ShadowSnapshot};
use log::{debug, info, warn};
use mav_channel_utils::{ChannelError, MavChannel, MavPacket};
use mavlink::common::{
    MavFrame, MavMessage, MavMissionType, MavParamType, MavType, MISSION_COUNT_DATA,
    MISSION_ITEM_DATA, MISSION_ITEM_INT_DATA, PARAM_VALUE_DATA,
};
use tokio::sync::RwLock;

use crate::error::GatewayError;

/// A mission upload in progress. Items are committed only once all have arrived.
#[derive(Debug)]
struct StagedMission {
    expected: u16,
    items: Vec<MISSION_ITEM_INT_DATA>,
}

/// One client's mission upload in progress.
#[derive(Debug, Default)]
pub struct MissionStaging {
    staged: Option<StagedMission>,
}

impl MissionStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a count has been received and items are still missing.
    pub fn in_progress(&self) -> bool {
        self.staged.is_some()
    }

    /// Feeds one client write into the upload.
    ///
    /// # Returns
    /// The complete mission once its last item has arrived (empty for a count of 0),
    /// `None` otherwise.
    pub fn stage(&mut self, packet: &MavPacket) -> Option<Vec<MISSION_ITEM_INT_DATA>> {
        match &packet.message {
            MavMessage::MISSION_COUNT(data) if data.count == 0 => {
                self.staged = None;
                Some(Vec::new())
            }
            MavMessage::MISSION_COUNT(data) => {
                self.staged = Some(StagedMission {
                    expected: data.count,
                    items: Vec::with_capacity(usize::from(data.count)),
                });
                None
            }
            MavMessage::MISSION_ITEM(data) => self.stage_item(item_to_int(data)),
            MavMessage::MISSION_ITEM_INT(data) => self.stage_item(data.clone()),
            MavMessage::MISSION_CLEAR_ALL(_) => {
                self.staged = None;
                None
            }
            _ => None,
        }
    }

    fn stage_item(&mut self, item: MISSION_ITEM_INT_DATA) -> Option<Vec<MISSION_ITEM_INT_DATA>> {
        let staged = match self.staged.as_mut() {
            Some(staged) => staged,
            None => {
                debug!("[Shadow] Mission item {} without a count, ignored", item.seq);
                return None;
            }
        };
        if usize::from(item.seq) != staged.items.len() {
            debug!(
                "[Shadow] Mission item {} out of order (expected {}), ignored",
                item.seq,
                staged.items.len()
            );
            return None;
        }
        staged.items.push(item);
        if staged.items.len() < usize::from(staged.expected) {
            return None;
        }
        self.staged.take().map(|staged| staged.items)
    }
}

#[derive(Debug, Default)]
struct ShadowState {
    snapshot: ShadowSnapshot,
}

impl ShadowState {
    fn touch(&mut self) {
        self.snapshot.updated_at = Some(Utc::now());
    }

    fn upsert_param(&mut self, param_id: String, param_value: f32, param_type: MavParamType) {
        match self
            .snapshot
            .params
            .iter_mut()
            .find(|p| p.param_id == param_id)
        {
            Some(existing) => {
                existing.param_value = param_value;
                existing.param_type = param_type;
            }
            None => self.snapshot.params.push(ShadowParam {
                param_id,
                param_value,
                param_type,
            }),
        }
    }
}

/// Last-known vehicle state, shared by the shadow server's sessions and the
/// downlink relay.
#[derive(Debug, Default)]
pub struct VehicleShadow {
    state: RwLock<ShadowState>,
    snapshot_path: Option<PathBuf>,
}

impl VehicleShadow {
    /// An empty, memory-only shadow.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ShadowSnapshot) -> Self {
        Self {
            state: RwLock::new(ShadowState { snapshot }),
            snapshot_path: None,
        }
    }

    /// Loads the snapshot at `path`, which is also where [`VehicleShadow::save`] writes.
    ///
    /// A missing file yields an empty shadow. An unreadable or corrupt file is an error.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let snapshot = match std::fs::read_to_string(path) {
            Ok(content) => ShadowSnapshot::from_json(&content).map_err(|e| {
                GatewayError::Shadow(format!("corrupt snapshot {:?}: {}", path, e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[Shadow] No snapshot at {:?}, starting empty", path);
                ShadowSnapshot::default()
            }
            Err(e) => {
                return Err(GatewayError::Shadow(format!(
                    "cannot read snapshot {:?}: {}",
                    path, e
                )))
            }
        };
        info!(
            "[Shadow] Loaded {} parameters and {} mission items from {:?}",
            snapshot.params.len(),
            snapshot.mission.len(),
            path
        );
        let mut shadow = Self::from_snapshot(snapshot);
        shadow.snapshot_path = Some(path.to_path_buf());
        Ok(shadow)
    }

    /// Writes the snapshot file. Memory-only shadows do nothing.
    pub async fn save(&self) -> Result<(), GatewayError> {
        let path = match &self.snapshot_path {
            Some(path) => path,
            None => return Ok(()),
        };
        let json = self
            .snapshot()
            .await
            .to_json()
            .map_err(|e| GatewayError::Shadow(format!("cannot serialize snapshot: {}", e)))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, json).await?;
        info!("[Shadow] Saved snapshot to {:?}", path);
        Ok(())
    }

    pub async fn snapshot(&self) -> ShadowSnapshot {
        self.state.read().await.snapshot.clone()
    }

    /// Replaces the stored mission with a completed upload.
    pub async fn commit_mission(&self, items: Vec<MISSION_ITEM_INT_DATA>) {
        let mut state = self.state.write().await;
        info!("[Shadow] Committed mission with {} items", items.len());
        state.snapshot.mission = items;
        state.touch();
    }

    /// Applies a client write other than a mission upload (see [`MissionStaging`]).
    /// Returns true when the stored state changed.
    pub async fn apply_desired(&self, packet: &MavPacket) -> bool {
        let mut state = self.state.write().await;
        let changed = match &packet.message {
            MavMessage::PARAM_SET(data) => {
                state.upsert_param(decode_param_id(&data.param_id), data.param_value, data.param_type);
                true
            }
            MavMessage::MISSION_CLEAR_ALL(_) => {
                state.snapshot.mission.clear();
                true
            }
            MavMessage::SET_HOME_POSITION(data) => {
                state.snapshot.home = Some(ShadowHome {
                    latitude: data.latitude,
                    longitude: data.longitude,
                    altitude: data.altitude,
                });
                true
            }
            MavMessage::SET_MODE(data) => {
                state.snapshot.custom_mode = Some(data.custom_mode);
                true
            }
            _ => false,
        };
        if changed {
            state.touch();
            debug!("[Shadow] Applied {}", packet.name());
        }
        changed
    }

    /// Records vehicle-reported state from the downlink. Returns true when it changed.
    pub async fn record_reported(&self, packet: &MavPacket) -> bool {
        let mut state = self.state.write().await;
        let changed = match &packet.message {
            MavMessage::PARAM_VALUE(data) => {
                state.upsert_param(decode_param_id(&data.param_id), data.param_value, data.param_type);
                true
            }
            MavMessage::HEARTBEAT(data) if data.mavtype != MavType::MAV_TYPE_GCS => {
                if state.snapshot.custom_mode == Some(data.custom_mode) {
                    false
                } else {
                    state.snapshot.custom_mode = Some(data.custom_mode);
                    true
                }
            }
            MavMessage::HOME_POSITION(data) => {
                state.snapshot.home = Some(ShadowHome {
                    latitude: data.latitude,
                    longitude: data.longitude,
                    altitude: data.altitude,
                });
                true
            }
            _ => false,
        };
        if changed {
            state.touch();
        }
        changed
    }

    /// Answers a read query from the stored state.
    ///
    /// Replies appear to come from the query's target and are addressed to its
    /// sender. Returns `None` for packets that are not queries; a query for
    /// something the shadow does not hold yields an empty reply list.
    pub async fn answer_query(&self, packet: &MavPacket) -> Option<Vec<MavPacket>> {
        let state = self.state.read().await;
        let snapshot = &state.snapshot;
        let (sysid, compid) = (packet.sysid(), packet.compid());

        let (target_system, target_component, replies) = match &packet.message {
            MavMessage::PARAM_REQUEST_LIST(data) => {
                let replies: Vec<MavMessage> = snapshot
                    .params
                    .iter()
                    .enumerate()
                    .map(|(index, param)| param_value(param, index, snapshot.params.len()))
                    .collect();
                (data.target_system, data.target_component, replies)
            }
            MavMessage::PARAM_REQUEST_READ(data) => {
                let found = if data.param_index >= 0 {
                    let index = data.param_index as usize;
                    snapshot.params.get(index).map(|p| (index, p))
                } else {
                    let wanted = decode_param_id(&data.param_id);
                    snapshot
                        .params
                        .iter()
                        .enumerate()
                        .find(|(_, p)| p.param_id == wanted)
                };
                let replies: Vec<MavMessage> = found
                    .map(|(index, param)| param_value(param, index, snapshot.params.len()))
                    .into_iter()
                    .collect();
                (data.target_system, data.target_component, replies)
            }
            MavMessage::MISSION_REQUEST_LIST(data) => {
                let count = MISSION_COUNT_DATA {
                    count: u16::try_from(snapshot.mission.len()).unwrap_or(u16::MAX),
                    target_system: sysid,
                    target_component: compid,
                    mission_type: data.mission_type,
                    ..Default::default()
                };
                (
                    data.target_system,
                    data.target_component,
                    vec![MavMessage::MISSION_COUNT(count)],
                )
            }
            MavMessage::MISSION_REQUEST(data) => (
                data.target_system,
                data.target_component,
                mission_item(snapshot, data.seq, sysid, compid, data.mission_type),
            ),
            MavMessage::MISSION_REQUEST_INT(data) => (
                data.target_system,
                data.target_component,
                mission_item(snapshot, data.seq, sysid, compid, data.mission_type),
            ),
            _ => return None,
        };

        debug!(
            "[Shadow] Answering {} with {} packets",
            packet.name(),
            replies.len()
        );
        Some(
            replies
                .into_iter()
                .map(|message| {
                    MavPacket::from_ids(target_system, target_component, message)
                        .with_version(packet.version)
                })
                .collect(),
        )
    }
}

fn param_value(param: &ShadowParam, index: usize, count: usize) -> MavMessage {
    MavMessage::PARAM_VALUE(PARAM_VALUE_DATA {
        param_value: param.param_value,
        param_count: u16::try_from(count).unwrap_or(u16::MAX),
        param_index: u16::try_from(index).unwrap_or(u16::MAX),
        param_id: encode_param_id(&param.param_id),
        param_type: param.param_type,
    })
}

fn mission_item(
    snapshot: &ShadowSnapshot,
    seq: u16,
    sysid: u8,
    compid: u8,
    mission_type: MavMissionType,
) -> Vec<MavMessage> {
    snapshot
        .mission
        .get(usize::from(seq))
        .map(|item| {
            MavMessage::MISSION_ITEM_INT(MISSION_ITEM_INT_DATA {
                target_system: sysid,
                target_component: compid,
                mission_type,
                ..item.clone()
            })
        })
        .into_iter()
        .collect()
}

/// Converts a float-coordinate item. Global frames carry degrees (scaled by 1e7),
/// local frames metres (scaled by 1e4).
fn item_to_int(item: &MISSION_ITEM_DATA) -> MISSION_ITEM_INT_DATA {
    let scale = match item.frame {
        MavFrame::MAV_FRAME_GLOBAL
        | MavFrame::MAV_FRAME_GLOBAL_INT
        | MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT
        | MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT
        | MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT
        | MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT_INT => 1e7_f64,
        _ => 1e4_f64,
    };
    MISSION_ITEM_INT_DATA {
        param1: item.param1,
        param2: item.param2,
        param3: item.param3,
        param4: item.param4,
        x: (f64::from(item.x) * scale).round() as i32,
        y: (f64::from(item.y) * scale).round() as i32,
        z: item.z,
        seq: item.seq,
        command: item.command,
        target_system: item.target_system,
        target_component: item.target_component,
        frame: item.frame,
        current: item.current,
        autocontinue: item.autocontinue,
        mission_type: item.mission_type,
        ..Default::default()
    }
}

/// `MavChannel` sink that applies everything sent to it as desired state.
///
/// Used as the destination of shadow sessions' handlers in place of the satellite
/// uplink. Each session gets its own channel, and with it its own mission staging.
pub struct ShadowChannel {
    shadow: Arc<VehicleShadow>,
    staging: Mutex<MissionStaging>,
}

impl ShadowChannel {
    pub fn new(shadow: Arc<VehicleShadow>) -> Self {
        Self {
            shadow,
            staging: Mutex::new(MissionStaging::new()),
        }
    }
}

#[async_trait]
impl MavChannel for ShadowChannel {
    async fn receive_message(&self) -> Result<Option<MavPacket>, ChannelError> {
        Ok(None)
    }

    async fn send_message(&self, packet: MavPacket) -> Result<(), ChannelError> {
        let completed = self
            .staging
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .stage(&packet);
        if let Some(items) = completed {
            self.shadow.commit_mission(items).await;
            return Ok(());
        }
        if !self.shadow.apply_desired(&packet).await {
            debug!("[Shadow] {} left the state unchanged", packet.name());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "shadow".to_string()
    }
}

/// Saves the shadow, logging instead of failing. Used on shutdown.
pub async fn save_quietly(shadow: &VehicleShadow) {
    if let Err(e) = shadow.save().await {
        warn!("[Shadow] Failed to save snapshot: {}", e);
    }
}
