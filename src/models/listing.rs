// src/models/listing.rs
use serde::{Deserialize, Serialize};

/// One entry of the upstream community server listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListedServer {
    pub server_id: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub region: String,
    pub name: String,
    pub map_name: String,
    pub description: String,
    pub address: String,
    pub port: i64,
    pub is_password: bool,
    pub version: String,
    pub created_at: i64,
    pub update_at: i64,
    pub world_guid: String,
    pub current_players: i64,
    pub max_players: i64,
    pub days: i64,
    pub server_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerListPage {
    pub current_page: u32,
    pub page_size: u32,
    pub sort_type: String,
    pub server_type: String,
    pub region: String,
    pub is_next_page: bool,
    pub server_list: Vec<ListedServer>,
}
