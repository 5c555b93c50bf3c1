// src/rcon/mod.rs
pub mod packet;
pub mod parse;
pub mod session;

use std::time::Duration;

use log::debug;

use crate::error::RconError;
use crate::models::server::ServerRecord;

pub const INFO_COMMAND: &str = "info";
pub const SHOW_PLAYERS_COMMAND: &str = "showplayers";

/// Builds a `ServerRecord` for one game server from its `info` and
/// `showplayers` output. Each command runs in its own session.
pub fn query_server(
    endpoint: &str,
    credential: &str,
    timeout: Duration,
) -> Result<ServerRecord, RconError> {
    let info = session::execute(endpoint, credential, INFO_COMMAND, timeout)?;
    let banner = parse::parse_banner(&info);

    let roster = session::execute(endpoint, credential, SHOW_PLAYERS_COMMAND, timeout)?;
    let players = parse::parse_player_list(&roster);

    debug!(
        "{}: '{}' {} with {} players",
        endpoint,
        banner.name,
        banner.version,
        players.count()
    );
    Ok(ServerRecord::new(banner.name, banner.version, players))
}
