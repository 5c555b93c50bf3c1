// src/rcon/parse.rs
//! Extractors for the free-form text the game server returns.
//!
//! The format is not documented and differs between server builds, so both
//! extractors degrade to empty values instead of failing.

use log::{debug, warn};

use crate::models::server::{Player, PlayerSet};

pub const BANNER_PREFIX: &str = "Welcome to Pal Server";
pub const PLAYER_HEADER: &str = "name,playeruid,steamid";

const PLAYER_FIELDS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Banner {
    pub name: String,
    pub version: String,
}

/// Pulls the version (the first `[...]` token) and the display name (what
/// follows it) out of the banner line of an `info` response.
pub fn parse_banner(output: &str) -> Banner {
    let Some(line) = banner_line(output) else {
        debug!("No banner line in info response");
        return Banner::default();
    };

    let Some(open) = line.find('[') else {
        warn!("Banner without version token: {:?}", line);
        return Banner::default();
    };
    let Some(close) = line[open + 1..].find(']').map(|i| open + 1 + i) else {
        warn!("Banner with unterminated version token: {:?}", line);
        return Banner::default();
    };

    Banner {
        version: clean(&line[open + 1..close]),
        name: clean(&line[close + 1..]),
    }
}

/// Collects every well-formed `name,playeruid,steamid` row. Rows with the
/// wrong number of fields are logged and skipped.
pub fn parse_player_list(output: &str) -> PlayerSet {
    let mut players = Vec::new();

    for (index, raw) in output.lines().enumerate() {
        let line = trim_line(raw);
        if line.is_empty() || is_header(line) {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != PLAYER_FIELDS {
            warn!(
                "Skipping player row {}: expected {} fields, got {}: {:?}",
                index,
                PLAYER_FIELDS,
                fields.len(),
                line
            );
            continue;
        }

        players.push(Player {
            name: fields[0].to_string(),
            player_id: fields[1].to_string(),
            steam_id: fields[2].to_string(),
        });
    }

    PlayerSet::from(players)
}

fn banner_line(output: &str) -> Option<&str> {
    let mut lines = output.lines().map(trim_line).filter(|l| !l.is_empty());
    let first = lines.clone().next();
    lines
        .find_map(|l| l.strip_prefix(BANNER_PREFIX))
        .or(first)
}

fn is_header(line: &str) -> bool {
    line.to_ascii_lowercase().starts_with(PLAYER_HEADER)
}

fn trim_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

fn clean(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_banner() {
        let banner = parse_banner("Welcome to Pal Server[v1.5.0] MyServer\n");
        assert_eq!(banner.version, "v1.5.0");
        assert_eq!(banner.name, "MyServer");
    }

    #[test]
    fn strips_nul_and_control_from_name() {
        let banner = parse_banner("Welcome to Pal Server[v0.1.5.1] Pal Land\u{0}\u{0}\u{7}\n");
        assert_eq!(banner.name, "Pal Land");
    }

    #[test]
    fn banner_without_brackets_is_empty() {
        assert_eq!(parse_banner("Welcome to Pal Server MyServer"), Banner::default());
        assert_eq!(parse_banner("Welcome to Pal Server[v1 MyServer"), Banner::default());
        assert_eq!(parse_banner(""), Banner::default());
    }

    #[test]
    fn banner_found_after_noise() {
        let banner = parse_banner("\n\0\nWelcome to Pal Server[v2] Other\n");
        assert_eq!(banner.version, "v2");
        assert_eq!(banner.name, "Other");
    }

    #[test]
    fn banner_falls_back_to_first_line() {
        let banner = parse_banner("Dedicated[build 42] Friends Only\nmore text");
        assert_eq!(banner.version, "build 42");
        assert_eq!(banner.name, "Friends Only");
    }

    #[test]
    fn parses_players() {
        let set = parse_player_list("name,playeruid,steamid\nAlice,111,222\nBob,333,444\n");
        assert_eq!(set.count(), 2);
        assert_eq!(
            set.list(),
            &[
                Player {
                    name: "Alice".into(),
                    player_id: "111".into(),
                    steam_id: "222".into()
                },
                Player {
                    name: "Bob".into(),
                    player_id: "333".into(),
                    steam_id: "444".into()
                },
            ]
        );
    }

    #[test]
    fn malformed_rows_do_not_abort() {
        let set = parse_player_list(
            "name,playeruid,steamid\r\nAlice,111,222\r\ngarbage\r\nA,b,c,d\r\n\r\n Bob , 333 , 444 \0\0",
        );
        assert_eq!(set.count(), 2);
        assert_eq!(set.list()[1].name, "Bob");
        assert_eq!(set.list()[1].steam_id, "444");
    }

    #[test]
    fn empty_input_is_empty_list() {
        let set = parse_player_list("");
        assert_eq!(set.count(), 0);
        assert!(set.list().is_empty());

        let set = parse_player_list("name,playeruid,steamid\n");
        assert!(set.is_empty());
    }

    #[test]
    fn count_matches_accepted_rows() {
        let mut text = String::from("name,playeruid,steamid\n");
        for i in 0..50 {
            if i % 3 == 0 {
                text.push_str("broken row\n");
            } else {
                text.push_str(&format!("p{},{},{}\n", i, i * 10, i * 100));
            }
        }
        let set = parse_player_list(&text);
        assert_eq!(set.count(), set.list().len());
        assert_eq!(set.count(), (0..50).filter(|i| i % 3 != 0).count());
    }
}
