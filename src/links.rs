//! Post link parsing
//!
//! Accepted shapes (query strings are ignored):
//!
//! - `https://t.me/<username>/<message>`
//! - `https://t.me/<username>/<thread>/<message>`
//! - `https://t.me/c/<channel>/<message>`
//! - `https://t.me/c/<channel>/<thread>/<message>`
//!
//! `telegram.me` is accepted in place of `t.me`; any other host is rejected.
//! Private channel ids are turned into the `-100` prefixed chat id form, and
//! usernames are lowercased since the platform matches them case-insensitively.

use crate::error::{Error, Result};
use crate::types::{ChatRef, PostLink};
use url::Url;

const NOT_NUMERIC: &str = "Invalid post URL. Must end with a numeric ID.";
const NOT_A_POST: &str = "Please send a valid Telegram post URL.";

/// Hosts that serve post links
const POST_HOSTS: [&str; 4] = ["t.me", "www.t.me", "telegram.me", "www.telegram.me"];

/// Offset between a bare channel id and its chat id
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Chat id of a private channel from the bare id used in `/c/` links
pub fn channel_chat_id(channel: i64) -> Option<i64> {
    CHANNEL_ID_OFFSET.checked_add(channel).map(|id| -id)
}

/// Parse a post link into its chat, message and thread ids
pub fn parse_post_link(link: &str) -> Result<PostLink> {
    let link = link.trim();
    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{link}"))
            .map_err(|_| Error::InvalidLink(NOT_A_POST.to_string()))?,
        Err(_) => return Err(Error::InvalidLink(NOT_A_POST.to_string())),
    };
    if !url
        .host_str()
        .is_some_and(|host| POST_HOSTS.contains(&host))
    {
        return Err(Error::InvalidLink(NOT_A_POST.to_string()));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let link = match segments.as_slice() {
        ["c", channel, thread, message] => PostLink {
            chat: ChatRef::Id(channel_id(channel)?),
            thread_id: Some(numeric(thread)?),
            message_id: numeric(message)?,
        },
        ["c", channel, message] => PostLink {
            chat: ChatRef::Id(channel_id(channel)?),
            thread_id: None,
            message_id: numeric(message)?,
        },
        ["m", _] => return Err(Error::InvalidLink(NOT_NUMERIC.to_string())),
        [username, thread, message] => PostLink {
            chat: ChatRef::Username(username.to_ascii_lowercase()),
            thread_id: Some(numeric(thread)?),
            message_id: numeric(message)?,
        },
        [username, message] => PostLink {
            chat: ChatRef::Username(username.to_ascii_lowercase()),
            thread_id: None,
            message_id: numeric(message)?,
        },
        _ => return Err(Error::InvalidLink(NOT_A_POST.to_string())),
    };

    if link.message_id == 0 {
        return Err(Error::InvalidLink(NOT_A_POST.to_string()));
    }
    Ok(link)
}

impl std::str::FromStr for PostLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_post_link(s)
    }
}

fn numeric(segment: &str) -> Result<i64> {
    segment
        .parse()
        .map_err(|_| Error::InvalidLink(NOT_NUMERIC.to_string()))
}

fn channel_id(segment: &str) -> Result<i64> {
    channel_chat_id(numeric(segment)?).ok_or_else(|| Error::InvalidLink(NOT_NUMERIC.to_string()))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn reason(link: &str) -> String {
        match parse_post_link(link) {
            Err(Error::InvalidLink(reason)) => reason,
            other => panic!("expected invalid link for {link}, got {other:?}"),
        }
    }

    #[test]
    fn public_post() {
        let link = parse_post_link("https://t.me/somechannel/1234").unwrap();
        assert_eq!(link.chat, ChatRef::Username("somechannel".into()));
        assert_eq!(link.message_id, 1234);
        assert_eq!(link.thread_id, None);
    }

    #[test]
    fn public_post_in_thread() {
        let link = parse_post_link("https://t.me/somegroup/55/1234").unwrap();
        assert_eq!(link.chat, ChatRef::Username("somegroup".into()));
        assert_eq!(link.thread_id, Some(55));
        assert_eq!(link.message_id, 1234);
    }

    #[test]
    fn private_channel_post_gets_prefixed_chat_id() {
        let link = parse_post_link("https://t.me/c/1234567890/42").unwrap();
        assert_eq!(link.chat, ChatRef::Id(-1001234567890));
        assert_eq!(link.message_id, 42);
    }

    #[test]
    fn private_channel_post_in_thread() {
        let link = parse_post_link("https://t.me/c/1234567890/7/42").unwrap();
        assert_eq!(link.chat, ChatRef::Id(-1001234567890));
        assert_eq!(link.thread_id, Some(7));
        assert_eq!(link.message_id, 42);
    }

    #[test]
    fn query_string_is_ignored() {
        let link = parse_post_link("https://t.me/somechannel/99?single&comment=3").unwrap();
        assert_eq!(link.message_id, 99);
    }

    #[test]
    fn scheme_is_optional() {
        let link = parse_post_link("t.me/somechannel/10").unwrap();
        assert_eq!(link.message_id, 10);
    }

    #[test]
    fn non_numeric_message_id_is_rejected() {
        assert_eq!(reason("https://t.me/somechannel/abc"), NOT_NUMERIC);
        assert_eq!(reason("https://t.me/c/notanumber/5"), NOT_NUMERIC);
    }

    #[test]
    fn m_client_links_are_rejected() {
        assert_eq!(reason("https://t.me/m/12"), NOT_NUMERIC);
    }

    #[test]
    fn links_without_a_post_are_rejected() {
        assert_eq!(reason("https://t.me/somechannel"), NOT_A_POST);
        assert_eq!(reason("https://t.me/"), NOT_A_POST);
        assert_eq!(reason("https://t.me/a/b/c/d/e"), NOT_A_POST);
        assert_eq!(reason("https://t.me/somechannel/0"), NOT_A_POST);
    }

    #[test]
    fn foreign_hosts_are_rejected() {
        assert_eq!(reason("https://example.com/somechannel/12"), NOT_A_POST);
        assert_eq!(reason("example.com/somechannel/12"), NOT_A_POST);
        assert_eq!(reason("https://t.me.example.com/somechannel/12"), NOT_A_POST);
    }

    #[test]
    fn telegram_me_host_is_accepted() {
        let link = parse_post_link("https://telegram.me/somechannel/12").unwrap();
        assert_eq!(link.chat, ChatRef::Username("somechannel".into()));
        assert_eq!(link.message_id, 12);
        assert!(parse_post_link("https://www.t.me/somechannel/12").is_ok());
    }

    #[test]
    fn usernames_are_case_insensitive() {
        let upper = parse_post_link("https://t.me/SomeChannel/1").unwrap();
        let lower = parse_post_link("https://t.me/somechannel/9").unwrap();
        assert_eq!(upper.chat, lower.chat);
        assert_eq!(upper.chat, ChatRef::Username("somechannel".into()));
    }

    #[test]
    fn from_str_delegates_to_parser() {
        let link: PostLink = "https://t.me/x/5".parse().unwrap();
        assert_eq!(link.message_id, 5);
    }

    #[test]
    fn channel_chat_id_matches_prefixed_form() {
        assert_eq!(channel_chat_id(1234), Some(-1_000_000_001_234));
        assert_eq!(channel_chat_id(i64::MAX), None);
    }
}
