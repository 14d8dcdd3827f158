//! Forward attribution and message links.

use crate::types::{Chat, MessageOrigin, Post, User};

/// One way a post can say where it was forwarded from.
///
/// Telegram has used several representations over time; [`forward_sources`]
/// lists them in the order they are trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForwardSource<'a> {
    Channel { chat: &'a Chat, message_id: i64 },
    Chat(&'a Chat),
    User(&'a User),
    HiddenUser(&'a str),
    LegacyChat { chat: &'a Chat, message_id: Option<i64> },
    LegacyUser(&'a User),
    LegacySenderName(&'a str),
}

impl ForwardSource<'_> {
    pub fn label(&self) -> Option<String> {
        match self {
            ForwardSource::Channel { chat, .. }
            | ForwardSource::Chat(chat)
            | ForwardSource::LegacyChat { chat, .. } => chat_label(chat),
            ForwardSource::User(user) | ForwardSource::LegacyUser(user) => user_label(user),
            ForwardSource::HiddenUser(name) | ForwardSource::LegacySenderName(name) => {
                non_empty(name.trim())
            }
        }
    }

    pub fn link(&self) -> Option<String> {
        match self {
            ForwardSource::Channel { chat, message_id } => message_link(chat, *message_id),
            ForwardSource::LegacyChat {
                chat,
                message_id: Some(message_id),
            } => message_link(chat, *message_id),
            _ => None,
        }
    }
}

pub fn forward_sources(post: &Post) -> Vec<ForwardSource<'_>> {
    let mut sources = Vec::new();
    match &post.forward_origin {
        Some(MessageOrigin::Channel {
            chat, message_id, ..
        }) => sources.push(ForwardSource::Channel {
            chat,
            message_id: *message_id,
        }),
        Some(MessageOrigin::Chat { sender_chat, .. }) => {
            sources.push(ForwardSource::Chat(sender_chat))
        }
        Some(MessageOrigin::User { sender_user }) => sources.push(ForwardSource::User(sender_user)),
        Some(MessageOrigin::HiddenUser { sender_user_name }) => {
            sources.push(ForwardSource::HiddenUser(sender_user_name))
        }
        Some(MessageOrigin::Unknown) | None => {}
    }
    if let Some(chat) = &post.forward_from_chat {
        sources.push(ForwardSource::LegacyChat {
            chat,
            message_id: post.forward_from_message_id,
        });
    }
    if let Some(user) = &post.forward_from {
        sources.push(ForwardSource::LegacyUser(user));
    }
    if let Some(name) = &post.forward_sender_name {
        sources.push(ForwardSource::LegacySenderName(name));
    }
    sources
}

/// `"Forwarded from <label>"`, plus a link line when the origin message is addressable.
pub fn forwarded_label(post: &Post) -> Option<String> {
    forward_sources(post).into_iter().find_map(|source| {
        let label = source.label()?;
        Some(match source.link() {
            Some(link) => format!("Forwarded from {label}\n{link}"),
            None => format!("Forwarded from {label}"),
        })
    })
}

pub fn chat_label(chat: &Chat) -> Option<String> {
    chat.title
        .as_deref()
        .and_then(|title| non_empty(title.trim()))
        .or_else(|| handle(chat.username.as_deref()))
}

pub fn user_label(user: &User) -> Option<String> {
    let full_name = format!(
        "{} {}",
        user.first_name.as_deref().unwrap_or_default(),
        user.last_name.as_deref().unwrap_or_default()
    );
    non_empty(full_name.trim()).or_else(|| handle(user.username.as_deref()))
}

/// Public link to a message, when one can be derived.
///
/// Public chats link through their handle. Otherwise the numeric id is used
/// with the `-100` channel prefix (or a plain minus sign) removed; positive
/// ids belong to private chats and get no link.
pub fn message_link(chat: &Chat, message_id: i64) -> Option<String> {
    if message_id <= 0 {
        return None;
    }
    if let Some(username) = chat.username.as_deref().filter(|u| !u.trim().is_empty()) {
        return Some(format!("https://t.me/{}/{}", username.trim(), message_id));
    }
    let id = chat.id.to_string();
    let stripped = id
        .strip_prefix("-100")
        .or_else(|| id.strip_prefix('-'))?;
    if stripped.is_empty() {
        return None;
    }
    Some(format!("https://t.me/c/{stripped}/{message_id}"))
}

/// Renders a poll as question, numbered options and a link to the post.
pub fn poll_content(post: &Post) -> Option<String> {
    let poll = post.poll.as_ref()?;
    let question = poll.question.as_deref().filter(|q| !q.is_empty());
    if question.is_none() && poll.options.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(3);
    if let Some(question) = question {
        parts.push(format!("Poll: {question}"));
    }
    if !poll.options.is_empty() {
        let lines: Vec<String> = poll
            .options
            .iter()
            .enumerate()
            .map(|(index, option)| format!("{}. {}", index + 1, option.text))
            .collect();
        parts.push(lines.join("\n"));
    }
    if let Some(link) = post
        .chat
        .as_ref()
        .or(post.sender_chat.as_ref())
        .and_then(|chat| message_link(chat, post.message_id))
    {
        parts.push(link);
    }
    Some(parts.join("\n\n"))
}

fn handle(username: Option<&str>) -> Option<String> {
    username
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| format!("@{u}"))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Poll, PollOption};

    fn chat(id: i64, title: Option<&str>, username: Option<&str>) -> Chat {
        Chat {
            id,
            title: title.map(str::to_string),
            username: username.map(str::to_string),
            ..Default::default()
        }
    }

    fn user(first: Option<&str>, last: Option<&str>, username: Option<&str>) -> User {
        User {
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            username: username.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_message_link_forms() {
        assert_eq!(
            message_link(&chat(-1001234, None, Some("news")), 5).as_deref(),
            Some("https://t.me/news/5")
        );
        assert_eq!(
            message_link(&chat(-1001234, None, None), 5).as_deref(),
            Some("https://t.me/c/1234/5")
        );
        assert_eq!(
            message_link(&chat(-4567, None, None), 9).as_deref(),
            Some("https://t.me/c/4567/9")
        );
        assert_eq!(message_link(&chat(4567, None, None), 9), None);
        assert_eq!(message_link(&chat(-100, None, None), 9), None);
        assert_eq!(message_link(&chat(-1001234, None, None), 0), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(chat_label(&chat(1, Some("News"), Some("news"))).as_deref(), Some("News"));
        assert_eq!(chat_label(&chat(1, Some("  "), Some("news"))).as_deref(), Some("@news"));
        assert_eq!(chat_label(&chat(1, None, None)), None);

        assert_eq!(
            user_label(&user(Some("Ada"), Some("Lovelace"), Some("ada"))).as_deref(),
            Some("Ada Lovelace")
        );
        assert_eq!(user_label(&user(Some("Ada"), None, None)).as_deref(), Some("Ada"));
        assert_eq!(user_label(&user(None, None, Some("ada"))).as_deref(), Some("@ada"));
    }

    #[test]
    fn test_forwarded_from_channel_origin() {
        let post = Post {
            forward_origin: Some(MessageOrigin::Channel {
                chat: chat(-1009876, Some("Source"), None),
                message_id: 42,
                author_signature: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            forwarded_label(&post).as_deref(),
            Some("Forwarded from Source\nhttps://t.me/c/9876/42")
        );
    }

    #[test]
    fn test_origin_wins_over_legacy_fields() {
        let post = Post {
            forward_origin: Some(MessageOrigin::HiddenUser {
                sender_user_name: "  Anonymous  ".to_string(),
            }),
            forward_sender_name: Some("Legacy".to_string()),
            ..Default::default()
        };
        assert_eq!(forwarded_label(&post).as_deref(), Some("Forwarded from Anonymous"));
    }

    #[test]
    fn test_falls_through_to_first_non_empty_label() {
        let post = Post {
            forward_origin: Some(MessageOrigin::User {
                sender_user: user(None, None, None),
            }),
            forward_from_chat: Some(chat(-1001, None, Some("legacy"))),
            forward_from_message_id: Some(3),
            forward_sender_name: Some("Name".to_string()),
            ..Default::default()
        };
        assert_eq!(
            forwarded_label(&post).as_deref(),
            Some("Forwarded from @legacy\nhttps://t.me/legacy/3")
        );
    }

    #[test]
    fn test_forwarded_from_chat_origin_has_no_link() {
        let post = Post {
            forward_origin: Some(MessageOrigin::Chat {
                sender_chat: chat(-1007777, Some("Group"), Some("group")),
                author_signature: None,
            }),
            forward_from_message_id: Some(8),
            ..Default::default()
        };
        assert_eq!(forwarded_label(&post).as_deref(), Some("Forwarded from Group"));
    }

    #[test]
    fn test_forwarded_from_user_origin() {
        let post = Post {
            forward_origin: Some(MessageOrigin::User {
                sender_user: user(Some("Ada"), Some("Lovelace"), None),
            }),
            forward_sender_name: Some("Legacy".to_string()),
            ..Default::default()
        };
        assert_eq!(forwarded_label(&post).as_deref(), Some("Forwarded from Ada Lovelace"));
    }

    #[test]
    fn test_legacy_forward_from_user() {
        let post = Post {
            forward_from_chat: Some(chat(-1001, Some("  "), None)),
            forward_from: Some(user(None, None, Some("ada"))),
            forward_sender_name: Some("Name".to_string()),
            ..Default::default()
        };
        assert_eq!(forwarded_label(&post).as_deref(), Some("Forwarded from @ada"));
    }

    #[test]
    fn test_legacy_sender_name_is_last_resort() {
        let post = Post {
            forward_origin: Some(MessageOrigin::Unknown),
            forward_from: Some(user(None, None, None)),
            forward_sender_name: Some(" Hidden Author ".to_string()),
            ..Default::default()
        };
        assert_eq!(forwarded_label(&post).as_deref(), Some("Forwarded from Hidden Author"));
    }

    #[test]
    fn test_forward_origin_from_json() {
        let post: Post = serde_json::from_str(
            r#"{
                "message_id": 1,
                "forward_origin": {
                    "type": "chat",
                    "date": 1,
                    "sender_chat": {"id": -1002222, "title": "Group", "type": "supergroup"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(forwarded_label(&post).as_deref(), Some("Forwarded from Group"));
    }

    #[test]
    fn test_not_forwarded() {
        let post = Post {
            forward_origin: Some(MessageOrigin::Unknown),
            ..Default::default()
        };
        assert_eq!(forwarded_label(&post), None);
    }

    #[test]
    fn test_poll_content() {
        let post = Post {
            message_id: 11,
            chat: Some(chat(-1005555, Some("Polls"), None)),
            poll: Some(Poll {
                question: Some("Tea or coffee?".to_string()),
                options: vec![
                    PollOption { text: "Tea".to_string() },
                    PollOption { text: "Coffee".to_string() },
                ],
            }),
            ..Default::default()
        };
        assert_eq!(
            poll_content(&post).as_deref(),
            Some("Poll: Tea or coffee?\n\n1. Tea\n2. Coffee\n\nhttps://t.me/c/5555/11")
        );
    }

    #[test]
    fn test_poll_without_question_or_options_is_omitted() {
        let post = Post {
            message_id: 11,
            chat: Some(chat(-1005555, None, Some("polls"))),
            poll: Some(Poll::default()),
            ..Default::default()
        };
        assert_eq!(poll_content(&post), None);
    }
}
