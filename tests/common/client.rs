//! In-memory messaging platform built on the public client trait

use async_trait::async_trait;
use media_relay::client::{GroupItem, MessagingClient, ProgressSink, UploadPayload};
use media_relay::types::{ChatId, ChatRef, Media, Message, SendAs};
use media_relay::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Something that arrived in a destination chat
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// One file
    File {
        /// Destination chat
        chat: ChatId,
        /// Upload method
        send_as: SendAs,
        /// Bytes that were uploaded
        body: Vec<u8>,
        /// Caption carried over
        caption: Option<String>,
    },
    /// One grouped post
    Album {
        /// Destination chat
        chat: ChatId,
        /// Upload method and bytes of each member, in order
        members: Vec<(SendAs, Vec<u8>)>,
    },
    /// A text message
    Text {
        /// Destination chat
        chat: ChatId,
        /// Message body
        body: String,
    },
}

/// A source chat with fixed posts and a log of everything delivered
#[derive(Default)]
pub struct FakePlatform {
    posts: Mutex<BTreeMap<i64, (Message, Vec<u8>)>>,
    delivered: Mutex<Vec<Delivery>>,
    forbidden: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform where every chat lookup is refused
    pub fn forbidden() -> Self {
        Self {
            forbidden: true,
            ..Self::default()
        }
    }

    /// Publish a post whose media downloads as `body`
    pub fn post(&self, message: Message, body: &[u8]) {
        self.posts
            .lock()
            .unwrap()
            .insert(message.id, (message, body.to_vec()));
    }

    pub fn delivered(&self) -> Vec<Delivery> {
        self.delivered.lock().unwrap().clone()
    }

    fn check_access(&self) -> Result<()> {
        if self.forbidden {
            return Err(Error::Forbidden("CHANNEL_PRIVATE".into()));
        }
        Ok(())
    }
}

pub fn chat() -> ChatRef {
    ChatRef::Username("archive".into())
}

pub fn video_post(id: i64) -> Message {
    Message::new(chat(), id).with_media(Media::Video {
        file_name: Some(format!("{id}_Episode_Title.mp4")),
        file_size: Some(64),
    })
}

pub fn photo_post(id: i64) -> Message {
    Message::new(chat(), id).with_media(Media::Photo {
        file_size: Some(64),
    })
}

#[async_trait]
impl MessagingClient for FakePlatform {
    async fn resolve_message(&self, _chat: &ChatRef, message_id: i64) -> Result<Option<Message>> {
        self.check_access()?;
        Ok(self
            .posts
            .lock()
            .unwrap()
            .get(&message_id)
            .map(|(message, _)| message.clone()))
    }

    async fn resolve_message_group(&self, anchor: &Message) -> Result<Vec<Message>> {
        self.check_access()?;
        Ok(self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|(m, _)| m.media_group_id.is_some() && m.media_group_id == anchor.media_group_id)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn download(
        &self,
        message: &Message,
        destination: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf> {
        self.check_access()?;
        let body = self
            .posts
            .lock()
            .unwrap()
            .get(&message.id)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| Error::NotFound(format!("message {}", message.id)))?;
        tokio::fs::write(destination, &body).await?;
        progress.report(body.len() as u64, body.len() as u64);
        Ok(destination.to_path_buf())
    }

    async fn upload(
        &self,
        destination: ChatId,
        payload: &UploadPayload,
        progress: &ProgressSink,
    ) -> Result<()> {
        let body = tokio::fs::read(&payload.path).await?;
        progress.report(body.len() as u64, body.len() as u64);
        self.delivered.lock().unwrap().push(Delivery::File {
            chat: destination,
            send_as: payload.send_as,
            body,
            caption: payload.caption.clone(),
        });
        Ok(())
    }

    async fn upload_group(
        &self,
        destination: ChatId,
        items: &[GroupItem],
        progress: &ProgressSink,
    ) -> Result<()> {
        let mut members = Vec::with_capacity(items.len());
        for (sent, item) in items.iter().enumerate() {
            members.push((item.send_as, tokio::fs::read(&item.path).await?));
            progress.report(sent as u64 + 1, items.len() as u64);
        }
        self.delivered.lock().unwrap().push(Delivery::Album {
            chat: destination,
            members,
        });
        Ok(())
    }

    async fn send_text(&self, destination: ChatId, text: &str) -> Result<()> {
        self.delivered.lock().unwrap().push(Delivery::Text {
            chat: destination,
            body: text.to_string(),
        });
        Ok(())
    }

    async fn is_member_of_chat(&self, _chat: &ChatRef) -> Result<bool> {
        Ok(!self.forbidden)
    }

    async fn is_premium(&self) -> Result<bool> {
        Ok(false)
    }
}
