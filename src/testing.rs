// ====================================================================================
// src/testing.rs - 测试用的内存聊天平台
// ====================================================================================
use crate::{
    models::{ChannelId, MessageId, PanelPayload, RemoteMessage, RemoteUser, UserId},
    platform::{ChatPlatform, PlatformError},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

pub const OWN_USER: UserId = UserId(1);
pub const OTHER_USER: UserId = UserId(2);

struct StoredMessage {
    author: UserId,
    payload: Option<PanelPayload>,
}

struct FakeState {
    messages: BTreeMap<MessageId, StoredMessage>,
    next_id: u64,
    channel_missing: bool,
    history_denied: bool,
    write_failures: VecDeque<PlatformError>,
    sends: usize,
    edits: usize,
    fetch_message_calls: usize,
    write_attempts: Vec<Instant>,
}

pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                messages: BTreeMap::new(),
                next_id: 100,
                channel_missing: false,
                history_denied: false,
                write_failures: VecDeque::new(),
                sends: 0,
                edits: 0,
                fetch_message_calls: 0,
                write_attempts: Vec::new(),
            }),
        }
    }

    fn insert(&self, author: UserId) -> MessageId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = MessageId(state.next_id);
        state.messages.insert(id, StoredMessage { author, payload: None });
        id
    }

    pub fn add_own_message(&self) -> MessageId {
        self.insert(OWN_USER)
    }

    pub fn add_foreign_message(&self) -> MessageId {
        self.insert(OTHER_USER)
    }

    pub fn delete(&self, id: MessageId) {
        self.state.lock().unwrap().messages.remove(&id);
    }

    pub fn remove_channel(&self) {
        self.state.lock().unwrap().channel_missing = true;
    }

    pub fn deny_history(&self) {
        self.state.lock().unwrap().history_denied = true;
    }

    // 接下来的写入（发送或编辑）依次以这些错误失败
    pub fn fail_writes(&self, errors: impl IntoIterator<Item = PlatformError>) {
        self.state.lock().unwrap().write_failures.extend(errors);
    }

    pub fn sends(&self) -> usize {
        self.state.lock().unwrap().sends
    }

    pub fn edits(&self) -> usize {
        self.state.lock().unwrap().edits
    }

    pub fn fetch_message_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_message_calls
    }

    pub fn write_attempts(&self) -> Vec<Instant> {
        self.state.lock().unwrap().write_attempts.clone()
    }

    pub fn own_messages(&self) -> Vec<MessageId> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .filter(|(_, m)| m.author == OWN_USER)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn payload_of(&self, id: MessageId) -> Option<PanelPayload> {
        let state = self.state.lock().unwrap();
        state.messages.get(&id).and_then(|m| m.payload.clone())
    }

    fn begin_write(state: &mut FakeState) -> Result<(), PlatformError> {
        state.write_attempts.push(Instant::now());
        match state.write_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn check_channel(state: &FakeState) -> Result<(), PlatformError> {
        if state.channel_missing {
            Err(PlatformError::ChannelNotFound)
        } else {
            Ok(())
        }
    }
}

fn remote(id: MessageId, author: UserId) -> RemoteMessage {
    RemoteMessage { id, author: RemoteUser { id: author } }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn current_user(&self) -> Result<UserId, PlatformError> {
        Ok(OWN_USER)
    }

    async fn fetch_channel(&self, _channel: ChannelId) -> Result<(), PlatformError> {
        Self::check_channel(&self.state.lock().unwrap())
    }

    async fn fetch_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
    ) -> Result<RemoteMessage, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_message_calls += 1;
        Self::check_channel(&state)?;
        state
            .messages
            .get(&message)
            .map(|m| remote(message, m.author))
            .ok_or(PlatformError::MessageNotFound)
    }

    async fn recent_messages(
        &self,
        _channel: ChannelId,
        limit: u8,
    ) -> Result<Vec<RemoteMessage>, PlatformError> {
        let state = self.state.lock().unwrap();
        Self::check_channel(&state)?;
        if state.history_denied {
            return Err(PlatformError::Unauthorized("Missing Access".into()));
        }
        Ok(state
            .messages
            .iter()
            .rev()
            .take(limit as usize)
            .map(|(id, m)| remote(*id, m.author))
            .collect())
    }

    async fn send_message(
        &self,
        _channel: ChannelId,
        payload: &PanelPayload,
    ) -> Result<RemoteMessage, PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::check_channel(&state)?;
        Self::begin_write(&mut state)?;
        state.next_id += 1;
        let id = MessageId(state.next_id);
        state.messages.insert(
            id,
            StoredMessage { author: OWN_USER, payload: Some(payload.clone()) },
        );
        state.sends += 1;
        Ok(remote(id, OWN_USER))
    }

    async fn edit_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
        payload: &PanelPayload,
    ) -> Result<RemoteMessage, PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::check_channel(&state)?;
        Self::begin_write(&mut state)?;
        let stored = state
            .messages
            .get_mut(&message)
            .ok_or(PlatformError::MessageNotFound)?;
        stored.payload = Some(payload.clone());
        let author = stored.author;
        state.edits += 1;
        Ok(remote(message, author))
    }
}
