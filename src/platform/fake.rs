//! Scriptable in-memory guild used by manager tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, GuildId, PermissionOverwrite, RoleId, UserId};
use std::collections::{HashMap, HashSet};

use super::{ChannelKind, ChannelSummary, GuildPlatform, PlatformError, PlatformResult};

pub const BOT_ID: u64 = 999;

#[derive(Default)]
struct FakeState {
    next_id: u64,
    roles: HashMap<String, RoleId>,
    member_roles: HashSet<(UserId, RoleId)>,
    nicknames: HashMap<UserId, String>,
    channels: Vec<ChannelSummary>,
    overwrites: Vec<(ChannelId, PermissionOverwrite)>,
    prompts: Vec<(ChannelId, String)>,

    fail_role_lookup: bool,
    fail_role_create: bool,
    deny_role_assign: bool,
    fail_role_assign: bool,
    fail_nickname: bool,
    failing_channels: HashSet<ChannelId>,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(&self, name: &str) -> RoleId {
        let mut state = self.state.lock();
        let id = RoleId::new(state.next_id());
        state.roles.insert(name.to_string(), id);
        id
    }

    pub fn with_channel(&self, name: &str, kind: ChannelKind) -> ChannelId {
        let mut state = self.state.lock();
        let id = ChannelId::new(state.next_id());
        state.channels.push(ChannelSummary {
            id,
            name: name.to_string(),
            kind,
        });
        id
    }

    pub fn give_role(&self, user: UserId, role: RoleId) {
        self.state.lock().member_roles.insert((user, role));
    }

    pub fn role_id(&self, name: &str) -> Option<RoleId> {
        self.state.lock().roles.get(name).copied()
    }

    pub fn has_role(&self, user: UserId, name: &str) -> bool {
        let state = self.state.lock();
        state
            .roles
            .get(name)
            .is_some_and(|role| state.member_roles.contains(&(user, *role)))
    }

    pub fn nickname(&self, user: UserId) -> Option<String> {
        self.state.lock().nicknames.get(&user).cloned()
    }

    pub fn channel_id(&self, name: &str) -> Option<ChannelId> {
        self.state
            .lock()
            .channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    pub fn overwrites_for(&self, channel: ChannelId) -> Vec<PermissionOverwrite> {
        self.state
            .lock()
            .overwrites
            .iter()
            .filter(|(id, _)| *id == channel)
            .map(|(_, overwrite)| overwrite.clone())
            .collect()
    }

    pub fn prompts(&self) -> Vec<(ChannelId, String)> {
        self.state.lock().prompts.clone()
    }

    pub fn fail_role_lookup(&self) {
        self.state.lock().fail_role_lookup = true;
    }

    pub fn fail_role_create(&self) {
        self.state.lock().fail_role_create = true;
    }

    pub fn deny_role_assign(&self) {
        self.state.lock().deny_role_assign = true;
    }

    pub fn fail_role_assign(&self) {
        self.state.lock().fail_role_assign = true;
    }

    pub fn fail_nickname(&self) {
        self.state.lock().fail_nickname = true;
    }

    pub fn fail_overwrites_on(&self, channel: ChannelId) {
        self.state.lock().failing_channels.insert(channel);
    }
}

#[async_trait]
impl GuildPlatform for FakePlatform {
    async fn find_role(&self, _guild: GuildId, name: &str) -> PlatformResult<Option<RoleId>> {
        let state = self.state.lock();
        if state.fail_role_lookup {
            return Err(PlatformError::Api("role lookup failed".to_string()));
        }
        Ok(state.roles.get(name).copied())
    }

    async fn create_role(&self, _guild: GuildId, name: &str) -> PlatformResult<RoleId> {
        let mut state = self.state.lock();
        if state.fail_role_create {
            return Err(PlatformError::PermissionDenied("cannot create roles".to_string()));
        }
        let id = RoleId::new(state.next_id());
        state.roles.insert(name.to_string(), id);
        Ok(id)
    }

    async fn member_has_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformResult<bool> {
        Ok(self.state.lock().member_roles.contains(&(user, role)))
    }

    async fn add_role(&self, _guild: GuildId, user: UserId, role: RoleId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.deny_role_assign {
            return Err(PlatformError::PermissionDenied("role above bot".to_string()));
        }
        if state.fail_role_assign {
            return Err(PlatformError::Api("gateway hiccup".to_string()));
        }
        state.member_roles.insert((user, role));
        Ok(())
    }

    async fn remove_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> PlatformResult<()> {
        self.state.lock().member_roles.remove(&(user, role));
        Ok(())
    }

    async fn set_nickname(
        &self,
        _guild: GuildId,
        user: UserId,
        nickname: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.fail_nickname {
            return Err(PlatformError::PermissionDenied("cannot rename owner".to_string()));
        }
        state.nicknames.insert(user, nickname.to_string());
        Ok(())
    }

    async fn find_text_channel(
        &self,
        _guild: GuildId,
        name: &str,
    ) -> PlatformResult<Option<ChannelId>> {
        Ok(self
            .state
            .lock()
            .channels
            .iter()
            .find(|c| c.kind == ChannelKind::Text && c.name == name)
            .map(|c| c.id))
    }

    async fn create_text_channel(
        &self,
        _guild: GuildId,
        name: &str,
        overwrites: Vec<PermissionOverwrite>,
    ) -> PlatformResult<ChannelId> {
        let mut state = self.state.lock();
        let id = ChannelId::new(state.next_id());
        state.channels.push(ChannelSummary {
            id,
            name: name.to_string(),
            kind: ChannelKind::Text,
        });
        state
            .overwrites
            .extend(overwrites.into_iter().map(|overwrite| (id, overwrite)));
        Ok(id)
    }

    async fn list_channels(&self, _guild: GuildId) -> PlatformResult<Vec<ChannelSummary>> {
        Ok(self.state.lock().channels.clone())
    }

    async fn set_overwrite(
        &self,
        channel: ChannelId,
        overwrite: PermissionOverwrite,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if state.failing_channels.contains(&channel) {
            return Err(PlatformError::PermissionDenied("channel locked".to_string()));
        }
        state
            .overwrites
            .retain(|(id, existing)| !(*id == channel && existing.kind == overwrite.kind));
        state.overwrites.push((channel, overwrite));
        Ok(())
    }

    fn bot_user_id(&self) -> UserId {
        UserId::new(BOT_ID)
    }

    async fn send_language_prompt(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> PlatformResult<()> {
        self.state.lock().prompts.push((channel, content.to_string()));
        Ok(())
    }
}
