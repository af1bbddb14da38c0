use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use commandeer::lang::DefaultLanguageProvider;
use commandeer::middleware::Arg;
use commandeer::{
    Author, ChannelId, Command, Dispatcher, DispatcherConfig, EventSink, Gateway, GuildId,
    InMemoryRegistry, MemoryProvider, Message, Outcome, Reply, Role, UserId,
};

/// Gateway double that records every send and serves configurable
/// permissions and roles.
#[derive(Default)]
pub struct MockGateway {
    pub sent: Mutex<Vec<Reply>>,
    pub private: Mutex<Vec<(UserId, String)>>,
    pub client_perms: Mutex<HashSet<String>>,
    pub member_perms: Mutex<HashSet<String>>,
    pub roles: Mutex<Vec<Role>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_client(&self, perm: &str) {
        self.client_perms.lock().unwrap().insert(perm.to_string());
    }

    pub fn grant_member(&self, perm: &str) {
        self.member_perms.lock().unwrap().insert(perm.to_string());
    }

    pub fn add_role(&self, id: &str, name: &str) {
        self.roles.lock().unwrap().push(Role {
            id: id.into(),
            name: name.to_string(),
        });
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|r| r.content.clone()).collect()
    }

    pub fn private_texts(&self) -> Vec<String> {
        self.private.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(&self, channel: &ChannelId, content: &str) -> commandeer::Result<Reply> {
        let reply = Reply {
            channel_id: channel.clone(),
            content: content.to_string(),
        };
        self.sent.lock().unwrap().push(reply.clone());
        Ok(reply)
    }

    async fn send_private(&self, user: &UserId, content: &str) -> commandeer::Result<()> {
        self.private
            .lock()
            .unwrap()
            .push((user.clone(), content.to_string()));
        Ok(())
    }

    async fn client_permissions(&self, _channel: &ChannelId) -> commandeer::Result<HashSet<String>> {
        Ok(self.client_perms.lock().unwrap().clone())
    }

    async fn member_permissions(
        &self,
        _guild: &GuildId,
        _user: &UserId,
    ) -> commandeer::Result<HashSet<String>> {
        Ok(self.member_perms.lock().unwrap().clone())
    }

    async fn member_roles(&self, _guild: &GuildId, _user: &UserId) -> commandeer::Result<Vec<Role>> {
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn find_user(&self, token: &str) -> commandeer::Result<Option<Author>> {
        Ok(Some(Author {
            id: token.into(),
            name: token.to_string(),
            bot: false,
        }))
    }

    async fn find_member(
        &self,
        _guild: &GuildId,
        token: &str,
    ) -> commandeer::Result<Option<Author>> {
        Ok(Some(Author {
            id: token.into(),
            name: token.to_string(),
            bot: false,
        }))
    }

    async fn find_channel(
        &self,
        _guild: &GuildId,
        token: &str,
    ) -> commandeer::Result<Option<ChannelId>> {
        Ok(Some(token.into()))
    }

    async fn find_role(&self, _guild: &GuildId, token: &str) -> commandeer::Result<Option<Role>> {
        Ok(Some(Role {
            id: token.into(),
            name: token.to_string(),
        }))
    }
}

/// Sink that records every emitted signal.
#[derive(Default)]
pub struct RecordingSink {
    pub commands: Mutex<Vec<(String, Duration)>>,
    pub unknown: Mutex<Vec<String>>,
    pub no_command: AtomicUsize,
}

impl EventSink for RecordingSink {
    fn command(&self, name: &str, _args: &[Arg], elapsed: Duration, _message: &Message) {
        self.commands
            .lock()
            .unwrap()
            .push((name.to_string(), elapsed));
    }

    fn unknown_command(&self, name: &str, _args: &[String], _message: &Message) {
        self.unknown.lock().unwrap().push(name.to_string());
    }

    fn no_command(&self, _message: &Message) {
        self.no_command.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestBot {
    pub dispatcher: Arc<Dispatcher>,
    pub gateway: Arc<MockGateway>,
    pub storage: Arc<MemoryProvider>,
    pub sink: Arc<RecordingSink>,
}

pub fn default_config() -> DispatcherConfig {
    DispatcherConfig {
        prefix: "!".to_string(),
        bot_id: "999".into(),
        owners: ["1".into()].into_iter().collect(),
        ..DispatcherConfig::default()
    }
}

pub fn bot(registry: InMemoryRegistry) -> TestBot {
    bot_with(default_config(), registry)
}

pub fn bot_with(config: DispatcherConfig, registry: InMemoryRegistry) -> TestBot {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let gateway = Arc::new(MockGateway::new());
    let storage = Arc::new(MemoryProvider::new());
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Dispatcher::new(
        config,
        gateway.clone(),
        storage.clone(),
        Arc::new(DefaultLanguageProvider),
        Arc::new(registry),
    )
    .events(sink.clone());
    TestBot {
        dispatcher: Arc::new(dispatcher),
        gateway,
        storage,
        sink,
    }
}

/// Command whose action increments a counter and returns nothing.
pub fn counting_command(name: &str) -> (Command, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let calls = count.clone();
    let command = Command::new(name, move |_message, _args| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::None)
        }
    });
    (command, count)
}

pub fn guild_message(user: &str, guild: &str, content: &str) -> Message {
    Message {
        author: Author {
            id: user.into(),
            name: format!("user-{user}"),
            bot: false,
        },
        channel_id: format!("chan-{guild}").as_str().into(),
        guild_id: Some(guild.into()),
        content: content.to_string(),
        mentions: Vec::new(),
    }
}

pub fn dm_message(user: &str, content: &str) -> Message {
    Message {
        author: Author {
            id: user.into(),
            name: format!("user-{user}"),
            bot: false,
        },
        channel_id: format!("dm-{user}").as_str().into(),
        guild_id: None,
        content: content.to_string(),
        mentions: Vec::new(),
    }
}
