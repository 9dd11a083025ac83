use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::fanout::FanoutBroadcaster;
use crate::membership::MembershipManager;
use crate::redis::RedisPool;
use crate::registry::{create_registry, ConnectionRegistry};
use crate::transport::{create_push_transport, PushTransport};

/// Process-wide handles, created once per worker and reused across
/// invocations.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub transport: Arc<dyn PushTransport>,
    pub membership: Arc<MembershipManager>,
    pub broadcaster: Arc<FanoutBroadcaster>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let redis_pool = if settings.registry.backend == "redis" {
            Some(Arc::new(RedisPool::new(&settings.redis)?))
        } else {
            None
        };

        let registry = create_registry(&settings.registry, redis_pool);
        let transport = create_push_transport(&settings.transport)?;

        let membership = Arc::new(MembershipManager::new(
            registry.clone(),
            settings.registry.default_room.clone(),
            settings.registry.connection_ttl(),
        ));
        let broadcaster = Arc::new(FanoutBroadcaster::new(
            registry.clone(),
            transport.clone(),
            settings.fanout.clone(),
            settings.registry.default_room.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            registry,
            transport,
            membership,
            broadcaster,
            start_time: Instant::now(),
        })
    }
}
