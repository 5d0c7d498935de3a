pub mod catalog;
pub mod config;
pub mod feed;
pub mod indexer;
pub mod ingest;
pub mod lifecycle;
pub mod metadata;
pub mod metrics;
pub mod retry;
pub mod testing;

pub use catalog::{
    CatalogEntry, CatalogError, CatalogFile, CatalogStats, SqliteCatalog, TorrentCatalog,
    UpsertOutcome,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LifecycleMode,
};
pub use feed::{
    channel_feed, AnnounceEvent, AnnounceFeed, ChannelFeed, FeedError, FeedSender, Frame,
    FrameError, PeerAnnounce, SocketFeed,
};
pub use indexer::build_search_index;
pub use ingest::{EventOutcome, ExitReason, IngestLoop, IngestStats, LoopExit};
pub use lifecycle::{
    LifecycleError, LifecyclePolicy, LoopState, ProcessRespawner, Respawner, Supervisor,
};
pub use metadata::{
    decode_and_normalize, normalize, ContentId, FileEntry, MetadataError, MetadataValue,
    TorrentRecord,
};
pub use retry::{RetryError, RetryPolicy};
