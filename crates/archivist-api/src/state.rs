//! Shared application state for handlers.

use std::path::PathBuf;

use archivist_archive::{
    ActiveStreams, ArchiverCommand, DirectoryResolver, ProcessSupervisor, RelaySettings,
    ShutdownController,
};
use archivist_config::ServiceConfig;
use archivist_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) resolver: DirectoryResolver,
    pub(crate) supervisor: ProcessSupervisor,
    pub(crate) relay: RelaySettings,
    pub(crate) archive_name: String,
    pub(crate) index_path: PathBuf,
    pub(crate) telemetry: Metrics,
    pub(crate) shutdown: ShutdownController,
    pub(crate) streams: ActiveStreams,
}

impl ApiState {
    pub(crate) fn new(
        config: &ServiceConfig,
        telemetry: Metrics,
        shutdown: ShutdownController,
        streams: ActiveStreams,
    ) -> Self {
        let command = ArchiverCommand::new(&config.archiver.program, &config.archiver.args);
        Self {
            resolver: DirectoryResolver::new(&config.photos_dir),
            supervisor: ProcessSupervisor::new(command, config.terminate_grace),
            relay: RelaySettings::new(config.chunk_size).with_delay(config.relay_delay()),
            archive_name: config.archive_name.clone(),
            index_path: config.index_path.clone(),
            telemetry,
            shutdown,
            streams,
        }
    }
}
