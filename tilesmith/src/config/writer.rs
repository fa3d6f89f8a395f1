//! INI serialization: `ConfigFile` → commented INI string.

use super::settings::ConfigFile;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[batch]
; How long a batch keeps collecting requests after the first one (milliseconds)
window_ms = {window_ms}
; A batch is dispatched early once it holds this many requests
max_requests = {max_requests}
; Timeout for each call to the remote compute service (seconds)
request_timeout_secs = {request_timeout_secs}
; Pending requests accepted before submitters wait
queue_capacity = {queue_capacity}

[tiles]
; Default bin resolution per tile side (power of two, at most 256)
resolution = {resolution}
; Default LOD levels for point and edge tiles (0 = plain encoding)
lod = {lod}

[ingest]
; Concurrent ingest workers
workers = {workers}

[logging]
directory = {directory}
file = {file}
"#,
        window_ms = config.batch.window_ms,
        max_requests = config.batch.max_requests,
        request_timeout_secs = config.batch.request_timeout_secs,
        queue_capacity = config.batch.queue_capacity,
        resolution = config.tiles.resolution,
        lod = config.tiles.lod,
        workers = config.ingest.workers,
        directory = config.logging.directory.display(),
        file = config.logging.file,
    )
}
