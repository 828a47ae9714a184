//! Shared HTTP constants (routes, headers, response bodies).

pub(crate) const ROUTE_INDEX: &str = "/";
pub(crate) const ROUTE_ARCHIVE: &str = "/archive/{identifier}/";
pub(crate) const ROUTE_ARCHIVE_BARE: &str = "/archive/{identifier}";
pub(crate) const ROUTE_HEALTH: &str = "/health";
pub(crate) const ROUTE_METRICS: &str = "/metrics";

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const CONTENT_TYPE_ARCHIVE: &str = "multipart/x-mixed-replace";
pub(crate) const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub(crate) const CONTENT_TYPE_METRICS: &str = "text/plain; version=0.0.4";

pub(crate) const ARCHIVE_NOT_FOUND_BODY: &str = "Архив не существует или был удален";
