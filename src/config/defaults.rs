use super::constants::*;

pub(crate) fn log_level() -> Option<String> {
    Some("info".to_string())
}

pub(crate) fn api_endpoint() -> String {
    API_ENDPOINT.to_string()
}

pub(crate) fn page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
