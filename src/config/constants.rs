/// Default backend base url, the backend listens on 8000 in development
pub const API_ENDPOINT: &str = "http://localhost:8000";

/// Every backend route lives under this prefix
pub const API_PREFIX: &str = "/api/v1";

/// Prefix of a frame line in the event stream
pub const FRAME_PREFIX: &str = "data:";

/// Field of an embedded answer document carrying the generated text
pub const LLM_RESPONSE_FIELD: &str = "llm_response";

/// Field of an embedded answer document carrying the retrieval list
pub const RETRIEVAL_FIELD: &str = "rag";

/// Prefix of the answer text committed when the transport fails
pub const ERROR_MARKER: &str = "Error:";

/// Max characters of the first message used as a conversation title
pub const TITLE_MAX_CHARS: usize = 20;

pub const TITLE_ELLIPSIS: &str = "...";

pub const DEFAULT_CONVERSATION_ID: &str = "1";

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub const STORAGE_PATH: &str = "${HOME}/.ragchat/ragchat.db";
