pub mod chat_service;
pub mod config_service;
pub mod conversation_service;
pub mod llm_client;
pub mod sse_decoder;
pub mod storage_service;
